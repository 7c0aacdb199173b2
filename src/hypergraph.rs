// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The flat weighted hypergraph handed to partitioners.
//!
//! Vertices are top-level port bits and library-backed leaf
//! instances. Hyperedges are electrical nets after canonical
//! resolution, with the driver listed first.

use crate::error::{PartError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexKind {
    Port,
    Cell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: usize,
    pub kind: VertexKind,
    pub weight: f64,
    pub is_sequential: bool,
    pub is_macro: bool,
    /// Port bit name or hierarchical instance path.
    pub name: String,
    /// Library cell name, `PORT` for ports.
    pub cell: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperedge {
    pub id: usize,
    pub weight: f64,
    /// Driver first, then loads in ascending vertex id.
    pub members: Vec<usize>,
    /// Canonical net name.
    pub name: String,
}

impl Hyperedge {
    #[inline]
    pub fn driver(&self) -> usize {
        self.members[0]
    }

    #[inline]
    pub fn loads(&self) -> &[usize] {
        &self.members[1..]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hypergraph {
    vertices: Vec<Vertex>,
    edges: Vec<Hyperedge>,
}

impl Hypergraph {
    /// Assemble a hypergraph, checking ids and memberships.
    pub fn from_parts(vertices: Vec<Vertex>, edges: Vec<Hyperedge>) -> Result<Hypergraph> {
        for (i, v) in vertices.iter().enumerate() {
            if v.id != i {
                return Err(PartError::InvalidArgument(format!(
                    "vertex {} has id {}", i, v.id)))
            }
            if !(v.weight >= 0.) {
                return Err(PartError::InvalidArgument(format!(
                    "vertex {} has weight {}", v.name, v.weight)))
            }
        }
        for (i, e) in edges.iter().enumerate() {
            if e.id != i {
                return Err(PartError::InvalidArgument(format!(
                    "hyperedge {} has id {}", i, e.id)))
            }
            if e.members.len() < 2 {
                return Err(PartError::InvalidArgument(format!(
                    "hyperedge {} has fewer than 2 members", e.name)))
            }
            let mut sorted = e.members.clone();
            sorted.sort_unstable();
            sorted.dedup();
            if sorted.len() != e.members.len() {
                return Err(PartError::InvalidArgument(format!(
                    "hyperedge {} has duplicate members", e.name)))
            }
            if sorted.last().map_or(false, |&v| v >= vertices.len()) {
                return Err(PartError::InvalidArgument(format!(
                    "hyperedge {} refers to a missing vertex", e.name)))
            }
        }
        Ok(Hypergraph { vertices, edges })
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn edges(&self) -> &[Hyperedge] {
        &self.edges
    }

    pub fn vertex(&self, id: usize) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn edge(&self, id: usize) -> Option<&Hyperedge> {
        self.edges.get(id)
    }

    pub fn total_vertex_weight(&self) -> f64 {
        self.vertices.iter().map(|v| v.weight).sum()
    }

    pub fn vertex_names(&self) -> Vec<&str> {
        self.vertices.iter().map(|v| v.name.as_str()).collect()
    }

    /// An hMETIS view with weights scaled and rounded to integers.
    pub fn int_weighted(&self, scale: f64) -> IntWeighted<'_> {
        IntWeighted { hg: self, scale }
    }

    /// Write the weighted hMETIS file.
    pub fn write_hmetis(&self, path: &Path) -> Result<()> {
        let f = std::fs::File::create(path)?;
        let mut buf = std::io::BufWriter::new(f);
        write!(buf, "{}", self)?;
        buf.flush()?;
        Ok(())
    }

    /// Write the integer-weighted hMETIS file.
    pub fn write_hmetis_int(&self, path: &Path, scale: f64) -> Result<()> {
        let f = std::fs::File::create(path)?;
        let mut buf = std::io::BufWriter::new(f);
        write!(buf, "{}", self.int_weighted(scale))?;
        buf.flush()?;
        Ok(())
    }
}

/// hMETIS with edge and vertex weights (`fmt = 11`), vertices 1-based.
impl fmt::Display for Hypergraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} 11", self.edges.len(), self.vertices.len())?;
        for e in &self.edges {
            write!(f, "{}", e.weight)?;
            for v in &e.members {
                write!(f, " {}", v + 1)?;
            }
            writeln!(f)?;
        }
        for v in &self.vertices {
            writeln!(f, "{}", v.weight)?;
        }
        Ok(())
    }
}

pub struct IntWeighted<'a> {
    hg: &'a Hypergraph,
    scale: f64,
}

impl IntWeighted<'_> {
    /// Nonzero weights never round down to 0.
    fn round(&self, w: f64) -> u64 {
        let s = (w * self.scale).round();
        if w > 0. && s < 1. { 1 } else { s.max(0.) as u64 }
    }
}

impl fmt::Display for IntWeighted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} 11", self.hg.edges.len(), self.hg.vertices.len())?;
        for e in &self.hg.edges {
            write!(f, "{}", self.round(e.weight))?;
            for v in &e.members {
                write!(f, " {}", v + 1)?;
            }
            writeln!(f)?;
        }
        for v in &self.hg.vertices {
            writeln!(f, "{}", self.round(v.weight))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn cell(id: usize, weight: f64) -> Vertex {
        Vertex {
            id,
            kind: VertexKind::Cell,
            weight,
            is_sequential: false,
            is_macro: false,
            name: format!("u{}", id),
            cell: "BUF".into(),
        }
    }

    pub(crate) fn edge(id: usize, members: &[usize]) -> Hyperedge {
        Hyperedge { id, weight: 1.0, members: members.to_vec(), name: format!("n{}", id) }
    }

    #[test]
    fn hmetis_output() {
        let hg = Hypergraph::from_parts(
            vec![cell(0, 1.5), cell(1, 2.0), cell(2, 0.25)],
            vec![edge(0, &[0, 1, 2]), edge(1, &[2, 0])],
        ).unwrap();
        assert_eq!(format!("{}", hg), "2 3 11\n1 1 2 3\n1 3 1\n1.5\n2\n0.25\n");
        assert_eq!(format!("{}", hg.int_weighted(1.0)), "2 3 11\n1 1 2 3\n1 3 1\n2\n2\n1\n");
        assert_eq!(format!("{}", hg.int_weighted(10.0)).lines().last(), Some("3"));
    }

    #[test]
    fn malformed_parts_are_rejected() {
        assert!(Hypergraph::from_parts(vec![cell(0, 1.0)], vec![edge(0, &[0])]).is_err());
        assert!(Hypergraph::from_parts(
            vec![cell(0, 1.0), cell(1, 1.0)], vec![edge(0, &[0, 0])]).is_err());
        assert!(Hypergraph::from_parts(
            vec![cell(0, 1.0), cell(1, 1.0)], vec![edge(0, &[0, 2])]).is_err());
        assert!(Hypergraph::from_parts(vec![cell(1, 1.0)], vec![]).is_err());
        assert!(Hypergraph::from_parts(vec![cell(0, -1.0)], vec![]).is_err());
    }

    #[test]
    fn totals() {
        let hg = Hypergraph::from_parts(vec![cell(0, 1.0), cell(1, 3.0)], vec![]).unwrap();
        assert_eq!(hg.total_vertex_weight(), 4.0);
        assert_eq!(hg.vertex_names(), vec!["u0", "u1"]);
        assert_eq!(hg.num_edges(), 0);
    }
}
