// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Cut, balance and critical path statistics of a partition.

use crate::hypergraph::Hypergraph;
use crate::partition::PartitionAssignment;
use crate::timing::TimingPath;
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionMetrics {
    pub num_parts: usize,
    /// Vertices with an in-range label.
    pub num_scored: usize,
    pub num_cut_edges: usize,
    /// Total weight of the cut hyperedges.
    pub cutsize: f64,
    pub part_weights: Vec<f64>,
    pub part_sizes: Vec<usize>,
    /// Largest `|w - avg| / avg` over the partitions.
    pub max_imbalance: f64,
    pub num_paths: usize,
    pub num_cut_paths: usize,
    /// Worst slack among the cut paths.
    pub worst_cut_slack: Option<f64>,
    /// `pair_cuts[i][j]`: weight of cut hyperedges spanning both `i`
    /// and `j`. Symmetric, zero diagonal.
    pub pair_cuts: Vec<Vec<f64>>,
}

impl PartitionMetrics {
    fn empty(num_parts: usize, num_paths: usize) -> PartitionMetrics {
        PartitionMetrics {
            num_parts,
            part_weights: vec![0.; num_parts],
            part_sizes: vec![0; num_parts],
            num_paths,
            pair_cuts: vec![vec![0.; num_parts]; num_parts],
            ..Default::default()
        }
    }
}

/// Sorted distinct labels among `vertices`, unlabeled ones skipped.
fn labels_of(assignment: &PartitionAssignment, vertices: &[usize]) -> Vec<usize> {
    vertices.iter()
        .filter_map(|&v| assignment.part_of(v))
        .sorted_unstable()
        .dedup()
        .collect()
}

/// Score `assignment` against `hg` and the timing paths.
///
/// Only vertices that exist in both the hypergraph and the assignment
/// and carry a label below the partition count are scored.
pub fn evaluate(
    hg: &Hypergraph, assignment: &PartitionAssignment, paths: &[TimingPath]
) -> PartitionMetrics {
    let k = assignment.num_parts();
    let mut m = PartitionMetrics::empty(k, paths.len());
    if assignment.is_empty() {
        clilog::warn!("empty partition assignment, nothing to evaluate");
        return m
    }
    if assignment.len() != hg.num_vertices() {
        clilog::warn!("assignment has {} entries but the hypergraph has {} vertices, \
                       scoring the overlap", assignment.len(), hg.num_vertices());
    }

    let num_out_of_range = assignment.parts().iter().filter(|&&p| p >= k).count();
    if num_out_of_range > 0 {
        clilog::warn!("{} vertices have partition labels >= {} and are not scored",
                      num_out_of_range, k);
    }
    for v in hg.vertices() {
        if let Some(p) = assignment.part_of(v.id) {
            m.part_weights[p] += v.weight;
            m.part_sizes[p] += 1;
            m.num_scored += 1;
        }
    }
    let total: f64 = m.part_weights.iter().sum();
    let avg = if k > 0 { total / k as f64 } else { 0. };
    if avg > 0. {
        m.max_imbalance = m.part_weights.iter()
            .map(|w| (w - avg).abs() / avg)
            .fold(0., f64::max);
    }

    // labels of every cut hyperedge; summed in edge order below.
    let cut_labels: Vec<Option<Vec<usize>>> = hg.edges().par_iter()
        .map(|e| {
            let labels = labels_of(assignment, &e.members);
            if labels.len() > 1 { Some(labels) } else { None }
        })
        .collect();
    for (e, labels) in hg.edges().iter().zip(cut_labels) {
        let Some(labels) = labels else { continue };
        m.num_cut_edges += 1;
        m.cutsize += e.weight;
        for (&a, &b) in labels.iter().tuple_combinations() {
            m.pair_cuts[a][b] += e.weight;
            m.pair_cuts[b][a] += e.weight;
        }
    }

    for path in paths {
        if labels_of(assignment, &path.vertices).len() > 1 {
            m.num_cut_paths += 1;
            m.worst_cut_slack = Some(match m.worst_cut_slack {
                Some(s) => s.min(path.slack),
                None => path.slack,
            });
        }
    }
    m
}

impl fmt::Display for PartitionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "partitions: {}, vertices scored: {}", self.num_parts, self.num_scored)?;
        writeln!(f, "cut hyperedges: {}, cutsize: {}", self.num_cut_edges, self.cutsize)?;
        for (i, (w, n)) in self.part_weights.iter().zip(&self.part_sizes).enumerate() {
            writeln!(f, "  partition {}: weight {:.3}, {} vertices", i, w, n)?;
        }
        writeln!(f, "max imbalance: {:.2}%", self.max_imbalance * 100.)?;
        if self.num_parts > 2 {
            writeln!(f, "pairwise cut weights:")?;
            for row in &self.pair_cuts {
                writeln!(f, "  {}", row.iter().format(" "))?;
            }
        }
        write!(f, "timing paths cut: {} of {}", self.num_cut_paths, self.num_paths)?;
        if let Some(s) = self.worst_cut_slack {
            write!(f, " (worst cut slack {:.4})", s)?;
        }
        Ok(())
    }
}
