// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Partition result files and solution files.

use crate::error::{PartError, Result};
use crate::hypergraph::Hypergraph;
use crate::partition::PartitionAssignment;
use std::io::Write;
use std::path::Path;

/// Write a partition result: a commented header, one
/// `vertex_id partition_id` line per vertex, and the vertex names
/// when there is exactly one per assigned vertex.
pub fn write_result<W: Write>(
    mut w: W, hg: &Hypergraph, assignment: &PartitionAssignment, cutsize: f64
) -> std::io::Result<()> {
    writeln!(w, "# Partition result")?;
    writeln!(w, "# Partitions: {}", assignment.num_parts())?;
    writeln!(w, "# Vertices: {}", hg.num_vertices())?;
    writeln!(w, "# Hyperedges: {}", hg.num_edges())?;
    writeln!(w, "# Cutsize: {}", cutsize)?;
    writeln!(w, "# Format: vertex_id partition_id")?;
    writeln!(w)?;
    for (v, p) in assignment.parts().iter().enumerate() {
        writeln!(w, "{} {}", v, p)?;
    }
    let names = hg.vertex_names();
    if !names.is_empty() && names.len() == assignment.len() {
        writeln!(w)?;
        writeln!(w, "# Instance names mapping")?;
        writeln!(w, "# Format: instance_name partition_id")?;
        for (name, p) in names.iter().zip(assignment.parts()) {
            writeln!(w, "{} {}", name, p)?;
        }
    }
    Ok(())
}

pub fn write_result_file(
    path: &Path, hg: &Hypergraph, assignment: &PartitionAssignment, cutsize: f64
) -> Result<()> {
    let f = std::fs::File::create(path)?;
    let mut buf = std::io::BufWriter::new(f);
    write_result(&mut buf, hg, assignment, cutsize)?;
    buf.flush()?;
    clilog::info!("partition result written to {}", path.display());
    Ok(())
}

/// Label stored for entries whose partition id is not a valid index.
/// [`PartitionAssignment::part_of`] never returns it.
const INVALID_LABEL: usize = usize::MAX;

/// Parse a solution: either one `partition_id` per line (vertex id =
/// line order) or `vertex_id partition_id` lines.
///
/// Blank lines, `#` comments and lines not starting with an integer
/// (such as the instance name section of a result file) are skipped.
/// An entry whose label is not a non-negative integer keeps its slot
/// but stays unassigned, as do vertex ids missing from the file.
pub fn parse_solution(src: &str, num_parts: usize) -> PartitionAssignment {
    let mut parts: Vec<usize> = Vec::new();
    let mut num_invalid = 0;
    let mut num_duplicate = 0;
    for line in src.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue
        }
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else { continue };
        if first.parse::<i64>().is_err() {
            continue
        }
        let (vertex, label) = match tokens.next() {
            Some(second) => {
                let Ok(vertex) = first.parse::<usize>() else {
                    num_invalid += 1;
                    continue
                };
                (vertex, second.parse::<usize>().ok())
            },
            None => (parts.len(), first.parse::<usize>().ok()),
        };
        let label = label.unwrap_or_else(|| {
            num_invalid += 1;
            INVALID_LABEL
        });
        if vertex >= parts.len() {
            parts.resize(vertex + 1, INVALID_LABEL);
        }
        else if parts[vertex] != INVALID_LABEL {
            num_duplicate += 1;
        }
        parts[vertex] = label;
    }
    if num_invalid > 0 {
        clilog::warn!("{} solution lines have invalid entries, \
                       those vertices are left unassigned", num_invalid);
    }
    if num_duplicate > 0 {
        clilog::warn!("{} vertex ids appear more than once in the solution, \
                       the last entry wins", num_duplicate);
    }
    PartitionAssignment::new(num_parts, parts)
}

pub fn read_solution(path: &Path, num_parts: usize) -> Result<PartitionAssignment> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| PartError::load("solution", path, e))?;
    let a = parse_solution(&src, num_parts);
    clilog::info!("solution loaded: {} vertices", a.len());
    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::tests::{cell, edge};

    #[test]
    fn result_file_round_trip() {
        let hg = Hypergraph::from_parts(
            vec![cell(0, 1.0), cell(1, 1.0), cell(2, 1.0)],
            vec![edge(0, &[0, 1, 2])],
        ).unwrap();
        let a = PartitionAssignment::new(2, vec![1, 0, 1]);
        let mut out = Vec::new();
        write_result(&mut out, &hg, &a, 1.0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# Partition result\n# Partitions: 2\n# Vertices: 3\n"));
        assert!(text.contains("# Cutsize: 1\n"));
        assert!(text.contains("\nu2 1\n"));
        assert_eq!(parse_solution(&text, 2), a);
    }

    #[test]
    fn names_only_when_counts_match() {
        let hg = Hypergraph::from_parts(vec![cell(0, 1.0), cell(1, 1.0)], vec![]).unwrap();
        let mut out = Vec::new();
        write_result(&mut out, &hg, &PartitionAssignment::new(2, vec![0]), 0.0).unwrap();
        assert!(!String::from_utf8(out).unwrap().contains("names mapping"));
    }

    #[test]
    fn plain_and_unordered_solutions() {
        let a = parse_solution("0\n\n1\n# c\n1\n", 2);
        assert_eq!(a.parts(), &[0, 1, 1]);
        let a = parse_solution("2 1\n0 0\n1 1\n", 2);
        assert_eq!(a.parts(), &[0, 1, 1]);
    }

    #[test]
    fn bad_label_keeps_its_slot() {
        let a = parse_solution("0 0\n1 -1\n2 1\n", 2);
        assert_eq!(a.len(), 3);
        assert_eq!(a.part_of(0), Some(0));
        assert_eq!(a.part_of(1), None);
        assert_eq!(a.part_of(2), Some(1));

        let a = parse_solution("0\n-1\nx\n1\n", 2);
        assert_eq!(a.len(), 3);
        assert_eq!(a.part_of(1), None);
        assert_eq!(a.part_of(2), Some(1));
    }

    #[test]
    fn vertex_ids_index_the_labels() {
        let a = parse_solution("0 0\n2 1\n", 2);
        assert_eq!(a.len(), 3);
        assert_eq!(a.part_of(0), Some(0));
        assert_eq!(a.part_of(1), None);
        assert_eq!(a.part_of(2), Some(1));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir::TempDir::new("netpart").unwrap();
        let path = dir.path().join("out.part");
        let hg = Hypergraph::from_parts(vec![cell(0, 1.0), cell(1, 1.0)],
                                        vec![edge(0, &[1, 0])]).unwrap();
        let a = PartitionAssignment::new(2, vec![0, 1]);
        write_result_file(&path, &hg, &a, 1.0).unwrap();
        assert_eq!(read_solution(&path, 2).unwrap(), a);
        assert!(read_solution(&dir.path().join("missing"), 2).is_err());
    }
}
