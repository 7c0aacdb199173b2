// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Partition assignments and the partitioners producing them.

use crate::error::{PartError, Result};
use crate::hypergraph::Hypergraph;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// A partition label for each vertex, in vertex id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionAssignment {
    num_parts: usize,
    parts: Vec<usize>,
}

impl PartitionAssignment {
    /// Labels may be out of range, e.g. when read from a file; such
    /// vertices are left out of evaluation.
    pub fn new(num_parts: usize, parts: Vec<usize>) -> PartitionAssignment {
        PartitionAssignment { num_parts, parts }
    }

    #[inline]
    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    #[inline]
    pub fn parts(&self) -> &[usize] {
        &self.parts
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The label of vertex `v`, if assigned and in range.
    #[inline]
    pub fn part_of(&self, v: usize) -> Option<usize> {
        self.parts.get(v).copied().filter(|&p| p < self.num_parts)
    }
}

/// Anything that can split a hypergraph into `num_parts` blocks.
pub trait Partitioner {
    fn name(&self) -> &'static str;

    fn assign(
        &self, hg: &Hypergraph,
        num_parts: usize, balance_factor: f64, seed: u64
    ) -> Result<PartitionAssignment>;
}

/// Single-pass weight balancing, hyperedges ignored.
///
/// Each vertex in id order goes to the currently lightest partition
/// (lowest index on ties) unless that would push it past
/// `total / num_parts * balance_factor`; then it goes to a random
/// partition instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyBalancePartitioner;

impl GreedyBalancePartitioner {
    /// Like [`Partitioner::assign`], also returning the vertices
    /// placed by the random fallback.
    pub fn assign_traced(
        &self, hg: &Hypergraph,
        num_parts: usize, balance_factor: f64, seed: u64
    ) -> Result<(PartitionAssignment, Vec<usize>)> {
        if num_parts == 0 {
            return Err(PartError::InvalidArgument(
                "number of partitions must be positive".into()))
        }
        if !balance_factor.is_finite() || balance_factor <= 0. {
            return Err(PartError::InvalidArgument(format!(
                "balance factor must be positive, got {}", balance_factor)))
        }
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let limit = hg.total_vertex_weight() / num_parts as f64 * balance_factor;
        let mut weights = vec![0.0f64; num_parts];
        let mut parts = Vec::with_capacity(hg.num_vertices());
        let mut fallbacks = Vec::new();
        for v in hg.vertices() {
            let mut p = 0;
            for i in 1..num_parts {
                if weights[i] < weights[p] {
                    p = i;
                }
            }
            if weights[p] + v.weight > limit {
                p = rng.gen_range(0..num_parts);
                fallbacks.push(v.id);
            }
            weights[p] += v.weight;
            parts.push(p);
        }
        if !fallbacks.is_empty() {
            clilog::warn!("{} vertices exceeded the balance limit {:.3} \
                           and were placed randomly", fallbacks.len(), limit);
        }
        clilog::debug!("partition weights: {:?}", weights);
        Ok((PartitionAssignment::new(num_parts, parts), fallbacks))
    }
}

impl Partitioner for GreedyBalancePartitioner {
    fn name(&self) -> &'static str {
        "greedy-balance"
    }

    fn assign(
        &self, hg: &Hypergraph,
        num_parts: usize, balance_factor: f64, seed: u64
    ) -> Result<PartitionAssignment> {
        let timer = clilog::stimer!("greedy partition");
        let (assignment, _) = self.assign_traced(hg, num_parts, balance_factor, seed)?;
        clilog::finish!(timer);
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::tests::cell;

    fn graph(weights: &[f64]) -> Hypergraph {
        Hypergraph::from_parts(
            weights.iter().enumerate().map(|(i, &w)| cell(i, w)).collect(),
            vec![],
        ).unwrap()
    }

    #[test]
    fn fills_the_lightest_partition() {
        let hg = graph(&[3.0, 1.0, 1.0, 1.0]);
        let a = GreedyBalancePartitioner.assign(&hg, 2, 1.0, 0).unwrap();
        assert_eq!(a.parts(), &[0, 1, 1, 1]);
        assert_eq!(a.num_parts(), 2);
        assert_eq!(a.part_of(3), Some(1));
        assert_eq!(a.part_of(4), None);
    }

    #[test]
    fn same_seed_same_assignment() {
        let weights: Vec<f64> = (0..200).map(|i| ((i * 37) % 11 + 1) as f64).collect();
        let hg = graph(&weights);
        let p = GreedyBalancePartitioner;
        let a = p.assign(&hg, 4, 1.01, 42).unwrap();
        let b = p.assign(&hg, 4, 1.01, 42).unwrap();
        assert_eq!(a, b);
        assert!(a.parts().iter().all(|&x| x < 4));
    }

    #[test]
    fn balance_violations_come_from_the_fallback() {
        let hg = graph(&[10.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let (a, fallbacks) = GreedyBalancePartitioner
            .assign_traced(&hg, 3, 1.0, 7).unwrap();
        let limit = hg.total_vertex_weight() / 3.0;
        // replay: every vertex not in `fallbacks` fit under the limit
        // in the lightest partition at its turn.
        let mut weights = vec![0.0; 3];
        for v in hg.vertices() {
            let p = a.parts()[v.id];
            if !fallbacks.contains(&v.id) {
                let min = weights.iter().cloned().fold(f64::INFINITY, f64::min);
                assert_eq!(weights[p], min);
                assert!(weights[p] + v.weight <= limit);
            }
            weights[p] += v.weight;
        }
        assert_eq!(fallbacks, vec![0]);
        let over: Vec<_> = (0..3).filter(|&p| weights[p] > limit).collect();
        assert!(over.len() <= 1);
    }

    #[test]
    fn invalid_arguments() {
        let hg = graph(&[1.0]);
        assert!(GreedyBalancePartitioner.assign(&hg, 0, 1.0, 0).is_err());
        assert!(GreedyBalancePartitioner.assign(&hg, 2, 0.0, 0).is_err());
        assert!(GreedyBalancePartitioner.assign(&hg, 2, f64::NAN, 0).is_err());
    }

    #[test]
    fn empty_hypergraph() {
        let a = GreedyBalancePartitioner.assign(&graph(&[]), 2, 2.0, 0).unwrap();
        assert!(a.is_empty());
    }
}
