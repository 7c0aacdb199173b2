// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! A partitioning session: one engine and the data derived from it.

use crate::adapter::{DesignAdapter, NetCanonicalizer};
use crate::builder::{self, BuildStats, DesignIndex};
use crate::engine::DesignEngine;
use crate::error::Result;
use crate::evaluate::{evaluate, PartitionMetrics};
use crate::hypergraph::Hypergraph;
use crate::partition::{PartitionAssignment, Partitioner};
use crate::timing::{self, TimingPath};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub num_parts: usize,
    /// Allowed partition weight relative to the average.
    pub balance_factor: f64,
    pub seed: u64,
    /// Extract critical paths before partitioning.
    pub timing_aware: bool,
    /// Maximum number of timing paths to extract.
    pub top_n: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            num_parts: 2,
            balance_factor: 2.0,
            seed: 0,
            timing_aware: false,
            top_n: 100000,
        }
    }
}

struct Built {
    hg: Hypergraph,
    index: DesignIndex,
    stats: BuildStats,
}

/// Owns the engine for the lifetime of a run. Loading more design
/// data through [`Session::engine_mut`] drops everything derived.
pub struct Session<E: DesignEngine> {
    engine: E,
    config: PartitionConfig,
    canon: NetCanonicalizer,
    built: Option<Built>,
    paths: Vec<TimingPath>,
}

impl<E: DesignEngine> Session<E> {
    pub fn new(engine: E, config: PartitionConfig) -> Session<E> {
        Session {
            engine,
            config,
            canon: NetCanonicalizer::new(),
            built: None,
            paths: Vec::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.canon = NetCanonicalizer::new();
        self.built = None;
        self.paths.clear();
        &mut self.engine
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Build (or rebuild) the hypergraph of the linked design.
    pub fn build_hypergraph(&mut self) -> Result<&Hypergraph> {
        let mut adapter = DesignAdapter::new(&self.engine);
        let (hg, index, stats) = builder::build(&mut adapter)?;
        self.canon = adapter.into_canonicalizer();
        self.paths.clear();
        let built = self.built.insert(Built { hg, index, stats });
        Ok(&built.hg)
    }

    pub fn hypergraph(&self) -> Option<&Hypergraph> {
        let ret = self.built.as_ref().map(|b| &b.hg);
        if ret.is_none() {
            clilog::warn!("hypergraph requested before it was built");
        }
        ret
    }

    pub fn build_stats(&self) -> Option<&BuildStats> {
        self.built.as_ref().map(|b| &b.stats)
    }

    /// Extract up to `top_n` timing paths onto the built hypergraph.
    /// Without a hypergraph there is nothing to map onto, and no
    /// paths are returned.
    pub fn extract_timing_paths(&mut self) -> Result<&[TimingPath]> {
        let Some(built) = &self.built else {
            clilog::warn!("timing paths requested before the hypergraph was built");
            return Ok(&[])
        };
        self.paths.clear();
        let canon = std::mem::take(&mut self.canon);
        let mut adapter = DesignAdapter::with_canonicalizer(&self.engine, canon);
        let paths = timing::extract(&mut adapter, &built.index, self.config.top_n);
        self.canon = adapter.into_canonicalizer();
        self.paths = paths?;
        Ok(&self.paths)
    }

    pub fn timing_paths(&self) -> &[TimingPath] {
        &self.paths
    }

    pub fn partition(&self, partitioner: &dyn Partitioner) -> Result<PartitionAssignment> {
        let Some(hg) = self.hypergraph() else {
            return Ok(PartitionAssignment::new(self.config.num_parts, vec![]))
        };
        clilog::info!("partitioning with {}: {} parts, balance {}, seed {}",
                      partitioner.name(), self.config.num_parts,
                      self.config.balance_factor, self.config.seed);
        partitioner.assign(hg, self.config.num_parts,
                           self.config.balance_factor, self.config.seed)
    }

    pub fn evaluate(&self, assignment: &PartitionAssignment) -> PartitionMetrics {
        match self.hypergraph() {
            Some(hg) => evaluate(hg, assignment, &self.paths),
            None => evaluate(&Hypergraph::default(), assignment, &self.paths),
        }
    }

    /// The whole pipeline: build, optionally extract timing paths,
    /// partition and evaluate.
    ///
    /// A failed path search only costs the timing statistics; the
    /// partition is still produced.
    pub fn run(&mut self, partitioner: &dyn Partitioner)
               -> Result<(PartitionAssignment, PartitionMetrics)> {
        self.build_hypergraph()?;
        if self.config.timing_aware {
            if let Err(e) = self.extract_timing_paths() {
                clilog::warn!("failed to extract timing paths, \
                               partitioning without them: {}", e);
            }
        }
        let assignment = self.partition(partitioner)?;
        let metrics = self.evaluate(&assignment);
        Ok((assignment, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::*;
    use crate::engine::PinDirection::*;
    use crate::error::PartError;
    use crate::memdesign::{MemDesign, TOP};
    use crate::partition::GreedyBalancePartitioner;

    #[test]
    fn defaults() {
        let c = PartitionConfig::default();
        assert_eq!((c.num_parts, c.balance_factor, c.seed, c.timing_aware, c.top_n),
                   (2, 2.0, 0, false, 100000));
    }

    #[test]
    fn data_absent_before_build() {
        let mut s = Session::new(MemDesign::new(), PartitionConfig::default());
        assert!(s.hypergraph().is_none());
        assert!(s.extract_timing_paths().unwrap().is_empty());
        let a = s.partition(&GreedyBalancePartitioner).unwrap();
        assert!(a.is_empty());
        assert_eq!(s.evaluate(&a).num_cut_edges, 0);
    }

    #[test]
    fn unlinked_engine_fails_the_build() {
        let mut s = Session::new(MemDesign::unlinked(), PartitionConfig::default());
        assert!(matches!(s.build_hypergraph(), Err(PartError::EngineUnavailable(_))));
    }

    /// A linked design whose path search always fails.
    struct NoTiming(MemDesign);

    impl DesignEngine for NoTiming {
        fn is_linked(&self) -> bool { self.0.is_linked() }
        fn top_ports(&self) -> Vec<PortInfo> { self.0.top_ports() }
        fn leaf_instances(&self) -> Vec<InstId> { self.0.leaf_instances() }
        fn lib_cell(&self, inst: InstId) -> Option<&LibCellInfo> { self.0.lib_cell(inst) }
        fn instance_name(&self, inst: InstId) -> String { self.0.instance_name(inst) }
        fn instance_pins(&self, inst: InstId) -> Vec<PinId> { self.0.instance_pins(inst) }
        fn pin_direction(&self, pin: PinId) -> PinDirection { self.0.pin_direction(pin) }
        fn pin_owner(&self, pin: PinId) -> PinOwner { self.0.pin_owner(pin) }
        fn pin_net(&self, pin: PinId) -> Option<NetId> { self.0.pin_net(pin) }
        fn highest_connected_net(&self, net: NetId) -> NetId {
            self.0.highest_connected_net(net)
        }
        fn net_connected_pins(&self, net: NetId) -> Vec<PinId> {
            self.0.net_connected_pins(net)
        }
        fn is_supply_net(&self, net: NetId) -> bool { self.0.is_supply_net(net) }
        fn net_name(&self, net: NetId) -> String { self.0.net_name(net) }
        fn find_path_ends(&self, _query: &PathQuery) -> Result<Vec<PathEnd>> {
            Err(PartError::EngineUnavailable("timer crashed".into()))
        }
    }

    #[test]
    fn failed_path_search_still_partitions() {
        let mut d = MemDesign::new();
        d.add_cell(LibCellInfo { name: "BUF".into(), area: 1.0, ..Default::default() }, &[]);
        let a = d.add_instance(TOP, "a", "BUF", &[("Y", Output)]);
        let b = d.add_instance(TOP, "b", "BUF", &[("A", Input)]);
        let n = d.add_net(TOP, "n");
        d.connect_pin(a, "Y", n).unwrap();
        d.connect_pin(b, "A", n).unwrap();
        let config = PartitionConfig { timing_aware: true, ..Default::default() };
        let mut s = Session::new(NoTiming(d), config);

        s.build_hypergraph().unwrap();
        assert!(s.extract_timing_paths().is_err());
        assert!(s.timing_paths().is_empty());

        let (assignment, metrics) = s.run(&GreedyBalancePartitioner).unwrap();
        assert_eq!(assignment.len(), 2);
        assert_eq!(metrics.num_paths, 0);
        assert!(s.timing_paths().is_empty());
    }

    #[test]
    fn engine_changes_drop_derived_data() {
        let mut d = MemDesign::new();
        d.add_cell(LibCellInfo { name: "BUF".into(), area: 1.0, ..Default::default() }, &[]);
        d.add_instance(TOP, "u", "BUF", &[("A", Input)]);
        let mut s = Session::new(d, PartitionConfig::default());
        assert_eq!(s.build_hypergraph().unwrap().num_vertices(), 1);
        s.engine_mut().add_instance(TOP, "v", "BUF", &[("A", Input)]);
        assert!(s.build_stats().is_none());
        assert_eq!(s.build_hypergraph().unwrap().num_vertices(), 2);
        assert_eq!(s.build_stats().unwrap().num_instances, 2);
    }
}
