// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Hypergraph extraction from a linked design.

use crate::adapter::DesignAdapter;
use crate::engine::{DesignEngine, InstId, NetId, PinDirection, PinOwner, PortId};
use crate::error::{PartError, Result};
use crate::hypergraph::{Hyperedge, Hypergraph, Vertex, VertexKind};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Maps engine objects to the ids assigned during the build.
///
/// Nets are keyed by their canonical identity only; look them up
/// through the same [`DesignAdapter`] that built the index.
#[derive(Debug, Clone, Default)]
pub struct DesignIndex {
    port2vertex: HashMap<PortId, usize>,
    inst2vertex: HashMap<InstId, usize>,
    net2edge: HashMap<NetId, usize>,
}

impl DesignIndex {
    #[inline]
    pub fn vertex_of_port(&self, port: PortId) -> Option<usize> {
        self.port2vertex.get(&port).copied()
    }

    #[inline]
    pub fn vertex_of_inst(&self, inst: InstId) -> Option<usize> {
        self.inst2vertex.get(&inst).copied()
    }

    #[inline]
    pub fn edge_of_net(&self, canonical: NetId) -> Option<usize> {
        self.net2edge.get(&canonical).copied()
    }
}

/// Counters of what the build kept and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub num_ports: usize,
    pub num_instances: usize,
    /// Leaf instances without library data.
    pub skipped_instances: usize,
    pub num_hyperedges: usize,
    pub skipped_power: usize,
    /// Nets reaching only one distinct vertex.
    pub skipped_single: usize,
    pub skipped_no_driver: usize,
    /// Nets with several drivers; the lowest vertex id drives.
    pub multi_driver: usize,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ports, {} instances ({} without library), {} hyperedges \
                   (skipped: {} power, {} single-endpoint, {} driverless; \
                   {} multi-driver)",
               self.num_ports, self.num_instances, self.skipped_instances,
               self.num_hyperedges, self.skipped_power, self.skipped_single,
               self.skipped_no_driver, self.multi_driver)
    }
}

/// Build the hypergraph of the linked design behind `adapter`.
///
/// Vertex ids go to port bits first, then to leaf instances, in
/// enumeration order. Hyperedge ids follow the order in which nets are
/// first reached from instance pins.
pub fn build<E: DesignEngine + ?Sized>(
    adapter: &mut DesignAdapter<'_, E>
) -> Result<(Hypergraph, DesignIndex, BuildStats)> {
    if !adapter.is_linked() {
        return Err(PartError::EngineUnavailable(
            "cannot build hypergraph, no design linked".into()))
    }
    let timer = clilog::stimer!("build hypergraph");
    let engine = adapter.engine();
    let mut stats = BuildStats::default();
    let mut index = DesignIndex::default();
    let mut vertices = Vec::new();

    let ports = adapter.ports();
    let mut port_dirs = HashMap::new();
    for port in ports {
        let id = vertices.len();
        index.port2vertex.insert(port.id, id);
        port_dirs.insert(port.id, port.direction);
        vertices.push(Vertex {
            id,
            kind: VertexKind::Port,
            weight: 0.,
            is_sequential: false,
            is_macro: false,
            name: port.name,
            cell: "PORT".into(),
        });
    }
    stats.num_ports = vertices.len();

    let (leaves, skipped) = adapter.leaf_instances();
    stats.skipped_instances = skipped;
    for leaf in &leaves {
        let id = vertices.len();
        index.inst2vertex.insert(leaf.id, id);
        vertices.push(Vertex {
            id,
            kind: VertexKind::Cell,
            weight: if leaf.lib.area > 0. { leaf.lib.area } else { 1. },
            is_sequential: leaf.lib.is_sequential,
            is_macro: leaf.lib.is_macro,
            name: leaf.name.clone(),
            cell: leaf.lib.name.clone(),
        });
    }
    stats.num_instances = leaves.len();
    if skipped > 0 {
        clilog::warn!("{} instances without library cells are left out", skipped);
    }

    let mut edges = Vec::new();
    let mut visited = HashSet::new();
    for leaf in &leaves {
        for pin in adapter.instance_pins(leaf.id) {
            let Some(net) = adapter.pin_canonical_net(pin) else { continue };
            if !visited.insert(net) {
                continue
            }
            if engine.is_supply_net(net) {
                stats.skipped_power += 1;
                continue
            }
            let mut drivers = BTreeSet::new();
            let mut members = BTreeSet::new();
            for p in engine.net_connected_pins(net) {
                let (v, is_driver) = match engine.pin_owner(p) {
                    PinOwner::Leaf(inst) => match index.vertex_of_inst(inst) {
                        Some(v) => (v, engine.pin_direction(p).is_output()),
                        None => continue,
                    },
                    PinOwner::TopPort(port) => match index.vertex_of_port(port) {
                        Some(v) => (v, port_dirs.get(&port) == Some(&PinDirection::Input)),
                        None => continue,
                    },
                    PinOwner::Hierarchical(_) => continue,
                };
                members.insert(v);
                if is_driver {
                    drivers.insert(v);
                }
            }
            if members.len() == 1 {
                stats.skipped_single += 1;
                continue
            }
            let Some(&driver) = drivers.first() else {
                clilog::debug!("net {} has no driver", engine.net_name(net));
                stats.skipped_no_driver += 1;
                continue
            };
            if drivers.len() > 1 {
                clilog::debug!("net {} has {} drivers, {} kept",
                               engine.net_name(net), drivers.len(),
                               vertices[driver].name);
                stats.multi_driver += 1;
            }
            let id = edges.len();
            index.net2edge.insert(net, id);
            edges.push(Hyperedge {
                id,
                weight: 1.,
                members: std::iter::once(driver)
                    .chain(members.into_iter().filter(|&v| v != driver))
                    .collect(),
                name: engine.net_name(net),
            });
        }
    }
    stats.num_hyperedges = edges.len();
    let hg = Hypergraph::from_parts(vertices, edges)?;
    clilog::finish!(timer);
    clilog::info!("hypergraph built: {}", stats);
    Ok((hg, index, stats))
}
