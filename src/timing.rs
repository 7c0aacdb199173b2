// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Critical timing paths mapped onto hypergraph ids.

use crate::adapter::DesignAdapter;
use crate::builder::DesignIndex;
use crate::engine::{DesignEngine, PathQuery, PinOwner};
use crate::error::{PartError, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Paths with slack below this are reported as critical.
pub const CRITICAL_SLACK: f64 = -0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingPath {
    /// Negative when violating.
    pub slack: f64,
    /// Vertices along the path, first occurrence kept.
    pub vertices: Vec<usize>,
    /// Hyperedges along the path, first occurrence kept.
    pub edges: Vec<usize>,
}

impl TimingPath {
    #[inline]
    pub fn is_critical(&self) -> bool {
        self.slack < CRITICAL_SLACK
    }
}

/// Query the worst `max_paths` setup paths (one per endpoint) and map
/// them through `index`, built by the same adapter.
///
/// Pins of top ports, of hierarchical instances and of instances that
/// are not vertices contribute no vertex. Paths left without any
/// vertex are dropped.
pub fn extract<E: DesignEngine + ?Sized>(
    adapter: &mut DesignAdapter<'_, E>,
    index: &DesignIndex,
    max_paths: usize,
) -> Result<Vec<TimingPath>> {
    if !adapter.is_linked() {
        return Err(PartError::EngineUnavailable(
            "cannot extract timing paths, no design linked".into()))
    }
    let timer = clilog::stimer!("extract timing paths");
    let engine = adapter.engine();
    let ends = engine.find_path_ends(&PathQuery::setup(max_paths))?;
    let num_ends = ends.len();

    let mut paths = Vec::with_capacity(num_ends);
    for end in ends {
        let mut vertices = IndexSet::new();
        let mut edges = IndexSet::new();
        for &pin in &end.pins {
            if let PinOwner::Leaf(inst) = engine.pin_owner(pin) {
                if let Some(v) = index.vertex_of_inst(inst) {
                    vertices.insert(v);
                }
            }
            let edge = adapter.pin_canonical_net(pin)
                .and_then(|net| index.edge_of_net(net));
            if let Some(e) = edge {
                edges.insert(e);
            }
        }
        if vertices.is_empty() {
            continue
        }
        paths.push(TimingPath {
            slack: end.slack,
            vertices: vertices.into_iter().collect(),
            edges: edges.into_iter().collect(),
        });
    }
    clilog::finish!(timer);

    let num_critical = paths.iter().filter(|p| p.is_critical()).count();
    if num_ends > paths.len() {
        clilog::debug!("{} paths without any instance dropped", num_ends - paths.len());
    }
    clilog::info!("timing paths: {} ({} critical, {} non-critical)",
                  paths.len(), num_critical, paths.len() - num_critical);
    if let Some(worst) = paths.first() {
        clilog::info!("worst slack: {:.4}", worst.slack);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::engine::{LibCellInfo, NetId, PinDirection::*};
    use crate::memdesign::{MemDesign, TOP};
    use crate::sdc::Constraints;
    use std::path::Path;

    /// in -> sub/{g1 -> g2} -> r.D, with the inner nets only known in
    /// the `sub` scope.
    fn design(period: &str) -> (MemDesign, NetId) {
        let mut d = MemDesign::new();
        d.add_cell(LibCellInfo {
            name: "BUF".into(), area: 1.0, delay: 0.3, ..Default::default()
        }, &[]);
        d.add_cell(LibCellInfo {
            name: "DFF".into(), area: 4.0, is_sequential: true,
            delay: 0.1, setup: 0.1, ..Default::default()
        }, &["CLK"]);
        let inp = d.add_port("in", Input, None)[0];
        let clk = d.add_port("clk", Input, None)[0];
        let n_in = d.add_net(TOP, "in");
        let n_clk = d.add_net(TOP, "clk");
        let n_out = d.add_net(TOP, "sub_out");
        d.connect(d.port_pin(inp), n_in);
        d.connect(d.port_pin(clk), n_clk);

        let sub = d.add_hier_instance(TOP, "sub");
        let s_in = d.add_net(sub, "i");
        let s_mid = d.add_net(sub, "mid");
        let s_out = d.add_net(sub, "o");
        let hp = d.add_hier_pin(sub, "i", Input, s_in);
        d.connect(hp, n_in);
        let hp = d.add_hier_pin(sub, "o", Output, s_out);
        d.connect(hp, n_out);
        let g1 = d.add_instance(sub, "g1", "BUF", &[("A", Input), ("Y", Output)]);
        let g2 = d.add_instance(sub, "g2", "BUF", &[("A", Input), ("Y", Output)]);
        d.connect_pin(g1, "A", s_in).unwrap();
        d.connect_pin(g1, "Y", s_mid).unwrap();
        d.connect_pin(g2, "A", s_mid).unwrap();
        d.connect_pin(g2, "Y", s_out).unwrap();
        let r = d.add_instance(TOP, "r", "DFF", &[("CLK", Input), ("D", Input), ("Q", Output)]);
        d.connect_pin(r, "CLK", n_clk).unwrap();
        d.connect_pin(r, "D", n_out).unwrap();

        let mut c = Constraints::new();
        c.read_str(&format!("create_clock -period {} [get_ports clk]\n\
                             set_input_delay 0.2 [get_ports in]", period),
                   Path::new("t.sdc")).unwrap();
        d.set_constraints(c);
        (d, s_out)
    }

    #[test]
    fn path_nets_resolve_through_aliases() {
        let (d, s_out) = design("1.0");
        let mut adapter = DesignAdapter::new(&d);
        let (hg, index, _) = build(&mut adapter).unwrap();
        let paths = extract(&mut adapter, &index, 10).unwrap();
        assert_eq!(paths.len(), 1);
        let p = &paths[0];
        // 1.0 - 0.1 - (0.2 + 0.3 + 0.3)
        assert!((p.slack - 0.1).abs() < 1e-9);
        assert!(!p.is_critical());
        let names: Vec<_> = p.vertices.iter().map(|&v| hg.vertices()[v].name.as_str()).collect();
        assert_eq!(names, vec!["sub/g1", "sub/g2", "r"]);
        // in, sub/mid and the top-level alias of sub/o.
        assert_eq!(p.edges.len(), 3);
        let out_edge = index.edge_of_net(adapter.canonical(s_out)).unwrap();
        assert_eq!(hg.edges()[out_edge].name, "sub_out");
        assert_eq!(p.edges[2], out_edge);
    }

    #[test]
    fn violating_paths_are_critical() {
        let (d, _) = design("0.5");
        let mut adapter = DesignAdapter::new(&d);
        let (_, index, _) = build(&mut adapter).unwrap();
        let paths = extract(&mut adapter, &index, 10).unwrap();
        assert!(paths[0].slack < 0.);
        assert!(paths[0].is_critical());
    }

    #[test]
    fn paths_without_cells_are_dropped() {
        let mut d = MemDesign::new();
        let a = d.add_port("a", Input, None)[0];
        let y = d.add_port("y", Output, None)[0];
        let n = d.add_net(TOP, "feed");
        d.connect(d.port_pin(a), n);
        d.connect(d.port_pin(y), n);
        let mut c = Constraints::new();
        c.read_str("create_clock -name v -period 1", Path::new("t.sdc")).unwrap();
        d.set_constraints(c);
        assert_eq!(d.find_path_ends(&PathQuery::setup(5)).unwrap().len(), 1);
        let mut adapter = DesignAdapter::new(&d);
        let (_, index, _) = build(&mut adapter).unwrap();
        assert!(extract(&mut adapter, &index, 5).unwrap().is_empty());
    }
}
