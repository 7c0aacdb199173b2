// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! An in-memory hierarchical design.
//!
//! Unlike netlistdb, which merges nets across hierarchy boundaries
//! while parsing, this keeps one net per scope and joins them through
//! the boundary pins of hierarchical instances. A net seen from
//! different levels therefore has several aliases, and
//! [`DesignEngine::highest_connected_net`] has real work to do.
//!
//! Timing uses the same lumped model as the netlist engine.

use crate::engine::*;
use crate::error::{PartError, Result};
use crate::sdc::Constraints;
use crate::sta;
use indexmap::IndexMap;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct MemCell {
    info: LibCellInfo,
    clock_pins: Vec<String>,
}

#[derive(Debug, Clone)]
struct MemInst {
    /// Full hierarchical path, `""` for the top.
    path: String,
    depth: usize,
    /// Library cell name; `None` for hierarchical instances.
    cell: Option<String>,
    pins: Vec<PinId>,
}

#[derive(Debug, Clone)]
struct MemPin {
    name: String,
    owner: PinOwner,
    direction: PinDirection,
    is_clock: bool,
    /// The net in the scope the pin is seen from.
    net: Option<NetId>,
    /// For hierarchical pins, the net inside the child scope.
    inner: Option<NetId>,
}

#[derive(Debug, Clone)]
struct MemNet {
    name: String,
    scope: InstId,
    pins: Vec<PinId>,
    /// Hierarchical pins whose inner side is this net.
    up_pins: Vec<PinId>,
    supply: bool,
}

/// A design held in memory, built through the `add_*` methods.
#[derive(Debug, Clone)]
pub struct MemDesign {
    linked: bool,
    cells: IndexMap<String, MemCell>,
    ports: Vec<PortInfo>,
    insts: Vec<MemInst>,
    pins: Vec<MemPin>,
    nets: Vec<MemNet>,
    constraints: Constraints,
}

/// The top-level scope.
pub const TOP: InstId = InstId(0);

impl MemDesign {
    /// An empty, linked design with only the top scope.
    pub fn new() -> MemDesign {
        MemDesign {
            linked: true,
            cells: IndexMap::new(),
            ports: Vec::new(),
            insts: vec![MemInst {
                path: String::new(),
                depth: 0,
                cell: None,
                pins: Vec::new(),
            }],
            pins: Vec::new(),
            nets: Vec::new(),
            constraints: Constraints::new(),
        }
    }

    /// A design whose top has not been linked. Every enumeration is
    /// empty and timing queries fail.
    pub fn unlinked() -> MemDesign {
        MemDesign { linked: false, ..MemDesign::new() }
    }

    /// Register a library cell.
    pub fn add_cell(&mut self, info: LibCellInfo, clock_pins: &[&str]) {
        self.cells.insert(info.name.clone(), MemCell {
            info,
            clock_pins: clock_pins.iter().map(|s| s.to_string()).collect(),
        });
    }

    /// Add a top-level port, one bit per index of `range` (`[msb, lsb]`
    /// order as declared), and return the bits.
    pub fn add_port(&mut self, name: &str, direction: PinDirection,
                    range: Option<(isize, isize)>) -> Vec<PortId> {
        let names = match range {
            None => vec![name.to_string()],
            Some((from, to)) => {
                let step = if from <= to { 1 } else { -1 };
                let mut v = Vec::new();
                let mut i = from;
                loop {
                    v.push(format!("{}[{}]", name, i));
                    if i == to { break }
                    i += step;
                }
                v
            }
        };
        names.into_iter().map(|name| {
            let id = PortId(self.ports.len());
            let pin = PinId(self.pins.len());
            self.pins.push(MemPin {
                name: name.clone(),
                owner: PinOwner::TopPort(id),
                direction,
                is_clock: false,
                net: None,
                inner: None,
            });
            self.ports.push(PortInfo { id, name, direction, pin });
            id
        }).collect()
    }

    pub fn port_pin(&self, port: PortId) -> PinId {
        self.ports[port.0].pin
    }

    pub fn add_net(&mut self, scope: InstId, name: &str) -> NetId {
        let id = NetId(self.nets.len());
        self.nets.push(MemNet {
            name: name.to_string(),
            scope,
            pins: Vec::new(),
            up_pins: Vec::new(),
            supply: false,
        });
        id
    }

    pub fn mark_supply(&mut self, net: NetId) {
        self.nets[net.0].supply = true;
    }

    fn new_inst(&mut self, parent: InstId, name: &str, cell: Option<String>) -> InstId {
        let p = &self.insts[parent.0];
        let path = match p.path.is_empty() {
            true => name.to_string(),
            false => format!("{}/{}", p.path, name),
        };
        let depth = p.depth + 1;
        let id = InstId(self.insts.len());
        self.insts.push(MemInst { path, depth, cell, pins: Vec::new() });
        id
    }

    /// Add a leaf instance of library cell `cell` under `parent`.
    ///
    /// The cell does not need to be in the library; such an instance
    /// is left unresolved.
    pub fn add_instance(&mut self, parent: InstId, name: &str, cell: &str,
                        pins: &[(&str, PinDirection)]) -> InstId {
        let id = self.new_inst(parent, name, Some(cell.to_string()));
        let clock_pins = self.cells.get(cell)
            .map(|c| c.clock_pins.clone())
            .unwrap_or_default();
        for &(pname, direction) in pins {
            let pin = PinId(self.pins.len());
            self.pins.push(MemPin {
                name: pname.to_string(),
                owner: PinOwner::Leaf(id),
                direction,
                is_clock: clock_pins.iter().any(|c| c == pname),
                net: None,
                inner: None,
            });
            self.insts[id.0].pins.push(pin);
        }
        id
    }

    /// Add a hierarchical instance under `parent`; its scope starts
    /// empty.
    pub fn add_hier_instance(&mut self, parent: InstId, name: &str) -> InstId {
        self.new_inst(parent, name, None)
    }

    /// Add a boundary pin to a hierarchical instance, joined to `inner`,
    /// a net of the instance's own scope.
    pub fn add_hier_pin(&mut self, inst: InstId, name: &str,
                        direction: PinDirection, inner: NetId) -> PinId {
        let pin = PinId(self.pins.len());
        self.pins.push(MemPin {
            name: name.to_string(),
            owner: PinOwner::Hierarchical(inst),
            direction,
            is_clock: false,
            net: None,
            inner: Some(inner),
        });
        self.insts[inst.0].pins.push(pin);
        self.nets[inner.0].up_pins.push(pin);
        pin
    }

    /// Connect a pin to a net of the scope it is seen from.
    pub fn connect(&mut self, pin: PinId, net: NetId) {
        if let Some(old) = self.pins[pin.0].net {
            self.nets[old.0].pins.retain(|&p| p != pin);
        }
        self.pins[pin.0].net = Some(net);
        self.nets[net.0].pins.push(pin);
    }

    /// Find a pin of an instance by name.
    pub fn pin(&self, inst: InstId, name: &str) -> Option<PinId> {
        self.insts.get(inst.0)?.pins.iter()
            .copied()
            .find(|p| self.pins[p.0].name == name)
    }

    /// Connect the pin `name` of `inst` to `net`.
    pub fn connect_pin(&mut self, inst: InstId, name: &str, net: NetId) -> Result<PinId> {
        let pin = self.pin(inst, name).ok_or_else(|| PartError::InvalidArgument(
            format!("instance {} has no pin {}", self.insts[inst.0].path, name)))?;
        self.connect(pin, net);
        Ok(pin)
    }

    pub fn set_constraints(&mut self, constraints: Constraints) {
        self.constraints = constraints;
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// All per-scope aliases of `net`, sorted by id.
    fn alias_group(&self, net: NetId) -> Vec<NetId> {
        let mut seen = vec![net];
        let mut queue = VecDeque::from([net]);
        while let Some(n) = queue.pop_front() {
            let node = &self.nets[n.0];
            let down = node.pins.iter().filter_map(|p| self.pins[p.0].inner);
            let up = node.up_pins.iter().filter_map(|p| self.pins[p.0].net);
            for m in down.chain(up).collect::<Vec<_>>() {
                if !seen.contains(&m) {
                    seen.push(m);
                    queue.push_back(m);
                }
            }
        }
        seen.sort();
        seen
    }
}

impl Default for MemDesign {
    fn default() -> Self {
        MemDesign::new()
    }
}

impl DesignEngine for MemDesign {
    fn is_linked(&self) -> bool {
        self.linked
    }

    fn top_ports(&self) -> Vec<PortInfo> {
        if !self.linked { return vec![] }
        self.ports.clone()
    }

    fn leaf_instances(&self) -> Vec<InstId> {
        if !self.linked { return vec![] }
        (1..self.insts.len())
            .filter(|&i| self.insts[i].cell.is_some())
            .map(InstId)
            .collect()
    }

    fn lib_cell(&self, inst: InstId) -> Option<&LibCellInfo> {
        let name = self.insts[inst.0].cell.as_ref()?;
        self.cells.get(name).map(|c| &c.info)
    }

    fn instance_name(&self, inst: InstId) -> String {
        self.insts[inst.0].path.clone()
    }

    fn instance_pins(&self, inst: InstId) -> Vec<PinId> {
        self.insts[inst.0].pins.clone()
    }

    fn pin_direction(&self, pin: PinId) -> PinDirection {
        self.pins[pin.0].direction
    }

    fn pin_owner(&self, pin: PinId) -> PinOwner {
        self.pins[pin.0].owner
    }

    fn pin_net(&self, pin: PinId) -> Option<NetId> {
        self.pins[pin.0].net
    }

    fn pin_is_clock(&self, pin: PinId) -> bool {
        self.pins[pin.0].is_clock
    }

    /// The alias in the shallowest scope, lowest id on ties.
    fn highest_connected_net(&self, net: NetId) -> NetId {
        self.alias_group(net).into_iter()
            .min_by_key(|n| (self.insts[self.nets[n.0].scope.0].depth, *n))
            .unwrap_or(net)
    }

    fn net_connected_pins(&self, net: NetId) -> Vec<PinId> {
        self.alias_group(net).into_iter()
            .flat_map(|n| self.nets[n.0].pins.iter().copied())
            .collect()
    }

    fn is_supply_net(&self, net: NetId) -> bool {
        self.alias_group(net).iter().any(|n| self.nets[n.0].supply)
    }

    fn net_name(&self, net: NetId) -> String {
        let n = &self.nets[net.0];
        let scope = &self.insts[n.scope.0].path;
        match scope.is_empty() {
            true => n.name.clone(),
            false => format!("{}/{}", scope, n.name),
        }
    }

    fn find_path_ends(&self, query: &PathQuery) -> Result<Vec<PathEnd>> {
        if !self.linked {
            return Err(PartError::EngineUnavailable("no design linked".into()))
        }
        sta::find_path_ends(self, &self.constraints, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PinDirection::*;

    fn cell(name: &str, area: f64, seq: bool) -> LibCellInfo {
        LibCellInfo {
            name: name.into(),
            area,
            is_sequential: seq,
            delay: if seq { 0.2 } else { 0.1 },
            setup: if seq { 0.05 } else { 0.0 },
            ..Default::default()
        }
    }

    /// top: a -> sub/u1 (BUF) -> b, with `sub` holding its own alias
    /// of both nets.
    fn nested() -> (MemDesign, NetId, NetId, NetId) {
        let mut d = MemDesign::new();
        d.add_cell(cell("BUF", 1.0, false), &[]);
        let a = d.add_port("a", Input, None)[0];
        let b = d.add_port("b", Output, None)[0];
        let na = d.add_net(TOP, "a");
        let nb = d.add_net(TOP, "b");
        d.connect(d.port_pin(a), na);
        d.connect(d.port_pin(b), nb);
        let sub = d.add_hier_instance(TOP, "sub");
        let inner_a = d.add_net(sub, "i");
        let inner_b = d.add_net(sub, "o");
        let hp = d.add_hier_pin(sub, "i", Input, inner_a);
        d.connect(hp, na);
        let hp = d.add_hier_pin(sub, "o", Output, inner_b);
        d.connect(hp, nb);
        let u1 = d.add_instance(sub, "u1", "BUF", &[("A", Input), ("Y", Output)]);
        d.connect_pin(u1, "A", inner_a).unwrap();
        d.connect_pin(u1, "Y", inner_b).unwrap();
        (d, na, inner_a, inner_b)
    }

    #[test]
    fn aliases_resolve_to_the_top_scope() {
        let (d, na, inner_a, inner_b) = nested();
        assert_eq!(d.highest_connected_net(inner_a), na);
        assert_eq!(d.highest_connected_net(na), na);
        assert_eq!(d.net_name(d.highest_connected_net(inner_b)), "b");
        assert_eq!(d.net_name(inner_b), "sub/o");
        // port pin, hierarchical pin, leaf pin.
        assert_eq!(d.net_connected_pins(inner_a).len(), 3);
        assert_eq!(d.instance_name(InstId(2)), "sub/u1");
    }

    #[test]
    fn bus_ports_expand_in_declared_order() {
        let mut d = MemDesign::new();
        let bits = d.add_port("data", Input, Some((3, 0)));
        assert_eq!(bits.len(), 4);
        let names: Vec<_> = d.top_ports().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["data[3]", "data[2]", "data[1]", "data[0]"]);
    }

    #[test]
    fn unresolved_and_hierarchical_instances() {
        let (mut d, _, _, _) = nested();
        let x = d.add_instance(TOP, "x", "MYSTERY", &[("Z", Output)]);
        let leaves = d.leaf_instances();
        assert_eq!(leaves.len(), 2);
        assert!(d.lib_cell(leaves[0]).is_some());
        assert!(d.lib_cell(x).is_none());
    }

    #[test]
    fn unlinked_design_is_empty() {
        let d = MemDesign::unlinked();
        assert!(!d.is_linked());
        assert!(d.top_ports().is_empty());
        assert!(d.leaf_instances().is_empty());
        assert!(matches!(d.find_path_ends(&PathQuery::setup(10)),
                         Err(PartError::EngineUnavailable(_))));
    }

    #[test]
    fn register_to_register_timing() {
        let mut d = MemDesign::new();
        d.add_cell(cell("BUF", 1.0, false), &[]);
        d.add_cell(cell("DFF", 4.0, true), &["CLK"]);
        let clk = d.add_port("clk", Input, None)[0];
        let nclk = d.add_net(TOP, "clk");
        d.connect(d.port_pin(clk), nclk);
        let r1 = d.add_instance(TOP, "r1", "DFF", &[("CLK", Input), ("D", Input), ("Q", Output)]);
        let u1 = d.add_instance(TOP, "u1", "BUF", &[("A", Input), ("Y", Output)]);
        let u2 = d.add_instance(TOP, "u2", "BUF", &[("A", Input), ("Y", Output)]);
        let r2 = d.add_instance(TOP, "r2", "DFF", &[("CLK", Input), ("D", Input), ("Q", Output)]);
        let n1 = d.add_net(TOP, "n1");
        let n2 = d.add_net(TOP, "n2");
        let n3 = d.add_net(TOP, "n3");
        let n4 = d.add_net(TOP, "n4");
        d.connect_pin(r1, "CLK", nclk).unwrap();
        d.connect_pin(r2, "CLK", nclk).unwrap();
        d.connect_pin(r1, "Q", n1).unwrap();
        d.connect_pin(u1, "A", n1).unwrap();
        d.connect_pin(u1, "Y", n2).unwrap();
        d.connect_pin(u2, "A", n2).unwrap();
        d.connect_pin(u2, "Y", n3).unwrap();
        d.connect_pin(r2, "D", n3).unwrap();
        d.connect_pin(r2, "Q", n4).unwrap();
        d.connect_pin(r1, "D", n4).unwrap();

        // unconstrained without a clock
        assert!(d.find_path_ends(&PathQuery::setup(10)).unwrap().is_empty());
        let all = d.find_path_ends(&PathQuery { max_paths: 10, include_unconstrained: true })
            .unwrap();
        assert_eq!(all.len(), 2);

        let mut c = Constraints::new();
        c.read_str("create_clock -period 1 [get_ports clk]", std::path::Path::new("t.sdc"))
            .unwrap();
        d.set_constraints(c);
        let paths = d.find_path_ends(&PathQuery::setup(10)).unwrap();
        assert_eq!(paths.len(), 2);
        // r1.Q -> u1 -> u2 -> r2.D: 1 - 0.05 - (0.2 + 0.1 + 0.1)
        assert!((paths[0].slack - 0.55).abs() < 1e-9);
        assert_eq!(paths[0].pins.len(), 6);
        assert_eq!(paths[0].pins.first(), d.pin(r1, "Q").as_ref());
        assert_eq!(paths[0].pins.last(), d.pin(r2, "D").as_ref());
        // r2.Q -> r1.D
        assert!((paths[1].slack - 0.75).abs() < 1e-9);
        assert_eq!(d.find_path_ends(&PathQuery::setup(1)).unwrap().len(), 1);
    }
}
