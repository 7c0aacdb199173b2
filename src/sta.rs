// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! A lumped-delay static timing analysis over any [`DesignEngine`].
//!
//! Each library cell contributes one worst-case delay on all of its
//! input-to-output arcs, wires are free, and all sequential elements
//! share the tightest clock period. Only setup checks are computed.
//! This is enough to rank endpoints for partitioning, and nothing more.

use crate::engine::{DesignEngine, NetId, PathEnd, PathQuery, PinDirection, PinId, PinOwner};
use crate::error::Result;
use crate::sdc::Constraints;
use indexmap::IndexSet;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy)]
struct Arc {
    to: usize,
    delay: f64,
}

/// A timing endpoint and how much of the period it leaves to data.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    node: usize,
    /// Subtracted from the period to get the required time.
    margin: f64,
}

/// The pin-level timing graph of a design.
struct TimingGraph {
    pins: IndexSet<PinId>,
    arcs: Vec<Vec<Arc>>,
    /// Startpoints with their launch arrival time.
    starts: Vec<(usize, f64)>,
    endpoints: Vec<Endpoint>,
}

impl TimingGraph {
    fn node(&mut self, pin: PinId) -> usize {
        let (idx, inserted) = self.pins.insert_full(pin);
        if inserted {
            self.arcs.push(Vec::new());
        }
        idx
    }

    fn add_arc(&mut self, from: PinId, to: PinId, delay: f64) {
        let f = self.node(from);
        let t = self.node(to);
        self.arcs[f].push(Arc { to: t, delay });
    }

    /// Zero-delay arcs from every driver to every sink of the net
    /// `pin` connects to, once per canonical net.
    fn add_net_arcs<E: DesignEngine + ?Sized>(
        &mut self, engine: &E, pin: PinId, visited: &mut HashSet<NetId>
    ) {
        let Some(net) = engine.pin_net(pin) else { return };
        let net = engine.highest_connected_net(net);
        if !visited.insert(net) || engine.is_supply_net(net) {
            return
        }
        let mut drivers = Vec::new();
        let mut sinks = Vec::new();
        for p in engine.net_connected_pins(net) {
            let dir = engine.pin_direction(p);
            match engine.pin_owner(p) {
                PinOwner::Leaf(_) if dir.is_output() => drivers.push(p),
                PinOwner::Leaf(_) => sinks.push(p),
                PinOwner::TopPort(_) if dir.is_input() => drivers.push(p),
                PinOwner::TopPort(_) => sinks.push(p),
                PinOwner::Hierarchical(_) => {}
            }
        }
        for &d in &drivers {
            for &s in &sinks {
                self.add_arc(d, s, 0.0);
            }
        }
    }

    fn build<E: DesignEngine + ?Sized>(engine: &E, constraints: &Constraints) -> TimingGraph {
        let mut g = TimingGraph {
            pins: IndexSet::new(),
            arcs: Vec::new(),
            starts: Vec::new(),
            endpoints: Vec::new(),
        };

        let mut visited_nets = HashSet::new();
        for port in engine.top_ports() {
            let node = g.node(port.pin);
            g.add_net_arcs(engine, port.pin, &mut visited_nets);
            match port.direction {
                PinDirection::Input => {
                    if constraints.is_clock_source(&port.name) {
                        continue
                    }
                    let delay = constraints.input_delays.get(&port.name)
                        .copied().unwrap_or(0.0);
                    g.starts.push((node, delay));
                },
                PinDirection::Output => {
                    let delay = constraints.output_delays.get(&port.name)
                        .copied().unwrap_or(0.0);
                    g.endpoints.push(Endpoint { node, margin: delay });
                },
                _ => {}
            }
        }

        for inst in engine.leaf_instances() {
            let pins = engine.instance_pins(inst);
            for &pin in &pins {
                g.node(pin);
                g.add_net_arcs(engine, pin, &mut visited_nets);
            }

            let Some(cell) = engine.lib_cell(inst) else { continue };
            let (outputs, inputs): (Vec<PinId>, Vec<PinId>) = pins.iter()
                .partition(|&&p| engine.pin_direction(p).is_output());
            if cell.is_sequential {
                for &o in &outputs {
                    let node = g.node(o);
                    g.starts.push((node, cell.delay));
                }
                for &i in &inputs {
                    if engine.pin_is_clock(i) {
                        continue
                    }
                    let node = g.node(i);
                    g.endpoints.push(Endpoint { node, margin: cell.setup });
                }
            }
            else {
                for &i in &inputs {
                    for &o in &outputs {
                        g.add_arc(i, o, cell.delay);
                    }
                }
            }
        }
        g
    }

    /// Latest arrival time and its predecessor for every pin, in
    /// topological order. Pins on or behind a loop stay unreached.
    fn propagate(&self) -> (Vec<Option<f64>>, Vec<Option<usize>>) {
        let n = self.pins.len();
        let mut indeg = vec![0usize; n];
        for arcs in &self.arcs {
            for a in arcs {
                indeg[a.to] += 1;
            }
        }
        let mut arrival = vec![None; n];
        let mut pred = vec![None; n];
        for &(node, t) in &self.starts {
            arrival[node] = Some(t);
        }
        let mut queue = (0..n).filter(|&i| indeg[i] == 0).collect::<VecDeque<_>>();
        let mut num_visited = 0;
        while let Some(u) = queue.pop_front() {
            num_visited += 1;
            for a in &self.arcs[u] {
                if let Some(t) = arrival[u] {
                    let t = t + a.delay;
                    if arrival[a.to].map_or(true, |old| t > old) {
                        arrival[a.to] = Some(t);
                        pred[a.to] = Some(u);
                    }
                }
                indeg[a.to] -= 1;
                if indeg[a.to] == 0 {
                    queue.push_back(a.to);
                }
            }
        }
        if num_visited < n {
            clilog::warn!("timing graph has combinational loops: \
                           {} of {} pins not timed", n - num_visited, n);
            // arrivals set before the loop was hit are incomplete.
            for (i, d) in indeg.iter().enumerate() {
                if *d != 0 {
                    arrival[i] = None;
                }
            }
        }
        (arrival, pred)
    }

    fn trace(&self, pred: &[Option<usize>], end: usize) -> Vec<PinId> {
        let mut nodes = vec![end];
        let mut cur = end;
        while let Some(p) = pred[cur] {
            nodes.push(p);
            cur = p;
        }
        nodes.iter().rev()
            .filter_map(|&i| self.pins.get_index(i).copied())
            .collect()
    }
}

/// Search the worst setup paths of a design, one per endpoint, sorted
/// by ascending slack.
///
/// Without any clock every endpoint is unconstrained, reported with
/// infinite slack only when the query asks for unconstrained paths.
pub fn find_path_ends<E: DesignEngine + ?Sized>(
    engine: &E, constraints: &Constraints, query: &PathQuery
) -> Result<Vec<PathEnd>> {
    let timer = clilog::stimer!("lumped sta");
    let g = TimingGraph::build(engine, constraints);
    let (arrival, pred) = g.propagate();
    let period = constraints.min_period();
    if period.is_none() {
        clilog::debug!("no clock defined, all endpoints unconstrained");
    }

    let mut ends = Vec::new();
    for ep in &g.endpoints {
        let Some(at) = arrival[ep.node] else { continue };
        let slack = match period {
            Some(p) => p - ep.margin - at,
            None if query.include_unconstrained => f64::INFINITY,
            None => continue,
        };
        ends.push((slack, ep.node));
    }
    ends.sort_by(|a, b| a.0.total_cmp(&b.0));
    ends.truncate(query.max_paths);
    clilog::debug!("sta: {} pins, {} startpoints, {} endpoints, {} paths",
                   g.pins.len(), g.starts.len(), g.endpoints.len(), ends.len());
    let ret = ends.into_iter()
        .map(|(slack, node)| PathEnd { pins: g.trace(&pred, node), slack })
        .collect();
    clilog::finish!(timer);
    Ok(ret)
}
