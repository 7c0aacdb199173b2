// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The design engine for gate-level structural Verilog.
//!
//! Netlists are read and flattened by netlistdb, pin directions and
//! cell data come from Liberty, and timing from the lumped STA in
//! [`crate::sta`] under the SDC constraints.

use crate::engine::*;
use crate::error::{PartError, Result};
use crate::liberty::CellLibrary;
use crate::sdc::Constraints;
use crate::sta;
use compact_str::CompactString;
use netlistdb::{Direction, GeneralHierName, GeneralPinName, LeafPinProvider, NetlistDB};
use std::path::Path;
use sverilogparse::SVerilogRange;

/// Net names treated as power/ground even without Liberty `pg_pin`s.
const SUPPLY_NET_NAMES: &[&str] = &[
    "VDD", "VSS", "VPWR", "VGND", "VCC", "GND", "VNB", "VPB",
];

/// Supplies netlistdb with pin directions and bus widths of the
/// loaded Liberty cells.
///
/// netlistdb only knows inputs and outputs, so inout and unknown pins
/// are read as inputs.
pub struct LibertyLeafPins<'a>(pub &'a CellLibrary);

impl LeafPinProvider for LibertyLeafPins<'_> {
    fn direction_of(
        &self,
        macro_name: &CompactString,
        pin_name: &CompactString, pin_idx: Option<isize>
    ) -> Direction {
        match self.0.pin(macro_name, pin_name).map(|p| p.direction) {
            Some(PinDirection::Output) => Direction::O,
            Some(_) => Direction::I,
            None => {
                clilog::warn!(LIB_PIN_UNKNOWN,
                              "pin {}.{}{} not found in library, assumed input",
                              macro_name, pin_name,
                              pin_idx.map(|i| format!("[{}]", i)).unwrap_or_default());
                Direction::I
            }
        }
    }

    fn width_of(
        &self,
        macro_name: &CompactString,
        pin_name: &CompactString
    ) -> Option<SVerilogRange> {
        let (from, to) = self.0.pin(macro_name, pin_name)?.range?;
        Some(SVerilogRange(from, to))
    }
}

/// A loaded netlist and what we derive from it once.
struct Linked {
    db: NetlistDB,
    ports: Vec<PortInfo>,
    pin2port: Vec<Option<PortId>>,
    supply_nets: Vec<bool>,
}

/// Liberty + Verilog + SDC, with lumped timing.
pub struct NetlistEngine {
    library: CellLibrary,
    constraints: Constraints,
    linked: Option<Linked>,
}

impl Default for NetlistEngine {
    fn default() -> Self {
        NetlistEngine::new()
    }
}

impl NetlistEngine {
    pub fn new() -> NetlistEngine {
        NetlistEngine {
            library: CellLibrary::new(),
            constraints: Constraints::new(),
            linked: None,
        }
    }

    pub fn library(&self) -> &CellLibrary {
        &self.library
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Read a Liberty library. May be called repeatedly; cells merge.
    pub fn read_liberty(&mut self, path: &Path) -> Result<()> {
        self.library.read_file(path)?;
        Ok(())
    }

    /// Read a structural Verilog netlist and link `top` (or the only
    /// top module). Replaces any previously linked design.
    pub fn read_netlist(&mut self, path: &Path, top: Option<&str>) -> Result<()> {
        if self.library.is_empty() {
            return Err(PartError::load(
                "netlist", path, "no liberty library loaded, read one first"))
        }
        if !path.exists() {
            return Err(PartError::load("netlist", path, "file not found"))
        }
        let timer = clilog::stimer!("read netlist");
        let db = NetlistDB::from_sverilog_file(
            path, top, &LibertyLeafPins(&self.library)
        ).ok_or_else(|| PartError::load("netlist", path, "cannot build netlist"))?;
        clilog::finish!(timer);
        clilog::info!("netlist {} linked: {} cells, {} pins, {} nets",
                      db.name, db.num_cells, db.num_pins, db.num_nets);
        let linked = self.derive(db);
        self.linked = Some(linked);
        Ok(())
    }

    /// Read SDC constraints, merging with those already loaded.
    pub fn read_sdc(&mut self, path: &Path) -> Result<()> {
        self.constraints.read_file(path)
    }

    fn derive(&self, db: NetlistDB) -> Linked {
        let mut ports = Vec::new();
        let mut pin2port = vec![None; db.num_pins];
        for pin in 0..db.num_pins {
            if db.pin2cell[pin] != 0 {
                continue
            }
            let (_, name, idx) = &db.pinnames[pin];
            let name = match idx {
                Some(i) => format!("{}[{}]", name, i),
                None => name.to_string(),
            };
            // a top-level input drives its net, hence the output
            // direction inside netlistdb.
            let direction = match db.pindirect[pin] {
                Direction::O => PinDirection::Input,
                Direction::I => PinDirection::Output,
                Direction::Unknown => PinDirection::Unknown,
            };
            let id = PortId(ports.len());
            pin2port[pin] = Some(id);
            ports.push(PortInfo { id, name, direction, pin: PinId(pin) });
        }

        let mut supply_nets = vec![false; db.num_nets];
        for (net, supply) in supply_nets.iter_mut().enumerate() {
            let local = db.netnames[net].1.to_uppercase();
            *supply = SUPPLY_NET_NAMES.contains(&local.as_str())
                || db.net2pin.iter_set(net).any(|pin| {
                    let cell = db.pin2cell[pin];
                    cell != 0 && self.library
                        .pin(&db.celltypes[cell], &db.pinnames[pin].1)
                        .map_or(false, |p| p.is_supply)
                });
        }
        let num_supply = supply_nets.iter().filter(|s| **s).count();
        if num_supply > 0 {
            clilog::debug!("{} supply nets", num_supply);
        }
        Linked { db, ports, pin2port, supply_nets }
    }

    /// The Liberty pin behind a leaf pin.
    fn lib_pin(&self, l: &Linked, pin: usize) -> Option<&crate::liberty::LibPin> {
        let cell = l.db.pin2cell[pin];
        if cell == 0 {
            return None
        }
        self.library.pin(&l.db.celltypes[cell], &l.db.pinnames[pin].1)
    }
}

impl DesignEngine for NetlistEngine {
    fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    fn top_ports(&self) -> Vec<PortInfo> {
        self.linked.as_ref().map(|l| l.ports.clone()).unwrap_or_default()
    }

    fn leaf_instances(&self) -> Vec<InstId> {
        match &self.linked {
            Some(l) => (1..l.db.num_cells).map(InstId).collect(),
            None => vec![],
        }
    }

    fn lib_cell(&self, inst: InstId) -> Option<&LibCellInfo> {
        let l = self.linked.as_ref()?;
        let cell = self.library.cell(&l.db.celltypes[inst.0])?;
        Some(&cell.info)
    }

    fn instance_name(&self, inst: InstId) -> String {
        match &self.linked {
            Some(l) => l.db.cellnames[inst.0].dbg_fmt_hier().to_string(),
            None => String::new(),
        }
    }

    fn instance_pins(&self, inst: InstId) -> Vec<PinId> {
        match &self.linked {
            Some(l) => l.db.cell2pin.iter_set(inst.0).map(PinId).collect(),
            None => vec![],
        }
    }

    fn pin_direction(&self, pin: PinId) -> PinDirection {
        let Some(l) = &self.linked else { return PinDirection::Unknown };
        if let Some(port) = l.pin2port[pin.0] {
            return l.ports[port.0].direction
        }
        match self.lib_pin(l, pin.0) {
            Some(p) => p.direction,
            None => match l.db.pindirect[pin.0] {
                Direction::I => PinDirection::Input,
                Direction::O => PinDirection::Output,
                Direction::Unknown => PinDirection::Unknown,
            }
        }
    }

    fn pin_owner(&self, pin: PinId) -> PinOwner {
        let Some(l) = &self.linked else { return PinOwner::Leaf(InstId(0)) };
        match l.pin2port[pin.0] {
            Some(port) => PinOwner::TopPort(port),
            None => PinOwner::Leaf(InstId(l.db.pin2cell[pin.0])),
        }
    }

    fn pin_net(&self, pin: PinId) -> Option<NetId> {
        let l = self.linked.as_ref()?;
        Some(NetId(l.db.pin2net[pin.0]))
    }

    fn pin_is_clock(&self, pin: PinId) -> bool {
        self.linked.as_ref()
            .and_then(|l| self.lib_pin(l, pin.0))
            .map_or(false, |p| p.is_clock)
    }

    /// netlistdb already merges nets across hierarchy levels.
    fn highest_connected_net(&self, net: NetId) -> NetId {
        net
    }

    fn net_connected_pins(&self, net: NetId) -> Vec<PinId> {
        match &self.linked {
            Some(l) => l.db.net2pin.iter_set(net.0).map(PinId).collect(),
            None => vec![],
        }
    }

    fn is_supply_net(&self, net: NetId) -> bool {
        self.linked.as_ref().map_or(false, |l| l.supply_nets[net.0])
    }

    fn net_name(&self, net: NetId) -> String {
        match &self.linked {
            Some(l) => format!("{}", l.db.netnames[net.0].dbg_fmt_pin()),
            None => String::new(),
        }
    }

    fn find_path_ends(&self, query: &PathQuery) -> Result<Vec<PathEnd>> {
        if self.linked.is_none() {
            return Err(PartError::EngineUnavailable("no netlist linked".into()))
        }
        sta::find_path_ends(self, &self.constraints, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netlist_requires_a_library() {
        let mut e = NetlistEngine::new();
        let err = e.read_netlist(Path::new("missing.v"), None).unwrap_err();
        assert!(matches!(err, PartError::LoadFailure { what: "netlist", .. }));
        assert!(!e.is_linked());
        assert!(e.top_ports().is_empty());
        assert!(matches!(e.find_path_ends(&PathQuery::setup(1)),
                         Err(PartError::EngineUnavailable(_))));
    }

    #[test]
    fn leaf_pins_follow_liberty() {
        let mut lib = CellLibrary::new();
        lib.read_str(r#"
library (t) {
  type (b2) { bit_from : 1 ; bit_to : 0 ; }
  cell (MUX) {
    pin (S) { direction : input ; }
    bus (D) { bus_type : b2 ; direction : input ; }
    pin (Y) { direction : output ; }
    pin (IO) { direction : inout ; }
  }
}"#, Path::new("t.lib")).unwrap();
        let pins = LibertyLeafPins(&lib);
        let m = CompactString::from("MUX");
        assert_eq!(pins.direction_of(&m, &"Y".into(), None), Direction::O);
        assert_eq!(pins.direction_of(&m, &"IO".into(), None), Direction::I);
        assert_eq!(pins.direction_of(&m, &"D".into(), Some(1)), Direction::I);
        assert_eq!(pins.direction_of(&m, &"NOPE".into(), None), Direction::I);
        assert!(pins.width_of(&m, &"S".into()).is_none());
        let w = pins.width_of(&m, &"D".into()).unwrap();
        assert_eq!((w.0, w.1), (1, 0));
    }
}
