// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The narrow query interface to a design/timing engine.
//!
//! Everything the extraction pipeline needs from a loaded design goes
//! through [`DesignEngine`]. Object identities are dense engine-side
//! indices wrapped in newtypes, so that instance, pin, port and net
//! indices can never be mixed up.

use crate::error::Result;
use serde::{Deserialize, Serialize};

macro_rules! engine_id {
    ($($(#[$m:meta])* $name:ident),* $(,)?) => {$(
        $(#[$m])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub fn index(self) -> usize { self.0 }
        }
    )*}
}

engine_id! {
    /// A single bit of a top-level port.
    PortId,
    /// An instance (leaf or hierarchical).
    InstId,
    /// A pin of an instance or of the top-level design.
    PinId,
    /// A net inside one hierarchy scope.
    NetId,
}

/// Pin or port direction.
///
/// For top-level ports this is the declared direction seen from
/// outside the design, i.e. an `Input` port drives into the design.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    Input,
    Output,
    Inout,
    Unknown,
}

impl PinDirection {
    #[inline]
    pub fn is_output(self) -> bool {
        self == PinDirection::Output
    }

    #[inline]
    pub fn is_input(self) -> bool {
        self == PinDirection::Input
    }
}

/// What a pin belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PinOwner {
    /// A pin of a leaf (library) instance.
    Leaf(InstId),
    /// The pin of a top-level port bit.
    TopPort(PortId),
    /// A boundary pin of a hierarchical instance.
    Hierarchical(InstId),
}

/// Library data attached to a leaf cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibCellInfo {
    pub name: String,
    pub area: f64,
    pub is_sequential: bool,
    pub is_macro: bool,
    /// Worst intrinsic input-to-output (or clock-to-output) delay.
    pub delay: f64,
    /// Worst setup requirement of the data pins of a sequential cell.
    pub setup: f64,
}

/// One bit of a top-level port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub id: PortId,
    /// Bit name, e.g. `data[3]`.
    pub name: String,
    pub direction: PinDirection,
    pub pin: PinId,
}

/// Parameters of a critical path search.
///
/// Only maximum-delay (setup) checks are searched, with at most one
/// path per endpoint, sorted by ascending slack.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PathQuery {
    /// Maximum number of paths over the whole design.
    pub max_paths: usize,
    /// Whether to report endpoints without a timing requirement.
    pub include_unconstrained: bool,
}

impl PathQuery {
    pub fn setup(max_paths: usize) -> PathQuery {
        PathQuery { max_paths, include_unconstrained: false }
    }
}

/// One path returned by a critical path search.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEnd {
    /// Traversed pins, from the startpoint to the endpoint.
    pub pins: Vec<PinId>,
    pub slack: f64,
}

/// A loaded (and possibly linked) design with timing information.
pub trait DesignEngine {
    /// Whether a top-level design is linked. All enumerations are
    /// empty otherwise.
    fn is_linked(&self) -> bool;

    /// Top-level port bits, buses expanded, in declaration order.
    fn top_ports(&self) -> Vec<PortInfo>;

    /// All leaf instances across the hierarchy, in a stable order.
    fn leaf_instances(&self) -> Vec<InstId>;

    /// Library data of a leaf instance, if its cell is in the library.
    fn lib_cell(&self, inst: InstId) -> Option<&LibCellInfo>;

    /// Full hierarchical path name of an instance.
    fn instance_name(&self, inst: InstId) -> String;

    fn instance_pins(&self, inst: InstId) -> Vec<PinId>;

    fn pin_direction(&self, pin: PinId) -> PinDirection;

    fn pin_owner(&self, pin: PinId) -> PinOwner;

    /// The net a pin connects to, in the pin's own scope.
    fn pin_net(&self, pin: PinId) -> Option<NetId>;

    /// Whether the pin is a clock pin of a sequential cell.
    fn pin_is_clock(&self, _pin: PinId) -> bool {
        false
    }

    /// Resolve a net to the representative of all its hierarchical
    /// aliases. Must be idempotent.
    fn highest_connected_net(&self, net: NetId) -> NetId;

    /// Every pin electrically connected to `net`, across the whole
    /// hierarchy, including hierarchical boundary pins.
    fn net_connected_pins(&self, net: NetId) -> Vec<PinId>;

    /// Whether the net is a power or ground net.
    fn is_supply_net(&self, net: NetId) -> bool;

    fn net_name(&self, net: NetId) -> String;

    /// Search the worst paths of the design.
    fn find_path_ends(&self, query: &PathQuery) -> Result<Vec<PathEnd>>;
}
