// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The design model adapter: a read view of an engine plus the net
//! canonicalization shared by hypergraph building and path mapping.

use crate::engine::{DesignEngine, InstId, LibCellInfo, NetId, PinId, PortInfo};
use std::collections::HashMap;

/// Memoized resolution of per-scope nets to their canonical identity.
#[derive(Debug, Default, Clone)]
pub struct NetCanonicalizer {
    cache: HashMap<NetId, NetId>,
}

impl NetCanonicalizer {
    pub fn new() -> NetCanonicalizer {
        Default::default()
    }

    /// Resolve `net` through the engine's highest-connected-net
    /// query. A canonical net resolves to itself.
    pub fn resolve<E: DesignEngine + ?Sized>(&mut self, engine: &E, net: NetId) -> NetId {
        if let Some(&c) = self.cache.get(&net) {
            return c
        }
        let c = engine.highest_connected_net(net);
        self.cache.insert(net, c);
        self.cache.entry(c).or_insert(c);
        c
    }

    pub fn num_cached(&self) -> usize {
        self.cache.len()
    }
}

/// A leaf instance together with its library data.
#[derive(Debug, Clone)]
pub struct LeafInstance {
    pub id: InstId,
    pub name: String,
    pub lib: LibCellInfo,
}

pub struct DesignAdapter<'e, E: DesignEngine + ?Sized> {
    engine: &'e E,
    canon: NetCanonicalizer,
}

impl<'e, E: DesignEngine + ?Sized> DesignAdapter<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        DesignAdapter::with_canonicalizer(engine, NetCanonicalizer::new())
    }

    /// Resume with the cache of an earlier adapter over the same
    /// engine.
    pub fn with_canonicalizer(engine: &'e E, canon: NetCanonicalizer) -> Self {
        DesignAdapter { engine, canon }
    }

    pub fn into_canonicalizer(self) -> NetCanonicalizer {
        self.canon
    }

    #[inline]
    pub fn engine(&self) -> &'e E {
        self.engine
    }

    pub fn is_linked(&self) -> bool {
        self.engine.is_linked()
    }

    /// Top-level port bits. Empty if no design is linked.
    pub fn ports(&self) -> Vec<PortInfo> {
        if !self.is_linked() {
            return vec![]
        }
        self.engine.top_ports()
    }

    /// Leaf instances with library data, and the number of leaf
    /// instances skipped for lacking it.
    pub fn leaf_instances(&self) -> (Vec<LeafInstance>, usize) {
        if !self.is_linked() {
            return (vec![], 0)
        }
        let mut skipped = 0;
        let mut ret = Vec::new();
        for id in self.engine.leaf_instances() {
            match self.engine.lib_cell(id) {
                Some(lib) => ret.push(LeafInstance {
                    id,
                    name: self.engine.instance_name(id),
                    lib: lib.clone(),
                }),
                None => {
                    clilog::debug!("instance {} has no library cell, skipped",
                                   self.engine.instance_name(id));
                    skipped += 1;
                }
            }
        }
        (ret, skipped)
    }

    pub fn instance_pins(&self, inst: InstId) -> Vec<PinId> {
        self.engine.instance_pins(inst)
    }

    #[inline]
    pub fn canonical(&mut self, net: NetId) -> NetId {
        self.canon.resolve(self.engine, net)
    }

    /// The canonical net a pin connects to.
    pub fn pin_canonical_net(&mut self, pin: PinId) -> Option<NetId> {
        let net = self.engine.pin_net(pin)?;
        Some(self.canonical(net))
    }
}
