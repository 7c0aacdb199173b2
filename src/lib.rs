// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
pub mod error;

pub mod engine;

pub mod liberty;

pub mod sdc;

pub mod sta;

pub mod netlist;

pub mod memdesign;

pub mod adapter;

pub mod hypergraph;

pub mod builder;

pub mod timing;

pub mod partition;

pub mod evaluate;

pub mod solution;

pub mod session;
