// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Error types shared by the loaders and the partitioning pipeline.
//!
//! Only engine-level and load-level failures are errors. Structural
//! anomalies found while extracting the hypergraph (driverless nets,
//! single-endpoint nets, cells without library data) are counted in
//! [`crate::builder::BuildStats`] and logged instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartError {
    /// The design/timing engine cannot serve queries, e.g. no design
    /// has been linked yet.
    #[error("design engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A library, netlist or constraints file failed to read or link.
    #[error("failed to load {what} from {}: {reason}", path.display())]
    LoadFailure {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PartError>;

impl PartError {
    pub(crate) fn load(what: &'static str, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PartError::LoadFailure {
            what,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
