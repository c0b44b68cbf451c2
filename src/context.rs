// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Explicit context for everything process-wide.
//!
//! The worker registry and the three extension tables are shared mutable
//! state, but they are never a hidden singleton: callers hold a
//! [`ClusterContext`] and pass it (or just its [`Extensions`]) to the
//! builder, the algebra and the wire codec. Tests instantiate independent
//! contexts and never interfere with each other.

use crate::cluster::WorkerRegistry;
use crate::processors::VariantRegistry;
use crate::scope::{KeyRegistry, TaintRegistry};

/// The process-wide extension tables: processor variants, taint variants
/// and scope-key handlers. Append-only during normal operation.
#[derive(Debug, Default)]
pub struct Extensions {
    pub processors: VariantRegistry,
    pub taints: TaintRegistry,
    pub scope_keys: KeyRegistry,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One scheduler's view of the cluster: membership plus extensions.
#[derive(Debug, Default)]
pub struct ClusterContext {
    pub workers: WorkerRegistry,
    pub extensions: Extensions,
}

impl ClusterContext {
    pub fn new() -> Self {
        Self::default()
    }
}
