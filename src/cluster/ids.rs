// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Identity newtypes for the cluster topology.
//!
//! A cluster is a set of physical hosts (nodes), each running one or more
//! OS processes (workers), each exposing processors. The scheduler refers
//! to every layer by value, so all three identifiers are small `Copy`
//! types that serialize transparently.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one OS process participating in the cluster.
///
/// Worker ids are assigned by the cluster membership layer and are unique
/// across the cluster for the lifetime of the process. Two workers on the
/// same host share a [`NodeUuid`] but never a `WorkerId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

impl From<u64> for WorkerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifies one OS thread within a worker.
///
/// Thread ids are only meaningful relative to their owning worker; the
/// pair `(WorkerId, ThreadId)` names a thread cluster-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl From<u32> for ThreadId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Stable identifier of a physical (or virtual) host.
///
/// Equal across all workers on the same host. Populated once when a worker
/// joins and never rewritten for the lifetime of that worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeUuid(Uuid);

impl NodeUuid {
    /// Mint a fresh host identity. Called once per host at cluster join.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
