// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Process-wide registry of cluster membership.
//!
//! Tracks which workers are members, which node each worker lives on, and
//! the snapshot of processors each worker published when it joined. The
//! scope builder and the algebra read this on every call; writers are the
//! cluster membership events (`worker_joined` / `worker_left`). Readers
//! proceed concurrently, a writer excludes all readers.
//!
//! All reads are answered from the cache and never block. The only
//! blocking path is [`WorkerRegistry::refresh_children`], which awaits a
//! [`ChildrenSource`] RPC and swaps the snapshot on success.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::cluster::{ChildrenSource, NodeUuid, WorkerId};
use crate::errors::RegistryError;
use crate::observability::messages::cluster::{ChildrenRefreshFailed, WorkerJoined, WorkerLeft};
use crate::observability::messages::StructuredLog;
use crate::processors::Processor;

#[derive(Debug, Clone)]
struct WorkerEntry {
    node: NodeUuid,
    children: Vec<Processor>,
}

/// Cluster membership: `WorkerId -> (NodeUuid, children snapshot)`.
///
/// A `BTreeMap` keeps worker iteration deterministic, which the builder
/// relies on when it expands a threads-only spec across every worker.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    state: RwLock<BTreeMap<WorkerId, WorkerEntry>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cluster membership in ascending worker-id order.
    pub fn workers(&self) -> Vec<WorkerId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// The host identity of a worker. `None` for unknown workers, which
    /// the builder turns into a construction error.
    pub fn node_uuid(&self, wid: WorkerId) -> Option<NodeUuid> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&wid)
            .map(|entry| entry.node)
    }

    /// The cached children snapshot of a worker.
    pub fn children(&self, wid: WorkerId) -> Option<Vec<Processor>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&wid)
            .map(|entry| entry.children.clone())
    }

    pub fn contains(&self, wid: WorkerId) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&wid)
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership event: a worker joined and published its processors.
    pub fn worker_joined(
        &self,
        wid: WorkerId,
        node: NodeUuid,
        children_snapshot: Vec<Processor>,
    ) {
        WorkerJoined {
            wid,
            node_uuid: node,
            processor_count: children_snapshot.len(),
        }
        .log();
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                wid,
                WorkerEntry {
                    node,
                    children: children_snapshot,
                },
            );
    }

    /// Membership event: a worker left. Scopes already built against it
    /// are detected as stale lazily, when the scheduler tries to resolve
    /// the worker again.
    pub fn worker_left(&self, wid: WorkerId) {
        WorkerLeft { wid }.log();
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&wid);
    }

    /// Re-enumerate a worker's processors through the given source and
    /// swap the cached snapshot.
    ///
    /// Failure (including a cancelled RPC) keeps the old snapshot and is
    /// reported to the caller; so is the worker leaving mid-refresh.
    pub async fn refresh_children(
        &self,
        wid: WorkerId,
        source: &dyn ChildrenSource,
    ) -> Result<(), RegistryError> {
        if !self.contains(wid) {
            return Err(RegistryError::UnknownWorker { wid });
        }

        let snapshot = match source.children(wid).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                ChildrenRefreshFailed {
                    wid,
                    reason: &err.to_string(),
                }
                .log();
                return Err(err);
            }
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.get_mut(&wid) {
            Some(entry) => {
                entry.children = snapshot;
                Ok(())
            }
            // Left while the RPC was in flight.
            None => Err(RegistryError::UnknownWorker { wid }),
        }
    }
}
