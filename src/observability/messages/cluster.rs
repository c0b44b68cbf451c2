// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for cluster membership events.
//!
//! This module contains message types for logging events related to:
//! * Worker join and leave
//! * Children snapshot refresh failures

use crate::cluster::{NodeUuid, WorkerId};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A worker joined the cluster and published its processor snapshot.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerJoined {
    pub wid: WorkerId,
    pub node_uuid: NodeUuid,
    pub processor_count: usize,
}

impl Display for WorkerJoined {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker {} joined on node {} with {} processors",
            self.wid, self.node_uuid, self.processor_count
        )
    }
}

impl StructuredLog for WorkerJoined {
    fn log(&self) {
        tracing::info!(
            wid = %self.wid,
            node_uuid = %self.node_uuid,
            processor_count = self.processor_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            wid = %self.wid,
            node_uuid = %self.node_uuid,
            processor_count = self.processor_count,
        )
    }
}

/// A worker left the cluster; scopes referencing it become stale.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerLeft {
    pub wid: WorkerId,
}

impl Display for WorkerLeft {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker {} left the cluster", self.wid)
    }
}

impl StructuredLog for WorkerLeft {
    fn log(&self) {
        tracing::info!(
            wid = %self.wid,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            wid = %self.wid,
        )
    }
}

/// A remote children enumeration failed; the cached snapshot is kept.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct ChildrenRefreshFailed<'a> {
    pub wid: WorkerId,
    pub reason: &'a str,
}

impl Display for ChildrenRefreshFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to refresh children of worker {}: {}",
            self.wid, self.reason
        )
    }
}

impl StructuredLog for ChildrenRefreshFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            wid = %self.wid,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "span_name",
            name = name,
            wid = %self.wid,
            reason = self.reason,
        )
    }
}
