// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::cluster::WorkerId;
use crate::errors::RegistryError;
use crate::processors::Processor;

/// Re-enumerates the processors attached to a worker.
///
/// This is the one operation in the core that may block: asking a remote
/// worker to describe itself is a cross-worker RPC. The registry serves
/// every read from its cached snapshot and only awaits a source when a
/// caller explicitly refreshes. Cancellation or transport failure surfaces
/// as [`RegistryError::ChildrenUnavailable`] and leaves the cache intact.
#[async_trait]
pub trait ChildrenSource: Send + Sync {
    async fn children(&self, wid: WorkerId) -> Result<Vec<Processor>, RegistryError>;
}
