// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod ids;
mod registry;
mod source;

pub use ids::{NodeUuid, ThreadId, WorkerId};
pub use registry::WorkerRegistry;
pub use source::ChildrenSource;
