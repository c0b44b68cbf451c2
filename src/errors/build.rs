// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for scope construction.
//!
//! Construction fails fast with a descriptive error; no partial scope is
//! ever returned. Conflicts *between* well-formed scopes are not errors at
//! all - they surface as invalid scopes from the meet.

use crate::cluster::{ThreadId, WorkerId};
use thiserror::Error;

/// Errors that can occur while building a scope from a user specification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeBuildError {
    /// The spec references a worker the registry does not know.
    #[error("unknown worker {0}")]
    UnknownWorker(WorkerId),

    /// A threads-only spec matched no processor on any known worker.
    #[error("no known worker exposes any of threads {0:?}")]
    UnknownThreads(Vec<ThreadId>),

    /// A positional or keyword union would have no members.
    #[error("a scope union needs at least one member")]
    EmptyUnion,

    /// An invalid scope was passed as a building block.
    #[error("an invalid scope cannot seed a new scope")]
    InvalidScopeInput,

    /// The spec contains keys with no registered handler.
    #[error("unrecognized scope keys: {}", .keys.join(", "))]
    UnrecognizedKeys { keys: Vec<String> },

    /// Two or more extension handlers tie at the maximum precedence.
    #[error("conflicting scope specifiers: {} tie at precedence {precedence}", .keys.join(", "))]
    ConflictingSpecifiers { keys: Vec<String>, precedence: i32 },

    /// A registered scope-key handler rejected the spec.
    #[error("scope-key handler '{key}' failed: {reason}")]
    Handler { key: String, reason: String },

    /// The spec source (YAML/JSON text or file) could not be parsed.
    #[error("failed to read scope spec: {0}")]
    Spec(String),
}
