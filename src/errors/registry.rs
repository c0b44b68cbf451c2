// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cluster::WorkerId;
use crate::processors::ProcessorTypeId;
use crate::scope::TaintTypeId;
use std::fmt;

/// Errors that can occur in the worker registry and extension tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A query or refresh named a worker that never joined (or already left)
    UnknownWorker {
        /// The worker that was asked about
        wid: WorkerId,
    },
    /// A custom registration used a tag reserved for built-in variants
    ReservedTag {
        /// The offending numeric tag
        tag: u16,
    },
    /// A processor variant tag was registered twice
    DuplicateProcessorVariant {
        /// The tag already present in the table
        tag: ProcessorTypeId,
    },
    /// A taint variant tag was registered twice
    DuplicateTaintVariant {
        /// The tag already present in the table
        tag: TaintTypeId,
    },
    /// A scope key was registered twice
    DuplicateScopeKey {
        /// The key already present in the table
        key: String,
    },
    /// A remote children enumeration could not be served
    ChildrenUnavailable {
        /// The worker whose children were requested
        wid: WorkerId,
        /// Transport-level detail, e.g. "rpc cancelled"
        reason: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownWorker { wid } => {
                write!(f, "Worker {} is not a cluster member", wid)
            }
            RegistryError::ReservedTag { tag } => {
                write!(f, "Tag {} is reserved for built-in variants", tag)
            }
            RegistryError::DuplicateProcessorVariant { tag } => {
                write!(f, "Processor variant {} is already registered", tag)
            }
            RegistryError::DuplicateTaintVariant { tag } => {
                write!(f, "Taint variant {} is already registered", tag)
            }
            RegistryError::DuplicateScopeKey { key } => {
                write!(f, "Scope key '{}' is already registered", key)
            }
            RegistryError::ChildrenUnavailable { wid, reason } => {
                write!(f, "Children of worker {} unavailable: {}", wid, reason)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
