// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for the scope wire form.
//!
//! Decode errors are recoverable by design: schedulers receiving a scope
//! they cannot decode treat it as invalid against any local scope rather
//! than aborting (see `scope::wire::decode_scope_lossy`).

use crate::processors::ProcessorTypeId;
use crate::scope::TaintTypeId;
use thiserror::Error;

/// Errors that can occur encoding or decoding the scope wire form.
#[derive(Error, Debug)]
pub enum WireError {
    /// The byte body is not a well-formed wire scope.
    #[error("malformed wire scope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The scope variant tag is from a newer or foreign scheduler.
    #[error("unknown scope variant tag {0}")]
    UnknownScopeTag(u64),

    /// The embedded processor's variant is not registered locally.
    #[error("unknown processor variant {0}")]
    UnknownProcessorVariant(ProcessorTypeId),

    /// The embedded taint's variant is not registered locally.
    #[error("unknown taint variant {0}")]
    UnknownTaintVariant(TaintTypeId),

    /// A required field is missing or carries the wrong shape.
    #[error("wire scope field '{0}' missing or mistyped")]
    Field(&'static str),

    /// An opaque processor payload failed base64 decoding.
    #[error("invalid processor payload: {0}")]
    Payload(#[from] base64::DecodeError),
}
