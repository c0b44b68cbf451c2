// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging and distributed tracing.
//!
//! Each message type implements:
//!
//! * `Display` - human-readable output (supports future i18n)
//! * [`StructuredLog`] - machine-readable fields + span creation
//!
//! # Usage
//!
//! ```rust
//! use gridscope::observability::messages::{StructuredLog, cluster::WorkerLeft};
//! use gridscope::cluster::WorkerId;
//!
//! let msg = WorkerLeft { wid: WorkerId(4) };
//!
//! // Human-readable only:
//! tracing::info!("{}", msg);
//!
//! // Human-readable message AND structured fields:
//! msg.log();
//! ```

pub mod cluster;
pub mod scope;

use tracing::Span;

/// Trait for messages that support structured logging and tracing.
///
/// `log()` emits an event carrying both the `Display` rendering and the
/// message's fields, at the level matching the message's semantics.
/// `span()` creates a `tracing::Span` with the same fields as attributes,
/// for callers that want the message to scope a unit of work.
pub trait StructuredLog {
    /// Emit a log event with structured fields.
    fn log(&self);

    /// Create a span with this message's fields as attributes.
    fn span(&self, name: &str) -> Span;
}
