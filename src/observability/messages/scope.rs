// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scope construction and wire transfer events.
//!
//! This module contains message types for logging events related to:
//! * Extension registration (processor variants, taints, scope keys)
//! * Scope-spec dispatch to extension handlers
//! * Wire decode degradation

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// An extension was registered in a process-wide table.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ExtensionRegistered<'a> {
    /// Which table: "processor", "taint", or "scope-key".
    pub table: &'a str,
    /// Tag or key the extension was registered under.
    pub entry: &'a str,
}

impl Display for ExtensionRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Registered {} extension '{}'", self.table, self.entry)
    }
}

impl StructuredLog for ExtensionRegistered<'_> {
    fn log(&self) {
        tracing::info!(
            table = self.table,
            entry = self.entry,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            table = self.table,
            entry = self.entry,
        )
    }
}

/// A scope spec with unrecognized keys was routed to an extension handler.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct SpecDispatched<'a> {
    pub key: &'a str,
    pub precedence: i32,
}

impl Display for SpecDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Scope spec dispatched to handler '{}' (precedence {})",
            self.key, self.precedence
        )
    }
}

impl StructuredLog for SpecDispatched<'_> {
    fn log(&self) {
        tracing::debug!(
            key = self.key,
            precedence = self.precedence,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::DEBUG,
            "span_name",
            name = name,
            key = self.key,
            precedence = self.precedence,
        )
    }
}

/// An incoming wire scope could not be decoded and was degraded to invalid.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct UnknownWireVariant<'a> {
    pub reason: &'a str,
}

impl Display for UnknownWireVariant<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Incoming scope degraded to invalid: {}",
            self.reason
        )
    }
}

impl StructuredLog for UnknownWireVariant<'_> {
    fn log(&self) {
        tracing::warn!(
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "span_name",
            name = name,
            reason = self.reason,
        )
    }
}
