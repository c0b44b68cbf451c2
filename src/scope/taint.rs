// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deferred predicates on processors, and their evaluator.
//!
//! A taint is a predicate that cannot be resolved when the scope is
//! built - "default-enabled processors only", "this processor variant
//! only" - because both queries need a concrete processor in hand. Taints
//! ride inside a [`TaintScope`](crate::scope::TaintScope) until the meet
//! narrows the inner scope to one processor; only then is [`taint_match`]
//! called. Eager evaluation against all known processors would be wrong:
//! cluster membership can change between scope construction and
//! scheduling.

use crate::context::Extensions;
use crate::errors::RegistryError;
use crate::observability::messages::{scope::ExtensionRegistered, StructuredLog};
use crate::processors::{Processor, ProcessorTypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Stable numeric tag identifying a user taint variant. Same contract as
/// [`ProcessorTypeId`]: chosen at registration time, identical across the
/// cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaintTypeId(pub u16);

impl fmt::Display for TaintTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t#{}", self.0)
    }
}

/// A user taint: tag plus opaque payload, dispatched through the
/// [`TaintRegistry`]. Compared by bytes, like [`CustomProc`](crate::processors::CustomProc).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomTaint {
    pub kind: TaintTypeId,
    pub payload: Vec<u8>,
}

impl CustomTaint {
    pub fn new(kind: TaintTypeId, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }
}

/// A deferred predicate attached to a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Taint {
    /// Matches processors whose `default_enabled` verdict is true.
    DefaultEnabled,
    /// Matches processors of one concrete variant, irrespective of payload.
    ProcessorType(ProcessorTypeId),
    /// User variant, dispatched through the registration table.
    Custom(CustomTaint),
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Taint::DefaultEnabled => write!(f, "default-enabled"),
            Taint::ProcessorType(kind) => write!(f, "type={}", kind),
            Taint::Custom(custom) => write!(f, "{}", custom.kind),
        }
    }
}

/// Resolve one taint against one concrete processor.
///
/// Pure: everything it needs is carried by the processor value and the
/// extension tables. An unregistered custom taint matches nothing, so a
/// scope from a foreign scheduler degrades to invalid instead of erroring.
pub fn taint_match(taint: &Taint, proc: &Processor, ext: &Extensions) -> bool {
    match taint {
        Taint::DefaultEnabled => proc.default_enabled(&ext.processors),
        Taint::ProcessorType(kind) => proc.kind() == *kind,
        Taint::Custom(custom) => ext.taints.matches(custom, proc),
    }
}

type MatcherFn = Arc<dyn Fn(&CustomTaint, &Processor) -> bool + Send + Sync>;

struct TaintEntry {
    name: String,
    matcher: MatcherFn,
}

/// Process-wide table of user taint variants, keyed by tag.
/// Registration is publish-once, symmetric with processor variants.
#[derive(Default)]
pub struct TaintRegistry {
    inner: RwLock<HashMap<TaintTypeId, TaintEntry>>,
}

impl TaintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a taint matcher. Fails on already-bound tags.
    pub fn register<F>(
        &self,
        tag: TaintTypeId,
        name: impl Into<String>,
        matcher: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&CustomTaint, &Processor) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(&tag) {
            return Err(RegistryError::DuplicateTaintVariant { tag });
        }
        ExtensionRegistered {
            table: "taint",
            entry: &name,
        }
        .log();
        table.insert(
            tag,
            TaintEntry {
                name,
                matcher: Arc::new(matcher),
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, tag: TaintTypeId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&tag)
    }

    pub fn name_of(&self, tag: TaintTypeId) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tag)
            .map(|entry| entry.name.clone())
    }

    /// Dispatch a custom taint. False when the tag is not registered.
    pub fn matches(&self, taint: &CustomTaint, proc: &Processor) -> bool {
        let matcher = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&taint.kind)
            .map(|entry| entry.matcher.clone());
        match matcher {
            Some(matcher) => matcher(taint, proc),
            None => false,
        }
    }
}

impl fmt::Debug for TaintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&str> = table.values().map(|entry| entry.name.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("TaintRegistry")
            .field("registered", &names)
            .finish()
    }
}
