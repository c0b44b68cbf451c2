// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Registration table for user processor variants.
//!
//! Callers extend the processor hierarchy by registering a [`VariantSpec`]
//! under a stable numeric tag: a `default_enabled` verdict plus optional
//! `children` and `parent` hooks. Registration is publish-once - a tag is
//! never rebound during normal operation - and the table is append-only,
//! so readers hold the shared lock only long enough to copy the entry.

use crate::errors::RegistryError;
use crate::observability::messages::{scope::ExtensionRegistered, StructuredLog};
use crate::processors::{CustomProc, Processor, ProcessorTypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type ChildrenFn = Arc<dyn Fn(&CustomProc) -> Vec<Processor> + Send + Sync>;
type ParentFn = Arc<dyn Fn(&CustomProc) -> Processor + Send + Sync>;

/// Everything the core needs to know about one user processor variant.
#[derive(Clone)]
pub struct VariantSpec {
    name: String,
    default_enabled: bool,
    children: Option<ChildrenFn>,
    parent: Option<ParentFn>,
}

impl VariantSpec {
    /// A variant with no hooks: just a name and a `default_enabled` verdict.
    pub fn new(name: impl Into<String>, default_enabled: bool) -> Self {
        Self {
            name: name.into(),
            default_enabled,
            children: None,
            parent: None,
        }
    }

    /// Attach a children hook for variants that host sub-processors.
    pub fn with_children<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CustomProc) -> Vec<Processor> + Send + Sync + 'static,
    {
        self.children = Some(Arc::new(hook));
        self
    }

    /// Attach a parent hook for variants that do not parent to the worker root.
    pub fn with_parent<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CustomProc) -> Processor + Send + Sync + 'static,
    {
        self.parent = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_enabled(&self) -> bool {
        self.default_enabled
    }
}

impl fmt::Debug for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantSpec")
            .field("name", &self.name)
            .field("default_enabled", &self.default_enabled)
            .field("has_children_hook", &self.children.is_some())
            .field("has_parent_hook", &self.parent.is_some())
            .finish()
    }
}

/// Process-wide table of user processor variants, keyed by tag.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    inner: RwLock<HashMap<ProcessorTypeId, VariantSpec>>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a variant. Fails on reserved or already-bound tags.
    pub fn register(
        &self,
        tag: ProcessorTypeId,
        spec: VariantSpec,
    ) -> Result<(), RegistryError> {
        if tag.is_reserved() {
            return Err(RegistryError::ReservedTag { tag: tag.0 });
        }
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(&tag) {
            return Err(RegistryError::DuplicateProcessorVariant { tag });
        }
        ExtensionRegistered {
            table: "processor",
            entry: spec.name(),
        }
        .log();
        table.insert(tag, spec);
        Ok(())
    }

    /// Whether a tag is known locally. Built-in tags always are.
    pub fn is_registered(&self, tag: ProcessorTypeId) -> bool {
        tag == ProcessorTypeId::OS
            || tag == ProcessorTypeId::THREAD
            || self
                .inner
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&tag)
    }

    /// The registered `default_enabled` verdict, if the tag is known.
    pub fn default_enabled(&self, tag: ProcessorTypeId) -> Option<bool> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tag)
            .map(VariantSpec::default_enabled)
    }

    /// The registered display name, if the tag is known.
    pub fn name_of(&self, tag: ProcessorTypeId) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tag)
            .map(|spec| spec.name.clone())
    }

    /// Run the parent hook for a custom processor, if one was registered.
    pub fn parent_of(&self, proc: &CustomProc) -> Option<Processor> {
        let hook = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&proc.kind)
            .and_then(|spec| spec.parent.clone())?;
        Some(hook(proc))
    }

    /// Run the children hook for a custom processor. Empty without one.
    pub fn children_of(&self, proc: &CustomProc) -> Vec<Processor> {
        let hook = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&proc.kind)
            .and_then(|spec| spec.children.clone());
        match hook {
            Some(hook) => hook(proc),
            None => Vec::new(),
        }
    }
}
