// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The processor hierarchy the scopes refer to.
//!
//! A processor is an execution resource hosted by a worker: the worker's
//! root OS process, one of its threads, or a user-registered variant
//! (accelerators and the like). The hierarchy is two levels deep - every
//! non-root processor parents to the [`OsProc`] of its worker unless its
//! registered variant says otherwise.
//!
//! The enum is sealed: the closed core keeps exhaustiveness checking, and
//! user variants ride in [`CustomProc`] behind a numeric tag dispatched
//! through the [`VariantRegistry`]. No reflection anywhere.

pub mod extension;

pub use extension::{VariantRegistry, VariantSpec};

use crate::cluster::{ThreadId, WorkerId};
use std::fmt;

/// Stable numeric tag identifying a processor variant.
///
/// Chosen by the caller at registration time, like proto field numbers:
/// every scheduler in the cluster must register the same variant under the
/// same tag for wire transfer to work. Tags below [`ProcessorTypeId::FIRST_CUSTOM`]
/// are reserved for the built-in variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessorTypeId(pub u16);

impl ProcessorTypeId {
    /// The worker root process variant.
    pub const OS: ProcessorTypeId = ProcessorTypeId(0);
    /// The OS thread variant.
    pub const THREAD: ProcessorTypeId = ProcessorTypeId(1);
    /// Lowest tag available to user registrations.
    pub const FIRST_CUSTOM: ProcessorTypeId = ProcessorTypeId(16);

    /// Whether this tag belongs to the reserved built-in range.
    pub fn is_reserved(&self) -> bool {
        self.0 < Self::FIRST_CUSTOM.0
    }
}

impl fmt::Display for ProcessorTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p#{}", self.0)
    }
}

/// The root OS process of a worker.
///
/// Its children are the processors physically attached to that worker;
/// enumeration is served by the worker registry, which caches the snapshot
/// published at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsProc {
    pub wid: WorkerId,
}

impl OsProc {
    pub fn new(wid: WorkerId) -> Self {
        Self { wid }
    }
}

impl fmt::Display for OsProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "os:{}", self.wid)
    }
}

/// One OS thread on a given worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadProc {
    pub wid: WorkerId,
    pub tid: ThreadId,
}

impl ThreadProc {
    pub fn new(wid: WorkerId, tid: ThreadId) -> Self {
        Self { wid, tid }
    }
}

impl fmt::Display for ThreadProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread:{}/{}", self.wid, self.tid)
    }
}

/// A user-registered processor variant.
///
/// The payload is whatever the variant's codec produced - the core
/// compares it by bytes and never looks inside. Capability queries go
/// through the [`VariantRegistry`] keyed on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomProc {
    pub kind: ProcessorTypeId,
    pub wid: WorkerId,
    pub payload: Vec<u8>,
}

impl CustomProc {
    pub fn new(kind: ProcessorTypeId, wid: WorkerId, payload: Vec<u8>) -> Self {
        Self { kind, wid, payload }
    }
}

impl fmt::Display for CustomProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.wid)
    }
}

/// An execution resource somewhere in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Processor {
    Os(OsProc),
    Thread(ThreadProc),
    Custom(CustomProc),
}

impl Processor {
    /// The variant tag of this processor.
    pub fn kind(&self) -> ProcessorTypeId {
        match self {
            Processor::Os(_) => ProcessorTypeId::OS,
            Processor::Thread(_) => ProcessorTypeId::THREAD,
            Processor::Custom(custom) => custom.kind,
        }
    }

    /// The worker hosting this processor. Every variant carries one.
    pub fn wid(&self) -> WorkerId {
        match self {
            Processor::Os(os) => os.wid,
            Processor::Thread(thread) => thread.wid,
            Processor::Custom(custom) => custom.wid,
        }
    }

    /// Upward navigation. The root has no parent; everything else parents
    /// to its worker's [`OsProc`] unless the registered variant overrides.
    pub fn parent(&self, variants: &VariantRegistry) -> Option<Processor> {
        match self {
            Processor::Os(_) => None,
            Processor::Thread(thread) => Some(Processor::Os(OsProc::new(thread.wid))),
            Processor::Custom(custom) => Some(
                variants
                    .parent_of(custom)
                    .unwrap_or(Processor::Os(OsProc::new(custom.wid))),
            ),
        }
    }

    /// Sub-processors hosted by this processor, if its variant declares any.
    ///
    /// Children of an [`OsProc`] come from the worker registry's cached
    /// snapshot, not from here.
    pub fn children(&self, variants: &VariantRegistry) -> Vec<Processor> {
        match self {
            Processor::Custom(custom) => variants.children_of(custom),
            _ => Vec::new(),
        }
    }

    /// Whether this processor accepts work that did not name it explicitly.
    ///
    /// Static per variant: the built-ins opt in, a custom variant uses its
    /// registered verdict, and an unregistered custom kind is treated as
    /// opted out so that foreign scopes degrade instead of erroring.
    pub fn default_enabled(&self, variants: &VariantRegistry) -> bool {
        match self {
            Processor::Os(_) | Processor::Thread(_) => true,
            Processor::Custom(custom) => {
                variants.default_enabled(custom.kind).unwrap_or(false)
            }
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Processor::Os(os) => os.fmt(f),
            Processor::Thread(thread) => thread.fmt(f),
            Processor::Custom(custom) => custom.fmt(f),
        }
    }
}

impl From<OsProc> for Processor {
    fn from(os: OsProc) -> Self {
        Processor::Os(os)
    }
}

impl From<ThreadProc> for Processor {
    fn from(thread: ThreadProc) -> Self {
        Processor::Thread(thread)
    }
}

impl From<CustomProc> for Processor {
    fn from(custom: CustomProc) -> Self {
        Processor::Custom(custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(wid: u64, tid: u32) -> Processor {
        Processor::Thread(ThreadProc::new(WorkerId(wid), ThreadId(tid)))
    }

    #[test]
    fn thread_parents_to_its_worker_root() {
        let variants = VariantRegistry::new();
        let proc = thread(3, 1);
        assert_eq!(
            proc.parent(&variants),
            Some(Processor::Os(OsProc::new(WorkerId(3))))
        );
        assert_eq!(
            Processor::Os(OsProc::new(WorkerId(3))).parent(&variants),
            None
        );
    }

    #[test]
    fn builtins_are_default_enabled() {
        let variants = VariantRegistry::new();
        assert!(thread(1, 1).default_enabled(&variants));
        assert!(Processor::Os(OsProc::new(WorkerId(1))).default_enabled(&variants));
    }

    #[test]
    fn unregistered_custom_kind_is_opted_out() {
        let variants = VariantRegistry::new();
        let proc = Processor::Custom(CustomProc::new(
            ProcessorTypeId(40),
            WorkerId(2),
            vec![],
        ));
        assert!(!proc.default_enabled(&variants));
        // Structural parent still resolves without a registration.
        assert_eq!(
            proc.parent(&variants),
            Some(Processor::Os(OsProc::new(WorkerId(2))))
        );
    }

    #[test]
    fn kind_tags_are_stable() {
        let variants_dont_matter = [
            (thread(1, 1), ProcessorTypeId::THREAD),
            (Processor::Os(OsProc::new(WorkerId(1))), ProcessorTypeId::OS),
            (
                Processor::Custom(CustomProc::new(ProcessorTypeId(21), WorkerId(1), vec![1])),
                ProcessorTypeId(21),
            ),
        ];
        for (proc, expected) in variants_dont_matter {
            assert_eq!(proc.kind(), expected);
        }
    }
}
