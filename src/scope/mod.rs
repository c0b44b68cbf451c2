// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The scope lattice: declarative sets of processors.
//!
//! A scope describes where a computation or a materialized value is
//! allowed to live, from "anywhere" down to one concrete processor.
//! Scopes form a lattice with [`Scope::Any`] at the top and
//! [`Scope::Invalid`] at the bottom; the meet is [`constrain`]. Scopes are
//! immutable values - cheap to clone, safe to share, and never mutated by
//! the algebra.
//!
//! Variants, widest to narrowest:
//!
//! | Variant | Matches |
//! |---|---|
//! | `Any` | every processor |
//! | `Taint` | the inner scope, restricted by deferred predicates |
//! | `Union` | anything matched by at least one child |
//! | `Node` | any processor on one host |
//! | `Process` | any processor on one worker |
//! | `Exact` | one processor |
//! | `Invalid` | nothing - the terminal result of a failed meet |

pub mod algebra;
pub mod builder;
pub mod taint;
pub mod wire;


pub use algebra::constrain;
pub use builder::{KeyRegistry, ScopeArg, ScopeBuilder, ScopeSpec};
pub use taint::{taint_match, CustomTaint, Taint, TaintRegistry, TaintTypeId};
pub use wire::{decode_scope, decode_scope_lossy, encode_scope};

use crate::cluster::{NodeUuid, WorkerId};
use crate::errors::ScopeBuildError;
use crate::processors::{Processor, ProcessorTypeId};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Inner scope restricted by deferred predicates.
///
/// The taints cannot be resolved until a concrete processor is visible,
/// so they ride along every meet untouched until the inner scope narrows
/// to an [`ExactScope`]; at that point each taint is evaluated against the
/// processor and the wrapper is discarded (or the meet goes invalid).
#[derive(Debug, Clone, Eq)]
pub struct TaintScope {
    inner: Box<Scope>,
    taints: Vec<Taint>,
}

impl TaintScope {
    /// Build a taint scope. Duplicate taints collapse; insertion order of
    /// first occurrences is kept for readability, equality ignores it.
    pub fn new(inner: Scope, taints: impl IntoIterator<Item = Taint>) -> Self {
        let mut deduped: Vec<Taint> = Vec::new();
        for taint in taints {
            if !deduped.contains(&taint) {
                deduped.push(taint);
            }
        }
        Self {
            inner: Box::new(inner),
            taints: deduped,
        }
    }

    pub fn inner(&self) -> &Scope {
        &self.inner
    }

    pub fn taints(&self) -> &[Taint] {
        &self.taints
    }
}

impl PartialEq for TaintScope {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
            && self.taints.len() == other.taints.len()
            && self.taints.iter().all(|taint| other.taints.contains(taint))
    }
}

impl Hash for TaintScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
        // Commutative over the taint set.
        state.write_u64(commutative_hash(self.taints.iter()));
        state.write_usize(self.taints.len());
    }
}

/// Matches any processor matched by at least one child. Never empty,
/// never holds an invalid, never holds duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionScope {
    children: Vec<Scope>,
}

impl UnionScope {
    /// Trusted constructor for the builder and the meet, which uphold the
    /// invariants themselves.
    pub(crate) fn from_vec(children: Vec<Scope>) -> Self {
        debug_assert!(!children.is_empty());
        debug_assert!(!children.iter().any(Scope::is_invalid));
        Self { children }
    }

    pub fn children(&self) -> &[Scope] {
        &self.children
    }
}

impl Hash for UnionScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Union is semantically order-free even though child order is
        // stabilized for readability, so the hash is too.
        state.write_u64(commutative_hash(self.children.iter()));
        state.write_usize(self.children.len());
    }
}

/// Any processor on the named host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeScope {
    pub uuid: NodeUuid,
}

impl NodeScope {
    pub fn new(uuid: NodeUuid) -> Self {
        Self { uuid }
    }
}

/// Any processor on the named worker.
///
/// The embedded node is redundant - it must equal the registry's answer
/// for `wid` - but makes locality queries possible without dereferencing
/// the registry. Two process scopes are equal iff their worker ids are.
#[derive(Debug, Clone, Copy, Eq)]
pub struct ProcessScope {
    pub node: NodeScope,
    pub wid: WorkerId,
}

impl ProcessScope {
    pub fn new(node: NodeScope, wid: WorkerId) -> Self {
        Self { node, wid }
    }
}

impl PartialEq for ProcessScope {
    fn eq(&self, other: &Self) -> bool {
        self.wid == other.wid
    }
}

impl Hash for ProcessScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.wid.hash(state);
    }
}

/// Exactly the named processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExactScope {
    pub process: ProcessScope,
    pub proc: Processor,
}

impl ExactScope {
    pub fn new(process: ProcessScope, proc: Processor) -> Self {
        debug_assert_eq!(process.wid, proc.wid());
        Self { process, proc }
    }
}

/// Terminal result of a failed meet. Carries both inputs for diagnostics;
/// equality is symmetric in them. Never a legal input to further meets.
#[derive(Debug, Clone, Eq)]
pub struct InvalidScope {
    left: Box<Scope>,
    right: Box<Scope>,
}

impl InvalidScope {
    pub fn new(left: Scope, right: Scope) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn left(&self) -> &Scope {
        &self.left
    }

    pub fn right(&self) -> &Scope {
        &self.right
    }
}

impl PartialEq for InvalidScope {
    fn eq(&self, other: &Self) -> bool {
        (self.left == other.left && self.right == other.right)
            || (self.left == other.right && self.right == other.left)
    }
}

impl Hash for InvalidScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Symmetric, to stay consistent with the symmetric equality.
        state.write_u64(element_hash(&self.left) ^ element_hash(&self.right));
    }
}

/// A declarative set of processors on which work is permitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Any,
    Taint(TaintScope),
    Union(UnionScope),
    Node(NodeScope),
    Process(ProcessScope),
    Exact(ExactScope),
    Invalid(InvalidScope),
}

impl Scope {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Scope::Invalid(_))
    }

    /// Public union construction: rejects invalid members, deduplicates,
    /// collapses a singleton, and refuses to be empty.
    pub fn union_of(
        children: impl IntoIterator<Item = Scope>,
    ) -> Result<Scope, ScopeBuildError> {
        let mut deduped: Vec<Scope> = Vec::new();
        for child in children {
            if child.is_invalid() {
                return Err(ScopeBuildError::InvalidScopeInput);
            }
            if !deduped.iter().any(|seen| seen.equivalent(&child)) {
                deduped.push(child);
            }
        }
        match deduped.len() {
            0 => Err(ScopeBuildError::EmptyUnion),
            1 => Ok(deduped.remove(0)),
            _ => Ok(Scope::Union(UnionScope::from_vec(deduped))),
        }
    }

    /// Structural equality ignoring union child order, recursively.
    ///
    /// This is the relation the algebraic laws are stated in: the meet
    /// stabilizes child order for readability, but two unions over the
    /// same children mean the same set of processors.
    pub fn equivalent(&self, other: &Scope) -> bool {
        // A singleton union means its child.
        if let Scope::Union(union) = self {
            if let [child] = union.children() {
                return child.equivalent(other);
            }
        }
        if let Scope::Union(union) = other {
            if let [child] = union.children() {
                return self.equivalent(child);
            }
        }
        match (self, other) {
            (Scope::Any, Scope::Any) => true,
            (Scope::Taint(a), Scope::Taint(b)) => {
                a.taints.len() == b.taints.len()
                    && a.taints.iter().all(|taint| b.taints.contains(taint))
                    && a.inner.equivalent(&b.inner)
            }
            (Scope::Union(a), Scope::Union(b)) => {
                multiset_equivalent(&a.children, &b.children)
            }
            (Scope::Node(a), Scope::Node(b)) => a == b,
            (Scope::Process(a), Scope::Process(b)) => a == b,
            (Scope::Exact(a), Scope::Exact(b)) => a == b,
            (Scope::Invalid(a), Scope::Invalid(b)) => {
                (a.left.equivalent(&b.left) && a.right.equivalent(&b.right))
                    || (a.left.equivalent(&b.right) && a.right.equivalent(&b.left))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Any => write!(f, "any"),
            Scope::Taint(taint) => {
                write!(f, "tainted({}", taint.inner)?;
                for t in &taint.taints {
                    write!(f, ", {}", t)?;
                }
                write!(f, ")")
            }
            Scope::Union(union) => {
                write!(f, "(")?;
                for (i, child) in union.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            Scope::Node(node) => write!(f, "node:{}", node.uuid),
            Scope::Process(process) => write!(f, "worker:{}", process.wid),
            Scope::Exact(exact) => write!(f, "exact:{}", exact.proc),
            Scope::Invalid(invalid) => {
                write!(f, "invalid({} vs {})", invalid.left, invalid.right)
            }
        }
    }
}

/// The scope a thunk gets when the user asked for nothing in particular:
/// anywhere, restricted to processors that opted in to default placement.
pub fn default_scope() -> Scope {
    Scope::Taint(TaintScope::new(Scope::Any, [Taint::DefaultEnabled]))
}

/// Anywhere, restricted to one processor variant.
pub fn processor_type_scope(kind: ProcessorTypeId) -> Scope {
    Scope::Taint(TaintScope::new(Scope::Any, [Taint::ProcessorType(kind)]))
}

fn element_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn commutative_hash<'a, T: Hash + 'a>(elements: impl Iterator<Item = &'a T>) -> u64 {
    elements.map(element_hash).fold(0, |acc, h| acc ^ h)
}

fn multiset_equivalent(xs: &[Scope], ys: &[Scope]) -> bool {
    if xs.len() != ys.len() {
        return false;
    }
    let mut used = vec![false; ys.len()];
    'outer: for x in xs {
        for (i, y) in ys.iter().enumerate() {
            if !used[i] && x.equivalent(y) {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ThreadId;
    use crate::processors::ThreadProc;

    fn node(uuid: NodeUuid) -> NodeScope {
        NodeScope::new(uuid)
    }

    fn process(uuid: NodeUuid, wid: u64) -> ProcessScope {
        ProcessScope::new(node(uuid), WorkerId(wid))
    }

    fn exact(uuid: NodeUuid, wid: u64, tid: u32) -> Scope {
        Scope::Exact(ExactScope::new(
            process(uuid, wid),
            Processor::Thread(ThreadProc::new(WorkerId(wid), ThreadId(tid))),
        ))
    }

    #[test]
    fn taint_equality_ignores_order() {
        let a = TaintScope::new(
            Scope::Any,
            [Taint::DefaultEnabled, Taint::ProcessorType(ProcessorTypeId::THREAD)],
        );
        let b = TaintScope::new(
            Scope::Any,
            [Taint::ProcessorType(ProcessorTypeId::THREAD), Taint::DefaultEnabled],
        );
        assert_eq!(a, b);
        assert_eq!(element_hash(&a), element_hash(&b));
    }

    #[test]
    fn taint_constructor_dedups() {
        let scope = TaintScope::new(
            Scope::Any,
            [Taint::DefaultEnabled, Taint::DefaultEnabled],
        );
        assert_eq!(scope.taints().len(), 1);
    }

    #[test]
    fn union_hash_ignores_order_equality_does_not() {
        let uuid = NodeUuid::generate();
        let ab = Scope::Union(UnionScope::from_vec(vec![
            exact(uuid, 1, 1),
            exact(uuid, 1, 2),
        ]));
        let ba = Scope::Union(UnionScope::from_vec(vec![
            exact(uuid, 1, 2),
            exact(uuid, 1, 1),
        ]));
        assert_ne!(ab, ba);
        assert!(ab.equivalent(&ba));
        assert_eq!(element_hash(&ab), element_hash(&ba));
    }

    #[test]
    fn invalid_equality_is_symmetric() {
        let uuid = NodeUuid::generate();
        let a = InvalidScope::new(exact(uuid, 1, 1), exact(uuid, 2, 1));
        let b = InvalidScope::new(exact(uuid, 2, 1), exact(uuid, 1, 1));
        assert_eq!(a, b);
        assert_eq!(element_hash(&a), element_hash(&b));
    }

    #[test]
    fn process_scopes_compare_by_worker_id() {
        // The embedded node uuid is redundant by invariant; two entries
        // for the same worker are the same scope.
        let a = process(NodeUuid::generate(), 4);
        let b = process(NodeUuid::generate(), 4);
        assert_eq!(a, b);
    }

    #[test]
    fn union_of_collapses_and_rejects() {
        let uuid = NodeUuid::generate();
        let single = Scope::union_of([exact(uuid, 1, 1)]).unwrap();
        assert_eq!(single, exact(uuid, 1, 1));

        let deduped = Scope::union_of([exact(uuid, 1, 1), exact(uuid, 1, 1)]).unwrap();
        assert_eq!(deduped, exact(uuid, 1, 1));

        assert_eq!(
            Scope::union_of(std::iter::empty()),
            Err(crate::errors::ScopeBuildError::EmptyUnion)
        );

        let invalid = Scope::Invalid(InvalidScope::new(Scope::Any, Scope::Any));
        assert_eq!(
            Scope::union_of([invalid]),
            Err(crate::errors::ScopeBuildError::InvalidScopeInput)
        );
    }

    #[test]
    fn default_scope_is_the_documented_alias() {
        match default_scope() {
            Scope::Taint(taint) => {
                assert_eq!(taint.inner(), &Scope::Any);
                assert_eq!(taint.taints(), &[Taint::DefaultEnabled]);
            }
            other => panic!("expected taint scope, got {other}"),
        }
    }
}
