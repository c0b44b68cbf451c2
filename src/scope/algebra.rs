// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The meet operation on scopes.
//!
//! [`constrain`] is the greatest-lower-bound of two scopes: the set of
//! processors both allow. It is called in the scheduler's hot loop for
//! every (thunk, chunk, processor) triple, so a conflict is a *value* -
//! [`Scope::Invalid`] - never a panic or an error return. Downstream
//! scheduling treats an invalid result as "skip this candidate".
//!
//! The operation is commutative and associative modulo the diagnostics
//! payload inside an invalid result (whose equality is symmetric). Each
//! call normalizes its operands so the wider variant is on the left,
//! which halves the rule table:
//!
//! ```text
//! Any > Taint > Union > Node > Process > Exact
//! ```

use crate::context::Extensions;
use crate::scope::taint::taint_match;
use crate::scope::{InvalidScope, Scope, TaintScope, UnionScope};

/// Lattice position, widest first. Drives operand normalization only.
fn rank(scope: &Scope) -> u8 {
    match scope {
        Scope::Any => 0,
        Scope::Taint(_) => 1,
        Scope::Union(_) => 2,
        Scope::Node(_) => 3,
        Scope::Process(_) => 4,
        Scope::Exact(_) => 5,
        Scope::Invalid(_) => 6,
    }
}

fn invalid(x: &Scope, y: &Scope) -> Scope {
    Scope::Invalid(InvalidScope::new(x.clone(), y.clone()))
}

/// Meet of two scopes: the processors allowed by both.
///
/// Total over well-formed inputs. Feeding an invalid scope back in is a
/// caller bug - the scheduler should have skipped the candidate - but the
/// operation stays graceful and propagates it, which is also what lets
/// wire-degraded scopes flow through scheduling loops unharmed.
pub fn constrain(x: &Scope, y: &Scope, ext: &Extensions) -> Scope {
    if x.is_invalid() {
        return x.clone();
    }
    if y.is_invalid() {
        return y.clone();
    }

    let (wider, narrower) = if rank(x) <= rank(y) { (x, y) } else { (y, x) };

    match (wider, narrower) {
        (Scope::Any, _) => narrower.clone(),

        (Scope::Taint(a), Scope::Taint(b)) => {
            let inner = constrain(a.inner(), b.inner(), ext);
            if inner.is_invalid() {
                return inner;
            }
            let taints = a.taints().iter().chain(b.taints()).cloned().collect();
            with_taints(inner, taints, ext)
        }

        // The moment of truth: a concrete processor is visible, so the
        // deferred predicates are evaluated and discarded.
        (Scope::Taint(taint), Scope::Exact(exact)) => {
            for t in taint.taints() {
                if !taint_match(t, &exact.proc, ext) {
                    return invalid(wider, narrower);
                }
            }
            constrain(taint.inner(), narrower, ext)
        }

        // Any other narrowing keeps the taints pending on the met inner.
        (Scope::Taint(taint), _) => {
            let inner = constrain(taint.inner(), narrower, ext);
            if inner.is_invalid() {
                return inner;
            }
            with_taints(inner, taint.taints().to_vec(), ext)
        }

        (Scope::Union(left), Scope::Union(right)) => {
            union_meet(left.children(), right.children(), x, y, ext)
        }

        // A non-union operand distributes as a one-element union.
        (Scope::Union(left), _) => {
            union_meet(left.children(), std::slice::from_ref(narrower), x, y, ext)
        }

        (Scope::Node(u), Scope::Node(v)) => {
            if u == v {
                wider.clone()
            } else {
                invalid(x, y)
            }
        }

        (Scope::Node(u), Scope::Process(p)) => {
            if u.uuid == p.node.uuid {
                narrower.clone()
            } else {
                invalid(x, y)
            }
        }

        (Scope::Node(u), Scope::Exact(e)) => {
            if u.uuid == e.process.node.uuid {
                narrower.clone()
            } else {
                invalid(x, y)
            }
        }

        (Scope::Process(p), Scope::Process(q)) => {
            if p == q {
                wider.clone()
            } else {
                invalid(x, y)
            }
        }

        (Scope::Process(p), Scope::Exact(e)) => {
            if *p == e.process {
                narrower.clone()
            } else {
                invalid(x, y)
            }
        }

        (Scope::Exact(a), Scope::Exact(b)) => {
            if a == b {
                wider.clone()
            } else {
                invalid(x, y)
            }
        }

        // rank() normalization leaves no other pairing.
        _ => unreachable!("unnormalized scope pair in constrain"),
    }
}

/// Re-attach pending taints to a freshly met inner scope.
///
/// When the inner meet itself collapsed to one concrete processor (a
/// union losing all but an exact branch, say), deferral is over: the
/// predicates are resolved on the spot. Anything wider stays pending.
/// Without this, the result of a meet chain would depend on association
/// order.
fn with_taints(inner: Scope, taints: Vec<crate::scope::Taint>, ext: &Extensions) -> Scope {
    if let Scope::Exact(_) = inner {
        let pending = Scope::Taint(TaintScope::new(Scope::Any, taints));
        return constrain(&pending, &inner, ext);
    }
    Scope::Taint(TaintScope::new(inner, taints))
}

/// Pairwise meet of two child lists, invalids dropped, duplicates removed
/// on insertion, left operand's order first. Empty product means the two
/// scopes share no processor at all.
fn union_meet(
    left: &[Scope],
    right: &[Scope],
    x: &Scope,
    y: &Scope,
    ext: &Extensions,
) -> Scope {
    let mut children: Vec<Scope> = Vec::new();
    for c in left {
        for d in right {
            let met = constrain(c, d, ext);
            if met.is_invalid() {
                continue;
            }
            if !children.iter().any(|seen| seen.equivalent(&met)) {
                children.push(met);
            }
        }
    }
    match children.len() {
        0 => invalid(x, y),
        1 => children.remove(0),
        _ => Scope::Union(UnionScope::from_vec(children)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{NodeUuid, ThreadId, WorkerId};
    use crate::processors::{CustomProc, OsProc, Processor, ProcessorTypeId, ThreadProc, VariantSpec};
    use crate::scope::{default_scope, ExactScope, NodeScope, ProcessScope, Taint};
    use uuid::Uuid;

    fn node_a() -> NodeUuid {
        NodeUuid::from_uuid(Uuid::from_u128(0xA))
    }

    fn node_b() -> NodeUuid {
        NodeUuid::from_uuid(Uuid::from_u128(0xB))
    }

    fn node(uuid: NodeUuid) -> Scope {
        Scope::Node(NodeScope::new(uuid))
    }

    fn process(uuid: NodeUuid, wid: u64) -> Scope {
        Scope::Process(ProcessScope::new(NodeScope::new(uuid), WorkerId(wid)))
    }

    fn exact_thread(uuid: NodeUuid, wid: u64, tid: u32) -> Scope {
        Scope::Exact(ExactScope::new(
            ProcessScope::new(NodeScope::new(uuid), WorkerId(wid)),
            Processor::Thread(ThreadProc::new(WorkerId(wid), ThreadId(tid))),
        ))
    }

    fn exact_custom(uuid: NodeUuid, wid: u64, kind: u16) -> Scope {
        Scope::Exact(ExactScope::new(
            ProcessScope::new(NodeScope::new(uuid), WorkerId(wid)),
            Processor::Custom(CustomProc::new(ProcessorTypeId(kind), WorkerId(wid), vec![])),
        ))
    }

    #[test]
    fn any_is_the_identity() {
        let ext = Extensions::new();
        let scopes = vec![
            Scope::Any,
            node(node_a()),
            process(node_a(), 1),
            exact_thread(node_a(), 1, 2),
            default_scope(),
            Scope::Union(UnionScope::from_vec(vec![
                process(node_a(), 1),
                process(node_b(), 2),
            ])),
        ];
        for scope in scopes {
            assert_eq!(constrain(&Scope::Any, &scope, &ext), scope);
            assert_eq!(constrain(&scope, &Scope::Any, &ext), scope);
        }
    }

    #[test]
    fn hierarchy_meets_narrow_or_conflict() {
        struct TestCase {
            name: &'static str,
            left: Scope,
            right: Scope,
            expected: Option<Scope>, // None means invalid
        }

        let test_cases = vec![
            TestCase {
                name: "equal nodes",
                left: node(node_a()),
                right: node(node_a()),
                expected: Some(node(node_a())),
            },
            TestCase {
                name: "different nodes",
                left: node(node_a()),
                right: node(node_b()),
                expected: None,
            },
            TestCase {
                name: "node and its worker",
                left: node(node_a()),
                right: process(node_a(), 1),
                expected: Some(process(node_a(), 1)),
            },
            TestCase {
                name: "node and a foreign worker",
                left: node(node_a()),
                right: process(node_b(), 2),
                expected: None,
            },
            TestCase {
                name: "node and a thread on it",
                left: node(node_a()),
                right: exact_thread(node_a(), 1, 1),
                expected: Some(exact_thread(node_a(), 1, 1)),
            },
            TestCase {
                name: "equal workers",
                left: process(node_a(), 1),
                right: process(node_a(), 1),
                expected: Some(process(node_a(), 1)),
            },
            TestCase {
                name: "different workers",
                left: process(node_a(), 1),
                right: process(node_b(), 2),
                expected: None,
            },
            TestCase {
                name: "worker and one of its threads",
                left: process(node_a(), 1),
                right: exact_thread(node_a(), 1, 2),
                expected: Some(exact_thread(node_a(), 1, 2)),
            },
            TestCase {
                name: "worker and a foreign thread",
                left: process(node_a(), 1),
                right: exact_thread(node_b(), 2, 1),
                expected: None,
            },
            TestCase {
                name: "same processor twice",
                left: exact_thread(node_a(), 1, 1),
                right: exact_thread(node_a(), 1, 1),
                expected: Some(exact_thread(node_a(), 1, 1)),
            },
            TestCase {
                name: "two different processors",
                left: exact_thread(node_a(), 1, 1),
                right: exact_thread(node_a(), 1, 2),
                expected: None,
            },
        ];

        let ext = Extensions::new();
        for test_case in test_cases {
            let result = constrain(&test_case.left, &test_case.right, &ext);
            let flipped = constrain(&test_case.right, &test_case.left, &ext);
            match &test_case.expected {
                Some(expected) => {
                    assert_eq!(&result, expected, "case '{}'", test_case.name);
                    assert!(
                        result.equivalent(&flipped),
                        "case '{}' not commutative",
                        test_case.name
                    );
                }
                None => {
                    assert!(result.is_invalid(), "case '{}'", test_case.name);
                    assert!(flipped.is_invalid(), "case '{}' flipped", test_case.name);
                }
            }
        }
    }

    #[test]
    fn union_distributes_and_drops_conflicting_branches() {
        let ext = Extensions::new();
        let union = Scope::Union(UnionScope::from_vec(vec![
            exact_thread(node_a(), 1, 1),
            exact_thread(node_b(), 2, 1),
        ]));

        // One branch survives: the union collapses to it.
        let met = constrain(&union, &node(node_a()), &ext);
        assert_eq!(met, exact_thread(node_a(), 1, 1));

        // All branches conflict: invalid.
        let disjoint = process(node_a(), 9);
        assert!(constrain(&union, &disjoint, &ext).is_invalid());
    }

    #[test]
    fn union_union_product_dedups() {
        let ext = Extensions::new();
        let left = Scope::Union(UnionScope::from_vec(vec![
            process(node_a(), 1),
            exact_thread(node_a(), 1, 1),
        ]));
        let right = Scope::Union(UnionScope::from_vec(vec![
            exact_thread(node_a(), 1, 1),
            exact_thread(node_a(), 1, 2),
        ]));

        // (w1 ⊓ e11), (w1 ⊓ e12), (e11 ⊓ e11) = e11 twice + e12 once.
        let met = constrain(&left, &right, &ext);
        match met {
            Scope::Union(union) => {
                assert_eq!(
                    union.children(),
                    &[exact_thread(node_a(), 1, 1), exact_thread(node_a(), 1, 2)]
                );
            }
            other => panic!("expected union, got {other}"),
        }
    }

    #[test]
    fn singleton_union_behaves_as_its_child() {
        let ext = Extensions::new();
        let singleton = Scope::Union(UnionScope::from_vec(vec![process(node_a(), 1)]));
        let met = constrain(&singleton, &process(node_a(), 1), &ext);
        assert_eq!(met, process(node_a(), 1));
    }

    #[test]
    fn taints_defer_until_a_concrete_processor() {
        let ext = Extensions::new();

        // Narrowing to a worker keeps the predicate pending.
        let met = constrain(&default_scope(), &process(node_a(), 1), &ext);
        match &met {
            Scope::Taint(taint) => {
                assert_eq!(taint.inner(), &process(node_a(), 1));
                assert_eq!(taint.taints(), &[Taint::DefaultEnabled]);
            }
            other => panic!("expected pending taint, got {other}"),
        }

        // Narrowing to a processor resolves and discards it.
        let met = constrain(&met, &exact_thread(node_a(), 1, 2), &ext);
        assert_eq!(met, exact_thread(node_a(), 1, 2));
    }

    #[test]
    fn default_taint_rejects_opted_out_processors() {
        let ext = Extensions::new();
        ext.processors
            .register(ProcessorTypeId(20), VariantSpec::new("optout", false))
            .unwrap();

        let optout = exact_custom(node_b(), 2, 20);
        assert!(constrain(&default_scope(), &optout, &ext).is_invalid());
        assert!(constrain(&optout, &default_scope(), &ext).is_invalid());
    }

    #[test]
    fn taint_meets_merge_the_taint_sets() {
        let ext = Extensions::new();
        let left = Scope::Taint(TaintScope::new(Scope::Any, [Taint::DefaultEnabled]));
        let right = Scope::Taint(TaintScope::new(
            node(node_a()),
            [Taint::DefaultEnabled, Taint::ProcessorType(ProcessorTypeId::THREAD)],
        ));

        match constrain(&left, &right, &ext) {
            Scope::Taint(taint) => {
                assert_eq!(taint.inner(), &node(node_a()));
                assert_eq!(taint.taints().len(), 2);
                assert!(taint.taints().contains(&Taint::DefaultEnabled));
                assert!(taint
                    .taints()
                    .contains(&Taint::ProcessorType(ProcessorTypeId::THREAD)));
            }
            other => panic!("expected taint scope, got {other}"),
        }
    }

    #[test]
    fn processor_type_taint_filters_variants() {
        let ext = Extensions::new();
        let threads_only = crate::scope::processor_type_scope(ProcessorTypeId::THREAD);

        assert_eq!(
            constrain(&threads_only, &exact_thread(node_a(), 1, 2), &ext),
            exact_thread(node_a(), 1, 2)
        );
        assert!(constrain(&threads_only, &exact_custom(node_b(), 2, 20), &ext).is_invalid());
        // The worker root is not a thread either.
        let os = Scope::Exact(ExactScope::new(
            ProcessScope::new(NodeScope::new(node_a()), WorkerId(1)),
            Processor::Os(OsProc::new(WorkerId(1))),
        ));
        assert!(constrain(&threads_only, &os, &ext).is_invalid());
    }

    #[test]
    fn taint_conflict_reports_both_inputs() {
        let ext = Extensions::new();
        let threads_only = crate::scope::processor_type_scope(ProcessorTypeId::THREAD);
        let custom = exact_custom(node_b(), 2, 20);

        match constrain(&threads_only, &custom, &ext) {
            Scope::Invalid(invalid) => {
                let sides = [invalid.left().clone(), invalid.right().clone()];
                assert!(sides.contains(&threads_only));
                assert!(sides.contains(&custom));
            }
            other => panic!("expected invalid, got {other}"),
        }
    }

    #[test]
    fn invalid_inputs_propagate() {
        let ext = Extensions::new();
        let invalid = Scope::Invalid(InvalidScope::new(
            process(node_a(), 1),
            process(node_b(), 2),
        ));
        assert_eq!(constrain(&invalid, &Scope::Any, &ext), invalid);
        assert_eq!(constrain(&node(node_a()), &invalid, &ext), invalid);
    }
}
