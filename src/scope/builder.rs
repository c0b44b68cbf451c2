// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Construction of scopes from user-facing specifications.
//!
//! Users describe placement either positionally (a list of things that
//! are already scope-like) or by keyword (`worker:`, `workers:`,
//! `thread:`, `threads:`, plus whatever keys extensions register). The
//! builder resolves worker ids against the registry, expands thread specs
//! against each worker's published children, and produces a canonical
//! scope tree - or fails fast with a descriptive [`ScopeBuildError`].
//! It never returns a partial scope.
//!
//! Keyword specs are plain serde structs, so a placement policy can live
//! in a YAML or JSON file next to the rest of a deployment's config:
//!
//! ```yaml
//! workers: [1, 2]
//! threads: [1]
//! ```

use crate::cluster::{NodeUuid, ThreadId, WorkerId};
use crate::context::ClusterContext;
use crate::errors::{RegistryError, ScopeBuildError};
use crate::observability::messages::scope::{ExtensionRegistered, SpecDispatched};
use crate::observability::messages::StructuredLog;
use crate::processors::{Processor, ThreadProc};
use crate::scope::{default_scope, ExactScope, NodeScope, ProcessScope, Scope};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// One positional argument to scope construction.
#[derive(Debug, Clone)]
pub enum ScopeArg {
    /// The `default` symbol: anywhere, default-enabled processors only.
    Default,
    /// An already-built scope, passed through unchanged.
    Scope(Scope),
    /// A worker id, widened to its whole process.
    Worker(WorkerId),
    /// A host identity.
    Node(NodeUuid),
    /// A concrete processor, narrowed to exactly it.
    Processor(Processor),
}

/// The keyword form of a scope specification.
///
/// Unlisted keys land in `custom` and are routed through the
/// [`KeyRegistry`]. All fields default to absent; an all-absent spec
/// means "anywhere".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopeSpec {
    pub worker: Option<WorkerId>,
    pub workers: Option<Vec<WorkerId>>,
    pub thread: Option<ThreadId>,
    pub threads: Option<Vec<ThreadId>>,
    #[serde(flatten)]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl ScopeSpec {
    /// Parse a spec from YAML text (JSON is valid YAML).
    pub fn from_yaml_str(text: &str) -> Result<Self, ScopeBuildError> {
        serde_yaml::from_str(text).map_err(|err| ScopeBuildError::Spec(err.to_string()))
    }

    /// Parse a spec from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ScopeBuildError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| ScopeBuildError::Spec(err.to_string()))?;
        Self::from_yaml_str(&text)
    }

    /// `worker` and `workers` merged, first occurrence wins on duplicates.
    fn worker_set(&self) -> Vec<WorkerId> {
        let mut set = Vec::new();
        for wid in self
            .worker
            .into_iter()
            .chain(self.workers.iter().flatten().copied())
        {
            if !set.contains(&wid) {
                set.push(wid);
            }
        }
        set
    }

    /// `thread` and `threads` merged, same policy.
    fn thread_set(&self) -> Vec<ThreadId> {
        let mut set = Vec::new();
        for tid in self
            .thread
            .into_iter()
            .chain(self.threads.iter().flatten().copied())
        {
            if !set.contains(&tid) {
                set.push(tid);
            }
        }
        set
    }
}

/// Builds scopes against one cluster context.
pub struct ScopeBuilder<'a> {
    ctx: &'a ClusterContext,
}

impl<'a> ScopeBuilder<'a> {
    pub fn new(ctx: &'a ClusterContext) -> Self {
        Self { ctx }
    }

    /// The positional form.
    ///
    /// * no arguments: anywhere
    /// * just `default`: the default-placement scope
    /// * one argument: that argument, converted
    /// * several: the union of all of them, deduplicated
    pub fn positional(
        &self,
        args: impl IntoIterator<Item = ScopeArg>,
    ) -> Result<Scope, ScopeBuildError> {
        let mut args: Vec<ScopeArg> = args.into_iter().collect();
        match args.len() {
            0 => Ok(Scope::Any),
            1 => match args.remove(0) {
                ScopeArg::Default => Ok(default_scope()),
                arg => self.to_scope(arg),
            },
            _ => {
                let mut members = Vec::with_capacity(args.len());
                for arg in args {
                    members.push(self.to_scope(arg)?);
                }
                Scope::union_of(members)
            }
        }
    }

    /// The keyword form. See [`ScopeSpec`].
    pub fn from_spec(&self, spec: &ScopeSpec) -> Result<Scope, ScopeBuildError> {
        let workers = spec.worker_set();
        let threads = spec.thread_set();

        match (workers.is_empty(), threads.is_empty()) {
            // Custom keys only speak when no worker or thread key does.
            (true, true) if !spec.custom.is_empty() => self.dispatch_extension(spec),
            (true, true) => Ok(Scope::Any),
            (false, true) => {
                let mut members = Vec::with_capacity(workers.len());
                for wid in workers {
                    members.push(Scope::Process(self.process_scope(wid)?));
                }
                Scope::union_of(members)
            }
            (false, false) => {
                // The named pairs are taken at face value; a pair naming a
                // thread the worker does not expose meets to invalid
                // against real processors and gets filtered downstream.
                let mut members = Vec::with_capacity(workers.len() * threads.len());
                for wid in &workers {
                    let process = self.process_scope(*wid)?;
                    for tid in &threads {
                        members.push(Scope::Exact(ExactScope::new(
                            process,
                            Processor::Thread(ThreadProc::new(*wid, *tid)),
                        )));
                    }
                }
                Scope::union_of(members)
            }
            (true, false) => self.threads_across_workers(&threads),
        }
    }

    /// Threads-only specs enumerate each worker's own children: a tid
    /// produces a member only on workers that actually expose it.
    fn threads_across_workers(&self, threads: &[ThreadId]) -> Result<Scope, ScopeBuildError> {
        let mut members = Vec::new();
        for wid in self.ctx.workers.workers() {
            // A worker leaving between the two reads just drops out.
            let Some(children) = self.ctx.workers.children(wid) else {
                continue;
            };
            let Some(node) = self.ctx.workers.node_uuid(wid) else {
                continue;
            };
            let process = ProcessScope::new(NodeScope::new(node), wid);
            for child in children {
                if let Processor::Thread(thread) = &child {
                    if threads.contains(&thread.tid) {
                        members.push(Scope::Exact(ExactScope::new(process, child.clone())));
                    }
                }
            }
        }
        if members.is_empty() {
            return Err(ScopeBuildError::UnknownThreads(threads.to_vec()));
        }
        Scope::union_of(members)
    }

    fn dispatch_extension(&self, spec: &ScopeSpec) -> Result<Scope, ScopeBuildError> {
        let keys: Vec<String> = spec.custom.keys().cloned().collect();
        let (key, precedence, handler) = self.ctx.extensions.scope_keys.resolve(&keys)?;
        SpecDispatched {
            key: &key,
            precedence,
        }
        .log();
        handler(spec, self.ctx).map_err(|reason| ScopeBuildError::Handler { key, reason })
    }

    fn to_scope(&self, arg: ScopeArg) -> Result<Scope, ScopeBuildError> {
        match arg {
            ScopeArg::Default => Ok(default_scope()),
            ScopeArg::Scope(scope) if scope.is_invalid() => {
                Err(ScopeBuildError::InvalidScopeInput)
            }
            ScopeArg::Scope(scope) => Ok(scope),
            ScopeArg::Worker(wid) => Ok(Scope::Process(self.process_scope(wid)?)),
            ScopeArg::Node(uuid) => Ok(Scope::Node(NodeScope::new(uuid))),
            ScopeArg::Processor(proc) => {
                let process = self.process_scope(proc.wid())?;
                Ok(Scope::Exact(ExactScope::new(process, proc)))
            }
        }
    }

    fn process_scope(&self, wid: WorkerId) -> Result<ProcessScope, ScopeBuildError> {
        let node = self
            .ctx
            .workers
            .node_uuid(wid)
            .ok_or(ScopeBuildError::UnknownWorker(wid))?;
        Ok(ProcessScope::new(NodeScope::new(node), wid))
    }
}

type KeyHandlerFn =
    Arc<dyn Fn(&ScopeSpec, &ClusterContext) -> Result<Scope, String> + Send + Sync>;

struct KeyEntry {
    precedence: i32,
    handler: KeyHandlerFn,
}

/// Process-wide table of scope-key extensions.
///
/// When a spec carries keys the builder does not recognize, the handlers
/// registered for those keys compete by precedence: the unique maximum
/// wins and receives the full spec, a tie is a construction error. A
/// handler reports rejection as a plain message; the builder wraps it
/// into [`ScopeBuildError::Handler`] with the winning key attached.
#[derive(Default)]
pub struct KeyRegistry {
    inner: RwLock<HashMap<String, KeyEntry>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a handler for one key. Fails on an already-bound key.
    pub fn register<F>(
        &self,
        key: impl Into<String>,
        precedence: i32,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&ScopeSpec, &ClusterContext) -> Result<Scope, String> + Send + Sync + 'static,
    {
        let key = key.into();
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(&key) {
            return Err(RegistryError::DuplicateScopeKey { key });
        }
        ExtensionRegistered {
            table: "scope-key",
            entry: &key,
        }
        .log();
        table.insert(
            key,
            KeyEntry {
                precedence,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Pick the handler at the unique maximum precedence among `keys`.
    fn resolve(
        &self,
        keys: &[String],
    ) -> Result<(String, i32, KeyHandlerFn), ScopeBuildError> {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut best: Option<(String, i32, KeyHandlerFn)> = None;
        let mut tied: Vec<String> = Vec::new();

        for key in keys {
            let Some(entry) = table.get(key) else {
                continue;
            };
            match &best {
                None => {
                    tied = vec![key.clone()];
                    best = Some((key.clone(), entry.precedence, entry.handler.clone()));
                }
                Some((_, precedence, _)) if entry.precedence > *precedence => {
                    tied = vec![key.clone()];
                    best = Some((key.clone(), entry.precedence, entry.handler.clone()));
                }
                Some((_, precedence, _)) if entry.precedence == *precedence => {
                    tied.push(key.clone());
                }
                Some(_) => {}
            }
        }

        match best {
            None => Err(ScopeBuildError::UnrecognizedKeys {
                keys: keys.to_vec(),
            }),
            Some((_, precedence, _)) if tied.len() > 1 => {
                Err(ScopeBuildError::ConflictingSpecifiers {
                    keys: tied,
                    precedence,
                })
            }
            Some(winner) => Ok(winner),
        }
    }
}

impl fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&str> = table.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("KeyRegistry").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NodeUuid;
    use crate::scope::{Taint, UnionScope};
    use std::io::Write;
    use uuid::Uuid;

    fn node_a() -> NodeUuid {
        NodeUuid::from_uuid(Uuid::from_u128(0xA))
    }

    fn node_b() -> NodeUuid {
        NodeUuid::from_uuid(Uuid::from_u128(0xB))
    }

    fn threads(wid: u64, tids: &[u32]) -> Vec<Processor> {
        tids.iter()
            .map(|tid| Processor::Thread(ThreadProc::new(WorkerId(wid), ThreadId(*tid))))
            .collect()
    }

    /// Worker 1 on node A with threads {1,2}; worker 2 on node B with
    /// threads {1,2,3}.
    fn two_worker_context() -> ClusterContext {
        let ctx = ClusterContext::new();
        ctx.workers
            .worker_joined(WorkerId(1), node_a(), threads(1, &[1, 2]));
        ctx.workers
            .worker_joined(WorkerId(2), node_b(), threads(2, &[1, 2, 3]));
        ctx
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

    #[test]
    fn empty_positional_is_any() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        assert_eq!(builder.positional([]).unwrap(), Scope::Any);
    }

    #[test]
    fn lone_default_symbol_builds_the_default_scope() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        let scope = builder.positional([ScopeArg::Default]).unwrap();
        match scope {
            Scope::Taint(taint) => {
                assert_eq!(taint.inner(), &Scope::Any);
                assert_eq!(taint.taints(), &[Taint::DefaultEnabled]);
            }
            other => panic!("expected taint scope, got {other}"),
        }
    }

    #[test]
    fn single_worker_argument_widens_to_its_process() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        let scope = builder.positional([ScopeArg::Worker(WorkerId(1))]).unwrap();
        assert_eq!(scope, process(node_a(), 1));
    }

    #[test]
    fn several_arguments_union_and_dedup() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        let scope = builder
            .positional([
                ScopeArg::Worker(WorkerId(1)),
                ScopeArg::Worker(WorkerId(2)),
                ScopeArg::Worker(WorkerId(1)),
            ])
            .unwrap();
        assert_eq!(
            scope,
            Scope::Union(UnionScope::from_vec(vec![
                process(node_a(), 1),
                process(node_b(), 2),
            ]))
        );
    }

    #[test]
    fn unknown_worker_fails_fast() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        assert_eq!(
            builder.positional([ScopeArg::Worker(WorkerId(9))]),
            Err(ScopeBuildError::UnknownWorker(WorkerId(9)))
        );
    }

    #[test]
    fn invalid_scope_argument_is_rejected() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        let invalid = Scope::Invalid(crate::scope::InvalidScope::new(Scope::Any, Scope::Any));
        assert_eq!(
            builder.positional([ScopeArg::Scope(invalid)]),
            Err(ScopeBuildError::InvalidScopeInput)
        );
    }

    #[test]
    fn empty_spec_is_any() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        assert_eq!(builder.from_spec(&ScopeSpec::default()).unwrap(), Scope::Any);
    }

    #[test]
    fn workers_only_union_of_processes() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);

        let spec = ScopeSpec {
            worker: Some(WorkerId(1)),
            ..ScopeSpec::default()
        };
        assert_eq!(builder.from_spec(&spec).unwrap(), process(node_a(), 1));

        let spec = ScopeSpec {
            workers: Some(vec![WorkerId(1), WorkerId(2)]),
            ..ScopeSpec::default()
        };
        assert_eq!(
            builder.from_spec(&spec).unwrap(),
            Scope::Union(UnionScope::from_vec(vec![
                process(node_a(), 1),
                process(node_b(), 2),
            ]))
        );
    }

    #[test]
    fn workers_and_threads_take_the_cartesian_product() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        let spec = ScopeSpec {
            workers: Some(vec![WorkerId(1), WorkerId(2)]),
            threads: Some(vec![ThreadId(1)]),
            ..ScopeSpec::default()
        };
        assert_eq!(
            builder.from_spec(&spec).unwrap(),
            Scope::Union(UnionScope::from_vec(vec![
                exact_thread(node_a(), 1, 1),
                exact_thread(node_b(), 2, 1),
            ]))
        );
    }

    #[test]
    fn threads_only_expands_each_workers_own_children() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);

        // Thread 3 exists on worker 2 only.
        let spec = ScopeSpec {
            threads: Some(vec![ThreadId(3)]),
            ..ScopeSpec::default()
        };
        assert_eq!(
            builder.from_spec(&spec).unwrap(),
            exact_thread(node_b(), 2, 3)
        );

        // Thread 1 exists on both.
        let spec = ScopeSpec {
            thread: Some(ThreadId(1)),
            ..ScopeSpec::default()
        };
        assert_eq!(
            builder.from_spec(&spec).unwrap(),
            Scope::Union(UnionScope::from_vec(vec![
                exact_thread(node_a(), 1, 1),
                exact_thread(node_b(), 2, 1),
            ]))
        );
    }

    #[test]
    fn threads_nobody_exposes_fail_fast() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        let spec = ScopeSpec {
            threads: Some(vec![ThreadId(9)]),
            ..ScopeSpec::default()
        };
        assert_eq!(
            builder.from_spec(&spec),
            Err(ScopeBuildError::UnknownThreads(vec![ThreadId(9)]))
        );
    }

    #[test]
    fn custom_keys_route_to_the_highest_precedence_handler() {
        let ctx = two_worker_context();
        ctx.extensions
            .scope_keys
            .register("rack", 0, |_, _| Ok(Scope::Any))
            .unwrap();
        ctx.extensions
            .scope_keys
            .register("gpu", 10, |spec, ctx| {
                // The winning handler sees the full key set.
                assert!(spec.custom.contains_key("rack"));
                ScopeBuilder::new(ctx)
                    .positional([ScopeArg::Worker(WorkerId(2))])
                    .map_err(|err| err.to_string())
            })
            .unwrap();

        let builder = ScopeBuilder::new(&ctx);
        let spec = ScopeSpec::from_yaml_str("gpu: 0\nrack: \"r1\"\n").unwrap();
        assert_eq!(builder.from_spec(&spec).unwrap(), process(node_b(), 2));
    }

    #[test]
    fn tied_handlers_are_a_conflict() {
        let ctx = two_worker_context();
        ctx.extensions
            .scope_keys
            .register("gpu", 5, |_, _| Ok(Scope::Any))
            .unwrap();
        ctx.extensions
            .scope_keys
            .register("rack", 5, |_, _| Ok(Scope::Any))
            .unwrap();

        let builder = ScopeBuilder::new(&ctx);
        let spec = ScopeSpec::from_yaml_str("gpu: 0\nrack: \"r1\"\n").unwrap();
        match builder.from_spec(&spec) {
            Err(ScopeBuildError::ConflictingSpecifiers { keys, precedence }) => {
                assert_eq!(precedence, 5);
                assert_eq!(keys.len(), 2);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn worker_and_thread_keys_outrank_custom_keys() {
        let ctx = two_worker_context();
        ctx.extensions
            .scope_keys
            .register("gpu", 10, |_, _| {
                panic!("extension handler must not run when worker keys are present")
            })
            .unwrap();

        let builder = ScopeBuilder::new(&ctx);

        // The worker selection wins even with a handled custom key present.
        let spec = ScopeSpec::from_yaml_str("workers: [1]\ngpu: 0\n").unwrap();
        assert_eq!(builder.from_spec(&spec).unwrap(), process(node_a(), 1));

        // Same with threads, and with a key nobody handles.
        let spec = ScopeSpec::from_yaml_str("threads: [3]\nrack: \"r1\"\n").unwrap();
        assert_eq!(
            builder.from_spec(&spec).unwrap(),
            exact_thread(node_b(), 2, 3)
        );
    }

    #[test]
    fn rejecting_handler_surfaces_its_key_and_reason() {
        let ctx = two_worker_context();
        ctx.extensions
            .scope_keys
            .register("gpu", 0, |_, _| Err("no gpus in this cluster".to_string()))
            .unwrap();

        let builder = ScopeBuilder::new(&ctx);
        let spec = ScopeSpec::from_yaml_str("gpu: 0\n").unwrap();
        assert_eq!(
            builder.from_spec(&spec),
            Err(ScopeBuildError::Handler {
                key: "gpu".to_string(),
                reason: "no gpus in this cluster".to_string(),
            })
        );
    }

    #[test]
    fn unhandled_custom_keys_are_unrecognized() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);
        let spec = ScopeSpec::from_yaml_str("rack: \"r1\"\n").unwrap();
        assert_eq!(
            builder.from_spec(&spec),
            Err(ScopeBuildError::UnrecognizedKeys {
                keys: vec!["rack".to_string()],
            })
        );
    }

    #[test]
    fn spec_loads_from_a_yaml_file() {
        let ctx = two_worker_context();
        let builder = ScopeBuilder::new(&ctx);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers: [1, 2]").unwrap();
        writeln!(file, "threads: [1]").unwrap();

        let spec = ScopeSpec::from_yaml_file(file.path()).unwrap();
        assert_eq!(
            builder.from_spec(&spec).unwrap(),
            Scope::Union(UnionScope::from_vec(vec![
                exact_thread(node_a(), 1, 1),
                exact_thread(node_b(), 2, 1),
            ]))
        );
    }

    #[test]
    fn malformed_spec_text_is_a_spec_error() {
        let err = ScopeSpec::from_yaml_str("workers: notalist").unwrap_err();
        assert!(matches!(err, ScopeBuildError::Spec(_)));
    }
}
