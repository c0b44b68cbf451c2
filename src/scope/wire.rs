// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The scope wire form.
//!
//! Scopes survive transfer between workers as self-describing JSON with a
//! stable numeric tag per variant (`t` for scopes, `kind`/`k` for the
//! embedded processors and taints). Opaque processor and taint payloads
//! ride as base64 strings. Binary framing is the transport's business;
//! this module only owns the bytes between the frames.
//!
//! Decoding is strict about shape but graceful about vocabulary: a scope
//! from a newer or foreign scheduler whose variants are not registered
//! locally is an error from [`decode_scope`], and [`decode_scope_lossy`]
//! turns that error into an invalid scope so the receiving scheduler
//! skips the candidate instead of aborting.

use crate::cluster::{NodeUuid, ThreadId, WorkerId};
use crate::context::Extensions;
use crate::errors::WireError;
use crate::observability::messages::{scope::UnknownWireVariant, StructuredLog};
use crate::processors::{CustomProc, OsProc, Processor, ProcessorTypeId, ThreadProc};
use crate::scope::{
    CustomTaint, ExactScope, InvalidScope, NodeScope, ProcessScope, Scope, Taint, TaintScope,
    TaintTypeId, UnionScope,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

const TAG_ANY: u64 = 0;
const TAG_TAINT: u64 = 1;
const TAG_UNION: u64 = 2;
const TAG_NODE: u64 = 3;
const TAG_PROCESS: u64 = 4;
const TAG_EXACT: u64 = 5;
const TAG_INVALID: u64 = 6;

const TAINT_DEFAULT: u64 = 0;
const TAINT_TYPE: u64 = 1;
const TAINT_CUSTOM: u64 = 2;

/// Encode a scope for transfer to another worker.
pub fn encode_scope(scope: &Scope) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(&scope_to_value(scope))?)
}

/// Decode a scope received from another worker.
///
/// Custom processor and taint variants must be registered locally under
/// the same tags the sender used.
pub fn decode_scope(bytes: &[u8], ext: &Extensions) -> Result<Scope, WireError> {
    let value: Value = serde_json::from_slice(bytes)?;
    value_to_scope(&value, ext)
}

/// Decode, degrading every failure to an invalid scope.
///
/// This is the form scheduling loops use: an undecodable scope meets to
/// invalid against anything local and the candidate is skipped.
pub fn decode_scope_lossy(bytes: &[u8], ext: &Extensions) -> Scope {
    match decode_scope(bytes, ext) {
        Ok(scope) => scope,
        Err(err) => {
            UnknownWireVariant {
                reason: &err.to_string(),
            }
            .log();
            Scope::Invalid(InvalidScope::new(Scope::Any, Scope::Any))
        }
    }
}

fn scope_to_value(scope: &Scope) -> Value {
    match scope {
        Scope::Any => json!({ "t": TAG_ANY }),
        Scope::Taint(taint) => json!({
            "t": TAG_TAINT,
            "inner": scope_to_value(taint.inner()),
            "taints": taint.taints().iter().map(taint_to_value).collect::<Vec<_>>(),
        }),
        Scope::Union(union) => json!({
            "t": TAG_UNION,
            "children": union.children().iter().map(scope_to_value).collect::<Vec<_>>(),
        }),
        Scope::Node(node) => json!({ "t": TAG_NODE, "uuid": node.uuid }),
        Scope::Process(process) => json!({
            "t": TAG_PROCESS,
            "uuid": process.node.uuid,
            "wid": process.wid,
        }),
        Scope::Exact(exact) => json!({
            "t": TAG_EXACT,
            "uuid": exact.process.node.uuid,
            "wid": exact.process.wid,
            "proc": proc_to_value(&exact.proc),
        }),
        Scope::Invalid(invalid) => json!({
            "t": TAG_INVALID,
            "left": scope_to_value(invalid.left()),
            "right": scope_to_value(invalid.right()),
        }),
    }
}

fn proc_to_value(proc: &Processor) -> Value {
    match proc {
        Processor::Os(os) => json!({ "kind": ProcessorTypeId::OS.0, "wid": os.wid }),
        Processor::Thread(thread) => json!({
            "kind": ProcessorTypeId::THREAD.0,
            "wid": thread.wid,
            "tid": thread.tid,
        }),
        Processor::Custom(custom) => json!({
            "kind": custom.kind.0,
            "wid": custom.wid,
            "payload": BASE64.encode(&custom.payload),
        }),
    }
}

fn taint_to_value(taint: &Taint) -> Value {
    match taint {
        Taint::DefaultEnabled => json!({ "k": TAINT_DEFAULT }),
        Taint::ProcessorType(kind) => json!({ "k": TAINT_TYPE, "type": kind.0 }),
        Taint::Custom(custom) => json!({
            "k": TAINT_CUSTOM,
            "taint": custom.kind.0,
            "payload": BASE64.encode(&custom.payload),
        }),
    }
}

fn value_to_scope(value: &Value, ext: &Extensions) -> Result<Scope, WireError> {
    match field_u64(value, "t")? {
        TAG_ANY => Ok(Scope::Any),
        TAG_TAINT => {
            let inner = value_to_scope(field(value, "inner")?, ext)?;
            let taints = field(value, "taints")?
                .as_array()
                .ok_or(WireError::Field("taints"))?
                .iter()
                .map(|taint| value_to_taint(taint, ext))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Scope::Taint(TaintScope::new(inner, taints)))
        }
        TAG_UNION => {
            let children = field(value, "children")?
                .as_array()
                .ok_or(WireError::Field("children"))?
                .iter()
                .map(|child| value_to_scope(child, ext))
                .collect::<Result<Vec<_>, _>>()?;
            // Re-normalizing on entry keeps the union invariants local.
            Scope::union_of(children).map_err(|_| WireError::Field("children"))
        }
        TAG_NODE => Ok(Scope::Node(NodeScope::new(field_uuid(value)?))),
        TAG_PROCESS => Ok(Scope::Process(decode_process(value)?)),
        TAG_EXACT => {
            let process = decode_process(value)?;
            let proc = value_to_proc(field(value, "proc")?, ext)?;
            if proc.wid() != process.wid {
                return Err(WireError::Field("proc"));
            }
            Ok(Scope::Exact(ExactScope::new(process, proc)))
        }
        TAG_INVALID => {
            let left = value_to_scope(field(value, "left")?, ext)?;
            let right = value_to_scope(field(value, "right")?, ext)?;
            Ok(Scope::Invalid(InvalidScope::new(left, right)))
        }
        tag => Err(WireError::UnknownScopeTag(tag)),
    }
}

fn decode_process(value: &Value) -> Result<ProcessScope, WireError> {
    let node = NodeScope::new(field_uuid(value)?);
    let wid: WorkerId = from_field(value, "wid")?;
    Ok(ProcessScope::new(node, wid))
}

fn value_to_proc(value: &Value, ext: &Extensions) -> Result<Processor, WireError> {
    let kind = field_u64(value, "kind")?;
    let kind = u16::try_from(kind).map_err(|_| WireError::Field("kind"))?;
    let kind = ProcessorTypeId(kind);
    let wid: WorkerId = from_field(value, "wid")?;

    if kind == ProcessorTypeId::OS {
        return Ok(Processor::Os(OsProc::new(wid)));
    }
    if kind == ProcessorTypeId::THREAD {
        let tid: ThreadId = from_field(value, "tid")?;
        return Ok(Processor::Thread(ThreadProc::new(wid, tid)));
    }
    if !ext.processors.is_registered(kind) {
        return Err(WireError::UnknownProcessorVariant(kind));
    }
    let payload = BASE64.decode(field_str(value, "payload")?)?;
    Ok(Processor::Custom(CustomProc::new(kind, wid, payload)))
}

fn value_to_taint(value: &Value, ext: &Extensions) -> Result<Taint, WireError> {
    match field_u64(value, "k")? {
        TAINT_DEFAULT => Ok(Taint::DefaultEnabled),
        TAINT_TYPE => {
            let kind = u16::try_from(field_u64(value, "type")?)
                .map_err(|_| WireError::Field("type"))?;
            Ok(Taint::ProcessorType(ProcessorTypeId(kind)))
        }
        TAINT_CUSTOM => {
            let kind = u16::try_from(field_u64(value, "taint")?)
                .map_err(|_| WireError::Field("taint"))?;
            let kind = TaintTypeId(kind);
            if !ext.taints.is_registered(kind) {
                return Err(WireError::UnknownTaintVariant(kind));
            }
            let payload = BASE64.decode(field_str(value, "payload")?)?;
            Ok(Taint::Custom(CustomTaint::new(kind, payload)))
        }
        _ => Err(WireError::Field("k")),
    }
}

fn field<'a>(value: &'a Value, name: &'static str) -> Result<&'a Value, WireError> {
    value.get(name).ok_or(WireError::Field(name))
}

fn field_u64(value: &Value, name: &'static str) -> Result<u64, WireError> {
    field(value, name)?.as_u64().ok_or(WireError::Field(name))
}

fn field_str<'a>(value: &'a Value, name: &'static str) -> Result<&'a str, WireError> {
    field(value, name)?.as_str().ok_or(WireError::Field(name))
}

fn field_uuid(value: &Value) -> Result<NodeUuid, WireError> {
    from_field(value, "uuid")
}

fn from_field<T: serde::de::DeserializeOwned>(
    value: &Value,
    name: &'static str,
) -> Result<T, WireError> {
    serde_json::from_value(field(value, name)?.clone()).map_err(WireError::Malformed)
}
