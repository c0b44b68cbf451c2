// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Walkthrough of the scope core on a simulated two-worker cluster.
//!
//! Builds the cluster context, registers an accelerator variant that
//! opted out of default placement, then shows how user specs meet down
//! to concrete processors - including the conflicts. Run with
//! `RUST_LOG=debug` to watch the registry and builder events.

use anyhow::Result;
use gridscope::cluster::{NodeUuid, ThreadId, WorkerId};
use gridscope::context::ClusterContext;
use gridscope::processors::{CustomProc, Processor, ProcessorTypeId, ThreadProc, VariantSpec};
use gridscope::scope::{
    constrain, decode_scope_lossy, encode_scope, Scope, ScopeArg, ScopeBuilder, ScopeSpec,
};

const RING: ProcessorTypeId = ProcessorTypeId(21);

fn thread_proc(wid: u64, tid: u32) -> Processor {
    Processor::Thread(ThreadProc::new(WorkerId(wid), ThreadId(tid)))
}

fn show_meet(label: &str, x: &Scope, y: &Scope, ctx: &ClusterContext) {
    let met = constrain(x, y, &ctx.extensions);
    let verdict = if met.is_invalid() { "✗" } else { "✓" };
    println!("  {} {}:", verdict, label);
    println!("      {}  ⊓  {}", x, y);
    println!("      = {}", met);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("🧭 gridscope - scope algebra walkthrough");
    println!("════════════════════════════════════════");

    // Two workers: worker 1 on node A with two threads, worker 2 on
    // node B with three threads and a ring accelerator that does not
    // accept work unless named explicitly.
    let ctx = ClusterContext::new();
    ctx.extensions
        .processors
        .register(RING, VariantSpec::new("ring", false))?;

    let node_a = NodeUuid::generate();
    let node_b = NodeUuid::generate();
    let ring = Processor::Custom(CustomProc::new(RING, WorkerId(2), b"ring-0".to_vec()));

    ctx.workers.worker_joined(
        WorkerId(1),
        node_a,
        vec![thread_proc(1, 1), thread_proc(1, 2)],
    );
    ctx.workers.worker_joined(
        WorkerId(2),
        node_b,
        vec![
            thread_proc(2, 1),
            thread_proc(2, 2),
            thread_proc(2, 3),
            ring.clone(),
        ],
    );

    let builder = ScopeBuilder::new(&ctx);

    let w1 = builder.positional([ScopeArg::Worker(WorkerId(1))])?;
    let w2 = builder.positional([ScopeArg::Worker(WorkerId(2))])?;
    let default = builder.positional([ScopeArg::Default])?;
    let ring_exact = builder.positional([ScopeArg::Processor(ring)])?;
    let t12 = builder.positional([ScopeArg::Processor(thread_proc(1, 2))])?;
    let spread = builder.from_spec(&ScopeSpec::from_yaml_str("workers: [1, 2]\nthreads: [1]\n")?)?;

    println!("\n📐 Meets over the two-worker cluster:");
    show_meet("disjoint workers conflict", &w1, &w2, &ctx);
    show_meet("a worker narrows to one of its threads", &w1, &t12, &ctx);
    show_meet("the default taint admits a thread", &default, &t12, &ctx);
    show_meet("the default taint rejects the opted-out ring", &default, &ring_exact, &ctx);
    show_meet("a spread pins down per-worker threads", &spread, &w2, &ctx);

    // Scopes travel between workers; an unknown variant on the receiving
    // side degrades to invalid instead of crashing the scheduler.
    println!("\n📦 Wire transfer:");
    let bytes = encode_scope(&ring_exact)?;
    let at_home = decode_scope_lossy(&bytes, &ctx.extensions);
    println!("  local decode:   {}", at_home);
    let stranger = ClusterContext::new();
    let abroad = decode_scope_lossy(&bytes, &stranger.extensions);
    println!("  foreign decode: {}", abroad);

    println!("\n🎉 Done.");
    Ok(())
}
