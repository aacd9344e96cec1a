// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Propagation probe
//!
//! Binds a client identity, a request frame and a resource scope on the main
//! thread, submits tasks through the executor adapter, and prints what each
//! worker thread saw while the task ran.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

use ambient_core::domain::config::PropagationConfigManifest;
use ambient_core::infrastructure::executor::ManagedExecutor;
use ambient_core::infrastructure::listener::TracingTaskListener;
use ambient_core::infrastructure::security::{ClientIdentity, InMemoryRealm, Principal};
use ambient_core::infrastructure::thread_local_context_with_realm;
use ambient_core::{
    Attributes, ContextFrame, ExecutionContext, InvokeError, ResourceScope, SecurityToken,
};

#[derive(Args)]
pub struct ProbeArgs {
    /// Number of tasks to submit
    #[arg(long, default_value_t = 4)]
    tasks: usize,

    /// Principal bound as the client identity
    #[arg(long, default_value = "probe")]
    principal: String,

    /// Leave the principal unregistered so every task fails to bind
    #[arg(long)]
    reject: bool,
}

/// Request marker carried in the main thread's frame.
struct ProbeRequest(String);

struct Observation {
    thread: String,
    principal: Option<String>,
    request: Option<String>,
    scope: String,
}

/// The calling thread's ambient state, frames compared by identity.
#[derive(PartialEq)]
struct AmbientState {
    state: Option<SecurityToken>,
    frame: Option<usize>,
    scope: ResourceScope,
}

impl AmbientState {
    fn of(ctx: &ExecutionContext) -> Self {
        Self {
            state: ctx.security().current_state(),
            frame: ctx
                .frames()
                .current_frame()
                .map(|frame| Arc::as_ptr(&frame) as usize),
            scope: ctx.scopes().current(),
        }
    }
}

fn observe(ctx: &ExecutionContext) -> Observation {
    let current = std::thread::current();
    Observation {
        thread: current.name().unwrap_or("unnamed").to_string(),
        principal: ctx
            .security()
            .current_state()
            .and_then(|state| state.downcast_ref::<Principal>().map(|p| p.name().to_string())),
        request: ctx
            .frames()
            .current_frame()
            .and_then(|frame| frame.get::<ProbeRequest>().map(|r| r.0.clone())),
        scope: ctx.scopes().current().path(),
    }
}

fn or_none(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(none)".to_string())
}

pub async fn run(args: ProbeArgs, config: &PropagationConfigManifest) -> Result<()> {
    let realm = Arc::new(InMemoryRealm::new());
    if !args.reject {
        realm.register(args.principal.clone());
    }
    let ctx = thread_local_context_with_realm(realm);

    let prior_identity = ClientIdentity::set(Some(SecurityToken::new(Principal::new(
        args.principal.clone(),
    ))));
    let prior_scope = ctx.scopes().current();
    ctx.scopes().set(prior_scope.child("probe"));
    let mut attributes = Attributes::new();
    attributes.insert(ProbeRequest(format!("probe-{}", std::process::id())));
    let prior_frame = ctx.frames().enter_frame(Arc::new(ContextFrame::new(attributes)));

    let before = AmbientState::of(&ctx);
    let executor = ManagedExecutor::new(
        config.spec.executor.name.clone(),
        ctx.clone(),
        config.spec.propagation,
        Handle::current(),
    );
    info!(
        executor = executor.name(),
        tasks = args.tasks,
        principal = %args.principal,
        "Starting propagation probe"
    );

    let handles: Vec<_> = (0..args.tasks)
        .map(|i| {
            let worker_ctx = ctx.clone();
            executor.submit(format!("probe-{}", i), Arc::new(TracingTaskListener), move || {
                Ok(observe(&worker_ctx))
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut refused = 0;
    println!("{}", "Worker observations:".bold());
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(seen)) => {
                succeeded += 1;
                println!(
                    "  {} task {} on {}: principal={} request={} scope={}",
                    "✓".green(),
                    i,
                    seen.thread,
                    or_none(&seen.principal),
                    or_none(&seen.request),
                    seen.scope
                );
            }
            Ok(Err(error @ InvokeError::Binding(_))) => {
                refused += 1;
                println!(
                    "  {} task {}: {:#}",
                    "✗".yellow(),
                    i,
                    anyhow::Error::from(error)
                );
            }
            Ok(Err(error)) => {
                println!("  {} task {}: {:#}", "✗".red(), i, anyhow::Error::from(error));
            }
            Err(join) => {
                println!("  {} task {}: {}", "✗".red(), i, join);
            }
        }
    }
    println!();

    let unchanged = AmbientState::of(&ctx) == before;

    ctx.frames().exit_frame(prior_frame);
    ctx.scopes().set(prior_scope);
    ClientIdentity::set(prior_identity);

    if unchanged {
        println!("{}", "✓ Main thread context unchanged".green());
    } else {
        bail!("main thread context changed while tasks ran");
    }

    let expected = if args.reject { refused } else { succeeded };
    if expected != args.tasks {
        bail!(
            "{} of {} tasks behaved as expected ({} succeeded, {} refused at binding)",
            expected,
            args.tasks,
            succeeded,
            refused
        );
    }

    if args.reject {
        println!(
            "{}",
            format!("✓ All {} tasks refused at binding", args.tasks).green()
        );
    } else {
        println!(
            "{}",
            format!("✓ All {} tasks ran as {}", args.tasks, args.principal).green()
        );
    }

    Ok(())
}
