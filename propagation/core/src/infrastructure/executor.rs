// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Managed Executor Adapter
//!
//! Hands [`TaskRunner`]s to Tokio's blocking pool. The runner is built on the
//! submitting thread, so the snapshot reflects the submitter's ambient state;
//! Tokio decides which pool thread runs it. Queueing, sizing and fairness are
//! entirely Tokio's.

use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::task_runner::TaskRunner;
use crate::domain::config::{ExecutorSettings, PropagationPolicy};
use crate::domain::context::ExecutionContext;
use crate::domain::task::{InvokeError, TaskFailure, TaskListener};

/// Build a multi-thread runtime whose blocking pool follows `settings`.
pub fn build_runtime(settings: &ExecutorSettings) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(settings.max_blocking_threads)
        .thread_name(settings.thread_name.clone())
        .build()
}

#[derive(Clone)]
pub struct ManagedExecutor {
    name: String,
    context: ExecutionContext,
    policy: PropagationPolicy,
    handle: Handle,
}

impl ManagedExecutor {
    pub fn new(
        name: impl Into<String>,
        context: ExecutionContext,
        policy: PropagationPolicy,
        handle: Handle,
    ) -> Self {
        Self {
            name: name.into(),
            context,
            policy,
            handle,
        }
    }

    /// Executor on the runtime the caller is currently inside.
    ///
    /// # Panics
    ///
    /// When called outside a Tokio runtime.
    pub fn current(name: impl Into<String>, context: ExecutionContext, policy: PropagationPolicy) -> Self {
        Self::new(name, context, policy, Handle::current())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capture the calling thread's context and run `work` inside it on a
    /// blocking-pool thread.
    ///
    /// A panic in `work` surfaces as a panicking [`tokio::task::JoinError`] once
    /// the pool thread's own state has been restored.
    pub fn submit<T, F>(
        &self,
        task_name: impl Into<String>,
        listener: Arc<dyn TaskListener>,
        work: F,
    ) -> JoinHandle<Result<T, InvokeError>>
    where
        F: FnOnce() -> Result<T, TaskFailure> + Send + 'static,
        T: Send + 'static,
    {
        let runner = TaskRunner::with_policy(task_name, self.context.clone(), listener.clone(), &self.policy);
        listener.task_submitted(runner.descriptor());
        debug!(
            executor = %self.name,
            task_id = %runner.descriptor().id,
            "Dispatching task to blocking pool"
        );
        self.handle.spawn_blocking(move || runner.invoke(work))
    }
}
