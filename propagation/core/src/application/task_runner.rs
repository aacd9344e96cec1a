// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Runner
//!
//! Wraps one unit of work submitted to a shared worker pool. The runner captures
//! the submitting thread's [`ContextSnapshot`] when it is constructed; whichever
//! thread later calls [`TaskRunner::invoke`] runs the work inside that context.
//!
//! ## Invoke Sequence
//! | Step | Runs when |
//! |------|-----------|
//! | `enter` | always; a binding failure stops here |
//! | `task_starting` hook | after enter |
//! | work | after a successful `task_starting` |
//! | `task_aborted` hook | the hook or the work failed |
//! | `task_done` hook | always, with the failure if any |
//! | `exit` | always, last, even while a panic unwinds |
//!
//! Hooks observe the task's propagated context; `exit` restores the worker's own
//! state before anything leaves `invoke`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

use super::snapshot::ContextSnapshot;
use crate::domain::config::PropagationPolicy;
use crate::domain::context::ExecutionContext;
use crate::domain::task::{panic_message, InvokeError, TaskDescriptor, TaskFailure, TaskListener};

pub struct TaskRunner {
    descriptor: TaskDescriptor,
    snapshot: Arc<ContextSnapshot>,
    context: ExecutionContext,
    listener: Arc<dyn TaskListener>,
}

/// Failure raised by a lifecycle hook after the work finished.
enum HookFailure {
    Error {
        hook: &'static str,
        source: anyhow::Error,
    },
    Panic(Box<dyn std::any::Any + Send>),
}

impl HookFailure {
    fn raise<T>(self) -> Result<T, InvokeError> {
        match self {
            Self::Error { hook, source } => Err(InvokeError::Hook { hook, source }),
            Self::Panic(payload) => panic::resume_unwind(payload),
        }
    }
}

impl TaskRunner {
    /// Capture the calling thread's context for a task named `name`.
    pub fn new(
        name: impl Into<String>,
        context: ExecutionContext,
        listener: Arc<dyn TaskListener>,
    ) -> Self {
        Self::with_policy(name, context, listener, &PropagationPolicy::default())
    }

    pub fn with_policy(
        name: impl Into<String>,
        context: ExecutionContext,
        listener: Arc<dyn TaskListener>,
        policy: &PropagationPolicy,
    ) -> Self {
        let snapshot = Arc::new(ContextSnapshot::capture_with_policy(&context, policy));
        Self {
            descriptor: TaskDescriptor::new(name),
            snapshot,
            context,
            listener,
        }
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    pub fn snapshot(&self) -> &Arc<ContextSnapshot> {
        &self.snapshot
    }

    /// Run `work` on the calling thread inside the captured context.
    ///
    /// # Errors
    ///
    /// - `Binding`: the captured identity was rejected; `work` never ran
    /// - `Checked`: `work` (or `task_starting`) returned a checked failure
    /// - `Wrapped`: `work` returned [`TaskFailure::Other`]
    /// - `Hook`: `task_aborted` or `task_done` returned an error; it supersedes
    ///   any failure of the work
    ///
    /// # Panics
    ///
    /// A panic raised by `work` or by a hook is resumed unchanged once the
    /// worker's state has been restored.
    pub fn invoke<T, F>(&self, work: F) -> Result<T, InvokeError>
    where
        F: FnOnce() -> Result<T, TaskFailure>,
    {
        let task = &self.descriptor;
        let token = self
            .snapshot
            .enter(&self.context)
            .map_err(InvokeError::Binding)?;
        let restore = scopeguard::guard(token, |token| self.snapshot.exit(&self.context, token));

        debug!(task_id = %task.id, task = %task.name, "Task starting");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.listener
                .task_starting(task)
                .map_err(TaskFailure::Checked)?;
            work()
        }))
        .unwrap_or_else(|payload| Err(TaskFailure::Unrecoverable(payload)));

        let mut hook_failure = None;
        if let Err(failure) = &outcome {
            debug!(task_id = %task.id, "Task failed: {}", failure);
            hook_failure = run_hook("task_aborted", || self.listener.task_aborted(task, failure));
        }
        let failure = outcome.as_ref().err();
        if let Some(done_failure) = run_hook("task_done", || self.listener.task_done(task, failure)) {
            hook_failure = Some(done_failure);
        }

        drop(restore);

        if let Some(hook_failure) = hook_failure {
            if let Err(superseded) = &outcome {
                warn!(task_id = %task.id, "Task failure superseded by hook failure: {}", superseded);
            }
            return hook_failure.raise();
        }

        debug!(task_id = %task.id, failed = outcome.is_err(), "Task done");
        outcome.or_else(TaskFailure::rethrow)
    }
}

fn run_hook<H>(hook: &'static str, call: H) -> Option<HookFailure>
where
    H: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => None,
        Ok(Err(source)) => {
            warn!("Lifecycle hook {} failed: {:#}", hook, source);
            Some(HookFailure::Error { hook, source })
        }
        Err(payload) => {
            warn!("Lifecycle hook {} panicked: {}", hook, panic_message(payload.as_ref()));
            Some(HookFailure::Panic(payload))
        }
    }
}
