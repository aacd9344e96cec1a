// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::task::{TaskDescriptor, TaskFailure, TaskListener};

/// Logs every lifecycle hook through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTaskListener;

fn elapsed_ms(task: &TaskDescriptor) -> i64 {
    (Utc::now() - task.submitted_at).num_milliseconds()
}

impl TaskListener for TracingTaskListener {
    fn task_submitted(&self, task: &TaskDescriptor) {
        info!(task_id = %task.id, task = %task.name, "Task submitted");
    }

    fn task_starting(&self, task: &TaskDescriptor) -> anyhow::Result<()> {
        info!(
            task_id = %task.id,
            task = %task.name,
            queued_ms = elapsed_ms(task),
            "Task starting"
        );
        Ok(())
    }

    fn task_aborted(&self, task: &TaskDescriptor, failure: &TaskFailure) -> anyhow::Result<()> {
        warn!(
            task_id = %task.id,
            task = %task.name,
            unrecoverable = failure.is_unrecoverable(),
            "Task aborted: {}",
            failure
        );
        Ok(())
    }

    fn task_done(&self, task: &TaskDescriptor, failure: Option<&TaskFailure>) -> anyhow::Result<()> {
        info!(
            task_id = %task.id,
            task = %task.name,
            elapsed_ms = elapsed_ms(task),
            failed = failure.is_some(),
            "Task done"
        );
        Ok(())
    }
}
