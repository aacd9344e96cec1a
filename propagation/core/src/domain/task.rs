// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Identity, Failures and Lifecycle Hooks
//!
//! ## Failure Taxonomy
//!
//! | [`TaskFailure`] | Leaves `invoke` as |
//! |-----------------|--------------------|
//! | `Checked` | [`InvokeError::Checked`], unchanged |
//! | `Unrecoverable` (panic) | the same panic, resumed |
//! | `Other` | [`InvokeError::Wrapped`], original kept as `source` |
//!
//! Binding failures never reach the task body and surface as
//! [`InvokeError::Binding`]. Errors returned by lifecycle hooks surface as
//! [`InvokeError::Hook`].

use std::any::Any;
use std::fmt;
use std::panic;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::security::LoginError;

/// Unique identifier for a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What lifecycle hooks are told about the task they are observing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub name: String,
    pub submitted_at: DateTime<Utc>,
}

impl TaskDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Failure of a task body, tagged by how it must cross the `invoke` boundary.
pub enum TaskFailure {
    /// A declared failure the caller is expected to handle.
    Checked(anyhow::Error),
    /// A panic payload caught while the body or a hook was running.
    Unrecoverable(Box<dyn Any + Send>),
    /// Any other failure.
    Other(anyhow::Error),
}

impl TaskFailure {
    pub fn checked(error: impl Into<anyhow::Error>) -> Self {
        Self::Checked(error.into())
    }

    pub fn other(error: impl Into<anyhow::Error>) -> Self {
        Self::Other(error.into())
    }

    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable(_))
    }

    /// Human-readable message, including the text of string panic payloads.
    pub fn message(&self) -> String {
        match self {
            Self::Checked(error) | Self::Other(error) => error.to_string(),
            Self::Unrecoverable(payload) => panic_message(payload.as_ref()).to_string(),
        }
    }

    /// Raise this failure the way `invoke` reports it. A panic payload is resumed
    /// on the calling thread and never returns.
    pub fn rethrow<T>(self) -> Result<T, InvokeError> {
        match self {
            Self::Checked(error) => Err(InvokeError::Checked(error)),
            Self::Other(error) => Err(InvokeError::Wrapped {
                message: error.to_string(),
                source: error,
            }),
            Self::Unrecoverable(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<E> From<E> for TaskFailure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::Checked(anyhow::Error::new(error))
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checked(error) => f.debug_tuple("Checked").field(error).finish(),
            Self::Unrecoverable(payload) => f
                .debug_tuple("Unrecoverable")
                .field(&panic_message(payload.as_ref()))
                .finish(),
            Self::Other(error) => f.debug_tuple("Other").field(error).finish(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Failure reported by [`crate::application::TaskRunner::invoke`].
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The security subsystem refused to bind the captured identity.
    #[error("unable to associate the captured identity with the executing thread")]
    Binding(#[source] LoginError),

    #[error(transparent)]
    Checked(anyhow::Error),

    #[error("{message}")]
    Wrapped {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task lifecycle hook `{hook}` failed")]
    Hook {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Observer of a task's lifecycle, supplied by the task's owner.
///
/// `task_submitted` runs on the submitting thread. The other hooks run on the
/// executing thread while the task's propagated context is still in place.
pub trait TaskListener: Send + Sync {
    fn task_submitted(&self, _task: &TaskDescriptor) {}

    fn task_starting(&self, _task: &TaskDescriptor) -> anyhow::Result<()> {
        Ok(())
    }

    fn task_aborted(&self, _task: &TaskDescriptor, _failure: &TaskFailure) -> anyhow::Result<()> {
        Ok(())
    }

    fn task_done(&self, _task: &TaskDescriptor, _failure: Option<&TaskFailure>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTaskListener;

impl TaskListener for NoopTaskListener {}
