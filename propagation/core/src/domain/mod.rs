// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Propagation Domain Layer
//!
//! Pure types and the collaborator contracts the propagation mechanism consumes.
//! No thread-local access happens here; see [`crate::infrastructure`] for that.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`security`] | `SecurityToken`, `SecurityService`, `IdentitySource`, `LoginError` |
//! | [`frame`] | `Attributes`, `ContextFrame`, `FrameStack` |
//! | [`resource_scope`] | `ResourceScope`, `ResourceScopeHolder` |
//! | [`context`] | `ExecutionContext` |
//! | [`task`] | `TaskDescriptor`, `TaskFailure`, `InvokeError`, `TaskListener` |
//! | [`config`] | `PropagationConfigManifest`, `PropagationPolicy` |

pub mod config;
pub mod context;
pub mod frame;
pub mod resource_scope;
pub mod security;
pub mod task;

pub use config::{PropagationConfigManifest, PropagationPolicy};
pub use context::ExecutionContext;
pub use frame::{Attributes, ContextFrame, FrameStack};
pub use resource_scope::{ResourceScope, ResourceScopeHolder};
pub use security::{
    IdentitySource, LoginError, ProvidedSecurityContext, SecurityContext, SecurityService,
    SecurityToken,
};
pub use task::{InvokeError, NoopTaskListener, TaskDescriptor, TaskFailure, TaskId, TaskListener};
