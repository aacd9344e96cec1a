// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Thread-local implementations of the collaborator contracts, a tracing
//! lifecycle listener, and the executor adapter that hands runners to Tokio's
//! blocking pool.

pub mod executor;
pub mod frames;
pub mod listener;
pub mod resource_scope;
pub mod security;

use std::sync::Arc;

use crate::domain::context::ExecutionContext;
use frames::ThreadFrameStack;
use resource_scope::ThreadResourceScope;
use security::{AcceptAllRealm, ClientIdentity, Realm, ThreadLocalSecurityService};

/// Context handle backed by thread-locals, binding any identity as-is.
pub fn thread_local_context() -> ExecutionContext {
    thread_local_context_with_realm(Arc::new(AcceptAllRealm))
}

/// Context handle backed by thread-locals, binding identities through `realm`.
pub fn thread_local_context_with_realm(realm: Arc<dyn Realm>) -> ExecutionContext {
    ExecutionContext::new(
        Arc::new(ThreadLocalSecurityService::new(realm)),
        Arc::new(ClientIdentity),
        Arc::new(ThreadFrameStack),
        Arc::new(ThreadResourceScope),
    )
}
