// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Execution Context Handle
//!
//! Bundles the collaborators that own a thread's ambient state so the
//! propagation protocol receives them explicitly instead of reaching for
//! process-wide singletons. The handle is shared between the submitting thread
//! and the worker; each collaborator acts on whichever thread calls it.

use std::fmt;
use std::sync::Arc;

use super::frame::FrameStack;
use super::resource_scope::ResourceScopeHolder;
use super::security::{IdentitySource, SecurityService};

#[derive(Clone)]
pub struct ExecutionContext {
    security: Arc<dyn SecurityService>,
    identities: Arc<dyn IdentitySource>,
    frames: Arc<dyn FrameStack>,
    scopes: Arc<dyn ResourceScopeHolder>,
}

impl ExecutionContext {
    pub fn new(
        security: Arc<dyn SecurityService>,
        identities: Arc<dyn IdentitySource>,
        frames: Arc<dyn FrameStack>,
        scopes: Arc<dyn ResourceScopeHolder>,
    ) -> Self {
        Self {
            security,
            identities,
            frames,
            scopes,
        }
    }

    pub fn security(&self) -> &dyn SecurityService {
        self.security.as_ref()
    }

    pub fn identities(&self) -> &dyn IdentitySource {
        self.identities.as_ref()
    }

    pub fn frames(&self) -> &dyn FrameStack {
        self.frames.as_ref()
    }

    pub fn scopes(&self) -> &dyn ResourceScopeHolder {
        self.scopes.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext").finish_non_exhaustive()
    }
}
