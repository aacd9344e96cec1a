// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resource Scope
//!
//! The scope a thread resolves resources against. Scopes form a tree rooted at
//! [`ResourceScope::system`]; every thread starts in the system scope.

use std::fmt;
use std::sync::{Arc, LazyLock};

static SYSTEM_SCOPE: LazyLock<ResourceScope> = LazyLock::new(|| {
    ResourceScope(Arc::new(ScopeNode {
        name: "system".to_string(),
        parent: None,
    }))
});

struct ScopeNode {
    name: String,
    parent: Option<ResourceScope>,
}

/// Reference to a resource-loading scope. Equality is identity.
#[derive(Clone)]
pub struct ResourceScope(Arc<ScopeNode>);

impl ResourceScope {
    /// The process-wide root scope.
    pub fn system() -> Self {
        SYSTEM_SCOPE.clone()
    }

    /// A new scope delegating to `self`.
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self(Arc::new(ScopeNode {
            name: name.into(),
            parent: Some(self.clone()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&ResourceScope> {
        self.0.parent.as_ref()
    }

    /// Slash-separated names from the root down to this scope.
    pub fn path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}/{}", parent.path(), self.name()),
            None => self.name().to_string(),
        }
    }
}

impl PartialEq for ResourceScope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ResourceScope {}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceScope({})", self.path())
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Holder of the calling thread's resource scope.
pub trait ResourceScopeHolder: Send + Sync {
    fn current(&self) -> ResourceScope;
    fn set(&self, scope: ResourceScope);
}
