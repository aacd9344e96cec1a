// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::cell::RefCell;

use crate::domain::resource_scope::{ResourceScope, ResourceScopeHolder};

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<ResourceScope>> = const { RefCell::new(None) };
}

/// [`ResourceScopeHolder`] over a per-thread slot. Threads that never set a
/// scope resolve against [`ResourceScope::system`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadResourceScope;

impl ResourceScopeHolder for ThreadResourceScope {
    fn current(&self) -> ResourceScope {
        CURRENT_SCOPE.with(|slot| slot.borrow().clone().unwrap_or_else(ResourceScope::system))
    }

    fn set(&self, scope: ResourceScope) {
        CURRENT_SCOPE.with(|slot| *slot.borrow_mut() = Some(scope));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_system_scope() {
        assert_eq!(ThreadResourceScope.current(), ResourceScope::system());

        let app = ResourceScope::system().child("app");
        ThreadResourceScope.set(app.clone());
        assert_eq!(ThreadResourceScope.current(), app);
    }
}
