// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Thread-Local Security Service
//!
//! Per-thread security state plus the per-thread client identity used as the
//! fallback when nothing is bound. Identities are turned into bound state by a
//! [`Realm`].

use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::domain::security::{IdentitySource, LoginError, SecurityService, SecurityToken};

thread_local! {
    static SECURITY_STATE: RefCell<Option<SecurityToken>> = const { RefCell::new(None) };
    static CLIENT_IDENTITY: RefCell<Option<SecurityToken>> = const { RefCell::new(None) };
}

/// A named caller. The identity type understood by [`InMemoryRealm`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Authenticates an identity handle into the state bound on a thread.
pub trait Realm: Send + Sync {
    fn authenticate(&self, identity: &SecurityToken) -> Result<SecurityToken, LoginError>;
}

/// Binds every identity unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllRealm;

impl Realm for AcceptAllRealm {
    fn authenticate(&self, identity: &SecurityToken) -> Result<SecurityToken, LoginError> {
        Ok(identity.clone())
    }
}

/// Accepts [`Principal`] identities whose names have been registered.
#[derive(Debug, Default)]
pub struct InMemoryRealm {
    accepted: RwLock<HashSet<String>>,
}

impl InMemoryRealm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>) {
        self.accepted.write().insert(name.into());
    }

    pub fn revoke(&self, name: &str) -> bool {
        self.accepted.write().remove(name)
    }
}

impl Realm for InMemoryRealm {
    fn authenticate(&self, identity: &SecurityToken) -> Result<SecurityToken, LoginError> {
        let principal = identity
            .downcast_ref::<Principal>()
            .ok_or(LoginError::UnsupportedIdentity(identity.type_name()))?;
        if self.accepted.read().contains(principal.name()) {
            Ok(identity.clone())
        } else {
            Err(LoginError::Rejected(principal.name().to_string()))
        }
    }
}

pub struct ThreadLocalSecurityService {
    realm: Arc<dyn Realm>,
}

impl ThreadLocalSecurityService {
    pub fn new(realm: Arc<dyn Realm>) -> Self {
        Self { realm }
    }
}

impl SecurityService for ThreadLocalSecurityService {
    fn current_state(&self) -> Option<SecurityToken> {
        SECURITY_STATE.with(|slot| slot.borrow().clone())
    }

    fn set_state(&self, state: Option<SecurityToken>) {
        SECURITY_STATE.with(|slot| *slot.borrow_mut() = state);
    }

    fn associate(&self, identity: &SecurityToken) -> Result<(), LoginError> {
        let state = self.realm.authenticate(identity)?;
        debug!("Associated {:?} with current thread", identity);
        self.set_state(Some(state));
        Ok(())
    }

    fn disassociate(&self) {
        self.set_state(None);
    }
}

/// Per-thread client identity, consulted only when no state is bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIdentity;

impl ClientIdentity {
    /// Replace the calling thread's client identity, returning the previous one.
    pub fn set(identity: Option<SecurityToken>) -> Option<SecurityToken> {
        CLIENT_IDENTITY.with(|slot| slot.replace(identity))
    }

    pub fn get() -> Option<SecurityToken> {
        CLIENT_IDENTITY.with(|slot| slot.borrow().clone())
    }
}

impl IdentitySource for ClientIdentity {
    fn identity(&self) -> Option<SecurityToken> {
        Self::get()
    }
}
