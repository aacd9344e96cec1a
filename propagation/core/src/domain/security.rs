// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Security Subsystem Contract
//!
//! The propagation mechanism never inspects security state. It only moves opaque
//! [`SecurityToken`]s between threads through the [`SecurityService`] contract:
//!
//! - **state transfer**: read the current state, install another, put the old one back.
//! - **association**: bind an identity handle to an unbound thread, later unbind it.
//!
//! [`IdentitySource`] is consulted only when a thread has no bound state.

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque value owned by the security subsystem: either a full security state
/// or an identity handle not yet bound to any thread.
///
/// Cloning is cheap and equality is identity: two tokens are equal only when
/// they share the same underlying value.
#[derive(Clone)]
pub struct SecurityToken {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl SecurityToken {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// Borrow the wrapped value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Fully qualified name of the wrapped type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for SecurityToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Eq for SecurityToken {}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityToken({} @ {:p})", self.type_name, Arc::as_ptr(&self.value))
    }
}

/// Security sub-context attached to a [`crate::domain::ContextFrame`] by the
/// security layer of the submitting thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub subject: SecurityToken,
}

impl SecurityContext {
    pub fn new(subject: SecurityToken) -> Self {
        Self { subject }
    }
}

/// A [`SecurityContext`] that was handed to a worker frame by propagation rather
/// than established on that thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedSecurityContext {
    pub context: SecurityContext,
}

impl ProvidedSecurityContext {
    pub fn new(context: SecurityContext) -> Self {
        Self { context }
    }
}

/// Rejection raised by [`SecurityService::associate`].
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("identity rejected: {0}")]
    Rejected(String),

    #[error("identity of type {0} is not recognised")]
    UnsupportedIdentity(&'static str),
}

/// Thread-scoped security state, as exposed by the security subsystem.
///
/// Every operation acts on the calling thread.
pub trait SecurityService: Send + Sync {
    /// State bound to the calling thread, if any.
    fn current_state(&self) -> Option<SecurityToken>;

    /// Replace the calling thread's state. `None` leaves the thread unbound.
    fn set_state(&self, state: Option<SecurityToken>);

    /// Bind an identity handle to the calling thread.
    ///
    /// # Errors
    ///
    /// [`LoginError`] when the subsystem refuses the identity. The thread is left
    /// unbound in that case.
    fn associate(&self, identity: &SecurityToken) -> Result<(), LoginError>;

    /// Remove whatever binding the calling thread holds.
    fn disassociate(&self);
}

/// Fallback identity provider consulted when no security state is bound.
pub trait IdentitySource: Send + Sync {
    fn identity(&self) -> Option<SecurityToken>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_equality_is_identity() {
        let token = SecurityToken::new("alice".to_string());
        let same = token.clone();
        let lookalike = SecurityToken::new("alice".to_string());

        assert_eq!(token, same);
        assert_ne!(token, lookalike);
    }

    #[test]
    fn test_token_downcast() {
        let token = SecurityToken::new(42_u32);

        assert_eq!(token.downcast_ref::<u32>(), Some(&42));
        assert!(token.downcast_ref::<String>().is_none());
        assert_eq!(token.type_name(), "u32");
    }
}
