// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Context Snapshot: enter/exit protocol
//!
//! A [`ContextSnapshot`] is captured once on the submitting thread and never
//! changes afterwards. [`ContextSnapshot::enter`] transplants it onto the calling
//! thread and returns a [`RestoreToken`] describing exactly what was replaced;
//! [`ContextSnapshot::exit`] consumes that token and reverses the transplant.
//!
//! ## Enter Order
//! 1. resource scope
//! 2. security state (associate, or swap)
//! 3. context frame, linked under the executing thread's active frame
//!
//! Exit reverses the three substitutions in the opposite order.
//!
//! A token is bound to the thread that produced it (`RestoreToken` is not `Send`)
//! and consumed by value, so every enter pairs with exactly one exit on the same
//! thread. A snapshot may be entered again once the previous token was consumed.

use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::domain::config::PropagationPolicy;
use crate::domain::context::ExecutionContext;
use crate::domain::frame::ContextFrame;
use crate::domain::resource_scope::ResourceScope;
use crate::domain::security::{LoginError, ProvidedSecurityContext, SecurityContext, SecurityToken};

/// How the submitting thread's security state is carried to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityCapture {
    /// The submitter had no bound state but an identity was available: bind it on
    /// entry, unbind it on exit and reinstate the worker's own bound state.
    Associate(SecurityToken),
    /// The submitter's bound state (possibly none): swap it in on entry and swap
    /// the worker's own state back on exit.
    Transfer(Option<SecurityToken>),
}

/// Immutable capture of a thread's ambient state.
#[derive(Debug)]
pub struct ContextSnapshot {
    security: Option<SecurityCapture>,
    security_context: Option<SecurityContext>,
    frame: Option<Arc<ContextFrame>>,
    resource_scope: Option<ResourceScope>,
}

#[derive(Debug)]
enum SecurityRestore {
    Untouched,
    /// Unbind the associated identity, then reinstate whatever the worker had bound.
    Disassociate { prior: Option<SecurityToken> },
    Restore(Option<SecurityToken>),
}

#[derive(Debug)]
enum FrameRestore {
    Untouched,
    Pop {
        installed: Arc<ContextFrame>,
        prior: Option<Arc<ContextFrame>>,
    },
}

/// Single-use record of what [`ContextSnapshot::enter`] replaced on the
/// executing thread.
#[must_use = "a RestoreToken must be handed back to ContextSnapshot::exit"]
#[derive(Debug)]
pub struct RestoreToken {
    resource_scope: Option<ResourceScope>,
    security: SecurityRestore,
    frame: FrameRestore,
    _thread_bound: PhantomData<*const ()>,
}

impl RestoreToken {
    /// Whether entering pushed a frame that exiting will pop.
    #[cfg(test)]
    pub(crate) fn pushed_frame(&self) -> bool {
        matches!(self.frame, FrameRestore::Pop { .. })
    }
}

impl ContextSnapshot {
    /// Capture the calling thread's ambient state, propagating every facet.
    pub fn capture(ctx: &ExecutionContext) -> Self {
        Self::capture_with_policy(ctx, &PropagationPolicy::default())
    }

    /// Capture the calling thread's ambient state. Facets excluded by `policy`
    /// are recorded as "leave unchanged".
    pub fn capture_with_policy(ctx: &ExecutionContext, policy: &PropagationPolicy) -> Self {
        let security = policy.security.then(|| match ctx.security().current_state() {
            Some(state) => SecurityCapture::Transfer(Some(state)),
            None => match ctx.identities().identity() {
                Some(identity) => SecurityCapture::Associate(identity),
                None => SecurityCapture::Transfer(None),
            },
        });

        let frame = if policy.frames {
            ctx.frames().current_frame()
        } else {
            None
        };
        let security_context = frame
            .as_ref()
            .filter(|_| policy.security)
            .and_then(|frame| frame.get::<SecurityContext>().cloned());

        let resource_scope = policy.resource_scope.then(|| ctx.scopes().current());

        debug!(
            associate = matches!(security, Some(SecurityCapture::Associate(_))),
            frame = frame.is_some(),
            resource_scope = ?resource_scope,
            "Captured context snapshot"
        );

        Self {
            security,
            security_context,
            frame,
            resource_scope,
        }
    }

    /// `true` when entering binds an identity rather than swapping state.
    pub fn is_associate(&self) -> bool {
        matches!(self.security, Some(SecurityCapture::Associate(_)))
    }

    pub fn security(&self) -> Option<&SecurityCapture> {
        self.security.as_ref()
    }

    pub fn frame(&self) -> Option<&Arc<ContextFrame>> {
        self.frame.as_ref()
    }

    pub fn resource_scope(&self) -> Option<&ResourceScope> {
        self.resource_scope.as_ref()
    }

    /// The snapshot that pushed `frame`, if it was pushed by [`Self::enter`].
    pub fn owning(frame: &ContextFrame) -> Option<&Arc<ContextSnapshot>> {
        frame.get::<Arc<ContextSnapshot>>()
    }

    /// Transplant this snapshot onto the calling thread.
    ///
    /// # Errors
    ///
    /// [`LoginError`] when the captured identity cannot be bound. The resource
    /// scope substitution is rolled back first and no frame is pushed, so the
    /// thread is left as it was.
    pub fn enter(self: &Arc<Self>, ctx: &ExecutionContext) -> Result<RestoreToken, LoginError> {
        let resource_scope = self.resource_scope.as_ref().map(|scope| {
            let prior = ctx.scopes().current();
            ctx.scopes().set(scope.clone());
            prior
        });

        let security = match &self.security {
            None => SecurityRestore::Untouched,
            Some(SecurityCapture::Associate(identity)) => {
                let prior = ctx.security().current_state();
                if let Err(err) = ctx.security().associate(identity) {
                    error!("Failed to associate {:?} with executing thread: {}", identity, err);
                    if let Some(prior) = resource_scope {
                        ctx.scopes().set(prior);
                    }
                    return Err(err);
                }
                SecurityRestore::Disassociate { prior }
            }
            Some(SecurityCapture::Transfer(state)) => {
                let prior = ctx.security().current_state();
                ctx.security().set_state(state.clone());
                SecurityRestore::Restore(prior)
            }
        };

        let frame = match &self.frame {
            None => FrameRestore::Untouched,
            Some(template) => {
                let active = ctx.frames().current_frame();
                let mut frame = ContextFrame::derive(template, active.as_ref());
                frame.attributes_mut().insert(Arc::clone(self));
                if let Some(security_context) = &self.security_context {
                    frame
                        .attributes_mut()
                        .insert(ProvidedSecurityContext::new(security_context.clone()));
                }
                let installed = Arc::new(frame);
                let prior = ctx.frames().enter_frame(Arc::clone(&installed));
                FrameRestore::Pop { installed, prior }
            }
        };

        debug!(?security, pushed_frame = matches!(frame, FrameRestore::Pop { .. }), "Entered context snapshot");

        Ok(RestoreToken {
            resource_scope,
            security,
            frame,
            _thread_bound: PhantomData,
        })
    }

    /// Reverse the transplant recorded in `token`.
    ///
    /// If a nested frame is still active when the frame pushed by `enter` is
    /// popped, a warning is logged and that nested frame is dropped along with
    /// it; the prior frame becomes active regardless.
    pub fn exit(&self, ctx: &ExecutionContext, token: RestoreToken) {
        let RestoreToken {
            resource_scope,
            security,
            frame,
            ..
        } = token;

        if let FrameRestore::Pop { installed, prior } = frame {
            let popped = ctx.frames().exit_frame(prior);
            if !popped.is_some_and(|popped| Arc::ptr_eq(&popped, &installed)) {
                warn!("Context frame popped out of order; a nested frame was left active");
            }
        }

        match security {
            SecurityRestore::Untouched => {}
            SecurityRestore::Disassociate { prior } => {
                ctx.security().disassociate();
                if prior.is_some() {
                    ctx.security().set_state(prior);
                }
            }
            SecurityRestore::Restore(prior) => ctx.security().set_state(prior),
        }

        if let Some(prior) = resource_scope {
            ctx.scopes().set(prior);
        }

        debug!("Exited context snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::{Attributes, FrameStack};
    use crate::domain::resource_scope::ResourceScopeHolder;
    use crate::infrastructure::frames::ThreadFrameStack;
    use crate::infrastructure::resource_scope::ThreadResourceScope;
    use crate::infrastructure::security::{ClientIdentity, InMemoryRealm, Principal};
    use crate::infrastructure::thread_local_context_with_realm;

    #[derive(Debug, PartialEq)]
    struct RequestId(&'static str);

    fn realm_with(names: &[&str]) -> Arc<InMemoryRealm> {
        let realm = Arc::new(InMemoryRealm::new());
        for name in names {
            realm.register(*name);
        }
        realm
    }

    fn request_frame(id: &'static str) -> Arc<ContextFrame> {
        let mut attributes = Attributes::new();
        attributes.insert(RequestId(id));
        Arc::new(ContextFrame::new(attributes))
    }

    #[test]
    fn test_capture_prefers_bound_state() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        let state = SecurityToken::new(Principal::new("alice"));
        ctx.security().set_state(Some(state.clone()));
        ClientIdentity::set(Some(SecurityToken::new(Principal::new("bob"))));

        let snapshot = ContextSnapshot::capture(&ctx);

        assert!(!snapshot.is_associate());
        assert_eq!(snapshot.security(), Some(&SecurityCapture::Transfer(Some(state))));
    }

    #[test]
    fn test_capture_falls_back_to_identity() {
        let ctx = thread_local_context_with_realm(realm_with(&["bob"]));
        let identity = SecurityToken::new(Principal::new("bob"));
        ClientIdentity::set(Some(identity.clone()));

        let snapshot = ContextSnapshot::capture(&ctx);

        assert!(snapshot.is_associate());
        assert_eq!(snapshot.security(), Some(&SecurityCapture::Associate(identity)));
    }

    #[test]
    fn test_capture_without_state_or_identity_transfers_none() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        let snapshot = ContextSnapshot::capture(&ctx);

        assert_eq!(snapshot.security(), Some(&SecurityCapture::Transfer(None)));
        assert!(snapshot.frame().is_none());
        assert_eq!(snapshot.resource_scope(), Some(&ResourceScope::system()));
    }

    #[test]
    fn test_transfer_enter_exit_restores_worker_state() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        let submitter_state = SecurityToken::new(Principal::new("alice"));
        let submitter_scope = ResourceScope::system().child("app");
        ctx.security().set_state(Some(submitter_state.clone()));
        ctx.scopes().set(submitter_scope.clone());
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));

        // now act as the worker
        let worker_state = SecurityToken::new(Principal::new("worker"));
        let worker_scope = ResourceScope::system().child("pool");
        ctx.security().set_state(Some(worker_state.clone()));
        ctx.scopes().set(worker_scope.clone());

        let token = snapshot.enter(&ctx).unwrap();
        assert_eq!(ctx.security().current_state(), Some(submitter_state));
        assert_eq!(ctx.scopes().current(), submitter_scope);
        assert!(!token.pushed_frame());

        snapshot.exit(&ctx, token);
        assert_eq!(ctx.security().current_state(), Some(worker_state));
        assert_eq!(ctx.scopes().current(), worker_scope);
    }

    #[test]
    fn test_associate_binds_then_unbinds() {
        let ctx = thread_local_context_with_realm(realm_with(&["bob"]));
        let identity = SecurityToken::new(Principal::new("bob"));
        ClientIdentity::set(Some(identity.clone()));
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));
        ClientIdentity::set(None);

        let token = snapshot.enter(&ctx).unwrap();
        assert_eq!(ctx.security().current_state(), Some(identity));

        snapshot.exit(&ctx, token);
        assert_eq!(ctx.security().current_state(), None);
    }

    #[test]
    fn test_associate_restores_worker_bound_state() {
        let ctx = thread_local_context_with_realm(realm_with(&["bob"]));
        let identity = SecurityToken::new(Principal::new("bob"));
        ClientIdentity::set(Some(identity.clone()));
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));
        ClientIdentity::set(None);

        let worker_state = SecurityToken::new(Principal::new("worker"));
        ctx.security().set_state(Some(worker_state.clone()));

        let token = snapshot.enter(&ctx).unwrap();
        assert_eq!(ctx.security().current_state(), Some(identity));

        snapshot.exit(&ctx, token);
        assert_eq!(ctx.security().current_state(), Some(worker_state));
    }

    #[test]
    fn test_rejected_identity_leaves_thread_untouched() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        ThreadFrameStack.enter_frame(request_frame("submit"));
        ctx.scopes().set(ResourceScope::system().child("app"));
        ClientIdentity::set(Some(SecurityToken::new(Principal::new("mallory"))));
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));

        let worker_frame = request_frame("worker");
        let worker_scope = ResourceScope::system().child("pool");
        ThreadFrameStack.exit_frame(Some(Arc::clone(&worker_frame)));
        ctx.scopes().set(worker_scope.clone());

        let result = snapshot.enter(&ctx);

        assert!(matches!(result, Err(LoginError::Rejected(_))));
        assert!(Arc::ptr_eq(&ThreadFrameStack.current_frame().unwrap(), &worker_frame));
        assert_eq!(ThreadResourceScope.current(), worker_scope);
        assert_eq!(ctx.security().current_state(), None);
    }

    #[test]
    fn test_enter_links_frame_under_worker_frame() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        let subject = SecurityToken::new(Principal::new("alice"));
        let mut attributes = Attributes::new();
        attributes.insert(RequestId("submit"));
        attributes.insert(SecurityContext::new(subject.clone()));
        ctx.frames().enter_frame(Arc::new(ContextFrame::new(attributes)));
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));

        let worker_frame = request_frame("worker");
        ctx.frames().exit_frame(Some(Arc::clone(&worker_frame)));

        let token = snapshot.enter(&ctx).unwrap();
        assert!(token.pushed_frame());

        let active = ctx.frames().current_frame().unwrap();
        assert_eq!(active.get::<RequestId>(), Some(&RequestId("submit")));
        assert!(Arc::ptr_eq(&active.parent().unwrap(), &worker_frame));
        assert!(Arc::ptr_eq(ContextSnapshot::owning(&active).unwrap(), &snapshot));
        let provided = active.get::<ProvidedSecurityContext>().unwrap();
        assert_eq!(provided.context.subject, subject);

        snapshot.exit(&ctx, token);
        assert!(Arc::ptr_eq(&ctx.frames().current_frame().unwrap(), &worker_frame));
    }

    #[test]
    fn test_frame_popped_even_when_worker_had_none() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        ctx.frames().enter_frame(request_frame("submit"));
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));
        ctx.frames().exit_frame(None);

        let token = snapshot.enter(&ctx).unwrap();
        assert!(ctx.frames().current_frame().is_some());

        snapshot.exit(&ctx, token);
        assert!(ctx.frames().current_frame().is_none());
    }

    #[test]
    fn test_exit_drops_nested_frame_left_active() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        ctx.frames().enter_frame(request_frame("submit"));
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));
        let worker_frame = request_frame("worker");
        ctx.frames().exit_frame(Some(Arc::clone(&worker_frame)));

        let token = snapshot.enter(&ctx).unwrap();
        let nested = request_frame("nested");
        ctx.frames().enter_frame(Arc::clone(&nested));

        snapshot.exit(&ctx, token);
        assert!(Arc::ptr_eq(&ctx.frames().current_frame().unwrap(), &worker_frame));
        assert_eq!(Arc::strong_count(&nested), 1);
    }

    #[test]
    fn test_snapshot_reusable_for_sequential_pairs() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        ctx.frames().enter_frame(request_frame("submit"));
        let snapshot = Arc::new(ContextSnapshot::capture(&ctx));
        ctx.frames().exit_frame(None);

        for _ in 0..3 {
            let token = snapshot.enter(&ctx).unwrap();
            assert_eq!(ctx.frames().current_frame().unwrap().depth(), 0);
            snapshot.exit(&ctx, token);
            assert!(ctx.frames().current_frame().is_none());
        }
    }

    #[test]
    fn test_policy_leaves_excluded_facets_unchanged() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        ctx.security().set_state(Some(SecurityToken::new(Principal::new("alice"))));
        ctx.frames().enter_frame(request_frame("submit"));
        let policy = PropagationPolicy {
            security: false,
            frames: false,
            resource_scope: true,
        };
        let snapshot = Arc::new(ContextSnapshot::capture_with_policy(&ctx, &policy));
        assert!(snapshot.security().is_none());
        assert!(snapshot.frame().is_none());

        let worker_state = SecurityToken::new(Principal::new("worker"));
        ctx.security().set_state(Some(worker_state.clone()));

        let token = snapshot.enter(&ctx).unwrap();
        assert_eq!(ctx.security().current_state(), Some(worker_state.clone()));
        assert_eq!(
            ctx.frames().current_frame().unwrap().get::<RequestId>(),
            Some(&RequestId("submit"))
        );
        snapshot.exit(&ctx, token);
        assert_eq!(ctx.security().current_state(), Some(worker_state));
    }

    #[test]
    fn test_security_off_does_not_provide_security_context() {
        let ctx = thread_local_context_with_realm(realm_with(&[]));
        let mut attributes = Attributes::new();
        attributes.insert(RequestId("submit"));
        attributes.insert(SecurityContext::new(SecurityToken::new(Principal::new("alice"))));
        ctx.frames().enter_frame(Arc::new(ContextFrame::new(attributes)));
        let policy = PropagationPolicy {
            security: false,
            frames: true,
            resource_scope: true,
        };
        let snapshot = Arc::new(ContextSnapshot::capture_with_policy(&ctx, &policy));
        ctx.frames().exit_frame(None);

        let token = snapshot.enter(&ctx).unwrap();
        let active = ctx.frames().current_frame().unwrap();
        assert_eq!(active.get::<RequestId>(), Some(&RequestId("submit")));
        assert!(active.get::<ProvidedSecurityContext>().is_none());

        snapshot.exit(&ctx, token);
        assert!(ctx.frames().current_frame().is_none());
    }
}
