// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `ambient-core`: Execution-Context Propagation
//!
//! Carries a submitting thread's ambient state (security state, resource scope,
//! nested context frame) onto whichever pool thread runs a task, and restores the
//! pool thread's own state afterwards whether the task succeeds, fails or panics.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `SecurityToken`, `ContextFrame`, `ResourceScope`, `ExecutionContext`, task failure types, config |
//! | [`application`] | Application | `ContextSnapshot` enter/exit protocol, `TaskRunner` |
//! | [`infrastructure`] | Infrastructure | Thread-local collaborators, tracing listener, executor adapter |
//!
//! ## Control Flow
//!
//! 1. The submitter builds a [`application::TaskRunner`], which captures a
//!    [`application::ContextSnapshot`] from the submitting thread.
//! 2. A pool thread calls [`application::TaskRunner::invoke`].
//! 3. `invoke` enters the snapshot, runs the lifecycle hooks around the work and
//!    exits the snapshot before the result or failure leaves the call.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
