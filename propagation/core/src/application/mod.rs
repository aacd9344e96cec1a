// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Propagation Application Layer
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`snapshot`] | `ContextSnapshot`, `SecurityCapture`, `RestoreToken` |
//! | [`task_runner`] | `TaskRunner` |

pub mod snapshot;
pub mod task_runner;

pub use snapshot::{ContextSnapshot, RestoreToken, SecurityCapture};
pub use task_runner::TaskRunner;
