// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the ambient CLI

pub mod config;
pub mod probe;

pub use self::config::ConfigCommand;
pub use self::probe::ProbeArgs;
