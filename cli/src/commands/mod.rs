// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Warden CLI

pub mod config;
pub mod gate;
pub mod run;
pub mod serve;

pub use self::config::ConfigCommand;
pub use self::gate::GateCommand;
pub use self::run::RunArgs;
pub use self::serve::ServeArgs;
