// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod actuator;
pub mod audit;
pub mod db;
pub mod event_bus;
pub mod llm;
pub mod reflexors;
pub mod repositories;

pub use event_bus::{EventBus, RunEvent};
