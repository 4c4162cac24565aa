// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # warden-core
//!
//! Constrained decision-and-remediation loop for SRE incidents:
//! detect, plan, wait for a human, execute step by step under rule-based and
//! model-based checks, then verify against the original signal.
//!
//! # Architecture
//!
//! - **domain** - types, invariants and the capability traits
//! - **application** - detector, planner, CMDP chain, approval gate, agent
//! - **infrastructure** - LLM adapters, stores, reflexors, actuators, audit
//! - **presentation** - axum HTTP API

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
