// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value types, aggregates and collaborator traits of the remediation loop.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and ports; no I/O beyond trait definitions

pub mod action;
pub mod actuator;
pub mod anomaly;
pub mod audit;
pub mod config;
pub mod events;
pub mod evidence;
pub mod execution_log;
pub mod gate;
pub mod llm;
pub mod plan;
pub mod policy;
pub mod repository;
pub mod signals;
pub mod verification;
