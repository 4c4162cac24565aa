// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod approval_gate;
pub mod bootstrap;
pub mod cmdp;
pub mod detector;
pub mod executor;
pub mod payload;
pub mod planner;
pub mod post_verifier;
pub mod reasoner;
pub mod repository_factory;
pub mod retriever;
pub mod sre_agent;
pub mod validation_engine;
pub mod verification_agent;

// Re-export the entry points for convenience
pub use approval_gate::{ApprovalGate, ApprovalService};
pub use bootstrap::Warden;
pub use sre_agent::{AgentDependencies, SreAgent};
