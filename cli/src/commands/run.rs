// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `warden run` - one remediation cycle
//!
//! In-process by default; `--remote` drives a running server instead. When
//! the execution gate opens, the operator is asked for a decision unless
//! `--no-prompt` is set, in which case the decision must come through the
//! approval endpoint before the gate times out.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use warden_core::application::Warden;
use warden_core::domain::config::WardenConfig;
use warden_core::domain::events::{AgentEvent, AgentPhase, AgentStatus};
use warden_core::domain::gate::{GateDecision, GateId};

use crate::client::ApiClient;
use crate::render::render_event;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Scope label for the run (service, cluster or environment)
    #[arg(default_value = "default")]
    pub scope: String,

    /// Never prompt for approval
    #[arg(long)]
    pub no_prompt: bool,

    /// Run on the server given by --server instead of in-process
    #[arg(long)]
    pub remote: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs, config: WardenConfig, server: &str) -> Result<()> {
    let last = if args.remote {
        run_remote(&args, server).await?
    } else {
        run_embedded(&args, &config).await?
    };

    match last {
        Some(event) if succeeded(&event) => Ok(()),
        Some(event) => Err(anyhow!("Run ended in {}", event.label())),
        None => Err(anyhow!("Run produced no events")),
    }
}

async fn run_embedded(args: &RunArgs, config: &WardenConfig) -> Result<Option<AgentEvent>> {
    config.validate().context("Configuration validation failed")?;
    let warden = Warden::from_config(config).await?;

    let mut events = warden.agent.run(args.scope.clone());
    let mut last = None;
    while let Some(event) = events.next().await {
        print_event(&event, args.json);
        if let Some(gate_id) = pending_gate(&event).filter(|_| !args.no_prompt) {
            let approvals = warden.approvals.clone();
            spawn_prompt(gate_id, move |id, decision| async move {
                approvals
                    .submit_decision(id, decision)
                    .await
                    .map(|_| ())
                    .map_err(anyhow::Error::from)
            });
        }
        last = Some(event);
    }
    Ok(last)
}

async fn run_remote(args: &RunArgs, server: &str) -> Result<Option<AgentEvent>> {
    let client = Arc::new(ApiClient::new(server)?);
    let mut events = Box::pin(client.run(&args.scope).await?);

    let mut last = None;
    while let Some(event) = events.next().await {
        let event = event?.event;
        print_event(&event, args.json);
        if let Some(gate_id) = pending_gate(&event).filter(|_| !args.no_prompt) {
            let client = client.clone();
            spawn_prompt(gate_id, move |id, decision| async move {
                client.decide(&id.to_string(), &decision).await.map(|_| ())
            });
        }
        last = Some(event);
    }
    Ok(last)
}

fn succeeded(event: &AgentEvent) -> bool {
    matches!(
        (event.phase, event.status),
        (AgentPhase::Closed, AgentStatus::Success) | (AgentPhase::Idle, AgentStatus::NoIssues)
    )
}

fn print_event(event: &AgentEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to encode event"),
        }
    } else {
        println!("{}", render_event(event));
    }
}

/// The gate id carried by an `EXECUTION_GATE/PENDING_HUMAN_APPROVAL` event.
pub fn pending_gate(event: &AgentEvent) -> Option<GateId> {
    if event.phase != AgentPhase::ExecutionGate || event.status != AgentStatus::PendingHumanApproval {
        return None;
    }
    event
        .metadata
        .get("gate_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

/// Ask the operator on a blocking thread, then submit through `submit`.
fn spawn_prompt<F, Fut>(gate_id: GateId, submit: F)
where
    F: FnOnce(GateId, GateDecision) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    tokio::spawn(async move {
        let answer = tokio::task::spawn_blocking(ask_operator).await;
        let decision = match answer {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                warn!(error = %e, "Approval prompt failed; waiting for the approval endpoint");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Approval prompt task failed");
                return;
            }
        };

        let approved = decision.approved;
        match submit(gate_id, decision).await {
            Ok(()) if approved => println!("{}", "Plan approved.".green()),
            Ok(()) => println!("{}", "Plan rejected.".yellow()),
            Err(e) => eprintln!("{} {}", "Decision not recorded:".red(), e),
        }
    });
}

fn ask_operator() -> Result<GateDecision> {
    let approved = Confirm::new()
        .with_prompt("Approve the remediation plan?")
        .default(false)
        .interact()?;
    let reason: String = Input::new()
        .with_prompt("Reason (optional)")
        .allow_empty(true)
        .interact_text()?;

    Ok(GateDecision {
        approved,
        decided_by: std::env::var("USER").ok(),
        reason: Some(reason).filter(|r| !r.trim().is_empty()),
    })
}
