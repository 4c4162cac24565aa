// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Approval gate commands
//!
//! Commands: list, show, approve, reject. All of them talk to a running
//! `warden serve` through its HTTP API.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use warden_core::domain::gate::{ApprovalGateRecord, GateDecision, GateStatus};

use crate::client::ApiClient;

#[derive(Subcommand)]
pub enum GateCommand {
    /// List pending gates
    List,

    /// Show one gate with its plan payload
    Show {
        /// Gate ID
        id: String,
    },

    /// Approve a pending gate
    Approve {
        /// Gate ID
        id: String,

        /// Who is deciding (defaults to $USER)
        #[arg(long)]
        by: Option<String>,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Reject a pending gate
    Reject {
        /// Gate ID
        id: String,

        /// Who is deciding (defaults to $USER)
        #[arg(long)]
        by: Option<String>,

        #[arg(long)]
        reason: Option<String>,
    },
}

pub async fn handle_command(command: GateCommand, server: &str) -> Result<()> {
    let client = ApiClient::new(server)?;
    match command {
        GateCommand::List => list(&client).await,
        GateCommand::Show { id } => show(&client, &id).await,
        GateCommand::Approve { id, by, reason } => decide(&client, &id, true, by, reason).await,
        GateCommand::Reject { id, by, reason } => decide(&client, &id, false, by, reason).await,
    }
}

async fn list(client: &ApiClient) -> Result<()> {
    let gates = client.list_gates().await?;
    if gates.is_empty() {
        println!("{}", "No pending gates.".dimmed());
        return Ok(());
    }

    println!(
        "{:<38} {:<16} {:<38} {}",
        "ID".bold(),
        "PHASE".bold(),
        "INCIDENT".bold(),
        "EXPIRES".bold()
    );
    for gate in gates {
        println!(
            "{:<38} {:<16} {:<38} {}",
            gate.id.to_string(),
            gate.phase.as_str(),
            gate.incident_id.to_string(),
            gate.expires_at.format("%H:%M:%S")
        );
    }
    Ok(())
}

async fn show(client: &ApiClient, id: &str) -> Result<()> {
    let gate = client.get_gate(id).await?;
    println!("{} {}", "Gate".bold(), gate.id);
    println!("  Incident: {}", gate.incident_id);
    println!("  Phase:    {}", gate.phase.as_str());
    println!("  Status:   {}", colored_status(&gate));
    println!("  Created:  {}", gate.created_at.to_rfc3339());
    println!("  Expires:  {}", gate.expires_at.to_rfc3339());
    if let Some(by) = &gate.approved_by {
        println!("  Decided by: {}", by);
    }
    if let Some(reason) = &gate.reason {
        println!("  Reason:   {}", reason);
    }
    println!();
    println!("{}", "Payload:".bold());
    println!("{}", serde_json::to_string_pretty(&gate.payload)?);
    Ok(())
}

async fn decide(
    client: &ApiClient,
    id: &str,
    approved: bool,
    by: Option<String>,
    reason: Option<String>,
) -> Result<()> {
    let decision = GateDecision {
        approved,
        decided_by: by.or_else(|| std::env::var("USER").ok()),
        reason,
    };
    let ack = client.decide(id, &decision).await?;
    let verb = if approved { "approved".green() } else { "rejected".yellow() };
    println!("✓ Gate {} {} at {}", ack.gate_id, verb, ack.decided_at.to_rfc3339());
    Ok(())
}

fn colored_status(gate: &ApprovalGateRecord) -> colored::ColoredString {
    match gate.status {
        GateStatus::Pending if gate.is_expired(Utc::now()) => "EXPIRED".red(),
        GateStatus::Pending => gate.status.as_str().yellow(),
        GateStatus::Approved => gate.status.as_str().green(),
        GateStatus::Rejected => gate.status.as_str().red(),
    }
}
