// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terminal rendering of agent events.

use colored::{ColoredString, Colorize};
use warden_core::domain::events::{AgentEvent, AgentStatus};

pub fn status_badge(status: AgentStatus) -> ColoredString {
    let text = format!("{:<24}", status.as_str());
    match status {
        AgentStatus::Success | AgentStatus::NoIssues => text.green(),
        AgentStatus::InProgress => text.cyan(),
        AgentStatus::PendingHumanApproval => text.yellow().bold(),
        AgentStatus::Failed | AgentStatus::Rejected => text.red().bold(),
    }
}

/// One header line plus the indented, de-markdowned content.
pub fn render_event(event: &AgentEvent) -> String {
    let mut out = format!(
        "{} {:<18} {}",
        event.timestamp.format("%H:%M:%S").to_string().dimmed(),
        event.phase.as_str().bold(),
        status_badge(event.status)
    );
    for line in event.content.lines().filter(|l| !l.trim().is_empty()) {
        out.push_str("\n    ");
        out.push_str(&line.replace("**", ""));
    }
    out
}
