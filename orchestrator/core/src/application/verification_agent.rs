// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Independent semantic review of a proposed action.
//!
//! This is the final automated gate and it fails closed: anything short of
//! an explicit approval is a rejection.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::application::payload::first_json_object;
use crate::domain::action::ProposedAction;
use crate::domain::config::CallSettings;
use crate::domain::evidence::EvidenceStore;
use crate::domain::llm::{complete_with_timeout, GenerationOptions, LLMProvider};
use crate::domain::policy::GovernancePolicy;
use crate::domain::verification::VerificationResult;

/// Checked first. Negated forms of the positive keywords belong here, since
/// "not safe" also contains "safe".
const NEGATIVE_KEYWORDS: &[&str] = &[
    "reject",
    "unsafe",
    "violation",
    "not approved",
    "deny",
    "not safe",
    "not proceed",
    "n't proceed",
    "do not",
    "should not",
    "cannot",
    "never",
];
const POSITIVE_KEYWORDS: &[&str] = &["approved", "safe", "proceed"];

pub struct VerificationAgent {
    llm: Arc<dyn LLMProvider>,
    settings: CallSettings,
    timeout: Duration,
}

impl VerificationAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, settings: CallSettings, timeout: Duration) -> Self {
        Self {
            llm,
            settings,
            timeout,
        }
    }

    pub async fn verify(
        &self,
        evidence: &EvidenceStore,
        action: &ProposedAction,
        policy: &GovernancePolicy,
    ) -> VerificationResult {
        let prompt = build_prompt(evidence, action, policy);
        let options = GenerationOptions::new(self.settings.temperature, self.settings.max_tokens);

        match complete_with_timeout(self.llm.as_ref(), &prompt, &options, self.timeout).await {
            Ok(text) => parse_verification(&text),
            Err(e) => {
                warn!(error = %e, "Verification agent unavailable, rejecting");
                metrics::counter!("warden_reasoning_fallbacks_total", "site" => "verifier").increment(1);
                VerificationResult::rejected(format!("Verification failed: {}", e))
            }
        }
    }
}

fn build_prompt(evidence: &EvidenceStore, action: &ProposedAction, policy: &GovernancePolicy) -> String {
    format!(
        r#"You are an independent Verification Agent (Level 2).
Your job is to review the work of a Site Reliability Engineer (SRE) (Level 1).

**TASK:**
Review the "Proposed Action" and the "Evidence" provided by the SRE.
1. Does the Evidence actually support the Action? (Crucially verify).
2. Is the Action safe according to DevOps best practices? (e.g., restarting a pod is safe, dropping a DB table is NOT).
3. Does the Action violate any Governance Policies? (Check against the rules below).
4. Is there any risk of "Over-Reaction"? (e.g., scaling up 100x for a minor latency spike).

**GOVERNANCE POLICIES:**
- Maximum scale factor per action: {max_scale}
- Maximum spend per action: ${max_spend}
- Destructive actions (ROLLBACK, DELETE_LOGS) are forbidden on targets matching: {markers}
- Parameters must never contain credentials or secrets.

**EVIDENCE:**
{evidence}

**PROPOSED ACTION:**
Type: {action_type}
Target: {target}
Params: {params}

**INSTRUCTIONS:**
- Respond ONLY in valid JSON.
- Use keys: "approved" (boolean), "reason" (string, required if rejected), "warning" (string, optional).
- If approved: Set `approved: true`.
- If rejected: Set `approved: false` and provide a clear reason in "reason".
- If warning: Set `approved: true` but provide a warning in "warning".
- Do not add extra text outside the JSON."#,
        max_scale = policy.max_scale_factor,
        max_spend = policy.max_spend,
        markers = policy.production_markers.join(", "),
        evidence = evidence.to_pretty_json(),
        action_type = action.action_type,
        target = action.target,
        params = serde_json::to_string(&action.parameters).unwrap_or_default(),
    )
}

/// Parse a verifier reply: JSON first, then a keyword scan that checks
/// negative keywords before positive ones; anything else is a rejection.
pub fn parse_verification(text: &str) -> VerificationResult {
    if let Some(object) = first_json_object(text) {
        let as_string = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let result = VerificationResult {
            approved: matches!(object.get("approved"), Some(Value::Bool(true))),
            reason: as_string("reason"),
            warning: as_string("warning"),
        };
        debug!(approved = result.approved, "Verification verdict parsed");
        return result;
    }

    metrics::counter!("warden_reasoning_fallbacks_total", "site" => "verifier").increment(1);
    let lowered = text.to_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return VerificationResult::rejected("Verification agent detected safety concerns");
    }
    if POSITIVE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return VerificationResult {
            approved: true,
            reason: None,
            warning: Some("Approval inferred from unstructured reply".to_string()),
        };
    }
    warn!("Verification reply was not parsable, rejecting");
    VerificationResult::rejected("Invalid response format from Verification Agent")
}
