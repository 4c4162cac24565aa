// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reasoning Capability
//!
//! Domain interface for the opaque "complete this prompt" service used by the
//! plan generator, the reasoner and the verification agent.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary for LLM vendors
//!
//! Implementations live in `infrastructure/llm/`. Callers own structured
//! payload extraction and their own fallback on failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), LLMError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    pub stop_sequences: Option<Vec<String>>,
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
            stop_sequences: None,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(1000),
            temperature: Some(0.1),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: TokenUsage,

    /// Provider name (e.g., "openai", "ollama")
    pub provider: String,

    pub model: String,
    pub finish_reason: FinishReason,
}

impl GenerationResponse {
    pub fn text_only(provider: &str, model: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            provider: provider.to_string(),
            model: model.to_string(),
            finish_reason: FinishReason::Stop,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Reasoning call timed out after {0:?}")]
    Timeout(Duration),
}

impl LLMError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LLMError::Network(_) | LLMError::RateLimit | LLMError::Provider(_)
        )
    }
}

/// Run one generation bounded by `timeout`, returning just the text.
pub async fn complete_with_timeout(
    provider: &dyn LLMProvider,
    prompt: &str,
    options: &GenerationOptions,
    timeout: Duration,
) -> Result<String, LLMError> {
    match tokio::time::timeout(timeout, provider.generate(prompt, options)).await {
        Ok(result) => result.map(|r| r.text),
        Err(_) => Err(LLMError::Timeout(timeout)),
    }
}
