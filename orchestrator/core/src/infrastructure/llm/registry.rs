// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Model Alias Resolution and Provider Management
//
// Resolves model aliases to provider instances and applies bounded retries
// with exponential backoff before trying the fallback provider. The registry
// is itself an `LLMProvider` bound to the configured reasoning alias, so the
// application layer never sees more than one provider.

use crate::domain::config::{LLMProviderConfig, ModelConfig, ReasoningConfig, WardenSpec};
use crate::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    alias_map: HashMap<String, (String, ModelConfig)>, // alias -> (provider_name, model_config)
    alias: String,
    default_provider: Option<String>,
    fallback_provider: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl ProviderRegistry {
    pub fn from_config(spec: &WardenSpec) -> anyhow::Result<Self> {
        let mut registry = Self::empty(&spec.reasoning);

        info!("Initializing LLM provider registry");
        for provider_config in &spec.llm_providers {
            if !provider_config.enabled {
                info!(provider = %provider_config.name, "Provider disabled, skipping");
                continue;
            }

            match Self::create_provider(provider_config) {
                Ok(provider) => registry.register(provider_config, provider),
                Err(e) => {
                    warn!(provider = %provider_config.name, error = %e, "Failed to initialize provider");
                }
            }
        }

        if registry.providers.is_empty() {
            warn!("No LLM providers available - every reasoning call will use its fallback");
        }
        Ok(registry)
    }

    fn empty(reasoning: &ReasoningConfig) -> Self {
        Self {
            providers: HashMap::new(),
            alias_map: HashMap::new(),
            alias: reasoning.model_alias.clone(),
            default_provider: reasoning.default_provider.clone(),
            fallback_provider: reasoning.fallback_provider.clone(),
            max_retries: reasoning.max_retries,
            retry_delay_ms: reasoning.retry_delay_ms,
        }
    }

    /// Register an already-built provider under the config's name and aliases.
    pub fn register(&mut self, config: &LLMProviderConfig, provider: Arc<dyn LLMProvider>) {
        for model in &config.models {
            info!(
                alias = %model.alias,
                model = %model.model,
                provider = %config.name,
                "Mapping model alias"
            );
            self.alias_map
                .insert(model.alias.clone(), (config.name.clone(), model.clone()));
        }
        self.providers.insert(config.name.clone(), provider);
    }

    fn create_provider(config: &LLMProviderConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = Self::resolve_api_key(&config.api_key)?;
        let model = config
            .models
            .first()
            .ok_or_else(|| anyhow::anyhow!("No models configured for '{}'", config.name))?
            .model
            .clone();

        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            "openai" | "openai-compatible" => Arc::new(OpenAIAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                api_key,
                model,
            )),
            "ollama" => Arc::new(OllamaAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                model,
            )),
            other => anyhow::bail!("Unsupported provider type: {}", other),
        };
        Ok(provider)
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
        match key {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(k.clone()),
            },
            None => Ok(String::new()),
        }
    }

    fn resolve(&self, alias: &str) -> Result<(&str, &Arc<dyn LLMProvider>), LLMError> {
        let provider_name = match self.alias_map.get(alias) {
            Some((name, _)) => name.as_str(),
            None => self.default_provider.as_deref().ok_or_else(|| {
                LLMError::ModelNotFound(format!("Model alias '{}' not found", alias))
            })?,
        };
        let provider = self.providers.get(provider_name).ok_or_else(|| {
            LLMError::Provider(format!("Provider '{}' not available", provider_name))
        })?;
        Ok((provider_name, provider))
    }

    /// Generate text using a model alias, retrying transient failures and
    /// finally trying the fallback provider.
    pub async fn generate_for(
        &self,
        alias: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let (provider_name, provider) = self.resolve(alias)?;
        let attempts = self.max_retries + 1;

        let mut last_error = None;
        for attempt in 0..attempts {
            match provider.generate(prompt, options).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        provider = provider_name,
                        attempt = attempt + 1,
                        attempts,
                        error = %e,
                        "Generation failed"
                    );
                    let retry = e.is_transient() && attempt + 1 < attempts;
                    last_error = Some(e);
                    if !retry {
                        break;
                    }
                    let backoff = self.retry_delay_ms.saturating_mul(2_u64.saturating_pow(attempt));
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }

        if let Some(fallback) = &self.fallback_provider {
            if fallback != provider_name {
                if let Some(fallback_provider) = self.providers.get(fallback) {
                    info!(provider = %fallback, "Trying fallback provider");
                    return fallback_provider.generate(prompt, options).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LLMError::Provider("Unknown error".into())))
    }

    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();
        for (name, provider) in &self.providers {
            results.insert(name.clone(), provider.health_check().await);
        }
        results
    }

    pub fn available_aliases(&self) -> Vec<String> {
        self.alias_map.keys().cloned().collect()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.alias_map.contains_key(alias)
    }
}

#[async_trait]
impl LLMProvider for ProviderRegistry {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        self.generate_for(&self.alias, prompt, options).await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let (_, provider) = self.resolve(&self.alias)?;
        provider.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
        error: fn() -> LLMError,
    }

    #[async_trait]
    impl LLMProvider for Flaky {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err((self.error)())
            } else {
                Ok(GenerationResponse::text_only("flaky", "m", "ok"))
            }
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn provider_config(name: &str, alias: &str) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            provider_type: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            enabled: true,
            models: vec![ModelConfig {
                alias: alias.to_string(),
                model: "llama3.2".to_string(),
            }],
        }
    }

    fn reasoning(max_retries: u32, fallback: Option<&str>) -> ReasoningConfig {
        ReasoningConfig {
            max_retries,
            retry_delay_ms: 1,
            fallback_provider: fallback.map(str::to_string),
            ..ReasoningConfig::default()
        }
    }

    #[test]
    fn test_registry_creation() {
        let spec = WardenSpec {
            llm_providers: vec![provider_config("local", "default")],
            ..WardenSpec::default()
        };
        let registry = ProviderRegistry::from_config(&spec).unwrap();
        assert!(registry.has_alias("default"));
        assert_eq!(registry.available_aliases().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut registry = ProviderRegistry::empty(&reasoning(2, None));
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 2,
            error: || LLMError::RateLimit,
        });
        registry.register(&provider_config("primary", "default"), flaky.clone());

        let response = registry
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_authentication_errors_go_straight_to_fallback() {
        let mut registry = ProviderRegistry::empty(&reasoning(3, Some("backup")));
        let primary = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: || LLMError::Authentication("bad key".into()),
        });
        let backup = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 0,
            error: || LLMError::RateLimit,
        });
        registry.register(&provider_config("primary", "default"), primary.clone());
        registry.register(&provider_config("backup", "backup-model"), backup.clone());

        let response = registry
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_alias_without_default_provider() {
        let registry = ProviderRegistry::empty(&reasoning(0, None));
        let result = registry.generate("prompt", &GenerationOptions::default()).await;
        assert!(matches!(result, Err(LLMError::ModelNotFound(_))));
    }
}
