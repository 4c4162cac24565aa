// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Warden Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Reasoning providers and per-call-site generation settings
// - Detector thresholds and the synthetic diagnostic fallback
// - Approval gate timing
// - Governance policy limits
// - Actuation, verification, API, storage and observability settings

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::action::ActionType;
use crate::domain::policy::GovernancePolicy;

pub const API_VERSION: &str = "warden.dev/v1";
pub const KIND: &str = "WardenConfig";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: WardenSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenSpec {
    pub llm_providers: Vec<LLMProviderConfig>,
    pub reasoning: ReasoningConfig,
    pub detector: DetectorConfig,
    pub gate: GateConfig,
    pub policy: GovernancePolicy,
    pub executor: ExecutorConfig,
    pub verifier: VerifierConfig,
    pub agent: AgentConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name (e.g., "ollama-local", "openai")
    pub name: String,

    /// "openai", "openai-compatible" or "ollama"
    #[serde(rename = "type")]
    pub provider_type: String,

    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Alias used by the reasoning call sites (e.g., "default", "fast")
    pub alias: String,

    /// Actual model identifier for the provider API
    pub model: String,
}

/// Sampling settings for one reasoning call site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Model alias every call site resolves through the provider registry.
    pub model_alias: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,

    pub max_retries: u32,

    pub retry_delay_ms: u64,

    /// Upper bound on any single reasoning call.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,

    pub planner: CallSettings,
    pub reasoner: CallSettings,
    pub verifier: CallSettings,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model_alias: "default".to_string(),
            default_provider: None,
            fallback_provider: None,
            max_retries: 0,
            retry_delay_ms: 1000,
            call_timeout: Duration::from_secs(30),
            planner: CallSettings {
                temperature: 0.1,
                max_tokens: 1000,
            },
            reasoner: CallSettings {
                temperature: 0.2,
                max_tokens: 300,
            },
            verifier: CallSettings {
                temperature: 0.1,
                max_tokens: 300,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    #[serde(with = "humantime_serde")]
    pub lookback: Duration,

    /// Error events in the lookback window above which an ERROR anomaly fires.
    pub error_count_threshold: usize,

    /// Emit one diagnostic anomaly when nothing else is found.
    pub synthetic_fallback: bool,

    pub probe_metric: String,

    pub probe_threshold: f64,

    pub synthetic_severity: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(15 * 60),
            error_count_threshold: 10,
            synthetic_fallback: false,
            probe_metric: "database_query_latency_p99".to_string(),
            probe_threshold: 100.0,
            synthetic_severity: 8.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorMode {
    DryRun,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Permitted first words of a command template.
    pub allowed_commands: Vec<String>,

    /// Command template per action; `{target}` and parameter keys are substituted.
    pub commands: BTreeMap<ActionType, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::DryRun,
            timeout: Duration::from_secs(60),
            allowed_commands: ["kubectl", "systemctl", "docker", "helm"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            commands: BTreeMap::from([
                (
                    ActionType::Scale,
                    "kubectl scale deployment/{target} --replicas={replicas}".to_string(),
                ),
                (
                    ActionType::Restart,
                    "kubectl rollout restart deployment/{target}".to_string(),
                ),
                (
                    ActionType::Rollback,
                    "kubectl rollout undo deployment/{target}".to_string(),
                ),
                (
                    ActionType::PausePipeline,
                    "kubectl patch cronjob/{target} -p {\"spec\":{\"suspend\":true}}".to_string(),
                ),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub min_improvement_percent: f64,

    /// Wait before re-measuring so the remediation can take effect.
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            min_improvement_percent: 0.0,
            settle_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLabel {
    Critical,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Severity at or above which the run is labelled CRITICAL.
    pub critical_severity: f64,

    /// Forces the label regardless of the highest severity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_threshold: Option<SeverityLabel>,

    /// Target used when a plan step names its action symbolically.
    pub default_target: String,

    /// Metrics reported by the `check-metrics` reflexor.
    pub metrics: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            critical_severity: 8.0,
            severity_threshold: None,
            default_target: "default".to_string(),
            metrics: vec![
                "latency_p99_ms".to_string(),
                "error_rate".to_string(),
                "cpu_usage_percent".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,

    /// "compact" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9091,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "warden".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: WardenSpec::default(),
        }
    }
}

impl WardenConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. WARDEN_CONFIG_PATH environment variable
    /// 2. ./warden-config.yaml (working directory)
    /// 3. ~/.warden/config.yaml (user home)
    /// 4. /etc/warden/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("WARDEN_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./warden-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".warden").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/warden/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("WARDEN_GATE_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(timeout) => {
                    tracing::info!("Environment override: WARDEN_GATE_TIMEOUT={}", val);
                    self.spec.gate.timeout = timeout;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for WARDEN_GATE_TIMEOUT: '{}' ({}). Ignoring.",
                        val,
                        e
                    );
                }
            }
        }

        if let Some(val) = lookup("WARDEN_LOG_LEVEL") {
            tracing::info!("Environment override: WARDEN_LOG_LEVEL={}", val);
            self.spec.observability.logging.level = val;
        }

        if let Some(val) = lookup("WARDEN_DATABASE_URL") {
            tracing::info!("Environment override: WARDEN_DATABASE_URL set");
            self.spec.storage.database_url = Some(val);
            self.spec.storage.backend = StorageBackend::Postgres;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        for provider in &self.spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }
            if provider.endpoint.is_empty() {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }
            if provider.models.is_empty() {
                anyhow::bail!("LLM provider must have at least one model: {}", provider.name);
            }
            for model in &provider.models {
                if model.alias.is_empty() {
                    anyhow::bail!("Model alias cannot be empty in provider: {}", provider.name);
                }
                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty for alias: {}", model.alias);
                }
            }
        }

        let reasoning = &self.spec.reasoning;
        for (label, name) in [
            ("Default", &reasoning.default_provider),
            ("Fallback", &reasoning.fallback_provider),
        ] {
            if let Some(name) = name {
                if !self.spec.llm_providers.iter().any(|p| &p.name == name) {
                    anyhow::bail!("{} provider '{}' not found in llm_providers", label, name);
                }
            }
        }
        if reasoning.call_timeout.is_zero() {
            anyhow::bail!("reasoning.call_timeout must be greater than zero");
        }

        let gate = &self.spec.gate;
        if gate.poll_interval.is_zero() {
            anyhow::bail!("gate.poll_interval must be greater than zero");
        }
        if gate.poll_interval >= gate.timeout {
            anyhow::bail!(
                "gate.poll_interval ({:?}) must be shorter than gate.timeout ({:?})",
                gate.poll_interval,
                gate.timeout
            );
        }

        self.spec.policy.check_limits()?;
        for pattern in &self.spec.policy.secret_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                anyhow::bail!("Invalid secret pattern '{}': {}", pattern, e);
            }
        }

        if self.spec.executor.timeout.is_zero() {
            anyhow::bail!("executor.timeout must be greater than zero");
        }

        if self.spec.storage.backend == StorageBackend::Postgres
            && self.spec.storage.database_url.is_none()
        {
            anyhow::bail!("storage.database_url is required for the postgres backend");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = WardenConfig::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.gate.timeout, Duration::from_secs(300));
        assert_eq!(manifest.spec.gate.poll_interval, Duration::from_secs(2));
        assert!(!manifest.spec.detector.synthetic_fallback);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
apiVersion: warden.dev/v1
kind: WardenConfig
metadata:
  name: staging
spec:
  gate:
    timeout: 2s
    poll_interval: 500ms
  detector:
    synthetic_fallback: true
  executor:
    commands:
      RESTART: "systemctl restart {target}"
"#;
        let config = WardenConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.spec.gate.timeout, Duration::from_secs(2));
        assert_eq!(config.spec.gate.poll_interval, Duration::from_millis(500));
        assert!(config.spec.detector.synthetic_fallback);
        assert_eq!(config.spec.detector.error_count_threshold, 10);
        assert_eq!(
            config.spec.executor.commands.get(&ActionType::Restart).map(String::as_str),
            Some("systemctl restart {target}")
        );
        assert_eq!(config.spec.reasoning.planner.max_tokens, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut manifest = WardenConfig::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.gate.poll_interval = manifest.spec.gate.timeout;
        assert!(manifest.validate().is_err());
        manifest.spec.gate.poll_interval = Duration::from_secs(2);

        manifest.spec.policy.secret_patterns.push("(unclosed".to_string());
        assert!(manifest.validate().is_err());
        manifest.spec.policy.secret_patterns.pop();

        manifest.spec.reasoning.fallback_provider = Some("missing".to_string());
        assert!(manifest.validate().is_err());
        manifest.spec.reasoning.fallback_provider = None;

        manifest.spec.llm_providers.push(LLMProviderConfig {
            name: "empty".to_string(),
            provider_type: "openai".to_string(),
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            enabled: true,
            models: vec![],
        });
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WardenConfig::default();
        let env = HashMap::from([
            ("WARDEN_GATE_TIMEOUT", "90s"),
            ("WARDEN_LOG_LEVEL", "debug"),
            ("WARDEN_DATABASE_URL", "postgres://localhost/warden"),
        ]);
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.spec.gate.timeout, Duration::from_secs(90));
        assert_eq!(config.spec.observability.logging.level, "debug");
        assert_eq!(config.spec.storage.backend, StorageBackend::Postgres);
    }

    #[test]
    fn test_invalid_gate_timeout_override_is_ignored() {
        let mut config = WardenConfig::default();
        config.apply_overrides_from(|k| (k == "WARDEN_GATE_TIMEOUT").then(|| "soon".to_string()));
        assert_eq!(config.spec.gate.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden-config.yaml");
        WardenConfig::default().to_yaml_file(&path).unwrap();
        let loaded = WardenConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.kind, KIND);
        assert_eq!(loaded.spec.executor.commands.len(), 4);
    }
}
