use anyhow::{Context, Result};
use coordination::{
    FailedDependencyPolicy, IcarusConfig, LoopConfig, OllamaConfig, OrchestratorConfig,
    VerifierConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Top-level vforge configuration, read from `config.yaml`.
///
/// Every key is optional. Precedence: CLI flags, then `VFORGE_*`
/// environment variables, then the file, then these defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ollama model tag
    pub model: String,
    pub ollama_url: String,
    /// Per-request generation timeout (seconds)
    pub request_timeout_secs: u64,
    pub temperature: Option<f32>,
    /// Repairs allowed per unit after its first attempt
    pub max_retries: u32,
    /// Simulation wall-clock bound (seconds)
    pub timeout_secs: u64,
    /// Where verified designs are saved
    pub designs_dir: PathBuf,
    /// Toolchain scratch directory; the editable working copy lives under it
    pub workspace_dir: PathBuf,
    pub show_diffs: bool,
    pub save_on_success: bool,
    pub failed_dependency_policy: FailedDependencyPolicy,
    /// Decompose the requirement before building
    pub plan: bool,
    /// Appended to the generation system prompt
    pub extra_instructions: Option<String>,
    pub compiler: String,
    pub simulator: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let ollama = OllamaConfig::default();
        Self {
            model: ollama.model,
            ollama_url: ollama.base_url,
            request_timeout_secs: ollama.timeout_secs,
            temperature: None,
            max_retries: LoopConfig::default().retry_budget,
            timeout_secs: VerifierConfig::default().timeout_secs,
            designs_dir: PathBuf::from("designs"),
            workspace_dir: PathBuf::from("build"),
            show_diffs: true,
            save_on_success: true,
            failed_dependency_policy: FailedDependencyPolicy::default(),
            plan: true,
            extra_instructions: None,
            compiler: "iverilog".to_string(),
            simulator: "vvp".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path` and apply environment overrides.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_yaml(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply `VFORGE_OLLAMA_URL` and `VFORGE_MODEL` from `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("VFORGE_OLLAMA_URL").filter(|v| !v.is_empty()) {
            self.ollama_url = url;
        }
        if let Some(model) = lookup("VFORGE_MODEL").filter(|v| !v.is_empty()) {
            self.model = model;
        }
    }

    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.ollama_url.clone(),
            model: self.model.clone(),
            timeout_secs: self.request_timeout_secs,
            temperature: self.temperature,
        }
    }

    pub fn verifier(&self) -> VerifierConfig {
        VerifierConfig {
            timeout_secs: self.timeout_secs,
            ..Default::default()
        }
    }

    pub fn icarus(&self) -> IcarusConfig {
        IcarusConfig {
            compiler: self.compiler.clone(),
            simulator: self.simulator.clone(),
            build_dir: self.workspace_dir.clone(),
            ..Default::default()
        }
    }

    pub fn working_copy_dir(&self) -> PathBuf {
        self.workspace_dir.join("working")
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            loop_config: LoopConfig {
                retry_budget: self.max_retries,
                ..Default::default()
            },
            failed_dependency_policy: self.failed_dependency_policy,
            plan: self.plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "model: codellama:13b\nmax_retries: 2\nshow_diffs: false\nfailed_dependency_policy: short_circuit\n",
        )
        .unwrap();
        assert_eq!(config.model, "codellama:13b");
        assert_eq!(config.max_retries, 2);
        assert!(!config.show_diffs);
        assert_eq!(
            config.failed_dependency_policy,
            FailedDependencyPolicy::ShortCircuit
        );
        assert_eq!(config.designs_dir, PathBuf::from("designs"));
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(AppConfig::from_yaml("max_retries: [not a number").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VFORGE_OLLAMA_URL", "http://gpu:11434"),
            ("VFORGE_MODEL", ""),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.ollama_url, "http://gpu:11434");
        // Empty values are ignored
        assert_eq!(config.model, "qwen2.5-coder:14b");
    }

    #[test]
    fn test_derived_configs() {
        let config = AppConfig {
            max_retries: 3,
            timeout_secs: 4,
            workspace_dir: PathBuf::from("/tmp/vf"),
            ..Default::default()
        };
        assert_eq!(config.orchestrator().loop_config.retry_budget, 3);
        assert_eq!(config.verifier().timeout_secs, 4);
        assert_eq!(config.icarus().build_dir, PathBuf::from("/tmp/vf"));
        assert_eq!(config.working_copy_dir(), PathBuf::from("/tmp/vf/working"));
    }
}
