//! Configuration management for the context evaluation harness
//!
//! Settings come from an optional TOML file, are overridden by command-line
//! flags, and are then frozen into a [`RunSettings`] value that is passed to
//! every component explicitly.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::providers::anthropic::DEFAULT_BASE_URL;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Model and storage settings for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Model answering the test prompts
    #[serde(default = "default_model")]
    pub model: String,
    /// Model grading responses against the rubric
    #[serde(default = "default_model")]
    pub eval_model: String,
    /// Output token budget for each test prompt
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Output token budget for each evaluation prompt
    #[serde(default = "default_eval_max_tokens")]
    pub eval_max_tokens: u32,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory of `<id>.json` test case definitions
    #[serde(default = "default_test_cases_dir")]
    pub test_cases_dir: PathBuf,
    /// Save results here when `--output` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_model() -> String { "claude-3-5-haiku-20241022".to_string() }
fn default_max_tokens() -> u32 { 1500 }
fn default_eval_max_tokens() -> u32 { 1000 }
fn default_api_key_env() -> String { "ANTHROPIC_API_KEY".to_string() }
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_test_cases_dir() -> PathBuf { PathBuf::from("context-eval/test-cases") }

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            eval_model: default_model(),
            max_tokens: default_max_tokens(),
            eval_max_tokens: default_eval_max_tokens(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            test_cases_dir: default_test_cases_dir(),
            output_dir: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0} environment variable not set")]
    MissingCredential(String),
}

fn project_dir(config_file: &Path) -> PathBuf {
    let dir = config_file.parent().unwrap_or(Path::new(""));
    match (dir.file_name(), dir.parent()) {
        (Some(name), Some(parent)) if name == OsStr::new("config") => parent.to_path_buf(),
        _ => dir.to_path_buf(),
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Relative `test_cases_dir` and `output_dir` values are taken from the
    /// project directory of the file: the directory holding it, or that
    /// directory's parent when the file lives in a `config/` directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        config.resolve_paths(&project_dir(path));
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.runner.test_cases_dir = base.join(&self.runner.test_cases_dir);
        if let Some(dir) = self.runner.output_dir.take() {
            self.runner.output_dir = Some(base.join(dir));
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from the default config locations or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/context-eval.toml",
            "context-eval/config/context-eval.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", path);
                        return config;
                    }
                    Err(e) => tracing::warn!("Ignoring {}: {}", path, e),
                }
            }
        }

        tracing::debug!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the test model, e.g. from `--model`
    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.runner.model = model;
        }
        self
    }

    /// Replace the evaluator model, e.g. from `--eval-model`
    pub fn with_eval_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.runner.eval_model = model;
        }
        self
    }

    /// Replace the test case directory, e.g. from `--test-cases`
    pub fn with_test_cases_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.runner.test_cases_dir = dir;
        }
        self
    }

    /// Read the credential named by `api_key_env`
    pub fn read_credential(&self) -> Result<String, ConfigError> {
        let var = &self.runner.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential(var.clone())),
        }
    }

    /// Freeze into the settings used for the rest of the run
    pub fn into_settings(self, api_key: String, evaluate: bool) -> RunSettings {
        let runner = self.runner;
        RunSettings {
            model: runner.model,
            eval_model: runner.eval_model,
            max_tokens: runner.max_tokens,
            eval_max_tokens: runner.eval_max_tokens,
            base_url: runner.base_url,
            api_key,
            evaluate,
        }
    }
}

/// Immutable settings for one run
#[derive(Clone)]
pub struct RunSettings {
    pub model: String,
    pub eval_model: String,
    pub max_tokens: u32,
    pub eval_max_tokens: u32,
    pub base_url: String,
    pub api_key: String,
    /// Score both responses against the rubric
    pub evaluate: bool,
}

impl RunSettings {
    /// Settings with default models and budgets, used by tests and library callers
    pub fn new(api_key: impl Into<String>) -> Self {
        Config::default().into_settings(api_key.into(), false)
    }

    pub fn with_evaluation(mut self, evaluate: bool) -> Self {
        self.evaluate = evaluate;
        self
    }
}

// The key never reaches logs through Debug.
impl std::fmt::Debug for RunSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSettings")
            .field("model", &self.model)
            .field("eval_model", &self.eval_model)
            .field("max_tokens", &self.max_tokens)
            .field("eval_max_tokens", &self.eval_max_tokens)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("evaluate", &self.evaluate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.runner.model, "claude-3-5-haiku-20241022");
        assert_eq!(config.runner.max_tokens, 1500);
        assert_eq!(config.runner.eval_max_tokens, 1000);
        assert_eq!(config.runner.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[runner]
model = "claude-test"
max_tokens = 800
test_cases_dir = "cases"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.runner.model, "claude-test");
        assert_eq!(config.runner.max_tokens, 800);
        assert_eq!(config.runner.test_cases_dir, PathBuf::from("cases"));
        // unspecified keys keep their defaults
        assert_eq!(config.runner.eval_max_tokens, 1000);
        assert_eq!(config.runner.eval_model, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_overrides_freeze_into_settings() {
        let settings = Config::default()
            .with_model(Some("claude-override".to_string()))
            .with_eval_model(None)
            .into_settings("key".to_string(), true);

        assert_eq!(settings.model, "claude-override");
        assert_eq!(settings.eval_model, "claude-3-5-haiku-20241022");
        assert!(settings.evaluate);
        assert!(format!("{:?}", settings).contains("<redacted>"));
    }

    #[test]
    fn test_missing_credential() {
        let mut config = Config::default();
        config.runner.api_key_env = "CONTEXT_EVAL_UNSET_CREDENTIAL".to_string();
        let err = config.read_credential().unwrap_err();
        assert_eq!(err.to_string(), "CONTEXT_EVAL_UNSET_CREDENTIAL environment variable not set");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context-eval.toml");
        let config = Config::default().with_model(Some("claude-saved".to_string()));
        config.save_toml(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.runner.model, "claude-saved");
        assert_eq!(loaded.runner.max_tokens, config.runner.max_tokens);
        assert_eq!(loaded.runner.test_cases_dir, dir.path().join("context-eval/test-cases"));
    }

    #[test]
    fn test_relative_paths_follow_config_location() {
        let dir = tempfile::tempdir().unwrap();
        let toml = "[runner]\ntest_cases_dir = \"test-cases\"\noutput_dir = \"results\"\n";

        let nested = dir.path().join("context-eval/config");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("context-eval.toml"), toml).unwrap();
        let config = Config::from_file(nested.join("context-eval.toml")).unwrap();
        assert_eq!(config.runner.test_cases_dir, dir.path().join("context-eval/test-cases"));
        assert_eq!(config.runner.output_dir, Some(dir.path().join("context-eval/results")));

        fs::write(dir.path().join("run.toml"), toml).unwrap();
        let config = Config::from_file(dir.path().join("run.toml")).unwrap();
        assert_eq!(config.runner.test_cases_dir, dir.path().join("test-cases"));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let cases = dir.path().join("elsewhere");
        let path = dir.path().join("run.toml");
        let toml = format!("[runner]\ntest_cases_dir = {:?}\n", cases.display().to_string());
        fs::write(&path, toml).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.runner.test_cases_dir, cases);
    }

    #[test]
    fn test_project_dir() {
        assert_eq!(project_dir(Path::new("config/context-eval.toml")), PathBuf::from(""));
        assert_eq!(
            project_dir(Path::new("context-eval/config/context-eval.toml")),
            PathBuf::from("context-eval")
        );
        assert_eq!(project_dir(Path::new("run.toml")), PathBuf::from(""));
        assert_eq!(project_dir(Path::new("ci/run.toml")), PathBuf::from("ci"));
    }
}
