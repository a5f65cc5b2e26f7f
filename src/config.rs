use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ScreenLoopError, ScreenLoopResult};
use crate::planner::types::Environment;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub loop_timing: LoopTimingConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Full URL of the Responses endpoint.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional API key stored in config.toml (env vars take precedence).
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent as `reasoning.summary` on the first request only. Empty disables it.
    #[serde(default = "default_reasoning_summary")]
    pub reasoning_summary: String,
    #[serde(default = "default_truncation")]
    pub truncation: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            reasoning_summary: default_reasoning_summary(),
            truncation: default_truncation(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1/responses".into()
}

fn default_model() -> String {
    "computer-use-preview".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_reasoning_summary() -> String {
    "concise".into()
}

fn default_truncation() -> String {
    "auto".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per planning round trip, including the first. 1 disables retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    768
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopTimingConfig {
    /// Pause after every action before the observation is captured.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Duration of a model-requested `wait` action.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
}

impl Default for LoopTimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            wait_ms: default_wait_ms(),
        }
    }
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_wait_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyPolicy {
    #[default]
    Auto,
    Prompt,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetyConfig {
    #[serde(default)]
    pub policy: SafetyPolicy,
    /// Safety check codes that need a human decision under the `prompt` policy.
    /// Empty means every check does.
    #[serde(default)]
    pub require_approval_for: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    #[default]
    Browser,
    Container,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurfaceConfig {
    #[serde(default)]
    pub kind: SurfaceKind,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub container: ContainerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_start_url")]
    pub start_url: String,
    #[serde(default)]
    pub headless: bool,
    /// Chromium binary; autodetected when absent.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            start_url: default_start_url(),
            headless: false,
            executable: None,
            args: default_browser_args(),
        }
    }
}

fn default_start_url() -> String {
    "https://www.google.com".into()
}

fn default_browser_args() -> Vec<String> {
    vec!["--disable-extensions".into(), "--disable-file-system".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_container_name")]
    pub name: String,
    #[serde(default = "default_x_display")]
    pub display: String,
    #[serde(default = "default_container_environment")]
    pub environment: Environment,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: default_container_name(),
            display: default_x_display(),
            environment: default_container_environment(),
        }
    }
}

fn default_container_name() -> String {
    "cua-image".into()
}

fn default_x_display() -> String {
    ":99".into()
}

fn default_container_environment() -> Environment {
    Environment::Linux
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Where session JSONL files go; defaults to the platform data dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Environment variables consulted for the planner API key, highest priority first.
pub const API_KEY_VARS: [&str; 2] = ["SCREENLOOP_API_KEY", "OPENAI_API_KEY"];

impl AppConfig {
    /// Resolves the planner API key: `SCREENLOOP_API_KEY`, then `OPENAI_API_KEY`,
    /// then `planner.api_key`.
    pub fn api_key(&self) -> ScreenLoopResult<String> {
        API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .or_else(|| self.planner.api_key.clone().filter(|v| !v.is_empty()))
            .ok_or_else(|| {
                ScreenLoopError::Config(
                    "no API key: set SCREENLOOP_API_KEY / OPENAI_API_KEY or planner.api_key".into(),
                )
            })
    }

    /// Resolves the API key, then removes the key variables from the process
    /// environment so launched surfaces (Chromium, docker) never inherit them.
    ///
    /// Call before any other thread reads the environment.
    pub fn take_api_key(&self) -> ScreenLoopResult<String> {
        let key = self.api_key()?;
        clear_env(&API_KEY_VARS);
        Ok(key)
    }
}

fn clear_env(vars: &[&str]) {
    for var in vars {
        if std::env::var_os(var).is_some() {
            std::env::remove_var(var);
            tracing::debug!(var, "removed from process environment");
        }
    }
}

fn resolve_config_path() -> ScreenLoopResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(ScreenLoopError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

/// Loads `path` when given, otherwise searches the default locations.
pub fn load_config(path: Option<&Path>) -> ScreenLoopResult<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        model = %config.planner.model,
        surface = ?config.surface.kind,
        "config loaded"
    );
    Ok(config)
}

pub fn parse_config(content: &str) -> ScreenLoopResult<AppConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_variables_are_gone_from_the_environment() {
        let var = format!("SCREENLOOP_TEST_KEY_{}", uuid::Uuid::new_v4().simple());
        std::env::set_var(&var, "sk-secret");
        clear_env(&[var.as_str()]);
        assert!(std::env::var_os(&var).is_none());
    }

    #[test]
    fn take_api_key_falls_back_to_config_value() {
        let mut cfg = AppConfig::default();
        cfg.planner.api_key = Some("sk-from-file".into());
        let env_was_empty = API_KEY_VARS.iter().all(|v| std::env::var_os(v).is_none());
        let key = cfg.take_api_key().unwrap();
        if env_was_empty {
            assert_eq!(key, "sk-from-file");
        }
        assert!(API_KEY_VARS.iter().all(|v| std::env::var_os(v).is_none()));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.display.width, 1024);
        assert_eq!(cfg.display.height, 768);
        assert_eq!(cfg.loop_timing.settle_ms, 1000);
        assert_eq!(cfg.loop_timing.wait_ms, 2000);
        assert_eq!(cfg.safety.policy, SafetyPolicy::Auto);
        assert_eq!(cfg.surface.kind, SurfaceKind::Browser);
        assert_eq!(cfg.surface.container.display, ":99");
        assert_eq!(cfg.planner.model, "computer-use-preview");
        assert!(!cfg.history.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
            [safety]
            policy = "prompt"
            require_approval_for = ["malicious_instructions"]

            [surface]
            kind = "container"

            [surface.container]
            name = "desktop-1"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.safety.policy, SafetyPolicy::Prompt);
        assert_eq!(cfg.safety.require_approval_for, vec!["malicious_instructions"]);
        assert_eq!(cfg.surface.kind, SurfaceKind::Container);
        assert_eq!(cfg.surface.container.name, "desktop-1");
        assert_eq!(cfg.surface.container.display, ":99");
        assert_eq!(cfg.surface.container.environment, Environment::Linux);
        assert_eq!(cfg.planner.retry.max_attempts, 3);
    }

    #[test]
    fn written_config_loads_back() {
        let dir = std::env::temp_dir().join(format!("screenloop-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.display.width = 1280;
        cfg.surface.browser.start_url = "https://bing.com".into();
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.display.width, 1280);
        assert_eq!(loaded.surface.browser.start_url, "https://bing.com");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
