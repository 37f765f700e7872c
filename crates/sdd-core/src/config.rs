use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SddError};
use crate::gate::GateConfig;
use crate::lifecycle::branch::GitWorkflow;

/// Per-project settings from `.sdd/config.toml`. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub quality_gates: GateConfig,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl StoreConfig {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GitConfig {
    #[serde(default)]
    pub workflow: GitWorkflow,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Load `.sdd/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Returns [`SddError::Io`] if the file exists but cannot be read, and
/// [`SddError::Config`] if it is not valid TOML for [`ProjectConfig`].
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".sdd/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| SddError::Io {
        path: path.clone(),
        source,
    })?;

    let config = toml::from_str::<ProjectConfig>(&content).map_err(|e| SddError::Config {
        path: path.clone(),
        message: e.to_string(),
    })?;
    tracing::debug!(
        path = %path.display(),
        checks = config.quality_gates.checks.len(),
        "loaded project config"
    );
    Ok(config)
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> anyhow::Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("sdd/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Pick the output mode: `--json` flag, then `FORMAT`, then user config, then
/// whether stdout is a terminal.
#[must_use]
pub fn resolve_output(cli_json: bool, user_output: Option<&str>) -> &'static str {
    let env_format = env::var("FORMAT").ok();
    resolve_output_from(cli_json, user_output, env_format.as_deref())
}

fn resolve_output_from(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
) -> &'static str {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json";
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode;
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode;
    }

    if std::io::stdout().is_terminal() {
        "pretty"
    } else {
        "text"
    }
}

const fn default_lock_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Requirement;

    fn write_config(root: &Path, content: &str) {
        std::fs::create_dir_all(root.join(".sdd")).unwrap();
        std::fs::write(root.join(".sdd/config.toml"), content).unwrap();
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().unwrap();
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.store.lock_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.git.workflow, GitWorkflow::Pr);
        assert_eq!(cfg.quality_gates.default_timeout_secs, 300);

        let names: Vec<&str> = cfg
            .quality_gates
            .checks
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["tests", "lint", "acceptance_criteria", "coverage"]);
        assert_eq!(
            cfg.quality_gates.requirement("coverage"),
            Requirement::Optional
        );
        assert_eq!(cfg.quality_gates.requirement("tests"), Requirement::Required);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let root = tempfile::tempdir().unwrap();
        write_config(
            root.path(),
            r#"
[git]
workflow = "local_merge"

[[quality_gates.checks]]
name = "tests"
command = "true"
timeout_secs = 5

[[quality_gates.checks]]
name = "docs"
required = false
"#,
        );

        let cfg = load_project_config(root.path()).unwrap();
        assert_eq!(cfg.git.workflow, GitWorkflow::LocalMerge);
        assert_eq!(cfg.store.lock_timeout_ms, 5000);
        assert_eq!(cfg.quality_gates.checks.len(), 2);
        assert!(cfg.quality_gates.checks[0].required);
        assert_eq!(cfg.quality_gates.checks[0].command.as_deref(), Some("true"));
        assert_eq!(
            cfg.quality_gates.timeout_for(&cfg.quality_gates.checks[1]),
            Duration::from_secs(300)
        );
        assert!(!cfg.quality_gates.checks[1].required);
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let root = tempfile::tempdir().unwrap();
        write_config(root.path(), "[store\nlock_timeout_ms = 1");

        let err = load_project_config(root.path()).unwrap_err();
        assert!(matches!(err, SddError::Config { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output_from(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_beats_user_config() {
        assert_eq!(resolve_output_from(false, Some("json"), Some("text")), "text");
    }

    #[test]
    fn aliases_are_normalized() {
        assert_eq!(resolve_output_from(false, Some("table"), Some("human")), "pretty");
        assert_eq!(resolve_output_from(false, Some("human"), Some("table")), "text");
    }

    #[test]
    fn user_config_parses_output() {
        let cfg: UserConfig = toml::from_str("output = \"json\"").unwrap();
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }
}
