//! Configuration for stepgen.
//!
//! Project settings live in `.stepgen/config.toml`. Model defaults may also
//! come from a user-level file at `~/.config/stepgen/config.toml`. Model
//! settings resolve through the chain: CLI flag > env var > project config >
//! user config > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stepgen_core::model::ModelSpec;
use stepgen_core::{ProjectLayout, StepId};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub problem_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_directory: Option<PathBuf>,
    /// The last step generated successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialized_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub model: Option<ModelSpec>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the user config directory: `$XDG_CONFIG_HOME/stepgen` or
/// `~/.config/stepgen`.
pub fn user_config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("stepgen");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("stepgen")
}

pub fn user_config_path() -> PathBuf {
    user_config_dir().join("config.toml")
}

/// Project root: CLI flag > `STEPGEN_PROJECT_ROOT` > current directory.
pub fn resolve_layout(cli_root: Option<&Path>) -> ProjectLayout {
    match cli_root {
        Some(root) => ProjectLayout::new(root),
        None => ProjectLayout::from_env(),
    }
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the project config. Fails if the project was never initialized.
pub fn load_config(layout: &ProjectLayout) -> Result<ProjectConfig> {
    let path = layout.config_path();
    if !path.exists() {
        bail!(
            "no stepgen project at {} (run `stepgen init` first)",
            layout.root().display()
        );
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("failed to parse config file at {}", path.display()))
}

pub fn save_config(layout: &ProjectLayout, config: &ProjectConfig) -> Result<()> {
    let path = layout.config_path();
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, contents).with_context(|| format!("failed to write config file at {}", path.display()))
}

/// Load the user config, if there is one.
pub fn load_user_config() -> Option<UserConfig> {
    let contents = std::fs::read_to_string(user_config_path()).ok()?;
    match toml::from_str(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparsable user config");
            None
        }
    }
}

// -----------------------------------------------------------------------
// Model resolution
// -----------------------------------------------------------------------

/// Model settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Resolve the model spec: CLI flag > env var > project > user > default.
pub fn resolve_model_spec(
    project: Option<&ModelSpec>,
    user: Option<&ModelSpec>,
    cli: &CliOverrides,
) -> ModelSpec {
    let mut spec = project.or(user).cloned().unwrap_or_default();

    if let Some(provider) = cli.provider.clone().or_else(|| env_var("STEPGEN_PROVIDER")) {
        if provider != spec.provider {
            // A different provider makes the old command and args meaningless.
            spec.command = None;
            spec.args = None;
        }
        spec.provider = provider;
    }
    if let Some(name) = cli.model.clone().or_else(|| env_var("STEPGEN_MODEL")) {
        spec.name = Some(name);
    }
    if let Some(command) = env_var("STEPGEN_MODEL_COMMAND") {
        spec.command = Some(command);
    }
    spec
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Key access (config list / get / set)
// -----------------------------------------------------------------------

/// Keys `config set` may change.
pub const SETTABLE_KEYS: &[&str] = &[
    "current_step",
    "model.provider",
    "model.name",
    "model.command",
    "model.timeout_secs",
];

/// Keys `config get` understands.
pub const READABLE_KEYS: &[&str] = &[
    "problem_description",
    "template_directory",
    "current_step",
    "initialized_at",
    "model.provider",
    "model.name",
    "model.command",
    "model.args",
    "model.timeout_secs",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigKeyError {
    #[error("unknown config key {0:?}")]
    Unknown(String),

    #[error("config key {0:?} cannot be set (settable: {keys})", keys = SETTABLE_KEYS.join(", "))]
    ReadOnly(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

pub fn check_readable(key: &str) -> Result<(), ConfigKeyError> {
    if READABLE_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(ConfigKeyError::Unknown(key.to_string()))
    }
}

pub fn check_settable(key: &str) -> Result<(), ConfigKeyError> {
    if SETTABLE_KEYS.contains(&key) {
        Ok(())
    } else if READABLE_KEYS.contains(&key) {
        Err(ConfigKeyError::ReadOnly(key.to_string()))
    } else {
        Err(ConfigKeyError::Unknown(key.to_string()))
    }
}

/// Every readable key with its value, `None` when unset.
pub fn list_values(config: &ProjectConfig) -> Vec<(&'static str, Option<String>)> {
    READABLE_KEYS.iter().map(|key| (*key, value_of(config, key))).collect()
}

/// The display value of `key`, `None` when unset or unknown.
pub fn value_of(config: &ProjectConfig, key: &str) -> Option<String> {
    let model = config.model.as_ref();
    match key {
        "problem_description" => Some(config.problem_description.clone()),
        "template_directory" => config.template_directory.as_ref().map(|p| p.display().to_string()),
        "current_step" => config.current_step.map(|s| s.to_string()),
        "initialized_at" => config.initialized_at.map(|t| t.to_rfc3339()),
        "model.provider" => model.map(|m| m.provider.clone()),
        "model.name" => model.and_then(|m| m.name.clone()),
        "model.command" => model.and_then(|m| m.command.clone()),
        "model.args" => model.and_then(|m| m.args.as_ref()).map(|a| a.join(" ")),
        "model.timeout_secs" => model.map(|m| m.timeout_secs.to_string()),
        _ => None,
    }
}

/// Set (or with `null`/`none`, remove) a settable key in place, keeping the
/// rest of the file's formatting and comments.
pub fn set_value(layout: &ProjectLayout, key: &str, raw: &str) -> Result<()> {
    check_settable(key)?;
    let value = parse_value(key, raw)?;

    let path = layout.config_path();
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let mut doc: toml_edit::DocumentMut = content
        .parse()
        .with_context(|| format!("failed to parse {} as TOML document", path.display()))?;

    let (table, field) = match key.split_once('.') {
        Some((section, field)) => {
            if !doc.contains_table(section) {
                doc.insert(section, toml_edit::table());
            }
            let table = doc
                .get_mut(section)
                .and_then(|item| item.as_table_mut())
                .with_context(|| format!("[{section}] in {} is not a table", path.display()))?;
            (table, field)
        }
        None => (doc.as_table_mut(), key),
    };

    match value {
        Some(v) => {
            table.insert(field, toml_edit::value(v));
        }
        None => {
            table.remove(field);
        }
    }

    // The edited document must still be a valid project config.
    let updated = doc.to_string();
    toml::from_str::<ProjectConfig>(&updated)
        .with_context(|| format!("setting {key} would make the config invalid"))?;

    std::fs::write(&path, updated).with_context(|| format!("failed to write {}", path.display()))
}

/// Record `step` as the last generated step.
pub fn record_current_step(layout: &ProjectLayout, step: StepId) -> Result<()> {
    set_value(layout, "current_step", &step.to_string())
}

/// Parse a raw value for `key`. `Ok(None)` means "remove the key".
fn parse_value(key: &str, raw: &str) -> Result<Option<toml_edit::Value>, ConfigKeyError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let invalid = |reason: String| ConfigKeyError::InvalidValue {
        key: key.to_string(),
        reason,
    };

    match key {
        "current_step" => {
            let step: StepId = trimmed.parse().map_err(|e| invalid(format!("{e}")))?;
            Ok(Some(step.to_string().into()))
        }
        "model.timeout_secs" => {
            let secs: i64 = trimmed
                .parse()
                .map_err(|_| invalid(format!("{trimmed:?} is not a whole number of seconds")))?;
            if secs <= 0 {
                return Err(invalid("timeout must be positive".to_string()));
            }
            Ok(Some(secs.into()))
        }
        _ if trimmed.is_empty() => Err(invalid("value must not be empty".to_string())),
        _ => Ok(Some(trimmed.into())),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
