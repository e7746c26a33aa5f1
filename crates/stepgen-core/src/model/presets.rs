//! Built-in model CLI presets and resolution of a [`ModelSpec`] into a
//! runnable [`CommandModel`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::command::CommandModel;

/// How to invoke a known model CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPreset {
    /// Provider name used in config (`claude`, `gemini`, `codex`).
    pub provider: &'static str,
    /// Executable looked up on `$PATH`.
    pub command: &'static str,
    /// Arguments that make the CLI read a prompt from stdin and print the
    /// answer to stdout.
    pub base_args: &'static [&'static str],
    /// Flag that selects a model by name, if the CLI has one.
    pub model_flag: Option<&'static str>,
}

const PRESETS: &[ModelPreset] = &[
    ModelPreset {
        provider: "claude",
        command: "claude",
        base_args: &["-p"],
        model_flag: Some("--model"),
    },
    ModelPreset {
        provider: "gemini",
        command: "gemini",
        base_args: &[],
        model_flag: Some("--model"),
    },
    ModelPreset {
        provider: "codex",
        command: "codex",
        base_args: &["exec", "-"],
        model_flag: Some("--model"),
    },
];

/// Provider name for a fully user-specified command.
pub const CUSTOM_PROVIDER: &str = "custom";

/// Default provider when nothing is configured.
pub const DEFAULT_PROVIDER: &str = "claude";

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// All built-in presets.
pub fn builtin_presets() -> &'static [ModelPreset] {
    PRESETS
}

/// Look up a preset by provider name.
pub fn preset(provider: &str) -> Option<&'static ModelPreset> {
    PRESETS.iter().find(|p| p.provider == provider)
}

/// Errors from resolving a [`ModelSpec`].
#[derive(Debug, Error)]
pub enum ModelSpecError {
    #[error("unknown model provider {0:?} (expected claude, gemini, codex, or custom)")]
    UnknownProvider(String),

    #[error("provider \"custom\" requires a command")]
    MissingCommand,
}

/// Everything needed to build a model, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Preset name or `custom`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name passed via the preset's model flag or `{model}` in args.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Override the preset's executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Override the preset's arguments verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: None,
            command: None,
            args: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ModelSpec {
    /// Resolve the spec into a subprocess-backed model.
    ///
    /// Explicit `command`/`args` override the preset. `{model}` inside args
    /// is replaced with the model name; when args come from the preset and a
    /// name is set, the preset's model flag is appended instead.
    pub fn build(&self) -> Result<CommandModel, ModelSpecError> {
        let preset = if self.provider == CUSTOM_PROVIDER {
            None
        } else {
            Some(preset(&self.provider).ok_or_else(|| ModelSpecError::UnknownProvider(self.provider.clone()))?)
        };

        let command = match (&self.command, preset) {
            (Some(cmd), _) => cmd.clone(),
            (None, Some(p)) => p.command.to_string(),
            (None, None) => return Err(ModelSpecError::MissingCommand),
        };

        let model_name = self.name.as_deref().unwrap_or_default();
        let args: Vec<String> = match (&self.args, preset) {
            (Some(args), _) => args
                .iter()
                .filter(|a| !(a.contains("{model}") && model_name.is_empty()))
                .map(|a| a.replace("{model}", model_name))
                .collect(),
            (None, Some(p)) => {
                let mut args: Vec<String> = p.base_args.iter().map(|a| a.to_string()).collect();
                if let (Some(flag), Some(name)) = (p.model_flag, self.name.as_deref()) {
                    args.push(flag.to_string());
                    args.push(name.to_string());
                }
                args
            }
            (None, None) => Vec::new(),
        };

        let display_name = match self.name.as_deref() {
            Some(name) => format!("{}:{name}", self.provider),
            None => self.provider.clone(),
        };

        Ok(CommandModel::new(display_name, command, args)
            .with_timeout(Duration::from_secs(self.timeout_secs.max(1))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_preset_with_model_name() {
        let spec = ModelSpec {
            name: Some("sonnet".to_string()),
            ..ModelSpec::default()
        };
        let model = spec.build().unwrap();
        assert_eq!(model.program(), "claude");
        assert_eq!(model.args(), &["-p", "--model", "sonnet"]);
        assert_eq!(model.display_name(), "claude:sonnet");
    }

    #[test]
    fn preset_without_name_omits_model_flag() {
        let spec = ModelSpec {
            provider: "codex".to_string(),
            ..ModelSpec::default()
        };
        let model = spec.build().unwrap();
        assert_eq!(model.program(), "codex");
        assert_eq!(model.args(), &["exec", "-"]);
    }

    #[test]
    fn command_override_keeps_preset_args() {
        let spec = ModelSpec {
            command: Some("/opt/bin/claude".to_string()),
            ..ModelSpec::default()
        };
        let model = spec.build().unwrap();
        assert_eq!(model.program(), "/opt/bin/claude");
        assert_eq!(model.args(), &["-p"]);
    }

    #[test]
    fn custom_provider_substitutes_model_placeholder() {
        let spec = ModelSpec {
            provider: CUSTOM_PROVIDER.to_string(),
            name: Some("llama3".to_string()),
            command: Some("ollama".to_string()),
            args: Some(vec!["run".to_string(), "{model}".to_string()]),
            timeout_secs: 30,
        };
        let model = spec.build().unwrap();
        assert_eq!(model.program(), "ollama");
        assert_eq!(model.args(), &["run", "llama3"]);
        assert_eq!(model.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn custom_provider_drops_placeholder_args_without_name() {
        let spec = ModelSpec {
            provider: CUSTOM_PROVIDER.to_string(),
            command: Some("llm".to_string()),
            args: Some(vec!["-m".to_string(), "{model}".to_string()]),
            ..ModelSpec::default()
        };
        let model = spec.build().unwrap();
        assert_eq!(model.args(), &["-m"]);
    }

    #[test]
    fn custom_provider_requires_command() {
        let spec = ModelSpec {
            provider: CUSTOM_PROVIDER.to_string(),
            ..ModelSpec::default()
        };
        assert!(matches!(spec.build(), Err(ModelSpecError::MissingCommand)));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let spec = ModelSpec {
            provider: "palm".to_string(),
            ..ModelSpec::default()
        };
        assert!(matches!(spec.build(), Err(ModelSpecError::UnknownProvider(_))));
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: ModelSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, ModelSpec::default());
    }

    #[test]
    fn every_preset_is_resolvable() {
        for p in builtin_presets() {
            let spec = ModelSpec {
                provider: p.provider.to_string(),
                ..ModelSpec::default()
            };
            assert!(spec.build().is_ok(), "preset {} should build", p.provider);
        }
    }
}
