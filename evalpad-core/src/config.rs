use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "evalpad.toml";

/// Which of the two workbench tools a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Jinja,
    Predicate,
}

impl ToolKind {
    pub fn title(&self) -> &'static str {
        match self {
            ToolKind::Jinja => "Jinja2 Renderer",
            ToolKind::Predicate => "PyPred Evaluator",
        }
    }

    /// Label of the primary (left-top) pane.
    pub fn primary_label(&self) -> &'static str {
        match self {
            ToolKind::Jinja => "Template",
            ToolKind::Predicate => "Predicate",
        }
    }

    /// Only the Jinja tool has the JSONPath pane and the output format switch.
    pub fn has_path_query(&self) -> bool {
        matches!(self, ToolKind::Jinja)
    }
}

/// Fixed, namespaced keys under which one tool persists its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub primary: String,
    pub data: String,
    pub query: Option<String>,
    pub format: Option<String>,
    pub presets: String,
}

impl StorageKeys {
    pub fn for_tool(tool: ToolKind) -> Self {
        match tool {
            ToolKind::Jinja => Self {
                primary: "jinja2_template".to_string(),
                data: "jinja2_data".to_string(),
                query: Some("jinja2_jsonpath".to_string()),
                format: Some("jinja2_output_format".to_string()),
                presets: "jinja2_saved_templates".to_string(),
            },
            ToolKind::Predicate => Self {
                primary: "pypred_predicate".to_string(),
                data: "pypred_data".to_string(),
                query: None,
                format: None,
                presets: "pypred_saved_templates".to_string(),
            },
        }
    }

    /// Keys holding the live draft (everything except the preset map).
    pub fn draft_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.primary.as_str(), self.data.as_str()];
        keys.extend(self.query.as_deref());
        keys.extend(self.format.as_deref());
        keys
    }

    /// Every key this tool owns, preset map included.
    pub fn all_keys(&self) -> Vec<&str> {
        let mut keys = self.draft_keys();
        keys.push(self.presets.as_str());
        keys
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Quiet period after the last edit before an evaluation fires.
    pub render_delay_ms: u64,
    /// Quiet period after the last edit before the draft is persisted.
    pub persist_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File used by the desktop build in place of browser localStorage.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalpadConfig {
    pub api: ApiConfig,
    pub timing: TimingConfig,
    pub storage: StorageConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "https://far.ddns.me:8000".to_string(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            render_delay_ms: 1000,
            persist_delay_ms: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: "evalpad-storage.json".to_string(),
        }
    }
}

impl Default for EvalpadConfig {
    fn default() -> Self {
        EvalpadConfig {
            api: ApiConfig::default(),
            timing: TimingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl EvalpadConfig {
    /// Load `evalpad.toml` from the working directory with environment
    /// variable overrides. Falls back to defaults when the file is absent
    /// or unreadable.
    pub fn load() -> Self {
        let mut config = Self::load_from_file(CONFIG_FILE).unwrap_or_else(|e| {
            log::warn!("Could not load {}, using defaults: {}", CONFIG_FILE, e);
            EvalpadConfig::default()
        });

        config.apply_overrides(|name| env::var(name).ok());
        config
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `EVALPAD_*` overrides, reading variables through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("EVALPAD_API_URL") {
            self.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(delay) = lookup("EVALPAD_RENDER_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(ms) => self.timing.render_delay_ms = ms,
                Err(_) => log::warn!("Ignoring invalid EVALPAD_RENDER_DELAY_MS: {}", delay),
            }
        }
        if let Some(delay) = lookup("EVALPAD_PERSIST_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(ms) => self.timing.persist_delay_ms = ms,
                Err(_) => log::warn!("Ignoring invalid EVALPAD_PERSIST_DELAY_MS: {}", delay),
            }
        }
        if let Some(path) = lookup("EVALPAD_STORAGE_PATH") {
            self.storage.path = path;
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
