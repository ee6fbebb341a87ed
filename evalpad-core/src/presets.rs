use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{StorageKeys, ToolKind};
use crate::draft::{Draft, OutputFormat};
use crate::error::{PresetError, StorageError};
use crate::storage::{self, SharedStore};

/// A named snapshot of a [`Draft`].
///
/// Field aliases accept maps written by the original browser tools
/// (`template`/`predicate`, `jsonpath`, `outputFormat`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(alias = "template", alias = "predicate")]
    pub primary: String,
    pub data: String,
    #[serde(default, alias = "jsonpath")]
    pub query: String,
    #[serde(default, alias = "outputFormat")]
    pub format: OutputFormat,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Preset {
    pub fn from_draft(draft: &Draft) -> Self {
        Self {
            primary: draft.primary.clone(),
            data: draft.data.clone(),
            query: draft.query.clone(),
            format: draft.format,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn to_draft(&self) -> Draft {
        Draft {
            primary: self.primary.clone(),
            data: self.data.clone(),
            query: self.query.clone(),
            format: self.format,
        }
    }
}

pub type PresetMap = BTreeMap<String, Preset>;

/// CRUD over the single JSON-serialized name → preset mapping.
///
/// Every mutation rewrites the whole mapping in one `set`, so a refused
/// write (quota) leaves the previous mapping in place.
#[derive(Clone)]
pub struct PresetManager {
    key: String,
    store: SharedStore,
}

impl PresetManager {
    pub fn new(tool: ToolKind, store: SharedStore) -> Self {
        Self {
            key: StorageKeys::for_tool(tool).presets,
            store,
        }
    }

    /// Preset names in ascending, case-sensitive order.
    pub fn list(&self) -> Vec<String> {
        self.read_all().into_keys().collect()
    }

    pub fn get(&self, name: &str) -> Option<Preset> {
        self.read_all().remove(name)
    }

    /// Store a snapshot of `draft` under `name` (trimmed), replacing any
    /// preset of the same name. Returns the name actually used.
    pub fn save(&self, name: &str, draft: &Draft) -> Result<String, PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }

        let mut presets = self.read_all();
        presets.insert(name.to_string(), Preset::from_draft(draft));
        self.write_all(&presets)?;

        log::info!("Saved preset \"{}\"", name);
        Ok(name.to_string())
    }

    pub fn load(&self, name: &str) -> Result<Draft, PresetError> {
        self.get(name)
            .map(|preset| preset.to_draft())
            .ok_or_else(|| PresetError::NotFound(name.to_string()))
    }

    /// Remove `name`. The caller passes `confirmed` once the user has agreed
    /// to the deletion; without it nothing is touched.
    pub fn delete(&self, name: &str, confirmed: bool) -> Result<(), PresetError> {
        let mut presets = self.read_all();
        if !presets.contains_key(name) {
            return Err(PresetError::NotFound(name.to_string()));
        }
        if !confirmed {
            return Err(PresetError::Cancelled);
        }

        presets.remove(name);
        self.write_all(&presets)?;

        log::info!("Deleted preset \"{}\"", name);
        Ok(())
    }

    fn read_all(&self) -> PresetMap {
        let raw = match storage::lock(&self.store).and_then(|guard| guard.get(&self.key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return PresetMap::new(),
            Err(e) => {
                log::warn!("Could not read saved presets: {}", e);
                return PresetMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable preset map: {}", e);
            PresetMap::new()
        })
    }

    fn write_all(&self, presets: &PresetMap) -> Result<(), StorageError> {
        let raw = serde_json::to_string(presets)?;
        storage::lock(&self.store)?.set(&self.key, &raw)
    }
}
