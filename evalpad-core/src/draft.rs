use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{StorageKeys, ToolKind};
use crate::storage::{self, SharedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// The user's live, unsaved editing state for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Template text (Jinja tool) or predicate text (predicate tool).
    pub primary: String,
    /// JSON source fed to the evaluation.
    pub data: String,
    /// JSONPath expression applied to the rendered output.
    pub query: String,
    pub format: OutputFormat,
}

const JINJA_TEMPLATE: &str = r#"{%- set dialog = [] -%}
{%- for message in messages -%}
  {%- set dialog = dialog.append(authors[loop.index0]|replace('user','#### client\n')|replace('support','#### support\n') + message + '\n') -%}
{%- endfor -%}
{%- set content = [
  "<DIALOG>\n# Dialog between the client and support:",
  dialog|join('\n'),
  "</DIALOG>\n\n<META>\n# Meta information:",
  full_meta|join(),
  "</META>\n\n\nWRITE ONLY THE ANSWER TO THE USER."
] -%}

{
  "model": "anthropic/claude-sonnet-4",
  "system": [
        {
            "type": "text",
            "text": {{static_part_of_prompt|tojson}},
            "cache_control": {"type": "ephemeral", "ttl": "1h"}
        }
    ],
  "messages": [
    {
      "role": "user",
      "content": {{content|join('\n')|tojson}}
    }
  ]
}"#;

const JINJA_DATA: &str = r#"{
    "static_part_of_prompt": "You are a helpful support assistant.",
    "messages": ["Where is my order?","Please check the app.","Thanks!"],
    "authors": ["user","support","user"]
}"#;

const JINJA_QUERY: &str = "$.messages[0].content";

const PREDICATE: &str = "x > 5 and y < 30";

const PREDICATE_DATA: &str = r#"{
  "x": 10,
  "y": 20
}"#;

impl Draft {
    /// Built-in example shown on first start and after a reset.
    pub fn example(tool: ToolKind) -> Self {
        match tool {
            ToolKind::Jinja => Draft {
                primary: JINJA_TEMPLATE.to_string(),
                data: JINJA_DATA.to_string(),
                query: JINJA_QUERY.to_string(),
                format: OutputFormat::Json,
            },
            ToolKind::Predicate => Draft {
                primary: PREDICATE.to_string(),
                data: PREDICATE_DATA.to_string(),
                query: String::new(),
                format: OutputFormat::Json,
            },
        }
    }
}

/// Mirrors a [`Draft`] into the key-value store under the tool's fixed keys.
///
/// None of the operations fail observably: storage problems are logged and
/// editing carries on.
#[derive(Clone)]
pub struct DraftStore {
    tool: ToolKind,
    keys: StorageKeys,
    store: SharedStore,
}

impl DraftStore {
    pub fn new(tool: ToolKind, store: SharedStore) -> Self {
        Self {
            tool,
            keys: StorageKeys::for_tool(tool),
            store,
        }
    }

    pub fn example(&self) -> Draft {
        Draft::example(self.tool)
    }

    pub fn save(&self, draft: &Draft) {
        let mut writes: Vec<(&str, &str)> = vec![
            (self.keys.primary.as_str(), draft.primary.as_str()),
            (self.keys.data.as_str(), draft.data.as_str()),
        ];
        if let Some(key) = &self.keys.query {
            writes.push((key.as_str(), draft.query.as_str()));
        }
        if let Some(key) = &self.keys.format {
            writes.push((key.as_str(), draft.format.as_str()));
        }

        let mut guard = match storage::lock(&self.store) {
            Ok(guard) => guard,
            Err(e) => {
                log::warn!("Could not save draft: {}", e);
                return;
            }
        };
        for (key, value) in writes {
            if let Err(e) = guard.set(key, value) {
                log::warn!("Could not save draft field {}: {}", key, e);
            }
        }
    }

    pub fn load(&self) -> Draft {
        let example = self.example();
        let guard = match storage::lock(&self.store) {
            Ok(guard) => guard,
            Err(e) => {
                log::warn!("Could not load draft, using example: {}", e);
                return example;
            }
        };

        let read = |key: &str| -> Option<String> {
            match guard.get(key) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Could not read {}: {}", key, e);
                    None
                }
            }
        };

        let format = self
            .keys
            .format
            .as_deref()
            .and_then(|key| read(key))
            .and_then(|raw| match raw.parse::<OutputFormat>() {
                Ok(format) => Some(format),
                Err(e) => {
                    log::warn!("Ignoring stored output format: {}", e);
                    None
                }
            })
            .unwrap_or(example.format);

        Draft {
            primary: read(&self.keys.primary).unwrap_or(example.primary),
            data: read(&self.keys.data).unwrap_or(example.data),
            query: self
                .keys
                .query
                .as_deref()
                .and_then(|key| read(key))
                .unwrap_or(example.query),
            format,
        }
    }

    /// Remove every key of the tool, saved presets included.
    pub fn clear(&self) {
        self.remove_keys(&self.keys.all_keys());
    }

    /// Forget the live draft but keep the saved presets.
    pub fn clear_draft(&self) {
        self.remove_keys(&self.keys.draft_keys());
    }

    fn remove_keys(&self, keys: &[&str]) {
        let mut guard = match storage::lock(&self.store) {
            Ok(guard) => guard,
            Err(e) => {
                log::warn!("Could not clear draft: {}", e);
                return;
            }
        };
        for &key in keys {
            if let Err(e) = guard.remove(key) {
                log::warn!("Could not remove {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{shared, KeyValueStore, MemoryStore};

    fn edited(tool: ToolKind) -> Draft {
        Draft {
            primary: "{{ name }}".to_string(),
            data: r#"{"name": "x"}"#.to_string(),
            query: "$.name".to_string(),
            format: OutputFormat::Text,
        }
        .for_tool(tool)
    }

    impl Draft {
        fn for_tool(mut self, tool: ToolKind) -> Self {
            if !tool.has_path_query() {
                let example = Draft::example(tool);
                self.query = example.query;
                self.format = example.format;
            }
            self
        }
    }

    #[test]
    fn test_load_from_empty_store_gives_example() {
        let drafts = DraftStore::new(ToolKind::Jinja, shared(MemoryStore::new()));
        assert_eq!(drafts.load(), Draft::example(ToolKind::Jinja));
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        for tool in [ToolKind::Jinja, ToolKind::Predicate] {
            let drafts = DraftStore::new(tool, shared(MemoryStore::new()));
            let draft = edited(tool);
            drafts.save(&draft);
            assert_eq!(drafts.load(), draft);
        }
    }

    #[test]
    fn test_empty_strings_survive_roundtrip() {
        let drafts = DraftStore::new(ToolKind::Jinja, shared(MemoryStore::new()));
        let draft = Draft {
            primary: String::new(),
            data: String::new(),
            query: String::new(),
            format: OutputFormat::Json,
        };
        drafts.save(&draft);
        assert_eq!(drafts.load(), draft);
    }

    #[test]
    fn test_missing_fields_fall_back_individually() {
        let store = shared(MemoryStore::new());
        store.lock().unwrap().set("jinja2_template", "hello").unwrap();

        let loaded = DraftStore::new(ToolKind::Jinja, store).load();
        let example = Draft::example(ToolKind::Jinja);
        assert_eq!(loaded.primary, "hello");
        assert_eq!(loaded.data, example.data);
        assert_eq!(loaded.query, example.query);
    }

    #[test]
    fn test_unknown_format_falls_back() {
        let store = shared(MemoryStore::new());
        store.lock().unwrap().set("jinja2_output_format", "yaml").unwrap();
        let loaded = DraftStore::new(ToolKind::Jinja, store).load();
        assert_eq!(loaded.format, OutputFormat::Json);
    }

    #[test]
    fn test_save_over_quota_is_silent() {
        let store = shared(MemoryStore::with_quota(16));
        let drafts = DraftStore::new(ToolKind::Predicate, store);
        // Must not panic or propagate anything.
        drafts.save(&Draft::example(ToolKind::Predicate));
        assert_eq!(drafts.load(), Draft::example(ToolKind::Predicate));
    }

    #[test]
    fn test_clear_draft_keeps_presets() {
        let store = shared(MemoryStore::new());
        store.lock().unwrap().set("jinja2_saved_templates", "{}").unwrap();
        let drafts = DraftStore::new(ToolKind::Jinja, store.clone());
        drafts.save(&edited(ToolKind::Jinja));

        drafts.clear_draft();

        assert_eq!(drafts.load(), Draft::example(ToolKind::Jinja));
        assert_eq!(
            store.lock().unwrap().get("jinja2_saved_templates").unwrap(),
            Some("{}".to_string())
        );
    }

    #[test]
    fn test_clear_removes_every_key() {
        let store = shared(MemoryStore::new());
        store.lock().unwrap().set("jinja2_saved_templates", "{}").unwrap();
        let drafts = DraftStore::new(ToolKind::Jinja, store.clone());
        drafts.save(&edited(ToolKind::Jinja));

        drafts.clear();

        let guard = store.lock().unwrap();
        for key in StorageKeys::for_tool(ToolKind::Jinja).all_keys() {
            assert_eq!(guard.get(key).unwrap(), None, "{} survived", key);
        }
    }

    #[test]
    fn test_predicate_tool_never_writes_query_keys() {
        let store = shared(MemoryStore::new());
        DraftStore::new(ToolKind::Predicate, store.clone()).save(&edited(ToolKind::Jinja));
        let guard = store.lock().unwrap();
        assert_eq!(guard.get("jinja2_jsonpath").unwrap(), None);
        assert!(guard.get("pypred_predicate").unwrap().is_some());
    }
}
