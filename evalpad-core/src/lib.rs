//! Core of the evalpad workbench: everything the editor surface needs
//! except the widgets themselves.
//!
//! Two tools share this crate. The Jinja renderer sends a template and JSON
//! data to `/render` and then queries the rendered output with `/jsonpath`.
//! The predicate evaluator sends a condition and JSON data to `/predicate`.

pub mod client;
pub mod config;
pub mod debounce;
pub mod draft;
pub mod error;
pub mod evaluation;
pub mod grammar;
pub mod output;
pub mod pane;
pub mod presets;
pub mod session;
pub mod storage;

pub use client::{EvalBackend, EvalClient};
pub use config::{EvalpadConfig, StorageKeys, ToolKind};
pub use debounce::Debouncer;
pub use draft::{Draft, DraftStore, OutputFormat};
pub use error::{ClientError, ConfigError, PresetError, StorageError};
pub use evaluation::{EvaluationResult, Evaluator, PathQueryResult};
pub use pane::{BufferPane, TextPane};
pub use presets::{Preset, PresetManager};
pub use session::{EvaluationJob, JobOutcome, Panes, ToolSession};
pub use storage::{shared, FileStore, KeyValueStore, MemoryStore, SharedStore};
