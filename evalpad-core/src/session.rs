//! The editor-sync loop for one tool instance.
//!
//! The session owns the panes, the two independent timers (evaluate and
//! persist), the draft store and the preset manager. It never spawns
//! anything itself: [`ToolSession::tick`] hands back an [`EvaluationJob`]
//! when the quiet period is over, the caller runs it wherever its executor
//! lives, and feeds the [`JobOutcome`] back through [`ToolSession::apply`].
//!
//! Jobs may overlap. Each carries a generation number and an outcome older
//! than the newest job touching the same pane is dropped, so the pane
//! always reflects the most recently *issued* request. A path query also
//! remembers which render it ran over and is dropped once a newer render
//! is on screen. When a render lands after the query or format changed,
//! its own path result is discarded and the next `tick` re-queries.

use std::sync::Arc;

use crate::client::EvalBackend;
use crate::config::{EvalpadConfig, ToolKind};
use crate::debounce::Debouncer;
use crate::draft::{Draft, DraftStore, OutputFormat};
use crate::error::PresetError;
use crate::evaluation::{EvaluationResult, Evaluator, PathQueryResult};
use crate::output::{format_output, FormattedOutput};
use crate::pane::{BufferPane, TextPane};
use crate::presets::PresetManager;
use crate::storage::SharedStore;

/// The editor surface: two editable inputs, the primary output and the
/// derived (JSONPath) output.
#[derive(Debug, Clone)]
pub struct Panes<P> {
    pub primary: P,
    pub data: P,
    pub output: P,
    pub derived: P,
}

impl Panes<BufferPane> {
    pub fn buffers() -> Self {
        Self {
            primary: BufferPane::new(""),
            data: BufferPane::new(""),
            output: BufferPane::read_only(),
            derived: BufferPane::read_only(),
        }
    }
}

#[derive(Debug, Clone)]
enum JobKind {
    Evaluate {
        primary: String,
        data: String,
        query: String,
        format: OutputFormat,
    },
    PathOnly {
        source: String,
        source_generation: u64,
        query: String,
    },
}

/// One unit of remote work, detached from the session so it can be sent to
/// an executor.
#[derive(Clone)]
pub struct EvaluationJob {
    generation: u64,
    evaluator: Evaluator,
    kind: JobKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Evaluated {
        generation: u64,
        result: EvaluationResult,
        /// Formatted output when the Jinja render succeeded.
        output: Option<FormattedOutput>,
        path: Option<PathQueryResult>,
        /// Query and format the job was issued with.
        query: String,
        format: OutputFormat,
    },
    PathQueried {
        generation: u64,
        /// Generation of the render whose output was queried.
        source_generation: u64,
        result: PathQueryResult,
    },
}

impl JobOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            JobOutcome::Evaluated { generation, .. } | JobOutcome::PathQueried { generation, .. } => {
                *generation
            }
        }
    }
}

impl EvaluationJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_path_only(&self) -> bool {
        matches!(self.kind, JobKind::PathOnly { .. })
    }

    pub async fn run(self) -> JobOutcome {
        let generation = self.generation;
        let tool = self.evaluator.tool();

        match self.kind {
            JobKind::Evaluate {
                primary,
                data,
                query,
                format,
            } => {
                log::debug!("Evaluating {:?} (generation {})", tool, generation);
                let result = self.evaluator.evaluate(&primary, &data).await;

                let mut output = None;
                let mut path = None;
                if let (ToolKind::Jinja, EvaluationResult::Success(raw)) = (tool, &result) {
                    let formatted = format_output(raw, format);
                    if let Some(source) = formatted.query_source.as_deref().filter(|s| !s.is_empty()) {
                        path = Some(self.evaluator.query_path(source, &query).await);
                    }
                    output = Some(formatted);
                }

                JobOutcome::Evaluated {
                    generation,
                    result,
                    output,
                    path,
                    query,
                    format,
                }
            }
            JobKind::PathOnly {
                source,
                source_generation,
                query,
            } => {
                log::debug!("Querying path {} (generation {})", query, generation);
                JobOutcome::PathQueried {
                    generation,
                    source_generation,
                    result: self.evaluator.query_path(&source, &query).await,
                }
            }
        }
    }
}

pub struct ToolSession<P: TextPane = BufferPane> {
    tool: ToolKind,
    pub panes: Panes<P>,
    query: String,
    format: OutputFormat,

    evaluate_timer: Debouncer,
    persist_timer: Debouncer,

    drafts: DraftStore,
    presets: PresetManager,
    evaluator: Evaluator,

    next_generation: u64,
    latest_output: u64,
    latest_derived: u64,
    // Generation of the render currently shown in the output pane.
    shown_output: u64,
    in_flight: usize,
    path_refresh: bool,

    // Last successful raw render, kept so a format switch needs no network call.
    last_raw: Option<String>,
    query_source: Option<String>,
}

impl ToolSession<BufferPane> {
    pub fn new(
        tool: ToolKind,
        config: &EvalpadConfig,
        store: SharedStore,
        backend: Arc<dyn EvalBackend>,
    ) -> Self {
        Self::with_panes(tool, config, store, backend, Panes::buffers())
    }
}

impl<P: TextPane> ToolSession<P> {
    /// Build a session over caller-supplied panes and fill them from the
    /// persisted draft (or the built-in example).
    pub fn with_panes(
        tool: ToolKind,
        config: &EvalpadConfig,
        store: SharedStore,
        backend: Arc<dyn EvalBackend>,
        panes: Panes<P>,
    ) -> Self {
        let drafts = DraftStore::new(tool, store.clone());
        let initial = drafts.load();

        let mut session = Self {
            tool,
            panes,
            query: String::new(),
            format: OutputFormat::default(),
            evaluate_timer: Debouncer::new(config.timing.render_delay_ms),
            persist_timer: Debouncer::new(config.timing.persist_delay_ms),
            drafts,
            presets: PresetManager::new(tool, store),
            evaluator: Evaluator::new(tool, backend),
            next_generation: 0,
            latest_output: 0,
            latest_derived: 0,
            shown_output: 0,
            in_flight: 0,
            path_refresh: false,
            last_raw: None,
            query_source: None,
        };
        session.show_draft(initial);
        session
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of jobs handed out and not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Earliest pending timer deadline, for scheduling the next `tick`.
    pub fn next_deadline(&self) -> Option<u64> {
        match (self.evaluate_timer.deadline(), self.persist_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_evaluation_pending(&self) -> bool {
        self.evaluate_timer.is_pending()
    }

    pub fn is_persist_pending(&self) -> bool {
        self.persist_timer.is_pending()
    }

    pub fn current_draft(&self) -> Draft {
        Draft {
            primary: self.panes.primary.value().to_string(),
            data: self.panes.data.value().to_string(),
            query: self.query.clone(),
            format: self.format,
        }
    }

    // ---- Change-debounce controller ----

    /// A content-change event on one of the input panes.
    pub fn notify_edit(&mut self, now: u64) {
        self.evaluate_timer.touch(now);
        self.persist_timer.touch(now);
    }

    /// Drive the timers. Persists when the persist timer fires and returns a
    /// job when the evaluate timer fires, or a path job when a late render
    /// left the derived pane out of date.
    pub fn tick(&mut self, now: u64) -> Option<EvaluationJob> {
        let primary_changed = self.panes.primary.take_changed();
        let data_changed = self.panes.data.take_changed();
        if primary_changed || data_changed {
            self.notify_edit(now);
        }

        if self.persist_timer.poll(now) {
            self.persist();
        }

        if self.evaluate_timer.poll(now) {
            Some(self.evaluate_now())
        } else if self.path_refresh {
            self.path_job()
        } else {
            None
        }
    }

    pub fn is_path_refresh_pending(&self) -> bool {
        self.path_refresh
    }

    /// Job for an immediate evaluation (start-up, preset load, reset).
    pub fn evaluate_now(&mut self) -> EvaluationJob {
        self.path_refresh = false;
        let generation = self.issue();
        self.latest_output = generation;
        if self.tool.has_path_query() {
            self.latest_derived = generation;
        }

        EvaluationJob {
            generation,
            evaluator: self.evaluator.clone(),
            kind: JobKind::Evaluate {
                primary: self.panes.primary.value().to_string(),
                data: self.panes.data.value().to_string(),
                query: self.query.clone(),
                format: self.format,
            },
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) -> Option<EvaluationJob> {
        self.query = query.into();
        self.persist();
        self.path_job()
    }

    /// Switch the output format: re-format the last render locally, persist,
    /// and re-run the path query over the new text.
    pub fn set_format(&mut self, format: OutputFormat) -> Option<EvaluationJob> {
        if format == self.format {
            return None;
        }
        self.format = format;

        if let Some(raw) = self.last_raw.clone() {
            let formatted = format_output(&raw, format);
            self.panes.output.set_value(formatted.text);
            self.query_source = formatted.query_source;
        }

        self.persist();
        self.path_job()
    }

    /// Write the draft now and disarm the persist timer (window close).
    pub fn flush(&mut self) {
        self.persist_timer.cancel();
        self.persist();
    }

    fn persist(&self) {
        log::debug!("Persisting {:?} draft", self.tool);
        self.drafts.save(&self.current_draft());
    }

    fn issue(&mut self) -> u64 {
        self.next_generation += 1;
        self.in_flight += 1;
        self.next_generation
    }

    fn path_job(&mut self) -> Option<EvaluationJob> {
        if !self.tool.has_path_query() {
            return None;
        }
        let source = self.query_source.clone().filter(|s| !s.is_empty())?;

        self.path_refresh = false;
        let generation = self.issue();
        self.latest_derived = generation;
        Some(EvaluationJob {
            generation,
            evaluator: self.evaluator.clone(),
            kind: JobKind::PathOnly {
                source,
                source_generation: self.shown_output,
                query: self.query.clone(),
            },
        })
    }

    // ---- Applying results ----

    /// Write a finished job's results into the panes. Returns `false` when
    /// the whole outcome was stale and dropped.
    pub fn apply(&mut self, outcome: JobOutcome) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            JobOutcome::Evaluated {
                generation,
                result,
                output,
                path,
                query,
                format,
            } => {
                if generation < self.latest_output {
                    log::debug!(
                        "Dropping stale evaluation {} (latest {})",
                        generation,
                        self.latest_output
                    );
                    return false;
                }

                self.shown_output = generation;
                self.path_refresh = false;

                match (&result, output) {
                    (EvaluationResult::Success(raw), Some(formatted)) => {
                        // The format may have been switched while the render was in flight.
                        let formatted = if format == self.format {
                            formatted
                        } else {
                            format_output(raw, self.format)
                        };
                        self.last_raw = Some(raw.clone());
                        self.query_source = formatted.query_source;
                        self.panes.output.set_value(formatted.text);

                        if format == self.format && query == self.query {
                            if let Some(path) = path {
                                self.panes.derived.set_value(path.to_pane_text());
                            }
                        } else {
                            log::debug!("Render {} outlived its query or format, re-querying", generation);
                            self.path_refresh = self.tool.has_path_query()
                                && self.query_source.as_deref().is_some_and(|s| !s.is_empty());
                        }
                    }
                    _ => {
                        self.last_raw = None;
                        self.query_source = None;
                        self.panes.output.set_value(result.to_pane_text(self.tool));
                    }
                }
                true
            }
            JobOutcome::PathQueried {
                generation,
                source_generation,
                result,
            } => {
                if generation < self.latest_derived || source_generation < self.shown_output {
                    log::debug!("Dropping stale path query {}", generation);
                    return false;
                }
                self.panes.derived.set_value(result.to_pane_text());
                true
            }
        }
    }

    // ---- Drafts and presets ----

    fn show_draft(&mut self, draft: Draft) {
        self.panes.primary.set_value(draft.primary);
        self.panes.data.set_value(draft.data);
        self.query = draft.query;
        self.format = draft.format;
        self.evaluate_timer.cancel();
        self.persist_timer.cancel();
    }

    pub fn preset_names(&self) -> Vec<String> {
        self.presets.list()
    }

    pub fn save_preset(&self, name: &str) -> Result<String, PresetError> {
        self.presets.save(name, &self.current_draft())
    }

    /// Replace the live draft with a preset, persist it and return the job
    /// that re-evaluates it.
    pub fn load_preset(&mut self, name: &str) -> Result<EvaluationJob, PresetError> {
        let draft = self.presets.load(name)?;
        self.show_draft(draft);
        self.persist();
        Ok(self.evaluate_now())
    }

    pub fn delete_preset(&self, name: &str, confirmed: bool) -> Result<(), PresetError> {
        self.presets.delete(name, confirmed)
    }

    /// Restore the built-in example and forget the persisted draft.
    pub fn reset_to_examples(&mut self, confirmed: bool) -> Option<EvaluationJob> {
        if !confirmed {
            return None;
        }
        log::info!("Resetting {:?} to examples", self.tool);
        self.show_draft(self.drafts.example());
        self.drafts.clear_draft();
        Some(self.evaluate_now())
    }
}
