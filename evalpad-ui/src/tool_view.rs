// Tool view - one workbench tool (Jinja renderer or predicate evaluator).
// The ToolSession holds the state; this file only renders it and bridges
// finished jobs back from the async side.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use egui::text::{CCursor, CCursorRange};
use egui::text_edit::{TextEditOutput, TextEditState};
use egui::{Color32, Id};

use evalpad_core::grammar::{self, folding_ranges, format_document, language_for, LanguageDefinition};
use evalpad_core::session::Panes;
use evalpad_core::{
    EvalBackend, EvalpadConfig, EvaluationJob, JobOutcome, OutputFormat, PresetError, SharedStore,
    TextPane, ToolKind, ToolSession,
};

use crate::highlighter::{Highlighter, PaneLanguage};
use crate::wasm_utils;

const FORMAT_INDENT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Confirm {
    DeletePreset(String),
    Reset,
}

#[derive(Debug, Clone)]
struct Alert {
    message: String,
    is_error: bool,
}

pub struct ToolView {
    session: ToolSession,
    language: Option<&'static LanguageDefinition>,
    highlighter: Highlighter,

    // ---- Preset bar ----
    preset_name: String,
    selected_preset: Option<String>,
    query_input: String,
    confirm: Option<Confirm>,
    alert: Option<Alert>,

    // ---- Editor assist ----
    primary_cursor: Option<usize>,

    // Async bridge: finished jobs are pushed here and drained every frame
    outcomes: Arc<Mutex<Vec<JobOutcome>>>,
}

impl ToolView {
    pub fn new(tool: ToolKind, config: &EvalpadConfig, store: SharedStore, backend: Arc<dyn EvalBackend>) -> Self {
        let session = ToolSession::new(tool, config, store, backend);
        let query_input = session.query().to_string();

        Self {
            session,
            language: language_for(tool),
            highlighter: Highlighter::default(),
            preset_name: String::new(),
            selected_preset: None,
            query_input,
            confirm: None,
            alert: None,
            primary_cursor: None,
            outcomes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.session.tool()
    }

    pub fn is_busy(&self) -> bool {
        self.session.in_flight() > 0
    }

    /// Initial evaluation of whatever the draft store produced.
    pub fn start(&mut self, ctx: &egui::Context) {
        let job = self.session.evaluate_now();
        self.spawn(job, ctx);
    }

    /// Write the draft now (window close, periodic save).
    pub fn flush(&mut self) {
        self.session.flush();
    }

    // ============================================
    // Async bridge
    // ============================================

    fn spawn(&self, job: EvaluationJob, ctx: &egui::Context) {
        let outcomes = self.outcomes.clone();
        let ctx = ctx.clone();
        let tool = self.tool();

        wasm_utils::spawn_async(async move {
            let outcome = job.run().await;
            match outcomes.lock() {
                Ok(mut queue) => queue.push(outcome),
                Err(_) => log::error!("{:?} outcome queue poisoned, dropping result", tool),
            }
            ctx.request_repaint();
        });
    }

    fn spawn_opt(&self, job: Option<EvaluationJob>, ctx: &egui::Context) {
        if let Some(job) = job {
            self.spawn(job, ctx);
        }
    }

    /// Apply finished jobs. Called every frame.
    pub fn update_from_async(&mut self) {
        let finished = match self.outcomes.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => return,
        };
        for outcome in finished {
            self.session.apply(outcome);
        }
    }

    /// Drive the session timers and schedule the next wake-up.
    pub fn tick(&mut self, ctx: &egui::Context, now: u64) {
        self.update_from_async();

        let job = self.session.tick(now);
        self.spawn_opt(job, ctx);

        if let Some(deadline) = self.session.next_deadline() {
            ctx.request_repaint_after(Duration::from_millis(deadline.saturating_sub(now)));
        }
    }

    // ============================================
    // Rendering
    // ============================================

    pub fn ui(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();

        self.preset_bar(ui, &ctx);
        if self.tool().has_path_query() {
            self.query_bar(ui, &ctx);
        }
        if let Some(alert) = &self.alert {
            let color = if alert.is_error { Color32::LIGHT_RED } else { Color32::LIGHT_GREEN };
            ui.colored_label(color, &alert.message);
        }
        ui.separator();

        self.panes(ui);
        self.confirm_dialog(&ctx);
    }

    fn preset_bar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.label("Preset:");
            let name_edit = ui.add(egui::TextEdit::singleline(&mut self.preset_name).desired_width(160.0));
            if name_edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                self.save_preset();
            }

            let names = self.session.preset_names();
            let selected_text = self.selected_preset.clone().unwrap_or_else(|| "Saved presets".to_string());
            egui::ComboBox::from_id_salt(("presets", self.tool()))
                .selected_text(selected_text)
                .show_ui(ui, |ui| {
                    for name in &names {
                        if ui
                            .selectable_value(&mut self.selected_preset, Some(name.clone()), name)
                            .clicked()
                        {
                            self.preset_name = name.clone();
                        }
                    }
                });

            if ui.button("💾 Save").clicked() {
                self.save_preset();
            }
            if ui.button("📂 Load").clicked() {
                self.load_preset(ctx);
            }
            if ui.button("🗑 Delete").clicked() {
                self.request_delete();
            }

            ui.separator();
            if ui.button("↺ Reset to examples").clicked() {
                self.confirm = Some(Confirm::Reset);
            }

            if let Some(lang) = self.language {
                ui.separator();
                self.assist_menus(ui, lang);
            }

            if self.is_busy() {
                ui.spinner();
            }
        });
    }

    fn query_bar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.label("JSONPath:");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.query_input)
                    .code_editor()
                    .desired_width(320.0),
            );
            if response.changed() {
                let job = self.session.set_query(self.query_input.clone());
                self.spawn_opt(job, ctx);
            }

            ui.separator();
            ui.label("Output:");
            let mut format = self.session.format();
            ui.radio_value(&mut format, OutputFormat::Json, "json");
            ui.radio_value(&mut format, OutputFormat::Text, "text");
            if format != self.session.format() {
                let job = self.session.set_format(format);
                self.spawn_opt(job, ctx);
            }
        });
    }

    /// Format, Insert and Blocks menus for the template pane.
    fn assist_menus(&mut self, ui: &mut egui::Ui, lang: &'static LanguageDefinition) {
        if ui.button("Format").clicked() {
            let formatted = format_document(self.session.panes.primary.value(), FORMAT_INDENT);
            self.session.panes.primary.edit(formatted);
        }

        ui.menu_button("Insert", |ui| {
            let text = self.session.panes.primary.value().to_string();
            let cursor = self
                .primary_cursor
                .filter(|&at| text.is_char_boundary(at))
                .unwrap_or(text.len());
            let prefix = grammar::word_at(&text, cursor)
                .filter(|(range, _)| range.end == cursor)
                .map(|(range, word)| (range.start, word.to_string()));
            let items = grammar::completions(lang, prefix.as_ref().map(|(_, w)| w.as_str()).unwrap_or(""));

            egui::ScrollArea::vertical().max_height(320.0).show(ui, |ui| {
                for item in items {
                    if ui.button(&item.label).clicked() {
                        let start = prefix.as_ref().map(|(start, _)| *start).unwrap_or(cursor);
                        let mut updated = text.clone();
                        updated.replace_range(start..cursor, &item.insert_text);
                        self.session.panes.primary.edit(updated);

                        let caret = start + item.selection.map(|s| s.end).unwrap_or(item.insert_text.len());
                        self.place_primary_cursor(ui.ctx(), caret);
                        ui.close();
                    }
                }
            });
        });

        ui.menu_button("Blocks", |ui| {
            let text = self.session.panes.primary.value();
            let ranges = folding_ranges(text);
            if ranges.is_empty() {
                ui.label("No multi-line blocks");
            }
            for range in ranges {
                let first = text.lines().nth(range.start_line).unwrap_or("").trim();
                ui.label(format!("{}-{}  {}", range.start_line + 1, range.end_line + 1, first));
            }
        });
    }

    fn primary_id(&self) -> Id {
        Id::new(("evalpad-primary", self.tool()))
    }

    fn place_primary_cursor(&self, ctx: &egui::Context, byte_offset: usize) {
        let id = self.primary_id();
        let text = self.session.panes.primary.value();
        let char_index = text
            .get(..byte_offset)
            .unwrap_or(text)
            .chars()
            .count();
        let mut state = TextEditState::load(ctx, id).unwrap_or_default();
        state.cursor.set_char_range(Some(CCursorRange::one(CCursor::new(char_index))));
        state.store(ctx, id);
    }

    fn panes(&mut self, ui: &mut egui::Ui) {
        let tool = self.tool();
        let primary_id = self.primary_id();
        let primary_language = if self.language.is_some() { PaneLanguage::Template } else { PaneLanguage::Plain };
        let output_language = match (tool, self.session.format()) {
            (ToolKind::Jinja, OutputFormat::Json) => PaneLanguage::Json,
            _ => PaneLanguage::Plain,
        };
        let pane_height = ((ui.available_height() - 90.0) / 2.0).max(120.0);

        let Self {
            session,
            highlighter,
            language,
            primary_cursor,
            ..
        } = self;
        let Panes {
            primary,
            data,
            output,
            derived,
        } = &mut session.panes;

        let mut primary_changed = false;
        let mut data_changed = false;

        ui.columns(2, |columns| {
            let left = &mut columns[0];
            left.strong(tool.primary_label());
            let primary_output = code_pane(
                left,
                primary_id,
                primary.buffer_mut(),
                highlighter,
                primary_language,
                pane_height,
            );
            primary_changed = primary_output.response.changed();
            *primary_cursor = primary_output
                .cursor_range
                .map(|range| char_to_byte(primary.value(), range.primary.index));

            left.strong("Data (JSON)");
            let data_output = code_pane(
                left,
                Id::new(("evalpad-data", tool)),
                data.buffer_mut(),
                highlighter,
                PaneLanguage::Json,
                pane_height,
            );
            data_changed = data_output.response.changed();

            let right = &mut columns[1];
            right.strong("Output");
            let mut shown = output.value();
            code_pane(
                right,
                Id::new(("evalpad-output", tool)),
                &mut shown,
                highlighter,
                output_language,
                pane_height,
            );

            if tool.has_path_query() {
                right.strong("JSONPath result");
                let mut shown = derived.value();
                code_pane(
                    right,
                    Id::new(("evalpad-derived", tool)),
                    &mut shown,
                    highlighter,
                    PaneLanguage::Json,
                    pane_height,
                );
            }
        });

        if primary_changed {
            primary.mark_changed();
        }
        if data_changed {
            data.mark_changed();
        }
        if primary_changed || data_changed {
            ui.ctx().request_repaint();
        }

        // Hover help for the word under the cursor
        if let (Some(lang), Some(cursor)) = (*language, *primary_cursor) {
            let hint = grammar::word_at(primary.value(), cursor).and_then(|(_, word)| grammar::hover(lang, word));
            if let Some(hint) = hint {
                ui.small(hint.replace("**", "").replace('`', ""));
            }
        }
    }

    // ============================================
    // Presets and dialogs
    // ============================================

    fn set_alert(&mut self, message: impl Into<String>, is_error: bool) {
        self.alert = Some(Alert {
            message: message.into(),
            is_error,
        });
    }

    fn chosen_preset(&self) -> String {
        let typed = self.preset_name.trim();
        if typed.is_empty() {
            self.selected_preset.clone().unwrap_or_default()
        } else {
            typed.to_string()
        }
    }

    fn save_preset(&mut self) {
        match self.session.save_preset(&self.preset_name) {
            Ok(name) => {
                wasm_utils::console_log(&format!("Saved preset {}", name));
                self.set_alert(format!("Preset \"{}\" saved", name), false);
                self.preset_name = name.clone();
                self.selected_preset = Some(name);
            }
            Err(PresetError::EmptyName) => self.set_alert("Enter a preset name first", true),
            Err(e) => self.set_alert(format!("Could not save preset: {}", e), true),
        }
    }

    fn load_preset(&mut self, ctx: &egui::Context) {
        let name = self.chosen_preset();
        match self.session.load_preset(&name) {
            Ok(job) => {
                self.spawn(job, ctx);
                self.query_input = self.session.query().to_string();
                self.set_alert(format!("Preset \"{}\" loaded", name), false);
            }
            Err(PresetError::NotFound(_)) => self.set_alert(format!("Preset \"{}\" not found", name), true),
            Err(e) => self.set_alert(format!("Could not load preset: {}", e), true),
        }
    }

    fn request_delete(&mut self) {
        let name = self.chosen_preset();
        if self.session.preset_names().contains(&name) {
            self.confirm = Some(Confirm::DeletePreset(name));
        } else {
            self.set_alert(format!("Preset \"{}\" not found", name), true);
        }
    }

    fn confirm_dialog(&mut self, ctx: &egui::Context) {
        let Some(confirm) = self.confirm.clone() else {
            return;
        };
        let question = match &confirm {
            Confirm::DeletePreset(name) => format!("Delete preset \"{}\"?", name),
            Confirm::Reset => "Replace the editors with the built-in examples?".to_string(),
        };

        let mut answer = None;
        egui::Window::new("Confirm")
            .id(Id::new(("evalpad-confirm", self.tool())))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(question);
                ui.horizontal(|ui| {
                    if ui.button("OK").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("Cancel").clicked() {
                        answer = Some(false);
                    }
                });
            });

        let Some(confirmed) = answer else {
            return;
        };
        self.confirm = None;

        match confirm {
            Confirm::DeletePreset(name) => match self.session.delete_preset(&name, confirmed) {
                Ok(()) => {
                    self.set_alert(format!("Preset \"{}\" deleted", name), false);
                    if self.selected_preset.as_deref() == Some(name.as_str()) {
                        self.selected_preset = None;
                    }
                    self.preset_name.clear();
                }
                Err(PresetError::Cancelled) => {}
                Err(e) => self.set_alert(format!("Could not delete preset: {}", e), true),
            },
            Confirm::Reset => {
                let job = self.session.reset_to_examples(confirmed);
                if job.is_some() {
                    self.query_input = self.session.query().to_string();
                    self.set_alert("Examples restored", false);
                }
                self.spawn_opt(job, ctx);
            }
        }
    }
}

fn char_to_byte(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Scrollable, syntax-coloured editor. Pass `&mut &str` for a read-only pane.
fn code_pane<T: egui::TextBuffer>(
    ui: &mut egui::Ui,
    id: Id,
    text: &mut T,
    highlighter: &Highlighter,
    language: PaneLanguage,
    height: f32,
) -> TextEditOutput {
    let mut layouter = |ui: &egui::Ui, buffer: &dyn egui::TextBuffer, wrap_width: f32| {
        let font = egui::TextStyle::Monospace.resolve(ui.style());
        let mut job = highlighter.layout_job(buffer.as_str(), language, font);
        job.wrap.max_width = wrap_width;
        ui.fonts_mut(|f| f.layout_job(job))
    };

    egui::ScrollArea::vertical()
        .id_salt(id)
        .max_height(height)
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            egui::TextEdit::multiline(text)
                .id(id)
                .code_editor()
                .desired_width(f32::INFINITY)
                .desired_rows(12)
                .layouter(&mut layouter)
                .show(ui)
        })
        .inner
}
