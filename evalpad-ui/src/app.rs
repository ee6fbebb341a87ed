use std::sync::Arc;

use evalpad_core::{EvalBackend, EvalClient, EvalpadConfig, SharedStore, ToolKind};

use crate::tool_view::ToolView;
use crate::wasm_utils;

const ACTIVE_TOOL_KEY: &str = "evalpad_active_tool";

/// Two tools side by side in tabs, each with its own session and timers.
pub struct EvalpadApp {
    active: ToolKind,
    jinja: ToolView,
    predicate: ToolView,
    api_url: String,
}

impl EvalpadApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: EvalpadConfig, store: SharedStore) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let backend: Arc<dyn EvalBackend> = Arc::new(EvalClient::from_config(&config));
        let active = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, ACTIVE_TOOL_KEY))
            .unwrap_or(ToolKind::Jinja);

        let mut jinja = ToolView::new(ToolKind::Jinja, &config, store.clone(), backend.clone());
        let mut predicate = ToolView::new(ToolKind::Predicate, &config, store, backend);
        jinja.start(&cc.egui_ctx);
        predicate.start(&cc.egui_ctx);

        log::info!("Evalpad started against {}", config.api.base_url);

        Self {
            active,
            jinja,
            predicate,
            api_url: config.api.base_url,
        }
    }

    fn active_view(&mut self) -> &mut ToolView {
        match self.active {
            ToolKind::Jinja => &mut self.jinja,
            ToolKind::Predicate => &mut self.predicate,
        }
    }
}

impl eframe::App for EvalpadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Both tools keep their timers running, visible or not
        let now = wasm_utils::now_timestamp();
        self.jinja.tick(ctx, now);
        self.predicate.tick(ctx, now);

        egui::TopBottomPanel::top("tool_tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Evalpad");
                ui.separator();
                for tool in [ToolKind::Jinja, ToolKind::Predicate] {
                    ui.selectable_value(&mut self.active, tool, tool.title());
                }
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.small(format!("API: {}", self.api_url));
                let busy = [&self.jinja, &self.predicate]
                    .iter()
                    .filter(|view| view.is_busy())
                    .count();
                if busy > 0 {
                    ui.separator();
                    ui.small(format!("{} evaluating", busy));
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.active_view().ui(ui);
        });
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.jinja.flush();
        self.predicate.flush();
        eframe::set_value(storage, ACTIVE_TOOL_KEY, &self.active);
    }
}
