//! Native desktop build of the workbench.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use evalpad_core::{shared, EvalpadConfig, FileStore, MemoryStore};
    use evalpad_ui::EvalpadApp;

    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let config = EvalpadConfig::load();
    let store = match FileStore::open(&config.storage.path) {
        Ok(store) => shared(store),
        Err(e) => {
            log::warn!("Drafts will not survive a restart: {}", e);
            shared(MemoryStore::new())
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([800.0, 600.0]),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        "Evalpad",
        options,
        Box::new(move |cc| Ok(Box::new(EvalpadApp::new(cc, config, store)))),
    )
    .map_err(|e| anyhow::anyhow!("eframe failed: {}", e))
}

#[cfg(target_arch = "wasm32")]
fn main() {}
