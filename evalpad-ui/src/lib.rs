//! egui front end for the evaluation workbench. Runs natively (see `main.rs`)
//! and in the browser through `start`.

pub mod app;
pub mod highlighter;
pub mod tool_view;
pub mod wasm_utils;

pub use app::EvalpadApp;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Entry point called once from the HTML page.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start(canvas_id: &str) -> Result<(), JsValue> {
    use wasm_bindgen::JsCast;

    use evalpad_core::storage::BrowserStore;
    use evalpad_core::{shared, EvalpadConfig};

    eframe::WebLogger::init(log::LevelFilter::Debug).ok();
    wasm_utils::set_panic_hook();

    let canvas = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(canvas_id))
        .and_then(|e| e.dyn_into::<web_sys::HtmlCanvasElement>().ok())
        .ok_or_else(|| JsValue::from_str(&format!("canvas #{} not found", canvas_id)))?;

    wasm_bindgen_futures::spawn_local(async move {
        let web_options = eframe::WebOptions::default();
        let start_result = eframe::WebRunner::new()
            .start(
                canvas,
                web_options,
                Box::new(|cc| {
                    let store = shared(BrowserStore);
                    Ok(Box::new(EvalpadApp::new(cc, EvalpadConfig::default(), store)))
                }),
            )
            .await;

        // Remove the loading text and spinner
        if let Some(loading_text) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id("loading_text"))
        {
            match start_result {
                Ok(_) => loading_text.remove(),
                Err(e) => {
                    loading_text.set_inner_html("<p> The app has crashed. See the developer console for details. </p>");
                    log::error!("Failed to start eframe: {:?}", e);
                }
            }
        }
    });

    Ok(())
}
