#[macro_use]
mod browser;
pub mod dom;
pub mod engine;
pub mod error;
pub mod loader;
pub mod page;
#[cfg(test)]
pub(crate) mod testutil;

use engine::Engine;
use loader::{AssetLoader, AssetManifest, BrowserLoad};
use wasm_bindgen::prelude::*;

const PAGE_CONTAINER_ID: &str = "pages";
const MANIFEST_PATH: &str = "Assets/manifest.json";
const PROGRESS_ID: &str = "progress";

/// Main entry for the WebAssembly module:
/// - builds the engine and registers its actions
/// - collects the pages from the container element
/// - shows the loader page while the assets stream in
/// - switches to the menu once everything has settled
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let engine = Engine::new().map_err(into_js)?;
    engine.setup_actions();
    engine.pages().register_page(PAGE_CONTAINER_ID).map_err(into_js)?;
    engine.pages().use_page("loader").map_err(into_js)?;

    let assets = engine.assets().clone();
    assets.set_on_progress(|progress| {
        log!("Loaded {} of {} assets", progress.settled(), progress.total);
        let percent = format!("{}%", (progress.fraction() * 100.0).round());
        let _ = browser::set_text_by_id(PROGRESS_ID, &percent);
    });

    let pages = engine.pages().clone();
    assets.set_on_complete(move |summary| {
        log!("Assets done loading");
        if summary.failed > 0 {
            log!("{} of {} assets failed to load", summary.failed, summary.total);
        }
        if let Err(err) = pages.use_page("menu") {
            log!("Could not show the menu : {}", err);
        }
    });

    browser::spawn_local(async move {
        if let Err(err) = queue_and_start(&assets).await {
            log!("Asset loading did not start : {}", err);
        }
    });

    Ok(())
}

async fn queue_and_start(assets: &AssetLoader<BrowserLoad>) -> anyhow::Result<()> {
    let manifest: AssetManifest = browser::fetch_json(MANIFEST_PATH).await?;
    assets.add_manifest(manifest)?;
    assets.start()?;
    Ok(())
}

fn into_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
