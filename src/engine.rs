use crate::dom::BrowserDom;
use crate::loader::{AssetLoader, BrowserLoad};
use crate::page::{Action, PageManager};
use anyhow::Result;

/// Game engine: one page registry and one asset pass, wired together by
/// `main_js`.
pub struct Engine {
    pages: PageManager<BrowserDom>,
    assets: AssetLoader<BrowserLoad>,
}

impl Engine {
    pub fn new() -> Result<Self> {
        Ok(Engine {
            pages: PageManager::new(BrowserDom::new()?),
            assets: AssetLoader::new(BrowserLoad),
        })
    }

    /// Registers the actions that will run for each page.
    pub fn setup_actions(&self) {
        self.pages.set_action(Action::ShowMenu, || log!("Hello"));
        self.pages.set_action(Action::Clicked, || log!("Awe!"));
    }

    pub fn pages(&self) -> &PageManager<BrowserDom> {
        &self.pages
    }

    pub fn assets(&self) -> &AssetLoader<BrowserLoad> {
        &self.assets
    }
}
