//! Downloads and caches game assets, reporting aggregate progress.

use crate::browser;
use crate::error::{Error, Result};
use anyhow::anyhow;
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlImageElement;

/// How a fetched body is decoded into a cacheable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
}

struct SupportedType {
    extensions: &'static [&'static str],
    kind: AssetKind,
}

const SUPPORTED_TYPES: &[SupportedType] = &[SupportedType {
    extensions: &[".png", ".jpg", ".svg"],
    kind: AssetKind::Image,
}];

/// The first table entry with an extension occurring in the link wins.
fn kind_for_link(link: &str) -> Option<AssetKind> {
    SUPPORTED_TYPES
        .iter()
        .find(|entry| entry.extensions.iter().any(|ext| link.contains(ext)))
        .map(|entry| entry.kind)
}

/// One (key, link) pair to load. Doubles as the manifest entry format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    pub key: String,
    pub link: String,
}

/// Asset list fetched as JSON and fed through the normal `add` path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetManifest {
    pub assets: Vec<AssetEntry>,
}

/// Counter snapshot handed to the progress and completion callbacks. An
/// asset is settled once it has either succeeded or failed; the caller
/// decides what a completion with failures means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Settled fraction in [0, 1]. An empty pass counts as fully loaded.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.settled() as f64 / self.total as f64).min(1.0)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.settled() >= self.total
    }
}

/// Images already present in the document when a pass starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentImages {
    pub complete: usize,
    pub pending: usize,
}

/// Where the loader meets the host: per-kind decode, the document's
/// pre-existing images, and task spawning.
#[async_trait(?Send)]
pub trait LoadBackend {
    type Resource;

    async fn load(&self, kind: AssetKind, link: &str) -> Result<Self::Resource>;

    /// Counts the document's images. Still-loading ones must report through
    /// `on_settled` once their load or error event fires.
    fn watch_document_images(&self, on_settled: Rc<dyn Fn(bool)>) -> DocumentImages;

    fn spawn_load(&self, task: LocalBoxFuture<'static, ()>);
}

/// Downloads and caches game assets.
///
/// A loader runs a single pass: queue entries with [`AssetLoader::add`],
/// then [`AssetLoader::start`] launches every fetch at once. Each settle
/// reports progress; the completion callback fires exactly once, when every
/// asset has succeeded or failed.
pub struct AssetLoader<B: LoadBackend> {
    backend: Rc<B>,
    state: Rc<RefCell<LoadState<B::Resource>>>,
    callbacks: Rc<Callbacks>,
}

struct LoadState<R> {
    pending: Vec<AssetEntry>,
    cache: HashMap<String, R>,
    total: usize,
    succeeded: usize,
    failed: usize,
    started: bool,
}

impl<R> LoadState<R> {
    fn progress(&self) -> LoadProgress {
        LoadProgress {
            succeeded: self.succeeded,
            failed: self.failed,
            total: self.total,
        }
    }
}

impl<R> Default for LoadState<R> {
    fn default() -> Self {
        LoadState {
            pending: Vec::new(),
            cache: HashMap::new(),
            total: 0,
            succeeded: 0,
            failed: 0,
            started: false,
        }
    }
}

#[derive(Default)]
struct Callbacks {
    progress: RefCell<Option<Rc<dyn Fn(LoadProgress)>>>,
    complete: RefCell<Option<Box<dyn FnOnce(LoadProgress)>>>,
}

impl<B> AssetLoader<B>
where
    B: LoadBackend + 'static,
    B::Resource: 'static,
{
    pub fn new(backend: B) -> Self {
        AssetLoader {
            backend: Rc::new(backend),
            state: Rc::new(RefCell::new(LoadState::default())),
            callbacks: Rc::new(Callbacks::default()),
        }
    }

    /// Runs on every settle with the current counters.
    pub fn set_on_progress(&self, callback: impl Fn(LoadProgress) + 'static) {
        *self.callbacks.progress.borrow_mut() = Some(Rc::new(callback));
    }

    /// Runs once all assets have settled.
    pub fn set_on_complete(&self, callback: impl FnOnce(LoadProgress) + 'static) {
        *self.callbacks.complete.borrow_mut() = Some(Box::new(callback));
    }

    /// Queues a file to load. The link must carry a supported extension;
    /// unsupported types are rejected here, not at fetch time.
    pub fn add(&self, key: &str, link: &str) -> Result<()> {
        if kind_for_link(link).is_none() {
            return Err(Error::UnsupportedAssetType {
                key: key.to_string(),
                link: link.to_string(),
            });
        }
        let mut state = self.state.borrow_mut();
        if state.started {
            return Err(Error::AlreadyStarted);
        }
        state.pending.push(AssetEntry {
            key: key.to_string(),
            link: link.to_string(),
        });
        Ok(())
    }

    pub fn add_manifest(&self, manifest: AssetManifest) -> Result<()> {
        for entry in manifest.assets {
            self.add(&entry.key, &entry.link)?;
        }
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn progress(&self) -> LoadProgress {
        self.state.borrow().progress()
    }

    /// Cached resource for the key, once its fetch has succeeded. Duplicate
    /// keys share one slot; the last completed fetch wins.
    pub fn asset(&self, key: &str) -> Option<B::Resource>
    where
        B::Resource: Clone,
    {
        self.state.borrow().cache.get(key).cloned()
    }

    /// Launches every queued fetch at once. The total also counts images
    /// already present in the document; still-loading ones settle through
    /// their load and error events. With nothing to load at all, the
    /// completion callback fires right away.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            if state.started {
                return Err(Error::AlreadyStarted);
            }
            state.started = true;
        }

        let watcher: Rc<dyn Fn(bool)> = {
            let state = Rc::clone(&self.state);
            let callbacks = Rc::clone(&self.callbacks);
            Rc::new(move |loaded| settle_document_image(&state, &callbacks, loaded))
        };
        let images = self.backend.watch_document_images(watcher);

        let (total, entries) = {
            let mut state = self.state.borrow_mut();
            state.total = state.pending.len() + images.complete + images.pending;
            state.succeeded += images.complete;
            (state.total, state.pending.clone())
        };

        if total == 0 {
            let done = self.callbacks.complete.borrow_mut().take();
            if let Some(done) = done {
                done(self.progress());
            }
            return Ok(());
        }

        report_progress(&self.state, &self.callbacks);

        for AssetEntry { key, link } in entries {
            // entries were validated at add time
            let Some(kind) = kind_for_link(&link) else {
                continue;
            };
            let backend = Rc::clone(&self.backend);
            let state = Rc::clone(&self.state);
            let callbacks = Rc::clone(&self.callbacks);
            self.backend.spawn_load(
                async move {
                    let result = backend.load(kind, &link).await;
                    settle_asset(&state, &callbacks, key, &link, result);
                }
                .boxed_local(),
            );
        }

        Ok(())
    }
}

impl<B: LoadBackend> Clone for AssetLoader<B> {
    fn clone(&self) -> Self {
        AssetLoader {
            backend: Rc::clone(&self.backend),
            state: Rc::clone(&self.state),
            callbacks: Rc::clone(&self.callbacks),
        }
    }
}

fn settle_asset<R>(
    state: &Rc<RefCell<LoadState<R>>>,
    callbacks: &Rc<Callbacks>,
    key: String,
    link: &str,
    result: Result<R>,
) {
    {
        let mut state = state.borrow_mut();
        match result {
            Ok(resource) => {
                state.cache.insert(key, resource);
                state.succeeded += 1;
            }
            Err(err) => {
                state.failed += 1;
                log!("Failed to load asset '{}' from {} : {}", key, link, err);
            }
        }
    }
    report_progress(state, callbacks);
}

fn settle_document_image<R>(
    state: &Rc<RefCell<LoadState<R>>>,
    callbacks: &Rc<Callbacks>,
    loaded: bool,
) {
    {
        let mut state = state.borrow_mut();
        if loaded {
            state.succeeded += 1;
        } else {
            state.failed += 1;
            log!("A document image failed to load");
        }
    }
    report_progress(state, callbacks);
}

fn report_progress<R>(state: &Rc<RefCell<LoadState<R>>>, callbacks: &Rc<Callbacks>) {
    let snapshot = state.borrow().progress();
    let on_progress = callbacks.progress.borrow().clone();
    if let Some(on_progress) = on_progress {
        on_progress(snapshot);
    }
    if snapshot.is_complete() {
        let on_complete = callbacks.complete.borrow_mut().take();
        if let Some(on_complete) = on_complete {
            on_complete(snapshot);
        }
    }
}

/// Production backend: fetch the link, wrap the bytes in an object URL, and
/// decode through an `HtmlImageElement`.
pub struct BrowserLoad;

#[async_trait(?Send)]
impl LoadBackend for BrowserLoad {
    type Resource = HtmlImageElement;

    async fn load(&self, kind: AssetKind, link: &str) -> Result<HtmlImageElement> {
        match kind {
            AssetKind::Image => decode_image(link).await,
        }
    }

    fn watch_document_images(&self, on_settled: Rc<dyn Fn(bool)>) -> DocumentImages {
        let document = match browser::document() {
            Ok(document) => document,
            Err(err) => {
                log!("Could not reach the document : {}", err);
                return DocumentImages::default();
            }
        };
        let images = document.images();
        let mut counts = DocumentImages::default();
        for ix in 0..images.length() {
            let Some(element) = images.item(ix) else {
                continue;
            };
            let Ok(image) = element.dyn_into::<HtmlImageElement>() else {
                continue;
            };
            if image.complete() {
                counts.complete += 1;
                continue;
            }
            counts.pending += 1;
            let on_load = {
                let on_settled = Rc::clone(&on_settled);
                browser::closure_once(move || on_settled(true))
            };
            let on_error = {
                let on_settled = Rc::clone(&on_settled);
                browser::closure_once(move |_err: JsValue| on_settled(false))
            };
            image.set_onload(Some(on_load.as_ref().unchecked_ref()));
            image.set_onerror(Some(on_error.as_ref().unchecked_ref()));
            // keep the callbacks alive until the image settles
            on_load.forget();
            on_error.forget();
        }
        counts
    }

    fn spawn_load(&self, task: LocalBoxFuture<'static, ()>) {
        browser::spawn_local(task);
    }
}

async fn decode_image(link: &str) -> Result<HtmlImageElement> {
    let blob = browser::fetch_blob(link).await.map_err(|err| Error::Fetch {
        link: link.to_string(),
        message: err.to_string(),
    })?;
    let url = browser::object_url(&blob).map_err(|err| Error::Decode {
        link: link.to_string(),
        message: err.to_string(),
    })?;
    await_image(&url).await.map_err(|err| Error::Decode {
        link: link.to_string(),
        message: err.to_string(),
    })
}

/// Resolves once the image element has decoded the given source.
async fn await_image(source: &str) -> anyhow::Result<HtmlImageElement> {
    let image = browser::new_image()?;
    let (tx, rx) = channel::<std::result::Result<(), anyhow::Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = Rc::clone(&success_tx);

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!("Error loading image : {:#?}", err)));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // keep the callbacks alive until the image loads or errors
    success_callback.forget();
    error_callback.forget();

    rx.await??;

    Ok(image)
}
