//! Headless doubles for the browser seams, used by the module tests.

use crate::dom::Dom;
use crate::error::{Error, Result};
use crate::loader::{AssetKind, DocumentImages, LoadBackend};
use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use futures::task::noop_waker;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;
use std::task::Context;

/// In-memory element tree implementing [`Dom`]. Class-list operations are
/// recorded in order so tests can assert deactivate-before-activate, and
/// bound click handlers can be fired with [`FakeDom::click`].
pub(crate) struct FakeDom {
    inner: Rc<RefCell<FakeDomInner>>,
}

#[derive(Default)]
struct FakeDomInner {
    elements: HashMap<String, FakeElement>,
    class_ops: Vec<(String, &'static str, String)>,
    handlers: HashMap<String, Rc<dyn Fn()>>,
}

#[derive(Default)]
struct FakeElement {
    classes: HashSet<String>,
    attrs: HashMap<String, String>,
    children: Vec<String>,
}

impl FakeDom {
    pub fn new() -> Self {
        FakeDom {
            inner: Rc::new(RefCell::new(FakeDomInner::default())),
        }
    }

    pub fn insert(&self, id: &str, classes: &[&str], attrs: &[(&str, &str)]) {
        self.inner
            .borrow_mut()
            .elements
            .insert(id.to_string(), FakeElement::with(classes, attrs));
    }

    pub fn insert_child(&self, parent: &str, id: &str, classes: &[&str], attrs: &[(&str, &str)]) {
        let mut inner = self.inner.borrow_mut();
        inner
            .elements
            .insert(id.to_string(), FakeElement::with(classes, attrs));
        inner
            .elements
            .get_mut(parent)
            .unwrap_or_else(|| panic!("no parent element {}", parent))
            .children
            .push(id.to_string());
    }

    /// Fires the click handler bound to the element.
    pub fn click(&self, id: &str) {
        let handler = self
            .inner
            .borrow()
            .handlers
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("no click handler bound on {}", id));
        handler();
    }

    pub fn has(&self, id: &str, class: &str) -> bool {
        self.inner
            .borrow()
            .elements
            .get(id)
            .map_or(false, |element| element.classes.contains(class))
    }

    pub fn class_ops(&self) -> Vec<(String, &'static str, String)> {
        self.inner.borrow().class_ops.clone()
    }
}

impl Clone for FakeDom {
    fn clone(&self) -> Self {
        FakeDom {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl FakeElement {
    fn with(classes: &[&str], attrs: &[(&str, &str)]) -> Self {
        FakeElement {
            classes: classes.iter().map(|class| class.to_string()).collect(),
            attrs: attrs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            children: Vec::new(),
        }
    }
}

impl FakeDomInner {
    fn descendants(&self, root: &str) -> Vec<String> {
        let mut found = Vec::new();
        let Some(element) = self.elements.get(root) else {
            return found;
        };
        for child in &element.children {
            found.push(child.clone());
            found.extend(self.descendants(child));
        }
        found
    }
}

impl Dom for FakeDom {
    type Element = String;

    fn element_by_id(&self, id: &str) -> Option<String> {
        self.inner
            .borrow()
            .elements
            .contains_key(id)
            .then(|| id.to_string())
    }

    fn element_id(&self, element: &String) -> String {
        element.clone()
    }

    fn query_class(&self, root: &String, class: &str) -> Vec<String> {
        let inner = self.inner.borrow();
        inner
            .descendants(root)
            .into_iter()
            .filter(|id| {
                inner
                    .elements
                    .get(id)
                    .map_or(false, |element| element.classes.contains(class))
            })
            .collect()
    }

    fn query_attr(&self, root: &String, attr: &str) -> Vec<String> {
        let inner = self.inner.borrow();
        inner
            .descendants(root)
            .into_iter()
            .filter(|id| {
                inner
                    .elements
                    .get(id)
                    .map_or(false, |element| element.attrs.contains_key(attr))
            })
            .collect()
    }

    fn attribute(&self, element: &String, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .elements
            .get(element)
            .and_then(|element| element.attrs.get(name).cloned())
    }

    fn has_class(&self, element: &String, class: &str) -> bool {
        self.has(element, class)
    }

    fn add_class(&self, element: &String, class: &str) {
        let mut inner = self.inner.borrow_mut();
        if let Some(entry) = inner.elements.get_mut(element) {
            entry.classes.insert(class.to_string());
        }
        inner
            .class_ops
            .push((element.clone(), "add", class.to_string()));
    }

    fn remove_class(&self, element: &String, class: &str) {
        let mut inner = self.inner.borrow_mut();
        if let Some(entry) = inner.elements.get_mut(element) {
            entry.classes.remove(class);
        }
        inner
            .class_ops
            .push((element.clone(), "remove", class.to_string()));
    }

    fn bind_click(&self, element: &String, handler: Rc<dyn Fn()>) {
        self.inner
            .borrow_mut()
            .handlers
            .insert(element.clone(), handler);
    }
}

/// [`LoadBackend`] whose fetches settle only when the test says so, in
/// whatever order the test picks. Spawned tasks are collected and polled
/// from [`FakeLoad::run_ready`].
pub(crate) struct FakeLoad {
    inner: Rc<RefCell<FakeLoadInner>>,
}

#[derive(Default)]
struct FakeLoadInner {
    waiting: Vec<(String, oneshot::Sender<Result<String>>)>,
    tasks: Vec<LocalBoxFuture<'static, ()>>,
    complete_images: usize,
    pending_images: usize,
    image_watcher: Option<Rc<dyn Fn(bool)>>,
}

impl FakeLoad {
    pub fn new() -> Self {
        FakeLoad::with_document_images(0, 0)
    }

    pub fn with_document_images(complete: usize, pending: usize) -> Self {
        FakeLoad {
            inner: Rc::new(RefCell::new(FakeLoadInner {
                complete_images: complete,
                pending_images: pending,
                ..FakeLoadInner::default()
            })),
        }
    }

    /// Settles the oldest in-flight fetch for the link.
    pub fn resolve(&self, link: &str, result: Result<String>) {
        let sender = {
            let mut inner = self.inner.borrow_mut();
            let ix = inner
                .waiting
                .iter()
                .position(|(waiting, _)| waiting == link)
                .unwrap_or_else(|| panic!("no pending fetch for {}", link));
            inner.waiting.remove(ix).1
        };
        let _ = sender.send(result);
    }

    /// Polls every spawned load task once, dropping the finished ones.
    pub fn run_ready(&self) {
        let mut tasks = std::mem::take(&mut self.inner.borrow_mut().tasks);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        tasks.retain_mut(|task| task.as_mut().poll(&mut cx).is_pending());
        self.inner.borrow_mut().tasks.extend(tasks);
    }

    /// Fires the load (or error) event of one still-pending document image.
    pub fn settle_document_image(&self, loaded: bool) {
        let watcher = self
            .inner
            .borrow()
            .image_watcher
            .clone()
            .expect("watch_document_images was not called");
        watcher(loaded);
    }
}

impl Clone for FakeLoad {
    fn clone(&self) -> Self {
        FakeLoad {
            inner: Rc::clone(&self.inner),
        }
    }
}

#[async_trait(?Send)]
impl LoadBackend for FakeLoad {
    type Resource = String;

    async fn load(&self, _kind: AssetKind, link: &str) -> Result<String> {
        let receiver = {
            let (sender, receiver) = oneshot::channel();
            self.inner
                .borrow_mut()
                .waiting
                .push((link.to_string(), sender));
            receiver
        };
        receiver.await.unwrap_or_else(|_| {
            Err(Error::Fetch {
                link: link.to_string(),
                message: "sender dropped".to_string(),
            })
        })
    }

    fn watch_document_images(&self, on_settled: Rc<dyn Fn(bool)>) -> DocumentImages {
        let mut inner = self.inner.borrow_mut();
        inner.image_watcher = Some(on_settled);
        DocumentImages {
            complete: inner.complete_images,
            pending: inner.pending_images,
        }
    }

    fn spawn_load(&self, task: LocalBoxFuture<'static, ()>) {
        self.inner.borrow_mut().tasks.push(task);
    }
}
