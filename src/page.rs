//! Registry of DOM-backed pages: exactly one page is shown at a time, and
//! markup can reference named actions for startup hooks and click handlers.

use crate::dom::Dom;
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

mod markup {
    pub const PAGE: &str = "page";
    pub const ACTIVE: &str = "active";
    pub const STARTUP_ATTR: &str = "data-startUpMethod";
    pub const ONCLICK_ATTR: &str = "data-onclick";
    pub const MENU: &str = "menu";
    pub const LOADER: &str = "loader";
}

/// The actions markup may reference, keyed by the names the attributes
/// carry. `goToMenu` and `goToLoader` switch pages unless a registered
/// callback overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// `onShowMenu`
    ShowMenu,
    /// `clicked`
    Clicked,
    /// `goToMenu`
    GoToMenu,
    /// `goToLoader`
    GoToLoader,
}

impl Action {
    pub fn from_attr(name: &str) -> Option<Action> {
        match name {
            "onShowMenu" => Some(Action::ShowMenu),
            "clicked" => Some(Action::Clicked),
            "goToMenu" => Some(Action::GoToMenu),
            "goToLoader" => Some(Action::GoToLoader),
            _ => None,
        }
    }

    pub fn attr_name(self) -> &'static str {
        match self {
            Action::ShowMenu => "onShowMenu",
            Action::Clicked => "clicked",
            Action::GoToMenu => "goToMenu",
            Action::GoToLoader => "goToLoader",
        }
    }
}

/// What runs each time a page becomes active.
#[derive(Clone, Default)]
pub enum Startup {
    #[default]
    None,
    /// Dispatched through the action table.
    Action(Action),
    /// Invoked directly.
    Callback(Rc<dyn Fn()>),
}

/// Controls which page is currently being shown.
///
/// Handles are cheap clones over shared state, so click closures can
/// dispatch back into the registry.
pub struct PageManager<D: Dom> {
    inner: Rc<RefCell<Inner<D>>>,
}

struct Inner<D: Dom> {
    dom: D,
    pages: HashMap<String, Page<D::Element>>,
    active: Option<String>,
    actions: HashMap<Action, Rc<dyn Fn()>>,
}

struct Page<E> {
    target: E,
    startup: Startup,
}

impl<D: Dom + 'static> PageManager<D> {
    pub fn new(dom: D) -> Self {
        PageManager {
            inner: Rc::new(RefCell::new(Inner {
                dom,
                pages: HashMap::new(),
                active: None,
                actions: HashMap::new(),
            })),
        }
    }

    /// Registers or overwrites the callback behind an action name.
    pub fn set_action(&self, action: Action, callback: impl Fn() + 'static) {
        self.inner
            .borrow_mut()
            .actions
            .insert(action, Rc::new(callback));
    }

    /// Registers every child of the container that carries the page class,
    /// resolving each `data-startUpMethod` name against the action table.
    pub fn register_page(&self, container_id: &str) -> Result<()> {
        let found = {
            let inner = self.inner.borrow();
            let container = inner
                .dom
                .element_by_id(container_id)
                .ok_or_else(|| Error::MissingContainer(container_id.to_string()))?;
            inner
                .dom
                .query_class(&container, markup::PAGE)
                .into_iter()
                .map(|page| {
                    (
                        inner.dom.element_id(&page),
                        inner.dom.attribute(&page, markup::STARTUP_ATTR),
                    )
                })
                .collect::<Vec<_>>()
        };
        for (id, startup_name) in found {
            let startup = match startup_name {
                Some(name) if !name.is_empty() => Startup::Action(self.resolve_name(&name)?),
                _ => Startup::None,
            };
            self.add(&id, startup)?;
        }
        Ok(())
    }

    /// Registers a single page by element ID. The element must exist and
    /// carry the page class. Elements in its subtree marked with
    /// `data-onclick` get their click handler bound to the named action.
    pub fn add(&self, id: &str, startup: Startup) -> Result<()> {
        if let Startup::Action(action) = &startup {
            if !self.resolves(*action) {
                return Err(Error::UnknownAction(action.attr_name().to_string()));
            }
        }
        let (target, bindings) = {
            let inner = self.inner.borrow();
            let target = inner
                .dom
                .element_by_id(id)
                .ok_or_else(|| Error::MissingElement(id.to_string()))?;
            if !inner.dom.has_class(&target, markup::PAGE) {
                return Err(Error::NotAPage(id.to_string()));
            }
            let bindings = inner
                .dom
                .query_attr(&target, markup::ONCLICK_ATTR)
                .into_iter()
                .filter_map(|element| {
                    inner
                        .dom
                        .attribute(&element, markup::ONCLICK_ATTR)
                        .filter(|name| !name.is_empty())
                        .map(|name| (element, name))
                })
                .collect::<Vec<_>>();
            (target, bindings)
        };
        self.inner
            .borrow_mut()
            .pages
            .insert(id.to_string(), Page { target, startup });
        for (element, name) in bindings {
            let action = self.resolve_name(&name)?;
            let weak = Rc::downgrade(&self.inner);
            let handler: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let manager = PageManager { inner };
                    if let Err(err) = manager.run_action(action) {
                        log!("Click action '{}' failed : {}", action.attr_name(), err);
                    }
                }
            });
            self.inner.borrow().dom.bind_click(&element, handler);
        }
        Ok(())
    }

    /// Shows the page registered under the key: the previous page loses the
    /// active class before the new one gains it, then the startup hook runs.
    /// Re-selecting the active page re-runs its hook.
    pub fn use_page(&self, key: &str) -> Result<()> {
        let startup = {
            let mut inner = self.inner.borrow_mut();
            let page = inner
                .pages
                .get(key)
                .ok_or_else(|| Error::UnregisteredPage(key.to_string()))?;
            let target = page.target.clone();
            let startup = page.startup.clone();
            let previous = inner.active.take();
            let previous = previous.and_then(|prev| inner.pages.get(&prev).map(|page| page.target.clone()));
            if let Some(previous) = previous {
                inner.dom.remove_class(&previous, markup::ACTIVE);
            }
            inner.dom.add_class(&target, markup::ACTIVE);
            inner.active = Some(key.to_string());
            startup
        };
        match startup {
            Startup::None => {}
            Startup::Callback(callback) => callback(),
            Startup::Action(action) => self.run_action(action)?,
        }
        Ok(())
    }

    /// Dispatches an action: a registered callback if present, else the
    /// built-in navigation for `goToMenu` / `goToLoader`.
    pub fn run_action(&self, action: Action) -> Result<()> {
        let registered = self.inner.borrow().actions.get(&action).cloned();
        if let Some(callback) = registered {
            callback();
            return Ok(());
        }
        match action {
            Action::GoToMenu => self.use_page(markup::MENU),
            Action::GoToLoader => self.use_page(markup::LOADER),
            other => Err(Error::UnknownAction(other.attr_name().to_string())),
        }
    }

    /// Key of the page currently marked active, if any.
    pub fn active(&self) -> Option<String> {
        self.inner.borrow().active.clone()
    }

    fn resolve_name(&self, name: &str) -> Result<Action> {
        Action::from_attr(name)
            .filter(|action| self.resolves(*action))
            .ok_or_else(|| Error::UnknownAction(name.to_string()))
    }

    fn resolves(&self, action: Action) -> bool {
        self.inner.borrow().actions.contains_key(&action)
            || matches!(action, Action::GoToMenu | Action::GoToLoader)
    }
}

impl<D: Dom> Clone for PageManager<D> {
    fn clone(&self) -> Self {
        PageManager {
            inner: Rc::clone(&self.inner),
        }
    }
}
