//! The page manager reaches the document only through this seam, so the
//! registry logic can run headless.

use crate::browser;
use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element};

/// Everything the page manager needs from the document: lookup by ID,
/// subtree queries for marker classes and attributes, class-list mutation,
/// and click binding.
pub trait Dom {
    type Element: Clone;

    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
    fn element_id(&self, element: &Self::Element) -> String;
    fn query_class(&self, root: &Self::Element, class: &str) -> Vec<Self::Element>;
    fn query_attr(&self, root: &Self::Element, attr: &str) -> Vec<Self::Element>;
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;
    fn has_class(&self, element: &Self::Element, class: &str) -> bool;
    fn add_class(&self, element: &Self::Element, class: &str);
    fn remove_class(&self, element: &Self::Element, class: &str);
    fn bind_click(&self, element: &Self::Element, handler: Rc<dyn Fn()>);
}

/// `Dom` over the real document. Click closures are retained here for the
/// lifetime of the manager; pages are never unregistered.
pub struct BrowserDom {
    document: Document,
    handlers: RefCell<Vec<Closure<dyn FnMut()>>>,
}

impl BrowserDom {
    pub fn new() -> Result<Self> {
        Ok(BrowserDom {
            document: browser::document()?,
            handlers: RefCell::new(Vec::new()),
        })
    }
}

impl Dom for BrowserDom {
    type Element = Element;

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn element_id(&self, element: &Element) -> String {
        element.id()
    }

    fn query_class(&self, root: &Element, class: &str) -> Vec<Element> {
        select_all(root, &format!(".{}", class))
    }

    fn query_attr(&self, root: &Element, attr: &str) -> Vec<Element> {
        select_all(root, &format!("[{}]", attr))
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn add_class(&self, element: &Element, class: &str) {
        if let Err(err) = element.class_list().add_1(class) {
            log!("Could not add class '{}' : {:#?}", class, err);
        }
    }

    fn remove_class(&self, element: &Element, class: &str) {
        if let Err(err) = element.class_list().remove_1(class) {
            log!("Could not remove class '{}' : {:#?}", class, err);
        }
    }

    fn bind_click(&self, element: &Element, handler: Rc<dyn Fn()>) {
        let closure = Closure::wrap(Box::new(move || handler()) as Box<dyn FnMut()>);
        if let Err(err) =
            element.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
        {
            log!("Could not attach click handler : {:#?}", err);
        }
        self.handlers.borrow_mut().push(closure);
    }
}

fn select_all(root: &Element, selector: &str) -> Vec<Element> {
    let mut found = Vec::new();
    let Ok(list) = root.query_selector_all(selector) else {
        return found;
    };
    for ix in 0..list.length() {
        if let Some(node) = list.item(ix) {
            if let Ok(element) = node.dyn_into::<Element>() {
                found.push(element);
            }
        }
    }
    found
}
