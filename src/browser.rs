use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use std::future::Future;
use wasm_bindgen::closure::{Closure, WasmClosure, WasmClosureFnOnce};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

#[rustfmt::skip]
use web_sys::{
    Blob,
    Document,
    HtmlImageElement,
    Response,
    Url,
    Window,
};

macro_rules! log {
    ($($t:tt)*) => {{
        if cfg!(target_arch = "wasm32") {
            web_sys::console::log_1(&format!($($t)*).into());
        }
    }};
}

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("Window not found"))
}

pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| anyhow!("No Document Found"))
}

pub fn new_image() -> Result<HtmlImageElement> {
    HtmlImageElement::new().map_err(|err| anyhow!("Could not create image element : {:#?}", err))
}

/// Wraps fetched bytes in a displayable object URL.
pub fn object_url(blob: &Blob) -> Result<String> {
    Url::create_object_url_with_blob(blob)
        .map_err(|err| anyhow!("Could not create object URL : {:#?}", err))
}

/// Replaces the text content of the element with the given ID, if present.
pub fn set_text_by_id(id: &str, text: &str) -> Result<()> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("No element found with ID : '{:#?}'", id))?
        .set_text_content(Some(text));
    Ok(())
}

pub fn closure_once<T, F, A, R>(f: F) -> Closure<T>
where
    T: ?Sized + WasmClosure,
    F: 'static + WasmClosureFnOnce<T, A, R>,
{
    Closure::once(f)
}

pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

pub async fn fetch_json<T>(json_path: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let resp = fetch_response(json_path).await?;
    let json = resp
        .json()
        .map_err(|err| anyhow!("Could not get JSON from response [{:#?}]", err))?;

    let json_value = JsFuture::from(json)
        .await
        .map_err(|err| anyhow!("error fetching [{:#?}]", err))?;

    serde_wasm_bindgen::from_value(json_value)
        .map_err(|err| anyhow!("error converting response : {:#?}", err))
}

/// Fetches a resource and reads its body as a binary blob.
pub async fn fetch_blob(resource: &str) -> Result<Blob> {
    let resp = fetch_response(resource).await?;
    let blob = resp
        .blob()
        .map_err(|err| anyhow!("Could not get blob from response [{:#?}]", err))?;

    let blob_value = JsFuture::from(blob)
        .await
        .map_err(|err| anyhow!("error reading body of [{}] : {:#?}", resource, err))?;

    blob_value
        .dyn_into::<Blob>()
        .map_err(|element| anyhow!("error converting [{:#?}] to Blob", element))
}

async fn fetch_response(resource: &str) -> Result<Response> {
    let resp_value = fetch_with_str(resource).await?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|element| anyhow!("error converting [{:#?}] to Response", element))?;

    if !resp.ok() {
        return Err(anyhow!(
            "request for [{}] answered with status {}",
            resource,
            resp.status()
        ));
    }

    Ok(resp)
}

async fn fetch_with_str(resource: &str) -> Result<JsValue> {
    let resp = window()?.fetch_with_str(resource);

    JsFuture::from(resp)
        .await
        .map_err(|err| anyhow!("error fetching : {:#?}", err))
}
