//! User-facing report for a fatal graphics initialization failure.
//!
//! On the web this is a dismissable full-width banner pinned to the top of the
//! page. Natively the same text goes to the log and stderr.

use crate::context::InitError;

pub const BANNER_ID: &str = "graphics-error-banner";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub title: String,
    pub message: String,
    pub remedies: Vec<String>,
    pub detail: String,
}

impl Banner {
    pub fn graphics_unavailable(error: &InitError) -> Self {
        Self {
            title: "Graphics Error".to_string(),
            message: "Your browser or device could not start hardware-accelerated graphics, \
                      so the 3D view cannot be shown."
                .to_string(),
            remedies: vec![
                "Update your browser to the latest version".to_string(),
                "Make sure WebGL / hardware acceleration is enabled".to_string(),
                "Restart your browser".to_string(),
                "Try a different device".to_string(),
            ],
            detail: error.to_string(),
        }
    }

    pub fn to_text(&self) -> String {
        let mut text = format!("{}: {}\n", self.title, self.message);
        for remedy in &self.remedies {
            text.push_str(&format!("  - {remedy}\n"));
        }
        text.push_str(&format!("({})", self.detail));
        text
    }
}

/// Somewhere a fatal [`Banner`] can be shown.
pub trait ErrorReporter {
    fn report(&mut self, banner: &Banner);
}

#[derive(Debug, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&mut self, banner: &Banner) {
        let text = banner.to_text();
        log::error!("{text}");
        #[cfg(not(target_arch = "wasm32"))]
        eprintln!("{text}");
    }
}

/// Injects the banner into the page, replacing an older one if present.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct DomReporter;

#[cfg(target_arch = "wasm32")]
impl DomReporter {
    const STYLE: &'static str = "position:fixed;top:0;left:0;right:0;width:100%;\
        box-sizing:border-box;z-index:10000;padding:16px 48px 16px 16px;\
        background:#b3261e;color:#fff;font-family:sans-serif;font-size:14px;";
    const CLOSE_STYLE: &'static str = "position:absolute;top:8px;right:12px;\
        background:none;border:none;color:#fff;font-size:20px;cursor:pointer;";

    fn inject(banner: &Banner) -> Result<(), wasm_bindgen::JsValue> {
        use wasm_bindgen::{JsCast, JsValue, closure::Closure};

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        if let Some(existing) = document.get_element_by_id(BANNER_ID) {
            existing.remove();
        }
        let element = document.create_element("div")?;
        element.set_id(BANNER_ID);
        element.set_attribute("role", "alert")?;
        element.set_attribute("style", Self::STYLE)?;

        let text = |tag: &str, content: &str| -> Result<web_sys::Element, JsValue> {
            let child = document.create_element(tag)?;
            child.set_text_content(Some(content));
            Ok(child)
        };
        element.append_child(&text("strong", &banner.title)?)?;
        element.append_child(&text("p", &banner.message)?)?;
        let list = document.create_element("ul")?;
        for remedy in &banner.remedies {
            list.append_child(&text("li", remedy)?)?;
        }
        element.append_child(&list)?;
        element.append_child(&text("small", &banner.detail)?)?;

        let close = text("button", "\u{00d7}")?;
        close.set_attribute("type", "button")?;
        close.set_attribute("aria-label", "Close")?;
        close.set_attribute("style", Self::CLOSE_STYLE)?;
        let target = element.clone();
        let on_close = Closure::<dyn FnMut()>::new(move || target.remove());
        close.add_event_listener_with_callback("click", on_close.as_ref().unchecked_ref())?;
        on_close.forget();
        element.append_child(&close)?;

        let body = document
            .body()
            .ok_or_else(|| JsValue::from_str("no body"))?;
        body.append_child(&element)?;
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
impl ErrorReporter for DomReporter {
    fn report(&mut self, banner: &Banner) {
        log::error!("{}", banner.to_text());
        if let Err(e) = Self::inject(banner) {
            log::error!("Could not show the error banner: {e:?}");
        }
    }
}
