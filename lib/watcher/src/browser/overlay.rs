//! The blocking modal.

use crate::config::WatcherConfig;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement};

const OVERLAY_ID: &str = "mfa-gate-overlay";

const OVERLAY_STYLE: &[(&str, &str)] = &[
    ("position", "fixed"),
    ("inset", "0"),
    ("z-index", "2147483647"),
    ("display", "flex"),
    ("align-items", "center"),
    ("justify-content", "center"),
    ("background", "rgba(20, 20, 30, 0.75)"),
    ("backdrop-filter", "blur(4px)"),
];

const PANEL_STYLE: &[(&str, &str)] = &[
    ("background", "#fff"),
    ("color", "#333"),
    ("max-width", "480px"),
    ("padding", "2.5rem"),
    ("border-radius", "12px"),
    ("box-shadow", "0 20px 60px rgba(0, 0, 0, 0.3)"),
    ("text-align", "center"),
    ("font-family", "-apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif"),
];

const BUTTON_STYLE: &[(&str, &str)] = &[
    ("display", "inline-block"),
    ("margin", "0.5rem"),
    ("padding", "0.75rem 1.5rem"),
    ("border-radius", "8px"),
    ("text-decoration", "none"),
    ("font-weight", "600"),
    ("cursor", "pointer"),
];

/// The overlay and the application root it covers.
pub(crate) struct Overlay {
    document: Document,
    root: HtmlElement,
    app_root: Option<Element>,
    _on_logout: Closure<dyn FnMut(web_sys::Event)>,
}

impl Overlay {
    /// Builds the overlay, detached.
    ///
    /// `on_logout` runs when the logout action is clicked.
    pub(crate) fn build(
        document: &Document,
        config: &WatcherConfig,
        on_logout: Closure<dyn FnMut(web_sys::Event)>,
    ) -> Result<Self, JsValue> {
        let root = html_element(document, "div")?;
        root.set_id(OVERLAY_ID);
        root.set_attribute("role", "dialog")?;
        root.set_attribute("aria-modal", "true")?;
        apply_style(&root, OVERLAY_STYLE)?;

        let panel = html_element(document, "div")?;
        apply_style(&panel, PANEL_STYLE)?;

        let title = html_element(document, "h2")?;
        title.set_text_content(Some("Two-factor authentication required"));

        let message = html_element(document, "p")?;
        message.set_text_content(Some(
            "Your organization requires two-factor authentication. Configure TOTP, \
             email one-time passcodes or a FIDO security key in your profile to continue.",
        ));

        let configure = html_element(document, "a")?;
        configure.set_attribute("href", &config.configuration_url)?;
        configure.set_text_content(Some("Configure two-factor authentication"));
        apply_style(&configure, BUTTON_STYLE)?;
        configure.style().set_property("background", "#667eea")?;
        configure.style().set_property("color", "#fff")?;

        let logout = html_element(document, "a")?;
        logout.set_attribute("href", &config.login_url)?;
        logout.set_text_content(Some("Log out"));
        apply_style(&logout, BUTTON_STYLE)?;
        logout.style().set_property("color", "#667eea")?;
        logout.add_event_listener_with_callback("click", on_logout.as_ref().unchecked_ref())?;

        panel.append_child(&title)?;
        panel.append_child(&message)?;
        panel.append_child(&configure)?;
        panel.append_child(&logout)?;
        root.append_child(&panel)?;

        let app_root = document
            .query_selector(&config.app_root_selector)
            .ok()
            .flatten();

        Ok(Self {
            document: document.clone(),
            root,
            app_root,
            _on_logout: on_logout,
        })
    }

    pub(crate) fn show(&self) -> Result<(), JsValue> {
        if let Some(app_root) = &self.app_root {
            app_root.set_attribute("inert", "")?;
            app_root.set_attribute("aria-hidden", "true")?;
            if let Some(element) = app_root.dyn_ref::<HtmlElement>() {
                element.style().set_property("filter", "blur(3px)")?;
                element.style().set_property("pointer-events", "none")?;
            }
        }
        if self.root.parent_node().is_none() {
            let body = self
                .document
                .body()
                .ok_or_else(|| JsValue::from_str("document has no body"))?;
            body.append_child(&self.root)?;
        }
        Ok(())
    }

    pub(crate) fn hide(&self) -> Result<(), JsValue> {
        if let Some(app_root) = &self.app_root {
            app_root.remove_attribute("inert")?;
            app_root.remove_attribute("aria-hidden")?;
            if let Some(element) = app_root.dyn_ref::<HtmlElement>() {
                element.style().remove_property("filter")?;
                element.style().remove_property("pointer-events")?;
            }
        }
        self.root.remove();
        Ok(())
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.root.parent_node().is_some()
    }
}

fn html_element(document: &Document, tag: &str) -> Result<HtmlElement, JsValue> {
    document.create_element(tag)?.dyn_into::<HtmlElement>().map_err(JsValue::from)
}

fn apply_style(element: &HtmlElement, style: &[(&str, &str)]) -> Result<(), JsValue> {
    let declaration = element.style();
    for (property, value) in style {
        declaration.set_property(property, value)?;
    }
    Ok(())
}
