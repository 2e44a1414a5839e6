//! Browser runtime for the watcher.
//!
//! Executes the [`Effect`]s of a [`Watcher`] with `fetch`, timers and the
//! DOM, and feeds navigation back in as [`Event::Navigated`]. Exported to
//! the host page as `startWatcher(configJson?)`.

mod fetch;
mod overlay;

use crate::config::WatcherConfig;
use crate::location::Location;
use crate::machine::{Effect, Event, Watcher};
use gloo_timers::future::TimeoutFuture;
use overlay::Overlay;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{EventTarget, KeyboardEvent, MutationObserver, MutationObserverInit, Window};

type Listener = Closure<dyn FnMut(web_sys::Event)>;
type ObserverCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

struct Registration {
    target: EventTarget,
    kind: &'static str,
    capture: bool,
    callback: Listener,
}

struct Runtime {
    window: Window,
    config: WatcherConfig,
    watcher: RefCell<Watcher>,
    overlay: RefCell<Option<Overlay>>,
    listeners: RefCell<Vec<Registration>>,
    observer: RefCell<Option<(MutationObserver, ObserverCallback)>>,
    stopped: Cell<bool>,
}

/// Handle returned to the host page.
#[wasm_bindgen]
pub struct WatcherHandle {
    runtime: Rc<Runtime>,
}

#[wasm_bindgen]
impl WatcherHandle {
    /// Removes listeners, hides the modal and stops reacting to responses
    /// still in flight.
    pub fn stop(&self) {
        stop(&self.runtime);
    }

    /// Whether the blocking modal is currently requested.
    #[wasm_bindgen(getter, js_name = modalVisible)]
    pub fn modal_visible(&self) -> bool {
        self.runtime.watcher.borrow().modal_visible()
    }
}

/// Starts watching the current page.
///
/// `config_json` is an optional JSON object with [`WatcherConfig`] fields;
/// omitted fields keep their defaults.
#[wasm_bindgen(js_name = startWatcher)]
pub fn start_watcher(config_json: Option<String>) -> Result<WatcherHandle, JsValue> {
    console_error_panic_hook::set_once();

    let config = match config_json.as_deref().map(str::trim) {
        Some(json) if !json.is_empty() => serde_json::from_str::<WatcherConfig>(json)
            .map_err(|err| JsValue::from_str(&format!("invalid watcher config: {err}")))?,
        _ => WatcherConfig::default(),
    };
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let watcher = Watcher::new(&config, current_location(&window));

    let runtime = Rc::new(Runtime {
        window,
        config,
        watcher: RefCell::new(watcher),
        overlay: RefCell::new(None),
        listeners: RefCell::new(Vec::new()),
        observer: RefCell::new(None),
        stopped: Cell::new(false),
    });

    install_listeners(&runtime)?;
    install_observer(&runtime)?;

    let effects = runtime.watcher.borrow_mut().start();
    apply(&runtime, effects);

    Ok(WatcherHandle { runtime })
}

fn current_location(window: &Window) -> Location {
    let location = window.location();
    Location::new(
        location.pathname().unwrap_or_default(),
        location.hash().unwrap_or_default(),
    )
}

fn dispatch(runtime: &Rc<Runtime>, event: Event) {
    if runtime.stopped.get() {
        return;
    }
    let effects = runtime.watcher.borrow_mut().handle(event);
    apply(runtime, effects);
}

fn apply(runtime: &Rc<Runtime>, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::FetchStatus => {
                let runtime = Rc::clone(runtime);
                spawn_local(async move {
                    let outcome =
                        fetch::fetch_status(&runtime.window, &runtime.config.whoami_url).await;
                    dispatch(&runtime, Event::StatusReceived(outcome));
                });
            }
            Effect::Wait(delay) => {
                let runtime = Rc::clone(runtime);
                let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
                spawn_local(async move {
                    TimeoutFuture::new(millis).await;
                    dispatch(&runtime, Event::RetryElapsed);
                });
            }
            Effect::ShowModal => {
                if let Err(err) = show_modal(runtime) {
                    warn("could not show modal", &err);
                }
            }
            Effect::HideModal => {
                if let Some(overlay) = runtime.overlay.borrow().as_ref() {
                    if let Err(err) = overlay.hide() {
                        warn("could not hide modal", &err);
                    }
                }
            }
        }
    }
}

fn show_modal(runtime: &Rc<Runtime>) -> Result<(), JsValue> {
    let mut slot = runtime.overlay.borrow_mut();
    if slot.is_none() {
        let document = runtime
            .window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        *slot = Some(Overlay::build(
            &document,
            &runtime.config,
            logout_callback(Rc::downgrade(runtime)),
        )?);
    }
    match slot.as_ref() {
        Some(overlay) => overlay.show(),
        None => Ok(()),
    }
}

fn logout_callback(runtime: Weak<Runtime>) -> Listener {
    Closure::new(move |event: web_sys::Event| {
        event.prevent_default();
        let Some(runtime) = runtime.upgrade() else {
            return;
        };
        spawn_local(async move {
            fetch::logout(&runtime.window, &runtime.config.logout_url).await;
            if let Err(err) = runtime.window.location().assign(&runtime.config.login_url) {
                warn("could not navigate to login", &err);
            }
        });
    })
}

fn install_listeners(runtime: &Rc<Runtime>) -> Result<(), JsValue> {
    let target: &EventTarget = runtime.window.as_ref();

    for kind in ["hashchange", "popstate"] {
        let weak = Rc::downgrade(runtime);
        let callback = Listener::new(move |_event: web_sys::Event| {
            if let Some(runtime) = weak.upgrade() {
                let location = current_location(&runtime.window);
                dispatch(&runtime, Event::Navigated(location));
            }
        });
        register(runtime, target, kind, false, callback)?;
    }

    let weak = Rc::downgrade(runtime);
    let escape = Listener::new(move |event: web_sys::Event| {
        let Some(runtime) = weak.upgrade() else {
            return;
        };
        let is_escape = event
            .dyn_ref::<KeyboardEvent>()
            .is_some_and(|key| key.key() == "Escape");
        if is_escape && runtime.watcher.borrow().modal_visible() {
            event.prevent_default();
            event.stop_immediate_propagation();
        }
    });
    register(runtime, target, "keydown", true, escape)
}

fn register(
    runtime: &Runtime,
    target: &EventTarget,
    kind: &'static str,
    capture: bool,
    callback: Listener,
) -> Result<(), JsValue> {
    target.add_event_listener_with_callback_and_bool(
        kind,
        callback.as_ref().unchecked_ref(),
        capture,
    )?;
    runtime.listeners.borrow_mut().push(Registration {
        target: target.clone(),
        kind,
        capture,
        callback,
    });
    Ok(())
}

/// Client-side routers change the URL with `pushState`, which fires no
/// event; DOM mutations are the signal that a route may have changed. The
/// same hook puts the overlay back if the application removed it.
fn install_observer(runtime: &Rc<Runtime>) -> Result<(), JsValue> {
    let Some(body) = runtime.window.document().and_then(|document| document.body()) else {
        return Ok(());
    };

    let weak = Rc::downgrade(runtime);
    let callback = ObserverCallback::new(move |_records: js_sys::Array, _observer: MutationObserver| {
        let Some(runtime) = weak.upgrade() else {
            return;
        };
        let location = current_location(&runtime.window);
        dispatch(&runtime, Event::Navigated(location));

        let detached = runtime.watcher.borrow().modal_visible()
            && runtime
                .overlay
                .borrow()
                .as_ref()
                .is_some_and(|overlay| !overlay.is_attached());
        if detached && !runtime.stopped.get() {
            if let Err(err) = show_modal(&runtime) {
                warn("could not restore modal", &err);
            }
        }
    });

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    observer.observe_with_options(&body, &options)?;

    *runtime.observer.borrow_mut() = Some((observer, callback));
    Ok(())
}

fn stop(runtime: &Runtime) {
    if runtime.stopped.replace(true) {
        return;
    }

    for registration in runtime.listeners.borrow_mut().drain(..) {
        let _ = registration
            .target
            .remove_event_listener_with_callback_and_bool(
                registration.kind,
                registration.callback.as_ref().unchecked_ref(),
                registration.capture,
            );
    }
    if let Some((observer, _callback)) = runtime.observer.borrow_mut().take() {
        observer.disconnect();
    }
    if let Some(overlay) = runtime.overlay.borrow_mut().take() {
        if let Err(err) = overlay.hide() {
            warn("could not hide modal", &err);
        }
    }
}

fn warn(context: &str, err: &JsValue) {
    web_sys::console::warn_1(&JsValue::from_str(&format!(
        "mfa-gate: {context}: {}",
        fetch::describe(err)
    )));
}
