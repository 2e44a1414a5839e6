//! Status and logout requests.

use crate::machine::PollOutcome;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{RequestCredentials, RequestInit, Response, Window};

/// Requests the "who am I" endpoint. Never fails; every error becomes
/// [`PollOutcome::Failed`].
pub(crate) async fn fetch_status(window: &Window, url: &str) -> PollOutcome {
    match request_status(window, url).await {
        Ok(outcome) => outcome,
        Err(err) => PollOutcome::Failed {
            reason: describe(&err),
        },
    }
}

async fn request_status(window: &Window, url: &str) -> Result<PollOutcome, JsValue> {
    let response = get(window, url).await?;

    match response.status() {
        401 | 403 => return Ok(PollOutcome::NotAuthenticated),
        status if !response.ok() => {
            return Ok(PollOutcome::Failed {
                reason: format!("status {status}"),
            });
        }
        _ => {}
    }

    let body = JsFuture::from(response.text()?)
        .await?
        .as_string()
        .unwrap_or_default();
    Ok(PollOutcome::from_body(&body))
}

/// Ends the upstream session. Errors are ignored; the caller navigates away
/// either way.
pub(crate) async fn logout(window: &Window, url: &str) {
    if let Err(err) = get(window, url).await {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "mfa-gate: logout request failed: {}",
            describe(&err)
        )));
    }
}

async fn get(window: &Window, url: &str) -> Result<Response, JsValue> {
    let init = RequestInit::new();
    init.set_method("GET");
    init.set_credentials(RequestCredentials::SameOrigin);

    JsFuture::from(window.fetch_with_str_and_init(url, &init))
        .await?
        .dyn_into::<Response>()
}

pub(crate) fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::JSON::stringify(err)
                .ok()
                .and_then(|s| s.as_string())
        })
        .unwrap_or_else(|| "unknown error".to_string())
}
