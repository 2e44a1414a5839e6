//! Forwarding of passed requests to the protected application.

use crate::error::ProxyError;
use crate::middleware::has_dot_segment;
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Headers that describe one connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// The protected application.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base: reqwest::Url,
    max_request_body_bytes: usize,
}

impl Upstream {
    /// `client` must not follow redirects; they are relayed to the browser.
    pub fn new(client: reqwest::Client, base: reqwest::Url, max_request_body_bytes: usize) -> Self {
        Self {
            client,
            base,
            max_request_body_bytes,
        }
    }

    /// Maps an inbound URI onto the upstream, keeping any base path.
    ///
    /// Paths with dot segments are refused so the upstream sees exactly the
    /// path the gate evaluated.
    pub fn target(&self, uri: &Uri) -> Result<reqwest::Url, Report<ProxyError>> {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        if has_dot_segment(uri.path()) {
            return Err(ProxyError::InvalidTarget {
                path: path_and_query.to_string(),
                details: "dot segments are not forwarded".to_string(),
            }
            .into());
        }
        let joined = format!(
            "{}{}",
            self.base.as_str().trim_end_matches('/'),
            path_and_query
        );
        Ok(
            reqwest::Url::parse(&joined).map_err(|err| ProxyError::InvalidTarget {
                path: path_and_query.to_string(),
                details: err.to_string(),
            })?,
        )
    }

    /// Sends the request upstream and relays the answer as is.
    #[instrument(skip_all, fields(method = %request.method(), path = request.uri().path()))]
    pub async fn send(&self, request: Request) -> Result<Response, Report<ProxyError>> {
        let (parts, body) = request.into_parts();
        let url = self.target(&parts.uri)?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if let Some(host) = headers.remove(header::HOST) {
            headers.insert(HeaderName::from_static("x-forwarded-host"), host);
        }

        let body = to_bytes(body, self.max_request_body_bytes)
            .await
            .map_err(|err| ProxyError::Upstream {
                details: format!("failed to read request body: {err}"),
            })?;

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|err| ProxyError::Upstream {
                details: err.to_string(),
            })?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Fallback handler that forwards everything to the upstream.
pub async fn forward(State(upstream): State<Arc<Upstream>>, request: Request) -> Response {
    match upstream.send(request).await {
        Ok(response) => response,
        Err(report) => {
            warn!(error = %report, "upstream unavailable");
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}

/// Removes hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
