//! Principal lookup against the protected application.

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use mfa_gate_core::{Principal, WhoAmI};
use mfa_gate_policy::{IdentityLookupError, PrincipalResolver, RequestHead};
use rootcause::prelude::Report;
use tracing::{debug, instrument};

/// Resolves principals by calling the upstream "who am I" endpoint with the
/// inbound request's credentials.
///
/// The gate never reads the session store directly; whatever the upstream
/// reports for these credentials is the principal.
#[derive(Debug, Clone)]
pub struct HttpPrincipalResolver {
    client: reqwest::Client,
    whoami_url: reqwest::Url,
}

impl HttpPrincipalResolver {
    pub fn new(client: reqwest::Client, whoami_url: reqwest::Url) -> Self {
        Self { client, whoami_url }
    }
}

#[async_trait]
impl PrincipalResolver for HttpPrincipalResolver {
    #[instrument(skip_all, fields(url = %self.whoami_url))]
    async fn resolve(
        &self,
        request: &RequestHead,
    ) -> Result<Option<Principal>, Report<IdentityLookupError>> {
        let mut lookup = self.client.get(self.whoami_url.clone());
        for name in [header::COOKIE, header::AUTHORIZATION] {
            for value in request.headers().get_all(&name) {
                lookup = lookup.header(&name, value);
            }
        }

        let response = lookup
            .send()
            .await
            .map_err(|err| IdentityLookupError::Unreachable {
                details: err.to_string(),
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!(status = response.status().as_u16(), "upstream reports no session");
                return Ok(None);
            }
            status => {
                return Err(IdentityLookupError::UnexpectedStatus {
                    status: status.as_u16(),
                }
                .into());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|err| IdentityLookupError::Unreachable {
                details: err.to_string(),
            })?;

        let whoami = WhoAmI::from_json(&body).map_err(|report| {
            IdentityLookupError::InvalidPayload {
                details: report.to_string(),
            }
        })?;
        Ok(whoami.into_principal())
    }
}
