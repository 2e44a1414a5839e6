//! The "who am I" payload served by the wrapped application.
//!
//! The endpoint answers either with the user object directly or with an
//! envelope of the form `{ "authenticated": true, "user": { ... } }`.
//! Flags that are absent or `null` count as not configured.

use crate::principal::{Identity, MfaFlags, Principal};
use rootcause::prelude::Report;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Errors from decoding a "who am I" payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhoAmIError {
    /// The body is not valid JSON or has the wrong shape.
    Malformed { reason: String },
    /// The user object carries neither an email nor an id.
    MissingIdentity,
}

impl fmt::Display for WhoAmIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed who-am-i payload: {reason}"),
            Self::MissingIdentity => write!(f, "who-am-i payload has no email or id"),
        }
    }
}

impl std::error::Error for WhoAmIError {}

#[derive(Debug, Deserialize)]
struct UserObject {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    totp_enabled: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    email_otp_enabled: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    fido_enabled: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Decoded answer of the "who am I" endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhoAmI {
    /// The session belongs to this principal.
    Authenticated(Principal),
    /// The endpoint answered but reported no authenticated session.
    Anonymous,
}

impl WhoAmI {
    /// Decodes a response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not JSON, is not an object, or names
    /// no identity.
    pub fn from_json(body: &str) -> Result<Self, Report<WhoAmIError>> {
        let value: Value = serde_json::from_str(body).map_err(|e| WhoAmIError::Malformed {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Decodes an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// See [`WhoAmI::from_json`].
    pub fn from_value(mut value: Value) -> Result<Self, Report<WhoAmIError>> {
        let Some(object) = value.as_object_mut() else {
            return Err(WhoAmIError::Malformed {
                reason: "expected a JSON object".to_string(),
            }
            .into());
        };

        if object.get("authenticated").and_then(Value::as_bool) == Some(false) {
            return Ok(Self::Anonymous);
        }

        let user = match object.remove("user") {
            Some(Value::Null) => return Ok(Self::Anonymous),
            Some(user) => user,
            None => value,
        };

        let user: UserObject = serde_json::from_value(user).map_err(|e| WhoAmIError::Malformed {
            reason: e.to_string(),
        })?;

        let identity = match (user.email, user.id) {
            (Some(email), _) if !email.trim().is_empty() => email,
            (_, Some(Value::String(id))) if !id.is_empty() => id,
            (_, Some(Value::Number(id))) => id.to_string(),
            _ => return Err(WhoAmIError::MissingIdentity.into()),
        };

        let flags = MfaFlags {
            totp_enabled: user.totp_enabled,
            email_otp_enabled: user.email_otp_enabled,
            fido_enabled: user.fido_enabled,
        };

        Ok(Self::Authenticated(Principal::new(
            Identity::new(identity),
            flags,
        )))
    }

    /// Returns the principal, if authenticated.
    #[must_use]
    pub fn into_principal(self) -> Option<Principal> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            Self::Anonymous => None,
        }
    }
}
