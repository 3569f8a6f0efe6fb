//! Normalized authority call outcomes and wire-envelope classification.
//!
//! The upstream service answers with a `{"success": …, "data": {…}}` wrapper
//! and is known to embed errors inside a `200 OK` body (`data.errors` plus
//! `data.error_data`). Everything the client receives is folded into
//! [`AuthorityOutcome`] here; unrecognized error codes degrade to
//! `Unreachable` so the caller keeps its prior state instead of acting on a
//! guessed rejection.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::mask::mask_token;

/// Why the authority rejected a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The license key is unknown or malformed.
    InvalidKey,
    /// The license has been revoked or disabled by the vendor.
    Revoked,
    /// The license is past its expiry date.
    Expired,
    /// The supplied activation token does not match any activation.
    TokenMismatch,
    /// All activation slots are in use.
    Exhausted,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidKey => "invalid_key",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::TokenMismatch => "token_mismatch",
            Self::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// The normalized result of one authority call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityOutcome {
    /// The authority accepted the call.
    Success {
        /// Activation slots still free on the key, when reported.
        remaining_activations: Option<u32>,
        /// Activation token for this installation, when reported.
        token: Option<String>,
        /// License expiry reported by the authority.
        expires_at: Option<DateTime<Utc>>,
    },
    /// The authority answered and said no. Authoritative; callers apply it.
    Rejected {
        kind: RejectionKind,
        message: String,
    },
    /// Transport failure, timeout, or an unclassifiable response. Callers
    /// preserve their prior state.
    Unreachable {
        message: String,
    },
}

impl AuthorityOutcome {
    /// Classifies a raw HTTP response into an outcome.
    ///
    /// `now` is used to normalize a `Success` whose reported expiry is
    /// already in the past into `Rejected { kind: Expired }`.
    #[must_use]
    pub fn from_wire(status: u16, body: &str, now: DateTime<Utc>) -> Self {
        if status >= 400 {
            return classify_http_error(status, body);
        }

        let parsed: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                warn!(status, "authority returned non-JSON body: {e}");
                return Self::Unreachable {
                    message: format!("invalid JSON response: {e}"),
                };
            }
        };

        // Some validate endpoints skip the wrapper; fall back to the body.
        let data_value = match &parsed {
            Value::Object(map) if map.contains_key("data") => map["data"].clone(),
            _ => parsed.clone(),
        };

        let data: WireData = match serde_json::from_value(data_value) {
            Ok(d) => d,
            Err(e) => {
                warn!(status, "unrecognized authority response shape: {e}");
                return Self::Unreachable {
                    message: format!("unrecognized response shape: {e}"),
                };
            }
        };

        if data.errors.is_some() || data.error_data.is_some() {
            return classify_embedded_error(&data);
        }

        let expires_at = data.expires_at.as_deref().and_then(parse_wire_datetime);
        if let Some(exp) = expires_at {
            if exp <= now {
                return Self::Rejected {
                    kind: RejectionKind::Expired,
                    message: format!("license expired on {} (UTC)", exp.format("%Y-%m-%d %H:%M:%S")),
                };
            }
        }

        let remaining_activations = data
            .times_activated_max
            .map(|max| max.saturating_sub(data.times_activated.unwrap_or(0)));
        let token = data.token.clone().or_else(|| latest_token(&data));
        debug!(
            remaining = ?remaining_activations,
            token = %mask_token(token.as_deref()),
            "authority call succeeded"
        );

        Self::Success {
            remaining_activations,
            token,
            expires_at,
        }
    }

    /// Returns true for the `Unreachable` variant.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireData {
    errors: Option<serde_json::Map<String, Value>>,
    error_data: Option<serde_json::Map<String, Value>>,
    #[serde(rename = "expiresAt")]
    expires_at: Option<String>,
    #[serde(rename = "timesActivated")]
    times_activated: Option<u32>,
    #[serde(rename = "timesActivatedMax")]
    times_activated_max: Option<u32>,
    #[serde(rename = "activationData")]
    activation_data: Option<ActivationData>,
    token: Option<String>,
}

/// Activation payloads carry either a single object or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActivationData {
    One(ActivationEntry),
    Many(Vec<ActivationEntry>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActivationEntry {
    token: Option<String>,
    deactivated_at: Option<String>,
    updated_at: Option<String>,
    created_at: Option<String>,
}

/// HTTP-level errors carry a WP-style `{code, message}` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn classify_http_error(status: u16, body: &str) -> AuthorityOutcome {
    let parsed: HttpErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| format!("HTTP {status}"));

    match classify_code(&code, &message) {
        Some(kind) => AuthorityOutcome::Rejected { kind, message },
        None => {
            warn!(status, code = %code, "unclassifiable authority HTTP error");
            AuthorityOutcome::Unreachable {
                message: format!("HTTP {status}: {message}"),
            }
        }
    }
}

fn classify_embedded_error(data: &WireData) -> AuthorityOutcome {
    let empty = serde_json::Map::new();
    let errors = data.errors.as_ref().unwrap_or(&empty);
    let code = errors.keys().next().cloned().unwrap_or_default();
    let message = errors
        .get(&code)
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(Value::as_str)
        .unwrap_or("operation failed")
        .to_string();

    match classify_code(&code, &message) {
        Some(kind) => AuthorityOutcome::Rejected { kind, message },
        None => {
            warn!(code = %code, "unknown embedded error code from authority");
            AuthorityOutcome::Unreachable {
                message: format!("unclassified authority error ({code}): {message}"),
            }
        }
    }
}

/// Maps a wire error code (plus its message, as a fallback signal) onto the
/// closed rejection-kind enum. `None` means the code is unknown and the
/// caller must not apply a state change.
fn classify_code(code: &str, message: &str) -> Option<RejectionKind> {
    let code = code.to_ascii_lowercase();
    let message = message.to_ascii_lowercase();

    if code.contains("expired") || message.contains("expired") {
        Some(RejectionKind::Expired)
    } else if code.contains("disabled") || code.contains("revoked") || message.contains("revoked") {
        Some(RejectionKind::Revoked)
    } else if code.contains("activation_limit")
        || message.contains("activation limit")
        || message.contains("maximum activation")
    {
        Some(RejectionKind::Exhausted)
    } else if code.contains("token") || message.contains("token") {
        Some(RejectionKind::TokenMismatch)
    } else if code.contains("not_found")
        || code.contains("invalid")
        || message.contains("not found")
        || message.contains("invalid")
    {
        Some(RejectionKind::InvalidKey)
    } else {
        None
    }
}

/// Picks the freshest non-deactivated activation token from the payload.
fn latest_token(data: &WireData) -> Option<String> {
    let entries: Vec<&ActivationEntry> = match data.activation_data.as_ref()? {
        ActivationData::One(entry) => vec![entry],
        ActivationData::Many(list) => list.iter().collect(),
    };

    let score = |e: &ActivationEntry| {
        let active = i64::from(e.deactivated_at.is_none());
        let ts = e
            .updated_at
            .as_deref()
            .and_then(parse_wire_datetime)
            .or_else(|| e.created_at.as_deref().and_then(parse_wire_datetime))
            .map_or(0, |t| t.timestamp());
        (active, ts)
    };

    entries
        .into_iter()
        .filter(|e| e.token.as_deref().is_some_and(|t| !t.trim().is_empty()))
        .max_by_key(|e| score(e))
        .and_then(|e| e.token.as_deref().map(|t| t.trim().to_string()))
}

/// Parses the authority's datetime formats: RFC 3339 first, then the naive
/// `YYYY-MM-DD HH:MM:SS` (and bare-date) forms the service prefers.
pub(crate) fn parse_wire_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(t.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
