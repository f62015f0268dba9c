//! Request outcomes and their status classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::DiffInfo;

/// HTTP method used for a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Head => write!(f, "HEAD"),
        }
    }
}

/// Outcome of a single poll of a monitored resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResult {
    pub timestamp: DateTime<Utc>,
    pub method: Method,
    /// Response status code, absent on transport failure
    pub status_code: Option<u16>,
    /// Cached content confirmed current (ETag match or 304), no body sent
    #[serde(default)]
    pub revalidated: bool,
    /// Response body size, or the advertised Content-Length for HEAD
    pub byte_size: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// Small allowlisted selection of response headers, see [`select_headers`]
    pub headers: Vec<(String, String)>,
    pub diff: Option<DiffInfo>,
}

impl RequestResult {
    /// Result for a request that failed before producing a response
    pub fn transfer_error(method: Method, error: String, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            method,
            status_code: None,
            revalidated: false,
            byte_size: 0,
            duration_ms,
            error: Some(error),
            headers: Vec::new(),
            diff: None,
        }
    }

    /// Classify this result; derived on demand, never stored
    ///
    /// A revalidated result is a success no matter which status code the
    /// response carried; the raw code stays available for display and for
    /// exact-code notification rules.
    pub fn status(&self) -> Status {
        if self.revalidated {
            return Status::Success { changed: false };
        }
        match self.status_code {
            Some(code) => match code {
                100..=199 => Status::Informational,
                200..=299 => Status::Success {
                    changed: self.diff.is_some(),
                },
                300..=399 => Status::Redirection,
                400..=499 => Status::ClientError,
                _ => Status::ServerError,
            },
            None if self.error.is_some() => Status::TransferError,
            None => Status::None,
        }
    }
}

/// Classified outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Informational,
    Success { changed: bool },
    Redirection,
    ClientError,
    ServerError,
    TransferError,
    None,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Informational => write!(f, "informational"),
            Status::Success { changed: false } => write!(f, "success"),
            Status::Success { changed: true } => write!(f, "success (changed)"),
            Status::Redirection => write!(f, "redirection"),
            Status::ClientError => write!(f, "client error"),
            Status::ServerError => write!(f, "server error"),
            Status::TransferError => write!(f, "transfer error"),
            Status::None => write!(f, "no status"),
        }
    }
}

/// Reduce a full response header list to the few worth keeping
///
/// Redirect bookkeeping wins: when `Location` or `Refresh` is present only
/// those are kept. Otherwise `Content-Type` and `Last-Modified` are kept.
/// Input names are expected lower-cased; output names are canonical.
pub fn select_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    let pick = |wanted: &[(&str, &str)]| -> Vec<(String, String)> {
        wanted
            .iter()
            .filter_map(|(lower, canonical)| {
                headers
                    .iter()
                    .find(|(name, _)| name == lower)
                    .map(|(_, value)| (canonical.to_string(), value.clone()))
            })
            .collect()
    };

    let redirect = pick(&[("location", "Location"), ("refresh", "Refresh")]);
    if !redirect.is_empty() {
        redirect
    } else {
        pick(&[
            ("content-type", "Content-Type"),
            ("last-modified", "Last-Modified"),
        ])
    }
}
