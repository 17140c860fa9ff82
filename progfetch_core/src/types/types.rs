use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the bytes handed out by a fetcher came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Local,
    Remote,
}

/// A URL plus everything needed to issue the request for it.
///
/// The normalized URL (see [`FetchRequest::key`]) doubles as the progress key,
/// so a caller that wants progress for this request registers its listener
/// under that same string before the fetch starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HashMap<String, Vec<String>>,
    pub cookies: Option<String>,
    pub authentication: Option<AuthenticationInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationInfo {
    pub username: String,
    pub password: String,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn add_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.entry(key.into()).or_default().push(value.into());
        self
    }

    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    pub fn with_authentication(mut self, auth: AuthenticationInfo) -> Self {
        self.authentication = Some(auth);
        self
    }

    /// The request URL in normalized form, e.g. `http://Example.com` becomes
    /// `http://example.com/`. Used as the progress key for this request.
    pub fn key(&self) -> Result<String, FetchError> {
        request_key(&self.url)
    }
}

/// Normalizes `url` into the string used as a progress key.
pub fn request_key(url: &str) -> Result<String, FetchError> {
    reqwest::Url::parse(url)
        .map(|u| u.to_string())
        .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
