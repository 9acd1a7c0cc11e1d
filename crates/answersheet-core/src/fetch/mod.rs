//! Fetch driver: cookie installation, navigation and PDF rendering.
//!
//! The run driver only depends on [`PdfRenderer`]; [`ChromeRenderer`] is the
//! headless Chromium implementation used by the CLI.

mod chrome;
mod idle;

pub use chrome::ChromeRenderer;

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("navigation to {url} did not settle within {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("url {0:?} has no host to scope cookies to")]
    NoHost(String),
    #[error("invalid cookie: {0}")]
    Cookie(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("browser: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    #[error("write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// One `name=value` entry of a cookie header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePair {
    pub name: String,
    pub value: String,
}

/// Splits `"a=1; b=2"` into pairs. Each entry is split on its first `=`; empty
/// entries (e.g. a trailing `;`) are dropped.
pub fn split_cookie_header(header: &str) -> Vec<CookiePair> {
    header
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, value) = entry.split_once('=').unwrap_or((entry, ""));
            CookiePair {
                name: name.to_string(),
                value: value.to_string(),
            }
        })
        .collect()
}

/// Host the cookies of a request to `url` are scoped to.
pub fn cookie_domain(url: &str) -> Result<String, FetchError> {
    let parsed = url::Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| FetchError::NoHost(url.to_string()))
}

/// Renders a URL to a PDF file.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Installs `cookie_header` (if non-empty) for the URL's host, navigates to
    /// `url`, waits for the network to go idle and writes the page as an A4 PDF
    /// to `output_path`.
    async fn render_pdf(
        &self,
        url: &str,
        output_path: &Path,
        cookie_header: &str,
    ) -> Result<(), FetchError>;
}
