//! Stand-in renderer that records calls instead of driving a browser.

use answersheet_core::fetch::{FetchError, PdfRenderer};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCall {
    pub url: String,
    pub output_path: PathBuf,
    pub cookie_header: String,
}

/// Writes `body` to the output path for every call, or fails for URLs containing `fail_on`.
pub struct RecordingRenderer {
    pub body: Vec<u8>,
    pub fail_on: Option<String>,
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn new(body: &[u8]) -> Self {
        RecordingRenderer {
            body: body.to_vec(),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(body: &[u8], pattern: &str) -> Self {
        RecordingRenderer {
            fail_on: Some(pattern.to_string()),
            ..Self::new(body)
        }
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfRenderer for RecordingRenderer {
    async fn render_pdf(
        &self,
        url: &str,
        output_path: &Path,
        cookie_header: &str,
    ) -> Result<(), FetchError> {
        self.calls.lock().unwrap().push(RenderCall {
            url: url.to_string(),
            output_path: output_path.to_path_buf(),
            cookie_header: cookie_header.to_string(),
        });
        if self.fail_on.as_deref().is_some_and(|p| url.contains(p)) {
            return Err(FetchError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: 300,
            });
        }
        std::fs::write(output_path, &self.body).map_err(|source| FetchError::Io {
            path: output_path.to_path_buf(),
            source,
        })
    }
}
