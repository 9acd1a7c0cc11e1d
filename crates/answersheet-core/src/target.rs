//! Identifier derivation and output path for a `save-pdf` entry.

use std::path::{Path, PathBuf};
use thiserror::Error;

const PDF_EXTENSION: &str = ".pdf";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("cannot derive an identifier from {0:?} (no directory and no digits in file name)")]
    EmptyIdentifier(String),
}

/// Where one entry's PDF lands: `<output_dir>/<identifier>.pdf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub identifier: String,
    pub output_path: PathBuf,
}

impl DownloadTarget {
    /// Builds the target for `relative_path`; fails if no identifier can be derived.
    pub fn new(output_dir: &Path, relative_path: &str) -> Result<Self, TargetError> {
        let identifier = derive_identifier(relative_path);
        if identifier.is_empty() {
            return Err(TargetError::EmptyIdentifier(relative_path.to_string()));
        }
        let output_path = output_dir.join(format!("{identifier}{PDF_EXTENSION}"));
        Ok(DownloadTarget {
            identifier,
            output_path,
        })
    }

    /// File name shown in progress output (`<identifier>.pdf`).
    pub fn file_name(&self) -> String {
        format!("{}{PDF_EXTENSION}", self.identifier)
    }
}

/// Derives the identifier from a relative path such as `924106840112/responses.pdf`.
///
/// Uses the first segment of the parent directory, ignoring leading `.`
/// segments. Without one, falls back to the digits of the file name (minus a
/// trailing `.pdf`), which may be empty.
pub fn derive_identifier(relative_path: &str) -> String {
    let (dir, file) = match relative_path.rfind(['/', '\\']) {
        Some(idx) => (&relative_path[..idx], &relative_path[idx + 1..]),
        None => ("", relative_path),
    };

    // `./` prefixes name the current directory, not a student.
    let first_segment = dir
        .split(['/', '\\'])
        .find(|segment| *segment != ".")
        .unwrap_or("");
    if !first_segment.is_empty() {
        return first_segment.to_string();
    }

    let stem = file.strip_suffix(PDF_EXTENSION).unwrap_or(file);
    stem.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Substring filter on identifiers (`--download-only`). An empty pattern matches everything.
#[derive(Debug, Clone, Default)]
pub struct IdentifierFilter(Option<String>);

impl IdentifierFilter {
    pub fn new(pattern: Option<String>) -> Self {
        IdentifierFilter(pattern.filter(|p| !p.is_empty()))
    }

    pub fn matches(&self, identifier: &str) -> bool {
        match &self.0 {
            Some(pattern) => identifier.contains(pattern.as_str()),
            None => true,
        }
    }
}
