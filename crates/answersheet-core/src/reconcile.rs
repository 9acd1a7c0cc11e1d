//! Skip / redownload / fetch decision for an output file.

use std::io;
use std::path::Path;

/// What is on disk at an output path right before deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub exists: bool,
    pub size_bytes: u64,
}

impl FileState {
    pub const MISSING: FileState = FileState {
        exists: false,
        size_bytes: 0,
    };

    /// Stats `path`. A missing file is not an error; any other stat failure is.
    pub async fn inspect(path: &Path) -> io::Result<FileState> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(FileState {
                exists: true,
                size_bytes: meta.len(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FileState::MISSING),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep the existing file.
    Skip,
    /// Existing file is below the size threshold: delete it, then fetch.
    Redownload,
    /// Nothing on disk yet.
    Fetch,
}

impl Decision {
    pub fn needs_fetch(self) -> bool {
        !matches!(self, Decision::Skip)
    }
}

/// Decides what to do with an output file given an optional minimum size.
pub fn decide(state: FileState, min_size_bytes: Option<u64>) -> Decision {
    if !state.exists {
        return Decision::Fetch;
    }
    match min_size_bytes {
        Some(min) if state.size_bytes < min => Decision::Redownload,
        _ => Decision::Skip,
    }
}
