//! Output file lifecycle: render into `<name>.part`, then rename into place.

use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `999.pdf` → `999.pdf.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Writes `data` to `final_path` via a synced temp file and a rename, so readers
/// never see a partially written file. The temp file is removed on failure.
pub async fn write_atomically(final_path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = temp_path(final_path);
    let result = write_and_rename(&tmp, final_path, data).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

async fn write_and_rename(tmp: &Path, final_path: &Path, data: &[u8]) -> io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, final_path).await
}

/// Deletes an output file ahead of a redownload.
pub async fn remove_output(path: &Path) -> io::Result<()> {
    tokio::fs::remove_file(path).await.map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("failed to remove {}: {}", path.display(), e),
        )
    })
}
