//! Run driver: walks the instruction file in order and reconciles each entry.
//!
//! The only state carried between actions is [`RunState`]: the current cookie
//! header (replaced by each `cookies` action) and the running tallies. Every
//! entry is processed to completion before the next one starts, and the first
//! error aborts the run.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::fetch::{FetchError, PdfRenderer};
use crate::reconcile::{decide, Decision, FileState};
use crate::script::{decode_cookie_header, parse_script, Action, ScriptError};
use crate::size::{format_size, parse_size, SizeError};
use crate::storage;
use crate::target::{derive_identifier, DownloadTarget, IdentifierFilter, TargetError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("instruction file {} contains no instructions", .path.display())]
    EmptyScript { path: PathBuf },
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Size(#[from] SizeError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("{id}.pdf: {source}")]
    Fetch { id: String, source: FetchError },
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: io::Error,
    },
}

impl RunError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> RunError {
        let context = context.into();
        move |source| RunError::Io { context, source }
    }
}

/// Per-run switches (from the command line and config).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Only process identifiers containing this substring.
    pub filter: IdentifierFilter,
    /// Re-fetch existing files smaller than this many bytes.
    pub redownload_if_smaller: Option<u64>,
    /// Do all bookkeeping but never call the renderer.
    pub skip_pdfs: bool,
}

impl RunOptions {
    /// Builds options from raw flag values; `redownload_if_smaller` is a size such as `5MB`.
    pub fn from_flags(
        output_dir: impl Into<PathBuf>,
        download_only: Option<String>,
        redownload_if_smaller: Option<&str>,
        skip_pdfs: bool,
    ) -> Result<Self, RunError> {
        let redownload_if_smaller = redownload_if_smaller
            .filter(|s| !s.is_empty())
            .map(parse_size)
            .transpose()?;
        Ok(RunOptions {
            output_dir: output_dir.into(),
            filter: IdentifierFilter::new(download_only),
            redownload_if_smaller,
            skip_pdfs,
        })
    }
}

/// What one `save-pdf` entry ended up as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Filtered,
    Existing { size_bytes: u64 },
    Downloaded { size_bytes: u64, replaced: bool },
    /// `--skip-pdfs`: a fetch was due but not performed.
    FetchSkipped { decision: Decision },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: usize,
    pub redownloaded: usize,
    pub existing: usize,
    pub fetch_skipped: usize,
    pub filtered: usize,
    pub ignored: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Entries that passed the identifier filter.
    pub fn processed(&self) -> usize {
        self.downloaded + self.existing + self.fetch_skipped
    }

    fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Filtered => self.filtered += 1,
            EntryOutcome::Existing { .. } => self.existing += 1,
            EntryOutcome::Downloaded { replaced, .. } => {
                self.downloaded += 1;
                if *replaced {
                    self.redownloaded += 1;
                }
            }
            EntryOutcome::FetchSkipped { .. } => self.fetch_skipped += 1,
        }
    }
}

/// State threaded from one action to the next.
#[derive(Debug, Default)]
pub struct RunState {
    /// Decoded `Cookie` header from the latest `cookies` action ("" before any).
    pub cookie_header: String,
    pub summary: RunSummary,
}

/// Reads, parses and runs an instruction file.
pub async fn process_instruction_file<R: PdfRenderer + ?Sized>(
    path: &Path,
    options: &RunOptions,
    renderer: &R,
) -> Result<RunSummary, RunError> {
    let script = tokio::fs::read_to_string(path)
        .await
        .map_err(RunError::io(format!("read {}", path.display())))?;
    let actions = parse_script(&script);
    if actions.is_empty() {
        return Err(RunError::EmptyScript {
            path: path.to_path_buf(),
        });
    }
    tracing::info!(path = %path.display(), actions = actions.len(), "instruction file parsed");
    run_actions(&actions, options, renderer).await
}

/// Runs already-parsed actions in order.
pub async fn run_actions<R: PdfRenderer + ?Sized>(
    actions: &[Action],
    options: &RunOptions,
    renderer: &R,
) -> Result<RunSummary, RunError> {
    let start = Instant::now();
    tokio::fs::create_dir_all(&options.output_dir)
        .await
        .map_err(RunError::io(format!(
            "create output dir {}",
            options.output_dir.display()
        )))?;

    let mut state = RunState::default();
    for action in actions {
        state = apply(state, action, options, renderer).await?;
    }
    state.summary.elapsed = start.elapsed();
    Ok(state.summary)
}

/// Applies one action to the run state.
pub async fn apply<R: PdfRenderer + ?Sized>(
    mut state: RunState,
    action: &Action,
    options: &RunOptions,
    renderer: &R,
) -> Result<RunState, RunError> {
    match action {
        Action::Cookies { encoded } => {
            state.cookie_header = decode_cookie_header(encoded)?;
            tracing::debug!("cookie header replaced");
        }
        Action::SavePdf { url, relative_path } => {
            let outcome =
                save_pdf(url, relative_path, &state.cookie_header, options, renderer).await?;
            state.summary.record(&outcome);
        }
        Action::Other { kind } => {
            tracing::debug!(kind = %kind, "ignoring instruction");
            state.summary.ignored += 1;
        }
        Action::Malformed { .. } => action.check()?,
    }
    Ok(state)
}

async fn save_pdf<R: PdfRenderer + ?Sized>(
    url: &str,
    relative_path: &str,
    cookie_header: &str,
    options: &RunOptions,
    renderer: &R,
) -> Result<EntryOutcome, RunError> {
    if !options.filter.matches(&derive_identifier(relative_path)) {
        return Ok(EntryOutcome::Filtered);
    }
    let target = DownloadTarget::new(&options.output_dir, relative_path)?;
    let name = target.file_name();

    let state = stat(&target.output_path).await?;
    let decision = decide(state, options.redownload_if_smaller);
    tracing::debug!(id = %target.identifier, ?decision, size = state.size_bytes, "reconciled");

    match decision {
        Decision::Skip => {
            println!("exists       {} [{}]", name, format_size(state.size_bytes));
            return Ok(EntryOutcome::Existing {
                size_bytes: state.size_bytes,
            });
        }
        Decision::Redownload => {
            println!("redownload   {} (was {})", name, format_size(state.size_bytes));
            storage::remove_output(&target.output_path)
                .await
                .map_err(RunError::io(format!("redownload {name}")))?;
        }
        Decision::Fetch => {}
    }

    if options.skip_pdfs {
        println!("skipped      {} (--skip-pdfs)", name);
        return Ok(EntryOutcome::FetchSkipped { decision });
    }

    tracing::info!(id = %target.identifier, url, "fetching");
    renderer
        .render_pdf(url, &target.output_path, cookie_header)
        .await
        .map_err(|source| RunError::Fetch {
            id: target.identifier.clone(),
            source,
        })?;

    let size_bytes = stat(&target.output_path).await?.size_bytes;
    println!("downloaded   {} [{}]", name, format_size(size_bytes));
    Ok(EntryOutcome::Downloaded {
        size_bytes,
        replaced: decision == Decision::Redownload,
    })
}

async fn stat(path: &Path) -> Result<FileState, RunError> {
    FileState::inspect(path)
        .await
        .map_err(RunError::io(format!("stat {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_records_outcomes() {
        let mut s = RunSummary::default();
        s.record(&EntryOutcome::Filtered);
        s.record(&EntryOutcome::Existing { size_bytes: 1 });
        s.record(&EntryOutcome::Downloaded {
            size_bytes: 2,
            replaced: true,
        });
        s.record(&EntryOutcome::Downloaded {
            size_bytes: 2,
            replaced: false,
        });
        s.record(&EntryOutcome::FetchSkipped {
            decision: Decision::Fetch,
        });
        assert_eq!(s.filtered, 1);
        assert_eq!(s.existing, 1);
        assert_eq!(s.downloaded, 2);
        assert_eq!(s.redownloaded, 1);
        assert_eq!(s.fetch_skipped, 1);
        assert_eq!(s.processed(), 4);
    }

    #[test]
    fn options_from_flags_parse_threshold() {
        let opts = RunOptions::from_flags("out", Some("12".into()), Some("5MB"), true).unwrap();
        assert_eq!(opts.redownload_if_smaller, Some(5 * 1024 * 1024));
        assert!(opts.filter.matches("9912"));
        assert!(opts.skip_pdfs);

        let opts = RunOptions::from_flags("out", None, Some(""), false).unwrap();
        assert_eq!(opts.redownload_if_smaller, None);

        assert!(matches!(
            RunOptions::from_flags("out", None, Some("5 parsecs"), false),
            Err(RunError::Size(SizeError::InvalidFormat(_)))
        ));
    }

    #[test]
    fn empty_script_error_names_file() {
        let err = RunError::EmptyScript {
            path: PathBuf::from("sheets.txt"),
        };
        assert_eq!(
            err.to_string(),
            "instruction file sheets.txt contains no instructions"
        );
    }
}
