//! CLI for save-answersheets.

use anyhow::Result;
use answersheet_core::config::{self, AppConfig};
use answersheet_core::fetch::ChromeRenderer;
use answersheet_core::run::{self, RunOptions, RunSummary};
use answersheet_core::size::format_size;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

/// Save one answer-sheet PDF per student from an instruction file.
#[derive(Debug, Parser)]
#[command(name = "save-answersheets", version, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Instruction file with `cookies` and `save-pdf` lines.
    pub instruction_file: PathBuf,

    /// Only download identifiers containing this text (e.g. 924106840112).
    #[arg(long, value_name = "ID")]
    pub download_only: Option<String>,

    /// Re-download existing PDFs smaller than this size (e.g. 5MB).
    #[arg(long, value_name = "SIZE")]
    pub redownload_if_smaller: Option<String>,

    /// Do all bookkeeping but skip PDF downloads (debugging).
    #[arg(long)]
    pub skip_pdfs: bool,

    /// Directory for `<id>.pdf` files (overrides config; default `output`).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Chrome/Chromium/Edge executable (overrides config).
    #[arg(long, value_name = "PATH")]
    pub browser: Option<PathBuf>,

    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: (),
}

impl Cli {
    /// Parses process arguments. Help, version and usage errors all print and exit 0.
    pub fn parse_or_exit() -> Cli {
        match Cli::try_parse() {
            Ok(cli) => cli,
            Err(err) => {
                let _ = err.print();
                std::process::exit(0);
            }
        }
    }

    /// Config file values with command-line overrides applied.
    fn effective_config(&self, mut cfg: AppConfig) -> AppConfig {
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(exe) = &self.browser {
            cfg.browser.executable = Some(exe.clone());
        }
        cfg
    }

    fn run_options(&self, cfg: &AppConfig) -> Result<RunOptions> {
        Ok(RunOptions::from_flags(
            cfg.output_dir.clone(),
            self.download_only.clone(),
            self.redownload_if_smaller.as_deref(),
            self.skip_pdfs,
        )?)
    }

    pub async fn run(self) -> Result<()> {
        let cfg = config::load_or_init().unwrap_or_else(|e| {
            tracing::warn!("using default config: {:#}", e);
            AppConfig::default()
        });
        let cfg = self.effective_config(cfg);
        tracing::debug!("effective config: {:?}", cfg);
        let options = self.run_options(&cfg)?;

        println!("Processing {}", self.instruction_file.display());
        let renderer = ChromeRenderer::new(cfg.browser);
        let result = run::process_instruction_file(&self.instruction_file, &options, &renderer).await;
        let closed = renderer.close().await;
        let summary = result?;
        closed?;

        print_summary(&summary, &options.output_dir).await;
        Ok(())
    }
}

async fn print_summary(summary: &RunSummary, output_dir: &Path) {
    tracing::info!(?summary, "run completed");
    println!();
    println!(
        "{} downloaded ({} replaced), {} already present, {} skipped, {} filtered out",
        summary.downloaded,
        summary.redownloaded,
        summary.existing,
        summary.fetch_skipped,
        summary.filtered
    );
    let total = output_size(output_dir).await.unwrap_or_else(|e| {
        tracing::warn!("cannot size {}: {}", output_dir.display(), e);
        0
    });
    println!(
        "All done in {:.1}s, {} in output",
        summary.elapsed.as_secs_f64(),
        format_size(total)
    );
    let shown = tokio::fs::canonicalize(output_dir)
        .await
        .unwrap_or_else(|_| output_dir.to_path_buf());
    println!("Files saved to {}", shown.display());
}

/// Total bytes of the regular files directly inside `dir`.
async fn output_size(dir: &Path) -> std::io::Result<u64> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut total = 0;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}
