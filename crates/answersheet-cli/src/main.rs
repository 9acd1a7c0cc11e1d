use answersheet_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; fall back to stderr if the state dir is unusable.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    let cli = Cli::parse_or_exit();
    if let Err(err) = cli.run().await {
        tracing::error!("run failed: {:#}", err);
        eprintln!("save-answersheets error: {:#}", err);
        std::process::exit(1);
    }
}
