use std::process::ExitCode;

use clap::Parser;
use console::style;
use queryprobe::options::{Cli, ConfigFile};
use queryprobe::report::run_report;
use queryprobe::storage::FileSink;
use queryprobe::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse terminal arguments.
    let mut options = Cli::parse();

    // Load config file and apply values (CLI args take priority).
    let config = ConfigFile::load(options.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("{} {}", style("[ERROR]").red(), e);
        std::process::exit(1);
    });
    if let Err(e) = options.apply_config(&config) {
        eprintln!("{} {}", style("[ERROR]").red(), e);
        return ExitCode::FAILURE;
    }

    logging::init(options.verbose);

    let sink = FileSink::new(options.output.clone());
    match run_report(&options, sink).await {
        Ok(summary) => {
            summary.show_text_report();
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(kind = e.kind(), "Run aborted");
            eprintln!("{} {}", style("[ERROR]").red(), e);
            ExitCode::FAILURE
        }
    }
}
