// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheetpress: print-sheet export for trading-card proxies.
//
// Entry point. Initialises logging, parses the command line, wires Ctrl-C to
// export cancellation, and reports at most one failure summary.

mod export;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sheetpress_core::human_errors::summarize_error;
use sheetpress_export::CancelSignal;

use export::{ExportJob, JobResult};

#[derive(Parser)]
#[command(name = "sheetpress")]
#[command(about = "Lay out card images on print sheets with bleed and export them as PDF")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a card list to a PDF
    Export {
        /// JSON array of cards
        #[arg(long)]
        cards: PathBuf,

        /// JSON array of card backs, one per card; produces a duplex document
        #[arg(long)]
        backs: Option<PathBuf>,

        /// JSON export settings; defaults are used when omitted
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Directory image references are resolved against
        #[arg(long)]
        images: PathBuf,

        /// Directory the PDF is written to
        #[arg(long)]
        out: PathBuf,

        /// SQLite file for the persistent effect cache
        #[arg(long)]
        cache_db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Export {
            cards,
            backs,
            settings,
            images,
            out,
            cache_db,
        } => {
            let job = ExportJob {
                cards,
                backs,
                settings,
                images,
                out,
                cache_db,
            };

            let cancel = CancelSignal::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, cancelling export");
                    on_interrupt.cancel();
                }
            });

            match export::run(job, &cancel).await {
                Ok(JobResult::Saved(path)) => {
                    println!("{}", path.display());
                    ExitCode::SUCCESS
                }
                Ok(JobResult::Cancelled) => {
                    eprintln!("Export cancelled.");
                    ExitCode::from(130)
                }
                Err(e) => {
                    tracing::error!(error = %e, "export failed");
                    if let Some(summary) = summarize_error(&e) {
                        eprintln!("{}", summary.message);
                        eprintln!("{}", summary.suggestion);
                    }
                    ExitCode::FAILURE
                }
            }
        }
    }
}
