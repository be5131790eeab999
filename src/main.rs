mod db;
mod emails;
mod export;
mod launcher;
mod pipeline;
mod settings;
mod sources;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "lead_scraper", about = "Startup lead aggregation from Crunchbase and Google")]
struct Cli {
    /// Settings file (TOML). Missing file means defaults + LEADS_* env vars.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch both sources, extract emails, persist everything
    Run {
        /// Crunchbase organization name filter
        #[arg(long)]
        crunchbase_query: Option<String>,
        /// Google search query
        #[arg(long)]
        google_query: Option<String>,
        /// Max Google results (1-10)
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    /// Serve GET /run-scraper, which runs the pipeline in a subprocess
    Serve {
        /// Listen address (default from settings)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Show stored document counts per collection
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs share stdout with the report, which the launcher returns as plain text
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let ansi = std::io::stdout().is_terminal();
    tracing::subscriber::set_global_default(log_subscriber(filter, std::io::stdout, ansi))?;

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(settings::DEFAULT_CONFIG_FILE));
    let mut settings = Settings::load(&config_path)?;

    match cli.command {
        Commands::Run {
            crunchbase_query,
            google_query,
            limit,
        } => {
            if let Some(q) = crunchbase_query {
                settings.crunchbase_query = q;
            }
            if let Some(q) = google_query {
                settings.google_query = q;
            }
            if let Some(n) = limit {
                settings.google_limit = n;
            }

            let t0 = Instant::now();
            // Anything unexpected ends the run with a log line, not a crash
            if let Err(e) = run(&settings).await {
                error!("Unexpected error occurred: {:#}", e);
            }
            println!("\nDone in {:.1}s", t0.elapsed().as_secs_f64());
            Ok(())
        }
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.launcher_addr.clone());
            let command = launcher::ScraperCommand::current_exe(cli.config)?;
            launcher::serve(&addr, command).await
        }
        Commands::Stats => {
            let store = db::DocumentStore::open(&settings.db_path)?;
            let counts = store.collection_counts()?;
            if counts.is_empty() {
                println!("No documents stored yet. Run 'run' first.");
                return Ok(());
            }
            for (collection, n) in counts {
                println!("{:<20} {}", collection, n);
            }
            Ok(())
        }
    }
}

fn log_subscriber<W>(
    filter: EnvFilter,
    writer: W,
    ansi: bool,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .finish()
}

async fn run(settings: &Settings) -> anyhow::Result<()> {
    let store = db::DocumentStore::open(&settings.db_path)?;
    let pipeline = pipeline::Pipeline::new(settings, &store)?;
    let summary = pipeline.run().await;
    println!(
        "\nSaved {} Crunchbase records, {} Google results, {} emails ({} documents, {} files).",
        summary.crunchbase_records,
        summary.google_records,
        summary.emails,
        summary.documents_written,
        summary.files_written.len(),
    );
    Ok(())
}
