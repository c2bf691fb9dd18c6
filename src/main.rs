//! # Pain Point Harness CLI (`pph`)
//!
//! ## Usage
//!
//! ```bash
//! pph --config ./config/pph.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pph init` | Create the SQLite database and run schema migrations |
//! | `pph collect` | Collect matching posts from Reddit |
//! | `pph classify` | Classify pending items with the LLM |
//! | `pph run` | Collect then classify |
//! | `pph serve` | Start the HTTP API |
//! | `pph stats` | Print database statistics |
//! | `pph get <id>` | Print one classified item |
//! | `pph trending` | Print the trending ranking |
//! | `pph export` | Export classified items as JSON or CSV |
//! | `pph demo` | Load sample data |
//! | `pph runs` | List recent collection passes |
//!
//! Credentials are read from the environment (or a `.env` file):
//! `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `GOOGLE_API_KEY`, `OPENAI_API_KEY`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use painpoint_harness::{config, demo, export, get, migrate, pipeline, server, stats};

/// Pain Point Harness: find product opportunities in Reddit discussions.
#[derive(Parser)]
#[command(
    name = "pph",
    about = "Pain Point Harness: collect, classify, and query pain points from Reddit",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pph.toml`. When the file does not exist,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/pph.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Collect posts that match the pain-signal filter.
    Collect {
        /// Comma-separated subreddits. Defaults to `collector.subreddits`.
        #[arg(long, short = 's')]
        sources: Option<String>,

        /// Items requested per listing.
        #[arg(long, short = 'l')]
        limit: Option<usize>,

        /// Use the public JSON endpoints (no Reddit credentials needed).
        #[arg(long)]
        public: bool,
    },

    /// Classify unclassified items with the configured LLM provider.
    Classify {
        /// Items to classify in this batch.
        #[arg(long, short = 'b')]
        batch_size: Option<usize>,
    },

    /// Collect then classify.
    Run {
        #[arg(long, short = 's')]
        sources: Option<String>,

        #[arg(long, short = 'l')]
        limit: Option<usize>,

        #[arg(long)]
        public: bool,

        #[arg(long, short = 'b')]
        batch_size: Option<usize>,
    },

    /// Start the HTTP API.
    Serve {
        /// Override `server.bind`, e.g. `0.0.0.0:8000`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print database statistics.
    Stats,

    /// Print one classified item by id.
    Get {
        id: String,
    },

    /// Print the highest-ranked items by engagement and opportunity.
    Trending {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Export classified items.
    ///
    /// Writes to `--output` if given, otherwise to stdout.
    Export {
        /// `json` or `csv`.
        #[arg(long, default_value = "json")]
        format: String,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Load sample classified items (no API keys needed).
    Demo,

    /// List recent collection passes.
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("painpoint_harness=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Collect {
            sources,
            limit,
            public,
        } => {
            pipeline::run_collect(&cfg, sources.as_deref(), limit, public).await?;
        }
        Commands::Classify { batch_size } => {
            pipeline::run_classify(&cfg, batch_size).await?;
        }
        Commands::Run {
            sources,
            limit,
            public,
            batch_size,
        } => {
            pipeline::run_pipeline(&cfg, sources.as_deref(), limit, public, batch_size).await?;
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Trending { limit } => {
            get::run_trending(&cfg, limit).await?;
        }
        Commands::Export { format, output } => {
            export::run_export(&cfg, &format, output.as_deref()).await?;
        }
        Commands::Demo => {
            demo::run_demo(&cfg).await?;
        }
        Commands::Runs { limit } => {
            stats::run_runs(&cfg, limit).await?;
        }
    }

    Ok(())
}
