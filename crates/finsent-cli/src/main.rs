mod analyze;
mod pipeline;
mod status;

use clap::{Args, Parser, Subcommand};
use finsent_core::{AppConfig, RerunPolicy};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "finsent")]
#[command(about = "Financial news sentiment and entity pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch headlines, run every selected model, and store the results
    Run(RunArgs),
    /// Compare the selected models on a single piece of text
    Analyze {
        /// Text to analyze
        #[arg(long)]
        text: String,

        #[command(flatten)]
        models: ModelArgs,
    },
    /// Show recent model runs
    Status {
        /// Number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

/// Model selection shared by `run` and `analyze`.
#[derive(Debug, Args)]
struct ModelArgs {
    /// Comma-separated sentiment models (overrides FINSENT_SENTIMENT_MODELS)
    #[arg(long)]
    sentiment_models: Option<String>,

    /// Comma-separated NER models (overrides FINSENT_NER_MODELS)
    #[arg(long)]
    ner_models: Option<String>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    models: ModelArgs,

    /// Articles per model call
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pause between model calls, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// What to do with articles a model has already scored: skip or upsert
    #[arg(long)]
    rerun_policy: Option<RerunPolicy>,

    /// Fetch and print articles without analyzing or storing them
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::SqlitePool> {
    let pool = finsent_db::connect_pool(
        &config.database_url,
        finsent_db::PoolConfig::from_app_config(config),
    )
    .await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = finsent_core::load_app_config()?;
    init_tracing(&config);

    match cli.command {
        Some(Commands::Run(args)) => {
            let pool = connect(&config).await?;
            finsent_db::run_migrations(&pool).await?;
            pipeline::run_pipeline(&pool, &config, &args).await?;
        }
        Some(Commands::Analyze { text, models }) => {
            analyze::run_analyze(&config, &text, &models).await?;
        }
        Some(Commands::Status { limit }) => {
            let pool = connect(&config).await?;
            status::run_status(&pool, limit).await?;
        }
        Some(Commands::Db {
            command: DbCommands::Ping,
        }) => {
            let pool = connect(&config).await?;
            finsent_db::health_check(&pool).await?;
            println!("database ok: {}", config.database_url);
        }
        Some(Commands::Db {
            command: DbCommands::Migrate,
        }) => {
            let pool = connect(&config).await?;
            let applied = finsent_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        None => println!("no command given; try `finsent --help`"),
    }

    Ok(())
}

#[cfg(test)]
mod tests;
