mod embed;
mod ingest;
mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::embed::VectorCommands;
use crate::query::ReviewCommands;

#[derive(Debug, Parser)]
#[command(name = "stayrev-cli")]
#[command(about = "Hotel review ingestion and embedding pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Analyze every raw review and replace the normalized store
    Ingest {
        /// Fetch and count raw reviews without calling the model or writing
        #[arg(long)]
        dry_run: bool,
        /// Also write the built prompt to this file
        #[arg(long)]
        save_prompt: Option<PathBuf>,
        /// Override the JSON artifact path (defaults to `STAYREV_ARTIFACT_PATH`)
        #[arg(long)]
        artifact: Option<PathBuf>,
    },
    /// Embed one review and upsert it into the vector store
    Embed {
        #[arg(long)]
        review_id: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        hotel_id: i64,
    },
    /// Embed every stored normalized review
    BackfillEmbeddings {
        /// Hotel id recorded in each vector's metadata
        #[arg(long)]
        hotel_id: i64,
        /// Maximum embedding requests in flight
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Inspect the vector store
    Vectors {
        #[command(subcommand)]
        command: VectorCommands,
    },
    /// Inspect the normalized review store
    Reviews {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Show recent ingestion runs
    Runs {
        #[arg(long, default_value = "10")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Verify the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("stayrev-cli: no command given; see --help");
        return Ok(());
    };

    let config = stayrev_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Ping => {
                    stayrev_db::health_check(&pool).await?;
                    println!("database ok");
                }
                DbCommands::Migrate => {
                    let applied = stayrev_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
            Ok(())
        }
        Commands::Ingest {
            dry_run,
            save_prompt,
            artifact,
        } => {
            let pool = connect(&config).await?;
            let artifact = artifact.unwrap_or_else(|| config.artifact_path.clone());
            ingest::run_ingest(&pool, &config, dry_run, save_prompt.as_deref(), &artifact).await
        }
        Commands::Embed {
            review_id,
            text,
            hotel_id,
        } => embed::run_embed(&config, review_id, text, hotel_id).await,
        Commands::BackfillEmbeddings {
            hotel_id,
            concurrency,
        } => {
            let pool = connect(&config).await?;
            embed::run_backfill(&pool, &config, hotel_id, concurrency).await
        }
        Commands::Vectors { command } => embed::run_vectors(&config, command).await,
        Commands::Reviews { command } => {
            let pool = connect(&config).await?;
            query::run_reviews(&pool, command).await
        }
        Commands::Runs { limit } => {
            let pool = connect(&config).await?;
            query::run_runs(&pool, limit).await
        }
    }
}

async fn connect(config: &stayrev_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = stayrev_db::PoolConfig::from_app_config(config);
    let pool = stayrev_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

/// Attempt to mark an ingestion run as failed, logging any secondary error.
async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(mark_err) = stayrev_db::fail_ingestion_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark ingestion run as failed"
        );
    }
}
