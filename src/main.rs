use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod aggregate;
mod categories;
mod classify;
mod config;
mod db;
mod engine;
mod filter;
mod models;
mod period;
mod report;
mod store;

use config::{Config, LogFormat};
use engine::DashboardRequest;
use store::{MemoryStore, RecordStore};

#[derive(Parser)]
#[command(name = "plant-dashboard")]
#[command(about = "Plant health dashboard analytics over diagnosis scans", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DashboardArgs {
    /// Owner whose scans are aggregated
    #[arg(long, env = "PLANT_OWNER_ID")]
    owner: Option<Uuid>,
    /// One of 7d, 30d, 90d, 1y; anything else means 30d
    #[arg(long, default_value = "30d")]
    time_range: String,
    /// Category id, or "all"
    #[arg(long, default_value = "all")]
    category: String,
    /// Read scans from a CSV file instead of Postgres
    #[arg(long)]
    scans_csv: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo owner with a year of scans
    Seed,
    /// Import scans from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Build the dashboard payload as JSON
    Dashboard {
        #[command(flatten)]
        args: DashboardArgs,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print a plain-text dashboard digest
    Summary {
        #[command(flatten)]
        args: DashboardArgs,
    },
}

fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn open_store(config: &Config, args: &DashboardArgs) -> anyhow::Result<Arc<dyn RecordStore>> {
    if let Some(path) = &args.scans_csv {
        let import = db::read_scans_csv(path)?;
        let scans = import.scans.into_iter().map(|scan| scan.record).collect();
        return Ok(Arc::new(MemoryStore::new(scans, import.categories)));
    }
    let pool = connect(config).await?;
    Ok(Arc::new(db::PgStore::new(pool)))
}

async fn build(
    config: &Config,
    args: &DashboardArgs,
) -> anyhow::Result<models::DashboardResponse> {
    let store = open_store(config, args).await?;
    let request = DashboardRequest {
        owner_id: args.owner,
        time_range: Some(args.time_range.clone()),
        category_id: Some(args.category.clone()),
    };
    engine::build_dashboard(store, &request, chrono::Utc::now())
        .await
        .context("failed to build dashboard")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let owner_id = db::seed(&pool).await?;
            println!("Seed data inserted for owner {owner_id}.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} scans from {}.", csv.display());
        }
        Commands::Dashboard { args, out, pretty } => {
            let dashboard = build(&config, &args).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&dashboard)?
            } else {
                serde_json::to_string(&dashboard)?
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Dashboard written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Summary { args } => {
            let dashboard = build(&config, &args).await?;
            let label = format!(
                "{} over {} (category {})",
                args.owner.map(|id| id.to_string()).unwrap_or_default(),
                period::TimeRange::parse(Some(&args.time_range)).token(),
                args.category
            );
            print!("{}", report::render_summary(&label, &dashboard));
        }
    }

    Ok(())
}
