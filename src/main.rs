use clap::{Parser, Subcommand};
use pgadvise::advisor;
use pgadvise::config::JobConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PostgreSQL automatic index advisor - suggests secondary indexes for a
/// captured workload using hypothetical (HypoPG) index simulation
#[derive(Parser, Debug)]
#[command(name = "pgadvise")]
#[command(version = "0.1.0")]
#[command(about = "PostgreSQL secondary-index advisor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Advise indexes for a single database and workload
    Advise {
        /// Database host
        #[arg(
            short = 'H',
            long = "host",
            env = "DB_HOST",
            default_value = "localhost"
        )]
        host: String,

        /// Database port
        #[arg(long = "port", env = "DB_PORT", default_value = "5432")]
        port: u16,

        /// Database name
        #[arg(short = 'd', long = "database", env = "DB_NAME")]
        database: String,

        /// Username
        #[arg(short = 'u', long = "username", env = "DB_USER")]
        username: String,

        /// Password
        #[arg(short = 'p', long = "password", env = "DB_PASS")]
        password: String,

        /// Commit each statement as it executes
        #[arg(
            long = "autocommit",
            env = "AUTOCOMMIT",
            default_value_t = true,
            action = clap::ArgAction::Set
        )]
        autocommit: bool,

        /// Captured workload log (PostgreSQL csvlog)
        #[arg(short = 'w', long = "workload")]
        workload: PathBuf,

        /// Output SQL action script
        #[arg(
            short = 'o',
            long = "output",
            env = "OUTPUT_PATH",
            default_value = "actions.sql"
        )]
        output: PathBuf,

        /// Minimum cost drop as a fraction of the current workload cost
        #[arg(long = "min-cost-factor", env = "MIN_COST_FACTOR", default_value = "0.01")]
        min_cost_factor: f64,

        /// Maximum number of columns per suggested index
        #[arg(long = "max-index-width", env = "MAX_INDEX_WIDTH", default_value = "3")]
        max_index_width: usize,

        /// Storage budget in bytes (defaults to available memory)
        #[arg(long = "storage-budget")]
        storage_budget: Option<i64>,
    },
    /// Advise for multiple databases from a YAML config file
    Batch {
        /// Path to YAML config file
        #[arg(short = 'c', long = "config")]
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Advise {
            host,
            port,
            database,
            username,
            password,
            autocommit,
            workload,
            output,
            min_cost_factor,
            max_index_width,
            storage_budget,
        } => {
            let job = JobConfig {
                host,
                port,
                database,
                username,
                password,
                autocommit,
                workload,
                output,
                min_cost_factor,
                max_index_width,
                storage_budget,
            };
            run_and_report(&job).await?;
        }
        Commands::Batch { config_path } => {
            info!("Loading config from: {}", config_path);
            let jobs = JobConfig::from_config_file(&config_path)?;

            for job in jobs {
                run_and_report(&job).await?;
            }
        }
    }

    Ok(())
}

async fn run_and_report(job: &JobConfig) -> anyhow::Result<()> {
    info!("Advising indexes for database: {}", job.database);
    let summary = advisor::run_job(job).await?;

    info!(
        "Accepted {} indexes, evicted {}; workload cost {:.2} -> {:.2} ({})",
        summary.accepted.len(),
        summary.evicted.len(),
        summary.initial_cost,
        summary.final_cost,
        summary.reason.as_str()
    );
    for ident in &summary.accepted {
        info!("  accepted {}", ident);
    }
    for name in &summary.evicted {
        info!("  evicted {}", name);
    }
    info!("Action script written to {}", job.output.display());

    Ok(())
}
