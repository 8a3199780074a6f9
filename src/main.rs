mod browser;
mod collectors;
mod config;
mod db;
mod error;
mod models;

use clap::Parser;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use crate::collectors::runner;
use crate::config::{Command, Config, LogFormat};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("zipvagas=info,chromiumoxide=warn"));

    // stdout carries collected listings when no database is configured
    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn connect(config: &Config) -> anyhow::Result<Option<PgPool>> {
    let Some(url) = &config.database_url else {
        return Ok(None);
    };

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    Ok(Some(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);

    let pool = connect(&config).await?;
    let browser = config.browser_settings();

    match &config.command {
        Command::Collect { .. } => {
            let collect = config
                .command
                .collect_config()
                .ok_or_else(|| anyhow::anyhow!("collect arguments missing"))?;
            runner::collect(pool.as_ref(), &browser, collect).await
        }
        Command::Process { limit, .. } => {
            let pool = pool.ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for process"))?;
            runner::process(&pool, &browser, config.command.delay(), *limit).await
        }
        Command::Messages { limit } => {
            let pool = pool.ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for messages"))?;
            runner::messages(&pool, *limit, &mut std::io::stdout()).await
        }
        Command::Status => {
            let pool = pool.ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for status"))?;
            runner::log_status(&pool).await
        }
    }
}
