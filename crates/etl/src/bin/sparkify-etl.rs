//! sparkify-etl: builds the Sparkify star schema from song and log JSON.
//!
//! Reads the credentials file, then runs the song stage and the log stage
//! against the configured input and output roots.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use sparkify_core::config::{load_dotenv, DEFAULT_CONFIG_PATH};
use sparkify_core::JobConfig;

// ── CLI ─────────────────────────────────────────────────────────────

/// Sparkify ETL: song catalog and activity logs to partitioned Parquet.
#[derive(Parser, Debug)]
#[command(name = "sparkify-etl", version, about)]
struct Cli {
    /// Path to the credentials file: TOML, or an INI-style dl.cfg with an
    /// [AWS] section holding KEY and SECRET.
    #[arg(long, env = "SPARKIFY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Input root (s3a://bucket/prefix or a local directory).
    #[arg(long, env = "SPARKIFY_INPUT")]
    input: Option<String>,

    /// Output root for the star-schema tables.
    #[arg(long, env = "SPARKIFY_OUTPUT")]
    output: Option<String>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let config = JobConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?
        .with_overrides(cli.input, cli.output);
    info!(path = %cli.config, "loaded job config");

    println!("-----Connected-----");
    config.log_summary();

    sparkify_etl::run(&config).await.context("ETL run failed")?;

    println!("Success");
    Ok(())
}
