/*!
 * Shardpool CLI - verify and watch sharded Redis pools
 */

use anyhow::Context;
use clap::{Parser, Subcommand};
use shardpool::{
    error::{ShardpoolError, EXIT_FATAL, EXIT_SUCCESS, EXIT_UNHEALTHY},
    logging,
    redis::{verify_address, RedisConnFactory},
    PoolRegistry, RedisPoolSettings, Settings,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "shardpool")]
#[command(version, about = "Sharded Redis connection pools with health checking and failover", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dial and ping every configured address once
    Check {
        /// Settings file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Run the configured pools and log shard statistics until Ctrl-C
    Watch {
        /// Settings file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Seconds between statistics snapshots
        #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<ShardpoolError>()
                .map(ShardpoolError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Check { config } | Commands::Watch { config, .. } => config,
    };
    let settings = Settings::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    logging::init_logging(&settings.logging, cli.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Check { .. } => check(&settings).await,
            Commands::Watch { interval, .. } => {
                watch(&settings, Duration::from_secs(interval)).await
            }
        }
    })
}

/// Every pool definition in the settings, default first
fn pool_definitions(settings: &Settings) -> Vec<&RedisPoolSettings> {
    settings
        .redis
        .default
        .iter()
        .chain(settings.redis.connection.iter())
        .collect()
}

async fn check(settings: &Settings) -> anyhow::Result<i32> {
    if !settings.redis.enabled {
        println!("Redis is disabled in this configuration");
        return Ok(EXIT_SUCCESS);
    }

    let mut failures = 0;
    for pool in pool_definitions(settings) {
        let factory = RedisConnFactory::from_settings(pool);
        println!("[{}]", pool.display_name());

        for address in pool.addresses() {
            match verify_address(&factory, &address).await {
                Ok(()) => println!("  ok    {}", address),
                Err(e) => {
                    failures += 1;
                    println!("  FAIL  {}: {}", address, e);
                }
            }
        }
    }

    if failures > 0 {
        println!("{} address(es) failed", failures);
        Ok(EXIT_UNHEALTHY)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

async fn watch(settings: &Settings, interval: Duration) -> anyhow::Result<i32> {
    let registry = PoolRegistry::init(&settings.redis).await?;
    if registry.is_empty() {
        println!("No Redis pools configured");
        return Ok(EXIT_SUCCESS);
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
            _ = ticker.tick() => {
                for pool in registry.pools() {
                    match serde_json::to_string(&pool.stats()) {
                        Ok(stats) => info!(pool = %pool.name(), %stats, "Shard statistics"),
                        Err(e) => error!(pool = %pool.name(), error = %e, "Failed to encode statistics"),
                    }
                }
            }
        }
    }

    info!("Shutting down");
    registry.shutdown().await;
    Ok(EXIT_SUCCESS)
}
