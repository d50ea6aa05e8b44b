//! Removes abandoned uploads from a container registry's S3 bucket.

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use reaper_core::AppConfig;
use reaper_storage::S3Location;
use reaper_sweep::{SweepStats, Sweeper};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for a run that failed after the arguments were accepted.
const EXIT_FATAL: u8 = 2;
/// Exit code for a bad invocation.
const EXIT_USAGE: u8 = 1;

/// Abort stale multipart uploads and delete stale upload folders in a registry bucket
#[derive(Parser)]
#[command(name = "registry-reaper")]
#[command(version, about, long_about = None)]
struct Args {
    /// S3 endpoint, as `host:port` (plain HTTP) or a full URL
    endpoint: String,

    /// Bucket holding the registry's storage
    bucket: String,

    /// Access key ID; leave empty to fall back to ambient credentials
    access_key: String,

    /// Secret access key
    secret_key: String,

    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "REAPER_CONFIG",
        default_value = "config/reaper.toml"
    )]
    config: String,

    /// Log what would be removed without removing anything
    #[arg(long)]
    dry_run: bool,
}

fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| "registry-reaper".to_string())
}

fn print_usage() {
    println!(
        "Usage: {} <endpoint> <bucketname> <accessKey> <secretKey>",
        program_name()
    );
}

/// Load configuration from an optional TOML file overlaid with `REAPER_` variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path.display());
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("REAPER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config.validate().map_err(reaper_core::Error::Config)?;
    Ok(config)
}

async fn run(args: Args) -> Result<SweepStats> {
    let mut config = load_config(Path::new(&args.config))?;
    if args.dry_run {
        config.reaper.dry_run = true;
    }

    let location = S3Location {
        endpoint: args.endpoint,
        bucket: args.bucket,
        access_key_id: args.access_key,
        secret_access_key: args.secret_key,
    };
    let store = reaper_storage::from_config(&location, &config.store)
        .context("failed to initialize object store")?;

    println!("Endpoint: {}", location.endpoint);
    println!("Bucket: {}\n", location.bucket);

    let stats = Sweeper::new(store, config.reaper)
        .run()
        .await
        .with_context(|| format!("sweep of bucket {} failed", location.bucket))?;

    Ok(stats)
}

fn print_summary(stats: &SweepStats) {
    println!();
    println!(
        "Removed {} multipart uploads and {} upload folders ({} objects) across {} repositories",
        stats.uploads_removed(),
        stats.folders_removed(),
        stats.folders.objects_deleted,
        stats.repositories
    );
    if stats.multipart.would_abort + stats.folders.would_remove > 0 {
        println!(
            "Dry run: would have removed {} multipart uploads and {} upload folders",
            stats.multipart.would_abort, stats.folders.would_remove
        );
    }
    if stats.errors() > 0 {
        println!("{} items could not be removed, see log above", stats.errors());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            // Help and version text go to stdout.
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            print_usage();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(args).await {
        Ok(stats) => {
            print_summary(&stats);
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("ERROR: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
