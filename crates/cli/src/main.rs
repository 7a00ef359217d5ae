// ABOUTME: Batch CLI for the Demeter sweep engine.
// ABOUTME: Loads a JSON run config, sweeps its targets, saves exports and prints a JSON summary.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use marketsweep_demeter::{
    load_builtin_profiles, DirSink, ExportPlan, ProfileRegistry, Sweeper, TableProfile, Target,
    GENERIC_PROFILE,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run a configured sweep and save its exports.
#[derive(Parser, Debug)]
#[command(name = "marketsweep-cli")]
#[command(about = "Run a sweep from a JSON run config", long_about = None)]
struct Args {
    /// Path to the run config JSON. Use "-" to read it from stdin.
    #[arg(required = true)]
    config: String,

    /// Where export files go. Overrides the config's output_dir.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output compact JSON instead of pretty.
    #[arg(long, default_value_t = false)]
    compact: bool,
}

/// Everything one batch run needs, as plain data.
#[derive(Debug, Deserialize)]
struct RunConfig {
    targets: Vec<Target>,

    /// Builtin profile name. Mutually exclusive with `custom_profile`.
    #[serde(default)]
    profile: Option<String>,

    /// Inline profile for pages the builtin registry does not know.
    #[serde(default)]
    custom_profile: Option<TableProfile>,

    #[serde(default)]
    retries: Option<u32>,
    #[serde(default)]
    attempt_timeout_secs: Option<u64>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    retry_backoff_ms: Option<u64>,
    #[serde(default)]
    target_delay_ms: Option<u64>,
    #[serde(default)]
    allow_private_networks: bool,

    #[serde(default)]
    export: ExportPlan,

    #[serde(default)]
    output_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config_text(target: &str) -> Result<String> {
    if target == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }

    let path = PathBuf::from(target);
    if !path.exists() {
        return Err(anyhow!("config file not found: {}", target));
    }
    Ok(fs::read_to_string(path)?)
}

fn resolve_profile(registry: &ProfileRegistry, config: &RunConfig) -> Result<TableProfile> {
    if config.profile.is_some() && config.custom_profile.is_some() {
        bail!("run config sets both profile and custom_profile");
    }
    if let Some(profile) = &config.custom_profile {
        return Ok(profile.clone());
    }
    if let Some(name) = &config.profile {
        return registry
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown profile '{}' (available: {})", name, registry.names().join(", ")));
    }
    if let Some(first) = config.targets.first() {
        if let Ok(parsed) = url::Url::parse(&first.url) {
            if let Some(host) = parsed.host_str() {
                if let Some(profile) = registry.for_domain(host) {
                    return Ok(profile.clone());
                }
            }
        }
    }
    Ok(registry
        .get(GENERIC_PROFILE)
        .cloned()
        .expect("builtin profiles include a generic fallback"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let raw = load_config_text(&args.config)?;
    let config: RunConfig =
        serde_json::from_str(&raw).map_err(|e| anyhow!("invalid run config: {}", e))?;
    if config.targets.is_empty() {
        bail!("run config contains no targets");
    }

    let registry = load_builtin_profiles();
    let profile = resolve_profile(&registry, &config)?;

    let mut builder = Sweeper::builder()
        .profile(profile)
        .allow_private_networks(config.allow_private_networks);
    if let Some(retries) = config.retries {
        builder = builder.max_retries(retries);
    }
    if let Some(secs) = config.attempt_timeout_secs {
        builder = builder.attempt_timeout(Duration::from_secs(secs));
    }
    if let Some(ms) = config.poll_interval_ms {
        builder = builder.poll_interval(Duration::from_millis(ms));
    }
    if let Some(ms) = config.retry_backoff_ms {
        builder = builder.retry_backoff(Duration::from_millis(ms));
    }
    if let Some(ms) = config.target_delay_ms {
        builder = builder.target_delay(Duration::from_millis(ms));
    }
    let mut sweeper = builder.build();

    // Ctrl-C abandons the current target's retries and skips the rest; the
    // partial export is still written.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, exporting what was gathered");
            interrupt.cancel();
        }
    });

    let out_dir = args
        .output_dir
        .or(config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let mut sink = DirSink::new(out_dir);

    let report = sweeper
        .run_to_sink(&config.targets, &config.export, &mut sink, &cancel)
        .await?;

    let summary = json!({
        "targets": report.outcomes.len(),
        "scraped": report.scraped_targets(),
        "failed": report.failed_targets(),
        "records": report.records.len(),
        "skipped_rows": report.skipped_rows,
        "outcomes": report.outcomes,
    });
    if args.compact {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if report.records.is_empty() {
        bail!("sweep produced no records");
    }
    Ok(())
}
