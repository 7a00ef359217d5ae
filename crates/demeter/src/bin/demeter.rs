// ABOUTME: CLI binary for the Demeter sweep engine.
// ABOUTME: Sweeps target URLs or a saved HTML file and prints or saves the export.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use marketsweep_demeter::{
    load_builtin_profiles, partition_records, render_table, Column, DateStamp, DirSink,
    ExportFormat, ExportPlan, FilenameStamp, Partition, PartitionRule, ProfileRegistry,
    StaticAccessor, Sweeper, TableProfile, Target, GENERIC_PROFILE,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "demeter")]
#[command(about = "Sweep tabular data from web pages into CSV/TSV exports")]
struct Args {
    /// Category label attached to every extracted record
    #[arg(short = 'c', long = "category", default_value = "general")]
    category: String,

    /// Table profile name (default: by domain, falling back to generic)
    #[arg(short = 'p', long = "profile")]
    profile: Option<String>,

    /// Output format: csv (default), tsv, kv
    #[arg(short = 'f', long = "format", default_value = "csv")]
    format: String,

    /// Comma-separated export columns
    #[arg(long = "columns", default_value = "date,symbol,price,category,volume,market_cap")]
    columns: String,

    /// Stamp rows with yesterday's date (for after-close data)
    #[arg(long = "yesterday")]
    yesterday: bool,

    /// Directory to save export files into (default: print to stdout)
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Export filename prefix
    #[arg(long = "prefix", default_value = "sweep")]
    prefix: String,

    /// Keep only records whose market cap clears this floor
    #[arg(long = "min-market-cap")]
    min_market_cap: Option<f64>,

    /// Total attempts per target
    #[arg(long = "retries", default_value_t = 3)]
    retries: u32,

    /// Per-attempt timeout in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    timeout: u64,

    /// Readiness poll interval in milliseconds
    #[arg(long = "poll-interval", default_value_t = 1000)]
    poll_interval: u64,

    /// Backoff between attempts in milliseconds
    #[arg(long = "backoff", default_value_t = 2000)]
    backoff: u64,

    /// Delay between targets in milliseconds
    #[arg(long = "delay", default_value_t = 1000)]
    delay: u64,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// Print the run report as JSON instead of the rendered export
    #[arg(long = "json")]
    json_output: bool,

    /// HTML file to sweep offline (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL context for --html
    #[arg(long = "url")]
    url: Option<String>,

    /// Target URLs to sweep (fetch mode)
    #[arg()]
    urls: Vec<String>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_columns(list: &str) -> Result<Vec<Column>, String> {
    let mut columns = Vec::new();
    for name in list.split(',') {
        match Column::from_name(name) {
            Some(column) => columns.push(column),
            None => {
                let known: Vec<&str> = Column::ALL.iter().map(|c| c.header()).collect();
                return Err(format!(
                    "unknown column '{}' (known: {})",
                    name.trim(),
                    known.join(", ")
                ));
            }
        }
    }
    Ok(columns)
}

/// Picks the profile: explicit name first, then the first URL's domain,
/// then the generic fallback.
fn resolve_profile(
    registry: &ProfileRegistry,
    explicit: Option<&str>,
    first_url: Option<&str>,
) -> Result<TableProfile, String> {
    if let Some(name) = explicit {
        return match registry.get(name) {
            Some(profile) => Ok(profile.clone()),
            None => Err(format!(
                "unknown profile '{}' (available: {})",
                name,
                registry.names().join(", ")
            )),
        };
    }
    if let Some(raw) = first_url {
        if let Ok(parsed) = url::Url::parse(raw) {
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
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    // Validate args
    if args.html.is_some() && args.url.is_none() {
        eprintln!("error: --url is required when using --html");
        return ExitCode::from(1);
    }

    if args.html.is_none() && args.urls.is_empty() {
        eprintln!("error: at least one URL is required, or use --html with --url");
        return ExitCode::from(1);
    }

    if args.html.is_some() && !args.urls.is_empty() {
        eprintln!("error: cannot use both --html and positional URLs");
        return ExitCode::from(1);
    }

    let columns = match parse_columns(&args.columns) {
        Ok(columns) => columns,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(1);
        }
    };

    let registry = load_builtin_profiles();
    let first_url = args.url.as_deref().or(args.urls.first().map(|u| u.as_str()));
    let profile = match resolve_profile(&registry, args.profile.as_deref(), first_url) {
        Ok(profile) => profile,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(1);
        }
    };

    let mut builder = Sweeper::builder()
        .profile(profile)
        .max_retries(args.retries)
        .attempt_timeout(Duration::from_secs(args.timeout))
        .poll_interval(Duration::from_millis(args.poll_interval))
        .retry_backoff(Duration::from_millis(args.backoff))
        .target_delay(Duration::from_millis(args.delay))
        .allow_private_networks(args.allow_private_networks);

    let targets: Vec<Target>;
    if let Some(html_path) = &args.html {
        // Offline mode: serve the saved page from memory.
        let page_url = args.url.clone().unwrap_or_default();
        let html = match fs::read_to_string(html_path) {
            Ok(html) => html,
            Err(e) => {
                eprintln!("error reading file {:?}: {}", html_path, e);
                return ExitCode::from(1);
            }
        };
        let accessor = StaticAccessor::new().with_page(&page_url, html);
        builder = builder.accessor(Box::new(accessor));
        targets = vec![Target::new(page_url, &args.category)];
    } else {
        targets = args
            .urls
            .iter()
            .map(|u| Target::new(u, &args.category))
            .collect();
    }
    let mut sweeper = builder.build();

    let mut plan = ExportPlan {
        columns,
        format: ExportFormat::from_name(&args.format).unwrap_or(ExportFormat::Csv),
        stamp: if args.yesterday {
            DateStamp::Yesterday
        } else {
            DateStamp::Today
        },
        filename_stamp: FilenameStamp::Timestamp,
        prefix: args.prefix.clone(),
        partitions: Vec::new(),
    };
    if let Some(floor) = args.min_market_cap {
        plan.partitions.push(Partition {
            name: "large".to_string(),
            rule: PartitionRule::MinMarketCap { floor },
        });
    }

    let cancel = CancellationToken::new();
    let report = if let Some(dir) = &args.output_dir {
        let mut sink = DirSink::new(dir);
        match sweeper.run_to_sink(&targets, &plan, &mut sink, &cancel).await {
            Ok(report) => report,
            Err(e) => {
                eprintln!("error: export failed: {}", e);
                return ExitCode::from(1);
            }
        }
    } else {
        let report = sweeper.run(&targets, &cancel).await;
        if !args.json_output {
            let date = plan.stamp.resolve(chrono::Local::now().date_naive());
            for (_, records) in partition_records(&report.records, &plan.partitions) {
                match render_table(&records, &plan.columns, plan.format, date) {
                    Ok(text) => print!("{}", text),
                    Err(e) => {
                        eprintln!("error: export failed: {}", e);
                        return ExitCode::from(1);
                    }
                }
            }
        }
        report
    };

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        eprint!("{}", report.summary());
    }

    if report.records.is_empty() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
