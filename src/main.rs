//! podcast-metrics binary entrypoint.
//! Replays the response store, reconciles the per-provider series and either
//! writes the report artifacts or answers a single-metric query.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use podcast_metrics::config::PipelineConfig;
use podcast_metrics::export::{aggregates, documents};
use podcast_metrics::pipeline::run_once;
use podcast_metrics::{Field, Provider, Repository, TracingObserver};

#[derive(Debug, Parser)]
#[command(name = "podcast-metrics", version, about)]
struct Cli {
    /// Verbose logging.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Pipeline config file (TOML or JSON).
    #[arg(long, global = true, env = "PODCAST_METRICS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "META_DIR")]
    meta_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "PAYLOAD_DIR")]
    payload_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the pipeline and write the report artifacts.
    Report {
        #[arg(long, env = "OUTPUT_STRATEGY", value_enum, default_value_t = OutputStrategy::Aggregates)]
        output: OutputStrategy,

        #[arg(long, env = "JSON_RESULT_DIR", default_value = "frontend/src/data")]
        json_result_dir: PathBuf,

        #[arg(long, env = "EVENT_MARKER_FILE_NAME")]
        event_marker_file_name: Option<PathBuf>,
    },
    /// Print the forward-filled series of one metric for one provider.
    Query {
        #[arg(long, env = "PROVIDER", default_value = "Spotify")]
        provider: Provider,

        /// follower, listener, engaged_listener, consumption, stream, stream_start
        #[arg(long = "type", env = "TYPE", default_value = "follower")]
        metric: Field,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputStrategy {
    /// aggregates.json + events.json in the result directory
    Aggregates,
    /// one JSON document per (date, provider) on stdout
    Documents,
}

fn init_tracing(debug: bool, json: bool) {
    let default = if debug {
        "podcast_metrics=debug,info"
    } else {
        "podcast_metrics=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let mut cfg = PipelineConfig::load_from(path)?;
            cfg.apply_env_overrides();
            cfg
        }
        None => PipelineConfig::load_default()?,
    };
    if let Some(d) = &cli.meta_dir {
        cfg.meta_dir = d.clone();
    }
    if let Some(d) = &cli.payload_dir {
        cfg.payload_dir = d.clone();
    }
    Ok(cfg)
}

fn write_json<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<()> {
    let path = dir.join(file_name);
    let body = serde_json::to_string_pretty(value).context("serializing report")?;
    fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(target: "podcast_metrics", path = %path.display(), "wrote report file");
    Ok(())
}

fn main() -> Result<()> {
    // Load .env if present; no-op otherwise.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.debug, cli.json_logs);

    let mut cfg = load_config(&cli)?;
    if let Command::Report {
        event_marker_file_name: Some(p),
        ..
    } = &cli.command
    {
        cfg.events_path = Some(p.clone());
    }

    let out = run_once(&cfg, TracingObserver::handle())?;

    match cli.command {
        Command::Report {
            output: OutputStrategy::Aggregates,
            json_result_dir,
            ..
        } => {
            fs::create_dir_all(&json_result_dir)
                .with_context(|| format!("creating {}", json_result_dir.display()))?;
            write_json(&json_result_dir, "aggregates.json", &aggregates(&out.by_provider))?;
            write_json(&json_result_dir, "events.json", &out.events)?;
        }
        Command::Report {
            output: OutputStrategy::Documents,
            ..
        } => {
            for doc in documents(&out.by_date) {
                println!("{}", serde_json::to_string(&doc)?);
            }
        }
        Command::Query { provider, metric } => {
            let repo = Repository::new(metric, &out.by_provider);
            for (date, value) in repo.get_dates().into_iter().zip(repo.find_by_provider(provider)) {
                println!("{date} {value}");
            }
        }
    }
    Ok(())
}
