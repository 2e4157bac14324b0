use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use muni_events::app::collect_use_case::{CollectUseCase, ConfiguredSource, RunOutput};
use muni_events::app::ports::{EventSource, Geocoder};
use muni_events::infra::{load_fragments, CorrectionTable, FacilityTable, FileSource, GsiGeocoder, NullGeocoder};
use muni_events::{logging, observability, Config};

#[derive(Parser)]
#[command(name = "muni_events")]
#[command(about = "Normalize Japanese municipal event listings into canonical events")]
#[command(version)]
struct Cli {
    /// Directory for JSON log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a file of raw fragments into canonical events
    Normalize {
        /// JSON array of fragments, each optionally with a `detail` object
        #[arg(long)]
        input: PathBuf,
        /// Where to write the JSON array of events (`-` for stdout)
        #[arg(long)]
        output: PathBuf,
        /// Config file (defaults to $MUNI_EVENTS_CONFIG, then config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override run.max_days
        #[arg(long)]
        max_days: Option<i64>,
        /// Never call the geocoder; every venue gets its source's default center
        #[arg(long)]
        offline: bool,
        /// Anchor the collection window to this instant (RFC 3339) instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Write Prometheus metrics text here after the run
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// Load and validate the config, then print a summary
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(cli_path: Option<&Path>) -> Result<Config> {
    let path = Config::resolve_path(cli_path);
    let config = if cli_path.is_some() {
        Config::load(&path)
    } else {
        Config::load_or_default(&path)
    };
    config.with_context(|| format!("loading config from {}", path.display()))
}

fn write_events(output: &Path, run: &RunOutput) -> Result<()> {
    let json = serde_json::to_string_pretty(&run.events)?;
    if output == Path::new("-") {
        println!("{json}");
        return Ok(());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_normalize(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    max_days: Option<i64>,
    offline: bool,
    now: Option<DateTime<Utc>>,
    metrics_out: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(days) = max_days {
        config.run.max_days = days;
    }
    config.validate()?;

    if metrics_out.is_some() {
        observability::init()?;
    }

    let geocoder: Arc<dyn Geocoder> = if offline {
        info!("Offline mode: geocoding disabled");
        Arc::new(NullGeocoder)
    } else {
        Arc::new(GsiGeocoder::new(&config.geocoder)?)
    };
    let collector = CollectUseCase::from_config(
        &config,
        geocoder,
        Arc::new(FacilityTable::from_config(&config)),
        Arc::new(CorrectionTable::from_config(&config)),
    );

    let fragments = load_fragments(input).with_context(|| format!("reading fragments from {}", input.display()))?;
    info!("Loaded {} fragment(s) from {}", fragments.len(), input.display());
    let sources: Vec<ConfiguredSource> = FileSource::group(fragments)
        .into_iter()
        .map(|s| ConfiguredSource::with_config(Arc::new(s) as Arc<dyn EventSource>, &config))
        .collect();

    let run = collector.collect(sources, now.unwrap_or_else(Utc::now)).await;
    write_events(output, &run)?;

    if let Some(path) = metrics_out {
        let text = observability::render().unwrap_or_default();
        std::fs::write(path, text).with_context(|| format!("writing metrics to {}", path.display()))?;
    }

    if output != Path::new("-") {
        let r = &run.report;
        println!("\n📊 Normalization results:");
        println!("   Sources: {} ({} failed)", r.sources, r.sources_failed);
        println!("   Fragments: {}", r.fragments);
        println!("   Events: {}", r.events);
        println!("   Duplicates dropped: {}", r.duplicates_dropped);
        println!("   Geocode fallbacks: {}", r.geocode_degraded);
        println!("   Output file: {}", output.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = logging::init_logging(&cli.log_dir);

    let result = match cli.command {
        Commands::Normalize {
            input,
            output,
            config,
            max_days,
            offline,
            now,
            metrics_out,
        } => {
            run_normalize(
                &input,
                &output,
                config.as_deref(),
                max_days,
                offline,
                now,
                metrics_out.as_deref(),
            )
            .await
        }
        Commands::CheckConfig { config } => load_config(config.as_deref()).map(|c| {
            println!("✅ Config OK: {} source(s), max_days = {}", c.sources.len(), c.run.max_days);
            for s in &c.sources {
                println!(
                    "   - {} ({}): {} facilities, {} corrections",
                    s.key,
                    s.profile().label,
                    s.facilities.len(),
                    s.corrections.len()
                );
            }
        }),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
