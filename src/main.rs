use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use privradar::config::Config;
use privradar::db::WalletStore;
use privradar::freshness::FreshnessGate;
use privradar::metrics::AnalysisEngine;
use privradar::readers::NullRefresher;

/// Score a wallet transaction against the privacy metric catalogue.
#[derive(Debug, Parser)]
#[command(name = "privradar", version)]
struct Args {
    /// Transaction id to analyze
    #[arg(required_unless_present = "list_metrics")]
    txid: Option<String>,

    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the database path from the config file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Comma-separated metric ids; defaults to the full catalogue
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// Print the metric catalogue as JSON and exit
    #[arg(long)]
    list_metrics: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("privradar=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    if args.list_metrics {
        let catalogue = privradar::metrics::PrivacyMetric::catalogue();
        println!(
            "{}",
            serde_json::to_string_pretty(&catalogue).expect("Catalogue serialization")
        );
        return;
    }
    let txid = args.txid.expect("txid is required");

    // Load configuration
    let config = Config::load(&args.config);
    tracing::info!("Config: {:?}", config);

    // Open the wallet store
    let db_path = args
        .database
        .unwrap_or_else(|| PathBuf::from(&config.database.path));
    if let Some(parent) = db_path.parent() {
        if parent != Path::new("") {
            std::fs::create_dir_all(parent).expect("Failed to create database directory");
        }
    }
    let store = WalletStore::open(&db_path).expect("Failed to open wallet database");
    tracing::info!("Wallet database opened at {}", db_path.display());

    // The CLI analyzes a store synced out-of-band, so the refresh is a no-op.
    let refresher = NullRefresher;
    let gate = FreshnessGate::new(
        &store,
        &refresher,
        chrono::Duration::seconds(config.analysis.refresh_interval_secs as i64),
    );
    let engine = AnalysisEngine::new(&store, gate, config.analysis.settings());

    let result = if args.metrics.is_empty() {
        engine.analyze_all(&txid)
    } else {
        engine.analyze_ids(&txid, &args.metrics)
    };

    let verdicts = match result {
        Ok(verdicts) => verdicts,
        Err(e) => {
            tracing::error!("Analysis failed: {e}");
            std::process::exit(1);
        }
    };

    let mut report = serde_json::Map::new();
    for (metric, verdict) in &verdicts {
        report.insert(metric.id().to_string(), serde_json::Value::Bool(*verdict));
    }
    let out = serde_json::json!({
        "txid": txid,
        "metrics": report,
    });
    println!("{}", serde_json::to_string_pretty(&out).expect("Report serialization"));
}
