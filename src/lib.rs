pub mod config;
pub mod core;
pub mod db;
pub mod freshness;
pub mod metrics;
pub mod readers;

pub use crate::config::Config;
pub use crate::core::{OutputLabel, ScriptType, TrackedInput, TrackedOutput, TxTotals, WalletTx};
pub use crate::db::WalletStore;
pub use crate::freshness::FreshnessGate;
pub use crate::metrics::{AnalysisEngine, AnalysisSettings, MetricInfo, PrivacyMetric};
pub use crate::readers::{
    FreshnessStore, NullRefresher, OutputReader, OutputRefresher, ReadError, TransactionReader,
    WalletReader,
};
