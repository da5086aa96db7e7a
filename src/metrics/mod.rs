pub mod analyzers;
pub mod thresholds;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{TxTotals, WalletTx};
use crate::freshness::FreshnessGate;
use crate::readers::{OutputReader, ReadError, WalletReader};

/// The fixed catalogue of privacy metrics. Ids are stable across versions;
/// there is no dynamic registration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyMetric {
    AnonymitySet,
    NoAddressReuse,
    MinimalWealthReveal,
    MinimalTxHistoryReveal,
    NoChange,
    NoSmallChange,
    NoRoundNumberPayments,
    SameScriptTypes,
    NoUnnecessaryInput,
    UseMultiChangeOutputs,
    AvoidCommonChangePosition,
    NoDoNotSpendUtxos,
    NoKycedUtxos,
}

impl PrivacyMetric {
    pub const ALL: [PrivacyMetric; 13] = [
        PrivacyMetric::AnonymitySet,
        PrivacyMetric::NoAddressReuse,
        PrivacyMetric::MinimalWealthReveal,
        PrivacyMetric::MinimalTxHistoryReveal,
        PrivacyMetric::NoChange,
        PrivacyMetric::NoSmallChange,
        PrivacyMetric::NoRoundNumberPayments,
        PrivacyMetric::SameScriptTypes,
        PrivacyMetric::NoUnnecessaryInput,
        PrivacyMetric::UseMultiChangeOutputs,
        PrivacyMetric::AvoidCommonChangePosition,
        PrivacyMetric::NoDoNotSpendUtxos,
        PrivacyMetric::NoKycedUtxos,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PrivacyMetric::AnonymitySet => "anonymity_set",
            PrivacyMetric::NoAddressReuse => "no_address_reuse",
            PrivacyMetric::MinimalWealthReveal => "minimal_wealth_reveal",
            PrivacyMetric::MinimalTxHistoryReveal => "minimal_tx_history_reveal",
            PrivacyMetric::NoChange => "no_change",
            PrivacyMetric::NoSmallChange => "no_small_change",
            PrivacyMetric::NoRoundNumberPayments => "no_round_number_payments",
            PrivacyMetric::SameScriptTypes => "same_script_types",
            PrivacyMetric::NoUnnecessaryInput => "no_unnecessary_input",
            PrivacyMetric::UseMultiChangeOutputs => "use_multi_change_outputs",
            PrivacyMetric::AvoidCommonChangePosition => "avoid_common_change_position",
            PrivacyMetric::NoDoNotSpendUtxos => "no_do_not_spend_utxos",
            PrivacyMetric::NoKycedUtxos => "no_kyced_utxos",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrivacyMetric::AnonymitySet => "Anonymity set",
            PrivacyMetric::NoAddressReuse => "No address reuse",
            PrivacyMetric::MinimalWealthReveal => "Minimal wealth reveal",
            PrivacyMetric::MinimalTxHistoryReveal => "Minimal transaction-history reveal",
            PrivacyMetric::NoChange => "No change",
            PrivacyMetric::NoSmallChange => "No small change",
            PrivacyMetric::NoRoundNumberPayments => "No round-number payments",
            PrivacyMetric::SameScriptTypes => "Same script types",
            PrivacyMetric::NoUnnecessaryInput => "No unnecessary input",
            PrivacyMetric::UseMultiChangeOutputs => "Use multi change outputs",
            PrivacyMetric::AvoidCommonChangePosition => "Avoid common change position",
            PrivacyMetric::NoDoNotSpendUtxos => "No do-not-spend UTXOs",
            PrivacyMetric::NoKycedUtxos => "No KYCed UTXOs",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PrivacyMetric::AnonymitySet => {
                "Wallet output values are shared by enough other outputs to blend in"
            }
            PrivacyMetric::NoAddressReuse => {
                "No wallet output address was already used in an earlier transaction"
            }
            PrivacyMetric::MinimalWealthReveal => {
                "Returned change stays below the amount-scaled multiple of the amount paid"
            }
            PrivacyMetric::MinimalTxHistoryReveal => {
                "No smaller set of the UTXOs available at the time could have covered the spend"
            }
            PrivacyMetric::NoChange => {
                "The transaction does not both spend and return wallet funds"
            }
            PrivacyMetric::NoSmallChange => {
                "The amount not returned as change stays within the small-change bound"
            }
            PrivacyMetric::NoRoundNumberPayments => {
                "Outputs do not mix round and non-round values that single out the change"
            }
            PrivacyMetric::SameScriptTypes => {
                "All outputs share one script type when change is present"
            }
            PrivacyMetric::NoUnnecessaryInput => {
                "Every wallet input was required to cover the amount spent"
            }
            PrivacyMetric::UseMultiChangeOutputs => {
                "Change is split across at least two wallet outputs"
            }
            PrivacyMetric::AvoidCommonChangePosition => {
                "The change output does not sit at the wallet's habitual position"
            }
            PrivacyMetric::NoDoNotSpendUtxos => "No input is marked do-not-spend",
            PrivacyMetric::NoKycedUtxos => {
                "No input is traceable to an identity-verified source"
            }
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.id() == id)
    }

    /// The full catalogue in stable order.
    pub fn catalogue() -> Vec<MetricInfo> {
        Self::ALL
            .iter()
            .map(|m| MetricInfo {
                id: m.id(),
                display_name: m.display_name(),
                description: m.description(),
            })
            .collect()
    }
}

/// One catalogue entry, as exposed to consumers listing the metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// Tunable analyzer parameters. Everything else in the catalogue is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub desired_anonymity_set: u64,
    pub allow_uneven_change: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            desired_anonymity_set: thresholds::DEFAULT_ANONYMITY_SET,
            allow_uneven_change: true,
        }
    }
}

/// Everything one analyzer call may look at. Wire view and totals are
/// optional on purpose: analyzers fail closed when their half is missing.
pub struct AnalyzerInput<'a> {
    pub tx: Option<&'a WalletTx>,
    pub totals: Option<&'a TxTotals>,
    pub reader: &'a dyn OutputReader,
    pub settings: &'a AnalysisSettings,
}

type AnalyzerFn = fn(&AnalyzerInput) -> Result<bool, ReadError>;

fn dispatch_table() -> HashMap<PrivacyMetric, AnalyzerFn> {
    let mut table: HashMap<PrivacyMetric, AnalyzerFn> = HashMap::with_capacity(13);
    table.insert(PrivacyMetric::AnonymitySet, analyzers::anonymity_set);
    table.insert(PrivacyMetric::NoAddressReuse, analyzers::no_address_reuse);
    table.insert(PrivacyMetric::MinimalWealthReveal, analyzers::minimal_wealth_reveal);
    table.insert(
        PrivacyMetric::MinimalTxHistoryReveal,
        analyzers::minimal_tx_history_reveal,
    );
    table.insert(PrivacyMetric::NoChange, analyzers::no_change);
    table.insert(PrivacyMetric::NoSmallChange, analyzers::no_small_change);
    table.insert(
        PrivacyMetric::NoRoundNumberPayments,
        analyzers::no_round_number_payments,
    );
    table.insert(PrivacyMetric::SameScriptTypes, analyzers::same_script_types);
    table.insert(PrivacyMetric::NoUnnecessaryInput, analyzers::no_unnecessary_input);
    table.insert(
        PrivacyMetric::UseMultiChangeOutputs,
        analyzers::use_multi_change_outputs,
    );
    table.insert(
        PrivacyMetric::AvoidCommonChangePosition,
        analyzers::avoid_common_change_position,
    );
    table.insert(PrivacyMetric::NoDoNotSpendUtxos, analyzers::no_do_not_spend_utxos);
    table.insert(PrivacyMetric::NoKycedUtxos, analyzers::no_kyced_utxos);
    table
}

/// The analysis orchestrator: ensures the output cache is fresh, loads the
/// transaction's wire view and wallet-relative totals, and dispatches each
/// requested metric through a table built once at construction.
pub struct AnalysisEngine<'a, R: WalletReader> {
    reader: &'a R,
    gate: FreshnessGate<'a>,
    settings: AnalysisSettings,
    table: HashMap<PrivacyMetric, AnalyzerFn>,
}

impl<'a, R: WalletReader> AnalysisEngine<'a, R> {
    pub fn new(reader: &'a R, gate: FreshnessGate<'a>, settings: AnalysisSettings) -> Self {
        Self {
            reader,
            gate,
            settings,
            table: dispatch_table(),
        }
    }

    /// Run the requested metrics against one transaction. The result is a
    /// mapping with no ordering contract; absent wire view or totals make
    /// the affected analyzers fail closed rather than erroring.
    pub fn analyze(
        &self,
        txid: &str,
        metrics: &[PrivacyMetric],
    ) -> Result<BTreeMap<PrivacyMetric, bool>, ReadError> {
        self.gate.ensure_fresh()?;

        let tx = self.reader.transaction(txid)?;
        let totals = self.reader.totals(txid)?;
        let input = AnalyzerInput {
            tx: tx.as_ref(),
            totals: totals.as_ref(),
            reader: self.reader,
            settings: &self.settings,
        };

        let mut verdicts = BTreeMap::new();
        for metric in metrics {
            let analyzer = self.table[metric];
            verdicts.insert(*metric, analyzer(&input)?);
        }
        Ok(verdicts)
    }

    /// Run the full catalogue.
    pub fn analyze_all(&self, txid: &str) -> Result<BTreeMap<PrivacyMetric, bool>, ReadError> {
        self.analyze(txid, &PrivacyMetric::ALL)
    }

    /// Run metrics given by string id. Unknown ids are skipped from the
    /// result; each skip is logged so callers can spot typos.
    pub fn analyze_ids<S: AsRef<str>>(
        &self,
        txid: &str,
        ids: &[S],
    ) -> Result<BTreeMap<PrivacyMetric, bool>, ReadError> {
        let mut metrics = Vec::with_capacity(ids.len());
        for id in ids {
            match PrivacyMetric::from_id(id.as_ref()) {
                Some(metric) => metrics.push(metric),
                None => warn!("unknown metric id {:?}, skipping", id.as_ref()),
            }
        }
        self.analyze(txid, &metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ResourceKind, ScriptType, TrackedOutput, WalletTx};
    use crate::readers::memory::MemoryWallet;
    use crate::readers::FreshnessStore;
    use chrono::{Duration, Utc};

    fn engine<'a>(wallet: &'a MemoryWallet) -> AnalysisEngine<'a, MemoryWallet> {
        let gate = FreshnessGate::new(wallet, wallet, Duration::seconds(300));
        AnalysisEngine::new(wallet, gate, AnalysisSettings::default())
    }

    #[test]
    fn catalogue_has_thirteen_metrics() {
        assert_eq!(PrivacyMetric::ALL.len(), 13);
    }

    #[test]
    fn catalogue_matches_table_order() {
        let entries = PrivacyMetric::catalogue();
        assert_eq!(entries.len(), PrivacyMetric::ALL.len());
        for (entry, metric) in entries.iter().zip(PrivacyMetric::ALL) {
            assert_eq!(entry.id, metric.id());
            assert_eq!(entry.display_name, metric.display_name());
        }
    }

    #[test]
    fn metric_ids_unique_and_roundtrip() {
        let mut ids: Vec<&str> = PrivacyMetric::ALL.iter().map(|m| m.id()).collect();
        let len = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(len, ids.len());
        for metric in PrivacyMetric::ALL {
            assert_eq!(PrivacyMetric::from_id(metric.id()), Some(metric));
            assert!(!metric.display_name().is_empty());
            assert!(!metric.description().is_empty());
        }
        assert_eq!(PrivacyMetric::from_id("no_such_metric"), None);
    }

    #[test]
    fn dispatch_table_covers_catalogue() {
        let table = dispatch_table();
        for metric in PrivacyMetric::ALL {
            assert!(table.contains_key(&metric), "missing analyzer for {metric:?}");
        }
        assert_eq!(table.len(), PrivacyMetric::ALL.len());
    }

    #[test]
    fn metric_serializes_as_id() {
        let json = serde_json::to_string(&PrivacyMetric::NoKycedUtxos).unwrap();
        assert_eq!(json, "\"no_kyced_utxos\"");
    }

    #[test]
    fn unknown_transaction_fails_every_metric() {
        let wallet = MemoryWallet::new();
        let engine = engine(&wallet);
        let verdicts = engine.analyze_all("missing").unwrap();
        assert_eq!(verdicts.len(), 13);
        assert!(verdicts.values().all(|&v| !v));
    }

    #[test]
    fn analyze_runs_only_requested_metrics() {
        let wallet = MemoryWallet::new();
        let engine = engine(&wallet);
        let verdicts = engine
            .analyze("missing", &[PrivacyMetric::NoChange, PrivacyMetric::AnonymitySet])
            .unwrap();
        assert_eq!(verdicts.len(), 2);
        assert!(verdicts.contains_key(&PrivacyMetric::NoChange));
        assert!(verdicts.contains_key(&PrivacyMetric::AnonymitySet));
    }

    #[test]
    fn analyze_ids_drops_unknown() {
        let wallet = MemoryWallet::new();
        let engine = engine(&wallet);
        let verdicts = engine
            .analyze_ids("missing", &["no_change", "definitely_not_a_metric"])
            .unwrap();
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts.contains_key(&PrivacyMetric::NoChange));
    }

    #[test]
    fn stale_cache_triggers_one_refresh() {
        let wallet = MemoryWallet::new();
        let engine = engine(&wallet);
        engine.analyze_all("missing").unwrap();
        assert_eq!(wallet.refresh_calls(), 1);
        // Marker was just stamped; the second run skips the refresh.
        engine.analyze_all("missing").unwrap();
        assert_eq!(wallet.refresh_calls(), 1);
    }

    #[test]
    fn old_marker_refreshes_again() {
        let wallet = MemoryWallet::new();
        wallet
            .set_last_fetch(ResourceKind::Outputs, Utc::now() - Duration::seconds(600))
            .unwrap();
        let engine = engine(&wallet);
        engine.analyze_all("missing").unwrap();
        assert_eq!(wallet.refresh_calls(), 1);
    }

    #[test]
    fn known_transaction_gets_real_verdicts() {
        let mut wallet = MemoryWallet::new();
        let tx = WalletTx {
            txid: "tx".into(),
            inputs: Vec::new(),
            outputs: vec![TrackedOutput {
                txid: "tx".into(),
                vout: 0,
                value: 100_000_000,
                address: "bc1qreceive".into(),
                script_type: ScriptType::P2wpkh,
                is_mine: true,
                spent: false,
                simple_change: false,
                labels: Vec::new(),
            }],
        };
        let totals = crate::core::TxTotals {
            txid: "tx".into(),
            sent: 0,
            received: 100_000_000,
            fee: 0,
            height: 800_000,
        };
        wallet.add_tx(tx, totals);

        let engine = engine(&wallet);
        let verdicts = engine.analyze_all("tx").unwrap();
        // Pure receive: no change, nothing revealed.
        assert!(verdicts[&PrivacyMetric::NoChange]);
        assert!(verdicts[&PrivacyMetric::SameScriptTypes]);
        assert!(verdicts[&PrivacyMetric::MinimalWealthReveal]);
        assert!(verdicts[&PrivacyMetric::NoSmallChange]);
        // Lone output value, nothing to blend with.
        assert!(!verdicts[&PrivacyMetric::AnonymitySet]);
    }
}
