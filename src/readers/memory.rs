use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::core::{ResourceKind, TrackedOutput, TxTotals, WalletTx};
use crate::readers::{
    FreshnessStore, OutputReader, OutputRefresher, ReadError, TransactionReader,
};

/// In-memory wallet snapshot implementing every reader seam. Ships as a
/// real module so embedders can drive the engine without a database; the
/// query counters let tests observe short-circuit and refresh behavior.
#[derive(Default)]
pub struct MemoryWallet {
    outputs: Vec<TrackedOutput>,
    txs: Vec<WalletTx>,
    totals: Vec<TxTotals>,
    markers: RefCell<HashMap<ResourceKind, DateTime<Utc>>>,
    reuse_queries: Cell<u64>,
    refresh_calls: Cell<u64>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an output the wallet knows about (its own or observed).
    pub fn add_output(&mut self, output: TrackedOutput) {
        self.outputs.push(output);
    }

    /// Register a transaction's wire view together with its totals.
    pub fn add_tx(&mut self, tx: WalletTx, totals: TxTotals) {
        for out in &tx.outputs {
            self.outputs.push(out.clone());
        }
        self.txs.push(tx);
        self.totals.push(totals);
    }

    /// Register totals alone, for outputs whose wire view is irrelevant.
    pub fn add_totals(&mut self, totals: TxTotals) {
        self.totals.push(totals);
    }

    /// How many address-reuse lookups have been issued.
    pub fn reuse_queries(&self) -> u64 {
        self.reuse_queries.get()
    }

    /// How many times `refresh_outputs` ran.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.get()
    }

    fn height_of(&self, txid: &str) -> Option<u32> {
        self.totals.iter().find(|t| t.txid == txid).map(|t| t.height)
    }
}

impl TransactionReader for MemoryWallet {
    fn transaction(&self, txid: &str) -> Result<Option<WalletTx>, ReadError> {
        Ok(self.txs.iter().find(|t| t.txid == txid).cloned())
    }

    fn totals(&self, txid: &str) -> Result<Option<TxTotals>, ReadError> {
        Ok(self.totals.iter().find(|t| t.txid == txid).cloned())
    }
}

impl OutputReader for MemoryWallet {
    fn output(&self, txid: &str, vout: u32) -> Result<Option<TrackedOutput>, ReadError> {
        Ok(self
            .outputs
            .iter()
            .find(|o| o.txid == txid && o.vout == vout)
            .cloned())
    }

    fn wallet_inputs(&self, txid: &str) -> Result<Vec<TrackedOutput>, ReadError> {
        let Some(tx) = self.txs.iter().find(|t| t.txid == txid) else {
            return Ok(Vec::new());
        };
        let mut inputs = Vec::new();
        for inp in &tx.inputs {
            if let Some(out) = self
                .outputs
                .iter()
                .find(|o| o.txid == inp.prev_txid && o.vout == inp.prev_vout && o.is_mine)
            {
                inputs.push(out.clone());
            }
        }
        Ok(inputs)
    }

    fn wallet_outputs(&self, txid: &str) -> Result<Vec<TrackedOutput>, ReadError> {
        let mut outs: Vec<TrackedOutput> = self
            .outputs
            .iter()
            .filter(|o| o.txid == txid && o.is_mine)
            .cloned()
            .collect();
        outs.sort_by_key(|o| o.vout);
        Ok(outs)
    }

    fn unspent_outputs_below_height(&self, height: u32) -> Result<Vec<TrackedOutput>, ReadError> {
        Ok(self
            .outputs
            .iter()
            .filter(|o| {
                o.is_mine
                    && !o.spent
                    && self.height_of(&o.txid).is_some_and(|h| h < height)
            })
            .cloned()
            .collect())
    }

    fn is_address_reused(&self, address: &str, exclude_txid: &str) -> Result<bool, ReadError> {
        self.reuse_queries.set(self.reuse_queries.get() + 1);
        Ok(self
            .outputs
            .iter()
            .any(|o| o.is_mine && o.address == address && o.txid != exclude_txid))
    }

    fn count_change_outputs(&self, vout: Option<u32>) -> Result<u64, ReadError> {
        Ok(self
            .outputs
            .iter()
            .filter(|o| o.simple_change && vout.is_none_or(|v| o.vout == v))
            .count() as u64)
    }

    fn count_outputs_with_value(&self, value: u64) -> Result<u64, ReadError> {
        Ok(self.outputs.iter().filter(|o| o.value == value).count() as u64)
    }
}

impl FreshnessStore for MemoryWallet {
    fn last_fetch(&self, kind: ResourceKind) -> Result<Option<DateTime<Utc>>, ReadError> {
        Ok(self.markers.borrow().get(&kind).copied())
    }

    fn set_last_fetch(&self, kind: ResourceKind, when: DateTime<Utc>) -> Result<(), ReadError> {
        self.markers.borrow_mut().insert(kind, when);
        Ok(())
    }
}

impl OutputRefresher for MemoryWallet {
    fn refresh_outputs(&self) -> Result<(), ReadError> {
        self.refresh_calls.set(self.refresh_calls.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ScriptType, TrackedInput};

    fn output(txid: &str, vout: u32, value: u64, is_mine: bool) -> TrackedOutput {
        TrackedOutput {
            txid: txid.into(),
            vout,
            value,
            address: format!("addr_{txid}_{vout}"),
            script_type: ScriptType::P2wpkh,
            is_mine,
            spent: false,
            simple_change: false,
            labels: Vec::new(),
        }
    }

    fn totals(txid: &str, sent: u64, received: u64, height: u32) -> TxTotals {
        TxTotals {
            txid: txid.into(),
            sent,
            received,
            fee: 1_000,
            height,
        }
    }

    #[test]
    fn wallet_inputs_resolve_only_mine() {
        let mut wallet = MemoryWallet::new();
        wallet.add_output(output("funding", 0, 50_000, true));
        wallet.add_output(output("funding", 1, 60_000, false));
        let tx = WalletTx {
            txid: "spend".into(),
            inputs: vec![
                TrackedInput { prev_txid: "funding".into(), prev_vout: 0 },
                TrackedInput { prev_txid: "funding".into(), prev_vout: 1 },
                TrackedInput { prev_txid: "unknown".into(), prev_vout: 0 },
            ],
            outputs: vec![],
        };
        wallet.add_tx(tx, totals("spend", 50_000, 0, 800_000));

        let inputs = wallet.wallet_inputs("spend").unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].value, 50_000);
    }

    #[test]
    fn unspent_below_height_filters_spent_and_height() {
        let mut wallet = MemoryWallet::new();
        let mut old_spent = output("old", 0, 10_000, true);
        old_spent.spent = true;
        wallet.add_output(old_spent);
        wallet.add_output(output("old", 1, 20_000, true));
        wallet.add_output(output("new", 0, 30_000, true));
        wallet.add_totals(totals("old", 0, 30_000, 700_000));
        wallet.add_totals(totals("new", 0, 30_000, 800_000));

        let utxos = wallet.unspent_outputs_below_height(750_000).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].value, 20_000);
    }

    #[test]
    fn reuse_query_counts_and_excludes_self() {
        let mut wallet = MemoryWallet::new();
        let mut a = output("t1", 0, 1_000, true);
        a.address = "bc1qshared".into();
        let mut b = output("t2", 0, 2_000, true);
        b.address = "bc1qshared".into();
        wallet.add_output(a);
        wallet.add_output(b);

        assert!(wallet.is_address_reused("bc1qshared", "t1").unwrap());
        assert!(!wallet.is_address_reused("bc1qother", "t1").unwrap());
        assert_eq!(wallet.reuse_queries(), 2);
    }

    #[test]
    fn freshness_markers_roundtrip() {
        let wallet = MemoryWallet::new();
        assert!(wallet.last_fetch(ResourceKind::Outputs).unwrap().is_none());
        let now = Utc::now();
        wallet.set_last_fetch(ResourceKind::Outputs, now).unwrap();
        assert_eq!(wallet.last_fetch(ResourceKind::Outputs).unwrap(), Some(now));
        assert!(wallet.last_fetch(ResourceKind::Transactions).unwrap().is_none());
    }

    #[test]
    fn value_counts_span_all_ownership() {
        let mut wallet = MemoryWallet::new();
        wallet.add_output(output("t1", 0, 5_000, true));
        wallet.add_output(output("t2", 0, 5_000, false));
        wallet.add_output(output("t3", 0, 7_000, true));
        assert_eq!(wallet.count_outputs_with_value(5_000).unwrap(), 2);
        assert_eq!(wallet.count_outputs_with_value(9_999).unwrap(), 0);
    }
}
