pub mod script;

use serde::{Deserialize, Serialize};

/// Locking-script category of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    OpReturn,
    Unknown,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::P2pkh => "p2pkh",
            ScriptType::P2sh => "p2sh",
            ScriptType::P2wpkh => "p2wpkh",
            ScriptType::P2wsh => "p2wsh",
            ScriptType::P2tr => "p2tr",
            ScriptType::OpReturn => "op_return",
            ScriptType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "p2pkh" => ScriptType::P2pkh,
            "p2sh" => ScriptType::P2sh,
            "p2wpkh" => ScriptType::P2wpkh,
            "p2wsh" => ScriptType::P2wsh,
            "p2tr" => ScriptType::P2tr,
            "op_return" => ScriptType::OpReturn,
            _ => ScriptType::Unknown,
        }
    }
}

/// A wallet-assigned annotation on an output. Attached many-to-many;
/// consumed by the label-exclusion metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLabel {
    DoNotSpend,
    Kyced,
}

impl OutputLabel {
    pub const ALL: [OutputLabel; 2] = [OutputLabel::DoNotSpend, OutputLabel::Kyced];

    pub fn id(&self) -> &'static str {
        match self {
            OutputLabel::DoNotSpend => "do-not-spend",
            OutputLabel::Kyced => "kyced",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OutputLabel::DoNotSpend => "Do not spend",
            OutputLabel::Kyced => "KYCed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OutputLabel::DoNotSpend => "Marked by the user as never to be spent",
            OutputLabel::Kyced => "Traceable to an identity-verified source",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.id() == id)
    }
}

/// An output known to the wallet's store. Doubles as the wire-view output
/// of a [`WalletTx`] and as the store record; `is_mine` separates outputs
/// the wallet controls from counterparty outputs it merely observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedOutput {
    pub txid: String,
    pub vout: u32,
    pub value: u64, // sats
    pub address: String,
    pub script_type: ScriptType,
    pub is_mine: bool,
    pub spent: bool,
    /// Set only when this output was heuristically identified as the single
    /// plain change output of its transaction.
    pub simple_change: bool,
    pub labels: Vec<OutputLabel>,
}

impl TrackedOutput {
    pub fn has_label(&self, label: OutputLabel) -> bool {
        self.labels.contains(&label)
    }
}

/// A wire-order input: the outpoint it consumes. Values and ownership are
/// resolved against the output store, not carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedInput {
    pub prev_txid: String,
    pub prev_vout: u32,
}

/// Wire view of a transaction: ordered inputs and outputs as broadcast.
/// Immutable once fetched; analyzers only borrow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTx {
    pub txid: String,
    pub inputs: Vec<TrackedInput>,
    pub outputs: Vec<TrackedOutput>,
}

impl WalletTx {
    /// Outputs the wallet controls, in wire order.
    pub fn mine(&self) -> impl Iterator<Item = &TrackedOutput> {
        self.outputs.iter().filter(|o| o.is_mine)
    }

    /// The at-most-one output flagged as the plain change of this tx.
    pub fn simple_change(&self) -> Option<&TrackedOutput> {
        self.outputs.iter().find(|o| o.simple_change)
    }
}

/// Wallet-relative aggregate of a transaction.
///
/// `sent == 0` means the wallet did not initiate the spend (pure receive).
/// `received` is the total value returned to the wallet; it covers change
/// and self-transfers indistinguishably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxTotals {
    pub txid: String,
    pub sent: u64,
    pub received: u64,
    pub fee: u64,
    /// Block height at which the transaction confirmed.
    pub height: u32,
}

impl TxTotals {
    /// Net amount that left the wallet toward other parties. Negative for
    /// receives and self-transfers that grew the wallet balance.
    pub fn sent_to_others(&self) -> i128 {
        self.sent as i128 - self.received as i128
    }

    /// A transaction that both spends wallet funds and returns wallet funds
    /// has change by definition.
    pub fn has_change(&self) -> bool {
        self.sent > 0 && self.received > 0
    }
}

/// Resource types tracked by the freshness store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Outputs,
    Transactions,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Outputs => "outputs",
            ResourceKind::Transactions => "transactions",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(value: u64, is_mine: bool) -> TrackedOutput {
        TrackedOutput {
            txid: "tx".into(),
            vout: 0,
            value,
            address: "bc1qtest".into(),
            script_type: ScriptType::P2wpkh,
            is_mine,
            spent: false,
            simple_change: false,
            labels: Vec::new(),
        }
    }

    #[test]
    fn mine_filters_ownership() {
        let tx = WalletTx {
            txid: "tx".into(),
            inputs: vec![],
            outputs: vec![output(100, true), output(200, false), output(300, true)],
        };
        let mine: Vec<u64> = tx.mine().map(|o| o.value).collect();
        assert_eq!(mine, vec![100, 300]);
    }

    #[test]
    fn simple_change_absent() {
        let tx = WalletTx {
            txid: "tx".into(),
            inputs: vec![],
            outputs: vec![output(100, true)],
        };
        assert!(tx.simple_change().is_none());
    }

    #[test]
    fn sent_to_others_signed() {
        let totals = TxTotals {
            txid: "tx".into(),
            sent: 1_000_000,
            received: 2_000_000,
            fee: 500,
            height: 800_000,
        };
        assert_eq!(totals.sent_to_others(), -1_000_000);
        assert!(totals.has_change());
    }

    #[test]
    fn pure_receive_has_no_change() {
        let totals = TxTotals {
            txid: "tx".into(),
            sent: 0,
            received: 100_000_000,
            fee: 0,
            height: 800_000,
        };
        assert!(!totals.has_change());
    }

    #[test]
    fn script_type_roundtrip() {
        for st in [
            ScriptType::P2pkh,
            ScriptType::P2sh,
            ScriptType::P2wpkh,
            ScriptType::P2wsh,
            ScriptType::P2tr,
            ScriptType::OpReturn,
        ] {
            assert_eq!(ScriptType::from_str(st.as_str()), st);
        }
        assert_eq!(ScriptType::from_str("garbage"), ScriptType::Unknown);
    }

    #[test]
    fn label_ids_unique() {
        let mut ids: Vec<&str> = OutputLabel::ALL.iter().map(|l| l.id()).collect();
        let len = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(len, ids.len());
    }

    #[test]
    fn label_from_id() {
        assert_eq!(OutputLabel::from_id("kyced"), Some(OutputLabel::Kyced));
        assert_eq!(OutputLabel::from_id("nope"), None);
    }
}
