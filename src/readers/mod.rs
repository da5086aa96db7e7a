pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::{ResourceKind, TrackedOutput, TxTotals, WalletTx};

/// Failure at a collaborator seam. Missing rows are not errors (readers
/// return `Ok(None)` / empty); this covers the store or wallet engine
/// itself failing, which propagates to the orchestrator's caller.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("wallet engine error: {0}")]
    Wallet(String),
    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

/// Read access to fetched transactions and their wallet-relative totals.
pub trait TransactionReader {
    fn transaction(&self, txid: &str) -> Result<Option<WalletTx>, ReadError>;
    fn totals(&self, txid: &str) -> Result<Option<TxTotals>, ReadError>;
}

/// Read access to the wallet's output store. All queries are point-in-time
/// reads over an externally synced snapshot; nothing here mutates.
pub trait OutputReader {
    /// Resolve one output by outpoint.
    fn output(&self, txid: &str, vout: u32) -> Result<Option<TrackedOutput>, ReadError>;

    /// Wallet-owned outputs consumed as inputs by `txid`, resolved against
    /// the output store.
    fn wallet_inputs(&self, txid: &str) -> Result<Vec<TrackedOutput>, ReadError>;

    /// Wallet-owned outputs created by `txid`, in vout order.
    fn wallet_outputs(&self, txid: &str) -> Result<Vec<TrackedOutput>, ReadError>;

    /// Unspent wallet outputs confirmed strictly below `height`.
    fn unspent_outputs_below_height(&self, height: u32) -> Result<Vec<TrackedOutput>, ReadError>;

    /// Whether `address` received a wallet output in any transaction other
    /// than `exclude_txid`.
    fn is_address_reused(&self, address: &str, exclude_txid: &str) -> Result<bool, ReadError>;

    /// Count of historical change outputs, optionally restricted to one
    /// output position.
    fn count_change_outputs(&self, vout: Option<u32>) -> Result<u64, ReadError>;

    /// Count of all known outputs (any ownership) carrying exactly `value`.
    fn count_outputs_with_value(&self, value: u64) -> Result<u64, ReadError>;
}

/// Last-refresh bookkeeping per resource type.
pub trait FreshnessStore {
    fn last_fetch(&self, kind: ResourceKind) -> Result<Option<DateTime<Utc>>, ReadError>;
    fn set_last_fetch(&self, kind: ResourceKind, when: DateTime<Utc>) -> Result<(), ReadError>;
}

/// Re-syncs the output store from the wallet engine. Implementations talk
/// to the external wallet/blockchain stack; the core only waits on them.
pub trait OutputRefresher {
    fn refresh_outputs(&self) -> Result<(), ReadError>;
}

/// Everything the analysis engine reads.
pub trait WalletReader: TransactionReader + OutputReader {}

impl<T: TransactionReader + OutputReader> WalletReader for T {}

/// Refresher for stores that are synced out-of-band.
pub struct NullRefresher;

impl OutputRefresher for NullRefresher {
    fn refresh_outputs(&self) -> Result<(), ReadError> {
        Ok(())
    }
}
