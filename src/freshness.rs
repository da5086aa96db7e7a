use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::core::ResourceKind;
use crate::readers::{FreshnessStore, OutputRefresher, ReadError};

/// Default staleness bound for the output cache.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Cache-invalidation policy for wallet outputs: refresh from the wallet
/// engine when the last fetch is absent or older than the interval.
///
/// Single-process policy. Two callers hitting a stale cache concurrently
/// may both trigger a refresh; the refresh is idempotent, so the duplicate
/// work is tolerated rather than serialized.
pub struct FreshnessGate<'a> {
    store: &'a dyn FreshnessStore,
    refresher: &'a dyn OutputRefresher,
    interval: Duration,
}

impl<'a> FreshnessGate<'a> {
    pub fn new(
        store: &'a dyn FreshnessStore,
        refresher: &'a dyn OutputRefresher,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            interval,
        }
    }

    pub fn with_default_interval(
        store: &'a dyn FreshnessStore,
        refresher: &'a dyn OutputRefresher,
    ) -> Self {
        Self::new(
            store,
            refresher,
            Duration::seconds(DEFAULT_REFRESH_INTERVAL_SECS as i64),
        )
    }

    /// Refresh the output cache if it is stale, then stamp the marker.
    pub fn ensure_fresh(&self) -> Result<(), ReadError> {
        let now = Utc::now();
        if let Some(last) = self.store.last_fetch(ResourceKind::Outputs)? {
            if now - last <= self.interval {
                debug!("output cache fresh, last fetch {last}");
                return Ok(());
            }
            info!("output cache stale since {last}, refreshing");
        } else {
            info!("output cache never fetched, refreshing");
        }
        self.refresher.refresh_outputs()?;
        self.store.set_last_fetch(ResourceKind::Outputs, Utc::now())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::memory::MemoryWallet;

    #[test]
    fn missing_marker_refreshes() {
        let wallet = MemoryWallet::new();
        let gate = FreshnessGate::with_default_interval(&wallet, &wallet);
        gate.ensure_fresh().unwrap();
        assert_eq!(wallet.refresh_calls(), 1);
        assert!(wallet.last_fetch(ResourceKind::Outputs).unwrap().is_some());
    }

    #[test]
    fn fresh_marker_skips_refresh() {
        let wallet = MemoryWallet::new();
        wallet.set_last_fetch(ResourceKind::Outputs, Utc::now()).unwrap();
        let gate = FreshnessGate::with_default_interval(&wallet, &wallet);
        gate.ensure_fresh().unwrap();
        assert_eq!(wallet.refresh_calls(), 0);
    }

    #[test]
    fn stale_marker_refreshes_and_restamps() {
        let wallet = MemoryWallet::new();
        let old = Utc::now() - Duration::seconds(301);
        wallet.set_last_fetch(ResourceKind::Outputs, old).unwrap();
        let gate = FreshnessGate::with_default_interval(&wallet, &wallet);
        gate.ensure_fresh().unwrap();
        assert_eq!(wallet.refresh_calls(), 1);
        let stamped = wallet.last_fetch(ResourceKind::Outputs).unwrap().unwrap();
        assert!(stamped > old);
    }

    #[test]
    fn boundary_age_counts_as_fresh() {
        let wallet = MemoryWallet::new();
        wallet
            .set_last_fetch(ResourceKind::Outputs, Utc::now() - Duration::seconds(299))
            .unwrap();
        let gate = FreshnessGate::with_default_interval(&wallet, &wallet);
        gate.ensure_fresh().unwrap();
        assert_eq!(wallet.refresh_calls(), 0);
    }

    #[test]
    fn transactions_marker_does_not_satisfy_outputs() {
        let wallet = MemoryWallet::new();
        wallet
            .set_last_fetch(ResourceKind::Transactions, Utc::now())
            .unwrap();
        let gate = FreshnessGate::with_default_interval(&wallet, &wallet);
        gate.ensure_fresh().unwrap();
        assert_eq!(wallet.refresh_calls(), 1);
    }
}
