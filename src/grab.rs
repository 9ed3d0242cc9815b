//! Resolving how much a confirmed grab paid out.
//!
//! The amount is picked by the contract at execution time and only becomes
//! visible once the indexer has processed the distribution event, which trails
//! chain confirmation by an unknown amount of time.

use crate::indexer_client::DistributionIndex;
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use std::time::Duration;
use tracing::{
    debug,
    warn,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GrabResult {
    pub amount: U256,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GrabLookupPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
    pub backoff_factor: u32,
}

impl Default for GrabLookupPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_attempts: 4,
            backoff_factor: 2,
        }
    }
}

impl GrabLookupPolicy {
    /// Wait before each attempt: `initial_delay * backoff_factor^n`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(move |attempt| {
            self.initial_delay
                .saturating_mul(self.backoff_factor.saturating_pow(attempt))
        })
    }

    /// Longest time after confirmation before the lookup gives up.
    pub fn max_staleness(&self) -> Duration {
        self.delays().fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Returns `None` when the indexer never reports the distribution within the
/// policy's bound. Indexer errors are logged and count as a missed attempt.
pub async fn lookup_grab_amount<I: DistributionIndex>(
    index: &I,
    policy: GrabLookupPolicy,
    recipient: Address,
    tx_hash: TxHash,
) -> Option<U256> {
    for (attempt, delay) in policy.delays().enumerate() {
        tokio::time::sleep(delay).await;
        match index.distribution_for(recipient, tx_hash).await {
            Ok(Some(record)) => {
                debug!(%tx_hash, attempt, amount = %record.amount, "grab amount indexed");
                return Some(record.amount);
            }
            Ok(None) => {
                debug!(%tx_hash, attempt, "grab not indexed yet");
            }
            Err(err) => {
                warn!(?err, %tx_hash, attempt, "grab amount lookup failed");
            }
        }
    }
    debug!(%tx_hash, "giving up on grab amount lookup");
    None
}
