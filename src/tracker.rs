//! Bookkeeping for submitted transactions.
//!
//! The tracker never talks to the chain. A handle is reserved with
//! [`TransactionTracker::begin`] before signing, the node's answer comes back
//! through [`TransactionTracker::submitted`] and receipt outcomes through
//! [`TransactionTracker::observe`]. The refresh hooks for a transaction are
//! handed out on its first confirmation only.

use crate::chain::{
    SubmitError,
    TxKind,
    TxOutcome,
};
use alloy::primitives::TxHash;
use std::collections::{
    HashMap,
    VecDeque,
};
use tracing::{
    info,
    warn,
};

const SETTLED_HISTORY: usize = 32;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TxHandle(u64);

/// Screen a transaction was started from. One transaction per panel at a time.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Panel {
    Owner,
    Participant,
    Landing,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxStatus {
    /// Handed to the signer, no hash yet.
    Submitting,
    Pending,
    Confirmed,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RefreshHook {
    Owner,
    Balance,
    RemainingCount,
    History,
    ClearOwnerForm,
    LookupGrabAmount,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingTransaction {
    pub handle: TxHandle,
    pub hash: Option<TxHash>,
    pub kind: TxKind,
    pub panel: Panel,
    pub status: TxStatus,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Confirmation {
    pub handle: TxHandle,
    pub hash: TxHash,
    pub kind: TxKind,
    pub hooks: Vec<RefreshHook>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Submission {
    Accepted(PendingTransaction),
    Rejected { kind: TxKind, reason: String },
    Failed { kind: TxKind, error: SubmitError },
    /// Not a handle awaiting a submission result.
    Unknown,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Observation {
    Confirmed(Confirmation),
    Failed {
        hash: TxHash,
        kind: TxKind,
        reason: String,
    },
    /// Still pending, or already settled by an earlier observation.
    Unchanged,
}

#[derive(Debug)]
pub struct TransactionTracker {
    next_handle: u64,
    pending: HashMap<TxHandle, PendingTransaction>,
    settled: VecDeque<(TxHandle, TxStatus)>,
    hooks: HashMap<TxKind, Vec<RefreshHook>>,
}

impl Default for TransactionTracker {
    fn default() -> Self {
        let mut tracker = Self::empty();
        for hook in [RefreshHook::Owner] {
            tracker.register(TxKind::InitOwner, hook);
        }
        for hook in [
            RefreshHook::Balance,
            RefreshHook::RemainingCount,
            RefreshHook::History,
            RefreshHook::ClearOwnerForm,
        ] {
            tracker.register(TxKind::CreatePacket, hook);
        }
        for hook in [
            RefreshHook::RemainingCount,
            RefreshHook::Balance,
            RefreshHook::LookupGrabAmount,
        ] {
            tracker.register(TxKind::Grab, hook);
        }
        for hook in [
            RefreshHook::Owner,
            RefreshHook::Balance,
            RefreshHook::RemainingCount,
            RefreshHook::History,
        ] {
            tracker.register(TxKind::Reset, hook);
        }
        tracker
    }
}

impl TransactionTracker {
    pub fn empty() -> Self {
        Self {
            next_handle: 0,
            pending: HashMap::new(),
            settled: VecDeque::new(),
            hooks: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: TxKind, hook: RefreshHook) {
        let hooks = self.hooks.entry(kind).or_default();
        if !hooks.contains(&hook) {
            hooks.push(hook);
        }
    }

    pub fn is_busy(&self, panel: Panel) -> bool {
        self.pending.values().any(|tx| tx.panel == panel)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingTransaction> {
        self.pending.values()
    }

    pub fn status(&self, handle: TxHandle) -> Option<TxStatus> {
        if let Some(tx) = self.pending.get(&handle) {
            return Some(tx.status);
        }
        self.settled
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, status)| *status)
    }

    /// Reserves a handle for a transaction about to be signed and sent. The
    /// panel counts as busy from here on.
    pub fn begin(&mut self, panel: Panel, kind: TxKind) -> Result<TxHandle, SubmitError> {
        if self.is_busy(panel) {
            return Err(SubmitError::Busy);
        }
        let handle = TxHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.insert(handle, PendingTransaction {
            handle,
            hash: None,
            kind,
            panel,
            status: TxStatus::Submitting,
        });
        Ok(handle)
    }

    /// Records what the node answered for a reserved handle. A wallet rejection
    /// discards the handle entirely; any other error settles it as failed.
    pub fn submitted(
        &mut self,
        handle: TxHandle,
        result: Result<TxHash, SubmitError>,
    ) -> Submission {
        let Some(tx) = self
            .pending
            .get_mut(&handle)
            .filter(|tx| tx.status == TxStatus::Submitting)
        else {
            return Submission::Unknown;
        };
        match result {
            Ok(hash) => {
                tx.hash = Some(hash);
                tx.status = TxStatus::Pending;
                info!(?handle, %hash, kind = ?tx.kind, "transaction submitted");
                Submission::Accepted(tx.clone())
            }
            Err(SubmitError::Rejected(reason)) => {
                let kind = tx.kind;
                self.pending.remove(&handle);
                Submission::Rejected { kind, reason }
            }
            Err(error) => {
                let kind = tx.kind;
                warn!(?handle, %error, "transaction submission failed");
                self.settle(handle, TxStatus::Failed);
                Submission::Failed { kind, error }
            }
        }
    }

    /// Only handles the node has accepted can be confirmed or failed here.
    pub fn observe(&mut self, handle: TxHandle, outcome: TxOutcome) -> Observation {
        let Some(hash) = self
            .pending
            .get(&handle)
            .filter(|tx| tx.status == TxStatus::Pending)
            .and_then(|tx| tx.hash)
        else {
            return Observation::Unchanged;
        };
        match outcome {
            TxOutcome::Pending => Observation::Unchanged,
            TxOutcome::Confirmed { block } => {
                let Some(tx) = self.settle(handle, TxStatus::Confirmed) else {
                    return Observation::Unchanged;
                };
                info!(?handle, %hash, block, "transaction confirmed");
                let hooks = self.hooks.get(&tx.kind).cloned().unwrap_or_default();
                Observation::Confirmed(Confirmation {
                    handle,
                    hash,
                    kind: tx.kind,
                    hooks,
                })
            }
            TxOutcome::Failed { reason } => {
                let Some(tx) = self.settle(handle, TxStatus::Failed) else {
                    return Observation::Unchanged;
                };
                warn!(?handle, %hash, %reason, "transaction failed");
                Observation::Failed {
                    hash,
                    kind: tx.kind,
                    reason,
                }
            }
        }
    }

    fn settle(&mut self, handle: TxHandle, status: TxStatus) -> Option<PendingTransaction> {
        let mut tx = self.pending.remove(&handle)?;
        tx.status = status;
        self.settled.push_back((handle, status));
        if self.settled.len() > SETTLED_HISTORY {
            self.settled.pop_front();
        }
        Some(tx)
    }
}
