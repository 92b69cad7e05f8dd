//! Admission queue and nonce ledger.
//!
//! The [`AdmissionQueue`] buffers admitted actions between ticks. It is the
//! only state shared between submitters (which [`push`](AdmissionQueue::push)
//! from any thread at any time) and the tick loop (which
//! [`flush`](AdmissionQueue::flush)es once per tick).
//!
//! # Invariants
//!
//! - Actions leave the queue in the order they entered it.
//! - `push` and `flush` are serialized by one mutex. A push is ordered
//!   entirely before or entirely after any flush; it is never lost and never
//!   split across batches.
//! - `flush` drains the queue and commits every drained `(agent, nonce)`
//!   pair in the same critical section. Once committed, a nonce can never be
//!   admitted again for that agent.
//! - [`flush_with`](AdmissionQueue::flush_with) runs its hook inside the
//!   flush critical section and [`push_with`](AdmissionQueue::push_with)
//!   runs its observer inside the push critical section. A counter advanced
//!   by the hook therefore reads, from any observer, as exactly the number
//!   of flushes that happened before the push.
//! - Duplicate detection only consults *committed* nonces. Two pushes of
//!   the same `(agent, nonce)` inside one tick window are both accepted,
//!   because neither has been committed yet. Both end up in the same batch.
//!
//! # Memory
//!
//! The [`NonceLedger`] is never pruned while a world lives: it grows by one
//! entry per executed action. This unbounded growth is accepted. The ledger
//! size is exposed through [`AdmissionQueue::committed_nonce_count`] so it
//! can be monitored, and [`AdmissionQueue::clear`] releases it on world
//! teardown.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tickworld_types::{AgentAddress, SignedAction};

/// Errors raised when pushing onto the queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The nonce was already committed by an earlier tick.
    #[error("duplicate nonce {nonce} for agent {agent}")]
    DuplicateNonce {
        /// The submitting agent.
        agent: AgentAddress,
        /// The replayed nonce.
        nonce: u64,
    },
}

// ---------------------------------------------------------------------------
// NonceLedger
// ---------------------------------------------------------------------------

/// Per-agent sets of nonces committed by completed flushes.
#[derive(Debug, Default)]
pub struct NonceLedger {
    committed: BTreeMap<AgentAddress, BTreeSet<u64>>,
    total: usize,
}

impl NonceLedger {
    /// Whether `nonce` has been committed for `agent`.
    pub fn contains(&self, agent: &AgentAddress, nonce: u64) -> bool {
        self.committed
            .get(agent)
            .is_some_and(|nonces| nonces.contains(&nonce))
    }

    /// Record a nonce as committed. Returns `false` if it already was.
    pub fn commit(&mut self, agent: AgentAddress, nonce: u64) -> bool {
        let inserted = self.committed.entry(agent).or_default().insert(nonce);
        if inserted {
            self.total = self.total.saturating_add(1);
        }
        inserted
    }

    /// Total number of committed nonces across all agents.
    pub const fn len(&self) -> usize {
        self.total
    }

    /// Whether nothing has been committed.
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of agents with at least one committed nonce.
    pub fn agent_count(&self) -> usize {
        self.committed.len()
    }

    /// Forget every committed nonce.
    pub fn clear(&mut self) {
        self.committed.clear();
        self.total = 0;
    }
}

// ---------------------------------------------------------------------------
// AdmissionQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct QueueState {
    pending: Vec<SignedAction>,
    ledger: NonceLedger,
}

/// FIFO buffer of admitted actions awaiting the next tick.
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    state: Mutex<QueueState>,
}

impl AdmissionQueue {
    /// Create an empty queue with an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // Nothing panics while the lock is held, but a poisoned lock must not
    // wedge admission for the rest of the world's life.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an action to the tail of the queue.
    ///
    /// Returns the queue length after the push.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::DuplicateNonce`] if the action's nonce has
    /// already been committed for its agent.
    pub fn push(&self, action: SignedAction) -> Result<usize, QueueError> {
        self.push_with(action, || ()).map(|(len, ())| len)
    }

    /// Like [`push`](Self::push), but also runs `observe` while the lock is
    /// held and returns its value with the queue length.
    ///
    /// `observe` runs only when the push succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::DuplicateNonce`] if the action's nonce has
    /// already been committed for its agent.
    pub fn push_with<T>(
        &self,
        action: SignedAction,
        observe: impl FnOnce() -> T,
    ) -> Result<(usize, T), QueueError> {
        let mut state = self.lock();
        if state.ledger.contains(&action.agent_address, action.nonce) {
            return Err(QueueError::DuplicateNonce {
                agent: action.agent_address,
                nonce: action.nonce,
            });
        }
        state.pending.push(action);
        Ok((state.pending.len(), observe()))
    }

    /// Remove and return every queued action, committing their nonces.
    pub fn flush(&self) -> Vec<SignedAction> {
        Self::drain(&mut self.lock())
    }

    /// Run `before` under the lock, then flush only if it succeeded.
    ///
    /// On error the queue and the ledger are left untouched.
    ///
    /// # Errors
    ///
    /// Returns whatever `before` returns.
    pub fn flush_with<T, E>(
        &self,
        before: impl FnOnce() -> Result<T, E>,
    ) -> Result<(T, Vec<SignedAction>), E> {
        let mut state = self.lock();
        let value = before()?;
        Ok((value, Self::drain(&mut state)))
    }

    fn drain(state: &mut QueueState) -> Vec<SignedAction> {
        let batch = std::mem::take(&mut state.pending);
        for action in &batch {
            state.ledger.commit(action.agent_address, action.nonce);
        }
        batch
    }

    /// Number of actions waiting for the next tick.
    pub fn size(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of nonces committed so far, across all agents.
    pub fn committed_nonce_count(&self) -> usize {
        self.lock().ledger.len()
    }

    /// Discard all queued actions and wipe the nonce ledger.
    ///
    /// Only for world teardown: after this, previously executed actions
    /// could be admitted again.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.pending.clear();
        state.ledger.clear();
    }
}
