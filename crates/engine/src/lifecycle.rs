//! Transaction lifecycle tracking.
//!
//! A [`LifecycleController`] owns the state machine of one logical action:
//!
//! ```text
//! idle --begin--> pending --broadcast--> confirming --receipt ok--> success
//!                    |                       |
//!                    +------- failure -------+-----------------> error
//! success | error --reset (manual or after the display window)--> idle
//! ```
//!
//! Terminal side effects fire at most once per outcome. The outcome is
//! keyed by transaction hash, or by submission attempt when the action
//! failed before a hash existed. Resetting only clears local tracking: a
//! transaction that was already broadcast may still land afterwards, and
//! its late result is dropped as stale.

use crate::call::CallError;
use crate::types::TxHash;
use crate::wallet::WalletError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State of the current logical transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TxState {
    #[default]
    Idle,
    /// Waiting for the wallet to sign and broadcast.
    Pending,
    /// Broadcast; waiting for block inclusion.
    Confirming,
    Success,
    Error,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Success | TxState::Error)
    }

    /// Pending or confirming.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TxState::Pending | TxState::Confirming)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxState::Idle => write!(f, "idle"),
            TxState::Pending => write!(f, "pending"),
            TxState::Confirming => write!(f, "confirming"),
            TxState::Success => write!(f, "success"),
            TxState::Error => write!(f, "error"),
        }
    }
}

/// Why a transaction ended in [`TxState::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    /// Non-atomic fallback only: calls before `failed_at` already landed.
    #[error("call {failed_at} of {total} failed after {landed} landed on-chain: {reason}")]
    PartialBatch {
        failed_at: usize,
        total: usize,
        landed: usize,
        reason: Box<TxError>,
    },

    #[error("failed to build calls: {0}")]
    Build(String),

    /// The controller was reset before call `0` (1-based) was sent.
    #[error("reset before call {0} was sent")]
    Abandoned(usize),
}

impl From<CallError> for TxError {
    fn from(err: CallError) -> Self {
        TxError::Build(err.to_string())
    }
}

/// Errors returned when driving the state machine out of order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("a transaction is already {0}")]
    Busy(TxState),

    #[error("submission {0} is no longer current")]
    Stale(u64),
}

/// Identifies one terminal outcome for idempotency purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKey {
    Hash(TxHash),
    /// Failures that happened before any hash was known.
    Attempt(u64),
}

/// Remembers the last outcome whose side effects already ran.
#[derive(Debug, Default, Clone)]
pub struct ProcessedHashes {
    last_success: Option<EffectKey>,
    last_error: Option<EffectKey>,
}

impl ProcessedHashes {
    /// Record a success; returns false if `key` was already processed.
    pub fn mark_success(&mut self, key: EffectKey) -> bool {
        if self.last_success == Some(key) {
            return false;
        }
        self.last_success = Some(key);
        true
    }

    /// Record a failure; returns false if `key` was already processed.
    pub fn mark_error(&mut self, key: EffectKey) -> bool {
        if self.last_error == Some(key) {
            return false;
        }
        self.last_error = Some(key);
        true
    }
}

/// Point-in-time view of a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxSnapshot {
    pub state: TxState,
    /// Hash of the last broadcast transaction of this attempt.
    pub hash: Option<TxHash>,
    pub error: Option<TxError>,
    /// Submission counter; increases on every `begin`.
    pub attempt: u64,
}

impl TxSnapshot {
    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.state == TxState::Pending
    }

    pub fn is_confirming(&self) -> bool {
        self.state == TxState::Confirming
    }

    pub fn is_success(&self) -> bool {
        self.state == TxState::Success
    }

    pub fn is_error(&self) -> bool {
        self.state == TxState::Error
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.is_in_flight()
    }

    pub fn effect_key(&self) -> EffectKey {
        match self.hash {
            Some(hash) => EffectKey::Hash(hash),
            None => EffectKey::Attempt(self.attempt),
        }
    }
}

/// Side effects run once per terminal outcome: refetching balances,
/// showing a result banner, clearing inputs.
pub trait TerminalEffects: Send + Sync {
    fn on_success(&self, snapshot: &TxSnapshot);

    fn on_error(&self, _snapshot: &TxSnapshot) {}
}

type EffectFn = Box<dyn Fn(&TxSnapshot) + Send + Sync>;

/// [`TerminalEffects`] assembled from closures.
#[derive(Default)]
pub struct EffectFns {
    success: Option<EffectFn>,
    error: Option<EffectFn>,
}

impl EffectFns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl Fn(&TxSnapshot) + Send + Sync + 'static) -> Self {
        self.success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&TxSnapshot) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl TerminalEffects for EffectFns {
    fn on_success(&self, snapshot: &TxSnapshot) {
        if let Some(f) = &self.success {
            f(snapshot);
        }
    }

    fn on_error(&self, snapshot: &TxSnapshot) {
        if let Some(f) = &self.error {
            f(snapshot);
        }
    }
}

/// Token returned by [`LifecycleController::begin`]; later transitions
/// must present it so results of a reset attempt are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    attempt: u64,
}

impl Submission {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

struct Inner {
    snapshot: TxSnapshot,
    /// Attempt whose results are still accepted; cleared by a reset.
    active: Option<u64>,
    processed: ProcessedHashes,
    reset_timer: Option<JoinHandle<()>>,
}

struct Shared {
    name: &'static str,
    display_window: Option<Duration>,
    inner: Mutex<Inner>,
    effects: Mutex<Vec<Arc<dyn TerminalEffects>>>,
    updates: watch::Sender<TxSnapshot>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.get_mut().reset_timer.take() {
            timer.abort();
        }
    }
}

/// State machine for one logical action. Clones share the same state.
#[derive(Clone)]
pub struct LifecycleController {
    shared: Arc<Shared>,
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("name", &self.shared.name)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl LifecycleController {
    /// Create a controller that resets itself `display_window` after
    /// reaching a terminal state.
    pub fn new(name: &'static str, display_window: Duration) -> Self {
        Self::build(name, Some(display_window))
    }

    /// Create a controller that stays terminal until [`reset`](Self::reset).
    pub fn manual(name: &'static str) -> Self {
        Self::build(name, None)
    }

    fn build(name: &'static str, display_window: Option<Duration>) -> Self {
        let (updates, _) = watch::channel(TxSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                name,
                display_window,
                inner: Mutex::new(Inner {
                    snapshot: TxSnapshot::default(),
                    active: None,
                    processed: ProcessedHashes::default(),
                    reset_timer: None,
                }),
                effects: Mutex::new(Vec::new()),
                updates,
            }),
        }
    }

    /// Register side effects for terminal states.
    pub fn add_effects(&self, effects: Arc<dyn TerminalEffects>) {
        self.shared.effects.lock().push(effects);
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn snapshot(&self) -> TxSnapshot {
        self.shared.inner.lock().snapshot.clone()
    }

    pub fn state(&self) -> TxState {
        self.shared.inner.lock().snapshot.state
    }

    pub fn error(&self) -> Option<TxError> {
        self.shared.inner.lock().snapshot.error.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == TxState::Idle
    }

    /// Whether `submission` is still the tracked attempt. False once the
    /// controller was reset, even before the next `begin`.
    pub fn is_current(&self, submission: &Submission) -> bool {
        self.shared.inner.lock().active == Some(submission.attempt)
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TxSnapshot> {
        self.shared.updates.subscribe()
    }

    /// `idle -> pending`. Refused while any transaction is tracked.
    pub fn begin(&self) -> Result<Submission, LifecycleError> {
        let mut inner = self.shared.inner.lock();
        let state = inner.snapshot.state;
        if state != TxState::Idle {
            return Err(LifecycleError::Busy(state));
        }

        let attempt = inner.snapshot.attempt + 1;
        inner.snapshot = TxSnapshot {
            state: TxState::Pending,
            hash: None,
            error: None,
            attempt,
        };
        inner.active = Some(attempt);
        debug!(action = self.shared.name, attempt, "transaction pending");
        self.publish(&inner);
        Ok(Submission { attempt })
    }

    /// `pending -> confirming` once `hash` is known. Calling it again while
    /// confirming tracks the newest hash of a sequential batch.
    pub fn broadcast(&self, submission: &Submission, hash: TxHash) -> Result<(), LifecycleError> {
        let mut inner = self.shared.inner.lock();
        self.check_current(&inner, submission)?;
        if !inner.snapshot.state.is_in_flight() {
            return Err(LifecycleError::Stale(submission.attempt));
        }

        inner.snapshot.state = TxState::Confirming;
        inner.snapshot.hash = Some(hash);
        debug!(action = self.shared.name, %hash, "transaction broadcast");
        self.publish(&inner);
        Ok(())
    }

    /// `confirming -> success`.
    pub fn succeed(&self, submission: &Submission) -> Result<(), LifecycleError> {
        self.settle(submission, TxState::Success, None)
    }

    /// `pending | confirming -> error`.
    pub fn fail(&self, submission: &Submission, error: TxError) -> Result<(), LifecycleError> {
        self.settle(submission, TxState::Error, Some(error))
    }

    fn settle(
        &self,
        submission: &Submission,
        state: TxState,
        error: Option<TxError>,
    ) -> Result<(), LifecycleError> {
        {
            let mut inner = self.shared.inner.lock();
            if let Err(err) = self.check_current(&inner, submission) {
                warn!(
                    action = self.shared.name,
                    attempt = submission.attempt,
                    outcome = %state,
                    "dropping result of a transaction that was reset locally"
                );
                return Err(err);
            }
            if !inner.snapshot.state.is_in_flight() {
                return Err(LifecycleError::Stale(submission.attempt));
            }

            inner.snapshot.state = state;
            inner.snapshot.error = error;
            match &inner.snapshot.error {
                Some(err) => warn!(action = self.shared.name, hash = ?inner.snapshot.hash, %err, "transaction failed"),
                None => info!(action = self.shared.name, hash = ?inner.snapshot.hash, "transaction succeeded"),
            }
            self.publish(&inner);
        }

        self.observe();
        Ok(())
    }

    /// Evaluate the current snapshot and run terminal side effects if this
    /// outcome has not been processed yet. Safe to call on every render;
    /// returns whether effects ran.
    pub fn observe(&self) -> bool {
        let snapshot = {
            let mut inner = self.shared.inner.lock();
            let snapshot = inner.snapshot.clone();
            let key = snapshot.effect_key();
            let fresh = match snapshot.state {
                TxState::Success => inner.processed.mark_success(key),
                TxState::Error => inner.processed.mark_error(key),
                _ => false,
            };
            if !fresh {
                return false;
            }
            self.schedule_reset(&mut inner, snapshot.attempt);
            snapshot
        };

        // Effects run without holding the state lock so they may read the
        // controller or reset it.
        let effects = self.shared.effects.lock().clone();
        debug!(
            action = self.shared.name,
            state = %snapshot.state,
            effects = effects.len(),
            "running terminal effects"
        );
        for effect in effects {
            match snapshot.state {
                TxState::Success => effect.on_success(&snapshot),
                _ => effect.on_error(&snapshot),
            }
        }
        true
    }

    /// Force the controller back to idle and cancel any pending auto-reset.
    /// A no-op when already idle. Does not unsend a broadcast transaction.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        if let Some(timer) = inner.reset_timer.take() {
            timer.abort();
        }
        if inner.snapshot.state == TxState::Idle {
            return;
        }
        if inner.snapshot.state.is_in_flight() {
            warn!(
                action = self.shared.name,
                hash = ?inner.snapshot.hash,
                "reset while in flight; the transaction may still land"
            );
        }
        self.clear(&mut inner);
    }

    fn clear(&self, inner: &mut Inner) {
        inner.active = None;
        inner.snapshot.state = TxState::Idle;
        inner.snapshot.hash = None;
        inner.snapshot.error = None;
        debug!(action = self.shared.name, "reset to idle");
        self.publish(inner);
    }

    fn check_current(&self, inner: &Inner, submission: &Submission) -> Result<(), LifecycleError> {
        if inner.active != Some(submission.attempt) {
            return Err(LifecycleError::Stale(submission.attempt));
        }
        Ok(())
    }

    fn publish(&self, inner: &Inner) {
        self.shared.updates.send_replace(inner.snapshot.clone());
    }

    fn schedule_reset(&self, inner: &mut Inner, attempt: u64) {
        let Some(window) = self.shared.display_window else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(action = self.shared.name, "no runtime; auto-reset disabled");
            return;
        };

        if let Some(timer) = inner.reset_timer.take() {
            timer.abort();
        }
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        inner.reset_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(shared) = weak.upgrade() {
                LifecycleController { shared }.expire(attempt);
            }
        }));
    }

    /// Auto-reset fired by the display timer of `attempt`.
    fn expire(&self, attempt: u64) {
        let mut inner = self.shared.inner.lock();
        if inner.active != Some(attempt) || !inner.snapshot.state.is_terminal() {
            return;
        }
        // This runs inside the timer task itself; drop the handle without aborting.
        inner.reset_timer.take();
        self.clear(&mut inner);
    }
}
