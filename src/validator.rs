//! Block production: a switchable background task that turns the mempool into blocks
//!
//! The validator is an explicit two-state machine (`Stopped` / `Running`). Starting it
//! spawns one tokio task that runs a production cycle on every tick of a fixed interval;
//! stopping it signals that task over a watch channel and waits for it to exit. A cycle
//! never awaits, so a stop request always lands between cycles, never inside
//! `Ledger::apply_block`.

use crate::amount::Amount;
use crate::blockchain::{Allocation, Block, Ledger};
use crate::crypto::Address;
use crate::error::ChainError;
use crate::mempool::TransactionPool;
use crate::transaction::Transaction;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorState {
    Stopped,
    Running,
}

/// A pooled transaction that was dropped instead of being included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedTransaction {
    pub hash: String,
    pub reason: String,
}

/// Result of one production cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The pool was empty; no block was produced.
    Idle,
    Produced {
        height: u64,
        hash: String,
        transactions: usize,
        rejected: Vec<RejectedTransaction>,
    },
    /// Every drained transaction was rejected; no block was produced.
    Rejected { rejected: Vec<RejectedTransaction> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatorStatus {
    pub state: ValidatorState,
    pub interval_ms: u64,
    pub blocks_produced: u64,
    pub transactions_rejected: u64,
    pub last_failure: Option<String>,
}

/// State shared between the validator handle and its background task.
struct ProductionCore {
    ledger: Arc<Ledger>,
    pool: Arc<TransactionPool>,
    producer: String,
    reward_address: Option<Address>,
    /// Serialises cycles from the background task and from `produce_block` callers.
    production: Mutex<()>,
    running: AtomicBool,
    blocks_produced: AtomicU64,
    transactions_rejected: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

impl ProductionCore {
    fn produce_block(&self) -> CycleOutcome {
        let _cycle = self.production.lock();

        let drained = self.pool.drain_for_block();
        if drained.is_empty() {
            return CycleOutcome::Idle;
        }

        let mut rejected = Vec::new();
        let mut pending: Vec<Transaction> = Vec::with_capacity(drained.len());
        let mut running = HashMap::new();
        for tx in drained {
            if let Err(reason) = self.admit(&tx, &mut running) {
                self.reject(&tx, &reason, &mut rejected);
            } else {
                pending.push(tx);
            }
        }

        // Admission mirrors the ledger's balance rules, so the first block normally
        // applies. On a whole-block rejection drop the offending transaction and
        // reassemble from the rest until a block applies or nothing is left.
        while !pending.is_empty() {
            let block = self.assemble(pending.clone());
            let height = block.header.height;
            let hash = block.hash_str();

            match self.ledger.apply_block(block) {
                Ok(()) => {
                    self.blocks_produced.fetch_add(1, Ordering::SeqCst);
                    info!(
                        height,
                        hash = %hash,
                        transactions = pending.len(),
                        rejected = rejected.len(),
                        "validator.block_produced"
                    );
                    return CycleOutcome::Produced {
                        height,
                        hash,
                        transactions: pending.len(),
                        rejected,
                    };
                }
                Err(err) => {
                    let offending = err.offending_transaction().and_then(|bad| {
                        pending.iter().position(|tx| tx.hash_str() == bad)
                    });
                    match offending {
                        Some(index) => {
                            let tx = pending.remove(index);
                            self.reject(&tx, &err, &mut rejected);
                        }
                        None => {
                            // Not attributable to one transaction: the batch cannot be applied.
                            error!(error = %err, "validator.block_failed");
                            for tx in pending.drain(..) {
                                self.reject(&tx, &err, &mut rejected);
                            }
                        }
                    }
                }
            }
        }

        CycleOutcome::Rejected { rejected }
    }

    /// Per-transaction checks made before assembly so a bad entry can be dropped alone.
    ///
    /// `running` holds the balances this batch has touched so far; it is only updated
    /// for admitted transactions.
    fn admit(
        &self,
        tx: &Transaction,
        running: &mut HashMap<Address, Amount>,
    ) -> Result<(), ChainError> {
        tx.validate()?;
        if self.ledger.is_confirmed(&tx.hash()) {
            return Err(ChainError::DuplicateTransaction(tx.hash_str()));
        }

        let mut balance_of = |address: &Address| {
            *running
                .entry(*address)
                .or_insert_with(|| self.ledger.balance_of(address))
        };
        let sender_balance = balance_of(&tx.sender_address);
        let remaining =
            sender_balance
                .checked_sub(tx.value)
                .ok_or_else(|| ChainError::InsufficientFunds {
                    tx: tx.hash_str(),
                    address: tx.sender_address.to_hex(),
                    balance: sender_balance.to_string(),
                    required: tx.value.to_string(),
                })?;
        let credited = balance_of(&tx.recipient_address)
            .checked_add(tx.value)
            .ok_or_else(|| {
                ChainError::InvalidBlock(format!(
                    "Balance of {} would overflow in transaction {}",
                    tx.recipient_address,
                    tx.hash_str()
                ))
            })?;

        running.insert(tx.sender_address, remaining);
        running.insert(tx.recipient_address, credited);
        Ok(())
    }

    fn assemble(&self, transactions: Vec<Transaction>) -> Block {
        let block = self.ledger.next_block(transactions, &self.producer);
        let reward = self.ledger.block_reward();
        match self.reward_address {
            Some(address) if !reward.is_zero() => block.with_reward(Allocation {
                address,
                amount: reward,
            }),
            _ => block,
        }
    }

    fn reject(&self, tx: &Transaction, reason: &ChainError, rejected: &mut Vec<RejectedTransaction>) {
        warn!(hash = %tx.hash_str(), error = %reason, "validator.transaction_rejected");
        self.transactions_rejected.fetch_add(1, Ordering::SeqCst);
        *self.last_failure.lock() = Some(reason.to_string());
        rejected.push(RejectedTransaction {
            hash: tx.hash_str(),
            reason: reason.to_string(),
        });
    }
}

/// Runs a cycle off the async workers; signature checks make a cycle CPU-bound.
async fn run_cycle(core: Arc<ProductionCore>) -> CycleOutcome {
    match tokio::task::spawn_blocking(move || core.produce_block()).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => {
            // Only happens while the runtime shuts down, before the cycle started.
            warn!(error = %err, "validator.cycle_cancelled");
            CycleOutcome::Idle
        }
    }
}

struct Runner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Switchable block producer over a shared ledger and pool.
pub struct Validator {
    core: Arc<ProductionCore>,
    interval: Duration,
    runner: tokio::sync::Mutex<Option<Runner>>,
}

impl Validator {
    pub fn new(
        ledger: Arc<Ledger>,
        pool: Arc<TransactionPool>,
        interval: Duration,
        producer: impl Into<String>,
        reward_address: Option<Address>,
    ) -> Self {
        Self {
            core: Arc::new(ProductionCore {
                ledger,
                pool,
                producer: producer.into(),
                reward_address,
                production: Mutex::new(()),
                running: AtomicBool::new(false),
                blocks_produced: AtomicU64::new(0),
                transactions_rejected: AtomicU64::new(0),
                last_failure: Mutex::new(None),
            }),
            interval,
            runner: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ValidatorState {
        if self.core.running.load(Ordering::SeqCst) {
            ValidatorState::Running
        } else {
            ValidatorState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ValidatorState::Running
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts periodic production. Returns `false` if it was already running.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> bool {
        let mut runner = self.runner.lock().await;
        if runner.is_some() {
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let core = Arc::clone(&self.core);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let outcome = run_cycle(Arc::clone(&core)).await;
                        debug!(?outcome, "validator.cycle");
                    }
                }
            }
        });

        *runner = Some(Runner { shutdown, handle });
        self.core.running.store(true, Ordering::SeqCst);
        info!(interval_ms = self.interval.as_millis() as u64, "validator.started");
        true
    }

    /// Stops periodic production. Returns `false` if it was already stopped.
    ///
    /// Returns once the in-flight cycle, if any, has finished; no cycle starts afterwards.
    pub async fn stop(&self) -> bool {
        let mut runner = self.runner.lock().await;
        let Some(Runner { shutdown, handle }) = runner.take() else {
            return false;
        };

        // The runner is gone from here on, even if this future is dropped while
        // waiting for the task below.
        self.core.running.store(false, Ordering::SeqCst);

        // A send error means the task is already gone; awaiting the handle still reaps it.
        let _ = shutdown.send(true);
        if let Err(err) = handle.await {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }

        info!("validator.stopped");
        true
    }

    /// Runs one production cycle on the calling thread, whatever the current state.
    pub fn produce_block(&self) -> CycleOutcome {
        self.core.produce_block()
    }

    /// Runs one production cycle on tokio's blocking pool.
    pub async fn produce_block_now(&self) -> CycleOutcome {
        run_cycle(Arc::clone(&self.core)).await
    }

    pub fn status(&self) -> ValidatorStatus {
        ValidatorStatus {
            state: self.state(),
            interval_ms: self.interval.as_millis() as u64,
            blocks_produced: self.core.blocks_produced.load(Ordering::SeqCst),
            transactions_rejected: self.core.transactions_rejected.load(Ordering::SeqCst),
            last_failure: self.core.last_failure.lock().clone(),
        }
    }
}

impl Drop for Validator {
    fn drop(&mut self) {
        if let Some(runner) = self.runner.get_mut().take() {
            let _ = runner.shutdown.send(true);
        }
    }
}
