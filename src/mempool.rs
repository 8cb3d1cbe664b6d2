//! Pool of signature-valid transactions waiting for a block

use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::transaction::Transaction;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
struct PoolInner {
    /// Insertion order, used for deterministic block assembly.
    transactions: Vec<Transaction>,
    hashes: HashSet<Sha256Hash>,
}

/// Thread-safe mempool keyed by transaction content hash.
///
/// The ordered list and the hash index sit behind one lock, so `submit` and
/// `drain_for_block` are mutually exclusive: a transaction either lands before a
/// drain and is taken by it, or lands after and waits for the next one.
#[derive(Debug, Default)]
pub struct TransactionPool {
    inner: Mutex<PoolInner>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies `tx` and appends it to the pool.
    ///
    /// Does not look at the sender's balance; that is enforced when the block is applied.
    pub fn submit(&self, tx: Transaction) -> Result<(), ChainError> {
        tx.validate()?;

        let hash = tx.hash();
        let mut inner = self.inner.lock();
        if !inner.hashes.insert(hash) {
            return Err(ChainError::DuplicateTransaction(tx.hash_str()));
        }
        debug!(hash = %tx.hash_str(), value = %tx.value, "mempool.submit");
        inner.transactions.push(tx);
        Ok(())
    }

    /// Removes and returns every pooled transaction in insertion order.
    pub fn drain_for_block(&self) -> Vec<Transaction> {
        let mut inner = self.inner.lock();
        inner.hashes.clear();
        std::mem::take(&mut inner.transactions)
    }

    /// Ordered copy of the pool; does not mutate it.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.inner.lock().transactions.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &Sha256Hash) -> bool {
        self.inner.lock().hashes.contains(hash)
    }

    pub fn get(&self, hash: &Sha256Hash) -> Option<Transaction> {
        self.inner
            .lock()
            .transactions
            .iter()
            .find(|tx| &tx.hash() == hash)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::{Address, KeyPair};
    use std::sync::Arc;
    use std::thread;

    fn transfer(from: &KeyPair, value: u64, timestamp: u64) -> Transaction {
        Transaction::create_at(
            from,
            from.address(),
            Address::from_bytes([0x42; 32]),
            Amount::from_units(value),
            timestamp,
        )
        .unwrap()
    }

    #[test]
    fn test_submit_and_snapshot() {
        let pool = TransactionPool::new();
        let sender = KeyPair::generate().unwrap();
        let tx = transfer(&sender, 5, 1);

        pool.submit(tx.clone()).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&tx.hash()));
        assert_eq!(pool.get(&tx.hash()), Some(tx.clone()));
        assert_eq!(pool.snapshot(), vec![tx]);
        // Snapshot leaves the pool untouched.
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected_once() {
        let pool = TransactionPool::new();
        let sender = KeyPair::generate().unwrap();
        let tx = transfer(&sender, 5, 1);

        pool.submit(tx.clone()).unwrap();
        let err = pool.submit(tx).unwrap_err();
        assert!(matches!(err, ChainError::DuplicateTransaction(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let pool = TransactionPool::new();
        let sender = KeyPair::generate().unwrap();
        let mut tx = transfer(&sender, 5, 1);
        tx.value = Amount::from_units(500);

        assert!(matches!(pool.submit(tx), Err(ChainError::InvalidSignature(_))));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_drain_empties_pool_in_order() {
        let pool = TransactionPool::new();
        let sender = KeyPair::generate().unwrap();
        let txs: Vec<_> = (0..5).map(|i| transfer(&sender, 1 + i, i)).collect();
        for tx in &txs {
            pool.submit(tx.clone()).unwrap();
        }

        assert_eq!(pool.drain_for_block(), txs);
        assert!(pool.is_empty());
        assert!(pool.drain_for_block().is_empty());

        // A drained transaction may be pooled again; the ledger rejects replays.
        pool.submit(txs[0].clone()).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_concurrent_submissions_then_drain() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 25;

        let pool = Arc::new(TransactionPool::new());
        let sender = KeyPair::generate().unwrap();
        let txs: Vec<Vec<Transaction>> = (0..THREADS)
            .map(|t| {
                (0..PER_THREAD)
                    .map(|i| transfer(&sender, 1, t * PER_THREAD + i))
                    .collect()
            })
            .collect();

        let handles: Vec<_> = txs
            .iter()
            .cloned()
            .map(|batch| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for tx in batch {
                        pool.submit(tx.clone()).unwrap();
                        // Every thread also races a duplicate of its own transaction.
                        assert!(pool.submit(tx).is_err());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = pool.drain_for_block();
        assert!(pool.is_empty());
        assert_eq!(drained.len() as u64, THREADS * PER_THREAD);

        let unique: HashSet<_> = drained.iter().map(|tx| tx.hash()).collect();
        assert_eq!(unique.len(), drained.len());

        // Each thread's submissions keep their relative order.
        for batch in &txs {
            let positions: Vec<_> = batch
                .iter()
                .map(|tx| drained.iter().position(|d| d == tx).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_drains_racing_submissions_lose_nothing() {
        const TOTAL: u64 = 200;

        let pool = Arc::new(TransactionPool::new());
        let sender = KeyPair::generate().unwrap();
        let txs: Vec<_> = (0..TOTAL).map(|i| transfer(&sender, 1, i)).collect();

        let submitter = {
            let pool = Arc::clone(&pool);
            let txs = txs.clone();
            thread::spawn(move || {
                for tx in txs {
                    pool.submit(tx).unwrap();
                }
            })
        };
        let drainer = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut batches = Vec::new();
                for _ in 0..50 {
                    batches.push(pool.drain_for_block());
                    thread::yield_now();
                }
                batches
            })
        };

        submitter.join().unwrap();
        let mut seen: Vec<Transaction> = drainer.join().unwrap().into_iter().flatten().collect();
        seen.extend(pool.drain_for_block());

        assert_eq!(seen, txs);
    }
}
