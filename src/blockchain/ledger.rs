use crate::amount::Amount;
use crate::blockchain::block::{Allocation, Block};
use crate::blockchain::validation::{validate_linkage, validate_no_duplicates};
use crate::crypto::{Address, Sha256Hash};
use crate::error::ChainError;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    balances: HashMap<Address, Amount>,
    blocks: Vec<Block>,
    /// Confirmed transaction hash -> height of the block that holds it.
    confirmed: HashMap<Sha256Hash, u64>,
    /// Sum of all balances; changes only through genesis and block rewards.
    supply: Amount,
}

impl LedgerState {
    fn balance_of(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(Amount::ZERO)
    }

    fn tip(&self) -> &Block {
        // The genesis block is pushed in `Ledger::new` and blocks are never removed.
        self.blocks
            .last()
            .expect("ledger invariant violated: chain has no genesis block")
    }
}

/// Account balances derived from an in-memory chain of blocks.
///
/// All mutation goes through [`Ledger::apply_block`], which commits under a single
/// write lock: readers see either the whole pre-block or the whole post-block state.
#[derive(Debug)]
pub struct Ledger {
    state: RwLock<LedgerState>,
    /// Exact reward a block may mint; zero forbids rewards.
    block_reward: Amount,
}

impl Ledger {
    /// Creates a ledger whose genesis block credits `allocations`.
    pub fn new(allocations: Vec<Allocation>) -> Result<Self, ChainError> {
        let mut balances: HashMap<Address, Amount> = HashMap::new();
        let mut supply = Amount::ZERO;
        for allocation in &allocations {
            supply = supply.checked_add(allocation.amount).ok_or_else(|| {
                ChainError::Config("Genesis allocations overflow the total supply".to_string())
            })?;
            let entry = balances.entry(allocation.address).or_default();
            *entry = entry.checked_add(allocation.amount).ok_or_else(|| {
                ChainError::Config(format!(
                    "Genesis allocations for {} overflow",
                    allocation.address
                ))
            })?;
        }

        let genesis = Block::genesis(allocations);
        info!(
            hash = %genesis.hash_str(),
            accounts = balances.len(),
            supply = %supply,
            "ledger.genesis"
        );

        Ok(Ledger {
            state: RwLock::new(LedgerState {
                balances,
                blocks: vec![genesis],
                confirmed: HashMap::new(),
                supply,
            }),
            block_reward: Amount::ZERO,
        })
    }

    /// Allows every produced block to mint exactly `reward`.
    pub fn with_block_reward(mut self, reward: Amount) -> Self {
        self.block_reward = reward;
        self
    }

    pub fn block_reward(&self) -> Amount {
        self.block_reward
    }

    /// Balance of `address`; unknown addresses hold zero.
    pub fn balance_of(&self, address: &Address) -> Amount {
        self.state.read().balance_of(address)
    }

    /// Height of the newest block (genesis is 0).
    pub fn height(&self) -> u64 {
        self.state.read().tip().header.height
    }

    pub fn tip(&self) -> Block {
        self.state.read().tip().clone()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.state.read().blocks.clone()
    }

    pub fn block_count(&self) -> usize {
        self.state.read().blocks.len()
    }

    pub fn block_at(&self, height: u64) -> Option<Block> {
        self.state.read().blocks.get(height as usize).cloned()
    }

    pub fn total_supply(&self) -> Amount {
        self.state.read().supply
    }

    pub fn is_confirmed(&self, hash: &Sha256Hash) -> bool {
        self.state.read().confirmed.contains_key(hash)
    }

    /// Looks up a confirmed transaction and the height of its block.
    pub fn find_transaction(&self, hash: &Sha256Hash) -> Option<(Transaction, u64)> {
        let state = self.state.read();
        let height = *state.confirmed.get(hash)?;
        state.blocks.get(height as usize)?.transactions.iter().find_map(|tx| {
            if &tx.hash() == hash {
                Some((tx.clone(), height))
            } else {
                None
            }
        })
    }

    /// Assembles a block on top of the current tip.
    pub fn next_block(&self, transactions: Vec<Transaction>, producer: &str) -> Block {
        let state = self.state.read();
        let tip = state.tip();
        Block::new(tip.header.height + 1, tip.hash(), producer, transactions)
    }

    /// Applies `block` atomically.
    ///
    /// The whole block is rejected if any transaction is invalid, already confirmed, or
    /// spends more than its sender holds at that point in the block, or if it mints
    /// anything other than the configured block reward. Nothing changes on rejection.
    pub fn apply_block(&self, block: Block) -> Result<(), ChainError> {
        let mut state = self.state.write();

        validate_linkage(state.tip(), &block)?;
        validate_no_duplicates(&block)?;

        let mut touched: HashMap<Address, Amount> = HashMap::new();
        for tx in &block.transactions {
            let tx_hash = tx.hash();
            if state.confirmed.contains_key(&tx_hash) {
                return Err(ChainError::DuplicateTransaction(tx.hash_str()));
            }
            tx.validate().map_err(|e| {
                ChainError::InvalidBlock(format!("Transaction {} is invalid: {}", tx.hash_str(), e))
            })?;

            let sender_balance = touched
                .get(&tx.sender_address)
                .copied()
                .unwrap_or_else(|| state.balance_of(&tx.sender_address));
            let remaining = sender_balance.checked_sub(tx.value).ok_or_else(|| {
                ChainError::InsufficientFunds {
                    tx: tx.hash_str(),
                    address: tx.sender_address.to_hex(),
                    balance: sender_balance.to_string(),
                    required: tx.value.to_string(),
                }
            })?;
            touched.insert(tx.sender_address, remaining);

            let recipient_balance = touched
                .get(&tx.recipient_address)
                .copied()
                .unwrap_or_else(|| state.balance_of(&tx.recipient_address));
            let credited = recipient_balance.checked_add(tx.value).ok_or_else(|| {
                ChainError::InvalidBlock(format!(
                    "Balance of {} would overflow in transaction {}",
                    tx.recipient_address,
                    tx.hash_str()
                ))
            })?;
            touched.insert(tx.recipient_address, credited);
        }

        let mut supply = state.supply;
        if let Some(reward) = &block.reward {
            if self.block_reward.is_zero() || reward.amount != self.block_reward {
                return Err(ChainError::InvalidBlock(format!(
                    "Block reward {} does not match the allowed reward {}",
                    reward.amount, self.block_reward
                )));
            }
            supply = supply.checked_add(reward.amount).ok_or_else(|| {
                ChainError::InvalidBlock("Block reward would overflow the total supply".to_string())
            })?;

            let balance = touched
                .get(&reward.address)
                .copied()
                .unwrap_or_else(|| state.balance_of(&reward.address));
            let credited = balance.checked_add(reward.amount).ok_or_else(|| {
                ChainError::InvalidBlock(format!("Balance of {} would overflow", reward.address))
            })?;
            touched.insert(reward.address, credited);
        }

        let height = block.header.height;
        state.supply = supply;
        for (address, balance) in touched {
            state.balances.insert(address, balance);
        }
        for tx in &block.transactions {
            state.confirmed.insert(tx.hash(), height);
        }
        debug!(
            height,
            hash = %block.hash_str(),
            transactions = block.transactions.len(),
            "ledger.block_applied"
        );
        state.blocks.push(block);

        Ok(())
    }
}
