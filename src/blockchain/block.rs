use crate::amount::Amount;
use crate::crypto::{Address, Sha256Hash};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed timestamp of the genesis block (2023-01-01T00:00:00Z).
pub const GENESIS_TIMESTAMP: u64 = 1_672_531_200_000;

pub const GENESIS_PRODUCER: &str = "genesis";

/// Balance credited without a matching debit: a genesis allocation or a block reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub address: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: u64,
    #[serde(with = "hex::serde")]
    pub previous_hash: Sha256Hash,
    #[serde(with = "hex::serde")]
    pub transactions_root: Sha256Hash,
    pub producer: String,
}

impl BlockHeader {
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.transactions_root);
        hasher.update((self.producer.len() as u64).to_le_bytes());
        hasher.update(self.producer.as_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Only the genesis block may carry allocations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<Allocation>,
    /// Minted to the producer's reward address, credited after the transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Allocation>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        height: u64,
        previous_hash: Sha256Hash,
        producer: &str,
        transactions: Vec<Transaction>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let transactions_root = Block::calculate_transactions_root(&[], None, &transactions);

        Block {
            header: BlockHeader {
                height,
                timestamp,
                previous_hash,
                transactions_root,
                producer: producer.to_string(),
            },
            allocations: Vec::new(),
            reward: None,
            transactions,
        }
    }

    /// Attaches a block reward and recomputes the transactions root.
    pub fn with_reward(mut self, reward: Allocation) -> Self {
        self.header.transactions_root = Block::calculate_transactions_root(
            &self.allocations,
            Some(&reward),
            &self.transactions,
        );
        self.reward = Some(reward);
        self
    }

    pub fn genesis(allocations: Vec<Allocation>) -> Self {
        let transactions_root = Block::calculate_transactions_root(&allocations, None, &[]);
        Block {
            header: BlockHeader {
                height: 0,
                timestamp: GENESIS_TIMESTAMP,
                previous_hash: [0u8; 32],
                transactions_root,
                producer: GENESIS_PRODUCER.to_string(),
            },
            allocations,
            reward: None,
            transactions: Vec::new(),
        }
    }

    pub fn hash(&self) -> Sha256Hash {
        self.header.hash()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn calculate_transactions_root(
        allocations: &[Allocation],
        reward: Option<&Allocation>,
        transactions: &[Transaction],
    ) -> Sha256Hash {
        let mut hasher = Sha256::new();
        for allocation in allocations {
            hasher.update(allocation.address.as_bytes());
            hasher.update(allocation.amount.to_le_bytes());
        }
        if let Some(reward) = reward {
            hasher.update(b"reward");
            hasher.update(reward.address.as_bytes());
            hasher.update(reward.amount.to_le_bytes());
        }
        for tx in transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().into()
    }
}
