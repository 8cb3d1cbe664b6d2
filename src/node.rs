use crate::amount::{Amount, AmountInput};
use crate::blockchain::Ledger;
use crate::config::NodeConfig;
use crate::crypto::{Address, KeyPair, Sha256Hash, Wallet};
use crate::error::ChainError;
use crate::mempool::TransactionPool;
use crate::transaction::Transaction;
use crate::validator::{CycleOutcome, Validator};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Transfer request as submitted by a wallet client.
///
/// Fields are optional so a missing one is reported as invalid input rather than a
/// decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    pub sender_private_key: Option<String>,
    pub sender_address: Option<String>,
    pub recipient_address: Option<String>,
    pub value: Option<AmountInput>,
}

impl TransactionRequest {
    pub fn into_transaction(self) -> Result<Transaction, ChainError> {
        let (Some(private_key), Some(sender), Some(recipient), Some(value)) = (
            self.sender_private_key,
            self.sender_address,
            self.recipient_address,
            self.value,
        ) else {
            return Err(ChainError::InvalidInput(
                "field(s) are missing in transaction request".to_string(),
            ));
        };

        let keypair = KeyPair::from_secret_hex(&private_key)?;
        let sender = Address::from_hex(&sender)?;
        let recipient = Address::from_hex(&recipient)?;
        let value = value.parse()?;
        Transaction::create(&keypair, sender, recipient, value)
    }
}

/// A single ledger node: the ledger, its mempool and the validator that links them.
pub struct Node {
    pub config: NodeConfig,
    pub ledger: Arc<Ledger>,
    pub pool: Arc<TransactionPool>,
    pub validator: Validator,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self, ChainError> {
        config.validate()?;

        let reward = config.validator.block_reward()?;
        let ledger = Ledger::new(config.genesis.allocations()?)?;
        let ledger = Arc::new(match &reward {
            Some(reward) => ledger.with_block_reward(reward.amount),
            None => ledger,
        });
        let pool = Arc::new(TransactionPool::new());
        let validator = Validator::new(
            ledger.clone(),
            pool.clone(),
            config.validator.interval()?,
            config.validator.producer.clone(),
            reward.map(|r| r.address),
        );

        info!(
            producer = %config.validator.producer,
            interval = %config.validator.interval,
            genesis = %ledger.tip().hash_str(),
            "node.initialised"
        );

        Ok(Self {
            config,
            ledger,
            pool,
            validator,
        })
    }

    pub fn create_wallet(&self) -> Result<Wallet, ChainError> {
        Wallet::generate()
    }

    /// Builds, signs and pools a transfer from a client request.
    pub fn submit_request(&self, request: TransactionRequest) -> Result<Sha256Hash, ChainError> {
        let tx = request.into_transaction()?;
        let hash = tx.hash();
        self.submit_transaction(tx)?;
        Ok(hash)
    }

    /// Pools an already-signed transaction, e.g. one built by `ledgerchain-wallet sign`.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        if self.ledger.is_confirmed(&tx.hash()) {
            warn!(hash = %tx.hash_str(), "node.replay_rejected");
            return Err(ChainError::DuplicateTransaction(tx.hash_str()));
        }
        self.pool.submit(tx)
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.ledger.balance_of(address)
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.pool.snapshot()
    }

    pub async fn start_validation(&self) -> bool {
        self.validator.start().await
    }

    pub async fn stop_validation(&self) -> bool {
        self.validator.stop().await
    }

    /// Runs one production cycle now, off the async workers.
    pub async fn validate_once(&self) -> CycleOutcome {
        self.validator.produce_block_now().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationConfig;

    fn node_with(allocations: Vec<(&Wallet, &str)>) -> Node {
        let mut config = NodeConfig::default();
        config.genesis.allocations = allocations
            .into_iter()
            .map(|(w, amount)| AllocationConfig {
                address: w.address.to_hex(),
                amount: amount.to_string(),
            })
            .collect();
        Node::new(config).unwrap()
    }

    fn request(from: &Wallet, to: &Wallet, value: &str) -> TransactionRequest {
        TransactionRequest {
            sender_private_key: Some(from.private_key.clone()),
            sender_address: Some(from.address.to_hex()),
            recipient_address: Some(to.address.to_hex()),
            value: Some(AmountInput::Text(value.to_string())),
        }
    }

    #[test]
    fn test_submit_request_pools_signed_transfer() {
        let alice = Wallet::generate().unwrap();
        let bob = Wallet::generate().unwrap();
        let node = node_with(vec![(&alice, "100")]);

        let hash = node.submit_request(request(&alice, &bob, "40")).unwrap();
        let pending = node.pending_transactions();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].hash(), hash);
        assert!(pending[0].verify());
    }

    #[test]
    fn test_submit_request_rejects_bad_fields() {
        let alice = Wallet::generate().unwrap();
        let bob = Wallet::generate().unwrap();
        let node = node_with(vec![(&alice, "100")]);

        for value in ["-1", "abc", "0", "1.123456789"] {
            let err = node.submit_request(request(&alice, &bob, value)).unwrap_err();
            assert!(matches!(err, ChainError::InvalidInput(_)), "{}: {:?}", value, err);
        }

        let mut missing = request(&alice, &bob, "1");
        missing.recipient_address = None;
        assert!(matches!(node.submit_request(missing), Err(ChainError::InvalidInput(_))));

        let mut bad_key = request(&alice, &bob, "1");
        bad_key.sender_private_key = Some(bob.private_key.clone());
        assert!(node.submit_request(bad_key).is_err());

        assert!(node.pending_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_transaction_cannot_be_resubmitted() {
        let alice = Wallet::generate().unwrap();
        let bob = Wallet::generate().unwrap();
        let node = node_with(vec![(&alice, "100")]);

        node.submit_request(request(&alice, &bob, "10")).unwrap();
        let tx = node.pending_transactions().remove(0);
        node.validate_once().await;

        assert!(matches!(
            node.submit_transaction(tx),
            Err(ChainError::DuplicateTransaction(_))
        ));
        assert_eq!(node.balance_of(&bob.address), Amount::from_coins(10).unwrap());
    }

    #[tokio::test]
    async fn test_configured_reward_goes_to_reward_address() {
        let alice = Wallet::generate().unwrap();
        let bob = Wallet::generate().unwrap();
        let producer = Wallet::generate().unwrap();

        let mut config = NodeConfig::default();
        config.genesis.allocations = vec![AllocationConfig {
            address: alice.address.to_hex(),
            amount: "100".to_string(),
        }];
        config.validator.reward_address = Some(producer.address.to_hex());
        config.validator.reward = "0.5".to_string();
        let node = Node::new(config).unwrap();

        node.submit_request(request(&alice, &bob, "10")).unwrap();
        node.validate_once().await;

        assert_eq!(node.balance_of(&producer.address), Amount::from_units(50_000_000));
        assert_eq!(node.ledger.total_supply(), Amount::from_units(10_050_000_000));
    }
}
