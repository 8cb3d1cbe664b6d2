/// Transaction types for Ledgerchain
use crate::amount::Amount;
use crate::crypto::{Address, KeyPair, Sha256Hash};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain tag prefixed to every signed transfer message.
const TRANSFER_TAG: &[u8] = b"LEDGERCHAIN:TRANSFER:";

/// A signed value transfer between two addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender_address: Address,
    pub recipient_address: Address,
    pub value: Amount,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(with = "hex::serde")]
    pub sender_public_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Builds and signs a transfer stamped with the current time.
    pub fn create(
        sender_private_key: &KeyPair,
        sender_address: Address,
        recipient_address: Address,
        value: Amount,
    ) -> Result<Self, ChainError> {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        Self::create_at(
            sender_private_key,
            sender_address,
            recipient_address,
            value,
            timestamp,
        )
    }

    /// Builds and signs a transfer with an explicit timestamp.
    pub fn create_at(
        sender_private_key: &KeyPair,
        sender_address: Address,
        recipient_address: Address,
        value: Amount,
        timestamp: u64,
    ) -> Result<Self, ChainError> {
        if value.is_zero() {
            return Err(ChainError::InvalidInput(
                "Transfer value must be greater than zero".to_string(),
            ));
        }
        if sender_address == recipient_address {
            return Err(ChainError::InvalidInput(
                "Sender and recipient cannot be the same".to_string(),
            ));
        }
        if sender_private_key.address() != sender_address {
            return Err(ChainError::InvalidInput(format!(
                "Private key does not belong to sender address {}",
                sender_address
            )));
        }

        let message =
            Self::canonical_message(&sender_address, &recipient_address, value, timestamp);
        let signature = sender_private_key.sign(&message)?;

        Ok(Transaction {
            sender_address,
            recipient_address,
            value,
            timestamp,
            sender_public_key: sender_private_key.public_key_bytes().to_vec(),
            signature: signature.to_vec(),
        })
    }

    pub fn canonical_message(
        sender_address: &Address,
        recipient_address: &Address,
        value: Amount,
        timestamp: u64,
    ) -> Vec<u8> {
        let mut message = Vec::with_capacity(TRANSFER_TAG.len() + 32 + 32 + 8 + 8);
        message.extend_from_slice(TRANSFER_TAG);
        message.extend_from_slice(sender_address.as_bytes());
        message.extend_from_slice(recipient_address.as_bytes());
        message.extend_from_slice(&value.to_le_bytes());
        message.extend_from_slice(&timestamp.to_le_bytes());
        message
    }

    pub fn signable_message(&self) -> Vec<u8> {
        Self::canonical_message(
            &self.sender_address,
            &self.recipient_address,
            self.value,
            self.timestamp,
        )
    }

    /// Content hash identifying this transaction in the pool and the chain.
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.signable_message());
        hasher.update(&self.sender_public_key);
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }
}
