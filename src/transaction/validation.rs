/// Validation logic for transactions separated from type definitions
use crate::crypto::{verify_signature, Address};
use crate::error::ChainError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Stateless validation: value, addresses, key binding and signature.
    /// Does NOT check the sender's balance; the ledger does that when a block is applied.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.value.is_zero() {
            return Err(ChainError::InvalidInput(
                "Transfer value must be greater than zero".to_string(),
            ));
        }
        if self.sender_address == self.recipient_address {
            return Err(ChainError::InvalidInput(
                "Sender and recipient cannot be the same".to_string(),
            ));
        }

        if Address::from_public_key(&self.sender_public_key) != self.sender_address {
            return Err(ChainError::InvalidSignature(format!(
                "Public key does not hash to sender address {}",
                self.sender_address
            )));
        }

        let message = self.signable_message();
        verify_signature(&self.sender_public_key, &message, &self.signature)
    }

    /// True iff [`Transaction::validate`] passes. Pure.
    pub fn verify(&self) -> bool {
        self.validate().is_ok()
    }
}
