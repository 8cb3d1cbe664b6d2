//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::{Address, KeyPair};
    use crate::error::ChainError;

    fn coins(n: u64) -> Amount {
        Amount::from_coins(n).unwrap()
    }

    fn signed_transfer(value: Amount) -> (KeyPair, Transaction) {
        let sender = KeyPair::generate().unwrap();
        let recipient = KeyPair::generate().unwrap().address();
        let tx = Transaction::create(&sender, sender.address(), recipient, value).unwrap();
        (sender, tx)
    }

    #[test]
    fn test_created_transaction_verifies() {
        for _ in 0..8 {
            let (_, tx) = signed_transfer(coins(40));
            assert!(tx.verify());
            assert!(tx.validate().is_ok());
        }
    }

    #[test]
    fn test_tampered_fields_fail_verification() {
        let (_, tx) = signed_transfer(coins(40));
        let other = KeyPair::generate().unwrap().address();

        let mut t = tx.clone();
        t.value = coins(41);
        assert!(!t.verify());

        let mut t = tx.clone();
        t.recipient_address = other;
        assert!(!t.verify());

        let mut t = tx.clone();
        t.sender_address = other;
        assert!(!t.verify());

        let mut t = tx.clone();
        t.timestamp += 1;
        assert!(!t.verify());

        let mut t = tx.clone();
        t.signature[10] ^= 0xff;
        assert!(!t.verify());

        let mut t = tx;
        t.sender_public_key = KeyPair::generate().unwrap().public_key_bytes().to_vec();
        assert!(!t.verify());
    }

    #[test]
    fn test_resigned_by_stranger_fails() {
        // A stranger signs a transfer out of someone else's address with their own key.
        let (_, tx) = signed_transfer(coins(5));
        let stranger = KeyPair::generate().unwrap();
        let mut forged = tx.clone();
        forged.sender_public_key = stranger.public_key_bytes().to_vec();
        forged.signature = stranger.sign(&forged.signable_message()).unwrap().to_vec();

        assert!(matches!(forged.validate(), Err(ChainError::InvalidSignature(_))));
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let sender = KeyPair::generate().unwrap();
        let recipient = KeyPair::generate().unwrap().address();

        let zero = Transaction::create(&sender, sender.address(), recipient, Amount::ZERO);
        assert!(matches!(zero, Err(ChainError::InvalidInput(_))));

        let self_send = Transaction::create(&sender, sender.address(), sender.address(), coins(1));
        assert!(matches!(self_send, Err(ChainError::InvalidInput(_))));

        let wrong_key = Transaction::create(&sender, recipient, sender.address(), coins(1));
        assert!(matches!(wrong_key, Err(ChainError::InvalidInput(_))));
    }

    #[test]
    fn test_hash_distinguishes_timestamps() {
        let sender = KeyPair::generate().unwrap();
        let recipient = Address::from_bytes([7; 32]);
        let a = Transaction::create_at(&sender, sender.address(), recipient, coins(1), 1_000).unwrap();
        let b = Transaction::create_at(&sender, sender.address(), recipient, coins(1), 1_001).unwrap();

        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.clone().hash());
        assert_eq!(a.hash_str().len(), 64);
    }

    #[test]
    fn test_json_shape() {
        let (_, tx) = signed_transfer(coins(2));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["sender_address"], tx.sender_address.to_hex());
        assert_eq!(json["value"], 2 * crate::amount::UNITS_PER_COIN);
        assert!(json["signature"].is_string());

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
        assert!(back.verify());
    }
}
