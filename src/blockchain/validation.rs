use crate::blockchain::block::Block;
use crate::error::ChainError;
use std::collections::HashSet;

/// Checks that `block` extends the chain whose tip is `tip`.
pub fn validate_linkage(tip: &Block, block: &Block) -> Result<(), ChainError> {
    if block.header.height != tip.header.height + 1 {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid block height. Expected {}, but got {}.",
            tip.header.height + 1,
            block.header.height
        )));
    }

    if block.header.previous_hash != tip.hash() {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid previous block hash. Expected {}, but got {}.",
            tip.hash_str(),
            hex::encode(block.header.previous_hash)
        )));
    }

    if !block.allocations.is_empty() {
        return Err(ChainError::InvalidBlock(
            "Only the genesis block may allocate funds.".to_string(),
        ));
    }

    let expected_root = Block::calculate_transactions_root(
        &block.allocations,
        block.reward.as_ref(),
        &block.transactions,
    );
    if expected_root != block.header.transactions_root {
        return Err(ChainError::InvalidBlock(format!(
            "Transactions root mismatch. Expected {}, but got {}.",
            hex::encode(expected_root),
            hex::encode(block.header.transactions_root)
        )));
    }

    Ok(())
}

/// Rejects a block that contains the same transaction twice.
pub fn validate_no_duplicates(block: &Block) -> Result<(), ChainError> {
    let mut seen = HashSet::new();
    for tx in &block.transactions {
        if !seen.insert(tx.hash()) {
            return Err(ChainError::DuplicateTransaction(tx.hash_str()));
        }
    }
    Ok(())
}
