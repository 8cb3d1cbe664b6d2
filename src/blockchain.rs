// Thin re-export module: blocks, the ledger that applies them, and the
// block-level checks live in separate files under `blockchain/`.

pub mod block;
pub mod ledger;
pub mod validation;

pub use block::*;
pub use ledger::*;
pub use validation::*;
