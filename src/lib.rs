//! Ledgerchain - a minimal account-based ledger node with a switchable validator
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, chain linkage and the balance ledger
//! - [`transaction`] - Signed transfers and their verification
//! - [`mempool`] - Pending transaction pool
//! - [`amount`] - Fixed-point coin amounts
//!
//! ## Block Production
//! - [`validator`] - Background block producer with start/stop control
//!
//! ## Cryptography
//! - [`crypto`] - Keys, addresses and signatures (secp256k1)
//!
//! ## Node & Integration
//! - [`node`] - The node façade shared by the API and binaries
//! - [`api`] - REST API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod amount;
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Block Production
// ============================================================================
pub mod validator;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Node & Integration
// ============================================================================
pub mod node;

#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
