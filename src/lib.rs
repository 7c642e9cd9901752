//! Append-only, hash-linked ledger of opaque payloads sealed by proof-of-work.
//!
//! - [`blockchain`] - block model, wire codec, miner, validation and the chain itself
//! - [`store`] - ordered persistence keyed by height (RocksDB, in-memory)
//! - [`api`] - HTTP facade for listing and submitting blocks
//! - [`wallet`] - key generation and payload signatures
//! - [`config`] / [`error`]

#![forbid(unsafe_code)]

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod store;
pub mod wallet;
