// src/lib.rs
//! # Credential Anchor
//!
//! Issues academic credential records and anchors a content fingerprint of
//! each one on an EVM ledger, so a certificate can be checked against the
//! ledger independently of the issuing database.
//!
//! ## Layers
//! 1. **Models**: credential fields, records and verification reports
//! 2. **Storage**: record store and rendered certificate artifacts
//! 3. **Blockchain**: the ledger capability and its EVM implementation
//! 4. **Services**: issuance, verification and the HTTP API

pub mod blockchain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
