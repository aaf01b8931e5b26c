//! Content hashing for Tandem.
//!
//! Provides SHA-256 content addressing over the canonical JSON text of a
//! value, and verification of singly-linked hash chains.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod chain;
pub mod hasher;

pub use chain::{ChainError, ChainVerifier, HashLinked};
pub use hasher::{ContentHasher, HasherError};
