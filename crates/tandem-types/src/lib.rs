//! Foundation types for Tandem.
//!
//! Every other Tandem crate depends on `tandem-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: 256-bit content address, rendered as 64 lowercase hex characters

pub mod digest;
pub mod error;

pub use digest::Digest;
pub use error::TypeError;
