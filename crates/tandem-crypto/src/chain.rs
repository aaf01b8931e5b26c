use tandem_types::Digest;

use crate::hasher::HasherError;

/// An entry in a singly-linked hash chain.
pub trait HashLinked {
    /// The entry's own digest as recorded.
    fn link_id(&self) -> Digest;
    /// The recorded parent digest (None for the first entry).
    fn parent_id(&self) -> Option<Digest>;
    /// Recompute the entry's digest from its contents.
    fn recompute_id(&self) -> Result<Digest, HasherError>;
}

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of entries forms a valid chain: the first entry
/// has no parent, each later entry's parent matches the previous entry's id,
/// and each entry's id is correctly computed from its contents.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify a chain, oldest entry first. An empty chain is valid.
    pub fn verify_chain(entries: &[impl HashLinked]) -> Result<(), ChainError> {
        let mut previous: Option<Digest> = None;
        for (index, entry) in entries.iter().enumerate() {
            match (previous, entry.parent_id()) {
                (None, Some(_)) => return Err(ChainError::GenesisHasParent),
                (Some(_), None) => return Err(ChainError::MissingParent { index }),
                (Some(expected), Some(actual)) if expected != actual => {
                    return Err(ChainError::BrokenLink { index });
                }
                _ => {}
            }

            let computed = entry
                .recompute_id()
                .map_err(|e| ChainError::Hashing { index, reason: e.to_string() })?;
            if computed != entry.link_id() {
                return Err(ChainError::HashMismatch { index });
            }
            previous = Some(entry.link_id());
        }
        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first entry has a parent (should be None)")]
    GenesisHasParent,

    #[error("broken link at index {index}: parent does not match previous id")]
    BrokenLink { index: usize },

    #[error("missing parent at index {index} (should reference previous entry)")]
    MissingParent { index: usize },

    #[error("hash mismatch at index {index}: computed digest differs from stored")]
    HashMismatch { index: usize },

    #[error("could not hash entry {index}: {reason}")]
    Hashing { index: usize, reason: String },
}
