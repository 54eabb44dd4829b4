use thiserror::Error;

/// First integrity failure found while replaying a chain. `position` is the
/// block's slot in the chain, `index` the block's own index field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Block #{index} has invalid hash (stored {stored}, computed {computed})")]
    InvalidHash {
        position: usize,
        index: u64,
        stored: String,
        computed: String,
    },
    #[error("Block #{index} has incorrect previous hash (expected {expected}, found {found})")]
    BrokenLink {
        position: usize,
        index: u64,
        expected: String,
        found: String,
    },
}

impl ValidationError {
    pub fn position(&self) -> usize {
        match self {
            ValidationError::InvalidHash { position, .. }
            | ValidationError::BrokenLink { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("no block at position {0}")]
    NoSuchBlock(usize),
}
