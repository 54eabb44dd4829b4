use crate::constants::{DEFAULT_DIFFICULTY, GENESIS_PREVIOUS_HASH};
use crate::error::{ChainError, ValidationError};
use crate::pow::{MiningReport, MiningStrategy};
use crate::{Block, Payload};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Leading hex zeros every appended block's hash must carry.
    pub difficulty: u32,
    pub strategy: MiningStrategy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            strategy: MiningStrategy::Sequential,
        }
    }
}

/// Whether [`Blockchain::simulate_tamper`] recomputes the tampered block's hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rehash {
    Recompute,
    Keep,
}

/// The genesis block: index 0, marker payload, sentinel predecessor. Never mined.
pub fn genesis_block() -> Block {
    Block::new(0, Payload::genesis(), Block::now(), GENESIS_PREVIOUS_HASH)
}

/// An owned, append-only sequence of blocks. Always holds at least the
/// genesis block.
///
/// `append` reads the tip, mines and then pushes, so it needs exclusive
/// access; `&mut self` gives that within one thread, callers sharing a chain
/// across threads wrap it in a lock.
#[derive(Clone, Debug, Serialize)]
pub struct Blockchain {
    chain: Vec<Block>,
    config: ChainConfig,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    pub fn new() -> Self {
        Self::with_config(ChainConfig::default())
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self::with_config(ChainConfig {
            difficulty,
            ..ChainConfig::default()
        })
    }

    pub fn with_config(config: ChainConfig) -> Self {
        let genesis = genesis_block();
        debug!(hash = genesis.hash(), "created genesis block");
        Self {
            chain: vec![genesis],
            config,
        }
    }

    pub fn config(&self) -> ChainConfig {
        self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// The tip of the chain.
    pub fn latest(&self) -> &Block {
        self.chain
            .last()
            .expect("constructors seed the genesis block and nothing removes blocks")
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn get(&self, position: usize) -> Option<&Block> {
        self.chain.get(position)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Link `candidate` to the current tip, mine it at the chain's difficulty
    /// and push it. The candidate's index and payload are taken as given.
    pub fn append(&mut self, mut candidate: Block) -> MiningReport {
        let tip = self.latest().hash().to_string();
        candidate.link_to(&tip);
        let report = candidate.mine_with(self.config.difficulty, self.config.strategy);
        self.chain.push(candidate);
        info!(height = self.chain.len() - 1, "appended block #{}", report.index);
        report
    }

    /// Replay the chain from the first block after genesis and return the
    /// first failure: a stored hash that no longer matches the block's fields,
    /// or a `previous_hash` that does not match the predecessor's stored hash.
    pub fn verify(&self) -> Result<(), ValidationError> {
        for (offset, pair) in self.chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let position = offset + 1;

            let computed = current.digest();
            if current.hash() != computed {
                return Err(ValidationError::InvalidHash {
                    position,
                    index: current.index(),
                    stored: current.hash().to_string(),
                    computed,
                });
            }

            if current.previous_hash() != previous.hash() {
                return Err(ValidationError::BrokenLink {
                    position,
                    index: current.index(),
                    expected: previous.hash().to_string(),
                    found: current.previous_hash().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(err) => {
                warn!(position = err.position(), "{err}");
                false
            }
        }
    }

    /// Simulates an attacker rewriting a committed block: swaps its payload
    /// and, with [`Rehash::Recompute`], refreshes that block's hash only.
    /// Neighbouring blocks are left untouched.
    pub fn simulate_tamper(
        &mut self,
        position: usize,
        transactions: impl Into<Payload>,
        rehash: Rehash,
    ) -> Result<(), ChainError> {
        let block = self
            .chain
            .get_mut(position)
            .ok_or(ChainError::NoSuchBlock(position))?;
        block.replace_transactions(transactions.into());
        if rehash == Rehash::Recompute {
            block.rehash();
        }
        warn!(position, rehash = ?rehash, "block tampered");
        Ok(())
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.chain {
            writeln!(f, "{block}")?;
            writeln!(f, "{}", "-".repeat(50))?;
        }
        Ok(())
    }
}
