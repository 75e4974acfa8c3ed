//! Chain service
//!
//! Owns everything about the block chain itself: the genesis bootstrap,
//! block hashing and merkle roots, proof of work, linkage validation and
//! the read accessors. Blocks are kept by the [`LedgerStore`].

use crate::core::block::{Block, PowOutcome, GENESIS_PREVIOUS_HASH};
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::transaction::Transaction;
use crate::crypto::HASH_HEX_LEN;
use crate::storage::LedgerStore;
use log::info;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Default mining difficulty (number of leading '0' hex characters)
pub const DEFAULT_DIFFICULTY: u32 = 5;

/// Highest difficulty a 64-character hex hash can satisfy
pub const MAX_DIFFICULTY: u32 = HASH_HEX_LEN as u32;

/// What went wrong between two blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Stored hash differs from the recomputed hash
    HashMismatch,
    /// `previous_hash` does not equal the predecessor's hash
    BrokenLink,
}

/// First violation found while walking the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainViolation {
    /// Index of the predecessor; `None` when the genesis block itself is bad
    pub previous_index: Option<u64>,
    pub index: u64,
    pub kind: ViolationKind,
}

/// Result of a chain validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainValidation {
    pub valid: bool,
    pub blocks_checked: u64,
    pub violation: Option<ChainViolation>,
}

/// Chain statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub difficulty: u32,
    pub latest_hash: String,
}

/// Chain operations over a ledger store
pub struct ChainService<S: LedgerStore> {
    store: Arc<S>,
    difficulty: u32,
}

impl<S: LedgerStore> Clone for ChainService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            difficulty: self.difficulty,
        }
    }
}

impl<S: LedgerStore> ChainService<S> {
    pub fn new(store: Arc<S>, difficulty: u32) -> Self {
        Self { store, difficulty }
    }

    /// Difficulty applied to newly mined blocks
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Append the genesis block if the chain is empty, returning it either way
    pub fn ensure_genesis(&self) -> LedgerResult<Block> {
        if let Some(genesis) = self.store.block_by_index(0)? {
            return Ok(genesis);
        }
        let genesis = Block::genesis(self.difficulty);
        self.store.append_block(&genesis)?;
        info!("Created genesis block {}", genesis.hash);
        Ok(genesis)
    }

    // =========================================================================
    // Hashing & proof of work
    // =========================================================================

    /// Hash of a block's contents
    pub fn calculate_hash(block: &Block) -> String {
        block.calculate_hash()
    }

    /// Merkle root over transaction ids
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        Block::calculate_merkle_root(transactions)
    }

    /// Search for a nonce that satisfies the block's difficulty
    pub fn proof_of_work(block: &mut Block) -> u64 {
        block.mine()
    }

    /// Proof of work that stops once `cancel` is set
    pub fn proof_of_work_cancellable(block: &mut Block, cancel: &AtomicBool) -> PowOutcome {
        block.mine_cancellable(cancel)
    }

    /// Build an unmined block on top of the current tip
    pub fn candidate_block(&self, transactions: Vec<Transaction>, miner: &str) -> LedgerResult<Block> {
        let tip = self.latest_block()?;
        Ok(Block::new(
            tip.index + 1,
            tip.hash,
            transactions,
            self.difficulty,
            miner,
        ))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Walk the chain from genesis checking every hash and link.
    /// Reports the first violation; never repairs anything.
    pub fn validate_chain(&self) -> LedgerResult<ChainValidation> {
        let mut blocks = self.store.blocks_descending()?;
        blocks.reverse();

        let mut checked = 0u64;
        let mut previous: Option<&Block> = None;

        for block in &blocks {
            checked += 1;
            let violation = match previous {
                None => Self::check_genesis(block),
                Some(prev) => Self::check_pair(prev, block),
            };
            if let Some(violation) = violation {
                return Ok(ChainValidation {
                    valid: false,
                    blocks_checked: checked,
                    violation: Some(violation),
                });
            }
            previous = Some(block);
        }

        Ok(ChainValidation {
            valid: true,
            blocks_checked: checked,
            violation: None,
        })
    }

    fn check_genesis(block: &Block) -> Option<ChainViolation> {
        let kind = if !block.verify_hash() {
            ViolationKind::HashMismatch
        } else if block.previous_hash != GENESIS_PREVIOUS_HASH {
            ViolationKind::BrokenLink
        } else {
            return None;
        };
        Some(ChainViolation {
            previous_index: None,
            index: block.index,
            kind,
        })
    }

    fn check_pair(previous: &Block, current: &Block) -> Option<ChainViolation> {
        let kind = if !current.verify_hash() {
            ViolationKind::HashMismatch
        } else if current.previous_hash != previous.hash {
            ViolationKind::BrokenLink
        } else {
            return None;
        };
        Some(ChainViolation {
            previous_index: Some(previous.index),
            index: current.index,
            kind,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the latest block
    pub fn latest_block(&self) -> LedgerResult<Block> {
        self.store
            .latest_block()?
            .ok_or_else(|| LedgerError::NotFound("genesis block".into()))
    }

    /// Full chain, highest index first
    pub fn chain(&self) -> LedgerResult<Vec<Block>> {
        Ok(self.store.blocks_descending()?)
    }

    pub fn block_by_hash(&self, hash: &str) -> LedgerResult<Block> {
        self.store
            .block_by_hash(hash)?
            .ok_or_else(|| LedgerError::NotFound(format!("block {hash}")))
    }

    pub fn block_by_index(&self, index: u64) -> LedgerResult<Block> {
        self.store
            .block_by_index(index)?
            .ok_or_else(|| LedgerError::NotFound(format!("block #{index}")))
    }

    /// Height of the tip (genesis is 0)
    pub fn height(&self) -> LedgerResult<u64> {
        Ok(self.latest_block()?.index)
    }

    /// Append a mined block. It must extend the tip and carry valid work.
    pub fn append(&self, block: &Block) -> LedgerResult<()> {
        let tip = self.latest_block()?;
        if block.index != tip.index + 1 || block.previous_hash != tip.hash {
            return Err(LedgerError::validation(format!(
                "block #{} does not extend tip #{}",
                block.index, tip.index
            )));
        }
        if !block.verify_hash() || !block.is_valid_pow() {
            return Err(LedgerError::validation(format!(
                "block #{} has invalid proof of work",
                block.index
            )));
        }
        self.store.append_block(block)?;
        Ok(())
    }

    /// Get chain statistics
    pub fn stats(&self) -> LedgerResult<ChainStats> {
        let blocks = self.store.blocks_descending()?;
        let tip = blocks
            .first()
            .ok_or_else(|| LedgerError::NotFound("genesis block".into()))?;
        Ok(ChainStats {
            height: tip.index,
            total_blocks: blocks.len() as u64,
            total_transactions: blocks.iter().map(|b| b.transactions.len() as u64).sum(),
            difficulty: self.difficulty,
            latest_hash: tip.hash.clone(),
        })
    }
}
