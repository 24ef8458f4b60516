//! The replicated ledger: mined blocks plus the unconfirmed pool

use crate::{
    Address, Amount, Balance, Block, BlockIndex, CoreError, CoreResult, Signature, Timestamp,
    Transaction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default proof-of-work difficulty for a fresh ledger
pub const DEFAULT_DIFFICULTY: u64 = 100_000;

/// Default amount credited to a miner per block
pub const DEFAULT_MINING_REWARD: Amount = 100;

/// Complete ledger snapshot. Peers exchange and replace it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Mined blocks, genesis first
    pub blocks: Vec<Block>,
    /// Pending transactions in insertion order
    pub unconfirmed: Vec<Transaction>,
    /// Difficulty applied to the next mined block
    pub difficulty: u64,
    /// Reward paid to the miner of the next block
    pub mining_reward: Amount,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD)
    }
}

impl Ledger {
    /// Create a ledger holding only the genesis block
    pub fn new(difficulty: u64, mining_reward: Amount) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            unconfirmed: Vec::new(),
            difficulty: difficulty.max(1),
            mining_reward,
        }
    }

    /// Last mined block
    pub fn tip(&self) -> &Block {
        // `blocks` always holds at least genesis once constructed; a foreign
        // snapshot with no blocks is rejected by `verify`.
        self.blocks.last().unwrap_or_else(|| genesis_ref())
    }

    /// Number of blocks, genesis included
    pub fn height(&self) -> BlockIndex {
        self.blocks.len() as BlockIndex
    }

    /// Pending transactions in insertion order
    pub fn unconfirmed_transactions(&self) -> &[Transaction] {
        &self.unconfirmed
    }

    /// Balance of `address`: every confirmed and pending transaction folded
    /// into inflows minus outflows
    pub fn wallet(&self, address: &Address) -> Balance {
        self.confirmed_transactions()
            .chain(self.unconfirmed.iter())
            .map(|tx| tx.delta_for(address))
            .sum()
    }

    /// Balance of `address` counting mined blocks only
    pub fn confirmed_wallet(&self, address: &Address) -> Balance {
        self.confirmed_transactions()
            .map(|tx| tx.delta_for(address))
            .sum()
    }

    fn confirmed_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.blocks.iter().flat_map(|block| block.transactions.iter())
    }

    /// Whether a transaction with this signature is already pending or mined
    pub fn contains_signature(&self, signature: &Signature) -> bool {
        self.confirmed_transactions()
            .chain(self.unconfirmed.iter())
            .any(|tx| tx.signature.as_ref() == Some(signature))
    }

    /// Validate and append a transfer to the unconfirmed pool
    pub fn add_transaction(&mut self, tx: Transaction) -> CoreResult<()> {
        if tx.is_reward() {
            return Err(CoreError::InvalidSignature);
        }
        tx.validate()?;

        if let Some(signature) = &tx.signature {
            if self.contains_signature(signature) {
                return Err(CoreError::DuplicateTransaction(signature.to_hex()));
            }
        }

        self.unconfirmed.push(tx);
        Ok(())
    }

    /// Unmined block paying `miner` and carrying the current pool
    pub fn next_block(&self, miner: &Address, timestamp: Timestamp) -> CoreResult<Block> {
        let mut transactions = Vec::with_capacity(self.unconfirmed.len() + 1);
        transactions.push(Transaction::reward(
            miner.clone(),
            self.mining_reward,
            timestamp,
        ));
        transactions.extend(self.unconfirmed.iter().cloned());

        Block::candidate(
            self.height(),
            self.tip().hash,
            transactions,
            self.difficulty,
            timestamp,
        )
    }

    /// Append a mined block and drop the transactions it confirmed from the pool
    pub fn commit_block(&mut self, block: Block) -> CoreResult<()> {
        let tip = self.tip();
        if block.previous_hash != tip.hash || block.index != self.height() {
            return Err(CoreError::StaleBlock {
                expected: block.previous_hash.to_string(),
                actual: tip.hash.to_string(),
            });
        }
        block.validate()?;

        let mined: HashSet<&Signature> = block
            .transactions
            .iter()
            .filter_map(|tx| tx.signature.as_ref())
            .collect();
        let remaining: Vec<Transaction> = self
            .unconfirmed
            .iter()
            .filter(|tx| match &tx.signature {
                Some(signature) => !mined.contains(signature),
                None => true,
            })
            .cloned()
            .collect();

        self.unconfirmed = remaining;
        self.blocks.push(block);
        Ok(())
    }

    /// Adopt a peer's snapshot wholesale. Applying the same snapshot again
    /// leaves the ledger unchanged.
    pub fn replace(&mut self, snapshot: Ledger) {
        *self = snapshot;
    }

    /// Full structural check: linkage, proof of work and signatures
    pub fn verify(&self) -> CoreResult<()> {
        let genesis = self
            .blocks
            .first()
            .ok_or_else(|| CoreError::InvalidBlock("ledger has no genesis block".to_string()))?;
        if genesis != genesis_ref() {
            return Err(CoreError::InvalidBlock("unexpected genesis block".to_string()));
        }

        for pair in self.blocks.windows(2) {
            let (previous, block) = (&pair[0], &pair[1]);
            if block.previous_hash != previous.hash || block.index != previous.index + 1 {
                return Err(CoreError::InvalidBlock(format!(
                    "block #{} does not extend block #{}",
                    block.index, previous.index
                )));
            }
            block.validate()?;
        }

        for tx in &self.unconfirmed {
            tx.validate()?;
        }

        Ok(())
    }

    /// Serialize for the wire and the ledger file
    pub fn to_json(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a snapshot
    pub fn from_json(bytes: &[u8]) -> CoreResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn genesis_ref() -> &'static Block {
    static GENESIS: std::sync::OnceLock<Block> = std::sync::OnceLock::new();
    GENESIS.get_or_init(Block::genesis)
}
