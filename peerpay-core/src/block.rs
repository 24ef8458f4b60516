//! Block data structures and operations

use crate::{BlockIndex, CoreError, CoreResult, Hash, Timestamp, Transaction};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Fields covered by the block hash and the proof of work
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode)]
pub struct BlockHeader {
    /// Block index (height)
    pub index: BlockIndex,
    /// Block timestamp in milliseconds
    pub timestamp: Timestamp,
    /// Hash of the previous block
    pub previous_hash: Hash,
    /// Keccak root over the transaction ids
    pub transactions_root: Hash,
    /// PoW difficulty
    pub difficulty: u64,
    /// PoW nonce
    pub nonce: u64,
}

impl BlockHeader {
    /// Calculate the hash of this block header
    pub fn hash(&self) -> CoreResult<Hash> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))?;
        let hash_bytes = Keccak256::digest(&encoded);
        Ok(Hash::from_slice(hash_bytes.as_slice()))
    }
}

/// Simple difficulty check: the hash prefix must be below `u64::MAX / difficulty`
pub fn meets_target(hash: &Hash, difficulty: u64) -> bool {
    let target = u64::MAX / difficulty.max(1);
    hash.leading_u64() < target
}

/// Complete block with header fields and transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: BlockIndex,
    pub timestamp: Timestamp,
    pub previous_hash: Hash,
    pub transactions_root: Hash,
    pub transactions: Vec<Transaction>,
    pub difficulty: u64,
    pub nonce: u64,
    pub hash: Hash,
}

impl Block {
    /// Build an unmined block. `hash` is filled for nonce 0 and is only
    /// meaningful once a miner has found a nonce that meets the target.
    pub fn candidate(
        index: BlockIndex,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        difficulty: u64,
        timestamp: Timestamp,
    ) -> CoreResult<Self> {
        let transactions_root = transactions_root(&transactions)?;
        let mut block = Self {
            index,
            timestamp,
            previous_hash,
            transactions_root,
            transactions,
            difficulty,
            nonce: 0,
            hash: Hash::zero(),
        };
        block.hash = block.header().hash()?;
        Ok(block)
    }

    /// Create genesis block
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            timestamp: 0,
            previous_hash: Hash::zero(),
            transactions_root: Hash::zero(),
            transactions: Vec::new(),
            difficulty: 1,
            nonce: 0,
            hash: Hash::zero(),
        };
        // Encoding a fixed header cannot fail.
        block.hash = block.header().hash().unwrap_or_default();
        block
    }

    /// Header view used for hashing
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            index: self.index,
            timestamp: self.timestamp,
            previous_hash: self.previous_hash,
            transactions_root: self.transactions_root,
            difficulty: self.difficulty,
            nonce: self.nonce,
        }
    }

    /// Install a found nonce and its hash
    pub fn seal(&mut self, nonce: u64, hash: Hash) {
        self.nonce = nonce;
        self.hash = hash;
    }

    /// Check if block is genesis
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == Hash::zero()
    }

    /// Validate the block on its own (linkage is checked by the ledger)
    pub fn validate(&self) -> CoreResult<()> {
        if transactions_root(&self.transactions)? != self.transactions_root {
            return Err(CoreError::InvalidBlock(format!(
                "block #{} transactions root mismatch",
                self.index
            )));
        }

        if self.header().hash()? != self.hash {
            return Err(CoreError::InvalidBlock(format!(
                "block #{} hash mismatch",
                self.index
            )));
        }

        if self.is_genesis() {
            return Ok(());
        }

        if !meets_target(&self.hash, self.difficulty) {
            return Err(CoreError::InvalidBlock(format!(
                "block #{} does not meet difficulty {}",
                self.index, self.difficulty
            )));
        }

        for (position, tx) in self.transactions.iter().enumerate() {
            if tx.is_reward() {
                if position != 0 {
                    return Err(CoreError::InvalidBlock(format!(
                        "block #{} has a reward at position {}",
                        self.index, position
                    )));
                }
            } else {
                tx.validate()?;
            }
        }

        Ok(())
    }
}

/// Calculate the transactions root hash
pub fn transactions_root(transactions: &[Transaction]) -> CoreResult<Hash> {
    if transactions.is_empty() {
        return Ok(Hash::zero());
    }

    // Simple implementation: hash of concatenated transaction ids
    let mut hasher = Keccak256::new();
    for tx in transactions {
        hasher.update(tx.id()?.as_bytes());
    }

    let result = hasher.finalize();
    Ok(Hash::from_slice(result.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, Sender};
    use libp2p::identity::Keypair;
    use libp2p::PeerId;

    fn mine(mut block: Block) -> Block {
        let mut header = block.header();
        loop {
            let hash = header.hash().unwrap();
            if meets_target(&hash, header.difficulty) {
                block.seal(header.nonce, hash);
                return block;
            }
            header.nonce += 1;
        }
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, Hash::zero());
        assert!(genesis.transactions.is_empty());
        assert!(genesis.is_genesis());
        assert!(genesis.validate().is_ok());
        // Hash should be deterministic
        assert_eq!(genesis, Block::genesis());
    }

    #[test]
    fn test_transactions_root() {
        assert_eq!(transactions_root(&[]).unwrap(), Hash::zero());

        let reward = Transaction::reward(Address::from(PeerId::random()), 100, 1);
        assert_ne!(transactions_root(&[reward]).unwrap(), Hash::zero());
    }

    #[test]
    fn test_mined_block_validates() {
        let keypair = Keypair::generate_ed25519();
        let miner = Address::from(keypair.public().to_peer_id());
        let mut transfer = Transaction::new(
            Sender::from_keypair(&keypair),
            Address::from(PeerId::random()),
            10,
        );
        transfer.sign(&keypair).unwrap();

        let block = Block::candidate(
            1,
            Block::genesis().hash,
            vec![Transaction::reward(miner, 100, 5), transfer],
            16,
            5,
        )
        .unwrap();

        let mined = mine(block);
        assert!(mined.validate().is_ok());

        let mut tampered = mined.clone();
        tampered.nonce += 1;
        assert!(tampered.validate().is_err());
    }

    #[test]
    fn test_reward_must_come_first() {
        let keypair = Keypair::generate_ed25519();
        let mut transfer = Transaction::new(
            Sender::from_keypair(&keypair),
            Address::from(PeerId::random()),
            10,
        );
        transfer.sign(&keypair).unwrap();
        let reward = Transaction::reward(Address::from(PeerId::random()), 100, 5);

        let block = mine(
            Block::candidate(1, Block::genesis().hash, vec![transfer, reward], 1, 5).unwrap(),
        );
        assert!(matches!(block.validate(), Err(CoreError::InvalidBlock(_))));
    }

    #[test]
    fn test_meets_target() {
        let low = Hash::new([0u8; 32]);
        let high = Hash::new([0xff; 32]);
        assert!(meets_target(&low, 1_000_000));
        assert!(!meets_target(&high, 2));
        // Zero difficulty is treated as one
        assert!(meets_target(&low, 0));
    }
}
