//! Proof-of-work search

use peerpay_core::{meets_target, BlockHeader, CoreResult, Hash};
use tokio_util::sync::CancellationToken;

/// How many nonces are tried between cancellation checks
const CANCEL_CHECK_INTERVAL: u64 = 1024;

pub struct ProofOfWork {
    header: BlockHeader,
}

impl ProofOfWork {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    /// Validate proof-of-work for a header whose nonce is already set
    pub fn validate(header: &BlockHeader) -> CoreResult<bool> {
        Ok(meets_target(&header.hash()?, header.difficulty))
    }

    /// Search nonces from the header's current nonce upward. Returns `None`
    /// when cancelled or when the nonce space is exhausted.
    pub fn run(&self, cancel: &CancellationToken) -> CoreResult<Option<(u64, Hash)>> {
        let mut header = self.header.clone();
        tracing::debug!(
            "Mining block #{} at difficulty {}",
            header.index,
            header.difficulty
        );

        loop {
            if header.nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                tracing::debug!("Mining of block #{} cancelled", header.index);
                return Ok(None);
            }

            let hash = header.hash()?;
            if meets_target(&hash, header.difficulty) {
                tracing::debug!("Found nonce {} for block #{}: {}", header.nonce, header.index, hash);
                return Ok(Some((header.nonce, hash)));
            }

            header.nonce = match header.nonce.checked_add(1) {
                Some(nonce) => nonce,
                None => return Ok(None),
            };
        }
    }
}
