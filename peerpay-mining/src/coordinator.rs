//! Mining coordinator: at most one isolated proof-of-work job per process

use crate::pow::ProofOfWork;
use crate::MiningResult;
use peerpay_core::{now_millis, Address, Block, Ledger};
use peerpay_db::SharedLedgerStore;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    /// No job has run yet
    Idle,
    /// A job is searching for a nonce
    Mining,
    /// The last job mined and persisted a block
    Succeeded,
    /// The last job was stopped before persisting anything
    Cancelled,
    /// The last job hit an error
    Failed,
}

/// Answer to a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningStart {
    Started,
    /// The unconfirmed pool is empty
    NothingToMine,
    /// A job is already running; no second job was spawned
    AlreadyMining,
}

/// Result of a finished job, delivered exactly once
#[derive(Debug, Clone)]
pub enum MiningOutcome {
    Succeeded {
        /// The block that was appended
        block: Block,
        /// Ledger as persisted right after the append
        ledger: Ledger,
    },
    Cancelled,
    Failed(String),
}

impl MiningOutcome {
    fn state(&self) -> MiningState {
        match self {
            MiningOutcome::Succeeded { .. } => MiningState::Succeeded,
            MiningOutcome::Cancelled => MiningState::Cancelled,
            MiningOutcome::Failed(_) => MiningState::Failed,
        }
    }
}

/// What the proof-of-work task hands back
enum JobResult {
    Sealed(Block),
    Cancelled,
    Failed(String),
}

/// Handle to the running job
struct MiningJob {
    cancel: CancellationToken,
    result: oneshot::Receiver<JobResult>,
}

/// Owns the mining state machine. Lives on the node's control loop; only the
/// nonce search runs on tokio's blocking pool. A sealed block is committed by
/// `next_outcome` on the caller's task, so a `cancel` issued before the
/// outcome is collected always wins.
pub struct MiningCoordinator {
    store: SharedLedgerStore,
    state: MiningState,
    job: Option<MiningJob>,
    jobs_started: u64,
}

impl MiningCoordinator {
    pub fn new(store: SharedLedgerStore) -> Self {
        Self {
            store,
            state: MiningState::Idle,
            job: None,
            jobs_started: 0,
        }
    }

    pub fn state(&self) -> MiningState {
        self.state
    }

    pub fn is_mining(&self) -> bool {
        self.state == MiningState::Mining
    }

    /// Number of jobs spawned since creation
    pub fn jobs_started(&self) -> u64 {
        self.jobs_started
    }

    /// Start mining the current pool on behalf of `miner`
    pub fn start(&mut self, miner: Address) -> MiningResult<MiningStart> {
        if self.is_mining() {
            return Ok(MiningStart::AlreadyMining);
        }

        let ledger = self.store.read()?;
        if ledger.unconfirmed.is_empty() {
            return Ok(MiningStart::NothingToMine);
        }

        let candidate = ledger.next_block(&miner, now_millis())?;
        info!(
            "Mining block #{} with {} pending transactions",
            candidate.index,
            ledger.unconfirmed.len()
        );

        let cancel = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();
        let job_cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let _ = result_tx.send(seal(candidate, &job_cancel));
        });

        self.job = Some(MiningJob {
            cancel,
            result: result_rx,
        });
        self.state = MiningState::Mining;
        self.jobs_started += 1;

        Ok(MiningStart::Started)
    }

    /// Ask the running job to stop. Returns whether a job was running.
    pub fn cancel(&self) -> bool {
        match &self.job {
            Some(job) => {
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait for the running job to finish and commit its block. Never
    /// resolves while idle, so it can sit in a `select!` arm. Cancel safe:
    /// the commit runs in the same poll that observes the finished job.
    pub async fn next_outcome(&mut self) -> MiningOutcome {
        let (result, cancelled) = match self.job.as_mut() {
            Some(job) => {
                let result = (&mut job.result).await;
                (result, job.cancel.is_cancelled())
            }
            None => std::future::pending().await,
        };
        self.job = None;

        let outcome = match result {
            Ok(_) if cancelled => MiningOutcome::Cancelled,
            Ok(JobResult::Sealed(block)) => self.commit(block),
            Ok(JobResult::Cancelled) => MiningOutcome::Cancelled,
            Ok(JobResult::Failed(reason)) => MiningOutcome::Failed(reason),
            Err(_) => MiningOutcome::Failed("mining job terminated unexpectedly".to_string()),
        };
        self.state = outcome.state();
        outcome
    }

    fn commit(&self, block: Block) -> MiningOutcome {
        let mut sealed = Some(block.clone());
        let result = self.store.modify(&mut |ledger| {
            if let Some(block) = sealed.take() {
                ledger.commit_block(block)?;
            }
            Ok(())
        });

        match result {
            Ok(ledger) => {
                info!("Mined block #{} ({})", block.index, block.hash);
                MiningOutcome::Succeeded { block, ledger }
            }
            Err(e) => {
                warn!("Could not commit mined block #{}: {}", block.index, e);
                MiningOutcome::Failed(e.to_string())
            }
        }
    }
}

fn seal(mut block: Block, cancel: &CancellationToken) -> JobResult {
    match ProofOfWork::new(block.header()).run(cancel) {
        Ok(Some((nonce, hash))) => {
            block.seal(nonce, hash);
            JobResult::Sealed(block)
        }
        Ok(None) => JobResult::Cancelled,
        Err(e) => JobResult::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p::identity::Keypair;
    use libp2p::PeerId;
    use peerpay_core::{Sender, Transaction};
    use peerpay_db::MemoryLedgerStore;
    use std::sync::Arc;

    fn store_with_pending(difficulty: u64) -> (SharedLedgerStore, Transaction) {
        let keypair = Keypair::generate_ed25519();
        let mut tx = Transaction::new(
            Sender::from_keypair(&keypair),
            Address::from(PeerId::random()),
            30,
        );
        tx.sign(&keypair).unwrap();

        let store: SharedLedgerStore = Arc::new(MemoryLedgerStore::new(Ledger::new(difficulty, 100)));
        store.add_transaction(tx.clone()).unwrap();
        (store, tx)
    }

    #[tokio::test]
    async fn test_empty_pool_is_nothing_to_mine() {
        let store: SharedLedgerStore = Arc::new(MemoryLedgerStore::new(Ledger::new(1, 100)));
        let before = store.read().unwrap();
        let mut coordinator = MiningCoordinator::new(store.clone());

        let start = coordinator.start(Address::from(PeerId::random())).unwrap();
        assert_eq!(start, MiningStart::NothingToMine);
        assert_eq!(coordinator.state(), MiningState::Idle);
        assert_eq!(coordinator.jobs_started(), 0);
        assert_eq!(store.read().unwrap(), before);
    }

    #[tokio::test]
    async fn test_successful_job_commits_block() {
        let (store, tx) = store_with_pending(1);
        let miner = Address::from(PeerId::random());
        let mut coordinator = MiningCoordinator::new(store.clone());

        assert_eq!(coordinator.start(miner.clone()).unwrap(), MiningStart::Started);
        assert!(coordinator.is_mining());

        match coordinator.next_outcome().await {
            MiningOutcome::Succeeded { block, ledger } => {
                assert_eq!(block.index, 1);
                assert_eq!(block.transactions[1], tx);
                assert_eq!(ledger, store.read().unwrap());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let ledger = store.read().unwrap();
        assert_eq!(ledger.height(), 2);
        assert!(ledger.unconfirmed.is_empty());
        assert_eq!(ledger.wallet(&miner), 100);
        assert_eq!(coordinator.state(), MiningState::Succeeded);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_mining() {
        let (store, _) = store_with_pending(u64::MAX);
        let mut coordinator = MiningCoordinator::new(store.clone());
        let miner = Address::from(PeerId::random());

        assert_eq!(coordinator.start(miner.clone()).unwrap(), MiningStart::Started);
        assert_eq!(coordinator.start(miner).unwrap(), MiningStart::AlreadyMining);
        assert_eq!(coordinator.jobs_started(), 1);

        assert!(coordinator.cancel());
        assert!(matches!(coordinator.next_outcome().await, MiningOutcome::Cancelled));
        assert_eq!(coordinator.state(), MiningState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_job_persists_nothing() {
        let (store, _) = store_with_pending(u64::MAX);
        let before = store.read().unwrap();
        let mut coordinator = MiningCoordinator::new(store.clone());

        coordinator.start(Address::from(PeerId::random())).unwrap();
        coordinator.cancel();
        coordinator.next_outcome().await;

        assert_eq!(store.read().unwrap(), before);
        assert!(!coordinator.cancel());
    }

    #[tokio::test]
    async fn test_cancel_after_seal_discards_block() {
        let (store, _) = store_with_pending(1);
        let before = store.read().unwrap();
        let mut coordinator = MiningCoordinator::new(store.clone());

        coordinator.start(Address::from(PeerId::random())).unwrap();
        // Difficulty 1 seals on the first nonce; let the blocking task finish
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        assert!(coordinator.cancel());
        assert!(matches!(coordinator.next_outcome().await, MiningOutcome::Cancelled));
        assert_eq!(coordinator.state(), MiningState::Cancelled);
        assert_eq!(store.read().unwrap(), before);
    }

    #[tokio::test]
    async fn test_stale_tip_fails_commit() {
        let (store, _) = store_with_pending(1);
        let mut coordinator = MiningCoordinator::new(store.clone());

        coordinator.start(Address::from(PeerId::random())).unwrap();
        store
            .modify(&mut |ledger| {
                let other = ledger.next_block(&Address::from(PeerId::random()), 1)?;
                let mut header = other.header();
                loop {
                    let hash = header.hash()?;
                    if peerpay_core::meets_target(&hash, header.difficulty) {
                        let mut sealed = other.clone();
                        sealed.seal(header.nonce, hash);
                        ledger.commit_block(sealed)?;
                        return Ok(());
                    }
                    header.nonce += 1;
                }
            })
            .unwrap();

        assert!(matches!(coordinator.next_outcome().await, MiningOutcome::Failed(_)));
        assert_eq!(coordinator.state(), MiningState::Failed);
        assert_eq!(store.read().unwrap().height(), 2);
    }

    #[tokio::test]
    async fn test_can_restart_after_cancel() {
        let (store, _) = store_with_pending(u64::MAX);
        let mut coordinator = MiningCoordinator::new(store.clone());
        let miner = Address::from(PeerId::random());

        coordinator.start(miner.clone()).unwrap();
        coordinator.cancel();
        coordinator.next_outcome().await;

        store
            .modify(&mut |ledger| {
                ledger.difficulty = 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(coordinator.start(miner).unwrap(), MiningStart::Started);
        assert!(matches!(
            coordinator.next_outcome().await,
            MiningOutcome::Succeeded { .. }
        ));
        assert_eq!(coordinator.jobs_started(), 2);
    }
}
