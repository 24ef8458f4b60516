//! In-memory ledger store

use crate::{DbResult, LedgerStore};
use parking_lot::Mutex;
use peerpay_core::Ledger;

/// Ledger store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<Ledger>,
}

impl MemoryLedgerStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn read(&self) -> DbResult<Ledger> {
        Ok(self.ledger.lock().clone())
    }

    fn write(&self, ledger: &Ledger) -> DbResult<()> {
        *self.ledger.lock() = ledger.clone();
        Ok(())
    }

    fn modify(&self, change: &mut dyn FnMut(&mut Ledger) -> DbResult<()>) -> DbResult<Ledger> {
        let mut guard = self.ledger.lock();
        let mut next = guard.clone();
        change(&mut next)?;
        *guard = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use libp2p::identity::Keypair;
    use libp2p::PeerId;
    use peerpay_core::{Address, CoreError, Sender, Transaction};

    fn signed(keypair: &Keypair, amount: u64) -> Transaction {
        let mut tx = Transaction::new(
            Sender::from_keypair(keypair),
            Address::from(PeerId::random()),
            amount,
        );
        tx.sign(keypair).unwrap();
        tx
    }

    #[test]
    fn test_add_transaction_and_wallet() {
        let keypair = Keypair::generate_ed25519();
        let sender = Address::from(keypair.public().to_peer_id());
        let store = MemoryLedgerStore::new(Ledger::new(1, 100));

        store.add_transaction(signed(&keypair, 30)).unwrap();
        assert_eq!(store.unconfirmed_transactions().unwrap().len(), 1);
        assert_eq!(store.get_wallet(&sender).unwrap(), -30);
    }

    #[test]
    fn test_failed_modify_leaves_ledger_untouched() {
        let store = MemoryLedgerStore::new(Ledger::new(1, 100));
        let before = store.read().unwrap();

        let result = store.modify(&mut |ledger| {
            ledger.unconfirmed.clear();
            ledger.difficulty = 42;
            Err(DbError::Ledger(CoreError::InvalidBlock("abort".to_string())))
        });

        assert!(result.is_err());
        assert_eq!(store.read().unwrap(), before);
    }
}
