//! Ledger store traits and interfaces

use crate::DbResult;
use peerpay_core::{Address, Balance, Ledger, Transaction};
use std::sync::Arc;

/// Durable home of the replicated ledger.
///
/// Every writer goes through `modify` (or `write`), which holds the store's
/// lock for the whole read-modify-write so interleaved local and inbound
/// changes cannot lose each other.
pub trait LedgerStore: Send + Sync {
    /// Read the current ledger
    fn read(&self) -> DbResult<Ledger>;

    /// Replace the stored ledger wholesale
    fn write(&self, ledger: &Ledger) -> DbResult<()>;

    /// Apply `change` to the current ledger and persist the result. Nothing is
    /// written when `change` fails. Returns the ledger as persisted.
    fn modify(&self, change: &mut dyn FnMut(&mut Ledger) -> DbResult<()>) -> DbResult<Ledger>;

    /// Balance of `address` in the stored ledger
    fn get_wallet(&self, address: &Address) -> DbResult<Balance> {
        Ok(self.read()?.wallet(address))
    }

    /// Pending transactions in insertion order
    fn unconfirmed_transactions(&self) -> DbResult<Vec<Transaction>> {
        Ok(self.read()?.unconfirmed)
    }

    /// Validate and append a transaction to the unconfirmed pool
    fn add_transaction(&self, tx: Transaction) -> DbResult<Ledger> {
        let mut pending = Some(tx);
        self.modify(&mut |ledger| {
            if let Some(tx) = pending.take() {
                ledger.add_transaction(tx)?;
            }
            Ok(())
        })
    }
}

/// Shared ledger store reference
pub type SharedLedgerStore = Arc<dyn LedgerStore>;
