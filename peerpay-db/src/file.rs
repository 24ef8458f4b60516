//! JSON-file ledger store

use crate::{DbError, DbResult, LedgerStore};
use parking_lot::Mutex;
use peerpay_core::{Amount, Ledger};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ledger persisted as a single JSON document.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the ledger, so a crash never leaves a half-written ledger behind.
#[derive(Debug)]
pub struct FileLedgerStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLedgerStore {
    /// Open the ledger at `path`, seeding a genesis ledger if none exists
    pub fn open<P: AsRef<Path>>(path: P, difficulty: u64, mining_reward: Amount) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };

        if !store.path.exists() {
            tracing::info!("Creating new ledger at {}", store.path.display());
            store.write(&Ledger::new(difficulty, mining_reward))?;
        } else {
            let ledger = store.read()?;
            tracing::info!(
                "Opened ledger at {} ({} blocks, {} pending)",
                store.path.display(),
                ledger.height(),
                ledger.unconfirmed.len()
            );
        }

        Ok(store)
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> DbResult<Ledger> {
        let data = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn persist(&self, ledger: &Ledger) -> DbResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let encoded = serde_json::to_vec_pretty(ledger)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| DbError::Io(e.error))?;
        Ok(())
    }
}

impl LedgerStore for FileLedgerStore {
    fn read(&self) -> DbResult<Ledger> {
        let _guard = self.lock.lock();
        self.load()
    }

    fn write(&self, ledger: &Ledger) -> DbResult<()> {
        let _guard = self.lock.lock();
        self.persist(ledger)
    }

    fn modify(&self, change: &mut dyn FnMut(&mut Ledger) -> DbResult<()>) -> DbResult<Ledger> {
        let _guard = self.lock.lock();
        let mut ledger = self.load()?;
        change(&mut ledger)?;
        self.persist(&ledger)?;
        Ok(ledger)
    }
}
