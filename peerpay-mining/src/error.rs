//! Mining error types

use peerpay_core::CoreError;
use peerpay_db::DbError;
use thiserror::Error;

pub type MiningResult<T> = Result<T, MiningError>;

#[derive(Error, Debug)]
pub enum MiningError {
    #[error("Ledger store error: {0}")]
    Store(#[from] DbError),

    #[error("Ledger error: {0}")]
    Core(#[from] CoreError),
}
