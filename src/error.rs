use thiserror::Error;

/// Rejections raised before anything is written. The submission is refused
/// as a whole; no record reaches storage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("description must not be empty")]
    EmptyDescription,
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("installment count must be at least 1")]
    ZeroInstallments,
    #[error("current installment {current} is past the total of {total}")]
    CurrentInstallmentPastTotal { current: u32, total: u32 },
    #[error("installment date falls outside the supported calendar range")]
    DateOutOfRange,
}

/// Failures of the underlying file or table. Inserts are all-or-nothing per
/// call, so a `StorageError` never leaves a partial batch behind.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed expense row: {0}")]
    Csv(#[from] csv::Error),
    #[error("database failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored date `{0}` is not a valid calendar date")]
    BadDate(String),
    #[error("unrecognized {field} value `{value}`")]
    BadField { field: &'static str, value: String },
}
