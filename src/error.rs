//! Structured error types for the certchain library.
//!
//! Every public library function returns [`Result<T>`] which carries a
//! [`CertchainError`].  The first five variants are the rejection categories
//! of the asset state machine; a rejected operation never changes ledger
//! state.  The CLI maps each category onto a stable exit status via
//! [`ErrorCode`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Primary error enum
// ---------------------------------------------------------------------------

/// Domain-specific error type for the certchain library.
#[derive(Error, Debug)]
pub enum CertchainError {
    /// Caller lacks the role or ownership the operation requires.
    #[error("unauthorized: {0}")]
    Authorization(String),

    /// A referenced identifier does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input (empty string, non-positive quantity, null principal,
    /// duplicate entries within one input list).
    #[error("validation: {0}")]
    Validation(String),

    /// Operation not valid for the asset's (or membership's) current state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A linked certificate failed the validity check at link time.
    #[error("referential: {0}")]
    Referential(String),

    #[error("journal: {0}")]
    Journal(String),

    #[error("config: {0}")]
    Config(String),

    /// Direct database errors (auto-converted via `?` in the journal module).
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),

    /// Catch-all for errors that do not fit a specific domain.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, CertchainError>;

impl CertchainError {
    /// True for the rejection categories of the asset state machine, i.e.
    /// the expected outcomes of a well-formed but inadmissible operation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Authorization(_)
                | Self::NotFound(_)
                | Self::Validation(_)
                | Self::StateConflict(_)
                | Self::Referential(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit statuses used by the CLI, one per error category.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    Authorization = 10,
    NotFound = 11,
    Validation = 12,
    StateConflict = 13,
    Referential = 14,
    JournalError = 20,
    DatabaseError = 21,
    ConfigError = 22,
    InternalError = 99,
}

impl From<&CertchainError> for ErrorCode {
    fn from(e: &CertchainError) -> Self {
        match e {
            CertchainError::Authorization(_) => Self::Authorization,
            CertchainError::NotFound(_) => Self::NotFound,
            CertchainError::Validation(_) => Self::Validation,
            CertchainError::StateConflict(_) => Self::StateConflict,
            CertchainError::Referential(_) => Self::Referential,
            CertchainError::Journal(_) => Self::JournalError,
            CertchainError::Database(_) => Self::DatabaseError,
            CertchainError::Config(_) => Self::ConfigError,
            CertchainError::Other(_) => Self::InternalError,
        }
    }
}

// ---------------------------------------------------------------------------
// Context extension traits
// ---------------------------------------------------------------------------

/// Extension trait that adds subsystem context to any `Result<T, E>`.
///
/// ```ignore
/// std::fs::read(path).ctx_journal("read journal backup")?;
/// ```
pub trait ResultExt<T> {
    fn ctx_journal(self, msg: &str) -> Result<T>;
    fn ctx_config(self, msg: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn ctx_journal(self, msg: &str) -> Result<T> {
        self.map_err(|e| CertchainError::Journal(format!("{msg}: {e}")))
    }
    fn ctx_config(self, msg: &str) -> Result<T> {
        self.map_err(|e| CertchainError::Config(format!("{msg}: {e}")))
    }
}

/// Same as [`ResultExt`] but for `Option<T>` (converts `None` into an error).
pub trait OptionExt<T> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T>;
    fn required_journal(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T> {
        self.ok_or_else(|| CertchainError::NotFound(what()))
    }
    fn required_journal(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| CertchainError::Journal(msg.to_string()))
    }
}
