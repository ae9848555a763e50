//! Error types for Verdant
//!
//! Every failure is reported before any state is touched, so an error always
//! means "nothing changed".

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using VerdantError
pub type Result<T> = std::result::Result<T, VerdantError>;

/// Unified error type for Verdant operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerdantError {
    // Lending errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Offset credential errors
    #[error("Offset error: {0}")]
    Offset(#[from] OffsetError),

    // Authorization errors
    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    // Rejected parameter update
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Lending ledger errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Amount must be positive and representable: {0}")]
    InvalidAmount(Decimal),

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Exceeds borrow capacity: requested {requested}, capacity {capacity}")]
    ExceedsBorrowCapacity {
        requested: Decimal,
        capacity: Decimal,
    },

    #[error("No outstanding debt to repay")]
    NoOutstandingDebt,

    #[error("Insufficient deposited balance: requested {requested}, deposited {deposited}")]
    InsufficientBalance {
        requested: Decimal,
        deposited: Decimal,
    },
}

/// Offset credential errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OffsetError {
    #[error("Credential already recorded: {credential_id}")]
    DuplicateCredential { credential_id: String },

    #[error("Offset below minimum: {tons} < {minimum} tons")]
    BelowMinimumOffset { tons: Decimal, minimum: Decimal },

    #[error("Credit {credential_id} is not owned by the caller")]
    NotCreditOwner { credential_id: String },

    #[error("Credit already retired: {credential_id}")]
    AlreadyRetired { credential_id: String },
}

/// Authorization errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("Caller is not authorized for {capability}")]
    Unauthorized { capability: String },

    #[error("Access token is unknown or revoked")]
    UnknownToken,
}

/// Flat error classification for transport layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAmount,
    InsufficientLiquidity,
    ExceedsBorrowCapacity,
    NoOutstandingDebt,
    InsufficientBalance,
    DuplicateCredential,
    BelowMinimumOffset,
    NotCreditOwner,
    AlreadyRetired,
    Unauthorized,
    InvalidConfiguration,
}

impl VerdantError {
    /// Classify the error into its flat kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerdantError::Ledger(e) => match e {
                LedgerError::InvalidAmount(_) => ErrorKind::InvalidAmount,
                LedgerError::InsufficientLiquidity { .. } => ErrorKind::InsufficientLiquidity,
                LedgerError::ExceedsBorrowCapacity { .. } => ErrorKind::ExceedsBorrowCapacity,
                LedgerError::NoOutstandingDebt => ErrorKind::NoOutstandingDebt,
                LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            },
            VerdantError::Offset(e) => match e {
                OffsetError::DuplicateCredential { .. } => ErrorKind::DuplicateCredential,
                OffsetError::BelowMinimumOffset { .. } => ErrorKind::BelowMinimumOffset,
                OffsetError::NotCreditOwner { .. } => ErrorKind::NotCreditOwner,
                OffsetError::AlreadyRetired { .. } => ErrorKind::AlreadyRetired,
            },
            VerdantError::Auth(_) => ErrorKind::Unauthorized,
            VerdantError::InvalidConfiguration(_)
            | VerdantError::Config(_)
            | VerdantError::Serialization(_) => ErrorKind::InvalidConfiguration,
        }
    }
}

impl From<serde_json::Error> for VerdantError {
    fn from(err: serde_json::Error) -> Self {
        VerdantError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for VerdantError {
    fn from(err: anyhow::Error) -> Self {
        VerdantError::Config(err.to_string())
    }
}
