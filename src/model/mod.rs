//! Domain entities
//!
//! Depositories, originators, receivers and transfers with their status
//! vocabularies and validation rules. Entities are plain data: anything
//! needing I/O (decrypting account numbers, persistence) is passed in.

pub mod depository;
pub mod ids;
pub mod lifecycle;
pub mod micro_deposit;
pub mod originator;
pub mod receiver;
pub mod routing;
pub mod transfer;

pub use depository::{AccountType, Depository, DepositoryStatus, HolderType, NewDepository};
pub use ids::{DepositoryId, FileId, OriginatorId, ReceiverId, TransferId, UserId};
pub use lifecycle::{Lifecycle, Stored};
pub use micro_deposit::MicroDeposit;
pub use originator::Originator;
pub use receiver::{Address, Receiver, ReceiverStatus};
pub use transfer::{
    CcdDetail, IatAddress, IatBank, IatDetail, PaymentType, SecCode, SecDetail, TelDetail,
    Transfer, TransferStatus, TransferType, WebDetail,
};

use thiserror::Error;

use crate::error::ErrorKind;
use crate::money::AmountError;
use crate::secrets::SecretsError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("invalid routing number: {0}")]
    InvalidRoutingNumber(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("amount: {0}")]
    Amount(#[from] AmountError),

    #[error("secrets: {0}")]
    Secrets(#[from] SecretsError),
}

impl ModelError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ModelError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        ModelError::UnknownValue {
            kind,
            value: value.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ModelError::Invalid { .. } => "INVALID_FIELD",
            ModelError::UnknownValue { .. } => "UNKNOWN_VALUE",
            ModelError::InvalidRoutingNumber(_) => "INVALID_ROUTING_NUMBER",
            ModelError::InvalidTransition { .. } => "INVALID_STATE_TRANSITION",
            ModelError::Amount(e) => e.code(),
            ModelError::Secrets(e) => e.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::InvalidTransition { .. } => ErrorKind::Conflict,
            ModelError::Secrets(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}

/// Reject empty or whitespace-only values.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::invalid(field, "must not be empty"));
    }
    Ok(())
}
