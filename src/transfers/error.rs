use thiserror::Error;

use crate::ach::AchError;
use crate::compiler::CompileError;
use crate::error::ErrorKind;
use crate::limits::LimitError;
use crate::model::{DepositoryId, ModelError};
use crate::repository::RepositoryError;

#[derive(Error, Debug)]
pub enum TransferError {
    // === Lookup Errors ===
    #[error("originator not found")]
    OriginatorNotFound,

    #[error("receiver not found")]
    ReceiverNotFound,

    #[error("depository {0} not found")]
    DepositoryNotFound(DepositoryId),

    // === Compliance Errors ===
    #[error("depository {0} is not verified")]
    DepositoryNotVerified(DepositoryId),

    // === Wrapped ===
    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("{0}")]
    Limit(#[from] LimitError),

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Ach(#[from] AchError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

impl TransferError {
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::OriginatorNotFound => "ORIGINATOR_NOT_FOUND",
            TransferError::ReceiverNotFound => "RECEIVER_NOT_FOUND",
            TransferError::DepositoryNotFound(_) => "DEPOSITORY_NOT_FOUND",
            TransferError::DepositoryNotVerified(_) => "DEPOSITORY_NOT_VERIFIED",
            TransferError::Model(e) => e.code(),
            TransferError::Limit(e) => e.code(),
            TransferError::Compile(e) => e.code(),
            TransferError::Ach(e) => e.code(),
            TransferError::Repository(e) => e.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::OriginatorNotFound
            | TransferError::ReceiverNotFound
            | TransferError::DepositoryNotFound(_) => ErrorKind::NotFound,
            TransferError::DepositoryNotVerified(_) => ErrorKind::Compliance,
            TransferError::Model(e) => e.kind(),
            TransferError::Limit(e) => e.kind(),
            TransferError::Compile(e) => e.kind(),
            TransferError::Ach(e) => e.kind(),
            TransferError::Repository(e) => e.kind(),
        }
    }
}
