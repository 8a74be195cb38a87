use thiserror::Error;

use crate::error::ErrorKind;
use crate::model::{ModelError, ReceiverId, SecCode, TransferStatus};
use crate::secrets::SecretsError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("unsupported SEC code: {0}")]
    UnsupportedSecCode(SecCode),

    #[error("transfer is {0}, only pending transfers can be compiled")]
    NotPending(TransferStatus),

    #[error("receiver {0} is not verified")]
    ReceiverNotVerified(ReceiverId),

    #[error("{0} transfer is missing its detail")]
    MissingDetail(SecCode),

    #[error("transfer SEC code {transfer} does not match {compiler} batch")]
    SecMismatch { transfer: SecCode, compiler: SecCode },

    #[error("{0} recurring payments are not supported")]
    RecurringNotSupported(SecCode),

    #[error("file has {0} batches, expected exactly one")]
    WrongBatchCount(usize),

    #[error("batch has no entries to copy")]
    EmptyBatch,

    #[error("cannot append entries to {0} batch")]
    UnsupportedBatch(SecCode),

    #[error("invalid trace number: {0}")]
    InvalidTraceNumber(String),

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("{0}")]
    Secrets(#[from] SecretsError),
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnsupportedSecCode(_) => "UNSUPPORTED_SEC_CODE",
            CompileError::NotPending(_) => "TRANSFER_NOT_PENDING",
            CompileError::ReceiverNotVerified(_) => "RECEIVER_NOT_VERIFIED",
            CompileError::MissingDetail(_) => "MISSING_SEC_DETAIL",
            CompileError::SecMismatch { .. } => "SEC_CODE_MISMATCH",
            CompileError::RecurringNotSupported(_) => "RECURRING_NOT_SUPPORTED",
            CompileError::WrongBatchCount(_) => "WRONG_BATCH_COUNT",
            CompileError::EmptyBatch => "EMPTY_BATCH",
            CompileError::UnsupportedBatch(_) => "UNSUPPORTED_BATCH",
            CompileError::InvalidTraceNumber(_) => "INVALID_TRACE_NUMBER",
            CompileError::Model(e) => e.code(),
            CompileError::Secrets(e) => e.code(),
        }
    }

    /// Structural failures on an already built file are internal; everything
    /// about the transfer itself is a validation error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::WrongBatchCount(_)
            | CompileError::EmptyBatch
            | CompileError::UnsupportedBatch(_)
            | CompileError::InvalidTraceNumber(_) => ErrorKind::Internal,
            CompileError::Model(e) => e.kind(),
            CompileError::Secrets(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}
