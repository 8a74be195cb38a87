//! Persistence capabilities
//!
//! Each trait covers one aggregate. [`memory::MemoryRepository`] and
//! [`postgres::PgRepository`] implement all of them; services take the
//! traits they need as `Arc<dyn ...>`.
//!
//! Reads never return tombstoned rows. Merge claims are conditional updates
//! that succeed for exactly one caller.

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::model::{
    Depository, DepositoryId, DepositoryStatus, FileId, MicroDeposit, Originator, OriginatorId,
    Receiver, ReceiverId, Transfer, TransferId, UserId,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

impl RepositoryError {
    pub(crate) fn corrupt(entity: &'static str, reason: impl ToString) -> Self {
        RepositoryError::Corrupt {
            entity,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RepositoryError::Database(_) => "DATABASE_ERROR",
            RepositoryError::Corrupt { .. } => "CORRUPT_ROW",
            RepositoryError::NotFound { .. } => "NOT_FOUND",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait DepositoryRepository: Send + Sync {
    /// A user's live depository.
    async fn get_user_depository(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
    ) -> RepoResult<Option<Depository>>;

    /// A live depository regardless of owner.
    async fn get_depository(&self, id: &DepositoryId) -> RepoResult<Option<Depository>>;

    async fn upsert_depository(&self, depository: &Depository) -> RepoResult<()>;

    async fn update_depository_status(
        &self,
        id: &DepositoryId,
        status: DepositoryStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Live depositories matching an account, for return-file processing.
    async fn lookup_by_account_hash(
        &self,
        routing_number: &str,
        hashed_account_number: &str,
    ) -> RepoResult<Vec<Depository>>;

    /// Tombstone. Returns false if nothing live matched.
    async fn delete_depository(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;
}

#[async_trait]
pub trait OriginatorRepository: Send + Sync {
    async fn get_user_originator(
        &self,
        id: &OriginatorId,
        user_id: &UserId,
    ) -> RepoResult<Option<Originator>>;

    async fn upsert_originator(&self, originator: &Originator) -> RepoResult<()>;

    async fn delete_originator(
        &self,
        id: &OriginatorId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;
}

#[async_trait]
pub trait ReceiverRepository: Send + Sync {
    async fn get_user_receiver(
        &self,
        id: &ReceiverId,
        user_id: &UserId,
    ) -> RepoResult<Option<Receiver>>;

    async fn upsert_receiver(&self, receiver: &Receiver) -> RepoResult<()>;

    async fn delete_receiver(
        &self,
        id: &ReceiverId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;
}

#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn get_user_transfer(
        &self,
        id: &TransferId,
        user_id: &UserId,
    ) -> RepoResult<Option<Transfer>>;

    /// A user's live transfers created at or after `since`.
    async fn get_user_transfers_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Transfer>>;

    async fn create_transfer(&self, transfer: &Transfer) -> RepoResult<()>;

    async fn delete_transfer(
        &self,
        id: &TransferId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Live, pending, unmerged transfers created strictly after `newer_than`,
    /// oldest first.
    async fn get_unmerged_transfers(
        &self,
        newer_than: DateTime<Utc>,
        limit: usize,
    ) -> RepoResult<Vec<Transfer>>;

    /// Claim a transfer for a merged file and mark it processed. Only the
    /// first claim succeeds; later ones return false.
    async fn mark_transfer_merged(
        &self,
        id: &TransferId,
        filename: &str,
        trace_number: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Undo a claim made for `filename`, returning the transfer to pending.
    /// False when the transfer is not claimed by that file.
    async fn release_transfer_merge(
        &self,
        id: &TransferId,
        filename: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;
}

#[async_trait]
pub trait MicroDepositRepository: Send + Sync {
    /// Live micro-deposits of a user's depository.
    async fn get_micro_deposits(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
    ) -> RepoResult<Vec<MicroDeposit>>;

    /// Insert all rows for one initiation. Nothing is written and false is
    /// returned if the depository/user pair already has micro-deposits.
    /// Concurrent calls for the same depository serialize; at most one wins.
    async fn initiate_micro_deposits(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
        deposits: &[MicroDeposit],
    ) -> RepoResult<bool>;

    /// Record the ledger transaction that funded one initiation.
    async fn set_micro_deposit_transaction(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        transaction_id: &str,
    ) -> RepoResult<()>;

    /// Tombstone the rows of one initiation. Returns how many were removed.
    async fn cancel_micro_deposits(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        now: DateTime<Utc>,
    ) -> RepoResult<usize>;

    /// Live, unmerged rows created strictly after `newer_than`, oldest first.
    async fn get_unmerged_micro_deposits(
        &self,
        newer_than: DateTime<Utc>,
        limit: usize,
    ) -> RepoResult<Vec<MicroDeposit>>;

    /// Claim every row of one micro-deposit file. Only the first claim
    /// succeeds; later ones return false.
    async fn mark_micro_deposits_merged(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        filename: &str,
    ) -> RepoResult<bool>;

    /// Undo a file claim made for `filename`.
    async fn release_micro_deposits_merge(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        filename: &str,
    ) -> RepoResult<bool>;
}
