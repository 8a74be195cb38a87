//! Micro-deposit rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DepositoryId, FileId, UserId};
use crate::money::Amount;

/// One verification credit sent to a depository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroDeposit {
    pub depository_id: DepositoryId,
    pub user_id: UserId,
    pub amount: Amount,
    pub file_id: FileId,
    /// Ledger transaction posted for the credit; empty when none was posted
    pub transaction_id: String,
    pub merged_filename: Option<String>,
    pub return_code: Option<String>,
    pub created: DateTime<Utc>,
}

impl MicroDeposit {
    #[inline]
    pub fn is_merged(&self) -> bool {
        self.merged_filename.is_some()
    }
}
