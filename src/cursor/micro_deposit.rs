use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use super::{DEFAULT_BATCH_SIZE, advance, just_before, start_of_day};
use crate::model::{DepositoryId, FileId, MicroDeposit, UserId};
use crate::money::Amount;
use crate::repository::{MicroDepositRepository, RepoResult};

/// Every unmerged row of one micro-deposit file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadableMicroDeposit {
    pub depository_id: DepositoryId,
    pub user_id: UserId,
    pub file_id: FileId,
    pub amounts: Vec<Amount>,
    pub created: DateTime<Utc>,
}

impl UploadableMicroDeposit {
    fn matches(&self, m: &MicroDeposit) -> bool {
        self.depository_id == m.depository_id && self.file_id == m.file_id
    }
}

/// Group rows by (depository, file), keeping first-seen order.
pub fn group_micro_deposits(rows: Vec<MicroDeposit>) -> Vec<UploadableMicroDeposit> {
    let mut out: Vec<UploadableMicroDeposit> = Vec::new();
    for m in rows {
        match out.iter_mut().find(|u| u.matches(&m)) {
            Some(group) => group.amounts.push(m.amount),
            None => out.push(UploadableMicroDeposit {
                depository_id: m.depository_id,
                user_id: m.user_id,
                file_id: m.file_id,
                amounts: vec![m.amount],
                created: m.created,
            }),
        }
    }
    out
}

pub struct MicroDepositCursor {
    batch_size: usize,
    newer_than: DateTime<Utc>,
    repo: Arc<dyn MicroDepositRepository>,
}

impl MicroDepositCursor {
    pub fn new(repo: Arc<dyn MicroDepositRepository>, batch_size: usize) -> Self {
        Self::with_watermark(repo, batch_size, start_of_day(Utc::now()))
    }

    pub fn with_watermark(
        repo: Arc<dyn MicroDepositRepository>,
        batch_size: usize,
        newer_than: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_size: if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size },
            newer_than,
            repo,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.newer_than
    }

    pub fn rewind_to(&mut self, watermark: DateTime<Utc>) {
        self.newer_than = self.newer_than.min(watermark);
    }

    /// Return rows created at or after `created` again on the next call.
    pub fn retry_from(&mut self, created: DateTime<Utc>) {
        self.rewind_to(just_before(created));
    }

    pub async fn next(&mut self) -> RepoResult<Vec<UploadableMicroDeposit>> {
        let rows = self
            .repo
            .get_unmerged_micro_deposits(self.newer_than, self.batch_size)
            .await?;
        self.newer_than = advance(self.newer_than, rows.iter().map(|m| &m.created));
        let out = group_micro_deposits(rows);
        debug!(count = out.len(), watermark = %self.newer_than, "micro-deposit cursor advanced");
        Ok(out)
    }

    /// Claim every row of the file. Returns false when already merged.
    pub async fn mark_as_merged(
        &self,
        micro_deposit: &UploadableMicroDeposit,
        filename: &str,
    ) -> RepoResult<bool> {
        self.repo
            .mark_micro_deposits_merged(&micro_deposit.depository_id, &micro_deposit.file_id, filename)
            .await
    }

    pub async fn release(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        filename: &str,
    ) -> RepoResult<bool> {
        self.repo
            .release_micro_deposits_merge(depository_id, file_id, filename)
            .await
    }
}
