use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{DEFAULT_BATCH_SIZE, advance, just_before, start_of_day};
use crate::model::{Transfer, TransferId};
use crate::repository::{DepositoryRepository, RepoResult, TransferRepository};

/// A pending transfer and the routing number of its originator depository,
/// which decides the file it merges into.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupableTransfer {
    pub transfer: Transfer,
    pub origin: String,
}

pub struct TransferCursor {
    batch_size: usize,
    newer_than: DateTime<Utc>,
    transfers: Arc<dyn TransferRepository>,
    depositories: Arc<dyn DepositoryRepository>,
}

impl TransferCursor {
    /// Cursor starting at the beginning of the current day.
    pub fn new(
        transfers: Arc<dyn TransferRepository>,
        depositories: Arc<dyn DepositoryRepository>,
        batch_size: usize,
    ) -> Self {
        Self::with_watermark(transfers, depositories, batch_size, start_of_day(Utc::now()))
    }

    pub fn with_watermark(
        transfers: Arc<dyn TransferRepository>,
        depositories: Arc<dyn DepositoryRepository>,
        batch_size: usize,
        newer_than: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_size: if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size },
            newer_than,
            transfers,
            depositories,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.newer_than
    }

    /// Move the watermark back to `watermark` if it is ahead of it.
    pub fn rewind_to(&mut self, watermark: DateTime<Utc>) {
        self.newer_than = self.newer_than.min(watermark);
    }

    /// Return transfers created at or after `created` again on the next call.
    pub fn retry_from(&mut self, created: DateTime<Utc>) {
        self.rewind_to(just_before(created));
    }

    /// Next batch of unmerged transfers. Transfers whose originator
    /// depository cannot be found are skipped. On error the watermark is
    /// left where it was.
    pub async fn next(&mut self) -> RepoResult<Vec<GroupableTransfer>> {
        let transfers = self
            .transfers
            .get_unmerged_transfers(self.newer_than, self.batch_size)
            .await?;
        let watermark = advance(self.newer_than, transfers.iter().map(|t| &t.created));

        let mut out = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            let dep = self
                .depositories
                .get_user_depository(&transfer.originator_depository, &transfer.user_id)
                .await?;
            match dep {
                Some(dep) => out.push(GroupableTransfer {
                    origin: dep.routing_number,
                    transfer,
                }),
                None => warn!(
                    transfer_id = %transfer.id,
                    depository_id = %transfer.originator_depository,
                    "skipping transfer without originator depository"
                ),
            }
        }
        self.newer_than = watermark;
        debug!(count = out.len(), watermark = %self.newer_than, "transfer cursor advanced");
        Ok(out)
    }

    /// Claim a transfer for `filename`. Returns false when it was already
    /// merged.
    pub async fn mark_as_merged(
        &self,
        transfer: &Transfer,
        filename: &str,
        trace_number: &str,
    ) -> RepoResult<bool> {
        self.transfers
            .mark_transfer_merged(&transfer.id, filename, trace_number, Utc::now())
            .await
    }

    /// Give back a claim made for `filename`.
    pub async fn release(&self, id: &TransferId, filename: &str) -> RepoResult<bool> {
        self.transfers
            .release_transfer_merge(id, filename, Utc::now())
            .await
    }
}
