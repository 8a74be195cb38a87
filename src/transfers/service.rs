use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::TransferError;
use crate::ach::{AchClient, RetryPolicy, create_with_retry};
use crate::compiler::{BatchContext, TransferParts, construct_file};
use crate::limits::LimitChecker;
use crate::model::{Depository, DepositoryId, DepositoryStatus, FileId, Transfer, UserId};
use crate::repository::{
    DepositoryRepository, OriginatorRepository, ReceiverRepository, TransferRepository,
};
use crate::rng::RandomSource;
use crate::secrets::StringKeeper;

pub struct TransferService {
    transfers: Arc<dyn TransferRepository>,
    depositories: Arc<dyn DepositoryRepository>,
    originators: Arc<dyn OriginatorRepository>,
    receivers: Arc<dyn ReceiverRepository>,
    limits: LimitChecker,
    ach: Arc<dyn AchClient>,
    rng: Arc<dyn RandomSource>,
    keeper: Arc<dyn StringKeeper>,
    retry: RetryPolicy,
}

impl TransferService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transfers: Arc<dyn TransferRepository>,
        depositories: Arc<dyn DepositoryRepository>,
        originators: Arc<dyn OriginatorRepository>,
        receivers: Arc<dyn ReceiverRepository>,
        limits: LimitChecker,
        ach: Arc<dyn AchClient>,
        rng: Arc<dyn RandomSource>,
        keeper: Arc<dyn StringKeeper>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transfers,
            depositories,
            originators,
            receivers,
            limits,
            ach,
            rng,
            keeper,
            retry,
        }
    }

    async fn verified_depository(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
    ) -> Result<Depository, TransferError> {
        let dep = self
            .depositories
            .get_user_depository(id, user_id)
            .await?
            .ok_or_else(|| TransferError::DepositoryNotFound(id.clone()))?;
        if dep.status != DepositoryStatus::Verified {
            return Err(TransferError::DepositoryNotVerified(id.clone()));
        }
        Ok(dep)
    }

    /// Compile and submit a transfer, persisting it only once the ACH service
    /// has accepted and validated its file.
    pub async fn submit(
        &self,
        user_id: &UserId,
        mut transfer: Transfer,
        idempotency_key: &str,
    ) -> Result<Transfer, TransferError> {
        transfer.user_id = user_id.clone();
        transfer.validate()?;

        let originator = self
            .originators
            .get_user_originator(&transfer.originator, user_id)
            .await?
            .ok_or(TransferError::OriginatorNotFound)?;
        let receiver = self
            .receivers
            .get_user_receiver(&transfer.receiver, user_id)
            .await?
            .ok_or(TransferError::ReceiverNotFound)?;
        let originator_dep = self
            .verified_depository(&transfer.originator_depository, user_id)
            .await?;
        let receiver_dep = self
            .verified_depository(&transfer.receiver_depository, user_id)
            .await?;

        self.limits.check(user_id, &transfer.amount).await?;

        let now = Utc::now();
        let file = {
            let parts = TransferParts::new(
                &transfer,
                &receiver,
                &receiver_dep,
                &originator,
                &originator_dep,
            );
            let ctx = BatchContext::new(now, self.rng.as_ref(), self.keeper.as_ref());
            construct_file(FileId::new(), idempotency_key, &parts, &ctx)?
        };
        let trace_number = file.trace_numbers().first().map(|t| t.to_string());

        let file_id = create_with_retry(self.ach.as_ref(), idempotency_key, &file, self.retry).await?;
        if let Err(e) = self.ach.validate_file(&file_id).await {
            error!(transfer_id = %transfer.id, file_id = %file_id, error = %e, "transfer file failed validation");
            if let Err(e) = self.ach.delete_file(&file_id).await {
                warn!(file_id = %file_id, error = %e, "failed to delete ACH file");
            }
            return Err(e.into());
        }

        // stamped at insert time; cursors only look forward from what they saw
        let created = Utc::now();
        transfer.file_id = Some(file_id);
        transfer.trace_number = trace_number;
        transfer.created = created;
        transfer.updated = created;
        self.transfers.create_transfer(&transfer).await?;

        info!(
            transfer_id = %transfer.id,
            user_id = %user_id,
            amount = %transfer.amount,
            sec_code = %transfer.sec_code,
            "transfer submitted"
        );
        Ok(transfer)
    }
}
