//! Micro-deposit verification
//!
//! Proves a user controls a depository: two small credits (plus a debit
//! withdrawing their sum) are sent to the account, and the depository becomes
//! verified once the user reports both amounts back.
//!
//! ```text
//! unverified --submit--> awaiting confirmation --confirm--> verified
//! ```
//!
//! A depository gets at most one set of micro-deposits. Confirmation attempts
//! are throttled per depository by an [`Attempter`].

pub mod amounts;
pub mod attempts;
pub mod odfi;

pub use amounts::{describe, generate_amounts, withdrawal_amount};
pub use attempts::{Attempter, DEFAULT_MAX_ATTEMPTS, MemoryAttempter, PgAttempter};
pub use odfi::{AccountsClient, AccountsError, OdfiAccount, TransactionLine};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::ach::{AchClient, AchError, RetryPolicy, create_with_retry};
use crate::compiler::{
    BatchContext, CompileError, TransferParts, append_credit_entry, append_withdraw_entry,
    construct_file,
};
use crate::error::ErrorKind;
use crate::model::{
    Depository, DepositoryId, DepositoryStatus, FileId, MicroDeposit, ModelError, Receiver,
    ReceiverId, ReceiverStatus, SecCode, Transfer, TransferId, TransferStatus, TransferType,
    UserId,
};
use crate::money::{Amount, AmountError};
use crate::repository::{DepositoryRepository, MicroDepositRepository, RepositoryError};
use crate::rng::RandomSource;
use crate::secrets::StringKeeper;

#[derive(Debug, Error)]
pub enum MicroDepositError {
    #[error("depository not found")]
    DepositoryNotFound,

    #[error("depository is not eligible for micro-deposits")]
    NotEligible,

    #[error("micro-deposits already initiated")]
    AlreadyInitiated,

    #[error("no micro-deposits found")]
    NotInitiated,

    #[error("no micro-deposit attempts available")]
    AttemptsExhausted,

    #[error("incorrect amount of guesses")]
    IncorrectGuessCount,

    #[error("incorrect micro deposit guesses")]
    IncorrectGuesses,

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Ach(#[from] AchError),

    #[error("{0}")]
    Accounts(#[from] AccountsError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("{0}")]
    Amount(#[from] AmountError),
}

impl MicroDepositError {
    pub fn code(&self) -> &'static str {
        match self {
            MicroDepositError::DepositoryNotFound => "DEPOSITORY_NOT_FOUND",
            MicroDepositError::NotEligible => "DEPOSITORY_NOT_ELIGIBLE",
            MicroDepositError::AlreadyInitiated => "MICRO_DEPOSITS_ALREADY_INITIATED",
            MicroDepositError::NotInitiated => "MICRO_DEPOSITS_NOT_INITIATED",
            MicroDepositError::AttemptsExhausted => "MICRO_DEPOSIT_ATTEMPTS_EXHAUSTED",
            MicroDepositError::IncorrectGuessCount => "INCORRECT_GUESS_COUNT",
            MicroDepositError::IncorrectGuesses => "INCORRECT_GUESSES",
            MicroDepositError::Compile(e) => e.code(),
            MicroDepositError::Ach(e) => e.code(),
            MicroDepositError::Accounts(e) => e.code(),
            MicroDepositError::Repository(e) => e.code(),
            MicroDepositError::Model(e) => e.code(),
            MicroDepositError::Amount(e) => e.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MicroDepositError::DepositoryNotFound | MicroDepositError::NotInitiated => {
                ErrorKind::NotFound
            }
            MicroDepositError::AlreadyInitiated | MicroDepositError::AttemptsExhausted => {
                ErrorKind::Conflict
            }
            MicroDepositError::NotEligible
            | MicroDepositError::IncorrectGuessCount
            | MicroDepositError::IncorrectGuesses => ErrorKind::Compliance,
            MicroDepositError::Compile(e) => e.kind(),
            MicroDepositError::Ach(e) => e.kind(),
            MicroDepositError::Accounts(e) => e.kind(),
            MicroDepositError::Repository(e) => e.kind(),
            MicroDepositError::Model(e) => e.kind(),
            MicroDepositError::Amount(e) => e.kind(),
        }
    }
}

/// True when `guesses` is a permutation of `persisted`.
pub fn guesses_match(persisted: &[Amount], guesses: &[Amount]) -> bool {
    if persisted.len() != guesses.len() {
        return false;
    }
    let mut remaining: Vec<&Amount> = guesses.iter().collect();
    persisted.iter().all(|amount| {
        match remaining.iter().position(|g| *g == amount) {
            Some(i) => {
                remaining.swap_remove(i);
                true
            }
            None => false,
        }
    })
}

pub struct MicroDepositService {
    depositories: Arc<dyn DepositoryRepository>,
    micro_deposits: Arc<dyn MicroDepositRepository>,
    attempter: Arc<dyn Attempter>,
    ach: Arc<dyn AchClient>,
    odfi: Arc<OdfiAccount>,
    rng: Arc<dyn RandomSource>,
    keeper: Arc<dyn StringKeeper>,
    retry: RetryPolicy,
}

impl MicroDepositService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        depositories: Arc<dyn DepositoryRepository>,
        micro_deposits: Arc<dyn MicroDepositRepository>,
        attempter: Arc<dyn Attempter>,
        ach: Arc<dyn AchClient>,
        odfi: Arc<OdfiAccount>,
        rng: Arc<dyn RandomSource>,
        keeper: Arc<dyn StringKeeper>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            depositories,
            micro_deposits,
            attempter,
            ach,
            odfi,
            rng,
            keeper,
            retry,
        }
    }

    async fn load_depository(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
    ) -> Result<Depository, MicroDepositError> {
        self.depositories
            .get_user_depository(depository_id, user_id)
            .await?
            .ok_or(MicroDepositError::DepositoryNotFound)
    }

    /// Send micro-deposits to an unverified depository and persist them.
    ///
    /// Nothing is persisted unless the ACH service accepted and validated the
    /// file. Rows are claimed before the ledger posting; a failed posting
    /// removes them and the file again.
    pub async fn submit(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
    ) -> Result<Vec<MicroDeposit>, MicroDepositError> {
        let dep = self.load_depository(depository_id, user_id).await?;
        if dep.status != DepositoryStatus::Unverified {
            return Err(MicroDepositError::NotEligible);
        }
        if !self
            .micro_deposits
            .get_micro_deposits(depository_id, user_id)
            .await?
            .is_empty()
        {
            return Err(MicroDepositError::AlreadyInitiated);
        }

        let amounts = generate_amounts(self.rng.as_ref())?;
        let idempotency_key = ulid::Ulid::new().to_string().to_lowercase();
        let file = self.build_file(&dep, user_id, &amounts, &idempotency_key, Utc::now())?;

        let file_id = create_with_retry(self.ach.as_ref(), &idempotency_key, &file, self.retry).await?;
        if let Err(e) = self.ach.validate_file(&file_id).await {
            error!(depository_id = %depository_id, file_id = %file_id, error = %e, "micro-deposit file failed validation");
            self.discard_file(&file_id).await;
            return Err(e.into());
        }

        // claim the depository before anything reaches the ledger
        let created = Utc::now();
        let mut deposits: Vec<MicroDeposit> = amounts
            .iter()
            .map(|amount| MicroDeposit {
                depository_id: depository_id.clone(),
                user_id: user_id.clone(),
                amount: *amount,
                file_id: file_id.clone(),
                transaction_id: String::new(),
                merged_filename: None,
                return_code: None,
                created,
            })
            .collect();
        let claimed = match self
            .micro_deposits
            .initiate_micro_deposits(depository_id, user_id, &deposits)
            .await
        {
            Ok(claimed) => claimed,
            Err(e) => {
                self.discard_file(&file_id).await;
                return Err(e.into());
            }
        };
        if !claimed {
            warn!(depository_id = %depository_id, file_id = %file_id, "micro-deposits initiated concurrently, discarding file");
            self.discard_file(&file_id).await;
            return Err(MicroDepositError::AlreadyInitiated);
        }

        let transaction_id = match self.odfi.post_micro_deposits(&dep, &amounts).await {
            Ok(id) => id,
            Err(e) => {
                error!(depository_id = %depository_id, file_id = %file_id, error = %e, "posting micro-deposits failed");
                self.cancel(depository_id, &file_id).await;
                return Err(e);
            }
        };
        if !transaction_id.is_empty() {
            if let Err(e) = self
                .micro_deposits
                .set_micro_deposit_transaction(depository_id, &file_id, &transaction_id)
                .await
            {
                warn!(file_id = %file_id, transaction_id = %transaction_id, error = %e, "failed to record ledger transaction");
            }
            for d in &mut deposits {
                d.transaction_id = transaction_id.clone();
            }
        }

        info!(depository_id = %depository_id, file_id = %file_id, "micro-deposits submitted");
        Ok(deposits)
    }

    /// One PPD file: a credit per amount plus a debit for their sum.
    fn build_file(
        &self,
        dep: &Depository,
        user_id: &UserId,
        amounts: &[Amount; 2],
        idempotency_key: &str,
        now: DateTime<Utc>,
    ) -> Result<crate::ach::File, MicroDepositError> {
        let originator = self.odfi.originator(user_id, now);
        let originator_dep = self.odfi.depository(user_id, now)?;
        let receiver = Receiver {
            id: ReceiverId::from(dep.id.as_str()),
            user_id: user_id.clone(),
            email: String::new(),
            default_depository: dep.id.clone(),
            status: ReceiverStatus::Verified,
            customer_id: None,
            metadata: dep.holder.clone(),
            birth_date: None,
            address: None,
            created: now,
            updated: now,
        };
        let transfer = Transfer {
            id: TransferId::new(),
            user_id: user_id.clone(),
            transfer_type: TransferType::Push,
            amount: amounts[0],
            originator: originator.id.clone(),
            originator_depository: originator_dep.id.clone(),
            receiver: receiver.id.clone(),
            receiver_depository: dep.id.clone(),
            description: self.odfi.description().to_string(),
            sec_code: SecCode::Ppd,
            status: TransferStatus::Pending,
            same_day: false,
            detail: None,
            return_code: None,
            file_id: None,
            trace_number: None,
            merged_filename: None,
            created: now,
            updated: now,
        };

        let parts = TransferParts::new(&transfer, &receiver, dep, &originator, &originator_dep);
        let ctx = BatchContext::new(now, self.rng.as_ref(), self.keeper.as_ref());
        let mut file = construct_file(FileId::new(), idempotency_key, &parts, &ctx)?;
        for amount in &amounts[1..] {
            append_credit_entry(&mut file, *amount)?;
        }
        append_withdraw_entry(&mut file, withdrawal_amount(amounts)?)?;
        Ok(file)
    }

    async fn discard_file(&self, file_id: &FileId) {
        if let Err(e) = self.ach.delete_file(file_id).await {
            warn!(file_id = %file_id, error = %e, "failed to delete ACH file");
        }
    }

    /// Undo a claimed initiation: remove its rows and its ACH file.
    async fn cancel(&self, depository_id: &DepositoryId, file_id: &FileId) {
        if let Err(e) = self
            .micro_deposits
            .cancel_micro_deposits(depository_id, file_id, Utc::now())
            .await
        {
            error!(depository_id = %depository_id, file_id = %file_id, error = %e, "failed to cancel micro-deposits");
        }
        self.discard_file(file_id).await;
    }

    /// Check a user's guesses, verifying the depository on a match.
    pub async fn confirm(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
        guesses: &[Amount],
    ) -> Result<(), MicroDepositError> {
        let dep = self.load_depository(depository_id, user_id).await?;
        if dep.status != DepositoryStatus::Unverified {
            return Err(MicroDepositError::NotEligible);
        }
        if !self.attempter.available(depository_id).await? {
            return Err(MicroDepositError::AttemptsExhausted);
        }
        self.attempter
            .record(depository_id, &describe(guesses))
            .await?;

        let persisted: Vec<Amount> = self
            .micro_deposits
            .get_micro_deposits(depository_id, user_id)
            .await?
            .into_iter()
            .map(|m| m.amount)
            .collect();
        if persisted.is_empty() {
            return Err(MicroDepositError::NotInitiated);
        }
        if persisted.len() != guesses.len() {
            return Err(MicroDepositError::IncorrectGuessCount);
        }
        if !guesses_match(&persisted, guesses) {
            return Err(MicroDepositError::IncorrectGuesses);
        }

        let now = Utc::now();
        let mut dep = dep;
        dep.transition(DepositoryStatus::Verified, now)?;
        self.depositories
            .update_depository_status(depository_id, dep.status, now)
            .await?;
        info!(depository_id = %depository_id, "depository verified by micro-deposits");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(s: &str) -> Amount {
        Amount::parse("USD", s).unwrap()
    }

    #[test]
    fn test_guesses_match_any_order() {
        let persisted = [usd("0.10"), usd("0.04")];
        assert!(guesses_match(&persisted, &[usd("0.04"), usd("0.10")]));
        assert!(guesses_match(&persisted, &[usd("0.10"), usd("0.04")]));
        assert!(!guesses_match(&persisted, &[usd("0.10"), usd("0.07")]));
        assert!(!guesses_match(&persisted, &[usd("0.10")]));
    }

    #[test]
    fn test_duplicates_need_duplicates() {
        let persisted = [usd("0.10"), usd("0.10")];
        assert!(guesses_match(&persisted, &[usd("0.10"), usd("0.10")]));
        assert!(!guesses_match(&[usd("0.10"), usd("0.04")], &[usd("0.10"), usd("0.10")]));
    }

    #[test]
    fn test_error_messages_do_not_leak() {
        assert_eq!(
            MicroDepositError::IncorrectGuesses.to_string(),
            "incorrect micro deposit guesses"
        );
        assert_eq!(
            MicroDepositError::IncorrectGuessCount.kind(),
            ErrorKind::Compliance
        );
        assert_eq!(MicroDepositError::AlreadyInitiated.kind(), ErrorKind::Conflict);
    }
}
