//! SEC batch compilers
//!
//! Each compiler maps a pending transfer and its resolved entities into a
//! populated ACH batch. Compilers are pure: time, randomness and account
//! number decryption all arrive through [`BatchContext`].
//!
//! Field derivation shared by every SEC code:
//! - service class: credits only for push, debits only for pull
//! - transaction code: receiver account type x direction (TEL always debits)
//! - trace number: ODFI routing prefix + random suffix, 15 digits
//! - effective entry date: next banking day after `now`

pub mod ccd;
pub mod error;
pub mod file;
pub mod iat;
pub mod ppd;
pub mod tel;
pub mod web;

pub use error::CompileError;
pub use file::{append_credit_entry, append_withdraw_entry, construct_file};

use chrono::{DateTime, Utc};

use crate::ach::{BatchHeader, EntryDetail, ServiceClassCode, TransactionCode};
use crate::calendar::add_banking_days;
use crate::model::routing::{aba8, aba_check_digit};
use crate::model::{
    AccountType, Depository, Originator, Receiver, SecCode, SecDetail, Transfer, TransferId,
    TransferStatus, TransferType, UserId,
};
use crate::rng::RandomSource;
use crate::secrets::StringKeeper;

pub const TRACE_NUMBER_LEN: usize = 15;

/// Capabilities a compiler draws on.
#[derive(Clone, Copy)]
pub struct BatchContext<'a> {
    pub now: DateTime<Utc>,
    pub rng: &'a dyn RandomSource,
    pub keeper: &'a dyn StringKeeper,
}

impl<'a> BatchContext<'a> {
    pub fn new(now: DateTime<Utc>, rng: &'a dyn RandomSource, keeper: &'a dyn StringKeeper) -> Self {
        Self { now, rng, keeper }
    }
}

/// A transfer with every entity it references.
#[derive(Debug, Clone, Copy)]
pub struct TransferParts<'a> {
    pub transfer_id: &'a TransferId,
    pub user_id: &'a UserId,
    pub transfer: &'a Transfer,
    pub receiver: &'a Receiver,
    pub receiver_depository: &'a Depository,
    pub originator: &'a Originator,
    pub originator_depository: &'a Depository,
}

impl<'a> TransferParts<'a> {
    pub fn new(
        transfer: &'a Transfer,
        receiver: &'a Receiver,
        receiver_depository: &'a Depository,
        originator: &'a Originator,
        originator_depository: &'a Depository,
    ) -> Self {
        Self {
            transfer_id: &transfer.id,
            user_id: &transfer.user_id,
            transfer,
            receiver,
            receiver_depository,
            originator,
            originator_depository,
        }
    }

    /// Status and receiver checks every compiler starts with.
    pub(crate) fn check_eligible(&self) -> Result<(), CompileError> {
        if self.transfer.status != TransferStatus::Pending {
            return Err(CompileError::NotPending(self.transfer.status));
        }
        if self.transfer.transfer_type == TransferType::Pull && !self.receiver.is_verified() {
            return Err(CompileError::ReceiverNotVerified(self.receiver.id.clone()));
        }
        Ok(())
    }

    /// Eligibility plus SEC code agreement between the transfer, its detail
    /// payload and the compiler being run.
    pub(crate) fn check(&self, compiler: SecCode) -> Result<(), CompileError> {
        self.check_eligible()?;
        if self.transfer.sec_code != compiler {
            return Err(CompileError::SecMismatch {
                transfer: self.transfer.sec_code,
                compiler,
            });
        }
        if let Some(detail) = &self.transfer.detail
            && detail.sec_code() != compiler
        {
            return Err(CompileError::SecMismatch {
                transfer: detail.sec_code(),
                compiler,
            });
        }
        Ok(())
    }

    pub(crate) fn detail(&self) -> Option<&'a SecDetail> {
        self.transfer.detail.as_ref()
    }
}

pub fn service_class_code(transfer_type: TransferType) -> ServiceClassCode {
    match transfer_type {
        TransferType::Push => ServiceClassCode::CreditsOnly,
        TransferType::Pull => ServiceClassCode::DebitsOnly,
    }
}

pub fn transaction_code(
    account_type: AccountType,
    transfer_type: TransferType,
    sec_code: SecCode,
) -> TransactionCode {
    let debit = sec_code == SecCode::Tel || transfer_type == TransferType::Pull;
    match (account_type, debit) {
        (AccountType::Checking, false) => TransactionCode::CHECKING_CREDIT,
        (AccountType::Checking, true) => TransactionCode::CHECKING_DEBIT,
        (AccountType::Savings, false) => TransactionCode::SAVINGS_CREDIT,
        (AccountType::Savings, true) => TransactionCode::SAVINGS_DEBIT,
    }
}

pub fn trace_number(odfi_routing_number: &str, rng: &dyn RandomSource) -> String {
    let mut trace = format!("{}{:07}", aba8(odfi_routing_number), rng.next_u64() >> 1);
    trace.truncate(TRACE_NUMBER_LEN);
    trace
}

/// Digits after the ODFI routing prefix of a trace number.
const TRACE_SUFFIX_LEN: usize = 7;

/// Successor of a numeric trace number. Only the sequence suffix moves; it
/// wraps to zero instead of carrying into the routing prefix.
pub fn next_trace_number(trace: &str) -> Result<String, CompileError> {
    if trace.is_empty() || !trace.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CompileError::InvalidTraceNumber(trace.to_string()));
    }
    let (prefix, suffix) = trace.split_at(trace.len().saturating_sub(TRACE_SUFFIX_LEN));
    let n: u64 = suffix
        .parse()
        .map_err(|_| CompileError::InvalidTraceNumber(trace.to_string()))?;
    let next = (n + 1) % 10u64.pow(suffix.len() as u32);
    Ok(format!("{prefix}{:0width$}", next, width = suffix.len()))
}

/// Next banking day, formatted YYMMDD.
pub fn effective_entry_date(now: DateTime<Utc>) -> String {
    add_banking_days(now.date_naive(), 1)
        .format("%y%m%d")
        .to_string()
}

fn identification_number(rng: &dyn RandomSource) -> String {
    format!("{:015}", rng.next_u64() % 1_000_000_000_000_000)
}

/// Batch header shared by PPD, CCD, TEL and WEB.
pub(crate) fn batch_header(parts: &TransferParts<'_>, ctx: &BatchContext<'_>) -> BatchHeader {
    BatchHeader {
        id: parts.transfer_id.to_string(),
        service_class_code: service_class_code(parts.transfer.transfer_type),
        company_name: parts.originator.metadata.clone(),
        company_identification: parts.originator.identification.clone(),
        standard_entry_class_code: parts.transfer.sec_code,
        company_entry_description: parts.transfer.description.clone(),
        effective_entry_date: effective_entry_date(ctx.now),
        odfi_identification: aba8(&parts.originator_depository.routing_number).to_string(),
    }
}

/// Entry detail shared by PPD, CCD, TEL and WEB.
pub(crate) fn entry_detail(
    parts: &TransferParts<'_>,
    ctx: &BatchContext<'_>,
) -> Result<EntryDetail, CompileError> {
    let receiver_dep = parts.receiver_depository;
    Ok(EntryDetail {
        id: parts.transfer_id.to_string(),
        transaction_code: transaction_code(
            receiver_dep.account_type,
            parts.transfer.transfer_type,
            parts.transfer.sec_code,
        ),
        rdfi_identification: aba8(&receiver_dep.routing_number).to_string(),
        check_digit: aba_check_digit(&receiver_dep.routing_number),
        dfi_account_number: receiver_dep.decrypt_account_number(ctx.keeper)?,
        amount: parts.transfer.amount.cents(),
        identification_number: identification_number(ctx.rng),
        individual_name: parts.receiver.metadata.clone(),
        discretionary_data: String::new(),
        trace_number: trace_number(&parts.originator_depository.routing_number, ctx.rng),
        addenda05: Vec::new(),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::Fixture;
    use super::*;
    use crate::rng::ScriptedRandom;

    #[test]
    fn test_transaction_codes() {
        use AccountType::*;
        use TransferType::*;
        assert_eq!(transaction_code(Checking, Push, SecCode::Ppd).value(), 22);
        assert_eq!(transaction_code(Checking, Pull, SecCode::Ppd).value(), 27);
        assert_eq!(transaction_code(Savings, Push, SecCode::Web).value(), 32);
        assert_eq!(transaction_code(Savings, Pull, SecCode::Ccd).value(), 37);
        // TEL debits regardless of direction
        assert_eq!(transaction_code(Checking, Push, SecCode::Tel).value(), 27);
        assert_eq!(transaction_code(Savings, Push, SecCode::Tel).value(), 37);
    }

    #[test]
    fn test_service_class_codes() {
        assert_eq!(
            service_class_code(TransferType::Push),
            ServiceClassCode::CreditsOnly
        );
        assert_eq!(
            service_class_code(TransferType::Pull),
            ServiceClassCode::DebitsOnly
        );
    }

    #[test]
    fn test_trace_number_shape() {
        let rng = ScriptedRandom::new(vec![6]);
        assert_eq!(trace_number("121042882", &rng), "121042880000003");

        let rng = ScriptedRandom::new(vec![u64::MAX]);
        let trace = trace_number("121042882", &rng);
        assert_eq!(trace.len(), TRACE_NUMBER_LEN);
        assert!(trace.starts_with("12104288"));
    }

    #[test]
    fn test_next_trace_number_keeps_width() {
        assert_eq!(next_trace_number("121042880000003").unwrap(), "121042880000004");
        assert_eq!(next_trace_number("0009").unwrap(), "0010");
        assert!(next_trace_number("12104288abc").is_err());
        assert!(next_trace_number("").is_err());
    }

    #[test]
    fn test_next_trace_number_wraps_inside_suffix() {
        assert_eq!(next_trace_number("121042889999999").unwrap(), "121042880000000");
        assert_eq!(next_trace_number("9999").unwrap(), "0000");
    }

    #[test]
    fn test_effective_entry_date_skips_weekend() {
        use chrono::TimeZone;
        // Friday
        let friday = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(effective_entry_date(friday), "240318");
    }

    #[test]
    fn test_pull_requires_verified_receiver() {
        let mut fx = Fixture::new(SecCode::Ppd, None);
        fx.transfer.transfer_type = TransferType::Pull;
        fx.receiver.status = crate::model::ReceiverStatus::Unverified;
        let err = fx.parts().check(SecCode::Ppd).unwrap_err();
        assert_eq!(err.code(), "RECEIVER_NOT_VERIFIED");

        // push to an unverified receiver is allowed
        fx.transfer.transfer_type = TransferType::Push;
        assert!(fx.parts().check(SecCode::Ppd).is_ok());
    }

    #[test]
    fn test_only_pending_compiles() {
        let mut fx = Fixture::new(SecCode::Ppd, None);
        fx.transfer.status = TransferStatus::Processed;
        let err = fx.parts().check(SecCode::Ppd).unwrap_err();
        assert_eq!(err, CompileError::NotPending(TransferStatus::Processed));
    }
}
