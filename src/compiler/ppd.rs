//! PPD: prearranged payments and deposits to consumer accounts.

use super::{BatchContext, CompileError, TransferParts, batch_header, entry_detail};
use crate::ach::{Batch, StandardBatch};
use crate::model::SecCode;

pub fn compile(parts: &TransferParts<'_>, ctx: &BatchContext<'_>) -> Result<Batch, CompileError> {
    parts.check(SecCode::Ppd)?;

    let mut batch = StandardBatch::new(batch_header(parts, ctx));
    batch.add_entry(entry_detail(parts, ctx)?);
    Ok(Batch::Standard(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ach::{ServiceClassCode, TransactionCode};
    use crate::compiler::fixtures::Fixture;
    use crate::model::{AccountType, CcdDetail, SecDetail, TransferType};

    #[test]
    fn test_ppd_push() {
        let fx = Fixture::new(SecCode::Ppd, None);
        let Batch::Standard(batch) = compile(&fx.parts(), &fx.ctx()).unwrap() else {
            panic!("expected standard batch");
        };

        let h = &batch.header;
        assert_eq!(h.service_class_code, ServiceClassCode::CreditsOnly);
        assert_eq!(h.standard_entry_class_code, SecCode::Ppd);
        assert_eq!(h.company_name, "Acme Corp");
        assert_eq!(h.company_identification, "123456789");
        assert_eq!(h.odfi_identification, "12104288");
        assert_eq!(h.effective_entry_date, "240313");

        assert_eq!(batch.entries.len(), 1);
        let e = &batch.entries[0];
        assert_eq!(e.transaction_code, TransactionCode::CHECKING_CREDIT);
        assert_eq!(e.rdfi_identification, "23138010");
        assert_eq!(e.check_digit, "4");
        assert_eq!(e.dfi_account_number, "744-5678-99");
        assert_eq!(e.amount, 1250);
        assert_eq!(e.individual_name, "Jane Doe");
        assert_eq!(e.trace_number.len(), 15);
        assert!(e.trace_number.starts_with("12104288"));
        assert!(e.addenda05.is_empty());
        assert_eq!(batch.control.total_credit_entry_dollar_amount, 1250);
    }

    #[test]
    fn test_ppd_pull_from_savings() {
        let mut fx = Fixture::new(SecCode::Ppd, None);
        fx.transfer.transfer_type = TransferType::Pull;
        fx.receiver_dep.account_type = AccountType::Savings;
        let Batch::Standard(batch) = compile(&fx.parts(), &fx.ctx()).unwrap() else {
            panic!("expected standard batch");
        };
        assert_eq!(batch.header.service_class_code, ServiceClassCode::DebitsOnly);
        assert_eq!(batch.entries[0].transaction_code, TransactionCode::SAVINGS_DEBIT);
    }

    #[test]
    fn test_ppd_rejects_foreign_detail() {
        let mut fx = Fixture::new(SecCode::Ppd, None);
        fx.transfer.detail = Some(SecDetail::Ccd(CcdDetail {
            payment_information: "inv".to_string(),
        }));
        let err = compile(&fx.parts(), &fx.ctx()).unwrap_err();
        assert_eq!(err.code(), "SEC_CODE_MISMATCH");
    }

    #[test]
    fn test_ppd_rejects_other_sec_code() {
        let fx = Fixture::new(SecCode::Web, None);
        assert!(matches!(
            compile(&fx.parts(), &fx.ctx()),
            Err(CompileError::SecMismatch { .. })
        ));
    }
}
