//! TEL: debits authorized orally over the telephone.
//!
//! Only single payments are accepted. Recurring TEL authorizations need a
//! written confirmation workflow that this service does not run.

use super::{BatchContext, CompileError, TransferParts, batch_header, entry_detail};
use crate::ach::{Batch, StandardBatch};
use crate::model::{PaymentType, SecCode, SecDetail};

pub fn compile(parts: &TransferParts<'_>, ctx: &BatchContext<'_>) -> Result<Batch, CompileError> {
    parts.check(SecCode::Tel)?;
    let Some(SecDetail::Tel(detail)) = parts.detail() else {
        return Err(CompileError::MissingDetail(SecCode::Tel));
    };
    if detail.payment_type == PaymentType::Recurring {
        return Err(CompileError::RecurringNotSupported(SecCode::Tel));
    }

    let mut entry = entry_detail(parts, ctx)?;
    entry.discretionary_data = detail.payment_type.discretionary_code().to_string();

    let mut batch = StandardBatch::new(batch_header(parts, ctx));
    batch.add_entry(entry);
    Ok(Batch::Standard(batch))
}
