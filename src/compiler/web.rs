//! WEB: entries authorized over the internet.

use super::{BatchContext, CompileError, TransferParts, batch_header, entry_detail};
use crate::ach::{Batch, StandardBatch};
use crate::model::{PaymentType, SecCode, SecDetail};

pub fn compile(parts: &TransferParts<'_>, ctx: &BatchContext<'_>) -> Result<Batch, CompileError> {
    parts.check(SecCode::Web)?;
    let Some(SecDetail::Web(detail)) = parts.detail() else {
        return Err(CompileError::MissingDetail(SecCode::Web));
    };
    if detail.payment_type == PaymentType::Recurring {
        return Err(CompileError::RecurringNotSupported(SecCode::Web));
    }

    let mut entry = entry_detail(parts, ctx)?;
    entry.discretionary_data = detail.payment_type.discretionary_code().to_string();
    if !detail.payment_information.trim().is_empty() {
        entry.add_addenda05(&detail.payment_information);
    }

    let mut batch = StandardBatch::new(batch_header(parts, ctx));
    batch.add_entry(entry);
    Ok(Batch::Standard(batch))
}
