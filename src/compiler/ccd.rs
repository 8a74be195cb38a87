//! CCD: corporate credit or debit between business accounts.

use super::{BatchContext, CompileError, TransferParts, batch_header, entry_detail};
use crate::ach::{Batch, StandardBatch};
use crate::model::{ModelError, SecCode, SecDetail};

pub fn compile(parts: &TransferParts<'_>, ctx: &BatchContext<'_>) -> Result<Batch, CompileError> {
    parts.check(SecCode::Ccd)?;
    let Some(SecDetail::Ccd(detail)) = parts.detail() else {
        return Err(CompileError::MissingDetail(SecCode::Ccd));
    };
    if detail.payment_information.trim().is_empty() {
        return Err(ModelError::invalid("CCDDetail.paymentInformation", "must not be empty").into());
    }

    let mut entry = entry_detail(parts, ctx)?;
    entry.add_addenda05(&detail.payment_information);

    let mut batch = StandardBatch::new(batch_header(parts, ctx));
    batch.add_entry(entry);
    Ok(Batch::Standard(batch))
}
