//! File assembly and in-flight batch mutation.

use tracing::debug;

use super::{BatchContext, CompileError, TransferParts, ccd, iat, next_trace_number, ppd, tel, web};
use crate::ach::{Batch, EntryDetail, File, FileHeader, ServiceClassCode, StandardBatch};
use crate::model::{FileId, SecCode};
use crate::money::Amount;

/// Build a one-batch file for a transfer, picking the compiler by SEC code.
pub fn construct_file(
    id: FileId,
    idempotency_key: &str,
    parts: &TransferParts<'_>,
    ctx: &BatchContext<'_>,
) -> Result<File, CompileError> {
    parts.check_eligible()?;

    let sec_code = parts.transfer.sec_code;
    let batch = match sec_code {
        SecCode::Ppd => ppd::compile(parts, ctx)?,
        SecCode::Ccd => ccd::compile(parts, ctx)?,
        SecCode::Tel => tel::compile(parts, ctx)?,
        SecCode::Web => web::compile(parts, ctx)?,
        SecCode::Iat => iat::compile(parts, ctx)?,
        other => return Err(CompileError::UnsupportedSecCode(other)),
    };

    let origin = parts.originator_depository;
    let destination = parts.receiver_depository;
    let header = FileHeader {
        immediate_origin: origin.routing_number.clone(),
        immediate_origin_name: origin.bank_name.clone(),
        immediate_destination: destination.routing_number.clone(),
        immediate_destination_name: destination.bank_name.clone(),
        file_creation_date: ctx.now.format("%y%m%d").to_string(),
        file_creation_time: ctx.now.format("%H%M").to_string(),
        file_id_modifier: "A".to_string(),
    };

    let mut file = File::new(id, header);
    file.add_batch(batch);
    debug!(
        file_id = %file.id,
        transfer_id = %parts.transfer_id,
        idempotency_key,
        sec_code = %sec_code,
        "constructed ACH file"
    );
    Ok(file)
}

/// Copy the last entry as a new credit for `amount`.
pub fn append_credit_entry(file: &mut File, amount: Amount) -> Result<(), CompileError> {
    let batch = single_standard_batch(file)?;
    let entry = next_entry(batch, amount)?;
    batch.add_entry(entry);
    Ok(())
}

/// Copy the last entry as a debit for `amount`. The batch becomes mixed.
pub fn append_withdraw_entry(file: &mut File, amount: Amount) -> Result<(), CompileError> {
    let batch = single_standard_batch(file)?;
    let mut entry = next_entry(batch, amount)?;
    entry.transaction_code = entry.transaction_code.debit_counterpart();
    batch.header.service_class_code = ServiceClassCode::MixedDebitsAndCredits;
    batch.add_entry(entry);
    Ok(())
}

fn single_standard_batch(file: &mut File) -> Result<&mut StandardBatch, CompileError> {
    if file.batches.len() != 1 {
        return Err(CompileError::WrongBatchCount(file.batches.len()));
    }
    match &mut file.batches[0] {
        Batch::Standard(batch) => Ok(batch),
        Batch::Iat(_) => Err(CompileError::UnsupportedBatch(SecCode::Iat)),
    }
}

fn next_entry(batch: &StandardBatch, amount: Amount) -> Result<EntryDetail, CompileError> {
    let last = batch.entries.last().ok_or(CompileError::EmptyBatch)?;
    let mut entry = last.clone();
    entry.id = ulid::Ulid::new().to_string().to_lowercase();
    entry.trace_number = next_trace_number(&last.trace_number)?;
    entry.amount = amount.cents();
    Ok(entry)
}
