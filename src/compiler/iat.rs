//! IAT: international ACH transactions.
//!
//! The detail block is validated in full before anything is built; the entry
//! then carries the seven mandatory addenda (10-16) plus one Addenda18 for the
//! foreign correspondent bank.

use super::{
    BatchContext, CompileError, TransferParts, effective_entry_date, service_class_code,
    trace_number, transaction_code,
};
use crate::ach::{
    Addenda10, Addenda11, Addenda12, Addenda13, Addenda14, Addenda15, Addenda16, Addenda18, Batch,
    IatBatch, IatBatchHeader, IatEntryDetail,
};
use crate::model::routing::{aba8, aba_check_digit};
use crate::model::transfer::IatAddress;
use crate::model::{HolderType, IatBank, SecCode, SecDetail};

/// Addenda10 through Addenda16
const MANDATORY_ADDENDA: u32 = 7;

pub fn compile(parts: &TransferParts<'_>, ctx: &BatchContext<'_>) -> Result<Batch, CompileError> {
    parts.check(SecCode::Iat)?;
    let Some(SecDetail::Iat(detail)) = parts.detail() else {
        return Err(CompileError::MissingDetail(SecCode::Iat));
    };
    detail.validate()?;

    let transfer = parts.transfer;
    let receiver_dep = parts.receiver_depository;

    let header = IatBatchHeader {
        id: parts.transfer_id.to_string(),
        service_class_code: service_class_code(transfer.transfer_type),
        iat_indicator: String::new(),
        foreign_exchange_indicator: "FF".to_string(),
        foreign_exchange_reference_indicator: 3,
        foreign_exchange_reference: String::new(),
        iso_destination_country_code: detail.destination_country_code.to_ascii_uppercase(),
        originator_identification: parts.originator.identification.clone(),
        standard_entry_class_code: SecCode::Iat,
        company_entry_description: transfer.description.clone(),
        iso_originating_currency_code: detail.origination_currency_code.to_ascii_uppercase(),
        iso_destination_currency_code: detail.destination_currency_code.to_ascii_uppercase(),
        effective_entry_date: effective_entry_date(ctx.now),
        odfi_identification: aba8(&parts.originator_depository.routing_number).to_string(),
    };

    let transaction_type_code = match receiver_dep.holder_type {
        HolderType::Business => "BUS",
        HolderType::Individual => "MIS",
    };

    let entry = IatEntryDetail {
        id: parts.transfer_id.to_string(),
        transaction_code: transaction_code(
            receiver_dep.account_type,
            transfer.transfer_type,
            SecCode::Iat,
        ),
        rdfi_identification: aba8(&receiver_dep.routing_number).to_string(),
        check_digit: aba_check_digit(&receiver_dep.routing_number),
        addenda_records: MANDATORY_ADDENDA + 1,
        dfi_account_number: receiver_dep.decrypt_account_number(ctx.keeper)?,
        amount: transfer.amount.cents(),
        ofac_screening_indicator: String::new(),
        secondary_ofac_screening_indicator: String::new(),
        trace_number: trace_number(&parts.originator_depository.routing_number, ctx.rng),
        addenda10: Addenda10 {
            transaction_type_code: transaction_type_code.to_string(),
            foreign_payment_amount: transfer.amount.cents(),
            foreign_trace_number: String::new(),
            name: detail.receiver_name.clone(),
        },
        addenda11: Addenda11 {
            originator_name: detail.originator_name.clone(),
            originator_street_address: detail.originator_address.street.clone(),
        },
        addenda12: Addenda12 {
            originator_city_state_province: city_state(&detail.originator_address),
            originator_country_postal_code: country_postal(&detail.originator_address),
        },
        addenda13: Addenda13 {
            odfi_name: detail.odfi.name.clone(),
            odfi_id_number_qualifier: detail.odfi.id_number_qualifier.clone(),
            odfi_identification: detail.odfi.identification.clone(),
            odfi_branch_country_code: detail.odfi.branch_country_code.to_ascii_uppercase(),
        },
        addenda14: Addenda14 {
            rdfi_name: detail.rdfi.name.clone(),
            rdfi_id_number_qualifier: detail.rdfi.id_number_qualifier.clone(),
            rdfi_identification: detail.rdfi.identification.clone(),
            rdfi_branch_country_code: detail.rdfi.branch_country_code.to_ascii_uppercase(),
        },
        addenda15: Addenda15 {
            receiver_id_number: detail.receiver_identification_number.clone(),
            receiver_street_address: detail.receiver_address.street.clone(),
        },
        addenda16: Addenda16 {
            receiver_city_state_province: city_state(&detail.receiver_address),
            receiver_country_postal_code: country_postal(&detail.receiver_address),
        },
        addenda18: vec![correspondent(&detail.foreign_correspondent_bank, 1)],
    };

    let mut batch = IatBatch::new(header);
    batch.add_entry(entry);
    Ok(Batch::Iat(batch))
}

// NACHA layout: `City*State\` and `CC*Postal\`
fn city_state(addr: &IatAddress) -> String {
    format!("{}*{}\\", addr.city, addr.state)
}

fn country_postal(addr: &IatAddress) -> String {
    format!("{}*{}\\", addr.country_code.to_ascii_uppercase(), addr.postal_code)
}

fn correspondent(bank: &IatBank, sequence_number: u32) -> Addenda18 {
    Addenda18 {
        foreign_correspondent_bank_name: bank.name.clone(),
        foreign_correspondent_bank_id_number_qualifier: bank.id_number_qualifier.clone(),
        foreign_correspondent_bank_id_number: bank.identification.clone(),
        foreign_correspondent_bank_branch_country_code: bank.branch_country_code.to_ascii_uppercase(),
        sequence_number,
    }
}
