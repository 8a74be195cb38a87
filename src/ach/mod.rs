//! ACH record model
//!
//! Populated file header, batch headers, entry details and addenda as the
//! ACH service expects them in JSON. Fixed-width NACHA encoding and file
//! checksums belong to that service; this module only carries values and the
//! batch control totals derived from them.

pub mod client;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{FileId, SecCode};

pub use client::{AchClient, AchError, HttpAchClient, MockAchClient, RetryPolicy, create_with_retry};

// ============================================================================
// Codes
// ============================================================================

/// Batch service class code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ServiceClassCode {
    MixedDebitsAndCredits = 200,
    CreditsOnly = 220,
    DebitsOnly = 225,
}

impl From<ServiceClassCode> for u16 {
    fn from(code: ServiceClassCode) -> u16 {
        code as u16
    }
}

impl TryFrom<u16> for ServiceClassCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            200 => Ok(ServiceClassCode::MixedDebitsAndCredits),
            220 => Ok(ServiceClassCode::CreditsOnly),
            225 => Ok(ServiceClassCode::DebitsOnly),
            other => Err(format!("unknown service class code {}", other)),
        }
    }
}

/// Two digit entry transaction code.
///
/// The second digit encodes direction: 0-4 credit, 5-9 debit. A debit code
/// is its credit counterpart plus five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionCode(u8);

impl TransactionCode {
    pub const CHECKING_CREDIT: TransactionCode = TransactionCode(22);
    pub const CHECKING_DEBIT: TransactionCode = TransactionCode(27);
    pub const SAVINGS_CREDIT: TransactionCode = TransactionCode(32);
    pub const SAVINGS_DEBIT: TransactionCode = TransactionCode(37);

    /// Offset between a credit code and its debit counterpart
    pub const DEBIT_OFFSET: u8 = 5;

    pub fn new(code: u8) -> Self {
        Self(code)
    }

    #[inline]
    pub fn value(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_debit(&self) -> bool {
        self.0 % 10 >= 5
    }

    #[inline]
    pub fn is_credit(&self) -> bool {
        !self.is_debit()
    }

    pub fn debit_counterpart(&self) -> TransactionCode {
        if self.is_debit() {
            *self
        } else {
            TransactionCode(self.0 + Self::DEBIT_OFFSET)
        }
    }
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

// ============================================================================
// File
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHeader {
    pub immediate_origin: String,
    pub immediate_origin_name: String,
    pub immediate_destination: String,
    pub immediate_destination_name: String,
    /// YYMMDD
    pub file_creation_date: String,
    /// HHMM
    pub file_creation_time: String,
    pub file_id_modifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: FileId,
    pub header: FileHeader,
    pub batches: Vec<Batch>,
}

impl File {
    pub fn new(id: FileId, header: FileHeader) -> Self {
        Self {
            id,
            header,
            batches: Vec::new(),
        }
    }

    pub fn add_batch(&mut self, batch: Batch) {
        self.batches.push(batch);
    }

    /// Trace numbers of every entry, in file order.
    pub fn trace_numbers(&self) -> Vec<&str> {
        self.batches
            .iter()
            .flat_map(|b| match b {
                Batch::Standard(s) => s
                    .entries
                    .iter()
                    .map(|e| e.trace_number.as_str())
                    .collect::<Vec<_>>(),
                Batch::Iat(i) => i
                    .entries
                    .iter()
                    .map(|e| e.trace_number.as_str())
                    .collect::<Vec<_>>(),
            })
            .collect()
    }
}

// ============================================================================
// Batches
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Batch {
    Standard(StandardBatch),
    Iat(IatBatch),
}

impl Batch {
    pub fn sec_code(&self) -> SecCode {
        match self {
            Batch::Standard(b) => b.header.standard_entry_class_code,
            Batch::Iat(_) => SecCode::Iat,
        }
    }

    pub fn control(&self) -> &BatchControl {
        match self {
            Batch::Standard(b) => &b.control,
            Batch::Iat(b) => &b.control,
        }
    }

    pub fn entry_count(&self) -> usize {
        match self {
            Batch::Standard(b) => b.entries.len(),
            Batch::Iat(b) => b.entries.len(),
        }
    }
}

/// Totals summarizing a batch's entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchControl {
    pub entry_addenda_count: usize,
    /// Sum of RDFI identifications, low ten digits
    pub entry_hash: u64,
    pub total_debit_entry_dollar_amount: i64,
    pub total_credit_entry_dollar_amount: i64,
}

impl BatchControl {
    fn accumulate(&mut self, code: TransactionCode, rdfi: &str, amount: i64, addenda: usize) {
        self.entry_addenda_count += 1 + addenda;
        self.entry_hash = (self.entry_hash + rdfi.parse::<u64>().unwrap_or(0)) % 10_000_000_000;
        if code.is_debit() {
            self.total_debit_entry_dollar_amount += amount;
        } else {
            self.total_credit_entry_dollar_amount += amount;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchHeader {
    pub id: String,
    pub service_class_code: ServiceClassCode,
    pub company_name: String,
    pub company_identification: String,
    pub standard_entry_class_code: SecCode,
    pub company_entry_description: String,
    /// YYMMDD
    pub effective_entry_date: String,
    pub odfi_identification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda05 {
    pub payment_related_information: String,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDetail {
    pub id: String,
    pub transaction_code: TransactionCode,
    pub rdfi_identification: String,
    pub check_digit: String,
    pub dfi_account_number: String,
    /// Cents
    pub amount: i64,
    pub identification_number: String,
    pub individual_name: String,
    pub discretionary_data: String,
    pub trace_number: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addenda05: Vec<Addenda05>,
}

impl EntryDetail {
    pub fn add_addenda05(&mut self, payment_related_information: &str) {
        let sequence_number = self.addenda05.len() as u32 + 1;
        self.addenda05.push(Addenda05 {
            payment_related_information: payment_related_information.to_string(),
            sequence_number,
        });
    }
}

/// PPD, CCD, TEL and WEB batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardBatch {
    pub header: BatchHeader,
    pub entries: Vec<EntryDetail>,
    pub control: BatchControl,
}

impl StandardBatch {
    pub fn new(header: BatchHeader) -> Self {
        Self {
            header,
            entries: Vec::new(),
            control: BatchControl::default(),
        }
    }

    pub fn add_entry(&mut self, entry: EntryDetail) {
        self.entries.push(entry);
        self.recompute_control();
    }

    pub fn recompute_control(&mut self) {
        let mut control = BatchControl::default();
        for e in &self.entries {
            control.accumulate(
                e.transaction_code,
                &e.rdfi_identification,
                e.amount,
                e.addenda05.len(),
            );
        }
        self.control = control;
    }
}

// ============================================================================
// IAT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IatBatchHeader {
    pub id: String,
    pub service_class_code: ServiceClassCode,
    pub iat_indicator: String,
    /// "FF" fixed-to-fixed
    pub foreign_exchange_indicator: String,
    pub foreign_exchange_reference_indicator: u8,
    pub foreign_exchange_reference: String,
    pub iso_destination_country_code: String,
    pub originator_identification: String,
    pub standard_entry_class_code: SecCode,
    pub company_entry_description: String,
    pub iso_originating_currency_code: String,
    pub iso_destination_currency_code: String,
    /// YYMMDD
    pub effective_entry_date: String,
    pub odfi_identification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda10 {
    /// "ANN" annuity, "BUS" business, "MIS" miscellaneous, ...
    pub transaction_type_code: String,
    pub foreign_payment_amount: i64,
    pub foreign_trace_number: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda11 {
    pub originator_name: String,
    pub originator_street_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda12 {
    /// `City*State\`
    pub originator_city_state_province: String,
    /// `CC*Postal\`
    pub originator_country_postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda13 {
    pub odfi_name: String,
    pub odfi_id_number_qualifier: String,
    pub odfi_identification: String,
    pub odfi_branch_country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda14 {
    pub rdfi_name: String,
    pub rdfi_id_number_qualifier: String,
    pub rdfi_identification: String,
    pub rdfi_branch_country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda15 {
    pub receiver_id_number: String,
    pub receiver_street_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda16 {
    pub receiver_city_state_province: String,
    pub receiver_country_postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addenda18 {
    pub foreign_correspondent_bank_name: String,
    pub foreign_correspondent_bank_id_number_qualifier: String,
    pub foreign_correspondent_bank_id_number: String,
    pub foreign_correspondent_bank_branch_country_code: String,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IatEntryDetail {
    pub id: String,
    pub transaction_code: TransactionCode,
    pub rdfi_identification: String,
    pub check_digit: String,
    /// Count of addenda records attached (7 mandatory plus any 18s)
    pub addenda_records: u32,
    pub dfi_account_number: String,
    pub amount: i64,
    pub ofac_screening_indicator: String,
    pub secondary_ofac_screening_indicator: String,
    pub trace_number: String,
    pub addenda10: Addenda10,
    pub addenda11: Addenda11,
    pub addenda12: Addenda12,
    pub addenda13: Addenda13,
    pub addenda14: Addenda14,
    pub addenda15: Addenda15,
    pub addenda16: Addenda16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addenda18: Vec<Addenda18>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IatBatch {
    pub header: IatBatchHeader,
    pub entries: Vec<IatEntryDetail>,
    pub control: BatchControl,
}

impl IatBatch {
    pub fn new(header: IatBatchHeader) -> Self {
        Self {
            header,
            entries: Vec::new(),
            control: BatchControl::default(),
        }
    }

    pub fn add_entry(&mut self, entry: IatEntryDetail) {
        self.entries.push(entry);
        let mut control = BatchControl::default();
        for e in &self.entries {
            control.accumulate(
                e.transaction_code,
                &e.rdfi_identification,
                e.amount,
                e.addenda_records as usize,
            );
        }
        self.control = control;
    }
}
