//! Transfer entity and SEC detail payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DepositoryId, FileId, ModelError, OriginatorId, ReceiverId, TransferId, UserId, require};
use crate::money::{Amount, Currency};

// ============================================================================
// Vocabularies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    /// Credit the receiver
    Push,
    /// Debit the receiver
    Pull,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Push => "push",
            TransferType::Pull => "pull",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(TransferType::Push),
            "pull" => Ok(TransferType::Pull),
            _ => Err(ModelError::unknown("transfer type", s)),
        }
    }
}

/// Transfer lifecycle
///
/// ```text
/// PENDING → PROCESSED → RECLAIMED
///    ↓  ↘        ↓
/// CANCELED FAILED ←┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Processed,
    Failed,
    Canceled,
    Reclaimed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Processed => "processed",
            TransferStatus::Failed => "failed",
            TransferStatus::Canceled => "canceled",
            TransferStatus::Reclaimed => "reclaimed",
        }
    }

    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Pending, Processed)
                | (Pending, Failed)
                | (Pending, Canceled)
                | (Processed, Reclaimed)
                | (Processed, Failed)
        )
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Failed | TransferStatus::Canceled | TransferStatus::Reclaimed
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransferStatus::Pending),
            "processed" => Ok(TransferStatus::Processed),
            "failed" => Ok(TransferStatus::Failed),
            "canceled" => Ok(TransferStatus::Canceled),
            "reclaimed" => Ok(TransferStatus::Reclaimed),
            _ => Err(ModelError::unknown("transfer status", s)),
        }
    }
}

/// NACHA Standard Entry Class codes.
///
/// Only PPD, CCD, TEL, WEB and IAT can be compiled; the rest are recognized
/// so they can be rejected with a precise error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecCode {
    Ppd,
    Ccd,
    Tel,
    Web,
    Iat,
    Arc,
    Boc,
    Cie,
    Ctx,
    Pop,
    Rck,
}

impl SecCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecCode::Ppd => "PPD",
            SecCode::Ccd => "CCD",
            SecCode::Tel => "TEL",
            SecCode::Web => "WEB",
            SecCode::Iat => "IAT",
            SecCode::Arc => "ARC",
            SecCode::Boc => "BOC",
            SecCode::Cie => "CIE",
            SecCode::Ctx => "CTX",
            SecCode::Pop => "POP",
            SecCode::Rck => "RCK",
        }
    }

    /// Whether a batch compiler exists for this code
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            SecCode::Ppd | SecCode::Ccd | SecCode::Tel | SecCode::Web | SecCode::Iat
        )
    }
}

impl fmt::Display for SecCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecCode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s.trim().to_ascii_uppercase().as_str() {
            "PPD" => SecCode::Ppd,
            "CCD" => SecCode::Ccd,
            "TEL" => SecCode::Tel,
            "WEB" => SecCode::Web,
            "IAT" => SecCode::Iat,
            "ARC" => SecCode::Arc,
            "BOC" => SecCode::Boc,
            "CIE" => SecCode::Cie,
            "CTX" => SecCode::Ctx,
            "POP" => SecCode::Pop,
            "RCK" => SecCode::Rck,
            _ => return Err(ModelError::unknown("SEC code", s)),
        };
        Ok(code)
    }
}

/// Single or recurring authorization (TEL / WEB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Single,
    Recurring,
}

impl PaymentType {
    /// Value carried in the entry's discretionary data
    pub fn discretionary_code(&self) -> &'static str {
        match self {
            PaymentType::Single => "S",
            PaymentType::Recurring => "R",
        }
    }
}

// ============================================================================
// SEC detail payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcdDetail {
    pub payment_information: String,
}

/// Oral authorization captured over the phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelDetail {
    pub phone_number: String,
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDetail {
    pub payment_information: String,
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IatAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// ISO-3166 alpha-2
    pub country_code: String,
}

impl IatAddress {
    fn validate(&self, field: &'static str) -> Result<(), ModelError> {
        require(field, &self.street)?;
        require(field, &self.city)?;
        require(field, &self.state)?;
        require(field, &self.postal_code)?;
        validate_country(field, &self.country_code)
    }
}

/// Financial institution participating in a cross-border entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IatBank {
    pub name: String,
    /// "01" national clearing system, "02" BIC, "03" IBAN
    pub id_number_qualifier: String,
    pub identification: String,
    /// ISO-3166 alpha-2
    pub branch_country_code: String,
}

impl IatBank {
    fn validate(&self, field: &'static str) -> Result<(), ModelError> {
        require(field, &self.name)?;
        if !matches!(self.id_number_qualifier.as_str(), "01" | "02" | "03") {
            return Err(ModelError::invalid(field, "id number qualifier must be 01, 02 or 03"));
        }
        require(field, &self.identification)?;
        validate_country(field, &self.branch_country_code)
    }
}

/// Cross-border (IAT) detail block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IatDetail {
    pub originator_name: String,
    pub originator_address: IatAddress,
    pub receiver_name: String,
    pub receiver_address: IatAddress,
    pub receiver_identification_number: String,
    pub odfi: IatBank,
    pub rdfi: IatBank,
    pub foreign_correspondent_bank: IatBank,
    /// ISO-3166 alpha-2 of the receiving country
    pub destination_country_code: String,
    pub origination_currency_code: String,
    pub destination_currency_code: String,
}

impl IatDetail {
    /// Every sub-field is mandatory.
    pub fn validate(&self) -> Result<(), ModelError> {
        require("iatDetail.originatorName", &self.originator_name)?;
        self.originator_address
            .validate("iatDetail.originatorAddress")?;
        require("iatDetail.receiverName", &self.receiver_name)?;
        self.receiver_address.validate("iatDetail.receiverAddress")?;
        self.odfi.validate("iatDetail.odfi")?;
        self.rdfi.validate("iatDetail.rdfi")?;
        self.foreign_correspondent_bank
            .validate("iatDetail.foreignCorrespondentBank")?;
        validate_country("iatDetail.destinationCountryCode", &self.destination_country_code)?;
        Currency::parse(&self.origination_currency_code)?;
        Currency::parse(&self.destination_currency_code)?;
        Ok(())
    }
}

fn validate_country(field: &'static str, code: &str) -> Result<(), ModelError> {
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ModelError::invalid(field, format!("invalid country code {:?}", code)));
    }
    Ok(())
}

/// SEC-specific detail, at most one per transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecDetail {
    Ccd(CcdDetail),
    Iat(IatDetail),
    Tel(TelDetail),
    Web(WebDetail),
}

impl SecDetail {
    pub fn sec_code(&self) -> SecCode {
        match self {
            SecDetail::Ccd(_) => SecCode::Ccd,
            SecDetail::Iat(_) => SecCode::Iat,
            SecDetail::Tel(_) => SecCode::Tel,
            SecDetail::Web(_) => SecCode::Web,
        }
    }
}

// ============================================================================
// Transfer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: TransferId,
    pub user_id: UserId,
    #[serde(rename = "transferType")]
    pub transfer_type: TransferType,
    pub amount: Amount,
    pub originator: OriginatorId,
    pub originator_depository: DepositoryId,
    pub receiver: ReceiverId,
    pub receiver_depository: DepositoryId,
    pub description: String,
    #[serde(rename = "standardEntryClassCode")]
    pub sec_code: SecCode,
    pub status: TransferStatus,
    pub same_day: bool,
    pub detail: Option<SecDetail>,
    pub return_code: Option<String>,
    /// Set once the file is accepted by the ACH service
    pub file_id: Option<FileId>,
    pub trace_number: Option<String>,
    /// Set exactly once, when a merge claims this transfer
    pub merged_filename: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Transfer {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.amount.is_zero() {
            return Err(ModelError::invalid("amount", "must be greater than zero"));
        }
        require("description", &self.description)?;
        require("originatorDepository", self.originator_depository.as_str())?;
        require("receiverDepository", self.receiver_depository.as_str())?;
        if let Some(detail) = &self.detail
            && detail.sec_code() != self.sec_code
        {
            return Err(ModelError::invalid(
                "detail",
                format!(
                    "{} detail does not match SEC code {}",
                    detail.sec_code(),
                    self.sec_code
                ),
            ));
        }
        if let Some(SecDetail::Iat(iat)) = &self.detail {
            iat.validate()?;
        }
        Ok(())
    }

    /// Move to `next`, enforcing the status graph.
    pub fn transition(&mut self, next: TransferStatus, now: DateTime<Utc>) -> Result<(), ModelError> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated = now;
        Ok(())
    }

    /// Mark the transfer returned with a NACHA return code.
    pub fn record_return(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), ModelError> {
        let next = match self.status {
            TransferStatus::Processed => TransferStatus::Reclaimed,
            _ => TransferStatus::Failed,
        };
        self.transition(next, now)?;
        self.return_code = Some(code.trim().to_ascii_uppercase());
        Ok(())
    }
}
