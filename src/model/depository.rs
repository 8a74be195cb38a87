//! Depository (bank account) entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::routing::validate_routing_number;
use super::{DepositoryId, ModelError, UserId, require};
use crate::secrets::{SecretsError, StringKeeper, hash_account_number};

/// Return codes meaning the account cannot receive entries anymore.
const ACCOUNT_CLOSED_RETURN_CODES: &[&str] = &["R02", "R03", "R04"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            _ => Err(ModelError::unknown("account type", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolderType {
    Individual,
    Business,
}

impl HolderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolderType::Individual => "individual",
            HolderType::Business => "business",
        }
    }
}

impl fmt::Display for HolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HolderType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(HolderType::Individual),
            "business" => Ok(HolderType::Business),
            _ => Err(ModelError::unknown("holder type", s)),
        }
    }
}

/// Verification status of a depository
///
/// ```text
/// UNVERIFIED → VERIFIED
///      ↓           ↓
///   REJECTED ←─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositoryStatus {
    Unverified,
    Verified,
    Rejected,
}

impl DepositoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositoryStatus::Unverified => "unverified",
            DepositoryStatus::Verified => "verified",
            DepositoryStatus::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(&self, next: DepositoryStatus) -> bool {
        use DepositoryStatus::*;
        matches!(
            (self, next),
            (Unverified, Verified) | (Unverified, Rejected) | (Verified, Rejected)
        )
    }
}

impl fmt::Display for DepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositoryStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unverified" => Ok(DepositoryStatus::Unverified),
            "verified" => Ok(DepositoryStatus::Verified),
            "rejected" => Ok(DepositoryStatus::Rejected),
            _ => Err(ModelError::unknown("depository status", s)),
        }
    }
}

/// A bank account owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Depository {
    pub id: DepositoryId,
    pub user_id: UserId,
    pub bank_name: String,
    pub holder: String,
    pub holder_type: HolderType,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub routing_number: String,
    /// Ciphertext produced by a [`StringKeeper`]
    #[serde(skip_serializing, default)]
    pub encrypted_account_number: String,
    /// Hex SHA-256 of the plaintext
    pub hashed_account_number: String,
    pub status: DepositoryStatus,
    pub metadata: String,
    pub return_codes: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Fields a caller supplies to open a depository.
#[derive(Debug, Clone)]
pub struct NewDepository<'a> {
    pub user_id: UserId,
    pub bank_name: &'a str,
    pub holder: &'a str,
    pub holder_type: HolderType,
    pub account_type: AccountType,
    pub routing_number: &'a str,
    pub account_number: &'a str,
    pub metadata: &'a str,
}

impl Depository {
    /// Create an unverified depository, encrypting the account number.
    pub fn create(
        req: NewDepository<'_>,
        keeper: &dyn StringKeeper,
        now: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        require("accountNumber", req.account_number)?;
        let dep = Depository {
            id: DepositoryId::new(),
            user_id: req.user_id,
            bank_name: req.bank_name.to_string(),
            holder: req.holder.to_string(),
            holder_type: req.holder_type,
            account_type: req.account_type,
            routing_number: req.routing_number.trim().to_string(),
            encrypted_account_number: keeper.encrypt(req.account_number.trim())?,
            hashed_account_number: hash_account_number(req.account_number),
            status: DepositoryStatus::Unverified,
            metadata: req.metadata.to_string(),
            return_codes: Vec::new(),
            created: now,
            updated: now,
        };
        dep.validate()?;
        Ok(dep)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        require("bankName", &self.bank_name)?;
        require("holder", &self.holder)?;
        validate_routing_number(&self.routing_number)?;
        require("encryptedAccountNumber", &self.encrypted_account_number)?;
        require("hashedAccountNumber", &self.hashed_account_number)?;
        Ok(())
    }

    pub fn decrypt_account_number(&self, keeper: &dyn StringKeeper) -> Result<String, SecretsError> {
        keeper.decrypt(&self.encrypted_account_number)
    }

    /// Move to `next`, enforcing the status graph.
    pub fn transition(&mut self, next: DepositoryStatus, now: DateTime<Utc>) -> Result<(), ModelError> {
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

    /// Remember a return code seen for this account. Account-closed codes
    /// reject the depository.
    pub fn record_return_code(&mut self, code: &str, now: DateTime<Utc>) {
        let code = code.trim().to_ascii_uppercase();
        if !self.return_codes.contains(&code) {
            self.return_codes.push(code.clone());
        }
        if ACCOUNT_CLOSED_RETURN_CODES.contains(&code.as_str())
            && self.status != DepositoryStatus::Rejected
        {
            self.status = DepositoryStatus::Rejected;
        }
        self.updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::Base64Keeper;

    fn new_dep() -> Depository {
        Depository::create(
            NewDepository {
                user_id: UserId::from("user"),
                bank_name: "Moov Bank",
                holder: "Jane Doe",
                holder_type: HolderType::Individual,
                account_type: AccountType::Checking,
                routing_number: "121042882",
                account_number: "151",
                metadata: "",
            },
            &Base64Keeper,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_encrypts_and_hashes() {
        let dep = new_dep();
        assert_eq!(dep.status, DepositoryStatus::Unverified);
        assert_ne!(dep.encrypted_account_number, "151");
        assert_eq!(dep.decrypt_account_number(&Base64Keeper).unwrap(), "151");
        assert_eq!(dep.hashed_account_number, hash_account_number("151"));
    }

    #[test]
    fn test_create_rejects_bad_routing_number() {
        let err = Depository::create(
            NewDepository {
                user_id: UserId::from("user"),
                bank_name: "Moov Bank",
                holder: "Jane Doe",
                holder_type: HolderType::Individual,
                account_type: AccountType::Checking,
                routing_number: "121042881",
                account_number: "151",
                metadata: "",
            },
            &Base64Keeper,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_ROUTING_NUMBER");
    }

    #[test]
    fn test_status_transitions() {
        let mut dep = new_dep();
        assert!(dep.transition(DepositoryStatus::Verified, Utc::now()).is_ok());
        let err = dep
            .transition(DepositoryStatus::Unverified, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidTransition { .. }));
        assert!(dep.transition(DepositoryStatus::Rejected, Utc::now()).is_ok());
    }

    #[test]
    fn test_return_codes() {
        let mut dep = new_dep();
        dep.record_return_code("r01", Utc::now());
        assert_eq!(dep.status, DepositoryStatus::Unverified);
        dep.record_return_code("R03", Utc::now());
        dep.record_return_code("R03", Utc::now());
        assert_eq!(dep.return_codes, vec!["R01".to_string(), "R03".to_string()]);
        assert_eq!(dep.status, DepositoryStatus::Rejected);
    }

    #[test]
    fn test_vocabulary_parsing() {
        assert_eq!("Savings".parse::<AccountType>().unwrap(), AccountType::Savings);
        assert_eq!("business".parse::<HolderType>().unwrap(), HolderType::Business);
        assert_eq!(
            "VERIFIED".parse::<DepositoryStatus>().unwrap(),
            DepositoryStatus::Verified
        );
        assert!("loan".parse::<AccountType>().is_err());
    }
}
