//! Receiver: the party whose account is credited or debited

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DepositoryId, ModelError, ReceiverId, UserId, require};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverStatus {
    Unverified,
    Verified,
    Suspended,
    Deactivated,
}

impl ReceiverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiverStatus::Unverified => "unverified",
            ReceiverStatus::Verified => "verified",
            ReceiverStatus::Suspended => "suspended",
            ReceiverStatus::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for ReceiverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiverStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unverified" => Ok(ReceiverStatus::Unverified),
            "verified" => Ok(ReceiverStatus::Verified),
            "suspended" => Ok(ReceiverStatus::Suspended),
            "deactivated" => Ok(ReceiverStatus::Deactivated),
            _ => Err(ModelError::unknown("receiver status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub id: ReceiverId,
    pub user_id: UserId,
    pub email: String,
    pub default_depository: DepositoryId,
    pub status: ReceiverStatus,
    pub customer_id: Option<String>,
    /// Display name; becomes the entry's individual name
    pub metadata: String,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<Address>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Receiver {
    pub fn validate(&self) -> Result<(), ModelError> {
        require("email", &self.email)?;
        if !self.email.contains('@') {
            return Err(ModelError::invalid("email", "missing @"));
        }
        require("defaultDepository", self.default_depository.as_str())?;
        require("metadata", &self.metadata)?;
        if let Some(addr) = &self.address {
            require("address1", &addr.address1)?;
            require("city", &addr.city)?;
            require("postalCode", &addr.postal_code)?;
        }
        Ok(())
    }

    #[inline]
    pub fn is_verified(&self) -> bool {
        self.status == ReceiverStatus::Verified
    }
}
