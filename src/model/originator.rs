//! Originator: the company initiating entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DepositoryId, ModelError, OriginatorId, UserId, require};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Originator {
    pub id: OriginatorId,
    pub user_id: UserId,
    pub default_depository: DepositoryId,
    /// Company identification placed in the batch header (usually an EIN)
    pub identification: String,
    pub customer_id: Option<String>,
    /// Display name; becomes the batch header company name
    pub metadata: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Originator {
    pub fn validate(&self) -> Result<(), ModelError> {
        require("defaultDepository", self.default_depository.as_str())?;
        require("identification", &self.identification)?;
        require("metadata", &self.metadata)?;
        Ok(())
    }
}
