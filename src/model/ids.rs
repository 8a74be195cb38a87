//! Identifier newtypes
//!
//! All identifiers are opaque strings. Freshly minted ones are lowercase
//! ULIDs, which keeps them sortable by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a new unique identifier
            pub fn new() -> Self {
                Self(ulid::Ulid::new().to_string().to_lowercase())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Authenticated caller that owns every record it creates
    UserId
);
string_id!(DepositoryId);
string_id!(OriginatorId);
string_id!(ReceiverId);
string_id!(TransferId);
string_id!(
    /// File identifier assigned by the ACH service
    FileId
);
