//! The ODFI's own account
//!
//! Micro-deposits are originated by the institution running Paygate: its
//! account, from configuration, acts as both originator and originator
//! depository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::cache::OnceResolver;
use crate::config::OdfiConfig;
use crate::error::ErrorKind;
use crate::model::{
    AccountType, Depository, DepositoryId, DepositoryStatus, HolderType, ModelError, Originator,
    OriginatorId, UserId,
};
use crate::money::Amount;
use crate::secrets::{StringKeeper, hash_account_number};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountsError {
    #[error("accounts service unavailable: {0}")]
    Unavailable(String),

    #[error("account not found for routing number {0}")]
    AccountNotFound(String),
}

impl AccountsError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountsError::Unavailable(_) => "ACCOUNTS_UNAVAILABLE",
            AccountsError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::External
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLine {
    pub account_id: String,
    /// Credits are positive, debits negative
    pub cents: i64,
    pub purpose: &'static str,
}

/// Ledger service holding the ODFI and customer accounts.
#[async_trait]
pub trait AccountsClient: Send + Sync {
    async fn search_account(
        &self,
        routing_number: &str,
        account_number: &str,
        account_type: AccountType,
    ) -> Result<String, AccountsError>;

    /// Post a balanced transaction, returning its ID.
    async fn post_transaction(&self, lines: &[TransactionLine]) -> Result<String, AccountsError>;
}

pub struct OdfiAccount {
    config: OdfiConfig,
    keeper: Arc<dyn StringKeeper>,
    accounts: Option<Arc<dyn AccountsClient>>,
    account_id: OnceResolver<String>,
}

impl OdfiAccount {
    pub fn new(
        config: OdfiConfig,
        keeper: Arc<dyn StringKeeper>,
        accounts: Option<Arc<dyn AccountsClient>>,
    ) -> Self {
        Self {
            config,
            keeper,
            accounts,
            account_id: OnceResolver::new(),
        }
    }

    pub fn routing_number(&self) -> &str {
        &self.config.routing_number
    }

    pub fn description(&self) -> &str {
        &self.config.micro_deposit_description
    }

    pub fn originator(&self, user_id: &UserId, now: DateTime<Utc>) -> Originator {
        Originator {
            id: OriginatorId::from("odfi"),
            user_id: user_id.clone(),
            default_depository: DepositoryId::from("odfi"),
            identification: self.config.identification.clone(),
            customer_id: None,
            metadata: self.config.holder.clone(),
            created: now,
            updated: now,
        }
    }

    pub fn depository(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Depository, ModelError> {
        Ok(Depository {
            id: DepositoryId::from("odfi"),
            user_id: user_id.clone(),
            bank_name: self.config.bank_name.clone(),
            holder: self.config.holder.clone(),
            holder_type: HolderType::Business,
            account_type: self.config.account_type,
            routing_number: self.config.routing_number.clone(),
            encrypted_account_number: self.keeper.encrypt(&self.config.account_number)?,
            hashed_account_number: hash_account_number(&self.config.account_number),
            status: DepositoryStatus::Verified,
            metadata: String::new(),
            return_codes: Vec::new(),
            created: now,
            updated: now,
        })
    }

    /// The ODFI ledger account, looked up on first use.
    async fn account_id(&self, accounts: &dyn AccountsClient) -> Result<String, AccountsError> {
        self.account_id
            .get_or_resolve(|| async {
                let id = accounts
                    .search_account(
                        &self.config.routing_number,
                        &self.config.account_number,
                        self.config.account_type,
                    )
                    .await?;
                info!(account_id = %id, "resolved ODFI ledger account");
                Ok::<_, AccountsError>(id)
            })
            .await
    }

    /// Post every micro-deposit credit from the ODFI to the depository as
    /// one transaction, so either all of them or none are on the ledger.
    /// Without an accounts service nothing is posted and the ID is empty.
    pub async fn post_micro_deposits(
        &self,
        depository: &Depository,
        amounts: &[Amount],
    ) -> Result<String, super::MicroDepositError> {
        let Some(accounts) = &self.accounts else {
            return Ok(String::new());
        };
        let odfi_account = self.account_id(accounts.as_ref()).await?;
        let account_number = depository
            .decrypt_account_number(self.keeper.as_ref())
            .map_err(ModelError::from)?;
        let receiver_account = accounts
            .search_account(&depository.routing_number, &account_number, depository.account_type)
            .await?;

        let lines: Vec<TransactionLine> = amounts
            .iter()
            .flat_map(|amount| {
                [
                    TransactionLine {
                        account_id: odfi_account.clone(),
                        cents: -amount.cents(),
                        purpose: "ACHDebit",
                    },
                    TransactionLine {
                        account_id: receiver_account.clone(),
                        cents: amount.cents(),
                        purpose: "ACHCredit",
                    },
                ]
            })
            .collect();
        Ok(accounts.post_transaction(&lines).await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::secrets::Base64Keeper;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub(crate) struct MockAccounts {
        pub searches: AtomicUsize,
        pub posted: Mutex<Vec<Vec<TransactionLine>>>,
    }

    #[async_trait]
    impl AccountsClient for MockAccounts {
        async fn search_account(
            &self,
            routing_number: &str,
            _account_number: &str,
            _account_type: AccountType,
        ) -> Result<String, AccountsError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(format!("acct-{}", routing_number))
        }

        async fn post_transaction(&self, lines: &[TransactionLine]) -> Result<String, AccountsError> {
            let mut posted = self.posted.lock().unwrap();
            posted.push(lines.to_vec());
            Ok(format!("tx-{}", posted.len()))
        }
    }

    #[test]
    fn test_odfi_entities() {
        let odfi = OdfiAccount::new(OdfiConfig::default(), Arc::new(Base64Keeper), None);
        let user = UserId::from("user");
        let dep = odfi.depository(&user, Utc::now()).unwrap();
        assert!(dep.validate().is_ok());
        assert_eq!(dep.decrypt_account_number(&Base64Keeper).unwrap(), "123");
        let orig = odfi.originator(&user, Utc::now());
        assert!(orig.validate().is_ok());
        assert_eq!(orig.identification, "001");
    }

    #[tokio::test]
    async fn test_post_without_accounts_is_empty() {
        let odfi = OdfiAccount::new(OdfiConfig::default(), Arc::new(Base64Keeper), None);
        let dep = odfi.depository(&UserId::from("user"), Utc::now()).unwrap();
        let id = odfi
            .post_micro_deposits(&dep, &[Amount::parse("USD", "0.12").unwrap()])
            .await
            .unwrap();
        assert!(id.is_empty());
    }

    #[tokio::test]
    async fn test_odfi_account_resolved_once() {
        let accounts = Arc::new(MockAccounts::default());
        let odfi = OdfiAccount::new(
            OdfiConfig::default(),
            Arc::new(Base64Keeper),
            Some(accounts.clone() as Arc<dyn AccountsClient>),
        );
        let mut dep = odfi.depository(&UserId::from("user"), Utc::now()).unwrap();
        dep.routing_number = "231380104".to_string();

        let amounts = [
            Amount::parse("USD", "0.12").unwrap(),
            Amount::parse("USD", "0.03").unwrap(),
        ];
        assert_eq!(odfi.post_micro_deposits(&dep, &amounts).await.unwrap(), "tx-1");
        assert_eq!(odfi.post_micro_deposits(&dep, &amounts).await.unwrap(), "tx-2");

        // one ODFI lookup, then one receiver lookup per post
        assert_eq!(accounts.searches.load(Ordering::SeqCst), 3);
        let posted = accounts.posted.lock().unwrap();
        assert_eq!(posted[0].len(), 4);
        assert_eq!(posted[0][0].account_id, "acct-121042882");
        assert_eq!(posted[0][0].cents, -12);
        assert_eq!(posted[0][1].account_id, "acct-231380104");
        assert_eq!(posted[0][3].cents, 3);
        assert_eq!(posted[0].iter().map(|l| l.cents).sum::<i64>(), 0);
    }
}
