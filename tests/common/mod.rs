//! Shared setup for integration tests
#![allow(dead_code)]

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use paygate::ach::{MockAchClient, RetryPolicy};
use paygate::model::{
    AccountType, Depository, DepositoryId, DepositoryStatus, HolderType, NewDepository,
    Originator, OriginatorId, Receiver, ReceiverId, ReceiverStatus, SecCode, Transfer,
    TransferId, TransferStatus, TransferType, UserId,
};
use paygate::money::Amount;
use paygate::repository::{
    DepositoryRepository, MemoryRepository, OriginatorRepository, ReceiverRepository,
};
use paygate::secrets::Base64Keeper;

pub const ORIGIN_ROUTING: &str = "121042882";
pub const RECEIVER_ROUTING: &str = "231380104";

pub fn user() -> UserId {
    UserId::from("user-1")
}

pub fn usd(s: &str) -> Amount {
    Amount::parse("USD", s).unwrap()
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        backoff: Duration::from_millis(1),
    }
}

pub fn depository(routing: &str, account: &str) -> Depository {
    Depository::create(
        NewDepository {
            user_id: user(),
            bank_name: "Moov Bank",
            holder: "Jane Doe",
            holder_type: HolderType::Individual,
            account_type: AccountType::Checking,
            routing_number: routing,
            account_number: account,
            metadata: "",
        },
        &Base64Keeper,
        Utc::now(),
    )
    .unwrap()
}

pub fn verified(mut dep: Depository) -> Depository {
    dep.status = DepositoryStatus::Verified;
    dep
}

/// Repository holding a verified originator/receiver pair and their
/// depositories, plus a pending PPD push between them.
pub struct World {
    pub repo: Arc<MemoryRepository>,
    pub ach: Arc<MockAchClient>,
    pub originator: Originator,
    pub receiver: Receiver,
    pub originator_dep: Depository,
    pub receiver_dep: Depository,
}

impl World {
    pub async fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let now = Utc::now();
        let originator_dep = verified(depository(ORIGIN_ROUTING, "12345678"));
        let receiver_dep = verified(depository(RECEIVER_ROUTING, "744-5678-99"));
        let originator = Originator {
            id: OriginatorId::new(),
            user_id: user(),
            default_depository: originator_dep.id.clone(),
            identification: "123456789".to_string(),
            customer_id: None,
            metadata: "Acme Corp".to_string(),
            created: now,
            updated: now,
        };
        let receiver = Receiver {
            id: ReceiverId::new(),
            user_id: user(),
            email: "jane@example.com".to_string(),
            default_depository: receiver_dep.id.clone(),
            status: ReceiverStatus::Verified,
            customer_id: None,
            metadata: "Jane Doe".to_string(),
            birth_date: None,
            address: None,
            created: now,
            updated: now,
        };
        repo.upsert_depository(&originator_dep).await.unwrap();
        repo.upsert_depository(&receiver_dep).await.unwrap();
        repo.upsert_originator(&originator).await.unwrap();
        repo.upsert_receiver(&receiver).await.unwrap();
        Self {
            repo,
            ach: Arc::new(MockAchClient::new()),
            originator,
            receiver,
            originator_dep,
            receiver_dep,
        }
    }

    pub fn transfer(&self, amount: &str) -> Transfer {
        let now = Utc::now();
        Transfer {
            id: TransferId::new(),
            user_id: user(),
            transfer_type: TransferType::Push,
            amount: usd(amount),
            originator: self.originator.id.clone(),
            originator_depository: self.originator_dep.id.clone(),
            receiver: self.receiver.id.clone(),
            receiver_depository: self.receiver_dep.id.clone(),
            description: "payroll".to_string(),
            sec_code: SecCode::Ppd,
            status: TransferStatus::Pending,
            same_day: false,
            detail: None,
            return_code: None,
            file_id: None,
            trace_number: None,
            merged_filename: None,
            created: now,
            updated: now,
        }
    }

    pub fn depository_id(&self) -> DepositoryId {
        self.receiver_dep.id.clone()
    }
}
