//! In-memory repositories for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{
    DepositoryRepository, MicroDepositRepository, OriginatorRepository, ReceiverRepository,
    RepoResult, RepositoryError, TransferRepository,
};
use crate::model::{
    Depository, DepositoryId, DepositoryStatus, FileId, MicroDeposit, Originator, OriginatorId,
    Receiver, ReceiverId, Stored, Transfer, TransferId, TransferStatus, UserId,
};

#[derive(Debug, Default)]
struct State {
    depositories: HashMap<DepositoryId, Stored<Depository>>,
    originators: HashMap<OriginatorId, Stored<Originator>>,
    receivers: HashMap<ReceiverId, Stored<Receiver>>,
    transfers: HashMap<TransferId, Stored<Transfer>>,
    micro_deposits: Vec<Stored<MicroDeposit>>,
}

/// Every repository trait over one mutex-guarded state.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn tombstone_owned<K, T>(
    map: &mut HashMap<K, Stored<T>>,
    id: &K,
    owner: impl Fn(&T) -> bool,
    now: DateTime<Utc>,
) -> bool
where
    K: std::hash::Hash + Eq,
{
    match map.get_mut(id) {
        Some(stored) if stored.live().is_some_and(&owner) => stored.tombstone(now),
        _ => false,
    }
}

#[async_trait]
impl DepositoryRepository for MemoryRepository {
    async fn get_user_depository(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
    ) -> RepoResult<Option<Depository>> {
        Ok(self
            .state()
            .depositories
            .get(id)
            .and_then(Stored::live)
            .filter(|d| &d.user_id == user_id)
            .cloned())
    }

    async fn get_depository(&self, id: &DepositoryId) -> RepoResult<Option<Depository>> {
        Ok(self
            .state()
            .depositories
            .get(id)
            .and_then(Stored::live)
            .cloned())
    }

    async fn upsert_depository(&self, depository: &Depository) -> RepoResult<()> {
        self.state()
            .depositories
            .insert(depository.id.clone(), Stored::new(depository.clone()));
        Ok(())
    }

    async fn update_depository_status(
        &self,
        id: &DepositoryId,
        status: DepositoryStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut state = self.state();
        let dep = state
            .depositories
            .get_mut(id)
            .and_then(Stored::live_mut)
            .ok_or_else(|| RepositoryError::not_found("depository", id))?;
        dep.status = status;
        dep.updated = now;
        Ok(())
    }

    async fn lookup_by_account_hash(
        &self,
        routing_number: &str,
        hashed_account_number: &str,
    ) -> RepoResult<Vec<Depository>> {
        Ok(self
            .state()
            .depositories
            .values()
            .filter_map(Stored::live)
            .filter(|d| {
                d.routing_number == routing_number
                    && d.hashed_account_number == hashed_account_number
            })
            .cloned()
            .collect())
    }

    async fn delete_depository(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        Ok(tombstone_owned(
            &mut state.depositories,
            id,
            |d| &d.user_id == user_id,
            now,
        ))
    }
}

#[async_trait]
impl OriginatorRepository for MemoryRepository {
    async fn get_user_originator(
        &self,
        id: &OriginatorId,
        user_id: &UserId,
    ) -> RepoResult<Option<Originator>> {
        Ok(self
            .state()
            .originators
            .get(id)
            .and_then(Stored::live)
            .filter(|o| &o.user_id == user_id)
            .cloned())
    }

    async fn upsert_originator(&self, originator: &Originator) -> RepoResult<()> {
        self.state()
            .originators
            .insert(originator.id.clone(), Stored::new(originator.clone()));
        Ok(())
    }

    async fn delete_originator(
        &self,
        id: &OriginatorId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        Ok(tombstone_owned(
            &mut state.originators,
            id,
            |o| &o.user_id == user_id,
            now,
        ))
    }
}

#[async_trait]
impl ReceiverRepository for MemoryRepository {
    async fn get_user_receiver(
        &self,
        id: &ReceiverId,
        user_id: &UserId,
    ) -> RepoResult<Option<Receiver>> {
        Ok(self
            .state()
            .receivers
            .get(id)
            .and_then(Stored::live)
            .filter(|r| &r.user_id == user_id)
            .cloned())
    }

    async fn upsert_receiver(&self, receiver: &Receiver) -> RepoResult<()> {
        self.state()
            .receivers
            .insert(receiver.id.clone(), Stored::new(receiver.clone()));
        Ok(())
    }

    async fn delete_receiver(
        &self,
        id: &ReceiverId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        Ok(tombstone_owned(
            &mut state.receivers,
            id,
            |r| &r.user_id == user_id,
            now,
        ))
    }
}

#[async_trait]
impl TransferRepository for MemoryRepository {
    async fn get_user_transfer(
        &self,
        id: &TransferId,
        user_id: &UserId,
    ) -> RepoResult<Option<Transfer>> {
        Ok(self
            .state()
            .transfers
            .get(id)
            .and_then(Stored::live)
            .filter(|t| &t.user_id == user_id)
            .cloned())
    }

    async fn get_user_transfers_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Transfer>> {
        let mut out: Vec<Transfer> = self
            .state()
            .transfers
            .values()
            .filter_map(Stored::live)
            .filter(|t| &t.user_id == user_id && t.created >= since)
            .cloned()
            .collect();
        out.sort_by_key(|t| t.created);
        Ok(out)
    }

    async fn create_transfer(&self, transfer: &Transfer) -> RepoResult<()> {
        self.state()
            .transfers
            .insert(transfer.id.clone(), Stored::new(transfer.clone()));
        Ok(())
    }

    async fn delete_transfer(
        &self,
        id: &TransferId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        Ok(tombstone_owned(
            &mut state.transfers,
            id,
            |t| &t.user_id == user_id,
            now,
        ))
    }

    async fn get_unmerged_transfers(
        &self,
        newer_than: DateTime<Utc>,
        limit: usize,
    ) -> RepoResult<Vec<Transfer>> {
        let mut out: Vec<Transfer> = self
            .state()
            .transfers
            .values()
            .filter_map(Stored::live)
            .filter(|t| {
                t.status == TransferStatus::Pending
                    && t.merged_filename.is_none()
                    && t.created > newer_than
            })
            .cloned()
            .collect();
        out.sort_by_key(|t| t.created);
        out.truncate(limit);
        Ok(out)
    }

    async fn mark_transfer_merged(
        &self,
        id: &TransferId,
        filename: &str,
        trace_number: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        let Some(t) = state.transfers.get_mut(id).and_then(Stored::live_mut) else {
            return Ok(false);
        };
        if t.merged_filename.is_some() || t.status != TransferStatus::Pending {
            return Ok(false);
        }
        t.merged_filename = Some(filename.to_string());
        t.trace_number = Some(trace_number.to_string());
        t.status = TransferStatus::Processed;
        t.updated = now;
        Ok(true)
    }

    async fn release_transfer_merge(
        &self,
        id: &TransferId,
        filename: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        let Some(t) = state.transfers.get_mut(id).and_then(Stored::live_mut) else {
            return Ok(false);
        };
        if t.merged_filename.as_deref() != Some(filename) {
            return Ok(false);
        }
        t.merged_filename = None;
        t.status = TransferStatus::Pending;
        t.updated = now;
        Ok(true)
    }
}

#[async_trait]
impl MicroDepositRepository for MemoryRepository {
    async fn get_micro_deposits(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
    ) -> RepoResult<Vec<MicroDeposit>> {
        Ok(self
            .state()
            .micro_deposits
            .iter()
            .filter_map(Stored::live)
            .filter(|m| &m.depository_id == depository_id && &m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn initiate_micro_deposits(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
        deposits: &[MicroDeposit],
    ) -> RepoResult<bool> {
        let mut state = self.state();
        let exists = state
            .micro_deposits
            .iter()
            .filter_map(Stored::live)
            .any(|m| &m.depository_id == depository_id && &m.user_id == user_id);
        if exists {
            return Ok(false);
        }
        state
            .micro_deposits
            .extend(deposits.iter().cloned().map(Stored::new));
        Ok(true)
    }

    async fn set_micro_deposit_transaction(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        transaction_id: &str,
    ) -> RepoResult<()> {
        let mut state = self.state();
        for m in state.micro_deposits.iter_mut().filter_map(Stored::live_mut) {
            if &m.depository_id == depository_id && &m.file_id == file_id {
                m.transaction_id = transaction_id.to_string();
            }
        }
        Ok(())
    }

    async fn cancel_micro_deposits(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        now: DateTime<Utc>,
    ) -> RepoResult<usize> {
        Ok(self
            .state()
            .micro_deposits
            .iter_mut()
            .filter(|s| {
                s.live()
                    .is_some_and(|m| &m.depository_id == depository_id && &m.file_id == file_id)
            })
            .map(|s| s.tombstone(now))
            .filter(|t| *t)
            .count())
    }

    async fn get_unmerged_micro_deposits(
        &self,
        newer_than: DateTime<Utc>,
        limit: usize,
    ) -> RepoResult<Vec<MicroDeposit>> {
        let mut out: Vec<MicroDeposit> = self
            .state()
            .micro_deposits
            .iter()
            .filter_map(Stored::live)
            .filter(|m| m.merged_filename.is_none() && m.created > newer_than)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.created);
        out.truncate(limit);
        Ok(out)
    }

    async fn mark_micro_deposits_merged(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        filename: &str,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        let mut claimed = false;
        for m in state.micro_deposits.iter_mut().filter_map(Stored::live_mut) {
            if &m.depository_id == depository_id && &m.file_id == file_id && m.merged_filename.is_none() {
                m.merged_filename = Some(filename.to_string());
                claimed = true;
            }
        }
        Ok(claimed)
    }

    async fn release_micro_deposits_merge(
        &self,
        depository_id: &DepositoryId,
        file_id: &FileId,
        filename: &str,
    ) -> RepoResult<bool> {
        let mut state = self.state();
        let mut released = false;
        for m in state.micro_deposits.iter_mut().filter_map(Stored::live_mut) {
            if &m.depository_id == depository_id
                && &m.file_id == file_id
                && m.merged_filename.as_deref() == Some(filename)
            {
                m.merged_filename = None;
                released = true;
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures::depository;
    use crate::model::AccountType;
    use crate::model::transfer::tests::transfer;
    use crate::model::SecCode;
    use crate::money::Amount;
    use std::sync::Arc;

    fn micro_deposit(dep: &str, file: &str, cents: &str) -> MicroDeposit {
        MicroDeposit {
            depository_id: DepositoryId::from(dep),
            user_id: UserId::from("user"),
            amount: Amount::parse("USD", cents).unwrap(),
            file_id: FileId::from(file),
            transaction_id: String::new(),
            merged_filename: None,
            return_code: None,
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_tombstoned_depository_is_hidden() {
        let repo = MemoryRepository::new();
        let dep = depository("d1", "121042882", "151", AccountType::Checking);
        repo.upsert_depository(&dep).await.unwrap();

        let user = UserId::from("user");
        assert!(repo.get_user_depository(&dep.id, &user).await.unwrap().is_some());
        assert!(
            repo.get_user_depository(&dep.id, &UserId::from("other"))
                .await
                .unwrap()
                .is_none()
        );

        assert!(!repo.delete_depository(&dep.id, &UserId::from("other"), Utc::now()).await.unwrap());
        assert!(repo.delete_depository(&dep.id, &user, Utc::now()).await.unwrap());
        assert!(!repo.delete_depository(&dep.id, &user, Utc::now()).await.unwrap());
        assert!(repo.get_depository(&dep.id).await.unwrap().is_none());
        assert!(
            repo.lookup_by_account_hash("121042882", &dep.hashed_account_number)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            repo.update_depository_status(&dep.id, DepositoryStatus::Verified, Utc::now())
                .await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_transfer_merged_once() {
        let repo = MemoryRepository::new();
        let mut t = transfer(SecCode::Ppd, None);
        t.created = Utc::now() - chrono::Duration::seconds(5);
        repo.create_transfer(&t).await.unwrap();

        let since = t.created - chrono::Duration::seconds(1);
        assert_eq!(repo.get_unmerged_transfers(since, 10).await.unwrap().len(), 1);

        assert!(repo.mark_transfer_merged(&t.id, "a.ach", "1", Utc::now()).await.unwrap());
        assert!(!repo.mark_transfer_merged(&t.id, "b.ach", "2", Utc::now()).await.unwrap());

        let stored = repo.get_user_transfer(&t.id, &t.user_id).await.unwrap().unwrap();
        assert_eq!(stored.merged_filename.as_deref(), Some("a.ach"));
        assert_eq!(stored.status, TransferStatus::Processed);
        assert!(repo.get_unmerged_transfers(since, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_released_transfer_is_pending_again() {
        let repo = MemoryRepository::new();
        let t = transfer(SecCode::Ppd, None);
        repo.create_transfer(&t).await.unwrap();
        assert!(repo.mark_transfer_merged(&t.id, "a.ach", "1", Utc::now()).await.unwrap());

        // only the claiming file may release
        assert!(!repo.release_transfer_merge(&t.id, "b.ach", Utc::now()).await.unwrap());
        assert!(repo.release_transfer_merge(&t.id, "a.ach", Utc::now()).await.unwrap());

        let stored = repo.get_user_transfer(&t.id, &t.user_id).await.unwrap().unwrap();
        assert_eq!(stored.merged_filename, None);
        assert_eq!(stored.status, TransferStatus::Pending);
        assert!(repo.mark_transfer_merged(&t.id, "b.ach", "1", Utc::now()).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initiation_has_one_winner() {
        let repo = Arc::new(MemoryRepository::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let file = format!("f{i}");
                let rows = [micro_deposit("d1", &file, "0.10"), micro_deposit("d1", &file, "0.04")];
                repo.initiate_micro_deposits(&DepositoryId::from("d1"), &UserId::from("user"), &rows)
                    .await
                    .unwrap()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        let rows = repo
            .get_micro_deposits(&DepositoryId::from("d1"), &UserId::from("user"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|m| m.file_id == rows[0].file_id));
    }

    #[tokio::test]
    async fn test_cancelled_initiation_can_be_retried() {
        let repo = MemoryRepository::new();
        let dep = DepositoryId::from("d1");
        let user = UserId::from("user");
        let first = [micro_deposit("d1", "f1", "0.10"), micro_deposit("d1", "f1", "0.04")];
        assert!(repo.initiate_micro_deposits(&dep, &user, &first).await.unwrap());
        repo.set_micro_deposit_transaction(&dep, &FileId::from("f1"), "tx-1").await.unwrap();
        assert!(
            repo.get_micro_deposits(&dep, &user)
                .await
                .unwrap()
                .iter()
                .all(|m| m.transaction_id == "tx-1")
        );

        assert_eq!(repo.cancel_micro_deposits(&dep, &FileId::from("f1"), Utc::now()).await.unwrap(), 2);
        assert!(repo.get_micro_deposits(&dep, &user).await.unwrap().is_empty());
        assert!(
            repo.initiate_micro_deposits(&dep, &user, &[micro_deposit("d1", "f2", "0.07")])
                .await
                .unwrap()
        );
    }
}
