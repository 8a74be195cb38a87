//! Micro-deposit confirmation throttle
//!
//! `available` and `record` are separate calls. Two confirmations racing on
//! one depository can both see the last free slot and both record, ending one
//! attempt over the quota. The overshoot is bounded by the number of
//! concurrent callers; no lock spans the two calls.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::DepositoryId;
use crate::repository::{RepoResult, RepositoryError};

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

#[async_trait]
pub trait Attempter: Send + Sync {
    /// True while the depository has attempts left.
    async fn available(&self, depository_id: &DepositoryId) -> RepoResult<bool>;

    /// Count one attempt; `amounts` describes what was tried.
    async fn record(&self, depository_id: &DepositoryId, amounts: &str) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct MemoryAttempter {
    max_attempts: usize,
    attempts: Mutex<HashMap<DepositoryId, Vec<String>>>,
}

impl MemoryAttempter {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn attempts(&self, depository_id: &DepositoryId) -> Vec<String> {
        match self.attempts.lock() {
            Ok(guard) => guard.get(depository_id).cloned().unwrap_or_default(),
            Err(poisoned) => poisoned
                .into_inner()
                .get(depository_id)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

impl Default for MemoryAttempter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[async_trait]
impl Attempter for MemoryAttempter {
    async fn available(&self, depository_id: &DepositoryId) -> RepoResult<bool> {
        Ok(self.attempts(depository_id).len() < self.max_attempts)
    }

    async fn record(&self, depository_id: &DepositoryId, amounts: &str) -> RepoResult<()> {
        let mut guard = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .entry(depository_id.clone())
            .or_default()
            .push(amounts.to_string());
        Ok(())
    }
}

/// Attempts stored in `micro_deposit_attempts`.
#[derive(Debug, Clone)]
pub struct PgAttempter {
    pool: PgPool,
    max_attempts: usize,
}

impl PgAttempter {
    pub fn new(pool: PgPool, max_attempts: usize) -> Self {
        Self { pool, max_attempts }
    }
}

#[async_trait]
impl Attempter for PgAttempter {
    async fn available(&self, depository_id: &DepositoryId) -> RepoResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM micro_deposit_attempts WHERE depository_id = $1",
        )
        .bind(depository_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        let count = usize::try_from(count)
            .map_err(|e| RepositoryError::corrupt("micro_deposit_attempts", e))?;
        Ok(count < self.max_attempts)
    }

    async fn record(&self, depository_id: &DepositoryId, amounts: &str) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO micro_deposit_attempts (depository_id, amounts, attempted_at) VALUES ($1, $2, $3)",
        )
        .bind(depository_id.as_str())
        .bind(amounts)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
