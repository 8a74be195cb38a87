//! ACH service client
//!
//! The ACH service owns NACHA encoding, checksums and file storage. Paygate
//! hands it populated [`File`] values and gets back a file ID.
//!
//! All calls are idempotent on the service side: `create_file` is keyed by the
//! caller's idempotency key, so a retried create never produces a second file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::File;
use crate::error::ErrorKind;
use crate::model::FileId;

pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AchError {
    #[error("ACH service unreachable: {0}")]
    Transport(String),

    #[error("ACH service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("ACH file rejected: {0}")]
    Rejected(String),

    #[error("ACH file {0} not found")]
    NotFound(FileId),

    #[error("invalid ACH service response: {0}")]
    Decode(String),
}

impl AchError {
    pub fn code(&self) -> &'static str {
        match self {
            AchError::Transport(_) => "ACH_TRANSPORT",
            AchError::Status { .. } => "ACH_STATUS",
            AchError::Rejected(_) => "ACH_FILE_REJECTED",
            AchError::NotFound(_) => "ACH_FILE_NOT_FOUND",
            AchError::Decode(_) => "ACH_DECODE",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::External
    }

    /// Connection failures and 5xx answers may succeed on a retry.
    pub fn is_transient(&self) -> bool {
        match self {
            AchError::Transport(_) => true,
            AchError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AchError::Decode(e.to_string())
        } else {
            AchError::Transport(e.to_string())
        }
    }
}

/// Operations consumed from the ACH service.
#[async_trait]
pub trait AchClient: Send + Sync {
    /// Store a file. Repeating a call with the same key returns the same ID.
    async fn create_file(&self, idempotency_key: &str, file: &File) -> Result<FileId, AchError>;

    /// Run NACHA validation over a stored file.
    async fn validate_file(&self, file_id: &FileId) -> Result<(), AchError>;

    /// Encoded file contents.
    async fn get_file_contents(&self, file_id: &FileId) -> Result<Vec<u8>, AchError>;

    async fn delete_file(&self, file_id: &FileId) -> Result<(), AchError>;
}

// ============================================================================
// Retry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Create a file, retrying transient failures with the same idempotency key.
pub async fn create_with_retry(
    client: &dyn AchClient,
    idempotency_key: &str,
    file: &File,
    policy: RetryPolicy,
) -> Result<FileId, AchError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match client.create_file(idempotency_key, file).await {
            Ok(id) => return Ok(id),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(
                    idempotency_key,
                    attempt,
                    error = %e,
                    "ACH create failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateFileResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// JSON-over-HTTP client for the ACH service.
#[derive(Debug, Clone)]
pub struct HttpAchClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAchClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AchError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success response to an error, preferring the body's message.
    async fn failure(file_id: Option<&FileId>, response: reqwest::Response) -> AchError {
        let status = response.status();
        let message = match response.json::<ErrorResponse>().await {
            Ok(ErrorResponse { error: Some(msg) }) => msg,
            _ => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        match (status.as_u16(), file_id) {
            (404, Some(id)) => AchError::NotFound(id.clone()),
            (400, _) => AchError::Rejected(message),
            (code, _) => AchError::Status {
                status: code,
                message,
            },
        }
    }
}

#[async_trait]
impl AchClient for HttpAchClient {
    async fn create_file(&self, idempotency_key: &str, file: &File) -> Result<FileId, AchError> {
        let response = self
            .client
            .post(self.url("/files/create"))
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(file)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(None, response).await);
        }

        let body: CreateFileResponse = response.json().await?;
        if let Some(err) = body.error.filter(|e| !e.is_empty()) {
            return Err(AchError::Rejected(err));
        }
        if body.id.is_empty() {
            return Err(AchError::Decode("create response carried no file id".to_string()));
        }
        debug!(file_id = %body.id, "ACH file created");
        Ok(FileId::from(body.id))
    }

    async fn validate_file(&self, file_id: &FileId) -> Result<(), AchError> {
        let response = self
            .client
            .get(self.url(&format!("/files/{}/validate", file_id)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(Some(file_id), response).await);
        }
        let body: ErrorResponse = response.json().await?;
        match body.error.filter(|e| !e.is_empty()) {
            Some(err) => Err(AchError::Rejected(err)),
            None => Ok(()),
        }
    }

    async fn get_file_contents(&self, file_id: &FileId) -> Result<Vec<u8>, AchError> {
        let response = self
            .client
            .get(self.url(&format!("/files/{}/contents", file_id)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(Some(file_id), response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete_file(&self, file_id: &FileId) -> Result<(), AchError> {
        let response = self
            .client
            .delete(self.url(&format!("/files/{}", file_id)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(Some(file_id), response).await);
        }
        Ok(())
    }
}

// ============================================================================
// Mock
// ============================================================================

/// In-process ACH service for tests and local runs.
///
/// Files are keyed by idempotency key so repeated creates return the same ID.
/// `fail_creates(n)` makes the next `n` creates fail with a transient error,
/// `fail_contents(n)` does the same for content downloads.
#[derive(Debug, Default)]
pub struct MockAchClient {
    files: Mutex<HashMap<FileId, File>>,
    keys: Mutex<HashMap<String, FileId>>,
    deleted: Mutex<Vec<FileId>>,
    create_calls: AtomicUsize,
    transient_failures: AtomicUsize,
    contents_failures: AtomicUsize,
    last_validated: Mutex<Option<DateTime<Utc>>>,
    reject_create: Mutex<bool>,
    reject_validate: Mutex<bool>,
}

impl MockAchClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self, times: usize) {
        self.transient_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_contents(&self, times: usize) {
        self.contents_failures.store(times, Ordering::SeqCst);
    }

    /// When the last validation request arrived.
    pub fn last_validated(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_validated)
    }

    pub fn set_reject_create(&self, reject: bool) {
        *lock(&self.reject_create) = reject;
    }

    pub fn set_reject_validate(&self, reject: bool) {
        *lock(&self.reject_validate) = reject;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn file(&self, file_id: &FileId) -> Option<File> {
        lock(&self.files).get(file_id).cloned()
    }

    pub fn file_count(&self) -> usize {
        lock(&self.files).len()
    }

    pub fn deleted(&self) -> Vec<FileId> {
        lock(&self.deleted).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl AchClient for MockAchClient {
    async fn create_file(&self, idempotency_key: &str, file: &File) -> Result<FileId, AchError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AchError::Transport("connection reset".to_string()));
        }
        if *lock(&self.reject_create) {
            return Err(AchError::Rejected("mock rejected file".to_string()));
        }

        if let Some(id) = lock(&self.keys).get(idempotency_key) {
            return Ok(id.clone());
        }
        let id = if file.id.is_empty() {
            FileId::new()
        } else {
            file.id.clone()
        };
        lock(&self.files).insert(id.clone(), file.clone());
        lock(&self.keys).insert(idempotency_key.to_string(), id.clone());
        Ok(id)
    }

    async fn validate_file(&self, file_id: &FileId) -> Result<(), AchError> {
        *lock(&self.last_validated) = Some(Utc::now());
        if !lock(&self.files).contains_key(file_id) {
            return Err(AchError::NotFound(file_id.clone()));
        }
        if *lock(&self.reject_validate) {
            return Err(AchError::Rejected("mock validation failure".to_string()));
        }
        Ok(())
    }

    async fn get_file_contents(&self, file_id: &FileId) -> Result<Vec<u8>, AchError> {
        let remaining = self.contents_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.contents_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AchError::Transport("connection reset".to_string()));
        }
        let files = lock(&self.files);
        let file = files
            .get(file_id)
            .ok_or_else(|| AchError::NotFound(file_id.clone()))?;
        serde_json::to_vec(file).map_err(|e| AchError::Decode(e.to_string()))
    }

    async fn delete_file(&self, file_id: &FileId) -> Result<(), AchError> {
        if lock(&self.files).remove(file_id).is_none() {
            return Err(AchError::NotFound(file_id.clone()));
        }
        lock(&self.keys).retain(|_, id| id != file_id);
        lock(&self.deleted).push(file_id.clone());
        Ok(())
    }
}
