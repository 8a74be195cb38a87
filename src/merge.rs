//! Merge pass
//!
//! Drains both cursors, groups what they return by the routing number of the
//! originating institution and claims every record for a named upload file.
//! Records another merge already claimed are dropped from the output.
//!
//! A claimed group is handed to a [`MergedFileSink`]. If the sink fails the
//! claims are released and the cursors rewound, so the records are merged on
//! a later pass.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ach::{AchClient, AchError};
use crate::cursor::{GroupableTransfer, MicroDepositCursor, TransferCursor, UploadableMicroDeposit};
use crate::error::ErrorKind;
use crate::model::{DepositoryId, FileId, TransferId};
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Ach(#[from] AchError),

    #[error("storing merged file {filename}: {source}")]
    Store {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}

impl MergeError {
    pub fn code(&self) -> &'static str {
        match self {
            MergeError::Repository(e) => e.code(),
            MergeError::Ach(e) => e.code(),
            MergeError::Store { .. } => "MERGE_STORE_FAILED",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MergeError::Repository(e) => e.kind(),
            MergeError::Ach(e) => e.kind(),
            MergeError::Store { .. } => ErrorKind::Internal,
        }
    }
}

/// One ACH service file folded into a merged upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub file_id: FileId,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedFile {
    pub filename: String,
    pub routing_number: String,
    pub transfers: Vec<TransferId>,
    pub micro_deposits: Vec<(DepositoryId, FileId)>,
    pub sources: Vec<SourceFile>,
}

impl MergedFile {
    fn new(filename: String, routing_number: String) -> Self {
        Self {
            filename,
            routing_number,
            transfers: Vec::new(),
            micro_deposits: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source contents back to back, in claim order.
    pub fn contents(&self) -> Vec<u8> {
        self.sources
            .iter()
            .flat_map(|s| s.contents.iter().copied())
            .collect()
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Durable destination for merged files.
#[async_trait]
pub trait MergedFileSink: Send + Sync {
    /// Whether a file of this name was already stored.
    async fn contains(&self, filename: &str) -> Result<bool, MergeError>;

    /// Store one merged file. On error nothing is left under `file.filename`.
    async fn store(&self, file: &MergedFile) -> Result<(), MergeError>;
}

/// Writes each merged file into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn io_error(filename: &str) -> impl FnOnce(std::io::Error) -> MergeError + '_ {
        move |source| MergeError::Store {
            filename: filename.to_string(),
            source,
        }
    }
}

#[async_trait]
impl MergedFileSink for DirectorySink {
    async fn contains(&self, filename: &str) -> Result<bool, MergeError> {
        tokio::fs::try_exists(self.dir.join(filename))
            .await
            .map_err(Self::io_error(filename))
    }

    async fn store(&self, file: &MergedFile) -> Result<(), MergeError> {
        let target = self.dir.join(&file.filename);
        let partial = self.dir.join(format!("{}.partial", file.filename));
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(Self::io_error(&file.filename))?;
        let contents = file.contents();
        tokio::fs::write(&partial, &contents)
            .await
            .map_err(Self::io_error(&file.filename))?;
        // rename is atomic within one directory
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(Self::io_error(&file.filename)(e));
        }
        debug!(path = %target.display(), bytes = contents.len(), "merged file written");
        Ok(())
    }
}

/// Keeps merged files in memory. `fail_stores(n)` makes the next `n` stores
/// fail.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<MergedFile>>,
    failures: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_stores(&self, times: usize) {
        self.failures.store(times, Ordering::SeqCst);
    }

    pub fn files(&self) -> Vec<MergedFile> {
        match self.files.lock() {
            Ok(files) => files.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl MergedFileSink for MemorySink {
    async fn contains(&self, filename: &str) -> Result<bool, MergeError> {
        Ok(self.files().iter().any(|f| f.filename == filename))
    }

    async fn store(&self, file: &MergedFile) -> Result<(), MergeError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(MergeError::Store {
                filename: file.filename.clone(),
                source: std::io::Error::other("disk full"),
            });
        }
        match self.files.lock() {
            Ok(mut files) => files.push(file.clone()),
            Err(poisoned) => poisoned.into_inner().push(file.clone()),
        }
        Ok(())
    }
}

// ============================================================================
// Worker
// ============================================================================

#[derive(Default)]
struct Group {
    transfers: Vec<GroupableTransfer>,
    micro_deposits: Vec<UploadableMicroDeposit>,
}

/// `YYYYMMDD-{routing}-{seq}.ach`
pub fn merged_filename(date: NaiveDate, routing_number: &str, seq: u32) -> String {
    format!("{}-{}-{}.ach", date.format("%Y%m%d"), routing_number, seq)
}

pub struct MergeWorker {
    transfers: TransferCursor,
    micro_deposits: MicroDepositCursor,
    ach: Arc<dyn AchClient>,
    sink: Arc<dyn MergedFileSink>,
    odfi_routing_number: String,
    poll_interval: Duration,
    sequences: HashMap<(NaiveDate, String), u32>,
}

impl MergeWorker {
    pub fn new(
        transfers: TransferCursor,
        micro_deposits: MicroDepositCursor,
        ach: Arc<dyn AchClient>,
        sink: Arc<dyn MergedFileSink>,
        odfi_routing_number: &str,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transfers,
            micro_deposits,
            ach,
            sink,
            odfi_routing_number: odfi_routing_number.to_string(),
            poll_interval,
            sequences: HashMap::new(),
        }
    }

    /// Next sequence number for the day that the sink has not stored yet.
    async fn next_filename(
        &mut self,
        now: DateTime<Utc>,
        routing_number: &str,
    ) -> Result<String, MergeError> {
        let date = now.date_naive();
        let seq = self
            .sequences
            .entry((date, routing_number.to_string()))
            .or_insert(0);
        loop {
            *seq += 1;
            let filename = merged_filename(date, routing_number, *seq);
            if !self.sink.contains(&filename).await? {
                return Ok(filename);
            }
        }
    }

    async fn drain(&mut self) -> Result<BTreeMap<String, Group>, MergeError> {
        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        loop {
            let batch = self.transfers.next().await?;
            if batch.is_empty() {
                break;
            }
            for t in batch {
                groups.entry(t.origin.clone()).or_default().transfers.push(t);
            }
        }
        loop {
            let batch = self.micro_deposits.next().await?;
            if batch.is_empty() {
                break;
            }
            groups
                .entry(self.odfi_routing_number.clone())
                .or_default()
                .micro_deposits
                .extend(batch);
        }
        Ok(groups)
    }

    async fn contents(&self, file_id: &FileId) -> Option<Vec<u8>> {
        match self.ach.get_file_contents(file_id).await {
            Ok(contents) => Some(contents),
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "file contents unavailable, retrying next pass");
                None
            }
        }
    }

    /// Claim every record of a group into `file`. Records whose contents
    /// cannot be fetched stay unclaimed and are handed back to their cursor.
    async fn claim(&mut self, file: &mut MergedFile, group: Group) -> Result<(), MergeError> {
        for g in group.transfers {
            let Some(file_id) = g.transfer.file_id.clone() else {
                warn!(transfer_id = %g.transfer.id, "skipping transfer without ACH file");
                continue;
            };
            let Some(contents) = self.contents(&file_id).await else {
                self.transfers.retry_from(g.transfer.created);
                continue;
            };
            let trace_number = g.transfer.trace_number.clone().unwrap_or_default();
            if !self
                .transfers
                .mark_as_merged(&g.transfer, &file.filename, &trace_number)
                .await?
            {
                continue;
            }
            file.transfers.push(g.transfer.id);
            file.sources.push(SourceFile { file_id, contents });
        }

        for m in group.micro_deposits {
            let Some(contents) = self.contents(&m.file_id).await else {
                self.micro_deposits.retry_from(m.created);
                continue;
            };
            if !self.micro_deposits.mark_as_merged(&m, &file.filename).await? {
                continue;
            }
            file.micro_deposits
                .push((m.depository_id.clone(), m.file_id.clone()));
            file.sources.push(SourceFile {
                file_id: m.file_id,
                contents,
            });
        }
        Ok(())
    }

    /// Give back every claim recorded in `file`.
    async fn release(&self, file: &MergedFile) {
        for id in &file.transfers {
            if let Err(e) = self.transfers.release(id, &file.filename).await {
                error!(transfer_id = %id, filename = %file.filename, error = %e, "failed to release claim");
            }
        }
        for (depository_id, file_id) in &file.micro_deposits {
            if let Err(e) = self
                .micro_deposits
                .release(depository_id, file_id, &file.filename)
                .await
            {
                error!(
                    depository_id = %depository_id,
                    file_id = %file_id,
                    filename = %file.filename,
                    error = %e,
                    "failed to release claim"
                );
            }
        }
    }

    /// Claim a group and store it. Any failure after the first claim gives
    /// every claim back.
    async fn merge_group(
        &mut self,
        now: DateTime<Utc>,
        routing_number: String,
        group: Group,
    ) -> Result<Option<MergedFile>, MergeError> {
        let filename = self.next_filename(now, &routing_number).await?;
        let mut file = MergedFile::new(filename, routing_number);

        let stored = match self.claim(&mut file, group).await {
            Ok(()) if file.is_empty() => return Ok(None),
            Ok(()) => self.sink.store(&file).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            self.release(&file).await;
            return Err(e);
        }

        info!(
            filename = %file.filename,
            routing_number = %file.routing_number,
            transfers = file.transfers.len(),
            micro_deposits = file.micro_deposits.len(),
            "merged file stored"
        );
        Ok(Some(file))
    }

    /// One pass over everything currently mergeable. Returned files are
    /// already stored. On error both cursors go back to where the pass
    /// started, so released records are seen again.
    pub async fn run_once(&mut self) -> Result<Vec<MergedFile>, MergeError> {
        let start = (self.transfers.watermark(), self.micro_deposits.watermark());
        let result = self.merge_pass(Utc::now()).await;
        if result.is_err() {
            self.transfers.rewind_to(start.0);
            self.micro_deposits.rewind_to(start.1);
        }
        result
    }

    async fn merge_pass(&mut self, now: DateTime<Utc>) -> Result<Vec<MergedFile>, MergeError> {
        let groups = self.drain().await?;
        let mut merged = Vec::with_capacity(groups.len());
        for (routing_number, group) in groups {
            if let Some(file) = self.merge_group(now, routing_number, group).await? {
                merged.push(file);
            }
        }
        Ok(merged)
    }

    /// Merge on every poll interval until the task is dropped.
    pub async fn run(&mut self) {
        info!(poll_interval = ?self.poll_interval, "merge worker starting");
        loop {
            match self.run_once().await {
                Ok(files) if !files.is_empty() => {
                    let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
                    info!(files = ?names, "merge pass complete");
                }
                Ok(_) => debug!("merge pass found nothing to merge"),
                Err(e) => error!(error = %e, code = e.code(), "merge pass failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
