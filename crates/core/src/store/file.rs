//! YAML file store.
//!
//! Layout under the consultations root:
//!
//! ```text
//! consultations/.write.lock
//! consultations/<s1>/<s2>/<id>/consultation.yaml
//! consultations/<s1>/<s2>/<id>/addenda/<timestamp-id>.yaml
//! ```
//!
//! Record files are replaced by writing a uniquely named sibling temp file and renaming it over
//! the old one. Addendum files are created with `create_new`, so an existing entry can never be
//! overwritten.
//!
//! Several processes (the server and the CLI) may open the same root. Every read-check-write
//! runs under an exclusive `fs2` lock on `.write.lock`, taken after the in-process mutex so that
//! blocking threads only ever wait on other processes. Reads take no lock.

use super::{publish, sort_oldest_first, ChangeEvent, ChangeKind, ConsultationStore};
use crate::addendum::Addendum;
use crate::constants::{
    ADDENDA_DIR_NAME, CONSULTATION_FILENAME, DEFAULT_QUEUE_POLL_INTERVAL_MS, STORE_LOCK_FILENAME,
};
use crate::consultation::{ConsultationRequest, ConsultationStatus, Guarded, RecordMutation};
use crate::error::{CoreError, CoreResult};
use crate::queue::QueueFilter;
use crate::types::ConsultationId;
use async_trait::async_trait;
use fs2::FileExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use telecare_uuid::TimestampId;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex, MutexGuard};

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    poll_interval: Duration,
    events: broadcast::Sender<ChangeEvent>,
}

/// Held for the duration of one write. Dropping it closes the lock file, which releases the
/// cross-process lock, and then the in-process mutex.
struct WriteGuard<'a> {
    file: std::fs::File,
    _local: MutexGuard<'a, ()>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release store lock: {}", e);
        }
    }
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: PathBuf, channel_capacity: usize) -> CoreResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(CoreError::StorageDirCreation)?;
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            poll_interval: Duration::from_millis(DEFAULT_QUEUE_POLL_INTERVAL_MS),
            events,
        })
    }

    /// Overrides how often live queue views re-read the directory.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_dir(&self, id: ConsultationId) -> PathBuf {
        id.as_shardable().sharded_dir(&self.root)
    }

    fn record_path(&self, id: ConsultationId) -> PathBuf {
        self.record_dir(id).join(CONSULTATION_FILENAME)
    }

    fn addenda_dir(&self, id: ConsultationId) -> PathBuf {
        self.record_dir(id).join(ADDENDA_DIR_NAME)
    }

    /// Takes the in-process mutex, then the exclusive lock shared with other processes.
    async fn lock_for_write(&self) -> CoreResult<WriteGuard<'_>> {
        let local = self.write_lock.lock().await;
        let path = self.root.join(STORE_LOCK_FILENAME);
        let file = tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok::<_, std::io::Error>(file)
        })
        .await
        .map_err(|e| CoreError::StoreLock(std::io::Error::other(e)))?
        .map_err(CoreError::StoreLock)?;
        Ok(WriteGuard {
            file,
            _local: local,
        })
    }

    async fn read_record(path: &Path) -> CoreResult<Option<ConsultationRequest>> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::FileRead(e)),
        };
        let record = serde_yaml::from_str(&text).map_err(CoreError::YamlDeserialization)?;
        Ok(Some(record))
    }

    async fn write_record(&self, record: &ConsultationRequest) -> CoreResult<()> {
        let dir = self.record_dir(record.id);
        fs::create_dir_all(&dir)
            .await
            .map_err(CoreError::StorageDirCreation)?;

        let yaml = serde_yaml::to_string(record).map_err(CoreError::YamlSerialization)?;
        let target = dir.join(CONSULTATION_FILENAME);
        let staging = dir.join(format!(
            "{CONSULTATION_FILENAME}.{}.tmp",
            TimestampId::generate(None)
        ));
        fs::write(&staging, yaml).await.map_err(CoreError::FileWrite)?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(CoreError::FileWrite(e));
        }
        Ok(())
    }

    /// Paths of every record file, walking the two shard levels.
    async fn record_paths(&self) -> CoreResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for first in child_dirs(&self.root).await? {
            for second in child_dirs(&first).await? {
                for record_dir in child_dirs(&second).await? {
                    paths.push(record_dir.join(CONSULTATION_FILENAME));
                }
            }
        }
        Ok(paths)
    }
}

async fn child_dirs(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::FileRead(e)),
    };
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(CoreError::FileRead)? {
        if entry
            .file_type()
            .await
            .map_err(CoreError::FileRead)?
            .is_dir()
        {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

#[async_trait]
impl ConsultationStore for FileStore {
    async fn insert(&self, record: ConsultationRequest) -> CoreResult<()> {
        let guard = self.lock_for_write().await?;
        let path = self.record_path(record.id);
        if fs::try_exists(&path).await.map_err(CoreError::FileRead)? {
            return Err(CoreError::AlreadyExists(format!("consultation {}", record.id)));
        }
        self.write_record(&record).await?;
        drop(guard);

        publish(&self.events, record.id, record.status, ChangeKind::Created);
        Ok(())
    }

    async fn get(&self, id: ConsultationId) -> CoreResult<Option<ConsultationRequest>> {
        Self::read_record(&self.record_path(id)).await
    }

    async fn list(&self, filter: &QueueFilter) -> CoreResult<Vec<ConsultationRequest>> {
        let mut matching = Vec::new();
        for path in self.record_paths().await? {
            match Self::read_record(&path).await {
                Ok(Some(record)) if filter.matches(&record) => matching.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }
        sort_oldest_first(&mut matching);
        Ok(matching)
    }

    async fn compare_and_set(
        &self,
        id: ConsultationId,
        expected: &[ConsultationStatus],
        mutation: RecordMutation,
    ) -> CoreResult<Guarded<ConsultationRequest>> {
        let guard = self.lock_for_write().await?;
        let Some(mut record) = Self::read_record(&self.record_path(id)).await? else {
            return Ok(Guarded::Missing);
        };
        if !expected.contains(&record.status) {
            return Ok(Guarded::Conflict(record.status));
        }

        let kind = ChangeKind::for_mutation(&mutation);
        mutation.apply(&mut record);
        self.write_record(&record).await?;
        drop(guard);

        publish(&self.events, id, record.status, kind);
        Ok(Guarded::Applied(record))
    }

    async fn insert_addendum(&self, addendum: Addendum) -> CoreResult<Guarded<Addendum>> {
        let guard = self.lock_for_write().await?;
        let consultation_id = addendum.consultation_id;
        let Some(parent) = Self::read_record(&self.record_path(consultation_id)).await? else {
            return Ok(Guarded::Missing);
        };
        if parent.status != ConsultationStatus::Completed {
            return Ok(Guarded::Conflict(parent.status));
        }

        let dir = self.addenda_dir(consultation_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(CoreError::StorageDirCreation)?;
        let yaml = serde_yaml::to_string(&addendum).map_err(CoreError::YamlSerialization)?;
        let path = dir.join(format!("{}.yaml", addendum.id));
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(CoreError::AlreadyExists(format!("addendum {}", addendum.id)));
            }
            Err(e) => return Err(CoreError::FileWrite(e)),
        };
        file.write_all(yaml.as_bytes())
            .await
            .map_err(CoreError::FileWrite)?;
        file.flush().await.map_err(CoreError::FileWrite)?;
        drop(guard);

        publish(
            &self.events,
            consultation_id,
            ConsultationStatus::Completed,
            ChangeKind::AddendumAdded,
        );
        Ok(Guarded::Applied(addendum))
    }

    async fn addenda(&self, consultation_id: ConsultationId) -> CoreResult<Vec<Addendum>> {
        let dir = self.addenda_dir(consultation_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        let mut addenda = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(CoreError::FileRead)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let text = fs::read_to_string(&path)
                .await
                .map_err(CoreError::FileRead)?;
            let addendum: Addendum =
                serde_yaml::from_str(&text).map_err(CoreError::YamlDeserialization)?;
            addenda.push(addendum);
        }
        addenda.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(addenda)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(self.poll_interval)
    }
}
