//! Audit Trail.
//!
//! An append-only record of who read or changed which consultation. Writing an event is
//! best-effort: [`AuditTrail::record`] never returns an error to the operation that triggered
//! it. Failures are logged under the `telecare::audit` target and counted, so operators can
//! alert on [`AuditTrail::write_failures`] without the patient or clinician ever seeing them.
//!
//! Each event stores the actor's role as it was when the event was written. Reads also resolve
//! the actor's *current* role through the [`Directory`], and present both.

use crate::constants::AUDIT_DIR_NAME;
use crate::directory::Directory;
use crate::error::{CoreError, CoreResult};
use crate::types::{ActorId, ActorRole, PersonId, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use telecare_uuid::{TimestampId, TimestampIdGenerator};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    SubmitConsultation,
    ViewChart,
    ClaimConsultation,
    SaveDraft,
    CompleteConsultation,
    CancelConsultation,
    AddAddendum,
}

impl AuditAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubmitConsultation => "SubmitConsultation",
            Self::ViewChart => "ViewChart",
            Self::ClaimConsultation => "ClaimConsultation",
            Self::SaveDraft => "SaveDraft",
            Self::CompleteConsultation => "CompleteConsultation",
            Self::CancelConsultation => "CancelConsultation",
            Self::AddAddendum => "AddAddendum",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Consultation,
    Addendum,
}

impl ResourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consultation => "consultation",
            Self::Addendum => "addendum",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: TimestampId,
    pub actor_id: ActorId,
    /// Role of the actor when the event was written.
    pub actor_role: ActorRole,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_person_id: Option<PersonId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// An audit event as presented to a reader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditView {
    #[serde(flatten)]
    pub event: AuditEvent,
    /// The actor's role now, which may differ from `event.actor_role`.
    pub current_role: Option<ActorRole>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> CoreResult<()>;

    /// Up to `limit` events for one resource, newest first.
    async fn recent(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<AuditEvent>>;
}

// ============================================================================
// SINKS
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: &AuditEvent) -> CoreResult<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn recent(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<AuditEvent>> {
        let mut matching: Vec<_> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.resource_type == resource_type && e.resource_id == resource_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));
        matching.truncate(limit);
        Ok(matching)
    }
}

/// One YAML file per event at `audit/<resource_type>/<resource_id>/<event_id>.yaml`.
///
/// Files are created with `create_new`; existing events are never rewritten.
#[derive(Debug)]
pub struct FileAuditSink {
    root: PathBuf,
}

impl FileAuditSink {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Sink rooted at `<data_dir>/audit`.
    pub fn under(data_dir: &std::path::Path) -> Self {
        Self::new(data_dir.join(AUDIT_DIR_NAME))
    }

    fn resource_dir(&self, resource_type: ResourceType, resource_id: &str) -> CoreResult<PathBuf> {
        let safe = !resource_id.is_empty()
            && resource_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !resource_id.starts_with('.');
        if !safe {
            return Err(CoreError::Validation(format!(
                "invalid audit resource id '{resource_id}'"
            )));
        }
        Ok(self.root.join(resource_type.as_str()).join(resource_id))
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, event: &AuditEvent) -> CoreResult<()> {
        let dir = self.resource_dir(event.resource_type, &event.resource_id)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(CoreError::StorageDirCreation)?;

        let yaml = serde_yaml::to_string(event).map_err(CoreError::YamlSerialization)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(format!("{}.yaml", event.id)))
            .await
            .map_err(CoreError::FileWrite)?;
        file.write_all(yaml.as_bytes())
            .await
            .map_err(CoreError::FileWrite)?;
        file.flush().await.map_err(CoreError::FileWrite)?;
        Ok(())
    }

    async fn recent(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<AuditEvent>> {
        let dir = self.resource_dir(resource_type, resource_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        // Event ids sort chronologically, so the file names do too.
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(CoreError::FileRead)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".yaml") {
                names.push(name);
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));

        let mut events = Vec::with_capacity(limit.min(names.len()));
        for name in names.into_iter().take(limit) {
            let text = fs::read_to_string(dir.join(&name))
                .await
                .map_err(CoreError::FileRead)?;
            events.push(serde_yaml::from_str(&text).map_err(CoreError::YamlDeserialization)?);
        }
        Ok(events)
    }
}

// ============================================================================
// TRAIL
// ============================================================================

pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    directory: Arc<dyn Directory>,
    ids: TimestampIdGenerator,
    failures: AtomicU64,
    read_limit: usize,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>, directory: Arc<dyn Directory>, read_limit: usize) -> Self {
        Self {
            sink,
            directory,
            ids: TimestampIdGenerator::new(),
            failures: AtomicU64::new(0),
            read_limit: read_limit.max(1),
        }
    }

    /// Appends an event. Never fails; a write error is logged and counted.
    pub async fn record(
        &self,
        session: &Session,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: &str,
        subject_person_id: Option<PersonId>,
        details: Option<serde_json::Value>,
    ) {
        let id = self.ids.next_id();
        let event = AuditEvent {
            timestamp: id.timestamp(),
            id,
            actor_id: session.actor_id(),
            actor_role: session.role(),
            action,
            resource_type,
            resource_id: resource_id.to_owned(),
            subject_person_id,
            details,
        };

        if let Err(e) = self.sink.append(&event).await {
            let failure = CoreError::AuditWrite(e.to_string());
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                target: "telecare::audit",
                action = %event.action,
                resource = %format!("{}/{}", event.resource_type, event.resource_id),
                actor = %event.actor_id,
                "{failure}"
            );
        }
    }

    /// Number of events that could not be written since startup.
    pub fn write_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Newest-first events for a resource, capped at the configured read limit.
    ///
    /// Only clinicians and administrators may read the trail.
    pub async fn recent(
        &self,
        session: &Session,
        resource_type: ResourceType,
        resource_id: &str,
        limit: Option<usize>,
    ) -> CoreResult<Vec<AuditView>> {
        session.require_staff("reading the audit trail")?;
        let limit = limit.unwrap_or(self.read_limit).clamp(1, self.read_limit);
        let events = self.sink.recent(resource_type, resource_id, limit).await?;

        let mut views = Vec::with_capacity(events.len());
        for event in events {
            let current_role = match self.directory.current_role(event.actor_id).await {
                Ok(role) => role,
                Err(e) => {
                    tracing::warn!("could not resolve current role for {}: {}", event.actor_id, e);
                    None
                }
            };
            views.push(AuditView {
                event,
                current_role,
            });
        }
        Ok(views)
    }
}
