use super::{publish, sort_oldest_first, ChangeEvent, ChangeKind, ConsultationStore};
use crate::addendum::Addendum;
use crate::consultation::{ConsultationRequest, ConsultationStatus, Guarded, RecordMutation};
use crate::error::{CoreError, CoreResult};
use crate::queue::QueueFilter;
use crate::types::ConsultationId;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Process-local store.
///
/// Lock order is always `records` then `addenda`.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<HashMap<ConsultationId, ConsultationRequest>>,
    addenda: RwLock<HashMap<ConsultationId, Vec<Addendum>>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new(channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            records: RwLock::new(HashMap::new()),
            addenda: RwLock::new(HashMap::new()),
            events,
        }
    }
}

#[async_trait]
impl ConsultationStore for MemoryStore {
    async fn insert(&self, record: ConsultationRequest) -> CoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(CoreError::AlreadyExists(format!("consultation {}", record.id)));
        }
        let (id, status) = (record.id, record.status);
        records.insert(id, record);
        drop(records);

        publish(&self.events, id, status, ChangeKind::Created);
        Ok(())
    }

    async fn get(&self, id: ConsultationId) -> CoreResult<Option<ConsultationRequest>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &QueueFilter) -> CoreResult<Vec<ConsultationRequest>> {
        let mut matching: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        sort_oldest_first(&mut matching);
        Ok(matching)
    }

    async fn compare_and_set(
        &self,
        id: ConsultationId,
        expected: &[ConsultationStatus],
        mutation: RecordMutation,
    ) -> CoreResult<Guarded<ConsultationRequest>> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(Guarded::Missing);
        };
        if !expected.contains(&record.status) {
            return Ok(Guarded::Conflict(record.status));
        }

        let kind = ChangeKind::for_mutation(&mutation);
        mutation.apply(record);
        let updated = record.clone();
        drop(records);

        publish(&self.events, id, updated.status, kind);
        Ok(Guarded::Applied(updated))
    }

    async fn insert_addendum(&self, addendum: Addendum) -> CoreResult<Guarded<Addendum>> {
        let records = self.records.read().await;
        let Some(parent) = records.get(&addendum.consultation_id) else {
            return Ok(Guarded::Missing);
        };
        if parent.status != ConsultationStatus::Completed {
            return Ok(Guarded::Conflict(parent.status));
        }

        let mut addenda = self.addenda.write().await;
        let entries = addenda.entry(addendum.consultation_id).or_default();
        if entries.iter().any(|existing| existing.id == addendum.id) {
            return Err(CoreError::AlreadyExists(format!("addendum {}", addendum.id)));
        }
        entries.push(addendum.clone());
        drop(addenda);
        drop(records);

        publish(
            &self.events,
            addendum.consultation_id,
            ConsultationStatus::Completed,
            ChangeKind::AddendumAdded,
        );
        Ok(Guarded::Applied(addendum))
    }

    async fn addenda(&self, consultation_id: ConsultationId) -> CoreResult<Vec<Addendum>> {
        let mut entries = self
            .addenda
            .read()
            .await
            .get(&consultation_id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}
