use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use recruit_flow::workflows::hiring::{
    Application, ApplicationId, CandidateId, ConversationError, ConversationId,
    ConversationService, DeliveryError, Entity, EntityKey, EntityKind, EntityStore, Notification,
    NotificationSender, StoreError, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local versioned store; every write is checked against the caller's version.
#[derive(Default, Clone)]
pub(crate) struct InMemoryEntityStore {
    entities: Arc<Mutex<HashMap<EntityKey, Entity>>>,
    sequences: Arc<Mutex<HashMap<EntityKind, u64>>>,
}

fn check_version(
    entities: &HashMap<EntityKey, Entity>,
    key: &EntityKey,
    expected: u64,
) -> Result<(), StoreError> {
    let found = entities.get(key).map_or(0, Entity::version);
    if found == expected {
        Ok(())
    } else {
        Err(StoreError::VersionConflict {
            key: key.clone(),
            expected,
            found,
        })
    }
}

impl EntityStore for InMemoryEntityStore {
    fn read(&self, key: &EntityKey) -> Result<Entity, StoreError> {
        let guard = self.entities.lock().expect("entity store mutex poisoned");
        guard
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn write_if_version(
        &self,
        mut entity: Entity,
        expected_version: u64,
    ) -> Result<Entity, StoreError> {
        let mut guard = self.entities.lock().expect("entity store mutex poisoned");
        let key = entity.key();
        check_version(&guard, &key, expected_version)?;
        entity.set_version(expected_version + 1);
        guard.insert(key, entity.clone());
        Ok(entity)
    }

    fn write_batch_if_versions(
        &self,
        writes: Vec<(Entity, u64)>,
    ) -> Result<Vec<Entity>, StoreError> {
        let mut guard = self.entities.lock().expect("entity store mutex poisoned");
        for (entity, expected) in &writes {
            check_version(&guard, &entity.key(), *expected)?;
        }

        let mut written = Vec::with_capacity(writes.len());
        for (mut entity, expected) in writes {
            entity.set_version(expected + 1);
            guard.insert(entity.key(), entity.clone());
            written.push(entity);
        }
        Ok(written)
    }

    fn delete_if_version(&self, key: &EntityKey, expected_version: u64) -> Result<(), StoreError> {
        let mut guard = self.entities.lock().expect("entity store mutex poisoned");
        if !guard.contains_key(key) {
            return Err(StoreError::NotFound(key.clone()));
        }
        check_version(&guard, key, expected_version)?;
        guard.remove(key);
        Ok(())
    }

    fn applications(&self) -> Result<Vec<Application>, StoreError> {
        let guard = self.entities.lock().expect("entity store mutex poisoned");
        Ok(guard
            .values()
            .filter_map(|entity| match entity {
                Entity::Application(application) => Some(application.clone()),
                _ => None,
            })
            .collect())
    }

    fn allocate_id(&self, kind: EntityKind) -> Result<String, StoreError> {
        let guard = self.entities.lock().expect("entity store mutex poisoned");
        let mut sequences = self.sequences.lock().expect("sequence mutex poisoned");
        let last = sequences.entry(kind).or_insert(0);
        // Seeded or restored entities may already hold low sequence numbers.
        loop {
            *last += 1;
            let id = kind.sequenced_id(*last);
            if !guard.contains_key(&EntityKey::new(kind, id.as_str())) {
                debug!(%kind, %id, "id allocated");
                return Ok(id);
            }
        }
    }
}

/// Logs each notification and keeps a copy for the demo transcript.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl LoggingNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationSender for LoggingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        match notification {
            Notification::Candidate(notice) => info!(
                template = %notice.template,
                candidate_id = %notice.candidate_id,
                application_id = %notice.application_id,
                "candidate notified"
            ),
            Notification::Actor(notice) => info!(
                template = %notice.template,
                role = notice.role.name(),
                entity = %notice.entity,
                "staff notified"
            ),
        }
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification.clone());
        Ok(())
    }
}

/// One thread per application, reused on every later request.
#[derive(Default, Clone)]
pub(crate) struct InMemoryConversations {
    threads: Arc<Mutex<HashMap<ApplicationId, ConversationId>>>,
}

impl InMemoryConversations {
    pub(crate) fn thread_count(&self) -> usize {
        self.threads
            .lock()
            .expect("conversation mutex poisoned")
            .len()
    }
}

impl ConversationService for InMemoryConversations {
    fn create_or_reuse(
        &self,
        application_id: &ApplicationId,
        _candidate_id: &CandidateId,
        staff_user_id: &UserId,
    ) -> Result<ConversationId, ConversationError> {
        let mut guard = self.threads.lock().expect("conversation mutex poisoned");
        let next = guard.len() + 1;
        let id = guard
            .entry(application_id.clone())
            .or_insert_with(|| ConversationId(format!("conv-{next:04}")))
            .clone();
        info!(%application_id, %staff_user_id, conversation_id = %id, "conversation ready");
        Ok(id)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
