//! Contracts the workflow core consumes. Implementations live with the caller.

use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, CandidateId, ConversationId, EntityKey, EntityKind,
    InterviewCalendar, Job, UserId,
};
use super::effects::Notification;

/// Outbound notification hook (e-mail, in-app inbox, push).
///
/// Delivery is assumed at-least-once; the core does not retry.
pub trait NotificationSender: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Messaging threads between a candidate and a staff member.
pub trait ConversationService: Send + Sync {
    /// Must return the same id when called again for the same application.
    fn create_or_reuse(
        &self,
        application_id: &ApplicationId,
        candidate_id: &CandidateId,
        staff_user_id: &UserId,
    ) -> Result<ConversationId, ConversationError>;
}

/// Versioned persistence surface used for optimistic concurrency.
///
/// `expected_version` is the version the caller read; `0` means the entity must not
/// exist yet. A successful write stores the entity with `expected_version + 1`.
pub trait EntityStore: Send + Sync {
    fn read(&self, key: &EntityKey) -> Result<Entity, StoreError>;

    fn write_if_version(&self, entity: Entity, expected_version: u64) -> Result<Entity, StoreError>;

    /// Commits every write or none of them.
    fn write_batch_if_versions(
        &self,
        writes: Vec<(Entity, u64)>,
    ) -> Result<Vec<Entity>, StoreError>;

    fn delete_if_version(&self, key: &EntityKey, expected_version: u64) -> Result<(), StoreError>;

    /// Snapshot of every stored application.
    fn applications(&self) -> Result<Vec<Application>, StoreError>;

    /// Reserves an id of `kind` that no stored entity holds and no earlier call returned.
    fn allocate_id(&self, kind: EntityKind) -> Result<String, StoreError>;
}

/// Anything the store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Job(Job),
    Application(Application),
    Calendar(InterviewCalendar),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Job(_) => EntityKind::Job,
            Self::Application(_) => EntityKind::Application,
            Self::Calendar(_) => EntityKind::Calendar,
        }
    }

    pub fn key(&self) -> EntityKey {
        match self {
            Self::Job(job) => EntityKey::new(EntityKind::Job, job.id.as_str()),
            Self::Application(application) => {
                EntityKey::new(EntityKind::Application, application.id.as_str())
            }
            Self::Calendar(calendar) => {
                EntityKey::new(EntityKind::Calendar, calendar.rh_user_id.as_str())
            }
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Self::Job(job) => job.version,
            Self::Application(application) => application.version,
            Self::Calendar(calendar) => calendar.version,
        }
    }

    pub fn set_version(&mut self, version: u64) {
        match self {
            Self::Job(job) => job.version = version,
            Self::Application(application) => application.version = version,
            Self::Calendar(calendar) => calendar.version = version,
        }
    }

    pub fn into_job(self) -> Result<Job, StoreError> {
        match self {
            Self::Job(job) => Ok(job),
            other => Err(StoreError::WrongKind {
                expected: EntityKind::Job,
                found: other.kind(),
            }),
        }
    }

    pub fn into_application(self) -> Result<Application, StoreError> {
        match self {
            Self::Application(application) => Ok(application),
            other => Err(StoreError::WrongKind {
                expected: EntityKind::Application,
                found: other.kind(),
            }),
        }
    }

    pub fn into_calendar(self) -> Result<InterviewCalendar, StoreError> {
        match self {
            Self::Calendar(calendar) => Ok(calendar),
            other => Err(StoreError::WrongKind {
                expected: EntityKind::Calendar,
                found: other.kind(),
            }),
        }
    }
}

impl From<Job> for Entity {
    fn from(value: Job) -> Self {
        Self::Job(value)
    }
}

impl From<Application> for Entity {
    fn from(value: Application) -> Self {
        Self::Application(value)
    }
}

impl From<InterviewCalendar> for Entity {
    fn from(value: InterviewCalendar) -> Self {
        Self::Calendar(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{key} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        key: EntityKey,
        expected: u64,
        found: u64,
    },
    #[error("{0} not found")]
    NotFound(EntityKey),
    #[error("stored {found} where a {expected} was expected")]
    WrongKind {
        expected: EntityKind,
        found: EntityKind,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected notification: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("conversation service unavailable: {0}")]
    Unavailable(String),
}
