use std::fmt;

use serde::Serialize;

use crate::workflows::hiring::domain::{ActorRole, EntityKind, JobId};
use crate::workflows::hiring::status::{JobStatus, PayloadField};

/// Rejections raised while validating or applying a transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("{kind} cannot take '{transition}' from '{from}'")]
    InvalidTransition {
        kind: EntityKind,
        from: String,
        transition: String,
    },
    #[error("{actor} may not execute '{transition}' on a {kind}")]
    Forbidden {
        kind: EntityKind,
        actor: ActorRole,
        transition: String,
    },
    #[error("invalid payload for '{transition}': {reason}")]
    InvalidPayload {
        transition: String,
        reason: PayloadProblem,
    },
    #[error("unknown {kind} state '{value}'")]
    UnknownState { kind: EntityKind, value: String },
    #[error("job {job_id} is {status} and does not accept applications")]
    JobNotAccepting { job_id: JobId, status: JobStatus },
    #[error("job {job_id} still has {count} active application(s)")]
    JobHasApplications { job_id: JobId, count: usize },
}

impl WorkflowError {
    /// Stable machine-readable code surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Forbidden { .. } => "forbidden",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::UnknownState { .. } => "unknown_state",
            Self::JobNotAccepting { .. } => "job_not_accepting",
            Self::JobHasApplications { .. } => "job_has_applications",
        }
    }

    pub(crate) fn invalid_payload(transition: &str, reason: PayloadProblem) -> Self {
        Self::InvalidPayload {
            transition: transition.to_string(),
            reason,
        }
    }
}

/// What exactly was wrong with the payload or the entity for a requested edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum PayloadProblem {
    Missing { field: PayloadField },
    RatingOutOfRange { rating: u8 },
    AssessmentOutOfRange { score: u32, max_score: u32 },
    QuestionSetsMissing { technical: u32, hr: u32 },
    EmptyQuestionSet,
    NoPendingInterview,
    EmptyNote,
    EmptyTag,
    /// Bookings and reschedules go through the interview scheduler.
    SlotRequired,
}

impl fmt::Display for PayloadProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "'{field}' is required"),
            Self::RatingOutOfRange { rating } => {
                write!(f, "rating {rating} is outside 1..=5")
            }
            Self::AssessmentOutOfRange { score, max_score } => {
                write!(f, "assessment score {score} does not fit max score {max_score}")
            }
            Self::QuestionSetsMissing { technical, hr } => write!(
                f,
                "technical and HR question sets must both be attached (technical: {technical}, hr: {hr})"
            ),
            Self::EmptyQuestionSet => f.write_str("question set must contain at least one question"),
            Self::NoPendingInterview => f.write_str("application has no pending interview"),
            Self::EmptyNote => f.write_str("note body must not be empty"),
            Self::EmptyTag => f.write_str("tags must not be blank and a tag update must name at least one"),
            Self::SlotRequired => {
                f.write_str("interviews are booked through the scheduler with a slot")
            }
        }
    }
}
