use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    EffectTemplate, TransitionRule, TransitionTable, WorkflowState, WorkflowTransition,
    TRANSITION_TABLE_VERSION,
};
use crate::workflows::hiring::domain::{ActorRole, EntityKind};
use crate::workflows::hiring::engine::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum InterviewStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    /// Superseded by a newer interview for the same application.
    Rescheduled,
}

impl InterviewStatus {
    pub const ALL: [Self; 5] = [
        Self::Scheduled,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
        Self::Rescheduled,
    ];
}

impl WorkflowState for InterviewStatus {
    const KIND: EntityKind = EntityKind::Interview;

    fn name(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rescheduled => "rescheduled",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Confirmed => "Confirmed",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Rescheduled => "Rescheduled",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Rescheduled)
    }

    fn lookup(normalized: &str) -> Option<Self> {
        let status = match normalized {
            "scheduled" => Self::Scheduled,
            "confirmed" => Self::Confirmed,
            "completed" | "done" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            "rescheduled" => Self::Rescheduled,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for InterviewStatus {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InterviewStatus> for &'static str {
    fn from(value: InterviewStatus) -> Self {
        value.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewTransition {
    Confirm,
    Complete,
    Cancel,
    Reschedule,
}

impl WorkflowTransition for InterviewTransition {
    const ALL: &'static [Self] = &[Self::Confirm, Self::Complete, Self::Cancel, Self::Reschedule];

    fn name(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Reschedule => "reschedule",
        }
    }
}

const UPCOMING: &[InterviewStatus] = &[InterviewStatus::Scheduled, InterviewStatus::Confirmed];

pub static INTERVIEW_TRANSITIONS: TransitionTable<InterviewStatus, InterviewTransition> =
    TransitionTable::new(TRANSITION_TABLE_VERSION, INTERVIEW_RULES);

const INTERVIEW_RULES: &[TransitionRule<InterviewStatus, InterviewTransition>] = &[
    TransitionRule {
        from: &[InterviewStatus::Scheduled],
        transition: InterviewTransition::Confirm,
        to: InterviewStatus::Confirmed,
        allowed_roles: &[ActorRole::Candidate, ActorRole::Hr],
        required_payload: &[],
        preconditions: &[],
        effects: &[EffectTemplate::NotifyActor {
            role: ActorRole::Hr,
            template: "interview_confirmed",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: UPCOMING,
        transition: InterviewTransition::Complete,
        to: InterviewStatus::Completed,
        allowed_roles: &[ActorRole::Hr],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: UPCOMING,
        transition: InterviewTransition::Cancel,
        to: InterviewStatus::Cancelled,
        allowed_roles: &[ActorRole::Hr, ActorRole::Candidate],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    // Only the scheduler takes this edge, atomically with booking the replacement.
    TransitionRule {
        from: UPCOMING,
        transition: InterviewTransition::Reschedule,
        to: InterviewStatus::Rescheduled,
        allowed_roles: &[ActorRole::Hr],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
];
