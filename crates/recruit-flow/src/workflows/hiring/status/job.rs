use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    EffectTemplate, PayloadField, Precondition, TransitionRule, TransitionTable, WorkflowState,
    WorkflowTransition, TRANSITION_TABLE_VERSION,
};
use crate::workflows::hiring::domain::{ActorRole, EntityKind};
use crate::workflows::hiring::engine::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum JobStatus {
    Draft,
    PendingHr,
    HrCompleted,
    PendingApproval,
    Approved,
    Published,
    Paused,
    Closed,
    Rejected,
}

impl JobStatus {
    pub const ALL: [Self; 9] = [
        Self::Draft,
        Self::PendingHr,
        Self::HrCompleted,
        Self::PendingApproval,
        Self::Approved,
        Self::Published,
        Self::Paused,
        Self::Closed,
        Self::Rejected,
    ];
}

impl WorkflowState for JobStatus {
    const KIND: EntityKind = EntityKind::Job;

    fn name(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingHr => "pending_hr",
            Self::HrCompleted => "hr_completed",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Published => "published",
            Self::Paused => "paused",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::PendingHr => "Pending HR",
            Self::HrCompleted => "HR Completed",
            Self::PendingApproval => "CEO Approval",
            Self::Approved => "Approved",
            Self::Published => "Published",
            Self::Paused => "Paused",
            Self::Closed => "Closed",
            Self::Rejected => "Rejected",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Rejected)
    }

    fn lookup(normalized: &str) -> Option<Self> {
        let status = match normalized {
            "draft" => Self::Draft,
            "pending_hr" | "hr_pending" => Self::PendingHr,
            "hr_completed" | "hr_complete" => Self::HrCompleted,
            "pending_approval" | "ceo_approval" | "pending_ceo" => Self::PendingApproval,
            "approved" => Self::Approved,
            "published" | "active" => Self::Published,
            "paused" => Self::Paused,
            "closed" => Self::Closed,
            "rejected" => Self::Rejected,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for JobStatus {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JobStatus> for &'static str {
    fn from(value: JobStatus) -> Self {
        value.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTransition {
    SubmitToHr,
    CompleteHr,
    SubmitForApproval,
    Approve,
    Reject,
    RequestModifications,
    Publish,
    Pause,
    Resume,
    Close,
}

impl WorkflowTransition for JobTransition {
    const ALL: &'static [Self] = &[
        Self::SubmitToHr,
        Self::CompleteHr,
        Self::SubmitForApproval,
        Self::Approve,
        Self::Reject,
        Self::RequestModifications,
        Self::Publish,
        Self::Pause,
        Self::Resume,
        Self::Close,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::SubmitToHr => "submit_to_hr",
            Self::CompleteHr => "complete_hr",
            Self::SubmitForApproval => "submit_for_approval",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestModifications => "request_modifications",
            Self::Publish => "publish",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Close => "close",
        }
    }
}

const LEADERSHIP: &[ActorRole] = &[ActorRole::ProjectLeader, ActorRole::Ceo];

pub static JOB_TRANSITIONS: TransitionTable<JobStatus, JobTransition> =
    TransitionTable::new(TRANSITION_TABLE_VERSION, JOB_RULES);

const JOB_RULES: &[TransitionRule<JobStatus, JobTransition>] = &[
    TransitionRule {
        from: &[JobStatus::Draft],
        transition: JobTransition::SubmitToHr,
        to: JobStatus::PendingHr,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[],
        preconditions: &[],
        effects: &[EffectTemplate::NotifyActor {
            role: ActorRole::Hr,
            template: "job_pending_hr",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::PendingHr],
        transition: JobTransition::CompleteHr,
        to: JobStatus::HrCompleted,
        allowed_roles: &[ActorRole::Hr],
        required_payload: &[],
        preconditions: &[],
        effects: &[EffectTemplate::NotifyActor {
            role: ActorRole::ProjectLeader,
            template: "job_hr_completed",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::HrCompleted],
        transition: JobTransition::SubmitForApproval,
        to: JobStatus::PendingApproval,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[],
        preconditions: &[Precondition::QuestionSetsAttached],
        effects: &[EffectTemplate::NotifyActor {
            role: ActorRole::Ceo,
            template: "job_pending_approval",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::PendingApproval],
        transition: JobTransition::Approve,
        to: JobStatus::Approved,
        allowed_roles: &[ActorRole::Ceo],
        required_payload: &[],
        preconditions: &[Precondition::QuestionSetsAttached],
        effects: &[EffectTemplate::NotifyActor {
            role: ActorRole::ProjectLeader,
            template: "job_approved",
        }],
        follow_up: Some(JobTransition::Publish),
    },
    TransitionRule {
        from: &[JobStatus::PendingApproval],
        transition: JobTransition::Reject,
        to: JobStatus::Rejected,
        allowed_roles: &[ActorRole::Ceo],
        required_payload: &[PayloadField::Feedback],
        preconditions: &[],
        effects: &[EffectTemplate::NotifyActor {
            role: ActorRole::ProjectLeader,
            template: "job_rejected",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::PendingApproval],
        transition: JobTransition::RequestModifications,
        to: JobStatus::PendingHr,
        allowed_roles: &[ActorRole::Ceo],
        required_payload: &[PayloadField::Feedback],
        preconditions: &[],
        effects: &[
            EffectTemplate::NotifyActor {
                role: ActorRole::Hr,
                template: "job_modifications_requested",
            },
            EffectTemplate::NotifyActor {
                role: ActorRole::ProjectLeader,
                template: "job_modifications_requested",
            },
        ],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::Approved],
        transition: JobTransition::Publish,
        to: JobStatus::Published,
        allowed_roles: &[ActorRole::Ceo, ActorRole::ProjectLeader, ActorRole::System],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::Published],
        transition: JobTransition::Pause,
        to: JobStatus::Paused,
        allowed_roles: LEADERSHIP,
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::Paused],
        transition: JobTransition::Resume,
        to: JobStatus::Published,
        allowed_roles: LEADERSHIP,
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[JobStatus::Published, JobStatus::Paused],
        transition: JobTransition::Close,
        to: JobStatus::Closed,
        allowed_roles: LEADERSHIP,
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
];
