use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    EffectTemplate, PayloadField, Precondition, TransitionRule, TransitionTable, WorkflowState,
    WorkflowTransition, TRANSITION_TABLE_VERSION,
};
use crate::workflows::hiring::domain::{ActorRole, EntityKind};
use crate::workflows::hiring::engine::WorkflowError;

/// High level status tracked throughout the application workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ApplicationStatus {
    Submitted,
    TechnicalReview,
    HrReview,
    UnderReview,
    /// Waiting substate of `UnderReview` while the project leader holds the decision.
    PendingDecision,
    InterviewScheduled,
    FinalReview,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [Self; 10] = [
        Self::Submitted,
        Self::TechnicalReview,
        Self::HrReview,
        Self::UnderReview,
        Self::PendingDecision,
        Self::InterviewScheduled,
        Self::FinalReview,
        Self::Accepted,
        Self::Rejected,
        Self::Withdrawn,
    ];

    pub const NON_TERMINAL: [Self; 7] = [
        Self::Submitted,
        Self::TechnicalReview,
        Self::HrReview,
        Self::UnderReview,
        Self::PendingDecision,
        Self::InterviewScheduled,
        Self::FinalReview,
    ];
}

impl WorkflowState for ApplicationStatus {
    const KIND: EntityKind = EntityKind::Application;

    fn name(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::TechnicalReview => "technical_review",
            Self::HrReview => "hr_review",
            Self::UnderReview => "under_review",
            Self::PendingDecision => "pending_decision",
            Self::InterviewScheduled => "interview_scheduled",
            Self::FinalReview => "final_review",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::TechnicalReview => "Technical Review",
            Self::HrReview => "HR Review",
            Self::UnderReview => "Under Review",
            Self::PendingDecision => "Pending Decision",
            Self::InterviewScheduled => "Interview Scheduled",
            Self::FinalReview => "Final Review",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Withdrawn => "Withdrawn",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Withdrawn)
    }

    fn lookup(normalized: &str) -> Option<Self> {
        let status = match normalized {
            "submitted" | "applied" | "new" => Self::Submitted,
            "technical_review" | "technical_test" => Self::TechnicalReview,
            "hr_review" | "rh_review" => Self::HrReview,
            "under_review" | "reviewing" => Self::UnderReview,
            "pending_decision" | "pending" => Self::PendingDecision,
            "interview_scheduled" | "interview" => Self::InterviewScheduled,
            "final_review" => Self::FinalReview,
            "accepted" | "hired" => Self::Accepted,
            "rejected" => Self::Rejected,
            "withdrawn" => Self::Withdrawn,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ApplicationStatus> for &'static str {
    fn from(value: ApplicationStatus) -> Self {
        value.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationTransition {
    StartTechnicalReview,
    RecordTechnicalAssessment,
    WaiveTechnicalAssessment,
    RecordHrAssessment,
    WaiveHrAssessment,
    DeferDecision,
    ResumeReview,
    ScheduleInterview,
    CancelInterview,
    CompleteInterview,
    MoveToFinalReview,
    Accept,
    Reject,
    Withdraw,
}

impl WorkflowTransition for ApplicationTransition {
    const ALL: &'static [Self] = &[
        Self::StartTechnicalReview,
        Self::RecordTechnicalAssessment,
        Self::WaiveTechnicalAssessment,
        Self::RecordHrAssessment,
        Self::WaiveHrAssessment,
        Self::DeferDecision,
        Self::ResumeReview,
        Self::ScheduleInterview,
        Self::CancelInterview,
        Self::CompleteInterview,
        Self::MoveToFinalReview,
        Self::Accept,
        Self::Reject,
        Self::Withdraw,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::StartTechnicalReview => "start_technical_review",
            Self::RecordTechnicalAssessment => "record_technical_assessment",
            Self::WaiveTechnicalAssessment => "waive_technical_assessment",
            Self::RecordHrAssessment => "record_hr_assessment",
            Self::WaiveHrAssessment => "waive_hr_assessment",
            Self::DeferDecision => "defer_decision",
            Self::ResumeReview => "resume_review",
            Self::ScheduleInterview => "schedule_interview",
            Self::CancelInterview => "cancel_interview",
            Self::CompleteInterview => "complete_interview",
            Self::MoveToFinalReview => "move_to_final_review",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Withdraw => "withdraw",
        }
    }
}

const REVIEWABLE: &[ApplicationStatus] =
    &[ApplicationStatus::UnderReview, ApplicationStatus::PendingDecision];

const READY_FOR_REVIEW: &[EffectTemplate] = &[EffectTemplate::NotifyActor {
    role: ActorRole::ProjectLeader,
    template: "application_ready_for_review",
}];

const WITHDRAWN_NOTICE: EffectTemplate = EffectTemplate::NotifyActor {
    role: ActorRole::ProjectLeader,
    template: "application_withdrawn",
};

pub static APPLICATION_TRANSITIONS: TransitionTable<ApplicationStatus, ApplicationTransition> =
    TransitionTable::new(TRANSITION_TABLE_VERSION, APPLICATION_RULES);

const APPLICATION_RULES: &[TransitionRule<ApplicationStatus, ApplicationTransition>] = &[
    TransitionRule {
        from: &[ApplicationStatus::Submitted],
        transition: ApplicationTransition::StartTechnicalReview,
        to: ApplicationStatus::TechnicalReview,
        allowed_roles: &[ActorRole::System, ActorRole::ProjectLeader],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::TechnicalReview],
        transition: ApplicationTransition::RecordTechnicalAssessment,
        to: ApplicationStatus::HrReview,
        allowed_roles: &[ActorRole::System],
        required_payload: &[PayloadField::Assessment],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::TechnicalReview],
        transition: ApplicationTransition::WaiveTechnicalAssessment,
        to: ApplicationStatus::HrReview,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[PayloadField::Feedback],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::HrReview],
        transition: ApplicationTransition::RecordHrAssessment,
        to: ApplicationStatus::UnderReview,
        allowed_roles: &[ActorRole::System],
        required_payload: &[PayloadField::Assessment],
        preconditions: &[],
        effects: READY_FOR_REVIEW,
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::HrReview],
        transition: ApplicationTransition::WaiveHrAssessment,
        to: ApplicationStatus::UnderReview,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[PayloadField::Feedback],
        preconditions: &[],
        effects: READY_FOR_REVIEW,
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::UnderReview],
        transition: ApplicationTransition::DeferDecision,
        to: ApplicationStatus::PendingDecision,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::PendingDecision],
        transition: ApplicationTransition::ResumeReview,
        to: ApplicationStatus::UnderReview,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    // Interview notices are composed by the scheduler, which knows the slot details.
    TransitionRule {
        from: REVIEWABLE,
        transition: ApplicationTransition::ScheduleInterview,
        to: ApplicationStatus::InterviewScheduled,
        allowed_roles: &[ActorRole::Hr],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::InterviewScheduled],
        transition: ApplicationTransition::CancelInterview,
        to: ApplicationStatus::UnderReview,
        allowed_roles: &[ActorRole::Hr, ActorRole::Candidate],
        required_payload: &[],
        preconditions: &[Precondition::PendingInterview],
        effects: &[EffectTemplate::NotifyCandidate {
            template: "interview_cancelled",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::InterviewScheduled],
        transition: ApplicationTransition::CompleteInterview,
        to: ApplicationStatus::FinalReview,
        allowed_roles: &[ActorRole::Hr],
        required_payload: &[],
        preconditions: &[Precondition::PendingInterview],
        effects: &[EffectTemplate::NotifyActor {
            role: ActorRole::ProjectLeader,
            template: "application_final_review",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: REVIEWABLE,
        transition: ApplicationTransition::MoveToFinalReview,
        to: ApplicationStatus::FinalReview,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[],
        preconditions: &[],
        effects: &[],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::FinalReview],
        transition: ApplicationTransition::Accept,
        to: ApplicationStatus::Accepted,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[],
        preconditions: &[],
        effects: &[
            EffectTemplate::NotifyCandidate {
                template: "application_accepted",
            },
            EffectTemplate::NotifyActor {
                role: ActorRole::Hr,
                template: "candidate_hired",
            },
        ],
        follow_up: None,
    },
    TransitionRule {
        from: &[
            ApplicationStatus::UnderReview,
            ApplicationStatus::PendingDecision,
            ApplicationStatus::FinalReview,
        ],
        transition: ApplicationTransition::Reject,
        to: ApplicationStatus::Rejected,
        allowed_roles: &[ActorRole::ProjectLeader],
        required_payload: &[PayloadField::Feedback],
        preconditions: &[],
        effects: &[EffectTemplate::NotifyCandidate {
            template: "application_rejected",
        }],
        follow_up: None,
    },
    TransitionRule {
        from: &[
            ApplicationStatus::Submitted,
            ApplicationStatus::TechnicalReview,
            ApplicationStatus::HrReview,
            ApplicationStatus::UnderReview,
            ApplicationStatus::PendingDecision,
            ApplicationStatus::FinalReview,
        ],
        transition: ApplicationTransition::Withdraw,
        to: ApplicationStatus::Withdrawn,
        allowed_roles: &[ActorRole::Candidate],
        required_payload: &[],
        preconditions: &[],
        effects: &[WITHDRAWN_NOTICE],
        follow_up: None,
    },
    TransitionRule {
        from: &[ApplicationStatus::InterviewScheduled],
        transition: ApplicationTransition::Withdraw,
        to: ApplicationStatus::Withdrawn,
        allowed_roles: &[ActorRole::Candidate],
        required_payload: &[],
        preconditions: &[],
        effects: &[
            WITHDRAWN_NOTICE,
            EffectTemplate::NotifyActor {
                role: ActorRole::Hr,
                template: "interview_released",
            },
        ],
        follow_up: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraw_is_reachable_from_every_non_terminal_state() {
        for status in ApplicationStatus::NON_TERMINAL {
            let rule = APPLICATION_TRANSITIONS
                .rule(status, ApplicationTransition::Withdraw)
                .unwrap_or_else(|| panic!("withdraw missing from {status:?}"));
            assert_eq!(rule.allowed_roles, &[ActorRole::Candidate]);
            assert_eq!(rule.to, ApplicationStatus::Withdrawn);
        }
    }

    #[test]
    fn feedback_is_required_for_rejection_only() {
        let reject = APPLICATION_TRANSITIONS
            .rule(ApplicationStatus::FinalReview, ApplicationTransition::Reject)
            .expect("reject edge");
        assert_eq!(reject.required_payload, &[PayloadField::Feedback]);

        let accept = APPLICATION_TRANSITIONS
            .rule(ApplicationStatus::FinalReview, ApplicationTransition::Accept)
            .expect("accept edge");
        assert!(accept.required_payload.is_empty());
        assert_eq!(accept.allowed_roles, &[ActorRole::ProjectLeader]);
    }

    #[test]
    fn legacy_labels_resolve() {
        assert_eq!(
            ApplicationStatus::parse("Interview Scheduled").unwrap(),
            ApplicationStatus::InterviewScheduled
        );
        assert_eq!(ApplicationStatus::parse("hired").unwrap(), ApplicationStatus::Accepted);
        assert!(ApplicationStatus::parse("ghosted").is_err());
    }
}
