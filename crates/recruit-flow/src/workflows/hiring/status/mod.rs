//! Declarative transition tables for jobs, applications, and interviews.
//!
//! Each table lists every legal edge together with the roles allowed to take it, the payload
//! fields it requires, the entity preconditions it checks, and the side effects it requests.
//! The workflow engine consults these tables and nothing else, so adding an edge never touches
//! engine code.

mod application;
mod interview;
mod job;

use std::fmt;

use serde::Serialize;

use super::domain::{ActorRole, EntityKind};
use super::engine::WorkflowError;

pub use application::{ApplicationStatus, ApplicationTransition, APPLICATION_TRANSITIONS};
pub use interview::{InterviewStatus, InterviewTransition, INTERVIEW_TRANSITIONS};
pub use job::{JobStatus, JobTransition, JOB_TRANSITIONS};

/// Bumped whenever a table changes shape so persisted audit entries can be traced back.
pub const TRANSITION_TABLE_VERSION: u32 = 1;

/// A state of one of the workflow entities.
pub trait WorkflowState: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Canonical snake_case name used in storage and on the wire.
    fn name(self) -> &'static str;

    /// Human readable label for dashboards.
    fn label(self) -> &'static str;

    fn is_terminal(self) -> bool;

    /// Resolves canonical names and legacy display labels.
    fn lookup(normalized: &str) -> Option<Self>;

    /// Parses a persisted status string, surfacing corrupted values instead of defaulting.
    fn parse(raw: &str) -> Result<Self, WorkflowError> {
        Self::lookup(&normalize(raw)).ok_or_else(|| WorkflowError::UnknownState {
            kind: Self::KIND,
            value: raw.to_string(),
        })
    }
}

/// A named edge of a transition table.
pub trait WorkflowTransition: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|transition| transition.name() == normalized)
    }
}

/// Lowercases and folds spaces and dashes so `CEO Approval`, `ceo-approval`, and
/// `CEO_Approval` resolve alike.
pub(crate) fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadField {
    Feedback,
    Assessment,
}

impl PayloadField {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Assessment => "assessment",
        }
    }
}

impl fmt::Display for PayloadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Entity-level checks an edge requires beyond role and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Job carries at least one technical and one HR question.
    QuestionSetsAttached,
    /// Application holds an interview that has not yet taken place.
    PendingInterview,
}

/// Side effect requested by an edge; materialized by the engine with entity ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTemplate {
    NotifyCandidate { template: &'static str },
    NotifyActor { role: ActorRole, template: &'static str },
}

#[derive(Debug)]
pub struct TransitionRule<S: 'static, T: 'static> {
    pub from: &'static [S],
    pub transition: T,
    pub to: S,
    pub allowed_roles: &'static [ActorRole],
    pub required_payload: &'static [PayloadField],
    pub preconditions: &'static [Precondition],
    pub effects: &'static [EffectTemplate],
    /// Edge applied automatically, as `system`, right after this one.
    pub follow_up: Option<T>,
}

impl<S, T> TransitionRule<S, T> {
    pub fn permits(&self, role: ActorRole) -> bool {
        self.allowed_roles.contains(&role)
    }
}

#[derive(Debug)]
pub struct TransitionTable<S: 'static, T: 'static> {
    version: u32,
    rules: &'static [TransitionRule<S, T>],
}

impl<S, T> TransitionTable<S, T> {
    pub const fn new(version: u32, rules: &'static [TransitionRule<S, T>]) -> Self {
        Self { version, rules }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn rules(&self) -> &'static [TransitionRule<S, T>] {
        self.rules
    }
}

impl<S: WorkflowState, T: WorkflowTransition> TransitionTable<S, T> {
    pub fn rule(&self, from: S, transition: T) -> Option<&'static TransitionRule<S, T>> {
        self.rules
            .iter()
            .find(|rule| rule.transition == transition && rule.from.contains(&from))
    }

    pub fn edges_from(&self, from: S) -> impl Iterator<Item = &'static TransitionRule<S, T>> {
        self.rules.iter().filter(move |rule| rule.from.contains(&from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed<S: WorkflowState, T: WorkflowTransition>(
        table: &TransitionTable<S, T>,
        states: &[S],
    ) {
        for &state in states {
            for &transition in T::ALL {
                let matches = table
                    .rules()
                    .iter()
                    .filter(|rule| rule.transition == transition && rule.from.contains(&state))
                    .count();
                assert!(
                    matches <= 1,
                    "{state:?} has {matches} rules for {transition:?}"
                );
            }

            if state.is_terminal() {
                assert_eq!(
                    table.edges_from(state).count(),
                    0,
                    "terminal state {state:?} must have no outgoing edges"
                );
            }

            assert_eq!(S::parse(state.name()).expect("canonical name parses"), state);
        }

        for rule in table.rules() {
            assert!(!rule.allowed_roles.is_empty(), "{:?} has no roles", rule.transition);
            if let Some(follow_up) = rule.follow_up {
                let next = table
                    .rule(rule.to, follow_up)
                    .expect("follow-up edge exists from the target state");
                assert!(next.permits(ActorRole::System));
                assert!(next.follow_up.is_none(), "follow-ups do not chain");
            }
        }
    }

    #[test]
    fn tables_are_deterministic_and_terminal_states_are_closed() {
        assert_well_formed(&JOB_TRANSITIONS, &JobStatus::ALL);
        assert_well_formed(&APPLICATION_TRANSITIONS, &ApplicationStatus::ALL);
        assert_well_formed(&INTERVIEW_TRANSITIONS, &InterviewStatus::ALL);
    }

    #[test]
    fn tables_share_the_published_version() {
        assert_eq!(JOB_TRANSITIONS.version(), TRANSITION_TABLE_VERSION);
        assert_eq!(APPLICATION_TRANSITIONS.version(), TRANSITION_TABLE_VERSION);
        assert_eq!(INTERVIEW_TRANSITIONS.version(), TRANSITION_TABLE_VERSION);
    }

    #[test]
    fn normalize_folds_legacy_spellings() {
        assert_eq!(normalize(" CEO_Approval "), "ceo_approval");
        assert_eq!(normalize("Pending HR"), "pending_hr");
        assert_eq!(normalize("in-person"), "in_person");
    }

    #[test]
    fn transition_names_round_trip() {
        for &transition in JobTransition::ALL {
            assert_eq!(JobTransition::parse(transition.name()), Some(transition));
        }
        for &transition in ApplicationTransition::ALL {
            assert_eq!(ApplicationTransition::parse(transition.name()), Some(transition));
        }
        assert_eq!(JobTransition::parse("Approve"), Some(JobTransition::Approve));
        assert_eq!(JobTransition::parse("teleport"), None);
    }
}
