//! Pure transition engine shared by jobs, applications, and interviews.
//!
//! The engine validates a requested edge against the declarative tables in
//! [`super::status`], applies it to a cloned snapshot of the entity, and returns the
//! new snapshot plus the side-effect intents the edge requests. It performs no I/O.

mod entities;
mod error;
mod payload;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::domain::{
    ActorRole, Application, ApplicationId, CandidateId, EntityKey, Job, QuestionSetKind,
    StatusChange, TagUpdate, UserId,
};
use super::effects::{ActorNotice, CandidateNotice, SideEffect};
use super::scoring::ScoreWeights;
use super::status::{
    ApplicationStatus, EffectTemplate, JobStatus, Precondition, TransitionRule, TransitionTable,
    WorkflowState, WorkflowTransition,
};

pub use error::{PayloadProblem, WorkflowError};
pub use payload::TransitionPayload;

/// Inputs shared by every step of one transition request.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub actor: ActorRole,
    pub payload: &'a TransitionPayload,
    pub at: DateTime<Utc>,
    pub weights: ScoreWeights,
}

impl TransitionContext<'_> {
    pub(crate) fn change<S>(&self, from: S, to: S, transition: &str) -> StatusChange<S> {
        StatusChange {
            from,
            to,
            transition: transition.to_string(),
            actor: self.actor,
            at: self.at,
        }
    }
}

/// An entity driven by one of the transition tables.
pub trait WorkflowEntity: Clone {
    type State: WorkflowState;
    type Transition: WorkflowTransition;

    fn table() -> &'static TransitionTable<Self::State, Self::Transition>;

    fn key(&self) -> EntityKey;

    fn state(&self) -> Self::State;

    fn check_precondition(&self, precondition: Precondition) -> Result<(), PayloadProblem>;

    /// Moves to `rule.to`, appends the history entry, and writes edge-specific data.
    fn apply_rule(
        &mut self,
        rule: &TransitionRule<Self::State, Self::Transition>,
        context: &TransitionContext<'_>,
    );

    /// Candidate addressed by `NotifyCandidate` effects.
    fn candidate(&self) -> Option<(&ApplicationId, &CandidateId)> {
        None
    }

    /// Template variables attached to every notice about this entity.
    fn notice_details(&self) -> BTreeMap<String, String>;
}

/// Result of a successful transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome<E> {
    pub entity: E,
    /// Names of the edges taken, including any automatic follow-up.
    pub applied: Vec<&'static str>,
    pub side_effects: Vec<SideEffect>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowEngine {
    weights: ScoreWeights,
}

impl WorkflowEngine {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Validates and applies `transition`, then any follow-up edge as `system`.
    pub fn apply<E: WorkflowEntity>(
        &self,
        entity: &E,
        actor: ActorRole,
        transition: E::Transition,
        payload: &TransitionPayload,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<E>, WorkflowError> {
        let context = TransitionContext {
            actor,
            payload,
            at,
            weights: self.weights,
        };

        let rule = self.resolve(entity, transition, &context)?;
        let mut next = entity.clone();
        let mut side_effects = Vec::new();
        let mut applied = Vec::with_capacity(2);
        self.take_edge(&mut next, rule, &context, &mut side_effects);
        applied.push(rule.transition.name());

        if let Some(follow_up) = rule.follow_up {
            let system_payload = TransitionPayload::empty();
            let system_context = TransitionContext {
                actor: ActorRole::System,
                payload: &system_payload,
                ..context
            };
            let follow_rule = self.resolve(&next, follow_up, &system_context)?;
            self.take_edge(&mut next, follow_rule, &system_context, &mut side_effects);
            applied.push(follow_rule.transition.name());
        }

        Ok(TransitionOutcome {
            entity: next,
            applied,
            side_effects,
        })
    }

    /// Same as [`Self::apply`] for a transition named on the wire.
    pub fn apply_named<E: WorkflowEntity>(
        &self,
        entity: &E,
        actor: ActorRole,
        transition: &str,
        payload: &TransitionPayload,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<E>, WorkflowError> {
        let parsed = E::Transition::parse(transition).ok_or_else(|| {
            WorkflowError::InvalidTransition {
                kind: E::State::KIND,
                from: entity.state().name().to_string(),
                transition: transition.to_string(),
            }
        })?;
        self.apply(entity, actor, parsed, payload, at)
    }

    /// Edges out of the current state the role may execute.
    pub fn available_transitions<E: WorkflowEntity>(
        &self,
        entity: &E,
        role: ActorRole,
    ) -> Vec<E::Transition> {
        E::table()
            .edges_from(entity.state())
            .filter(|rule| rule.permits(role))
            .map(|rule| rule.transition)
            .collect()
    }

    /// Records the size of a question set on a job that is still being prepared.
    ///
    /// Technical sets belong to the project leader, HR sets to HR.
    pub fn attach_question_set(
        &self,
        job: &Job,
        actor: ActorRole,
        kind: QuestionSetKind,
        question_count: u32,
        at: DateTime<Utc>,
    ) -> Result<Job, WorkflowError> {
        const OPERATION: &str = "attach_question_set";

        if !matches!(
            job.status,
            JobStatus::Draft | JobStatus::PendingHr | JobStatus::HrCompleted
        ) {
            return Err(WorkflowError::InvalidTransition {
                kind: JobStatus::KIND,
                from: job.status.name().to_string(),
                transition: OPERATION.to_string(),
            });
        }

        let owner = match kind {
            QuestionSetKind::Technical => ActorRole::ProjectLeader,
            QuestionSetKind::Hr => ActorRole::Hr,
        };
        if actor != owner {
            return Err(WorkflowError::Forbidden {
                kind: JobStatus::KIND,
                actor,
                transition: OPERATION.to_string(),
            });
        }

        if question_count == 0 {
            return Err(WorkflowError::invalid_payload(
                OPERATION,
                PayloadProblem::EmptyQuestionSet,
            ));
        }

        let mut next = job.clone();
        match kind {
            QuestionSetKind::Technical => next.technical_question_count = question_count,
            QuestionSetKind::Hr => next.hr_question_count = question_count,
        }
        next.updated_at = at;
        debug!(job_id = %job.id, ?kind, question_count, "question set attached");
        Ok(next)
    }

    /// Opens a new application against a published job.
    pub fn open_application(
        &self,
        job: &Job,
        application_id: ApplicationId,
        candidate_id: CandidateId,
        at: DateTime<Utc>,
    ) -> Result<Application, WorkflowError> {
        if !job.accepts_applications() {
            return Err(WorkflowError::JobNotAccepting {
                job_id: job.id.clone(),
                status: job.status,
            });
        }
        Ok(Application::submitted(application_id, job, candidate_id, at))
    }

    /// Appends a note; terminal applications still accept notes.
    pub fn append_note(
        &self,
        application: &Application,
        author: UserId,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<Application, WorkflowError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(WorkflowError::invalid_payload(
                "append_note",
                PayloadProblem::EmptyNote,
            ));
        }
        let mut next = application.clone();
        next.append_note(author, body, at);
        Ok(next)
    }

    /// Applies a tag update in every status. Tags are trimmed and lowercased.
    pub fn update_tags(
        &self,
        application: &Application,
        update: &TagUpdate,
        at: DateTime<Utc>,
    ) -> Result<Application, WorkflowError> {
        let add = normalize_tags(&update.add)?;
        let remove = normalize_tags(&update.remove)?;
        if add.is_empty() && remove.is_empty() {
            return Err(WorkflowError::invalid_payload(
                "update_tags",
                PayloadProblem::EmptyTag,
            ));
        }
        let mut next = application.clone();
        if next.retag(&add, &remove, at) {
            debug!(application_id = %next.id, tags = ?next.tags(), "tags updated");
        }
        Ok(next)
    }

    /// Hard deletion is refused while any non-withdrawn application references the job.
    pub fn ensure_job_deletable(
        &self,
        job: &Job,
        applications: &[Application],
    ) -> Result<(), WorkflowError> {
        let count = applications
            .iter()
            .filter(|application| {
                application.job_id == job.id && application.status != ApplicationStatus::Withdrawn
            })
            .count();

        if count > 0 {
            return Err(WorkflowError::JobHasApplications {
                job_id: job.id.clone(),
                count,
            });
        }
        Ok(())
    }

    fn resolve<E: WorkflowEntity>(
        &self,
        entity: &E,
        transition: E::Transition,
        context: &TransitionContext<'_>,
    ) -> Result<&'static TransitionRule<E::State, E::Transition>, WorkflowError> {
        let from = entity.state();
        let name = transition.name();

        let result = Self::check(entity, from, transition, context);
        if let Err(error) = &result {
            debug!(
                entity = %entity.key(),
                from = from.name(),
                transition = name,
                actor = %context.actor,
                %error,
                "transition rejected"
            );
        }
        result
    }

    fn check<E: WorkflowEntity>(
        entity: &E,
        from: E::State,
        transition: E::Transition,
        context: &TransitionContext<'_>,
    ) -> Result<&'static TransitionRule<E::State, E::Transition>, WorkflowError> {
        let name = transition.name();
        let rule = E::table().rule(from, transition).ok_or_else(|| {
            WorkflowError::InvalidTransition {
                kind: E::State::KIND,
                from: from.name().to_string(),
                transition: name.to_string(),
            }
        })?;

        if !rule.permits(context.actor) {
            return Err(WorkflowError::Forbidden {
                kind: E::State::KIND,
                actor: context.actor,
                transition: name.to_string(),
            });
        }

        context
            .payload
            .validate(rule.required_payload)
            .map_err(|reason| WorkflowError::invalid_payload(name, reason))?;

        for &precondition in rule.preconditions {
            entity
                .check_precondition(precondition)
                .map_err(|reason| WorkflowError::invalid_payload(name, reason))?;
        }

        Ok(rule)
    }

    fn take_edge<E: WorkflowEntity>(
        &self,
        entity: &mut E,
        rule: &TransitionRule<E::State, E::Transition>,
        context: &TransitionContext<'_>,
        side_effects: &mut Vec<SideEffect>,
    ) {
        let from = entity.state();
        entity.apply_rule(rule, context);

        info!(
            entity = %entity.key(),
            from = from.name(),
            to = rule.to.name(),
            transition = rule.transition.name(),
            actor = %context.actor,
            "transition applied"
        );

        for &template in rule.effects {
            match materialize(entity, template, rule.transition.name(), context) {
                Some(effect) => side_effects.push(effect),
                None => debug!(
                    entity = %entity.key(),
                    ?template,
                    "effect has no recipient for this entity"
                ),
            }
        }
    }
}

fn materialize<E: WorkflowEntity>(
    entity: &E,
    template: EffectTemplate,
    transition: &str,
    context: &TransitionContext<'_>,
) -> Option<SideEffect> {
    let mut details = entity.notice_details();
    details.insert("transition".to_string(), transition.to_string());
    details.insert("status".to_string(), entity.state().name().to_string());
    if let Some(feedback) = context.payload.feedback_text() {
        details.insert("feedback".to_string(), feedback.to_string());
    }

    match template {
        EffectTemplate::NotifyCandidate { template } => {
            let (application_id, candidate_id) = entity.candidate()?;
            Some(SideEffect::NotifyCandidate(CandidateNotice {
                template: template.to_string(),
                application_id: application_id.clone(),
                candidate_id: candidate_id.clone(),
                details,
            }))
        }
        EffectTemplate::NotifyActor { role, template } => {
            Some(SideEffect::NotifyActor(ActorNotice {
                role,
                template: template.to_string(),
                entity: entity.key(),
                details,
            }))
        }
    }
}

fn normalize_tags(raw: &[String]) -> Result<Vec<String>, WorkflowError> {
    raw.iter()
        .map(|tag| {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() {
                Err(WorkflowError::invalid_payload(
                    "update_tags",
                    PayloadProblem::EmptyTag,
                ))
            } else {
                Ok(tag)
            }
        })
        .collect()
}
