use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::collaborators::{ConversationService, Entity, EntityStore, NotificationSender, StoreError};
use super::domain::{
    ActorRole, Application, ApplicationId, CandidateId, EntityKey, EntityKind, Interview,
    InterviewCalendar, Job, JobId, NewJob, QuestionSetKind, TagUpdate, UserId,
};
use super::effects::{ActorNotice, EffectReport, EffectRunner, SideEffect};
use super::engine::{
    PayloadProblem, TransitionOutcome, TransitionPayload, WorkflowEngine, WorkflowEntity,
    WorkflowError,
};
use super::pipeline::{PipelineAggregator, PipelineSummary, StageTrends};
use super::scheduler::{
    CandidateContext, InterviewScheduler, ScheduleRequest, SchedulingError,
};
use super::scoring::ScoreWeights;
use super::status::{
    ApplicationTransition, InterviewTransition, WorkflowState, WorkflowTransition,
};
use crate::config::WorkflowConfig;

/// Transition request as it arrives from a dashboard action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub actor: ActorRole,
    pub transition: String,
    #[serde(default)]
    pub payload: TransitionPayload,
    /// Version the caller last saw; stale requests fail with a version conflict.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

impl TransitionRequest {
    pub fn new(actor: ActorRole, transition: impl Into<String>) -> Self {
        Self {
            actor,
            transition: transition.into(),
            payload: TransitionPayload::default(),
            expected_version: None,
        }
    }

    pub fn with_payload(mut self, payload: TransitionPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Persisted entity plus the intents its transition produced and how delivery went.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionReceipt<E> {
    pub entity: E,
    pub applied: Vec<&'static str>,
    pub side_effects: Vec<SideEffect>,
    pub delivery: EffectReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReceipt {
    pub application: Application,
    pub interview: Interview,
    pub replaced: Option<Interview>,
    pub side_effects: Vec<SideEffect>,
    pub delivery: EffectReport,
}

/// Read, compute, write-if-version wrapper around the pure workflow core.
pub struct HiringWorkflowService<S, N, C> {
    store: Arc<S>,
    runner: EffectRunner<N, C>,
    engine: WorkflowEngine,
    scheduler: InterviewScheduler,
    aggregator: PipelineAggregator,
    schedule_attempts: u32,
}

impl<S, N, C> HiringWorkflowService<S, N, C>
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        conversations: Arc<C>,
        config: &WorkflowConfig,
    ) -> Self {
        let engine = WorkflowEngine::new(ScoreWeights::from_technical_share(
            config.technical_weight,
        ));
        Self {
            store,
            runner: EffectRunner::new(notifier, conversations),
            engine,
            scheduler: InterviewScheduler::new(engine),
            aggregator: PipelineAggregator::new(config.bottleneck_threshold_days),
            schedule_attempts: config.schedule_attempts.max(1),
        }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Opens a draft posting on behalf of a project leader.
    pub fn create_job(
        &self,
        actor: ActorRole,
        created_by: UserId,
        draft: NewJob,
    ) -> Result<Job, HiringServiceError> {
        if actor != ActorRole::ProjectLeader {
            return Err(WorkflowError::Forbidden {
                kind: EntityKind::Job,
                actor,
                transition: "create_job".to_string(),
            }
            .into());
        }

        let job_id = JobId(self.store.allocate_id(EntityKind::Job)?);
        let job = Job::draft(job_id, draft, created_by, Utc::now());
        let stored = self.store.write_if_version(job.into(), 0)?.into_job()?;
        info!(job_id = %stored.id, title = %stored.title, "job drafted");
        Ok(stored)
    }

    pub fn job(&self, job_id: &JobId) -> Result<Job, HiringServiceError> {
        let key = EntityKey::new(EntityKind::Job, job_id.as_str());
        Ok(self.store.read(&key)?.into_job()?)
    }

    pub fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, HiringServiceError> {
        let key = EntityKey::new(EntityKind::Application, application_id.as_str());
        Ok(self.store.read(&key)?.into_application()?)
    }

    /// The HR user's calendar; users without bookings get an empty, unversioned one.
    pub fn calendar(&self, rh_user_id: &UserId) -> Result<InterviewCalendar, HiringServiceError> {
        let key = EntityKey::new(EntityKind::Calendar, rh_user_id.as_str());
        match self.store.read(&key) {
            Ok(entity) => Ok(entity.into_calendar()?),
            Err(StoreError::NotFound(_)) => Ok(InterviewCalendar::empty(rh_user_id.clone())),
            Err(error) => Err(error.into()),
        }
    }

    pub fn attach_question_set(
        &self,
        job_id: &JobId,
        actor: ActorRole,
        kind: QuestionSetKind,
        question_count: u32,
        expected_version: Option<u64>,
    ) -> Result<Job, HiringServiceError> {
        let job = self.job(job_id)?;
        ensure_version(&job.key(), expected_version, job.version)?;
        let next = self
            .engine
            .attach_question_set(&job, actor, kind, question_count, Utc::now())?;
        Ok(self.store.write_if_version(next.into(), job.version)?.into_job()?)
    }

    pub fn transition_job(
        &self,
        job_id: &JobId,
        request: &TransitionRequest,
    ) -> Result<TransitionReceipt<Job>, HiringServiceError> {
        let job = self.job(job_id)?;
        ensure_version(&job.key(), request.expected_version, job.version)?;

        let outcome = self.engine.apply_named(
            &job,
            request.actor,
            &request.transition,
            &request.payload,
            Utc::now(),
        )?;
        let TransitionOutcome {
            entity,
            applied,
            side_effects,
        } = outcome;

        let stored = self.store.write_if_version(entity.into(), job.version)?.into_job()?;
        let delivery = self.runner.run(&side_effects);
        Ok(TransitionReceipt {
            entity: stored,
            applied,
            side_effects,
            delivery,
        })
    }

    /// Hard delete, refused while non-withdrawn applications reference the job.
    pub fn delete_job(
        &self,
        job_id: &JobId,
        expected_version: Option<u64>,
    ) -> Result<(), HiringServiceError> {
        let job = self.job(job_id)?;
        ensure_version(&job.key(), expected_version, job.version)?;
        let applications = self.store.applications()?;
        self.engine.ensure_job_deletable(&job, &applications)?;
        self.store.delete_if_version(&job.key(), job.version)?;
        info!(job_id = %job.id, "job deleted");
        Ok(())
    }

    pub fn submit_application(
        &self,
        job_id: &JobId,
        candidate_id: CandidateId,
    ) -> Result<TransitionReceipt<Application>, HiringServiceError> {
        let job = self.job(job_id)?;
        let application_id = ApplicationId(self.store.allocate_id(EntityKind::Application)?);
        let application =
            self.engine
                .open_application(&job, application_id, candidate_id, Utc::now())?;
        let stored = self
            .store
            .write_if_version(application.into(), 0)?
            .into_application()?;

        let side_effects = vec![SideEffect::NotifyActor(ActorNotice {
            role: ActorRole::ProjectLeader,
            template: "application_received".to_string(),
            entity: stored.key(),
            details: stored.notice_details(),
        })];
        let delivery = self.runner.run(&side_effects);
        info!(application_id = %stored.id, job_id = %job.id, "application submitted");

        Ok(TransitionReceipt {
            entity: stored,
            applied: vec!["submit_application"],
            side_effects,
            delivery,
        })
    }

    pub fn transition_application(
        &self,
        application_id: &ApplicationId,
        request: &TransitionRequest,
    ) -> Result<TransitionReceipt<Application>, HiringServiceError> {
        let application = self.application(application_id)?;
        ensure_version(&application.key(), request.expected_version, application.version)?;

        if ApplicationTransition::parse(&request.transition)
            == Some(ApplicationTransition::ScheduleInterview)
        {
            return Err(WorkflowError::InvalidPayload {
                transition: request.transition.clone(),
                reason: PayloadProblem::SlotRequired,
            }
            .into());
        }

        let outcome = self.engine.apply_named(
            &application,
            request.actor,
            &request.transition,
            &request.payload,
            Utc::now(),
        )?;
        self.commit_application(&application, outcome)
    }

    /// Confirms, completes, or cancels the application's current interview.
    pub fn update_interview(
        &self,
        application_id: &ApplicationId,
        request: &TransitionRequest,
    ) -> Result<TransitionReceipt<Application>, HiringServiceError> {
        let application = self.application(application_id)?;
        ensure_version(&application.key(), request.expected_version, application.version)?;
        let at = Utc::now();

        let transition = InterviewTransition::parse(&request.transition).ok_or_else(|| {
            WorkflowError::InvalidTransition {
                kind: EntityKind::Interview,
                from: application
                    .scheduled_interview
                    .as_ref()
                    .map(|interview| interview.status.name())
                    .unwrap_or("none")
                    .to_string(),
                transition: request.transition.clone(),
            }
        })?;

        let outcome = match transition {
            InterviewTransition::Confirm => {
                let interview = application.scheduled_interview.as_ref().ok_or_else(|| {
                    WorkflowError::invalid_payload(
                        transition.name(),
                        PayloadProblem::NoPendingInterview,
                    )
                })?;
                let confirmed =
                    self.engine
                        .apply(interview, request.actor, transition, &request.payload, at)?;
                let mut next = application.clone();
                next.scheduled_interview = Some(confirmed.entity);
                next.last_updated_at = at;
                TransitionOutcome {
                    entity: next,
                    applied: confirmed.applied,
                    side_effects: confirmed.side_effects,
                }
            }
            InterviewTransition::Complete => self.engine.apply(
                &application,
                request.actor,
                ApplicationTransition::CompleteInterview,
                &request.payload,
                at,
            )?,
            InterviewTransition::Cancel => self.engine.apply(
                &application,
                request.actor,
                ApplicationTransition::CancelInterview,
                &request.payload,
                at,
            )?,
            InterviewTransition::Reschedule => {
                return Err(WorkflowError::invalid_payload(
                    transition.name(),
                    PayloadProblem::SlotRequired,
                )
                .into());
            }
        };

        self.commit_application(&application, outcome)
    }

    pub fn append_note(
        &self,
        application_id: &ApplicationId,
        author: UserId,
        body: &str,
    ) -> Result<Application, HiringServiceError> {
        let application = self.application(application_id)?;
        let next = self
            .engine
            .append_note(&application, author, body, Utc::now())?;
        Ok(self
            .store
            .write_if_version(next.into(), application.version)?
            .into_application()?)
    }

    /// Unchanged tag sets are returned as-is without a write.
    pub fn update_tags(
        &self,
        application_id: &ApplicationId,
        update: &TagUpdate,
        expected_version: Option<u64>,
    ) -> Result<Application, HiringServiceError> {
        let application = self.application(application_id)?;
        ensure_version(&application.key(), expected_version, application.version)?;
        let next = self.engine.update_tags(&application, update, Utc::now())?;
        if next.tags() == application.tags() {
            return Ok(application);
        }
        Ok(self
            .store
            .write_if_version(next.into(), application.version)?
            .into_application()?)
    }

    /// Books an interview and commits the application with the HR calendar as one batch.
    ///
    /// A lost race re-reads both and re-runs the conflict check, so the second writer
    /// for a slot sees `SlotConflict` rather than double-booking.
    pub fn schedule_interview(
        &self,
        actor: ActorRole,
        request: &ScheduleRequest,
        today: NaiveDate,
    ) -> Result<ScheduleReceipt, HiringServiceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let application = self.application(&request.application_id)?;
            let calendar = self.calendar(&request.rh_user_id)?;

            let context = CandidateContext {
                application: &application,
                actor,
                today,
                at: Utc::now(),
            };
            let outcome = self
                .scheduler
                .schedule(context, request, &calendar.interviews)?;

            let mut writes = Vec::with_capacity(3);
            let mut booked = calendar.clone();
            booked.upsert(outcome.interview.clone());
            if let Some(replaced) = &outcome.replaced {
                if replaced.rh_user_id == booked.rh_user_id {
                    booked.upsert(replaced.clone());
                } else {
                    let mut previous = self.calendar(&replaced.rh_user_id)?;
                    let version = previous.version;
                    previous.upsert(replaced.clone());
                    writes.push((Entity::from(previous), version));
                }
            }
            writes.push((Entity::from(outcome.application.clone()), application.version));
            writes.push((Entity::from(booked), calendar.version));

            match self.store.write_batch_if_versions(writes) {
                Ok(written) => {
                    let stored = stored_application(written)?;
                    let delivery = self.runner.run(&outcome.side_effects);
                    let stored = self.record_conversation(stored, &delivery);
                    return Ok(ScheduleReceipt {
                        application: stored,
                        interview: outcome.interview,
                        replaced: outcome.replaced,
                        side_effects: outcome.side_effects,
                        delivery,
                    });
                }
                Err(StoreError::VersionConflict { key, .. }) if attempt < self.schedule_attempts => {
                    warn!(
                        application_id = %request.application_id,
                        rh_user_id = %request.rh_user_id,
                        %key,
                        attempt,
                        "booking lost a concurrent write; re-checking slot"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    pub fn pipeline(
        &self,
        job_id: Option<&JobId>,
        trends: &StageTrends,
    ) -> Result<PipelineSummary, HiringServiceError> {
        let applications: Vec<Application> = self
            .store
            .applications()?
            .into_iter()
            .filter(|application| job_id.map_or(true, |id| &application.job_id == id))
            .collect();
        Ok(self.aggregator.summarize(&applications, trends, Utc::now()))
    }

    pub fn job_actions(
        &self,
        job_id: &JobId,
        role: ActorRole,
    ) -> Result<Vec<&'static str>, HiringServiceError> {
        let job = self.job(job_id)?;
        Ok(self
            .engine
            .available_transitions(&job, role)
            .into_iter()
            .map(|transition| transition.name())
            .collect())
    }

    pub fn application_actions(
        &self,
        application_id: &ApplicationId,
        role: ActorRole,
    ) -> Result<Vec<&'static str>, HiringServiceError> {
        let application = self.application(application_id)?;
        Ok(self
            .engine
            .available_transitions(&application, role)
            .into_iter()
            .map(|transition| transition.name())
            .collect())
    }

    /// Writes the application, and the HR calendar when its interview changed.
    fn commit_application(
        &self,
        before: &Application,
        outcome: TransitionOutcome<Application>,
    ) -> Result<TransitionReceipt<Application>, HiringServiceError> {
        let TransitionOutcome {
            entity,
            applied,
            side_effects,
        } = outcome;

        let mut writes = Vec::with_capacity(2);
        if let Some(interview) = entity
            .scheduled_interview
            .as_ref()
            .filter(|interview| before.scheduled_interview.as_ref() != Some(*interview))
        {
            let mut calendar = self.calendar(&interview.rh_user_id)?;
            let version = calendar.version;
            calendar.upsert(interview.clone());
            writes.push((Entity::from(calendar), version));
        }
        writes.push((Entity::from(entity), before.version));

        let stored = stored_application(self.store.write_batch_if_versions(writes)?)?;
        let delivery = self.runner.run(&side_effects);
        let stored = self.record_conversation(stored, &delivery);

        Ok(TransitionReceipt {
            entity: stored,
            applied,
            side_effects,
            delivery,
        })
    }

    /// Stores a newly returned conversation id; the thread itself already exists.
    fn record_conversation(&self, application: Application, delivery: &EffectReport) -> Application {
        let Some(conversation_id) = &delivery.conversation_id else {
            return application;
        };
        if application.conversation_id.as_ref() == Some(conversation_id) {
            return application;
        }

        let mut next = application.clone();
        next.conversation_id = Some(conversation_id.clone());
        let result = self
            .store
            .write_if_version(next.into(), application.version)
            .and_then(Entity::into_application);
        match result {
            Ok(stored) => {
                debug!(application_id = %stored.id, %conversation_id, "conversation linked");
                stored
            }
            Err(error) => {
                warn!(application_id = %application.id, %error, "failed to record conversation id");
                application
            }
        }
    }
}

fn ensure_version(key: &EntityKey, expected: Option<u64>, found: u64) -> Result<(), StoreError> {
    match expected {
        Some(expected) if expected != found => Err(StoreError::VersionConflict {
            key: key.clone(),
            expected,
            found,
        }),
        _ => Ok(()),
    }
}

fn stored_application(written: Vec<Entity>) -> Result<Application, StoreError> {
    written
        .into_iter()
        .find_map(|entity| match entity {
            Entity::Application(application) => Some(application),
            _ => None,
        })
        .ok_or_else(|| StoreError::Unavailable("batch write returned no application".to_string()))
}

/// Error raised by the hiring workflow service.
#[derive(Debug, thiserror::Error)]
pub enum HiringServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HiringServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Workflow(error) => error.code(),
            Self::Scheduling(error) => error.code(),
            Self::Store(StoreError::VersionConflict { .. }) => "version_conflict",
            Self::Store(StoreError::NotFound(_)) => "not_found",
            Self::Store(StoreError::WrongKind { .. }) => "unknown_state",
            Self::Store(StoreError::Unavailable(_)) => "store_unavailable",
        }
    }
}
