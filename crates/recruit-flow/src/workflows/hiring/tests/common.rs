use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::hiring::{
    ActorRole, Application, ApplicationId, AssessmentResult, CandidateId, ConversationError,
    ConversationId, ConversationService, DeliveryError, EmploymentType, Entity, EntityKey,
    EntityKind, EntityStore, HiringWorkflowService, Interview, InterviewCalendar, InterviewId,
    InterviewStatus, InterviewType, Job, JobId, NewJob, Notification, NotificationSender,
    Priority, QuestionSetKind, ScheduleRequest, StoreError, TransitionPayload, TransitionRequest,
    UserId, WorkflowEngine, WorkflowEntity,
};

pub(super) const PROJECT_LEADER: &str = "pl-amira";
pub(super) const RH_USER: &str = "rh-jonas";

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

pub(super) fn new_job() -> NewJob {
    NewJob {
        title: "Backend Engineer".to_string(),
        department: "Platform".to_string(),
        location: "Lyon".to_string(),
        employment_type: EmploymentType::FullTime,
        salary_range: None,
        priority: Priority::High,
        urgent: false,
    }
}

pub(super) fn draft_job() -> Job {
    Job::draft(
        JobId::from("job-1"),
        new_job(),
        UserId::from(PROJECT_LEADER),
        at(1, 9),
    )
}

pub(super) fn assessment(score: u32, max_score: u32) -> TransitionPayload {
    TransitionPayload::assessment(AssessmentResult {
        score,
        max_score,
        passed: score * 2 >= max_score,
    })
}

/// Applies a transition that the fixture expects to succeed.
pub(super) fn step<E: WorkflowEntity>(
    engine: &WorkflowEngine,
    entity: &E,
    actor: ActorRole,
    transition: &str,
    payload: TransitionPayload,
    when: DateTime<Utc>,
) -> E {
    engine
        .apply_named(entity, actor, transition, &payload, when)
        .unwrap_or_else(|err| panic!("{transition} should succeed: {err}"))
        .entity
}

pub(super) fn published_job(engine: &WorkflowEngine) -> Job {
    let job = draft_job();
    let job = step(engine, &job, ActorRole::ProjectLeader, "submit_to_hr", TransitionPayload::empty(), at(1, 10));
    let job = step(engine, &job, ActorRole::Hr, "complete_hr", TransitionPayload::empty(), at(1, 11));
    let job = engine
        .attach_question_set(&job, ActorRole::ProjectLeader, QuestionSetKind::Technical, 5, at(1, 12))
        .expect("technical set attaches");
    let job = engine
        .attach_question_set(&job, ActorRole::Hr, QuestionSetKind::Hr, 3, at(1, 12))
        .expect("hr set attaches");
    let job = step(engine, &job, ActorRole::ProjectLeader, "submit_for_approval", TransitionPayload::empty(), at(1, 13));
    step(engine, &job, ActorRole::Ceo, "approve", TransitionPayload::empty(), at(1, 14))
}

pub(super) fn submitted_application(engine: &WorkflowEngine, id: &str) -> Application {
    let job = published_job(engine);
    engine
        .open_application(&job, ApplicationId::from(id), CandidateId::from(format!("cand-{id}").as_str()), at(2, 9))
        .expect("published job accepts applications")
}

/// Application walked through both assessments into `under_review`.
pub(super) fn reviewed_application(engine: &WorkflowEngine, id: &str) -> Application {
    let application = submitted_application(engine, id);
    let application = step(engine, &application, ActorRole::System, "start_technical_review", TransitionPayload::empty(), at(2, 10));
    let application = step(engine, &application, ActorRole::System, "record_technical_assessment", assessment(8, 10), at(3, 10));
    step(engine, &application, ActorRole::System, "record_hr_assessment", assessment(7, 10), at(4, 10))
}

pub(super) fn schedule_request(
    application_id: &ApplicationId,
    date: &str,
    time: &str,
    duration_minutes: u32,
) -> ScheduleRequest {
    ScheduleRequest {
        application_id: application_id.clone(),
        rh_user_id: UserId::from(RH_USER),
        scheduled_date: date.to_string(),
        scheduled_time: time.to_string(),
        duration_minutes,
        kind: InterviewType::Video,
        location: None,
        notes: None,
        replace_existing: false,
    }
}

pub(super) fn booked_interview(id: &str, rh_user: &str, start: (u32, u32), duration_minutes: u32) -> Interview {
    Interview {
        id: InterviewId::from(id),
        application_id: ApplicationId::from("app-other"),
        candidate_id: CandidateId::from("cand-other"),
        job_title: "Data Analyst".to_string(),
        rh_user_id: UserId::from(rh_user),
        scheduled_date: NaiveDate::from_ymd_opt(2024, 6, 20).expect("valid date"),
        scheduled_time: NaiveTime::from_hms_opt(start.0, start.1, 0).expect("valid time"),
        duration_minutes,
        kind: InterviewType::Phone,
        location: None,
        status: InterviewStatus::Scheduled,
        notes: None,
        replaces: None,
        created_at: at(1, 9),
        updated_at: at(1, 9),
        history: Vec::new(),
    }
}

pub(super) fn publish_job<S, N, C>(service: &HiringWorkflowService<S, N, C>) -> Job
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    let job = service
        .create_job(ActorRole::ProjectLeader, UserId::from(PROJECT_LEADER), new_job())
        .expect("project leader drafts");
    for (actor, transition) in [
        (ActorRole::ProjectLeader, "submit_to_hr"),
        (ActorRole::Hr, "complete_hr"),
    ] {
        service
            .transition_job(&job.id, &TransitionRequest::new(actor, transition))
            .expect("preparation step");
    }
    service
        .attach_question_set(&job.id, ActorRole::ProjectLeader, QuestionSetKind::Technical, 5, None)
        .expect("technical set");
    service
        .attach_question_set(&job.id, ActorRole::Hr, QuestionSetKind::Hr, 3, None)
        .expect("hr set");
    for (actor, transition) in [
        (ActorRole::ProjectLeader, "submit_for_approval"),
        (ActorRole::Ceo, "approve"),
    ] {
        service
            .transition_job(&job.id, &TransitionRequest::new(actor, transition))
            .expect("approval step");
    }
    service.job(&job.id).expect("job stored")
}

pub(super) fn reviewed<S, N, C>(service: &HiringWorkflowService<S, N, C>, job: &Job, candidate: &str) -> Application
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    let application = service
        .submit_application(&job.id, CandidateId::from(candidate))
        .expect("published job accepts applications")
        .entity;
    let steps = [
        ("start_technical_review", TransitionPayload::empty()),
        ("record_technical_assessment", assessment(8, 10)),
        ("record_hr_assessment", assessment(7, 10)),
    ];
    for (transition, payload) in steps {
        service
            .transition_application(
                &application.id,
                &TransitionRequest::new(ActorRole::System, transition).with_payload(payload),
            )
            .expect("scoring step");
    }
    service.application(&application.id).expect("application stored")
}

pub(super) type TestService = HiringWorkflowService<MemoryStore, RecordingNotifier, MemoryConversations>;

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryStore>,
    Arc<RecordingNotifier>,
    Arc<MemoryConversations>,
) {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let conversations = Arc::new(MemoryConversations::default());
    let service = HiringWorkflowService::new(
        store.clone(),
        notifier.clone(),
        conversations.clone(),
        &WorkflowConfig::default(),
    );
    (service, store, notifier, conversations)
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    entities: Arc<Mutex<HashMap<EntityKey, Entity>>>,
    sequences: Arc<Mutex<HashMap<EntityKind, u64>>>,
}

impl MemoryStore {
    fn check(
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

    pub(super) fn calendar(&self, rh_user: &str) -> Option<InterviewCalendar> {
        let guard = self.entities.lock().expect("store mutex poisoned");
        guard
            .get(&EntityKey::new(EntityKind::Calendar, rh_user))
            .cloned()
            .and_then(|entity| entity.into_calendar().ok())
    }
}

impl EntityStore for MemoryStore {
    fn read(&self, key: &EntityKey) -> Result<Entity, StoreError> {
        let guard = self.entities.lock().expect("store mutex poisoned");
        guard
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn write_if_version(&self, mut entity: Entity, expected_version: u64) -> Result<Entity, StoreError> {
        let mut guard = self.entities.lock().expect("store mutex poisoned");
        let key = entity.key();
        Self::check(&guard, &key, expected_version)?;
        entity.set_version(expected_version + 1);
        guard.insert(key, entity.clone());
        Ok(entity)
    }

    fn write_batch_if_versions(
        &self,
        writes: Vec<(Entity, u64)>,
    ) -> Result<Vec<Entity>, StoreError> {
        let mut guard = self.entities.lock().expect("store mutex poisoned");
        for (entity, expected) in &writes {
            Self::check(&guard, &entity.key(), *expected)?;
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
        let mut guard = self.entities.lock().expect("store mutex poisoned");
        if !guard.contains_key(key) {
            return Err(StoreError::NotFound(key.clone()));
        }
        Self::check(&guard, key, expected_version)?;
        guard.remove(key);
        Ok(())
    }

    fn applications(&self) -> Result<Vec<Application>, StoreError> {
        let guard = self.entities.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter_map(|entity| match entity {
                Entity::Application(application) => Some(application.clone()),
                _ => None,
            })
            .collect())
    }

    fn allocate_id(&self, kind: EntityKind) -> Result<String, StoreError> {
        let guard = self.entities.lock().expect("store mutex poisoned");
        let mut sequences = self.sequences.lock().expect("sequence mutex poisoned");
        let last = sequences.entry(kind).or_insert(0);
        loop {
            *last += 1;
            let id = kind.sequenced_id(*last);
            if !guard.contains_key(&EntityKey::new(kind, id.as_str())) {
                return Ok(id);
            }
        }
    }
}

/// Store that lets a competing booking land between a reader's check and its write.
pub(super) struct RacingStore {
    pub(super) inner: MemoryStore,
    interloper: Mutex<Option<Interview>>,
}

impl RacingStore {
    pub(super) fn new(inner: MemoryStore, interloper: Interview) -> Self {
        Self {
            inner,
            interloper: Mutex::new(Some(interloper)),
        }
    }
}

impl EntityStore for RacingStore {
    fn read(&self, key: &EntityKey) -> Result<Entity, StoreError> {
        self.inner.read(key)
    }

    fn write_if_version(&self, entity: Entity, expected_version: u64) -> Result<Entity, StoreError> {
        self.inner.write_if_version(entity, expected_version)
    }

    fn write_batch_if_versions(
        &self,
        writes: Vec<(Entity, u64)>,
    ) -> Result<Vec<Entity>, StoreError> {
        let interloper = self.interloper.lock().expect("race mutex poisoned").take();
        if let Some(interview) = interloper {
            let key = EntityKey::new(EntityKind::Calendar, interview.rh_user_id.as_str());
            let mut calendar = match self.inner.read(&key) {
                Ok(entity) => entity.into_calendar()?,
                Err(_) => InterviewCalendar::empty(interview.rh_user_id.clone()),
            };
            let version = calendar.version;
            calendar.upsert(interview);
            self.inner.write_if_version(calendar.into(), version)?;
        }
        self.inner.write_batch_if_versions(writes)
    }

    fn delete_if_version(&self, key: &EntityKey, expected_version: u64) -> Result<(), StoreError> {
        self.inner.delete_if_version(key, expected_version)
    }

    fn applications(&self) -> Result<Vec<Application>, StoreError> {
        self.inner.applications()
    }

    fn allocate_id(&self, kind: EntityKind) -> Result<String, StoreError> {
        self.inner.allocate_id(kind)
    }
}

pub(super) struct UnavailableStore;

impl EntityStore for UnavailableStore {
    fn read(&self, _key: &EntityKey) -> Result<Entity, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn write_if_version(&self, _entity: Entity, _expected_version: u64) -> Result<Entity, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn write_batch_if_versions(
        &self,
        _writes: Vec<(Entity, u64)>,
    ) -> Result<Vec<Entity>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn delete_if_version(&self, _key: &EntityKey, _expected_version: u64) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn applications(&self) -> Result<Vec<Application>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn allocate_id(&self, _kind: EntityKind) -> Result<String, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub(super) fn templates(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .iter()
            .map(|notification| notification.template().to_string())
            .collect()
    }

    pub(super) fn clear(&self) {
        self.sent.lock().expect("notifier mutex poisoned").clear();
    }
}

impl NotificationSender for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification.clone());
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationSender for FailingNotifier {
    fn send(&self, _notification: &Notification) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport("smtp relay down".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryConversations {
    threads: Arc<Mutex<HashMap<ApplicationId, ConversationId>>>,
    calls: Arc<Mutex<usize>>,
}

impl MemoryConversations {
    pub(super) fn calls(&self) -> usize {
        *self.calls.lock().expect("conversation mutex poisoned")
    }

    pub(super) fn threads(&self) -> usize {
        self.threads.lock().expect("conversation mutex poisoned").len()
    }
}

impl ConversationService for MemoryConversations {
    fn create_or_reuse(
        &self,
        application_id: &ApplicationId,
        _candidate_id: &CandidateId,
        _staff_user_id: &UserId,
    ) -> Result<ConversationId, ConversationError> {
        *self.calls.lock().expect("conversation mutex poisoned") += 1;
        let mut threads = self.threads.lock().expect("conversation mutex poisoned");
        let next = threads.len() + 1;
        Ok(threads
            .entry(application_id.clone())
            .or_insert_with(|| ConversationId(format!("conv-{next:03}")))
            .clone())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
