use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::collaborators::{ConversationService, EntityStore, NotificationSender, StoreError};
use super::domain::{
    ActorRole, ApplicationId, CandidateId, JobId, NewJob, QuestionSetKind, TagUpdate, UserId,
};
use super::engine::WorkflowError;
use super::pipeline::StageTrends;
use super::scheduler::{ScheduleRequest, SchedulingError};
use super::service::{HiringServiceError, HiringWorkflowService, TransitionRequest};

type SharedService<S, N, C> = Arc<HiringWorkflowService<S, N, C>>;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateJobBody {
    pub(crate) actor: ActorRole,
    pub(crate) created_by: UserId,
    pub(crate) job: NewJob,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionSetBody {
    pub(crate) actor: ActorRole,
    pub(crate) kind: QuestionSetKind,
    pub(crate) question_count: u32,
    #[serde(default)]
    pub(crate) expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitApplicationBody {
    pub(crate) candidate_id: CandidateId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NoteBody {
    pub(crate) author: UserId,
    pub(crate) body: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleBody {
    pub(crate) actor: ActorRole,
    #[serde(flatten)]
    pub(crate) request: ScheduleRequest,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PipelineBody {
    #[serde(default)]
    pub(crate) job_id: Option<JobId>,
    #[serde(default)]
    pub(crate) trends: StageTrends,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleQuery {
    pub(crate) role: ActorRole,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VersionQuery {
    #[serde(default)]
    pub(crate) expected_version: Option<u64>,
}

/// Router exposing the hiring workflow under `/api/v1`.
pub fn hiring_router<S, N, C>(service: SharedService<S, N, C>) -> Router
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    Router::new()
        .route("/api/v1/jobs", post(create_job_handler::<S, N, C>))
        .route(
            "/api/v1/jobs/:job_id",
            get(job_handler::<S, N, C>).delete(delete_job_handler::<S, N, C>),
        )
        .route(
            "/api/v1/jobs/:job_id/transitions",
            post(job_transition_handler::<S, N, C>),
        )
        .route(
            "/api/v1/jobs/:job_id/question-sets",
            post(question_set_handler::<S, N, C>),
        )
        .route(
            "/api/v1/jobs/:job_id/actions",
            get(job_actions_handler::<S, N, C>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications",
            post(submit_application_handler::<S, N, C>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<S, N, C>),
        )
        .route(
            "/api/v1/applications/:application_id/transitions",
            post(application_transition_handler::<S, N, C>),
        )
        .route(
            "/api/v1/applications/:application_id/notes",
            post(note_handler::<S, N, C>),
        )
        .route(
            "/api/v1/applications/:application_id/tags",
            post(tags_handler::<S, N, C>),
        )
        .route(
            "/api/v1/applications/:application_id/actions",
            get(application_actions_handler::<S, N, C>),
        )
        .route(
            "/api/v1/applications/:application_id/interview",
            post(interview_update_handler::<S, N, C>),
        )
        .route("/api/v1/interviews", post(schedule_handler::<S, N, C>))
        .route("/api/v1/pipeline", post(pipeline_handler::<S, N, C>))
        .with_state(service)
}

/// HTTP status for every service failure. Every body carries a stable `code`.
pub fn status_for(error: &HiringServiceError) -> StatusCode {
    match error {
        HiringServiceError::Workflow(error)
        | HiringServiceError::Scheduling(SchedulingError::Workflow(error)) => {
            workflow_status(error)
        }
        HiringServiceError::Scheduling(SchedulingError::InvalidSlot(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        HiringServiceError::Scheduling(
            SchedulingError::SlotConflict { .. } | SchedulingError::ApplicationAlreadyScheduled { .. },
        ) => StatusCode::CONFLICT,
        HiringServiceError::Store(StoreError::VersionConflict { .. }) => StatusCode::CONFLICT,
        HiringServiceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        HiringServiceError::Store(StoreError::WrongKind { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        HiringServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn workflow_status(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::JobNotAccepting { .. }
        | WorkflowError::JobHasApplications { .. } => StatusCode::CONFLICT,
        WorkflowError::Forbidden { .. } => StatusCode::FORBIDDEN,
        WorkflowError::InvalidPayload { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::UnknownState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: HiringServiceError) -> Response {
    let status = status_for(&error);
    let payload = json!({
        "error": error.to_string(),
        "code": error.code(),
    });
    (status, axum::Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, HiringServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_job_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    axum::Json(body): axum::Json<CreateJobBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::CREATED,
        service.create_job(body.actor, body.created_by, body.job),
    )
}

pub(crate) async fn job_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(StatusCode::OK, service.job(&JobId(job_id)))
}

pub(crate) async fn delete_job_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(job_id): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    match service.delete_job(&JobId(job_id), query.expected_version) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn job_transition_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(job_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::OK,
        service.transition_job(&JobId(job_id), &request),
    )
}

pub(crate) async fn question_set_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(job_id): Path<String>,
    axum::Json(body): axum::Json<QuestionSetBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::OK,
        service.attach_question_set(
            &JobId(job_id),
            body.actor,
            body.kind,
            body.question_count,
            body.expected_version,
        ),
    )
}

pub(crate) async fn job_actions_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(job_id): Path<String>,
    Query(query): Query<RoleQuery>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    let result = service
        .job_actions(&JobId(job_id), query.role)
        .map(|actions| json!({ "role": query.role, "actions": actions }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn submit_application_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(job_id): Path<String>,
    axum::Json(body): axum::Json<SubmitApplicationBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::CREATED,
        service.submit_application(&JobId(job_id), body.candidate_id),
    )
}

pub(crate) async fn application_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::OK,
        service.application(&ApplicationId(application_id)),
    )
}

pub(crate) async fn application_transition_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::OK,
        service.transition_application(&ApplicationId(application_id), &request),
    )
}

pub(crate) async fn note_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<NoteBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::CREATED,
        service.append_note(&ApplicationId(application_id), body.author, &body.body),
    )
}

pub(crate) async fn tags_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(application_id): Path<String>,
    Query(query): Query<VersionQuery>,
    axum::Json(update): axum::Json<TagUpdate>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::OK,
        service.update_tags(&ApplicationId(application_id), &update, query.expected_version),
    )
}

pub(crate) async fn application_actions_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(application_id): Path<String>,
    Query(query): Query<RoleQuery>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    let result = service
        .application_actions(&ApplicationId(application_id), query.role)
        .map(|actions| json!({ "role": query.role, "actions": actions }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn interview_update_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::OK,
        service.update_interview(&ApplicationId(application_id), &request),
    )
}

pub(crate) async fn schedule_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    axum::Json(body): axum::Json<ScheduleBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    let today = Utc::now().date_naive();
    respond(
        StatusCode::CREATED,
        service.schedule_interview(body.actor, &body.request, today),
    )
}

pub(crate) async fn pipeline_handler<S, N, C>(
    State(service): State<SharedService<S, N, C>>,
    axum::Json(body): axum::Json<PipelineBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    respond(
        StatusCode::OK,
        service.pipeline(body.job_id.as_ref(), &body.trends),
    )
}
