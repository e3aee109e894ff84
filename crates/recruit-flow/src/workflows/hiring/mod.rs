//! Job approval, application review, and interview scheduling workflow.
//!
//! The status tables, engine, scheduler, and pipeline aggregator are pure: they take
//! entity snapshots and return new snapshots plus side-effect intents. The service
//! wraps them with versioned reads and writes through [`EntityStore`] and executes
//! intents through the [`EffectRunner`].

pub mod collaborators;
pub mod domain;
pub mod effects;
pub mod engine;
pub mod pipeline;
pub mod router;
pub mod scheduler;
pub mod scoring;
pub mod service;
pub mod status;

#[cfg(test)]
mod tests;

pub use collaborators::{
    ConversationError, ConversationService, DeliveryError, Entity, EntityStore,
    NotificationSender, StoreError,
};
pub use domain::{
    ActorRole, Application, ApplicationId, AssessmentRecord, AssessmentResult, CandidateId,
    ConversationId, Decision, EmploymentType, EntityKey, EntityKind, Interview,
    InterviewCalendar, InterviewId, InterviewType, Job, JobId, NewJob, Priority,
    QuestionSetKind, SalaryRange, StatusChange, TagUpdate, UserId,
};
pub use effects::{
    ActorNotice, CandidateNotice, ConversationRequest, EffectReport, EffectRunner, Notification,
    SideEffect,
};
pub use engine::{
    PayloadProblem, TransitionOutcome, TransitionPayload, WorkflowEngine, WorkflowEntity,
    WorkflowError,
};
pub use pipeline::{
    FunnelStage, PipelineAggregator, PipelineStage, PipelineSummary, StageTrend, StageTrends,
    BOTTLENECK_THRESHOLD_DAYS,
};
pub use router::hiring_router;
pub use scheduler::{
    CandidateContext, InterviewScheduler, ScheduleOutcome, ScheduleRequest, SchedulingError,
    SlotViolation, ALLOWED_DURATIONS,
};
pub use scoring::{ScoreWeights, Scorecard};
pub use service::{
    HiringServiceError, HiringWorkflowService, ScheduleReceipt, TransitionReceipt,
    TransitionRequest,
};
pub use status::{
    ApplicationStatus, ApplicationTransition, InterviewStatus, InterviewTransition, JobStatus,
    JobTransition, WorkflowState, WorkflowTransition,
};
