use std::sync::Arc;

use super::common::{
    at, booked_interview, build_service, new_job, publish_job, reviewed, schedule_request, today,
    FailingNotifier, MemoryConversations, MemoryStore, RacingStore, RecordingNotifier,
    TestService, UnavailableStore, PROJECT_LEADER, RH_USER,
};
use crate::config::WorkflowConfig;
use crate::workflows::hiring::router::status_for;
use crate::workflows::hiring::{
    ActorRole, Application, ApplicationStatus, CandidateId, ConversationId, EntityStore,
    HiringServiceError, HiringWorkflowService, InterviewStatus, Job, JobId, JobStatus, PayloadProblem, ScheduleReceipt,
    ScheduleRequest, SchedulingError, StageTrends, StoreError, TagUpdate, TransitionRequest,
    UserId, WorkflowError,
};

fn book(service: &TestService, application: &Application, time: &str) -> Result<ScheduleReceipt, HiringServiceError> {
    service.schedule_interview(
        ActorRole::Hr,
        &schedule_request(&application.id, "2024-06-20", time, 60),
        today(),
    )
}

#[test]
fn every_write_bumps_the_version_and_stale_writes_fail() {
    let (service, _, notifier, _) = build_service();
    let job = service
        .create_job(ActorRole::ProjectLeader, UserId::from(PROJECT_LEADER), new_job())
        .expect("drafted");
    assert_eq!(job.version, 1);
    assert_eq!(job.status, JobStatus::Draft);

    let receipt = service
        .transition_job(
            &job.id,
            &TransitionRequest::new(ActorRole::ProjectLeader, "submit_to_hr").expecting_version(1),
        )
        .expect("fresh version");
    assert_eq!(receipt.entity.version, 2);
    assert_eq!(notifier.templates(), vec!["job_pending_hr"]);

    let error = service
        .transition_job(
            &job.id,
            &TransitionRequest::new(ActorRole::Hr, "complete_hr").expecting_version(1),
        )
        .expect_err("stale version");
    assert_eq!(error.code(), "version_conflict");
    assert_eq!(status_for(&error), axum::http::StatusCode::CONFLICT);
    assert_eq!(service.job(&job.id).expect("stored").status, JobStatus::PendingHr);
}

#[test]
fn new_jobs_never_reuse_ids_already_in_the_store() {
    let (_, store, _, _) = build_service();
    for seeded in ["job-0001", "job-0002", "job-0003"] {
        let job = Job::draft(JobId::from(seeded), new_job(), UserId::from(PROJECT_LEADER), at(1, 9));
        store.write_if_version(job.into(), 0).expect("seeded");
    }

    // A service started over a store that already holds jobs.
    let restarted = HiringWorkflowService::new(
        store.clone(),
        Arc::new(RecordingNotifier::default()),
        Arc::new(MemoryConversations::default()),
        &WorkflowConfig::default(),
    );
    let job = restarted
        .create_job(ActorRole::ProjectLeader, UserId::from(PROJECT_LEADER), new_job())
        .expect("fresh id");
    assert_eq!(job.id, JobId::from("job-0004"));
    assert_eq!(job.version, 1);

    let job = publish_job(&restarted);
    let first = restarted
        .submit_application(&job.id, CandidateId::from("cand-1"))
        .expect("submitted");
    let second = restarted
        .submit_application(&job.id, CandidateId::from("cand-2"))
        .expect("submitted");
    assert_ne!(first.entity.id, second.entity.id);
    assert_eq!(
        restarted.job(&JobId::from("job-0001")).expect("seed untouched").version,
        1
    );
}

#[test]
fn only_project_leaders_draft_jobs() {
    let (service, _, _, _) = build_service();
    let error = service
        .create_job(ActorRole::Hr, UserId::from(RH_USER), new_job())
        .expect_err("hr cannot draft");
    assert!(matches!(
        error,
        HiringServiceError::Workflow(WorkflowError::Forbidden { .. })
    ));
}

#[test]
fn approval_publishes_and_opens_the_job_to_candidates() {
    let (service, _, notifier, _) = build_service();
    let job = publish_job(&service);
    assert_eq!(job.status, JobStatus::Published);
    assert!(notifier.templates().contains(&"job_approved".to_string()));

    notifier.clear();
    let receipt = service
        .submit_application(&job.id, CandidateId::from("cand-1"))
        .expect("accepting");
    assert_eq!(receipt.entity.status, ApplicationStatus::Submitted);
    assert_eq!(receipt.entity.job_title, "Backend Engineer");
    assert_eq!(receipt.applied, vec!["submit_application"]);
    assert_eq!(receipt.delivery.delivered, 1);
    assert_eq!(notifier.templates(), vec!["application_received"]);
}

#[test]
fn unpublished_jobs_refuse_applications() {
    let (service, _, _, _) = build_service();
    let job = service
        .create_job(ActorRole::ProjectLeader, UserId::from(PROJECT_LEADER), new_job())
        .expect("drafted");
    let error = service
        .submit_application(&job.id, CandidateId::from("cand-1"))
        .expect_err("draft");
    assert_eq!(error.code(), "job_not_accepting");
    assert!(service.pipeline(None, &StageTrends::new()).expect("pipeline").stages[0].count == 0);
}

#[test]
fn booking_links_a_single_conversation_and_updates_the_calendar() {
    let (service, store, notifier, conversations) = build_service();
    let job = publish_job(&service);
    let application = reviewed(&service, &job, "cand-1");
    notifier.clear();

    let receipt = book(&service, &application, "14:00").expect("free slot");
    assert_eq!(receipt.application.status, ApplicationStatus::InterviewScheduled);
    assert_eq!(receipt.application.conversation_id, Some(ConversationId::from("conv-001")));
    assert!(receipt.delivery.is_clean());
    assert_eq!(notifier.templates(), vec!["interview_scheduled"]);

    let stored = service.application(&application.id).expect("stored");
    assert_eq!(stored.conversation_id, Some(ConversationId::from("conv-001")));
    assert_eq!(stored.version, receipt.application.version);

    let calendar = store.calendar(RH_USER).expect("calendar written");
    assert_eq!(calendar.interviews.len(), 1);
    assert_eq!(calendar.version, 1);

    let moved = service
        .schedule_interview(
            ActorRole::Hr,
            &ScheduleRequest {
                replace_existing: true,
                ..schedule_request(&application.id, "2024-06-21", "10:00", 30)
            },
            today(),
        )
        .expect("reschedule");
    assert_eq!(moved.application.conversation_id, Some(ConversationId::from("conv-001")));
    assert_eq!(conversations.calls(), 2);
    assert_eq!(conversations.threads(), 1);

    let calendar = service.calendar(&UserId::from(RH_USER)).expect("calendar");
    let statuses: Vec<InterviewStatus> = calendar
        .interviews
        .iter()
        .map(|interview| interview.status)
        .collect();
    assert_eq!(
        statuses,
        vec![InterviewStatus::Rescheduled, InterviewStatus::Scheduled]
    );
}

#[test]
fn second_candidate_cannot_take_an_overlapping_slot() {
    let (service, _, _, _) = build_service();
    let job = publish_job(&service);
    let first = reviewed(&service, &job, "cand-1");
    let second = reviewed(&service, &job, "cand-2");

    let booked = book(&service, &first, "14:00").expect("first");
    let error = book(&service, &second, "14:30").expect_err("overlap");
    match &error {
        HiringServiceError::Scheduling(SchedulingError::SlotConflict { conflicting, .. }) => {
            assert_eq!(conflicting, &booked.interview.id);
        }
        other => panic!("expected slot conflict, got {other:?}"),
    }
    assert_eq!(status_for(&error), axum::http::StatusCode::CONFLICT);
    assert_eq!(
        service.application(&second.id).expect("stored").status,
        ApplicationStatus::UnderReview
    );

    book(&service, &second, "15:00").expect("back to back");
}

#[test]
fn losing_a_concurrent_booking_surfaces_as_a_slot_conflict() {
    let (seed, store, _, _) = build_service();
    let job = publish_job(&seed);
    let application = reviewed(&seed, &job, "cand-1");

    let interloper = booked_interview("app-rival-int-1", RH_USER, (14, 0), 60);
    let racing = RacingStore::new(store.as_ref().clone(), interloper.clone());
    let service = HiringWorkflowService::new(
        Arc::new(racing),
        Arc::new(RecordingNotifier::default()),
        Arc::new(MemoryConversations::default()),
        &WorkflowConfig::default(),
    );

    let error = service
        .schedule_interview(
            ActorRole::Hr,
            &schedule_request(&application.id, "2024-06-20", "14:30", 30),
            today(),
        )
        .expect_err("rival booked first");
    assert_eq!(
        error.to_string(),
        SchedulingError::SlotConflict {
            conflicting: interloper.id,
            rh_user_id: UserId::from(RH_USER),
        }
        .to_string()
    );
    assert_eq!(
        service.application(&application.id).expect("stored").status,
        ApplicationStatus::UnderReview
    );
}

#[test]
fn a_lost_race_for_a_different_slot_is_retried() {
    let (seed, store, _, _) = build_service();
    let job = publish_job(&seed);
    let application = reviewed(&seed, &job, "cand-1");

    let racing = RacingStore::new(
        store.as_ref().clone(),
        booked_interview("app-rival-int-1", RH_USER, (9, 0), 60),
    );
    let service = HiringWorkflowService::new(
        Arc::new(racing),
        Arc::new(RecordingNotifier::default()),
        Arc::new(MemoryConversations::default()),
        &WorkflowConfig::default(),
    );

    let receipt = service
        .schedule_interview(
            ActorRole::Hr,
            &schedule_request(&application.id, "2024-06-20", "14:00", 60),
            today(),
        )
        .expect("retry succeeds");
    assert_eq!(receipt.interview.id.as_str(), format!("{}-int-1", application.id));

    let calendar = store.calendar(RH_USER).expect("calendar");
    assert_eq!(calendar.interviews.len(), 2);
    assert_eq!(calendar.version, 2);
}

#[test]
fn retries_are_bounded_by_configuration() {
    let (seed, store, _, _) = build_service();
    let job = publish_job(&seed);
    let application = reviewed(&seed, &job, "cand-1");

    let racing = RacingStore::new(
        store.as_ref().clone(),
        booked_interview("app-rival-int-1", RH_USER, (9, 0), 60),
    );
    let config = WorkflowConfig {
        schedule_attempts: 1,
        ..WorkflowConfig::default()
    };
    let service = HiringWorkflowService::new(
        Arc::new(racing),
        Arc::new(RecordingNotifier::default()),
        Arc::new(MemoryConversations::default()),
        &config,
    );

    let error = service
        .schedule_interview(
            ActorRole::Hr,
            &schedule_request(&application.id, "2024-06-20", "14:00", 60),
            today(),
        )
        .expect_err("single attempt");
    assert!(matches!(
        error,
        HiringServiceError::Store(StoreError::VersionConflict { .. })
    ));
}

#[test]
fn withdrawal_frees_the_interview_slot() {
    let (service, store, notifier, _) = build_service();
    let job = publish_job(&service);
    let first = reviewed(&service, &job, "cand-1");
    let second = reviewed(&service, &job, "cand-2");
    book(&service, &first, "14:00").expect("first");
    notifier.clear();

    let receipt = service
        .transition_application(&first.id, &TransitionRequest::new(ActorRole::Candidate, "withdraw"))
        .expect("candidate withdraws");
    assert_eq!(receipt.entity.status, ApplicationStatus::Withdrawn);
    assert_eq!(
        notifier.templates(),
        vec!["application_withdrawn", "interview_released"]
    );

    let calendar = store.calendar(RH_USER).expect("calendar");
    assert_eq!(calendar.interviews[0].status, InterviewStatus::Cancelled);

    book(&service, &second, "14:00").expect("slot released");
}

#[test]
fn interview_updates_flow_through_the_application() {
    let (service, store, notifier, _) = build_service();
    let job = publish_job(&service);
    let application = reviewed(&service, &job, "cand-1");
    book(&service, &application, "14:00").expect("booked");
    notifier.clear();

    let confirmed = service
        .update_interview(&application.id, &TransitionRequest::new(ActorRole::Candidate, "confirm"))
        .expect("candidate confirms");
    assert_eq!(confirmed.entity.status, ApplicationStatus::InterviewScheduled);
    assert_eq!(
        confirmed.entity.scheduled_interview.as_ref().map(|interview| interview.status),
        Some(InterviewStatus::Confirmed)
    );
    assert_eq!(notifier.templates(), vec!["interview_confirmed"]);
    assert_eq!(
        store.calendar(RH_USER).expect("calendar").interviews[0].status,
        InterviewStatus::Confirmed
    );

    let error = service
        .update_interview(&application.id, &TransitionRequest::new(ActorRole::Hr, "reschedule"))
        .expect_err("reschedules need a slot");
    assert!(matches!(
        error,
        HiringServiceError::Workflow(WorkflowError::InvalidPayload {
            reason: PayloadProblem::SlotRequired,
            ..
        })
    ));

    let completed = service
        .update_interview(&application.id, &TransitionRequest::new(ActorRole::Hr, "complete"))
        .expect("hr completes");
    assert_eq!(completed.entity.status, ApplicationStatus::FinalReview);
    assert_eq!(
        store.calendar(RH_USER).expect("calendar").interviews[0].status,
        InterviewStatus::Completed
    );
}

#[test]
fn interviews_are_never_booked_through_a_bare_transition() {
    let (service, _, _, _) = build_service();
    let job = publish_job(&service);
    let application = reviewed(&service, &job, "cand-1");

    let error = service
        .transition_application(
            &application.id,
            &TransitionRequest::new(ActorRole::Hr, "schedule_interview"),
        )
        .expect_err("slot required");
    assert_eq!(error.code(), "invalid_payload");
    assert_eq!(
        status_for(&error),
        axum::http::StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[test]
fn jobs_are_deleted_only_once_applications_are_withdrawn() {
    let (service, _, _, _) = build_service();
    let job = publish_job(&service);
    let application = service
        .submit_application(&job.id, CandidateId::from("cand-1"))
        .expect("applied")
        .entity;

    let error = service.delete_job(&job.id, None).expect_err("active application");
    assert_eq!(error.code(), "job_has_applications");

    service
        .transition_application(&application.id, &TransitionRequest::new(ActorRole::Candidate, "withdraw"))
        .expect("withdrawn");
    service.delete_job(&job.id, Some(job.version)).expect("deletable");

    let error = service.job(&job.id).expect_err("gone");
    assert_eq!(error.code(), "not_found");
}

#[test]
fn notification_failures_do_not_undo_the_transition() {
    let store = Arc::new(MemoryStore::default());
    let service = HiringWorkflowService::new(
        store.clone(),
        Arc::new(FailingNotifier),
        Arc::new(MemoryConversations::default()),
        &WorkflowConfig::default(),
    );
    let job = service
        .create_job(ActorRole::ProjectLeader, UserId::from(PROJECT_LEADER), new_job())
        .expect("drafted");

    let receipt = service
        .transition_job(&job.id, &TransitionRequest::new(ActorRole::ProjectLeader, "submit_to_hr"))
        .expect("transition committed");
    assert!(!receipt.delivery.is_clean());
    assert_eq!(receipt.delivery.failures.len(), 1);
    assert_eq!(receipt.delivery.delivered, 0);
    assert_eq!(service.job(&job.id).expect("stored").status, JobStatus::PendingHr);
}

#[test]
fn store_outages_are_reported_as_unavailable() {
    let service = HiringWorkflowService::new(
        Arc::new(UnavailableStore),
        Arc::new(RecordingNotifier::default()),
        Arc::new(MemoryConversations::default()),
        &WorkflowConfig::default(),
    );
    let error = service.job(&JobId::from("job-1")).expect_err("offline");
    assert_eq!(error.code(), "store_unavailable");
    assert_eq!(
        status_for(&error),
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    );
}

#[test]
fn pipeline_can_be_scoped_to_one_job() {
    let (service, _, _, _) = build_service();
    let backend = publish_job(&service);
    let other = publish_job(&service);
    reviewed(&service, &backend, "cand-1");
    service
        .submit_application(&backend.id, CandidateId::from("cand-2"))
        .expect("applied");
    service
        .submit_application(&other.id, CandidateId::from("cand-3"))
        .expect("applied");

    let all = service.pipeline(None, &StageTrends::new()).expect("pipeline");
    assert_eq!(all.total_applications, 3);

    let scoped = service
        .pipeline(Some(&backend.id), &StageTrends::new())
        .expect("pipeline");
    assert_eq!(scoped.total_applications, 2);
    assert_eq!(scoped.stages[3].count, 1);
    assert_eq!(scoped.mean_overall_score, Some(76.0));
}

#[test]
fn actions_and_notes_reflect_stored_state() {
    let (service, _, _, _) = build_service();
    let job = publish_job(&service);
    assert_eq!(
        service.job_actions(&job.id, ActorRole::ProjectLeader).expect("actions"),
        vec!["pause", "close"]
    );
    assert!(service.job_actions(&job.id, ActorRole::Candidate).expect("actions").is_empty());

    let application = reviewed(&service, &job, "cand-1");
    assert_eq!(
        service
            .application_actions(&application.id, ActorRole::Hr)
            .expect("actions"),
        vec!["schedule_interview"]
    );

    let noted = service
        .append_note(&application.id, UserId::from(RH_USER), "prefers mornings")
        .expect("note stored");
    assert_eq!(noted.version, application.version + 1);
    assert_eq!(noted.notes().len(), 1);
}

#[test]
fn tag_updates_are_versioned_and_unchanged_sets_skip_the_write() {
    let (service, _, _, _) = build_service();
    let job = publish_job(&service);
    let application = reviewed(&service, &job, "cand-1");
    let update = TagUpdate {
        add: vec!["Referral".to_string()],
        remove: Vec::new(),
    };

    let tagged = service
        .update_tags(&application.id, &update, Some(application.version))
        .expect("tagged");
    assert_eq!(tagged.tags(), ["referral"]);
    assert_eq!(tagged.version, application.version + 1);

    let again = service
        .update_tags(&application.id, &update, None)
        .expect("already tagged");
    assert_eq!(again.version, tagged.version);

    let error = service
        .update_tags(&application.id, &update, Some(application.version))
        .expect_err("stale version");
    assert_eq!(error.code(), "version_conflict");
    assert_eq!(
        service.application(&application.id).expect("stored").tags(),
        ["referral"]
    );
}
