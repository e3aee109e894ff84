use crate::infra::{InMemoryConversations, InMemoryEntityStore, LoggingNotifier};
use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use recruit_flow::config::WorkflowConfig;
use recruit_flow::error::AppError;
use recruit_flow::workflows::hiring::{
    ActorRole, Application, AssessmentResult, CandidateId, EmploymentType, FunnelStage,
    HiringServiceError, HiringWorkflowService, InterviewType, Job, NewJob, PipelineAggregator,
    PipelineSummary, Priority, QuestionSetKind, ScheduleRequest, SideEffect, StageTrend,
    StageTrends, TransitionPayload, TransitionRequest, UserId, BOTTLENECK_THRESHOLD_DAYS,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = HiringWorkflowService<InMemoryEntityStore, LoggingNotifier, InMemoryConversations>;

const PROJECT_LEADER: &str = "pl-demo";
const RH_USER: &str = "rh-demo";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Day the interviews are booked for (YYYY-MM-DD). Defaults to two weeks from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) interview_date: Option<NaiveDate>,
    /// Print the pipeline summary as JSON after the walkthrough.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct PipelineArgs {
    /// JSON file holding an array of application snapshots.
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Measure open stays up to this date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Stage whose throughput is falling; repeat for several stages.
    #[arg(long = "falling", value_parser = parse_stage)]
    pub(crate) falling: Vec<FunnelStage>,
    /// Average dwell in days above which a falling stage is a bottleneck.
    #[arg(long, default_value_t = BOTTLENECK_THRESHOLD_DAYS)]
    pub(crate) threshold_days: f64,
}

fn parse_stage(raw: &str) -> Result<FunnelStage, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unknown funnel stage '{raw}'"))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = Local::now().date_naive();
    let interview_date = args
        .interview_date
        .unwrap_or_else(|| today + Duration::days(14));

    let notifier = Arc::new(LoggingNotifier::default());
    let conversations = Arc::new(InMemoryConversations::default());
    let service = HiringWorkflowService::new(
        Arc::new(InMemoryEntityStore::default()),
        notifier.clone(),
        conversations.clone(),
        &WorkflowConfig::default(),
    );

    println!("== Recruitment workflow demo ==");
    let job = job_approval(&service)?;
    let (first, second) = interview_booking(&service, &job, interview_date, today)?;
    terminal_immutability(&service, &first, &second)?;

    let summary = service.pipeline(Some(&job.id), &StageTrends::new())?;
    println!();
    println!("== Pipeline for {} ==", job.title);
    if args.json {
        println!("{}", to_json(&summary)?);
    } else {
        render_summary(&summary);
    }

    println!();
    println!(
        "Notifications sent: {} | conversations opened: {}",
        notifier.sent().len(),
        conversations.thread_count()
    );
    Ok(())
}

fn job_approval(service: &DemoService) -> Result<Job, AppError> {
    println!();
    println!("-- Job approval --");
    let job = service.create_job(
        ActorRole::ProjectLeader,
        UserId::from(PROJECT_LEADER),
        NewJob {
            title: "Senior Rust Engineer".to_string(),
            department: "Platform".to_string(),
            location: "Remote".to_string(),
            employment_type: EmploymentType::FullTime,
            salary_range: None,
            priority: Priority::High,
            urgent: true,
        },
    )?;
    println!("created {} in '{}'", job.id, job.status);

    step_job(service, &job, ActorRole::ProjectLeader, "submit_to_hr")?;
    service.attach_question_set(&job.id, ActorRole::Hr, QuestionSetKind::Hr, 4, None)?;
    step_job(service, &job, ActorRole::Hr, "complete_hr")?;

    match service.transition_job(
        &job.id,
        &TransitionRequest::new(ActorRole::ProjectLeader, "submit_for_approval"),
    ) {
        Err(error) => println!("submit_for_approval refused: {error}"),
        Ok(receipt) => println!("submit_for_approval unexpectedly moved to '{}'", receipt.entity.status),
    }

    service.attach_question_set(&job.id, ActorRole::ProjectLeader, QuestionSetKind::Technical, 6, None)?;
    step_job(service, &job, ActorRole::ProjectLeader, "submit_for_approval")?;
    step_job(service, &job, ActorRole::Ceo, "approve")?;
    Ok(service.job(&job.id)?)
}

fn step_job(
    service: &DemoService,
    job: &Job,
    actor: ActorRole,
    transition: &str,
) -> Result<(), AppError> {
    let receipt = service.transition_job(&job.id, &TransitionRequest::new(actor, transition))?;
    println!(
        "{:<15} {:<20} -> '{}' {}",
        actor.name(),
        receipt.applied.join(" + "),
        receipt.entity.status,
        describe_effects(&receipt.side_effects)
    );
    Ok(())
}

fn interview_booking(
    service: &DemoService,
    job: &Job,
    interview_date: NaiveDate,
    today: NaiveDate,
) -> Result<(Application, Application), AppError> {
    println!();
    println!("-- Interview booking on {interview_date} --");
    let first = review(service, job, "cand-ada", (9, 10), (8, 10))?;
    let second = review(service, job, "cand-linus", (6, 10), (7, 10))?;

    let booked = service.schedule_interview(
        ActorRole::Hr,
        &slot(&first, interview_date, "14:00", 60),
        today,
    )?;
    println!(
        "booked {} 14:00 for 60 min -> application '{}' {}",
        booked.interview.id,
        booked.application.status,
        describe_effects(&booked.side_effects)
    );

    match service.schedule_interview(ActorRole::Hr, &slot(&second, interview_date, "14:30", 30), today) {
        Err(error @ HiringServiceError::Scheduling(_)) => println!("14:30 for 30 min refused: {error}"),
        Err(error) => return Err(error.into()),
        Ok(receipt) => println!("14:30 unexpectedly booked as {}", receipt.interview.id),
    }

    let later = service.schedule_interview(
        ActorRole::Hr,
        &slot(&second, interview_date, "15:00", 30),
        today,
    )?;
    println!("booked {} 15:00 for 30 min", later.interview.id);

    Ok((booked.application, later.application))
}

fn review(
    service: &DemoService,
    job: &Job,
    candidate: &str,
    technical: (u32, u32),
    hr: (u32, u32),
) -> Result<Application, AppError> {
    let application = service
        .submit_application(&job.id, CandidateId::from(candidate))?
        .entity;
    let assessment = |(score, max_score): (u32, u32)| {
        TransitionPayload::assessment(AssessmentResult {
            score,
            max_score,
            passed: score * 2 >= max_score,
        })
    };
    for (transition, payload) in [
        ("start_technical_review", TransitionPayload::empty()),
        ("record_technical_assessment", assessment(technical)),
        ("record_hr_assessment", assessment(hr)),
    ] {
        service.transition_application(
            &application.id,
            &TransitionRequest::new(ActorRole::System, transition).with_payload(payload),
        )?;
    }

    let application = service.application(&application.id)?;
    let score = application
        .overall_score()
        .map_or_else(|| "n/a".to_string(), |score| format!("{score:.1}"));
    println!(
        "{} ({}) reached '{}' with overall score {score}",
        application.id, application.candidate_id, application.status
    );
    Ok(application)
}

fn slot(application: &Application, date: NaiveDate, time: &str, duration_minutes: u32) -> ScheduleRequest {
    ScheduleRequest {
        application_id: application.id.clone(),
        rh_user_id: UserId::from(RH_USER),
        scheduled_date: date.format("%Y-%m-%d").to_string(),
        scheduled_time: time.to_string(),
        duration_minutes,
        kind: InterviewType::Video,
        location: None,
        notes: None,
        replace_existing: false,
    }
}

fn terminal_immutability(
    service: &DemoService,
    hired: &Application,
    declined: &Application,
) -> Result<(), AppError> {
    println!();
    println!("-- Decisions --");
    for transition in ["confirm", "complete"] {
        let receipt = service.update_interview(&hired.id, &TransitionRequest::new(ActorRole::Hr, transition))?;
        println!(
            "interview {transition} -> application '{}' {}",
            receipt.entity.status,
            describe_effects(&receipt.side_effects)
        );
    }

    let accepted = service.transition_application(
        &hired.id,
        &TransitionRequest::new(ActorRole::ProjectLeader, "accept"),
    )?;
    println!(
        "{} accepted {}",
        accepted.entity.id,
        describe_effects(&accepted.side_effects)
    );

    match service.transition_application(&hired.id, &TransitionRequest::new(ActorRole::Candidate, "withdraw")) {
        Err(error) => println!("withdraw after acceptance refused: {error}"),
        Ok(receipt) => println!("withdraw unexpectedly moved to '{}'", receipt.entity.status),
    }

    let withdrawn = service.transition_application(
        &declined.id,
        &TransitionRequest::new(ActorRole::Candidate, "withdraw"),
    )?;
    println!(
        "{} withdrew; interview now {}",
        withdrawn.entity.id,
        withdrawn
            .entity
            .scheduled_interview
            .as_ref()
            .map_or_else(|| "none".to_string(), |interview| interview.status.to_string())
    );
    Ok(())
}

fn describe_effects(effects: &[SideEffect]) -> String {
    if effects.is_empty() {
        return String::new();
    }
    let described: Vec<String> = effects
        .iter()
        .map(|effect| match effect.template() {
            Some(template) => format!("{}:{template}", effect.kind()),
            None => effect.kind().to_string(),
        })
        .collect();
    format!("[{}]", described.join(", "))
}

pub(crate) fn run_pipeline_report(args: PipelineArgs) -> Result<(), AppError> {
    let raw = fs::read_to_string(&args.input)?;
    let applications: Vec<Application> = serde_json::from_str(&raw).map_err(|err| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is not a list of applications: {err}", args.input.display()),
        )
    })?;

    let as_of_date = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let as_of = Utc.from_utc_datetime(&as_of_date.and_time(NaiveTime::MIN));
    let trends = args
        .falling
        .iter()
        .fold(StageTrends::new(), |trends, stage| trends.with(*stage, StageTrend::Down));

    let summary = PipelineAggregator::new(args.threshold_days).summarize(&applications, &trends, as_of);
    println!("Pipeline as of {as_of_date} ({} applications)", applications.len());
    render_summary(&summary);
    Ok(())
}

fn render_summary(summary: &PipelineSummary) {
    println!(
        "{:<22} {:>5} {:>6} {:>11} {:>9} {:>6}",
        "stage", "count", "share", "conversion", "avg days", "trend"
    );
    for stage in &summary.stages {
        println!(
            "{:<22} {:>5} {:>5}% {:>10.1}% {:>9.2} {:>6}{}",
            stage.name,
            stage.count,
            stage.display_percentage(),
            stage.conversion_rate,
            stage.avg_time_in_stage_days,
            format!("{:?}", stage.trend).to_lowercase(),
            if stage.bottleneck { "  <- bottleneck" } else { "" }
        );
    }
    println!(
        "active {} | hired {} | rejected {} | withdrawn {} | hire rate {:.1}%",
        summary.active, summary.hired, summary.rejected, summary.withdrawn, summary.hire_rate
    );
    if let Some(score) = summary.mean_overall_score {
        println!("mean overall score {score:.1}");
    }
}

fn to_json(summary: &PipelineSummary) -> Result<String, AppError> {
    serde_json::to_string_pretty(summary)
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_parse_case_insensitively() {
        assert_eq!(parse_stage("HR_REVIEW"), Ok(FunnelStage::HrReview));
        assert!(parse_stage("screening").is_err());
    }

    #[test]
    fn walkthrough_runs_against_in_memory_collaborators() {
        let date = Local::now().date_naive() + Duration::days(21);
        run_demo(DemoArgs {
            interview_date: Some(date),
            json: true,
        })
        .expect("demo completes");
    }

    #[test]
    fn effects_are_summarised_by_kind_and_template() {
        let effects = vec![SideEffect::NotifyActor(recruit_flow::workflows::hiring::ActorNotice {
            role: ActorRole::Ceo,
            template: "job_pending_approval".to_string(),
            entity: recruit_flow::workflows::hiring::EntityKey::new(
                recruit_flow::workflows::hiring::EntityKind::Job,
                "job-1",
            ),
            details: Default::default(),
        })];
        assert_eq!(describe_effects(&effects), "[notify_actor:job_pending_approval]");
        assert_eq!(describe_effects(&[]), "");
    }
}
