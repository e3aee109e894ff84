//! Interview booking: slot validation, per-HR conflict detection, and the
//! single-active-interview rule for applications.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    ActorRole, Application, ApplicationId, Interview, InterviewId, InterviewType, UserId,
};
use super::effects::{CandidateNotice, ConversationRequest, SideEffect};
use super::engine::{TransitionPayload, WorkflowEngine, WorkflowEntity, WorkflowError};
use super::status::{ApplicationStatus, ApplicationTransition, InterviewStatus, InterviewTransition};

/// Interview lengths HR can book, in minutes.
pub const ALLOWED_DURATIONS: [u32; 5] = [30, 45, 60, 90, 120];

/// Booking request as submitted by the HR scheduling form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub application_id: ApplicationId,
    pub rh_user_id: UserId,
    /// `YYYY-MM-DD`.
    pub scheduled_date: String,
    /// `HH:MM`, seconds optional.
    pub scheduled_time: String,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    pub kind: InterviewType,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Supersede the application's active interview instead of failing.
    #[serde(default)]
    pub replace_existing: bool,
}

/// Snapshot the scheduler works against.
#[derive(Debug, Clone, Copy)]
pub struct CandidateContext<'a> {
    pub application: &'a Application,
    pub actor: ActorRole,
    pub today: NaiveDate,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub application: Application,
    pub interview: Interview,
    /// Prior interview, now `rescheduled`, when the booking replaced one.
    pub replaced: Option<Interview>,
    pub side_effects: Vec<SideEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid slot: {0}")]
    InvalidSlot(SlotViolation),
    #[error("slot overlaps interview {conflicting} for {rh_user_id}")]
    SlotConflict {
        conflicting: InterviewId,
        rh_user_id: UserId,
    },
    #[error("application {application_id} already holds interview {interview_id}")]
    ApplicationAlreadyScheduled {
        application_id: ApplicationId,
        interview_id: InterviewId,
    },
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl SchedulingError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlot(_) => "invalid_slot",
            Self::SlotConflict { .. } => "slot_conflict",
            Self::ApplicationAlreadyScheduled { .. } => "application_already_scheduled",
            Self::Workflow(error) => error.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum SlotViolation {
    UnparseableDate { value: String },
    UnparseableTime { value: String },
    InPast { date: NaiveDate, today: NaiveDate },
    LocationRequired,
    UnsupportedDuration { minutes: u32 },
    ApplicationMismatch { expected: ApplicationId, requested: ApplicationId },
}

impl fmt::Display for SlotViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableDate { value } => write!(f, "'{value}' is not a YYYY-MM-DD date"),
            Self::UnparseableTime { value } => write!(f, "'{value}' is not an HH:MM time"),
            Self::InPast { date, today } => write!(f, "{date} is before {today}"),
            Self::LocationRequired => f.write_str("in-person interviews need a location"),
            Self::UnsupportedDuration { minutes } => write!(
                f,
                "{minutes} minutes is not one of {ALLOWED_DURATIONS:?}"
            ),
            Self::ApplicationMismatch {
                expected,
                requested,
            } => write!(f, "request targets {requested} but context holds {expected}"),
        }
    }
}

/// A validated `[start, end)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: u32,
}

impl Slot {
    fn window(&self) -> (chrono::NaiveDateTime, chrono::NaiveDateTime) {
        let start = self.date.and_time(self.time);
        (
            start,
            start + Duration::minutes(i64::from(self.duration_minutes)),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InterviewScheduler {
    engine: WorkflowEngine,
}

impl InterviewScheduler {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }

    /// Books an interview against the HR user's current calendar.
    ///
    /// `calendar` holds every interview the HR user takes part in; inactive ones are
    /// ignored. The result is pure: the caller persists the application and calendar
    /// together and executes the returned intents.
    pub fn schedule(
        &self,
        context: CandidateContext<'_>,
        request: &ScheduleRequest,
        calendar: &[Interview],
    ) -> Result<ScheduleOutcome, SchedulingError> {
        let application = context.application;
        let slot = validate_slot(&context, request)?;

        let superseded = application
            .active_interview()
            .filter(|_| request.replace_existing);
        check_conflicts(&slot, request, calendar, superseded.map(|interview| &interview.id))?;

        let replaced = match application.active_interview() {
            Some(active) if !request.replace_existing => {
                return Err(SchedulingError::ApplicationAlreadyScheduled {
                    application_id: application.id.clone(),
                    interview_id: active.id.clone(),
                });
            }
            Some(active) => {
                let outcome = self.engine.apply(
                    active,
                    context.actor,
                    InterviewTransition::Reschedule,
                    &TransitionPayload::empty(),
                    context.at,
                )?;
                Some(outcome.entity)
            }
            None => None,
        };

        let (mut next, mut side_effects) = if application.status
            == ApplicationStatus::InterviewScheduled
            && replaced.is_some()
        {
            (application.clone(), Vec::new())
        } else {
            let outcome = self.engine.apply(
                application,
                context.actor,
                ApplicationTransition::ScheduleInterview,
                &TransitionPayload::empty(),
                context.at,
            )?;
            (outcome.entity, outcome.side_effects)
        };

        let interview = Interview {
            id: InterviewId(format!("{}-int-{}", application.id, application.interviews_booked + 1)),
            application_id: application.id.clone(),
            candidate_id: application.candidate_id.clone(),
            job_title: application.job_title.clone(),
            rh_user_id: request.rh_user_id.clone(),
            scheduled_date: slot.date,
            scheduled_time: slot.time,
            duration_minutes: slot.duration_minutes,
            kind: request.kind,
            location: non_blank(request.location.as_deref()),
            status: InterviewStatus::Scheduled,
            notes: non_blank(request.notes.as_deref()),
            replaces: replaced.as_ref().map(|interview| interview.id.clone()),
            created_at: context.at,
            updated_at: context.at,
            history: Vec::new(),
        };

        next.scheduled_interview = Some(interview.clone());
        next.interviews_booked += 1;
        next.last_updated_at = context.at;

        let template = if replaced.is_some() {
            "interview_rescheduled"
        } else {
            "interview_scheduled"
        };
        side_effects.push(SideEffect::NotifyCandidate(CandidateNotice {
            template: template.to_string(),
            application_id: application.id.clone(),
            candidate_id: application.candidate_id.clone(),
            details: interview.notice_details(),
        }));
        side_effects.push(SideEffect::CreateOrReuseConversation(ConversationRequest {
            application_id: application.id.clone(),
            candidate_id: application.candidate_id.clone(),
            staff_user_id: request.rh_user_id.clone(),
        }));

        info!(
            application_id = %application.id,
            interview_id = %interview.id,
            rh_user_id = %request.rh_user_id,
            starts_at = %interview.starts_at(),
            replaced = ?interview.replaces,
            "interview booked"
        );

        Ok(ScheduleOutcome {
            application: next,
            interview,
            replaced,
            side_effects,
        })
    }
}

fn validate_slot(
    context: &CandidateContext<'_>,
    request: &ScheduleRequest,
) -> Result<Slot, SchedulingError> {
    let invalid =
        |violation| -> Result<Slot, SchedulingError> { Err(SchedulingError::InvalidSlot(violation)) };

    if request.application_id != context.application.id {
        return invalid(SlotViolation::ApplicationMismatch {
            expected: context.application.id.clone(),
            requested: request.application_id.clone(),
        });
    }

    let Some(date) = parse_date(&request.scheduled_date) else {
        return invalid(SlotViolation::UnparseableDate {
            value: request.scheduled_date.clone(),
        });
    };
    let Some(time) = parse_time(&request.scheduled_time) else {
        return invalid(SlotViolation::UnparseableTime {
            value: request.scheduled_time.clone(),
        });
    };

    if date < context.today {
        return invalid(SlotViolation::InPast {
            date,
            today: context.today,
        });
    }

    if request.kind == InterviewType::InPerson && non_blank(request.location.as_deref()).is_none() {
        return invalid(SlotViolation::LocationRequired);
    }

    if !ALLOWED_DURATIONS.contains(&request.duration_minutes) {
        return invalid(SlotViolation::UnsupportedDuration {
            minutes: request.duration_minutes,
        });
    }

    Ok(Slot {
        date,
        time,
        duration_minutes: request.duration_minutes,
    })
}

fn check_conflicts(
    slot: &Slot,
    request: &ScheduleRequest,
    calendar: &[Interview],
    superseded: Option<&InterviewId>,
) -> Result<(), SchedulingError> {
    let (start, end) = slot.window();
    let conflict = calendar
        .iter()
        .filter(|interview| interview.rh_user_id == request.rh_user_id && interview.is_active())
        .filter(|interview| Some(&interview.id) != superseded)
        .filter(|interview| interview.overlaps(start, end))
        .min_by_key(|interview| interview.starts_at());

    match conflict {
        Some(existing) => {
            debug!(
                rh_user_id = %request.rh_user_id,
                conflicting = %existing.id,
                requested_start = %start,
                "slot conflict"
            );
            Err(SchedulingError::SlotConflict {
                conflicting: existing.id.clone(),
                rh_user_id: request.rh_user_id.clone(),
            })
        }
        None => Ok(()),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_accept_optional_seconds() {
        assert_eq!(parse_time("14:00"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(parse_time(" 09:30:15 "), NaiveTime::from_hms_opt(9, 30, 15));
        assert_eq!(parse_time("2pm"), None);
    }

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(parse_date("2024-06-20"), NaiveDate::from_ymd_opt(2024, 6, 20));
        assert_eq!(parse_date("20/06/2024"), None);
    }

    #[test]
    fn slot_window_is_half_open_by_duration() {
        let slot = Slot {
            date: NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            duration_minutes: 90,
        };
        let (start, end) = slot.window();
        assert_eq!(end - start, Duration::minutes(90));
    }
}
