use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::{ScoreWeights, Scorecard};
use super::status::{ApplicationStatus, InterviewStatus, JobStatus};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for job postings.
    JobId
);
identifier!(
    /// Identifier wrapper for submitted applications.
    ApplicationId
);
identifier!(CandidateId);
identifier!(
    /// Staff or candidate account identifier as issued by the identity provider.
    UserId
);
identifier!(InterviewId);
identifier!(
    /// Messaging thread handle returned by the conversation service.
    ConversationId
);

/// Roles that can act on jobs, applications, and interviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Candidate,
    ProjectLeader,
    Hr,
    Ceo,
    /// Automated scoring and publication steps.
    System,
}

impl ActorRole {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Candidate,
            Self::ProjectLeader,
            Self::Hr,
            Self::Ceo,
            Self::System,
        ]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::ProjectLeader => "project_leader",
            Self::Hr => "hr",
            Self::Ceo => "ceo",
            Self::System => "system",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Candidate => "Candidate",
            Self::ProjectLeader => "Project Leader",
            Self::Hr => "HR",
            Self::Ceo => "CEO",
            Self::System => "System",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Job,
    Application,
    Interview,
    /// The per-HR-user interview set used for slot locking.
    Calendar,
}

impl EntityKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Application => "application",
            Self::Interview => "interview",
            Self::Calendar => "calendar",
        }
    }

    /// Formats the `sequence`-th store-allocated id for this kind.
    pub fn sequenced_id(self, sequence: u64) -> String {
        match self {
            Self::Job => format!("job-{sequence:04}"),
            Self::Application => format!("app-{sequence:06}"),
            Self::Interview => format!("int-{sequence:06}"),
            Self::Calendar => format!("cal-{sequence:04}"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Addresses one persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u32,
    pub max: u32,
    pub currency: String,
}

/// One recorded move between two states of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub from: S,
    pub to: S,
    pub transition: String,
    pub actor: ActorRole,
    pub at: DateTime<Utc>,
}

/// Fields a project leader fills in when opening a new posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub department: String,
    pub location: String,
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub salary_range: Option<SalaryRange>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub urgent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSetKind {
    Technical,
    Hr,
}

/// Job posting as it moves through drafting, HR preparation, and CEO approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub department: String,
    pub location: String,
    pub employment_type: EmploymentType,
    pub salary_range: Option<SalaryRange>,
    pub status: JobStatus,
    pub priority: Priority,
    pub urgent: bool,
    pub technical_question_count: u32,
    pub hr_question_count: u32,
    pub created_by: UserId,
    /// Most recent CEO feedback from a rejection or modification request.
    pub review_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<StatusChange<JobStatus>>,
    #[serde(default)]
    pub version: u64,
}

impl Job {
    pub fn draft(id: JobId, draft: NewJob, created_by: UserId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            department: draft.department,
            location: draft.location,
            employment_type: draft.employment_type,
            salary_range: draft.salary_range,
            status: JobStatus::Draft,
            priority: draft.priority,
            urgent: draft.urgent,
            technical_question_count: 0,
            hr_question_count: 0,
            created_by,
            review_feedback: None,
            created_at: at,
            updated_at: at,
            published_at: None,
            closed_at: None,
            history: Vec::new(),
            version: 0,
        }
    }

    pub fn question_sets_attached(&self) -> bool {
        self.technical_question_count > 0 && self.hr_question_count > 0
    }

    pub fn accepts_applications(&self) -> bool {
        self.status == JobStatus::Published
    }
}

/// Raw result reported by the external scorer for one assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub score: u32,
    pub max_score: u32,
    pub passed: bool,
}

impl AssessmentResult {
    pub fn percent(&self) -> f32 {
        if self.max_score == 0 {
            return 0.0;
        }
        self.score as f32 / self.max_score as f32 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssessmentRecord {
    Scored(AssessmentResult),
    Waived { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLeaderDecision {
    pub decision: Decision,
    pub feedback: Option<String>,
    pub rating: Option<u8>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationNote {
    pub author: UserId,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// Tags to add and remove in one request. Adds are applied first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUpdate {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

/// Candidate application tracked from submission through the hiring decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub job_title: String,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(flatten)]
    scorecard: Scorecard,
    pub project_leader_decision: Option<ProjectLeaderDecision>,
    pub scheduled_interview: Option<Interview>,
    /// Number of interviews ever booked; seeds deterministic interview ids.
    #[serde(default)]
    pub interviews_booked: u32,
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    notes: Vec<ApplicationNote>,
    #[serde(default)]
    pub history: Vec<StatusChange<ApplicationStatus>>,
    #[serde(default)]
    pub version: u64,
}

impl Application {
    pub fn submitted(
        id: ApplicationId,
        job: &Job,
        candidate_id: CandidateId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_id: job.id.clone(),
            candidate_id,
            job_title: job.title.clone(),
            status: ApplicationStatus::Submitted,
            applied_at: at,
            last_updated_at: at,
            scorecard: Scorecard::default(),
            project_leader_decision: None,
            scheduled_interview: None,
            interviews_booked: 0,
            conversation_id: None,
            tags: Vec::new(),
            priority: job.priority,
            notes: Vec::new(),
            history: Vec::new(),
            version: 0,
        }
    }

    pub fn technical_assessment(&self) -> Option<&AssessmentRecord> {
        self.scorecard.technical()
    }

    pub fn hr_assessment(&self) -> Option<&AssessmentRecord> {
        self.scorecard.hr()
    }

    /// Weighted score, present once both assessments are recorded or waived.
    pub fn overall_score(&self) -> Option<f32> {
        self.scorecard.overall_score()
    }

    pub fn notes(&self) -> &[ApplicationNote] {
        &self.notes
    }

    /// Free-form labels in the order they were first added.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn record_assessment(
        &mut self,
        kind: QuestionSetKind,
        record: AssessmentRecord,
        weights: ScoreWeights,
    ) {
        self.scorecard.record(kind, record, weights);
    }

    /// Appends a note. Allowed in every status, including terminal ones.
    pub fn append_note(&mut self, author: UserId, body: impl Into<String>, at: DateTime<Utc>) {
        self.notes.push(ApplicationNote {
            author,
            body: body.into(),
            at,
        });
        self.last_updated_at = at;
    }

    /// Adds then removes already-normalised tags. Returns whether the list changed.
    pub(crate) fn retag(&mut self, add: &[String], remove: &[String], at: DateTime<Utc>) -> bool {
        let before = self.tags.clone();
        for tag in add {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
        self.tags.retain(|tag| !remove.contains(tag));
        let changed = self.tags != before;
        if changed {
            self.last_updated_at = at;
        }
        changed
    }

    /// The interview currently holding the application's single active slot.
    pub fn active_interview(&self) -> Option<&Interview> {
        self.scheduled_interview
            .as_ref()
            .filter(|interview| interview.is_active())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    Video,
    Phone,
    InPerson,
}

impl InterviewType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Phone => "phone",
            Self::InPerson => "in_person",
        }
    }
}

/// Interview owned by an application; the HR user participates but does not own it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    pub job_title: String,
    pub rh_user_id: UserId,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    pub kind: InterviewType,
    pub location: Option<String>,
    pub status: InterviewStatus,
    pub notes: Option<String>,
    /// Interview this one superseded through a reschedule.
    pub replaces: Option<InterviewId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<StatusChange<InterviewStatus>>,
}

impl Interview {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(self.scheduled_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Not cancelled and not superseded by a reschedule.
    pub fn is_active(&self) -> bool {
        !matches!(
            self.status,
            InterviewStatus::Cancelled | InterviewStatus::Rescheduled
        )
    }

    /// Still waiting to take place.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.status,
            InterviewStatus::Scheduled | InterviewStatus::Confirmed
        )
    }

    /// Half-open interval intersection; touching edges do not overlap.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.starts_at() < end && start < self.ends_at()
    }
}

/// All interviews an HR user takes part in, versioned as a unit so concurrent
/// bookings for the same person serialize on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewCalendar {
    pub rh_user_id: UserId,
    #[serde(default)]
    pub interviews: Vec<Interview>,
    #[serde(default)]
    pub version: u64,
}

impl InterviewCalendar {
    pub fn empty(rh_user_id: UserId) -> Self {
        Self {
            rh_user_id,
            interviews: Vec::new(),
            version: 0,
        }
    }

    /// Inserts the interview or replaces the stored copy with the same id.
    pub fn upsert(&mut self, interview: Interview) {
        match self
            .interviews
            .iter_mut()
            .find(|existing| existing.id == interview.id)
        {
            Some(existing) => *existing = interview,
            None => self.interviews.push(interview),
        }
    }

    pub fn on_date(&self, date: NaiveDate) -> Vec<&Interview> {
        let mut interviews: Vec<&Interview> = self
            .interviews
            .iter()
            .filter(|interview| interview.scheduled_date == date && interview.is_active())
            .collect();
        interviews.sort_by_key(|interview| interview.starts_at());
        interviews
    }
}
