use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::hiring::domain::Application;
use crate::workflows::hiring::status::ApplicationStatus;

/// Funnel buckets in progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    Applied,
    TechnicalReview,
    HrReview,
    UnderReview,
    InterviewScheduled,
    FinalReview,
    Hired,
}

impl FunnelStage {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Applied,
            Self::TechnicalReview,
            Self::HrReview,
            Self::UnderReview,
            Self::InterviewScheduled,
            Self::FinalReview,
            Self::Hired,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::TechnicalReview => "Technical Review",
            Self::HrReview => "HR Review",
            Self::UnderReview => "Under Review",
            Self::InterviewScheduled => "Interview Scheduled",
            Self::FinalReview => "Final Review",
            Self::Hired => "Hired",
        }
    }

    pub const fn rank(self) -> usize {
        self as usize
    }

    /// Stage an application sits in while holding `status`; exits have none.
    pub const fn for_status(status: ApplicationStatus) -> Option<Self> {
        match status {
            ApplicationStatus::Submitted => Some(Self::Applied),
            ApplicationStatus::TechnicalReview => Some(Self::TechnicalReview),
            ApplicationStatus::HrReview => Some(Self::HrReview),
            ApplicationStatus::UnderReview | ApplicationStatus::PendingDecision => {
                Some(Self::UnderReview)
            }
            ApplicationStatus::InterviewScheduled => Some(Self::InterviewScheduled),
            ApplicationStatus::FinalReview => Some(Self::FinalReview),
            ApplicationStatus::Accepted => Some(Self::Hired),
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => None,
        }
    }
}

/// Week-over-week throughput direction, computed by the caller from its own history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageTrend {
    Up,
    #[default]
    Flat,
    Down,
}

/// Caller-supplied trend per stage; unspecified stages are flat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageTrends(BTreeMap<FunnelStage, StageTrend>);

impl StageTrends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: FunnelStage, trend: StageTrend) -> Self {
        self.0.insert(stage, trend);
        self
    }

    pub fn get(&self, stage: FunnelStage) -> StageTrend {
        self.0.get(&stage).copied().unwrap_or_default()
    }
}

/// Furthest stage the application ever reached, judged from its history.
pub(crate) fn furthest_stage(application: &Application) -> FunnelStage {
    application
        .history
        .iter()
        .flat_map(|change| [change.from, change.to])
        .chain(std::iter::once(application.status))
        .filter_map(FunnelStage::for_status)
        .max()
        .unwrap_or(FunnelStage::Applied)
}

/// Seconds spent in each stage, summed across re-entries. Time in `Hired` is not tracked.
pub(crate) fn dwell_seconds(
    application: &Application,
    as_of: DateTime<Utc>,
) -> BTreeMap<FunnelStage, i64> {
    let mut dwell = BTreeMap::new();
    let mut current = Some((FunnelStage::Applied, application.applied_at));

    for change in &application.history {
        let next = FunnelStage::for_status(change.to);
        if let Some((stage, entered)) = current {
            if next == Some(stage) {
                continue;
            }
            *dwell.entry(stage).or_insert(0) += (change.at - entered).num_seconds().max(0);
        }
        current = next.map(|stage| (stage, change.at));
    }

    if let Some((stage, entered)) = current {
        if stage != FunnelStage::Hired {
            *dwell.entry(stage).or_insert(0) += (as_of - entered).num_seconds().max(0);
        }
    }

    dwell.remove(&FunnelStage::Hired);
    dwell
}
