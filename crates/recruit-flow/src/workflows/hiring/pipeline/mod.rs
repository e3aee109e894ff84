//! Read-only funnel metrics derived from a snapshot of applications.

mod stages;
mod summary;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::Application;

pub use stages::{FunnelStage, StageTrend, StageTrends};
pub use summary::PipelineSummary;

/// Average dwell above which a stage with a falling trend is flagged.
pub const BOTTLENECK_THRESHOLD_DAYS: f64 = 3.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One funnel row. Counts are cumulative: applications that reached at least this stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStage {
    pub stage: FunnelStage,
    pub name: &'static str,
    pub count: usize,
    /// Share of all applications, unrounded.
    pub percentage: f64,
    /// Share of the previous stage's count; 100 for the first stage.
    pub conversion_rate: f64,
    pub avg_time_in_stage_days: f64,
    pub trend: StageTrend,
    pub bottleneck: bool,
}

impl PipelineStage {
    pub fn display_percentage(&self) -> u32 {
        self.percentage.round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineAggregator {
    threshold_days: f64,
}

impl Default for PipelineAggregator {
    fn default() -> Self {
        Self::new(BOTTLENECK_THRESHOLD_DAYS)
    }
}

impl PipelineAggregator {
    pub fn new(threshold_days: f64) -> Self {
        Self { threshold_days }
    }

    pub fn threshold_days(&self) -> f64 {
        self.threshold_days
    }

    /// Builds the funnel. Open stays are measured up to `as_of`.
    pub fn compute_stages(
        &self,
        applications: &[Application],
        trends: &StageTrends,
        as_of: DateTime<Utc>,
    ) -> Vec<PipelineStage> {
        let ordered = FunnelStage::ordered();
        let mut counts = [0usize; 7];
        let mut dwell_totals = [0i64; 7];
        let mut dwell_samples = [0usize; 7];

        for application in applications {
            let reached = stages::furthest_stage(application).rank();
            for count in counts.iter_mut().take(reached + 1) {
                *count += 1;
            }
            for (stage, seconds) in stages::dwell_seconds(application, as_of) {
                dwell_totals[stage.rank()] += seconds;
                dwell_samples[stage.rank()] += 1;
            }
        }

        let total = counts[0];
        ordered
            .iter()
            .map(|&stage| {
                let index = stage.rank();
                let count = counts[index];
                let (percentage, conversion_rate) = if total == 0 {
                    (0.0, 0.0)
                } else {
                    let previous = if index == 0 { total } else { counts[index - 1] };
                    (ratio(count, total), ratio(count, previous))
                };
                let avg_time_in_stage_days = if dwell_samples[index] == 0 {
                    0.0
                } else {
                    dwell_totals[index] as f64 / dwell_samples[index] as f64 / SECONDS_PER_DAY
                };
                let trend = trends.get(stage);

                PipelineStage {
                    stage,
                    name: stage.label(),
                    count,
                    percentage,
                    conversion_rate,
                    avg_time_in_stage_days,
                    trend,
                    bottleneck: avg_time_in_stage_days > self.threshold_days
                        && trend == StageTrend::Down,
                }
            })
            .collect()
    }

    pub fn summarize(
        &self,
        applications: &[Application],
        trends: &StageTrends,
        as_of: DateTime<Utc>,
    ) -> PipelineSummary {
        let stages = self.compute_stages(applications, trends, as_of);
        PipelineSummary::from_stages(applications, stages)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
