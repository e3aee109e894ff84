use serde::Serialize;

use super::{FunnelStage, PipelineStage};
use crate::workflows::hiring::domain::Application;
use crate::workflows::hiring::status::{ApplicationStatus, WorkflowState};

/// Dashboard headline figures alongside the funnel rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub total_applications: usize,
    pub active: usize,
    pub hired: usize,
    pub rejected: usize,
    pub withdrawn: usize,
    pub hire_rate: f64,
    pub mean_overall_score: Option<f32>,
    pub bottlenecks: Vec<FunnelStage>,
    pub stages: Vec<PipelineStage>,
}

impl PipelineSummary {
    pub(crate) fn from_stages(applications: &[Application], stages: Vec<PipelineStage>) -> Self {
        let count_status = |status: ApplicationStatus| {
            applications
                .iter()
                .filter(|application| application.status == status)
                .count()
        };

        let total_applications = applications.len();
        let hired = count_status(ApplicationStatus::Accepted);
        let active = applications
            .iter()
            .filter(|application| !application.status.is_terminal())
            .count();

        let scores: Vec<f32> = applications
            .iter()
            .filter_map(Application::overall_score)
            .collect();
        let mean_overall_score = if scores.is_empty() {
            None
        } else {
            let mean = scores.iter().sum::<f32>() / scores.len() as f32;
            Some((mean * 10.0).round() / 10.0)
        };

        let hire_rate = if total_applications == 0 {
            0.0
        } else {
            hired as f64 / total_applications as f64 * 100.0
        };

        let bottlenecks = stages
            .iter()
            .filter(|stage| stage.bottleneck)
            .map(|stage| stage.stage)
            .collect();

        Self {
            total_applications,
            active,
            hired,
            rejected: count_status(ApplicationStatus::Rejected),
            withdrawn: count_status(ApplicationStatus::Withdrawn),
            hire_rate,
            mean_overall_score,
            bottlenecks,
            stages,
        }
    }
}
