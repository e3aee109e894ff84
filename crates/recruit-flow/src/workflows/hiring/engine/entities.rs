use std::collections::BTreeMap;

use super::{PayloadProblem, TransitionContext, WorkflowEntity};
use crate::workflows::hiring::domain::{
    Application, ApplicationId, AssessmentRecord, CandidateId, Decision, EntityKey, EntityKind,
    Interview, Job, ProjectLeaderDecision, QuestionSetKind,
};
use crate::workflows::hiring::status::{
    ApplicationStatus, ApplicationTransition, InterviewStatus, InterviewTransition, JobStatus,
    JobTransition, Precondition, TransitionRule, TransitionTable, WorkflowTransition,
    APPLICATION_TRANSITIONS, INTERVIEW_TRANSITIONS, JOB_TRANSITIONS,
};

impl WorkflowEntity for Job {
    type State = JobStatus;
    type Transition = JobTransition;

    fn table() -> &'static TransitionTable<JobStatus, JobTransition> {
        &JOB_TRANSITIONS
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(EntityKind::Job, self.id.as_str())
    }

    fn state(&self) -> JobStatus {
        self.status
    }

    fn check_precondition(&self, precondition: Precondition) -> Result<(), PayloadProblem> {
        match precondition {
            Precondition::QuestionSetsAttached if !self.question_sets_attached() => {
                Err(PayloadProblem::QuestionSetsMissing {
                    technical: self.technical_question_count,
                    hr: self.hr_question_count,
                })
            }
            _ => Ok(()),
        }
    }

    fn apply_rule(
        &mut self,
        rule: &TransitionRule<JobStatus, JobTransition>,
        context: &TransitionContext<'_>,
    ) {
        match rule.transition {
            JobTransition::Reject | JobTransition::RequestModifications => {
                self.review_feedback = context.payload.feedback_text().map(str::to_string);
            }
            JobTransition::Publish if self.published_at.is_none() => {
                self.published_at = Some(context.at);
            }
            JobTransition::Close => self.closed_at = Some(context.at),
            _ => {}
        }

        self.history
            .push(context.change(self.status, rule.to, rule.transition.name()));
        self.status = rule.to;
        self.updated_at = context.at;
    }

    fn notice_details(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("job_id".to_string(), self.id.to_string()),
            ("job_title".to_string(), self.title.clone()),
            ("department".to_string(), self.department.clone()),
        ])
    }
}

impl WorkflowEntity for Application {
    type State = ApplicationStatus;
    type Transition = ApplicationTransition;

    fn table() -> &'static TransitionTable<ApplicationStatus, ApplicationTransition> {
        &APPLICATION_TRANSITIONS
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(EntityKind::Application, self.id.as_str())
    }

    fn state(&self) -> ApplicationStatus {
        self.status
    }

    fn check_precondition(&self, precondition: Precondition) -> Result<(), PayloadProblem> {
        match precondition {
            Precondition::PendingInterview => {
                let pending = self
                    .scheduled_interview
                    .as_ref()
                    .is_some_and(Interview::is_pending);
                if pending {
                    Ok(())
                } else {
                    Err(PayloadProblem::NoPendingInterview)
                }
            }
            Precondition::QuestionSetsAttached => Ok(()),
        }
    }

    fn apply_rule(
        &mut self,
        rule: &TransitionRule<ApplicationStatus, ApplicationTransition>,
        context: &TransitionContext<'_>,
    ) {
        let payload = context.payload;
        let waiver = || AssessmentRecord::Waived {
            reason: payload.feedback_text().unwrap_or_default().to_string(),
        };

        match rule.transition {
            ApplicationTransition::RecordTechnicalAssessment => {
                if let Some(result) = payload.assessment {
                    self.record_assessment(
                        QuestionSetKind::Technical,
                        AssessmentRecord::Scored(result),
                        context.weights,
                    );
                }
            }
            ApplicationTransition::WaiveTechnicalAssessment => {
                self.record_assessment(QuestionSetKind::Technical, waiver(), context.weights);
            }
            ApplicationTransition::RecordHrAssessment => {
                if let Some(result) = payload.assessment {
                    self.record_assessment(
                        QuestionSetKind::Hr,
                        AssessmentRecord::Scored(result),
                        context.weights,
                    );
                }
            }
            ApplicationTransition::WaiveHrAssessment => {
                self.record_assessment(QuestionSetKind::Hr, waiver(), context.weights);
            }
            ApplicationTransition::CompleteInterview => {
                self.advance_interview(InterviewTransition::Complete, context);
            }
            ApplicationTransition::CancelInterview | ApplicationTransition::Withdraw => {
                self.advance_interview(InterviewTransition::Cancel, context);
            }
            ApplicationTransition::Accept => {
                self.project_leader_decision = Some(decision(Decision::Accepted, context));
            }
            ApplicationTransition::Reject => {
                self.project_leader_decision = Some(decision(Decision::Rejected, context));
                self.advance_interview(InterviewTransition::Cancel, context);
            }
            _ => {}
        }

        self.history
            .push(context.change(self.status, rule.to, rule.transition.name()));
        self.status = rule.to;
        self.last_updated_at = context.at;
    }

    fn candidate(&self) -> Option<(&ApplicationId, &CandidateId)> {
        Some((&self.id, &self.candidate_id))
    }

    fn notice_details(&self) -> BTreeMap<String, String> {
        let mut details = BTreeMap::from([
            ("application_id".to_string(), self.id.to_string()),
            ("job_id".to_string(), self.job_id.to_string()),
            ("job_title".to_string(), self.job_title.clone()),
        ]);
        if let Some(score) = self.overall_score() {
            details.insert("overall_score".to_string(), format!("{score:.1}"));
        }
        details
    }
}

impl Application {
    /// Moves the held interview along its own table when the edge exists from its state.
    fn advance_interview(&mut self, transition: InterviewTransition, context: &TransitionContext<'_>) {
        let Some(interview) = self.scheduled_interview.as_mut() else {
            return;
        };
        if let Some(rule) = INTERVIEW_TRANSITIONS.rule(interview.status, transition) {
            interview.apply_rule(rule, context);
        }
    }
}

fn decision(decision: Decision, context: &TransitionContext<'_>) -> ProjectLeaderDecision {
    ProjectLeaderDecision {
        decision,
        feedback: context.payload.feedback_text().map(str::to_string),
        rating: context.payload.rating,
        decided_at: context.at,
    }
}

impl WorkflowEntity for Interview {
    type State = InterviewStatus;
    type Transition = InterviewTransition;

    fn table() -> &'static TransitionTable<InterviewStatus, InterviewTransition> {
        &INTERVIEW_TRANSITIONS
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(EntityKind::Interview, self.id.as_str())
    }

    fn state(&self) -> InterviewStatus {
        self.status
    }

    fn check_precondition(&self, _precondition: Precondition) -> Result<(), PayloadProblem> {
        Ok(())
    }

    fn apply_rule(
        &mut self,
        rule: &TransitionRule<InterviewStatus, InterviewTransition>,
        context: &TransitionContext<'_>,
    ) {
        self.history
            .push(context.change(self.status, rule.to, rule.transition.name()));
        self.status = rule.to;
        self.updated_at = context.at;
    }

    fn candidate(&self) -> Option<(&ApplicationId, &CandidateId)> {
        Some((&self.application_id, &self.candidate_id))
    }

    fn notice_details(&self) -> BTreeMap<String, String> {
        let mut details = BTreeMap::from([
            ("interview_id".to_string(), self.id.to_string()),
            ("application_id".to_string(), self.application_id.to_string()),
            ("job_title".to_string(), self.job_title.clone()),
            ("date".to_string(), self.scheduled_date.to_string()),
            ("time".to_string(), self.scheduled_time.format("%H:%M").to_string()),
            ("duration_minutes".to_string(), self.duration_minutes.to_string()),
            ("type".to_string(), self.kind.label().to_string()),
        ]);
        if let Some(location) = &self.location {
            details.insert("location".to_string(), location.clone());
        }
        details
    }
}
