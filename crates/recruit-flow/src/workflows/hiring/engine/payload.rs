use serde::{Deserialize, Serialize};

use super::error::PayloadProblem;
use crate::workflows::hiring::domain::AssessmentResult;
use crate::workflows::hiring::status::PayloadField;

/// Data supplied alongside a transition request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub feedback: Option<String>,
    /// Project leader rating, 1 to 5.
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub assessment: Option<AssessmentResult>,
}

impl TransitionPayload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn feedback(text: impl Into<String>) -> Self {
        Self {
            feedback: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn assessment(result: AssessmentResult) -> Self {
        Self {
            assessment: Some(result),
            ..Self::default()
        }
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Trimmed feedback, `None` when absent or blank.
    pub fn feedback_text(&self) -> Option<&str> {
        self.feedback
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub(crate) fn validate(&self, required: &[PayloadField]) -> Result<(), PayloadProblem> {
        for field in required {
            let present = match field {
                PayloadField::Feedback => self.feedback_text().is_some(),
                PayloadField::Assessment => self.assessment.is_some(),
            };
            if !present {
                return Err(PayloadProblem::Missing { field: *field });
            }
        }

        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(PayloadProblem::RatingOutOfRange { rating });
            }
        }

        if let Some(result) = self.assessment {
            if result.max_score == 0 || result.score > result.max_score {
                return Err(PayloadProblem::AssessmentOutOfRange {
                    score: result.score,
                    max_score: result.max_score,
                });
            }
        }

        Ok(())
    }
}
