use serde::{Deserialize, Serialize};

use super::domain::{AssessmentRecord, QuestionSetKind};

/// Relative weight of the technical and HR assessments in the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub technical: f32,
    pub hr: f32,
}

impl ScoreWeights {
    /// Builds weights from the technical share; HR takes the remainder.
    pub fn from_technical_share(technical: f32) -> Self {
        let technical = technical.clamp(0.0, 1.0);
        Self {
            technical,
            hr: 1.0 - technical,
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::from_technical_share(0.6)
    }
}

/// Weighted overall score in percent, rounded to one decimal.
///
/// Present only once both assessments are recorded or waived. A waived side drops
/// out and the other side counts fully; two waivers leave nothing to score.
pub fn overall_score(
    technical: Option<&AssessmentRecord>,
    hr: Option<&AssessmentRecord>,
    weights: ScoreWeights,
) -> Option<f32> {
    let raw = match (technical?, hr?) {
        (AssessmentRecord::Scored(technical), AssessmentRecord::Scored(hr)) => {
            technical.percent() * weights.technical + hr.percent() * weights.hr
        }
        (AssessmentRecord::Scored(only), AssessmentRecord::Waived { .. })
        | (AssessmentRecord::Waived { .. }, AssessmentRecord::Scored(only)) => only.percent(),
        (AssessmentRecord::Waived { .. }, AssessmentRecord::Waived { .. }) => return None,
    };
    Some((raw * 10.0).round() / 10.0)
}

/// Both assessments plus the score derived from them.
///
/// The score is never read from storage: deserializing recomputes it from the
/// recorded assessments and the weights they were scored with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "StoredScorecard")]
pub struct Scorecard {
    technical_assessment: Option<AssessmentRecord>,
    hr_assessment: Option<AssessmentRecord>,
    score_weights: ScoreWeights,
    overall_score: Option<f32>,
}

#[derive(Deserialize)]
struct StoredScorecard {
    #[serde(default)]
    technical_assessment: Option<AssessmentRecord>,
    #[serde(default)]
    hr_assessment: Option<AssessmentRecord>,
    #[serde(default)]
    score_weights: ScoreWeights,
}

impl From<StoredScorecard> for Scorecard {
    fn from(stored: StoredScorecard) -> Self {
        let mut scorecard = Self {
            technical_assessment: stored.technical_assessment,
            hr_assessment: stored.hr_assessment,
            score_weights: stored.score_weights,
            overall_score: None,
        };
        scorecard.rescore();
        scorecard
    }
}

impl Scorecard {
    pub fn technical(&self) -> Option<&AssessmentRecord> {
        self.technical_assessment.as_ref()
    }

    pub fn hr(&self) -> Option<&AssessmentRecord> {
        self.hr_assessment.as_ref()
    }

    pub fn overall_score(&self) -> Option<f32> {
        self.overall_score
    }

    pub(crate) fn record(&mut self, kind: QuestionSetKind, record: AssessmentRecord, weights: ScoreWeights) {
        match kind {
            QuestionSetKind::Technical => self.technical_assessment = Some(record),
            QuestionSetKind::Hr => self.hr_assessment = Some(record),
        }
        self.score_weights = weights;
        self.rescore();
    }

    fn rescore(&mut self) {
        self.overall_score = overall_score(
            self.technical_assessment.as_ref(),
            self.hr_assessment.as_ref(),
            self.score_weights,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::hiring::domain::AssessmentResult;

    fn scored(score: u32, max_score: u32) -> AssessmentRecord {
        AssessmentRecord::Scored(AssessmentResult {
            score,
            max_score,
            passed: true,
        })
    }

    fn waived() -> AssessmentRecord {
        AssessmentRecord::Waived {
            reason: "internal transfer".to_string(),
        }
    }

    #[test]
    fn score_is_weighted_not_averaged() {
        let technical = scored(90, 100);
        let hr = scored(50, 100);
        let score = overall_score(Some(&technical), Some(&hr), ScoreWeights::default());
        assert_eq!(score, Some(74.0));
    }

    #[test]
    fn score_waits_for_both_assessments() {
        let technical = scored(8, 10);
        assert_eq!(
            overall_score(Some(&technical), None, ScoreWeights::default()),
            None
        );
    }

    #[test]
    fn waived_side_drops_out() {
        let hr = scored(7, 10);
        let waiver = waived();
        assert_eq!(
            overall_score(Some(&waiver), Some(&hr), ScoreWeights::default()),
            Some(70.0)
        );
        assert_eq!(
            overall_score(Some(&waiver), Some(&waived()), ScoreWeights::default()),
            None
        );
    }

    #[test]
    fn technical_share_is_clamped() {
        let weights = ScoreWeights::from_technical_share(1.4);
        assert_eq!(weights.technical, 1.0);
        assert_eq!(weights.hr, 0.0);
    }
}
