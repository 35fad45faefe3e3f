//! Session evaluation results and the per-case score book

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Accept any JSON number for a whole-number field. Fractions are rounded,
/// negatives clamp to zero.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() {
        return Ok(0);
    }
    Ok(value.round().clamp(0.0, f64::from(u32::MAX)) as u32)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostItem {
    pub item: String,
    pub cost: f64,
    pub is_necessary: bool,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimelineRating {
    Good,
    Bad,
    #[default]
    Neutral,
    Critical,
}

/// Examiner comment attached to one transcript turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineEvent {
    #[serde(deserialize_with = "lenient_u32")]
    pub turn_index: u32,
    #[serde(rename = "type")]
    pub rating: TimelineRating,
    pub comment: String,
    pub original_message: String,
}

/// Examiner report for one scored session.
///
/// Every field defaults so that partially populated model output still
/// deserializes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationScore {
    #[serde(deserialize_with = "lenient_u32")]
    pub total_score: u32,
    pub diagnosis_correct: bool,
    pub user_diagnosis: String,
    pub actual_diagnosis: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub accuracy_score: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub efficiency_score: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub communication_score: u32,
    pub empathy_feedback: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub handover_score: u32,
    pub handover_feedback: String,
    pub total_bill: f64,
    pub bill_breakdown: Vec<CostItem>,
    pub feedback_summary: String,
    pub key_takeaway: String,
    pub missed_critical_steps: Vec<String>,
    pub timeline_analysis: Vec<TimelineEvent>,
    pub next_recommended_steps: Vec<String>,
}

impl SimulationScore {
    /// Zeroed report used when the examiner output cannot be used
    pub fn failed() -> Self {
        Self {
            user_diagnosis: "Error".to_string(),
            actual_diagnosis: "Error".to_string(),
            empathy_feedback: "Error".to_string(),
            handover_feedback: "Error".to_string(),
            feedback_summary: "Evaluation Failed".to_string(),
            key_takeaway: "Error".to_string(),
            ..Default::default()
        }
    }
}

/// Best score per case id
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ScoreBook {
    scores: BTreeMap<String, u32>,
}

impl ScoreBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(scores: BTreeMap<String, u32>) -> Self {
        Self { scores }
    }

    /// Record a score, keeping the higher of the old and new values.
    /// Returns `true` when the stored value changed.
    pub fn record(&mut self, case_id: &str, score: u32) -> bool {
        match self.scores.get(case_id) {
            Some(best) if *best >= score => false,
            _ => {
                self.scores.insert(case_id.to_string(), score);
                true
            }
        }
    }

    pub fn get(&self, case_id: &str) -> Option<u32> {
        self.scores.get(case_id).copied()
    }

    pub fn total_score(&self) -> u64 {
        self.scores.values().map(|s| u64::from(*s)).sum()
    }

    pub fn cases_completed(&self) -> usize {
        self.scores.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_best_score() {
        let mut book = ScoreBook::new();
        assert!(book.record("cardio-001", 60));
        assert!(!book.record("cardio-001", 40));
        assert!(book.record("cardio-001", 85));
        assert_eq!(book.get("cardio-001"), Some(85));
    }

    #[test]
    fn totals_sum_across_cases() {
        let mut book = ScoreBook::new();
        book.record("a", 70);
        book.record("b", 90);
        assert_eq!(book.total_score(), 160);
        assert_eq!(book.cases_completed(), 2);
    }

    #[test]
    fn score_book_is_a_plain_json_map() {
        let mut book = ScoreBook::new();
        book.record("cardio-001", 72);
        assert_eq!(
            serde_json::to_string(&book).unwrap(),
            r#"{"cardio-001":72}"#
        );
    }

    #[test]
    fn partial_report_fills_defaults() {
        let report: SimulationScore = serde_json::from_str(
            r#"{"totalScore": 81, "diagnosisCorrect": true,
                "billBreakdown": [{"item": "ECG", "cost": 150, "isNecessary": true}],
                "nextRecommendedSteps": ["Review STEMI criteria"]}"#,
        )
        .unwrap();

        assert_eq!(report.total_score, 81);
        assert!(report.diagnosis_correct);
        assert_eq!(report.bill_breakdown[0].notes, "");
        assert!(report.timeline_analysis.is_empty());
    }

    #[test]
    fn fractional_and_negative_scores_are_normalized() {
        let report: SimulationScore = serde_json::from_str(
            r#"{"totalScore": 85.0, "accuracyScore": 72.6, "efficiencyScore": -4,
                "communicationScore": 90, "handoverScore": -0.5,
                "timelineAnalysis": [{"turnIndex": 2.0, "type": "good", "comment": "Clear"}]}"#,
        )
        .unwrap();

        assert_eq!(report.total_score, 85);
        assert_eq!(report.accuracy_score, 73);
        assert_eq!(report.efficiency_score, 0);
        assert_eq!(report.communication_score, 90);
        assert_eq!(report.handover_score, 0);
        assert_eq!(report.timeline_analysis[0].turn_index, 2);
    }

    #[test]
    fn non_numeric_score_is_rejected() {
        let report = serde_json::from_str::<SimulationScore>(r#"{"totalScore": "high"}"#);
        assert!(report.is_err());
    }

    #[test]
    fn failed_report_is_zeroed() {
        let report = SimulationScore::failed();
        assert_eq!(report.total_score, 0);
        assert_eq!(report.feedback_summary, "Evaluation Failed");
    }
}
