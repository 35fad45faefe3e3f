//! Clinician moves chosen by the autopilot

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Ask the patient something
    Message,
    /// Order a diagnostic test named by `content`
    Order,
    /// Commit to a final diagnosis; ends the encounter
    Diagnosis,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Message => "message",
            ActionKind::Order => "order",
            ActionKind::Diagnosis => "diagnosis",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoPilotAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub content: String,
    #[serde(default)]
    pub reasoning: String,
}

impl AutoPilotAction {
    /// Generic move substituted when the model's answer cannot be parsed
    pub fn recovery() -> Self {
        Self {
            kind: ActionKind::Message,
            content: "Can you describe your symptoms again?".to_string(),
            reasoning: "Error recovery".to_string(),
        }
    }

    /// Transcript text for a final diagnosis
    pub fn diagnosis_text(&self) -> String {
        format!(
            "**FINAL DIAGNOSIS:** {}\n\n**REASONING:** {}",
            self.content, self.reasoning
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_action() {
        let action: AutoPilotAction = serde_json::from_str(
            r#"{"type": "order", "content": "Troponin", "reasoning": "rule out ACS"}"#,
        )
        .unwrap();
        assert_eq!(action.kind, ActionKind::Order);
        assert_eq!(action.content, "Troponin");
    }

    #[test]
    fn rejects_unknown_tag() {
        let parsed = serde_json::from_str::<AutoPilotAction>(
            r#"{"type": "consult", "content": "x", "reasoning": "y"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn diagnosis_text_carries_reasoning() {
        let action = AutoPilotAction {
            kind: ActionKind::Diagnosis,
            content: "STEMI".to_string(),
            reasoning: "ST elevation".to_string(),
        };
        assert_eq!(
            action.diagnosis_text(),
            "**FINAL DIAGNOSIS:** STEMI\n\n**REASONING:** ST elevation"
        );
    }
}
