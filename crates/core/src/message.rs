//! Transcript messages exchanged during a simulation session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    /// The human clinician
    User,
    /// The simulated patient persona
    Patient,
    /// Lab results, interpretations and notices
    System,
    /// The AI clinician playing on the user's behalf
    AutoPilot,
    /// Reflection coach
    Mentor,
}

impl MessageSender {
    /// Tag used when the transcript is rendered into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            MessageSender::User => "USER",
            MessageSender::Patient => "PATIENT",
            MessageSender::System => "SYSTEM",
            MessageSender::AutoPilot => "AUTOPILOT",
            MessageSender::Mentor => "MENTOR",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Chat,
    LabResult,
    Interpretation,
    Reflection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: MessageSender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    pub fn new(sender: MessageSender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            kind: None,
            image_url: None,
        }
    }

    pub fn with_kind(mut self, kind: MessageType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }
}

/// Append-only, chronologically ordered list of messages.
///
/// Entries are never edited or removed; a new session starts with a new
/// transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// `[SENDER]: text` lines, one per message
    pub fn history_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("[{}]: {}", m.sender.label(), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Transcript rendered for the examiner: clinician moves are tagged so
    /// that autopilot moves can be told apart from the user's own.
    pub fn examiner_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let label = match m.sender {
                    MessageSender::User => "USER_DOCTOR",
                    MessageSender::AutoPilot => "AI_AUTOPILOT",
                    other => other.label(),
                };
                format!("[{}]: {}", label, m.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_text_tags_each_sender() {
        let mut transcript = Transcript::new();
        transcript.push(Message::new(MessageSender::Patient, "chest pain"));
        transcript.push(Message::new(MessageSender::AutoPilot, "Describe the pain"));

        assert_eq!(
            transcript.history_text(),
            "[PATIENT]: chest pain\n[AUTOPILOT]: Describe the pain"
        );
    }

    #[test]
    fn examiner_text_separates_user_from_autopilot() {
        let mut transcript = Transcript::new();
        transcript.push(Message::new(MessageSender::User, "Any allergies?"));
        transcript.push(Message::new(MessageSender::AutoPilot, "Ordering ECG..."));

        let text = transcript.examiner_text();
        assert!(text.contains("[USER_DOCTOR]: Any allergies?"));
        assert!(text.contains("[AI_AUTOPILOT]: Ordering ECG..."));
    }

    #[test]
    fn message_serializes_type_field() {
        let msg = Message::new(MessageSender::System, "Troponin 2.1")
            .with_kind(MessageType::LabResult);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["sender"], "system");
        assert_eq!(json["type"], "lab_result");
        assert!(json.get("imageUrl").is_none());
    }
}
