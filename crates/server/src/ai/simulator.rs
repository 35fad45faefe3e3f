//! Virtual patient simulator backed by a generative model
//!
//! The simulator itself is stateless: per-session conversation state lives in
//! [`PatientChat`], owned by the session, so that no lock has to be held
//! while a model call is in flight.

use std::sync::Arc;

use clinsim_core::{
    AutoPilotAction, CaseCategory, ClinicalCase, DiagnosticAsset, Difficulty, Role, SimError,
    SimulationScore, Transcript,
};
use serde::{Deserialize, Serialize};

use super::client::{
    AiError, Content, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL, GenerateRequest, GenerationConfig,
    GenerativeModel, Part,
};
use super::json::parse_json;
use super::prompts;

const PATIENT_TEMPERATURE: f32 = 0.9;
const DEFAULT_AVATAR_URL: &str = "https://i.pravatar.cc/150?u=custom";

/// Reference protocol attached to a session and shown to the examiner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolFile {
    /// Base64 payload
    pub data: String,
    pub mime_type: String,
}

/// Result of a diagnostic order
#[derive(Debug, Clone, PartialEq)]
pub struct LabResult {
    pub text: String,
    pub image_url: Option<String>,
}

/// Conversation with the patient persona
#[derive(Debug, Clone)]
pub struct PatientChat {
    system_instruction: String,
    history: Vec<Content>,
}

impl PatientChat {
    pub fn new(case: &ClinicalCase) -> Self {
        Self {
            system_instruction: prompts::patient_system_instruction(case),
            history: Vec::new(),
        }
    }

    /// Commit one exchange after the model answered
    pub fn record(&mut self, message: &str, reply: &str) {
        self.history.push(Content::user_text(message));
        self.history.push(Content::model_text(reply));
    }

    pub fn turns(&self) -> usize {
        self.history.len() / 2
    }

    fn request(&self, model: &str, message: &str) -> GenerateRequest {
        let mut contents = self.history.clone();
        contents.push(Content::user_text(message));
        GenerateRequest {
            model: model.to_string(),
            system_instruction: Some(self.system_instruction.clone()),
            contents,
            config: Some(GenerationConfig {
                temperature: Some(PATIENT_TEMPERATURE),
                ..Default::default()
            }),
        }
    }
}

#[derive(Clone)]
pub struct PatientSimulator {
    model: Arc<dyn GenerativeModel>,
    text_model: String,
    image_model: String,
}

impl PatientSimulator {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_models(mut self, text_model: String, image_model: String) -> Self {
        self.text_model = text_model;
        self.image_model = image_model;
        self
    }

    async fn text(&self, request: GenerateRequest) -> Result<Option<String>, AiError> {
        Ok(self.model.generate(request).await?.text())
    }

    async fn prompt(&self, prompt: String) -> Result<Option<String>, AiError> {
        self.text(GenerateRequest::prompt(&self.text_model, prompt))
            .await
    }

    /// Open a conversation: the patient speaks first.
    ///
    /// A model failure does not prevent the session from starting; the
    /// patient then opens with a stock line.
    pub async fn start_session(&self, case: &ClinicalCase) -> (PatientChat, String) {
        let mut chat = PatientChat::new(case);
        let opening = prompts::opening_prompt(case);

        match self.text(chat.request(&self.text_model, &opening)).await {
            Ok(reply) => {
                let reply = reply.unwrap_or_else(|| "*Patient looks at you*".to_string());
                chat.record(&opening, &reply);
                (chat, reply)
            }
            Err(e) => {
                tracing::warn!(case_id = %case.id, error = %e, "Opening line failed");
                (chat, "I don't feel well.".to_string())
            }
        }
    }

    /// Patient's reply to a clinician message. The caller commits the
    /// exchange with [`PatientChat::record`].
    pub async fn reply(&self, chat: &PatientChat, message: &str) -> Result<String, AiError> {
        let reply = self.text(chat.request(&self.text_model, message)).await?;
        Ok(reply.unwrap_or_else(|| "...".to_string()))
    }

    /// Make a lab result part of what the patient "knows"
    pub async fn submit_diagnostic_result(
        &self,
        chat: &PatientChat,
        result: &str,
    ) -> Result<(String, String), AiError> {
        let message = format!("[SYSTEM] {}", result);
        let reply = self.reply(chat, &message).await?;
        Ok((message, reply))
    }

    /// Decide the autopilot's next move.
    ///
    /// Transport failures are returned as errors; unusable answers fall
    /// back to [`AutoPilotAction::recovery`].
    pub async fn autopilot_action(
        &self,
        case: &ClinicalCase,
        history: &str,
    ) -> Result<AutoPilotAction, AiError> {
        let request = GenerateRequest::prompt(
            &self.text_model,
            prompts::autopilot_prompt(case, history),
        )
        .with_config(GenerationConfig::json(Some(prompts::autopilot_schema())));

        let raw = self.text(request).await?.unwrap_or_else(|| "{}".to_string());
        match parse_json::<AutoPilotAction>(&raw) {
            Ok(action) => Ok(action),
            Err(e) => {
                tracing::warn!(error = %e, "Unusable autopilot action, recovering");
                Ok(AutoPilotAction::recovery())
            }
        }
    }

    /// Produce a result for an ordered test: an authored asset when one
    /// matches, otherwise a generated report (plus an image for imaging).
    pub async fn run_diagnostic_test(&self, case: &ClinicalCase, test_name: &str) -> LabResult {
        if let Some(asset) = case.find_asset(test_name) {
            return LabResult {
                text: asset.description.clone(),
                image_url: Some(asset.url.clone()),
            };
        }

        let report = match self
            .prompt(prompts::lab_report_prompt(case, test_name))
            .await
        {
            Ok(text) => text.unwrap_or_else(|| "Test unavailable.".to_string()),
            Err(e) => {
                tracing::error!(test = test_name, error = %e, "Diagnostic report failed");
                return LabResult {
                    text: "Error: Lab system offline. Please retry.".to_string(),
                    image_url: None,
                };
            }
        };

        let image_url = if prompts::is_visual_test(test_name) {
            self.generate_image(case, test_name, &report).await
        } else {
            None
        };

        LabResult {
            text: report,
            image_url,
        }
    }

    async fn generate_image(
        &self,
        case: &ClinicalCase,
        test_name: &str,
        report: &str,
    ) -> Option<String> {
        let request = GenerateRequest::prompt(
            &self.image_model,
            prompts::image_prompt(case, test_name, report),
        );
        match self.model.generate(request).await {
            Ok(response) => response.inline_data().map(|d| d.to_data_url()),
            Err(e) => {
                tracing::warn!(test = test_name, error = %e, "Image generation failed");
                None
            }
        }
    }

    pub async fn interpret_result(&self, result: &str) -> Result<String, AiError> {
        let text = self.prompt(prompts::interpretation_prompt(result)).await?;
        Ok(text.unwrap_or_else(|| "Findings consistent with pathology.".to_string()))
    }

    pub async fn ask_tutor(
        &self,
        case: &ClinicalCase,
        question: &str,
        history: &str,
    ) -> Result<String, AiError> {
        let text = self
            .prompt(prompts::tutor_prompt(case, question, history))
            .await?;
        Ok(text.unwrap_or_else(|| "I can't answer that right now.".to_string()))
    }

    /// Mentor follow-up question on the learner's own reflection
    pub async fn reflection_prompt(
        &self,
        history: &str,
        reflection: &str,
    ) -> Result<String, AiError> {
        let text = self
            .prompt(prompts::reflection_prompt(history, reflection))
            .await?;
        Ok(text.unwrap_or_else(|| "How do you think that went?".to_string()))
    }

    /// Score the learner. Never fails: any model or parse error yields
    /// [`SimulationScore::failed`].
    pub async fn evaluate_session(
        &self,
        case: &ClinicalCase,
        transcript: &Transcript,
        handover_note: &str,
        protocol: Option<&ProtocolFile>,
    ) -> SimulationScore {
        let mut parts = vec![Part::text(prompts::evaluation_prompt(
            case,
            &transcript.examiner_text(),
            handover_note,
        ))];
        if let Some(protocol) = protocol {
            parts.push(Part::inline(&protocol.mime_type, &protocol.data));
        }

        let request = GenerateRequest {
            model: self.text_model.clone(),
            system_instruction: None,
            contents: vec![Content::user(parts)],
            config: Some(GenerationConfig::json(Some(prompts::score_schema()))),
        };

        let raw = match self.text(request).await {
            Ok(text) => text.unwrap_or_else(|| "{}".to_string()),
            Err(e) => {
                tracing::error!(case_id = %case.id, error = %e, "Evaluation failed");
                return SimulationScore::failed();
            }
        };

        parse_json::<SimulationScore>(&raw).unwrap_or_else(|e| {
            tracing::error!(case_id = %case.id, error = %e, "Unusable evaluation");
            SimulationScore::failed()
        })
    }

    /// Describe the findings in an uploaded asset
    pub async fn analyze_uploaded_asset(&self, asset: &DiagnosticAsset) -> String {
        let request = GenerateRequest {
            model: self.text_model.clone(),
            system_instruction: None,
            contents: vec![Content::user(vec![
                Part::text(prompts::ASSET_ANALYSIS_PROMPT),
                Part::inline(&asset.mime_type, asset.base64_payload()),
            ])],
            config: None,
        };

        match self.text(request).await {
            Ok(text) => text.unwrap_or_else(|| "Could not interpret asset.".to_string()),
            Err(e) => {
                tracing::error!(asset = %asset.name, error = %e, "Asset analysis failed");
                "Error analyzing asset.".to_string()
            }
        }
    }

    /// Author a new case from a free-text description
    pub async fn create_custom_case(
        &self,
        description: &str,
        assets: Vec<DiagnosticAsset>,
    ) -> Result<ClinicalCase, SimError> {
        let request = GenerateRequest::prompt(
            &self.text_model,
            prompts::custom_case_prompt(description),
        )
        .with_config(GenerationConfig::json(None));

        let raw = self
            .text(request)
            .await
            .map_err(|e| SimError::Model(e.to_string()))?
            .unwrap_or_else(|| "{}".to_string());

        let mut case: ClinicalCase = parse_json(&raw).map_err(|e| {
            tracing::warn!(error = %e, "Generated case did not parse");
            SimError::Model("Failed to create case".to_string())
        })?;

        case.id = format!("custom-{}", chrono::Utc::now().timestamp_millis());
        if case.avatar_url.is_empty() {
            case.avatar_url = DEFAULT_AVATAR_URL.to_string();
        }
        case.assets = assets;
        Ok(case)
    }

    pub async fn generate_clinical_case(
        &self,
        role: Role,
        difficulty: Difficulty,
        category: CaseCategory,
    ) -> Result<ClinicalCase, SimError> {
        let category = serde_json::to_value(category)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let description = format!(
            "Generate a {:?} {} case for a {:?}",
            difficulty, category, role
        );
        self.create_custom_case(&description, Vec::new()).await
    }
}
