//! Per-session state machine.
//!
//! All transitions are synchronous. Operations that need the model are split
//! into `begin_*` (guard, mark the request outstanding, snapshot inputs) and
//! `finish_*` (apply the result), so the session lock is never held across a
//! model call. Results carrying a stale generation are dropped.

use chrono::{DateTime, Utc};
use clinsim_core::{
    AutoPilotAction, ClinicalCase, Message, MessageSender, MessageType, SimError,
    SimulationScore, Transcript,
};
use serde::Serialize;
use uuid::Uuid;

use crate::ai::{AiError, LabResult, PatientChat, ProtocolFile};

pub const LOADING_INIT: &str = "Initializing patient simulation...";
pub const LOADING_PATIENT: &str = "Patient typing...";
pub const LOADING_AUTOPILOT: &str = "AI Doctor is thinking...";
pub const LOADING_INTERPRET: &str = "AI Doctor is thinking about findings...";
pub const LOADING_EVALUATION: &str = "Expert AI is reasoning about your performance...";

pub const CONNECTION_LOST: &str = "Connection lost.";
pub const AUTOPILOT_ERROR_NOTICE: &str = "Auto-Pilot stopped due to an error.";

/// Minimum handover note length unless the handover is skipped
pub const MIN_HANDOVER_CHARS: usize = 5;

const IMAGING_COST: u32 = 1200;
const LAB_COST: u32 = 150;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Active,
    Handover,
    Scored,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::NotStarted => "not started",
            Phase::Active => "active",
            Phase::Handover => "in handover",
            Phase::Scored => "scored",
        }
    }
}

/// Autopilot turn progress
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    WaitingOnModel,
    Applying,
}

/// Simulated price of a diagnostic order
pub fn order_cost(test_name: &str) -> u32 {
    let lower = test_name.to_lowercase();
    if lower.contains("ct") || lower.contains("mri") {
        IMAGING_COST
    } else {
        LAB_COST
    }
}

/// Outstanding patient message
#[derive(Debug)]
pub struct MessageTicket {
    pub generation: u64,
    pub chat: PatientChat,
    pub text: String,
}

/// Outstanding diagnostic order
#[derive(Debug)]
pub struct OrderTicket {
    pub generation: u64,
    pub case: ClinicalCase,
    pub test_name: String,
}

/// Lab result waiting to be fed back into the patient conversation
#[derive(Debug)]
pub struct SubmitTicket {
    pub generation: u64,
    pub chat: PatientChat,
    pub result_text: String,
}

/// Outstanding autopilot decision
#[derive(Debug)]
pub struct TurnTicket {
    pub generation: u64,
    pub case: ClinicalCase,
    pub history: String,
}

#[derive(Debug)]
pub struct EvaluationTicket {
    pub generation: u64,
    pub case: ClinicalCase,
    pub transcript: Transcript,
    pub handover_note: String,
    pub protocol: Option<ProtocolFile>,
}

pub struct SessionState {
    id: Uuid,
    case: ClinicalCase,
    protocol: Option<ProtocolFile>,
    chat: PatientChat,
    transcript: Transcript,
    phase: Phase,
    is_session_active: bool,
    is_autopilot_running: bool,
    loading_message: Option<String>,
    is_lab_processing: bool,
    turn_state: TurnState,
    driver_running: bool,
    autopilot_turns: u32,
    session_cost: u32,
    handover_note: String,
    score: Option<SimulationScore>,
    notice: Option<String>,
    generation: u64,
    started_at: DateTime<Utc>,
}

/// Read-only view returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub case_id: String,
    pub patient_name: String,
    pub phase: Phase,
    pub is_session_active: bool,
    pub is_auto_pilot_running: bool,
    pub loading_message: Option<String>,
    pub is_lab_processing: bool,
    pub turn_state: TurnState,
    pub session_cost: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub handover_note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<SimulationScore>,
    pub started_at: DateTime<Utc>,
    pub transcript: Transcript,
}

impl SessionState {
    /// A session waiting for the patient's opening line
    pub fn new(id: Uuid, case: ClinicalCase, protocol: Option<ProtocolFile>) -> Self {
        Self {
            id,
            chat: PatientChat::new(&case),
            case,
            protocol,
            transcript: Transcript::new(),
            phase: Phase::NotStarted,
            is_session_active: false,
            is_autopilot_running: false,
            loading_message: Some(LOADING_INIT.to_string()),
            is_lab_processing: false,
            turn_state: TurnState::Idle,
            driver_running: false,
            autopilot_turns: 0,
            session_cost: 0,
            handover_note: String::new(),
            score: None,
            notice: None,
            generation: 0,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn case(&self) -> &ClinicalCase {
        &self.case
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_session_active(&self) -> bool {
        self.is_session_active
    }

    pub fn is_autopilot_running(&self) -> bool {
        self.is_autopilot_running
    }

    pub fn loading_message(&self) -> Option<&str> {
        self.loading_message.as_deref()
    }

    pub fn is_lab_processing(&self) -> bool {
        self.is_lab_processing
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    pub fn session_cost(&self) -> u32 {
        self.session_cost
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn score(&self) -> Option<&SimulationScore> {
        self.score.as_ref()
    }

    /// No model call outstanding and no autopilot driving the session
    pub fn is_quiescent(&self) -> bool {
        self.loading_message.is_none() && !self.is_lab_processing && !self.is_autopilot_running
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            case_id: self.case.id.clone(),
            patient_name: self.case.patient_name.clone(),
            phase: self.phase,
            is_session_active: self.is_session_active,
            is_auto_pilot_running: self.is_autopilot_running,
            loading_message: self.loading_message.clone(),
            is_lab_processing: self.is_lab_processing,
            turn_state: self.turn_state,
            session_cost: self.session_cost,
            notice: self.notice.clone(),
            handover_note: self.handover_note.clone(),
            score: self.score.clone(),
            started_at: self.started_at,
            transcript: self.transcript.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// NotStarted -> Active, with the patient's opening line. Fails if the
    /// session was ended while the opening line was generated.
    pub fn activate(
        &mut self,
        generation: u64,
        chat: PatientChat,
        opening: String,
    ) -> Result<(), SimError> {
        if generation != self.generation {
            return Err(SimError::Inactive);
        }
        if self.phase != Phase::NotStarted {
            return Err(self.invalid("start"));
        }
        self.chat = chat;
        self.transcript
            .push(Message::new(MessageSender::Patient, opening));
        self.phase = Phase::Active;
        self.is_session_active = true;
        self.loading_message = None;
        Ok(())
    }

    /// Active -> Handover. Autopilot is switched off.
    pub fn begin_handover(&mut self) -> Result<(), SimError> {
        if self.phase != Phase::Active {
            return Err(self.invalid("hand over"));
        }
        self.ensure_idle()?;
        self.is_autopilot_running = false;
        self.phase = Phase::Handover;
        Ok(())
    }

    /// Handover -> Active
    pub fn resume(&mut self) -> Result<(), SimError> {
        if self.phase != Phase::Handover {
            return Err(self.invalid("resume"));
        }
        self.phase = Phase::Active;
        Ok(())
    }

    pub fn begin_evaluation(
        &mut self,
        handover_note: &str,
        skip_handover: bool,
    ) -> Result<EvaluationTicket, SimError> {
        if self.phase != Phase::Handover {
            return Err(self.invalid("evaluate"));
        }
        self.ensure_idle()?;
        if !skip_handover && handover_note.trim().chars().count() < MIN_HANDOVER_CHARS {
            return Err(SimError::HandoverTooShort {
                min: MIN_HANDOVER_CHARS,
            });
        }

        self.handover_note = handover_note.to_string();
        self.is_session_active = false;
        self.loading_message = Some(LOADING_EVALUATION.to_string());

        Ok(EvaluationTicket {
            generation: self.generation,
            case: self.case.clone(),
            transcript: self.transcript.clone(),
            handover_note: self.handover_note.clone(),
            protocol: self.protocol.clone(),
        })
    }

    /// Handover -> Scored. Returns `false` if the result is stale.
    pub fn finish_evaluation(&mut self, generation: u64, score: SimulationScore) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading_message = None;
        self.score = Some(score);
        self.phase = Phase::Scored;
        true
    }

    /// Discard the session. Anything still in flight is ignored when it
    /// returns.
    pub fn end(&mut self) {
        self.generation += 1;
        self.phase = Phase::NotStarted;
        self.is_session_active = false;
        self.is_autopilot_running = false;
        self.loading_message = None;
        self.is_lab_processing = false;
        self.turn_state = TurnState::Idle;
    }

    // ------------------------------------------------------------------
    // Shared pathways (manual play and autopilot)
    // ------------------------------------------------------------------

    /// Append the clinician's message and mark the patient reply outstanding
    pub fn begin_message(
        &mut self,
        text: &str,
        sender: MessageSender,
    ) -> Result<MessageTicket, SimError> {
        self.ensure_playable()?;
        self.ensure_idle()?;

        self.transcript.push(Message::new(sender, text));
        self.loading_message = Some(LOADING_PATIENT.to_string());

        Ok(MessageTicket {
            generation: self.generation,
            chat: self.chat.clone(),
            text: text.to_string(),
        })
    }

    /// Append the patient's reply, or a connection notice if it failed
    pub fn finish_message(&mut self, ticket: &MessageTicket, reply: Result<String, AiError>) {
        if ticket.generation != self.generation {
            tracing::debug!(session_id = %self.id, "Dropping stale patient reply");
            return;
        }
        match reply {
            Ok(reply) => {
                self.chat.record(&ticket.text, &reply);
                self.transcript
                    .push(Message::new(MessageSender::Patient, reply));
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Patient reply failed");
                self.transcript
                    .push(Message::new(MessageSender::System, CONNECTION_LOST));
            }
        }
        self.loading_message = None;
    }

    /// Bill the order, announce it and mark the lab busy
    pub fn begin_order(&mut self, test_name: &str) -> Result<OrderTicket, SimError> {
        self.ensure_playable()?;
        self.ensure_idle()?;
        let test_name = test_name.trim();
        if test_name.is_empty() {
            return Err(SimError::InvalidInput("Test name is required".to_string()));
        }

        self.session_cost += order_cost(test_name);
        let sender = if self.is_autopilot_running {
            MessageSender::AutoPilot
        } else {
            MessageSender::User
        };
        self.transcript
            .push(Message::new(sender, format!("Ordering {}...", test_name)));
        self.is_lab_processing = true;

        Ok(OrderTicket {
            generation: self.generation,
            case: self.case.clone(),
            test_name: test_name.to_string(),
        })
    }

    /// Append the lab result. The lab stays busy until the result has been
    /// shared with the patient conversation.
    pub fn finish_order(&mut self, ticket: &OrderTicket, lab: LabResult) -> Option<SubmitTicket> {
        if ticket.generation != self.generation {
            tracing::debug!(session_id = %self.id, "Dropping stale lab result");
            return None;
        }
        self.transcript.push(
            Message::new(MessageSender::System, lab.text.clone())
                .with_kind(MessageType::LabResult)
                .with_image(lab.image_url),
        );

        Some(SubmitTicket {
            generation: self.generation,
            chat: self.chat.clone(),
            result_text: format!(
                "Diagnostic Test: {}\nResult: {}",
                ticket.test_name, lab.text
            ),
        })
    }

    pub fn finish_submit(
        &mut self,
        ticket: &SubmitTicket,
        result: Result<(String, String), AiError>,
    ) -> Result<(), SimError> {
        if ticket.generation != self.generation {
            return Ok(());
        }
        self.is_lab_processing = false;
        let (message, reply) = result.map_err(|e| SimError::Model(e.to_string()))?;
        self.chat.record(&message, &reply);
        Ok(())
    }

    pub fn begin_interpretation(&mut self) -> Result<u64, SimError> {
        self.ensure_playable()?;
        self.ensure_idle()?;
        self.loading_message = Some(LOADING_INTERPRET.to_string());
        Ok(self.generation)
    }

    pub fn finish_interpretation(
        &mut self,
        generation: u64,
        analysis: Result<String, AiError>,
    ) -> Result<(), SimError> {
        if generation != self.generation {
            return Ok(());
        }
        self.loading_message = None;
        let analysis = analysis.map_err(|e| SimError::Model(e.to_string()))?;
        self.transcript.push(
            Message::new(MessageSender::System, analysis).with_kind(MessageType::Interpretation),
        );
        Ok(())
    }

    /// Case and transcript text for the tutor
    pub fn consult(&self) -> Result<(ClinicalCase, String), SimError> {
        if self.phase == Phase::NotStarted {
            return Err(self.invalid("consult"));
        }
        Ok((self.case.clone(), self.transcript.history_text()))
    }

    /// Record the learner's reflection on a scored session. Returns the
    /// generation and the transcript text preceding the reflection.
    pub fn begin_reflection(&mut self, text: &str) -> Result<(u64, String), SimError> {
        if self.phase != Phase::Scored {
            return Err(self.invalid("reflect"));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SimError::InvalidInput("Reflection text is required".to_string()));
        }
        let history = self.transcript.history_text();
        self.transcript.push(
            Message::new(MessageSender::User, text).with_kind(MessageType::Reflection),
        );
        Ok((self.generation, history))
    }

    pub fn append_reflection(&mut self, generation: u64, question: &str) {
        if generation != self.generation {
            return;
        }
        self.transcript.push(
            Message::new(MessageSender::Mentor, question).with_kind(MessageType::Reflection),
        );
    }

    // ------------------------------------------------------------------
    // Autopilot
    // ------------------------------------------------------------------

    /// Switch autopilot on or off. Returns whether the caller should start
    /// a driver.
    pub fn set_autopilot(&mut self, enabled: bool) -> Result<bool, SimError> {
        if !enabled {
            self.is_autopilot_running = false;
            return Ok(false);
        }
        self.ensure_playable()?;
        self.is_autopilot_running = true;
        self.autopilot_turns = 0;
        self.notice = None;
        Ok(self.claim_driver())
    }

    /// It is the clinician's turn and nothing is outstanding
    pub fn should_take_turn(&self) -> bool {
        if !self.is_autopilot_running || !self.is_session_active || self.phase != Phase::Active {
            return false;
        }
        if self.loading_message.is_some() || self.is_lab_processing {
            return false;
        }
        match self.transcript.last() {
            None => true,
            Some(last) => matches!(last.sender, MessageSender::Patient | MessageSender::System),
        }
    }

    /// Reserve the single driver slot if a turn is due
    pub fn claim_driver(&mut self) -> bool {
        if self.driver_running || !self.should_take_turn() {
            return false;
        }
        self.driver_running = true;
        true
    }

    /// Idle -> WaitingOnModel. `None` releases the driver slot: either no
    /// turn is due or the turn budget is spent.
    pub fn begin_autopilot_turn(&mut self, max_turns: u32) -> Option<TurnTicket> {
        if !self.should_take_turn() {
            self.driver_running = false;
            return None;
        }
        if self.autopilot_turns >= max_turns {
            tracing::warn!(session_id = %self.id, max_turns, "Autopilot turn budget exhausted");
            self.is_autopilot_running = false;
            self.notice = Some(format!("Auto-Pilot stopped after {} turns.", max_turns));
            self.driver_running = false;
            return None;
        }

        self.autopilot_turns += 1;
        self.loading_message = Some(LOADING_AUTOPILOT.to_string());
        self.turn_state = TurnState::WaitingOnModel;

        Some(TurnTicket {
            generation: self.generation,
            case: self.case.clone(),
            history: self.transcript.history_text(),
        })
    }

    /// WaitingOnModel -> Applying
    pub fn resolve_turn(&mut self, ticket: &TurnTicket) -> Result<(), SimError> {
        if ticket.generation != self.generation {
            return Err(SimError::Inactive);
        }
        self.loading_message = None;
        self.turn_state = TurnState::Applying;
        Ok(())
    }

    /// Terminal transition: record the diagnosis and stop the encounter
    pub fn conclude(&mut self, action: &AutoPilotAction) {
        self.transcript
            .push(Message::new(MessageSender::AutoPilot, action.diagnosis_text()));
        self.is_autopilot_running = false;
        self.is_session_active = false;
        self.turn_state = TurnState::Idle;
    }

    /// Applying -> Idle
    pub fn end_turn(&mut self) {
        self.turn_state = TurnState::Idle;
    }

    /// Error path: autopilot off, user notified, nothing appended
    pub fn fail_autopilot_turn(&mut self, generation: u64, error: &str) {
        if generation != self.generation {
            return;
        }
        tracing::error!(session_id = %self.id, error, "Autopilot turn failed");
        self.is_autopilot_running = false;
        self.loading_message = None;
        self.is_lab_processing = false;
        self.turn_state = TurnState::Idle;
        self.notice = Some(AUTOPILOT_ERROR_NOTICE.to_string());
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    fn invalid(&self, action: &str) -> SimError {
        SimError::InvalidTransition {
            phase: self.phase.name().to_string(),
            action: action.to_string(),
        }
    }

    fn ensure_playable(&self) -> Result<(), SimError> {
        if self.phase != Phase::Active {
            return Err(self.invalid("play"));
        }
        if !self.is_session_active {
            return Err(SimError::Inactive);
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), SimError> {
        if let Some(loading) = &self.loading_message {
            return Err(SimError::Busy(loading.clone()));
        }
        if self.is_lab_processing {
            return Err(SimError::Busy("Lab processing".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinsim_core::{ActionKind, CaseCatalog};

    fn active_session() -> SessionState {
        let case = CaseCatalog::builtin().get("cardio-001").unwrap().clone();
        let chat = PatientChat::new(&case);
        let mut state = SessionState::new(Uuid::new_v4(), case, None);
        state.activate(0, chat, "chest pain".to_string()).unwrap();
        state
    }

    fn action(kind: ActionKind, content: &str) -> AutoPilotAction {
        AutoPilotAction {
            kind,
            content: content.to_string(),
            reasoning: "because".to_string(),
        }
    }

    fn lab(text: &str) -> LabResult {
        LabResult {
            text: text.to_string(),
            image_url: None,
        }
    }

    #[test]
    fn new_session_is_loading_until_activated() {
        let case = CaseCatalog::builtin().get("cardio-001").unwrap().clone();
        let state = SessionState::new(Uuid::new_v4(), case, None);

        assert_eq!(state.phase(), Phase::NotStarted);
        assert_eq!(state.loading_message(), Some(LOADING_INIT));
        assert!(!state.is_session_active());
    }

    #[test]
    fn activation_appends_opening_line() {
        let state = active_session();
        assert_eq!(state.phase(), Phase::Active);
        assert!(state.is_session_active());
        assert_eq!(state.transcript().len(), 1);
        assert_eq!(state.transcript().last().unwrap().sender, MessageSender::Patient);
        assert!(state.loading_message().is_none());
    }

    #[test]
    fn second_message_while_waiting_is_busy() {
        let mut state = active_session();
        state.begin_message("Where is the pain?", MessageSender::User).unwrap();

        let err = state
            .begin_message("Hello?", MessageSender::User)
            .unwrap_err();
        assert!(matches!(err, SimError::Busy(_)));
        assert_eq!(state.transcript().len(), 2);
    }

    #[test]
    fn failed_reply_appends_connection_notice() {
        let mut state = active_session();
        let ticket = state.begin_message("Any nausea?", MessageSender::User).unwrap();
        state.finish_message(&ticket, Err(AiError::Http("reset".into())));

        let last = state.transcript().last().unwrap();
        assert_eq!(last.sender, MessageSender::System);
        assert_eq!(last.text, CONNECTION_LOST);
        assert!(state.loading_message().is_none());
    }

    #[test]
    fn order_bills_and_holds_lab_until_submitted() {
        let mut state = active_session();
        let ticket = state.begin_order("CT Abdomen").unwrap();
        assert_eq!(state.session_cost(), 1200);
        assert!(state.is_lab_processing());
        assert_eq!(state.transcript().last().unwrap().text, "Ordering CT Abdomen...");
        assert_eq!(state.transcript().last().unwrap().sender, MessageSender::User);

        let submit = state.finish_order(&ticket, lab("No free air")).unwrap();
        let last = state.transcript().last().unwrap();
        assert_eq!(last.kind, Some(MessageType::LabResult));
        assert!(state.is_lab_processing());
        assert_eq!(submit.result_text, "Diagnostic Test: CT Abdomen\nResult: No free air");

        state
            .finish_submit(&submit, Ok(("[SYSTEM] ...".into(), "ok".into())))
            .unwrap();
        assert!(!state.is_lab_processing());

        state.begin_order("CBC").unwrap();
        assert_eq!(state.session_cost(), 1350);
    }

    #[test]
    fn turn_is_due_only_after_patient_or_system() {
        let mut state = active_session();
        assert!(!state.should_take_turn());

        state.set_autopilot(true).unwrap();
        assert!(state.should_take_turn());

        let ticket = state.begin_message("Tell me more", MessageSender::User).unwrap();
        assert!(!state.should_take_turn());
        state.finish_message(&ticket, Ok("It hurts".into()));
        assert!(state.should_take_turn());
    }

    #[test]
    fn at_most_one_turn_is_outstanding() {
        let mut state = active_session();
        assert!(state.set_autopilot(true).unwrap());
        assert!(!state.claim_driver());

        let ticket = state.begin_autopilot_turn(10);
        assert!(ticket.is_some());
        assert_eq!(state.turn_state(), TurnState::WaitingOnModel);
        assert_eq!(state.loading_message(), Some(LOADING_AUTOPILOT));

        // the guard now fails, so a second begin releases the slot instead
        assert!(state.begin_autopilot_turn(10).is_none());
    }

    #[test]
    fn message_action_appends_autopilot_entry() {
        let mut state = active_session();
        state.set_autopilot(true).unwrap();
        let ticket = state.begin_autopilot_turn(10).unwrap();
        assert_eq!(ticket.history, "[PATIENT]: chest pain");

        state.resolve_turn(&ticket).unwrap();
        state
            .begin_message("Describe the pain", MessageSender::AutoPilot)
            .unwrap();

        assert_eq!(state.transcript().len(), 2);
        let last = state.transcript().last().unwrap();
        assert_eq!(last.sender, MessageSender::AutoPilot);
        assert_eq!(last.text, "Describe the pain");
    }

    #[test]
    fn autopilot_order_is_attributed_to_autopilot() {
        let mut state = active_session();
        state.set_autopilot(true).unwrap();
        let turn = state.begin_autopilot_turn(10).unwrap();
        state.resolve_turn(&turn).unwrap();

        let order = state.begin_order("Troponin").unwrap();
        assert_eq!(state.transcript().last().unwrap().sender, MessageSender::AutoPilot);
        assert!(!state.should_take_turn());

        state.finish_order(&order, lab("Troponin I 4.2 ng/mL (H)"));
        assert_eq!(state.transcript().last().unwrap().sender, MessageSender::System);
    }

    #[test]
    fn diagnosis_is_terminal() {
        let mut state = active_session();
        state.set_autopilot(true).unwrap();
        let ticket = state.begin_autopilot_turn(10).unwrap();
        state.resolve_turn(&ticket).unwrap();
        state.conclude(&action(ActionKind::Diagnosis, "STEMI"));

        assert!(!state.is_session_active());
        assert!(!state.is_autopilot_running());
        assert!(
            state
                .transcript()
                .last()
                .unwrap()
                .text
                .starts_with("**FINAL DIAGNOSIS:** STEMI")
        );
        assert!(matches!(
            state.begin_message("hi", MessageSender::User),
            Err(SimError::Inactive)
        ));
        // the learner can still hand over and be scored
        state.begin_handover().unwrap();
    }

    #[test]
    fn failed_turn_disables_autopilot_without_appending() {
        let mut state = active_session();
        state.set_autopilot(true).unwrap();
        let ticket = state.begin_autopilot_turn(10).unwrap();
        state.fail_autopilot_turn(ticket.generation, "boom");

        assert!(!state.is_autopilot_running());
        assert_eq!(state.transcript().len(), 1);
        assert_eq!(state.notice(), Some(AUTOPILOT_ERROR_NOTICE));
        assert!(state.loading_message().is_none());
        assert!(state.begin_autopilot_turn(10).is_none());
    }

    #[test]
    fn turn_budget_stops_autopilot() {
        let mut state = active_session();
        state.set_autopilot(true).unwrap();
        assert!(state.begin_autopilot_turn(0).is_none());
        assert!(!state.is_autopilot_running());
        assert!(state.notice().unwrap().contains("0 turns"));
    }

    #[test]
    fn ended_session_ignores_late_results() {
        let mut state = active_session();
        let ticket = state.begin_message("Still there?", MessageSender::User).unwrap();
        state.end();
        state.finish_message(&ticket, Ok("yes".into()));

        assert_eq!(state.transcript().len(), 2);
        assert_eq!(state.phase(), Phase::NotStarted);
    }

    #[test]
    fn handover_requires_note_unless_skipped() {
        let mut state = active_session();
        state.set_autopilot(true).unwrap();
        state.begin_handover().unwrap();
        assert!(!state.is_autopilot_running());

        let err = state.begin_evaluation("ok", false).unwrap_err();
        assert!(matches!(err, SimError::HandoverTooShort { .. }));

        let ticket = state.begin_evaluation("", true).unwrap();
        assert!(!state.is_session_active());
        assert_eq!(state.loading_message(), Some(LOADING_EVALUATION));

        assert!(state.finish_evaluation(ticket.generation, SimulationScore::default()));
        assert_eq!(state.phase(), Phase::Scored);
        assert!(state.score().is_some());
    }

    #[test]
    fn evaluation_only_from_handover() {
        let mut state = active_session();
        let err = state.begin_evaluation("Situation: chest pain", false).unwrap_err();
        assert!(matches!(err, SimError::InvalidTransition { .. }));

        state.begin_handover().unwrap();
        state.resume().unwrap();
        assert_eq!(state.phase(), Phase::Active);
    }

    #[test]
    fn interpretation_is_appended_as_system_message() {
        let mut state = active_session();
        let generation = state.begin_interpretation().unwrap();
        assert!(matches!(
            state.begin_order("CBC"),
            Err(SimError::Busy(_))
        ));
        state
            .finish_interpretation(generation, Ok("Marked troponin rise".into()))
            .unwrap();

        let last = state.transcript().last().unwrap();
        assert_eq!(last.kind, Some(MessageType::Interpretation));
        assert!(state.loading_message().is_none());
    }

    fn scored_session() -> SessionState {
        let mut state = active_session();
        state.begin_handover().unwrap();
        let ticket = state.begin_evaluation("", true).unwrap();
        state.finish_evaluation(ticket.generation, SimulationScore::default());
        state
    }

    #[test]
    fn reflection_waits_for_scoring() {
        let mut state = active_session();
        let err = state.begin_reflection("I missed the ECG").unwrap_err();
        assert!(matches!(err, SimError::InvalidTransition { .. }));
        assert_eq!(state.transcript().len(), 1);

        // autopilot still gets its turn afterwards
        assert!(state.set_autopilot(true).unwrap());
        assert!(state.should_take_turn());
    }

    #[test]
    fn reflection_records_learner_text_then_mentor_question() {
        let mut state = scored_session();
        let (generation, history) = state.begin_reflection("  I ordered too late  ").unwrap();
        assert_eq!(history, "[PATIENT]: chest pain");

        let learner = state.transcript().last().unwrap();
        assert_eq!(learner.sender, MessageSender::User);
        assert_eq!(learner.kind, Some(MessageType::Reflection));
        assert_eq!(learner.text, "I ordered too late");

        state.append_reflection(generation, "What would you order first next time?");
        let mentor = state.transcript().last().unwrap();
        assert_eq!(mentor.sender, MessageSender::Mentor);
        assert_eq!(state.transcript().len(), 3);

        assert!(matches!(
            state.begin_reflection(" "),
            Err(SimError::InvalidInput(_))
        ));
        assert!(matches!(state.set_autopilot(true), Err(SimError::InvalidTransition { .. })));
    }

    #[test]
    fn blank_order_is_rejected() {
        let mut state = active_session();
        assert!(matches!(state.begin_order("   "), Err(SimError::InvalidInput(_))));
        assert_eq!(state.session_cost(), 0);
        assert!(!state.is_lab_processing());
        assert_eq!(state.transcript().len(), 1);
    }

    #[test]
    fn interpretation_needs_live_encounter() {
        let mut state = active_session();
        state.set_autopilot(true).unwrap();
        let ticket = state.begin_autopilot_turn(10).unwrap();
        state.resolve_turn(&ticket).unwrap();
        state.conclude(&action(ActionKind::Diagnosis, "STEMI"));

        assert!(matches!(state.begin_interpretation(), Err(SimError::Inactive)));
        assert!(state.loading_message().is_none());
    }

    #[test]
    fn cost_depends_on_modality() {
        assert_eq!(order_cost("MRI Brain"), 1200);
        assert_eq!(order_cost("ct chest"), 1200);
        assert_eq!(order_cost("CBC"), 150);
    }
}
