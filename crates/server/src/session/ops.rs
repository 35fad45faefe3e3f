//! Pathways shared by manual play and the autopilot driver.
//!
//! Each one locks the session to begin, releases the lock for the model
//! call and locks again to apply the result.

use clinsim_core::{MessageSender, SimError};

use super::state::{MessageTicket, OrderTicket};
use super::SessionHandle;
use crate::ai::PatientSimulator;

/// Send a clinician message and wait for the patient's reply
pub async fn send_message(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    text: &str,
    sender: MessageSender,
) -> Result<(), SimError> {
    let ticket = handle.lock().await.begin_message(text, sender)?;
    complete_message(handle, simulator, ticket).await;
    Ok(())
}

pub(crate) async fn complete_message(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    ticket: MessageTicket,
) {
    let reply = simulator.reply(&ticket.chat, &ticket.text).await;
    handle.lock().await.finish_message(&ticket, reply);
}

/// Order a diagnostic test, append its result and share it with the patient
pub async fn order_test(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    test_name: &str,
) -> Result<(), SimError> {
    let ticket = handle.lock().await.begin_order(test_name)?;
    complete_order(handle, simulator, ticket).await
}

pub(crate) async fn complete_order(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    ticket: OrderTicket,
) -> Result<(), SimError> {
    metrics::counter!("lab_orders_total").increment(1);

    let lab = simulator
        .run_diagnostic_test(&ticket.case, &ticket.test_name)
        .await;
    let submit = handle.lock().await.finish_order(&ticket, lab);
    let Some(submit) = submit else {
        return Ok(());
    };

    let result = simulator
        .submit_diagnostic_result(&submit.chat, &submit.result_text)
        .await;
    handle.lock().await.finish_submit(&submit, result)
}

/// Ask the model to interpret the most recent findings
pub async fn interpret(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    result_text: &str,
) -> Result<(), SimError> {
    let generation = handle.lock().await.begin_interpretation()?;
    let analysis = simulator.interpret_result(result_text).await;
    handle
        .lock()
        .await
        .finish_interpretation(generation, analysis)
}

/// Answer a tutor question without touching the transcript
pub async fn ask_tutor(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    question: &str,
) -> Result<String, SimError> {
    let (case, history) = handle.lock().await.consult()?;
    simulator
        .ask_tutor(&case, question, &history)
        .await
        .map_err(|e| SimError::Model(e.to_string()))
}

/// Record the learner's reflection on a scored session and append the
/// mentor's follow-up question
pub async fn reflect(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    text: &str,
) -> Result<String, SimError> {
    let (generation, history) = handle.lock().await.begin_reflection(text)?;
    let question = simulator
        .reflection_prompt(&history, text.trim())
        .await
        .map_err(|e| SimError::Model(e.to_string()))?;
    handle.lock().await.append_reflection(generation, &question);
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedModel;
    use crate::session::state::{CONNECTION_LOST, SessionState};
    use clinsim_core::{CaseCatalog, MessageType, SimulationScore};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    async fn session(simulator: &PatientSimulator) -> SessionHandle {
        let case = CaseCatalog::builtin().get("cardio-001").unwrap().clone();
        let mut state = SessionState::new(Uuid::new_v4(), case.clone(), None);
        let (chat, opening) = simulator.start_session(&case).await;
        state.activate(0, chat, opening).unwrap();
        Arc::new(Mutex::new(state))
    }

    #[tokio::test]
    async fn message_round_trip_appends_reply() {
        let model = ScriptedModel::new(vec![
            Ok("My chest hurts".into()),
            Ok("Like an elephant sitting on it".into()),
        ]);
        let sim = PatientSimulator::new(model.clone());
        let handle = session(&sim).await;

        send_message(&handle, &sim, "Describe the pain", MessageSender::User)
            .await
            .unwrap();

        let state = handle.lock().await;
        assert_eq!(state.transcript().len(), 3);
        assert_eq!(state.transcript().last().unwrap().text, "Like an elephant sitting on it");
        assert!(state.loading_message().is_none());
    }

    #[tokio::test]
    async fn transport_failure_appends_connection_lost() {
        let model = ScriptedModel::new(vec![Ok("Hello doctor".into()), Err("timeout".into())]);
        let sim = PatientSimulator::new(model);
        let handle = session(&sim).await;

        send_message(&handle, &sim, "Any allergies?", MessageSender::User)
            .await
            .unwrap();

        let state = handle.lock().await;
        assert_eq!(state.transcript().last().unwrap().text, CONNECTION_LOST);
    }

    #[tokio::test]
    async fn order_appends_result_and_informs_patient() {
        let model = ScriptedModel::new(vec![
            Ok("Hello doctor".into()),
            Ok("Troponin I: 4.2 ng/mL (High)".into()),
            Ok("Is that bad?".into()),
        ]);
        let sim = PatientSimulator::new(model.clone());
        let handle = session(&sim).await;

        order_test(&handle, &sim, "Troponin").await.unwrap();

        let state = handle.lock().await;
        let lab = state.transcript().last().unwrap();
        assert_eq!(lab.kind, Some(MessageType::LabResult));
        assert_eq!(lab.text, "Troponin I: 4.2 ng/mL (High)");
        assert!(!state.is_lab_processing());
        assert_eq!(state.session_cost(), 150);

        let requests = model.requests();
        let last = requests.last().unwrap().contents.last().unwrap().text();
        assert!(last.starts_with("[SYSTEM] Diagnostic Test: Troponin"));
    }

    #[tokio::test]
    async fn reflection_answers_the_learner() {
        let model = ScriptedModel::new(vec![
            Ok("Hello doctor".into()),
            Ok("What made you suspect ACS?".into()),
        ]);
        let sim = PatientSimulator::new(model.clone());
        let handle = session(&sim).await;
        {
            let mut state = handle.lock().await;
            state.begin_handover().unwrap();
            let ticket = state.begin_evaluation("", true).unwrap();
            state.finish_evaluation(ticket.generation, SimulationScore::default());
        }

        let question = reflect(&handle, &sim, "I should have ordered an ECG sooner")
            .await
            .unwrap();
        assert_eq!(question, "What made you suspect ACS?");

        let prompt = model.requests().last().unwrap().contents[0].text();
        assert!(prompt.contains("Student Reflection: I should have ordered an ECG sooner"));

        let state = handle.lock().await;
        let messages = state.transcript().messages();
        let learner = &messages[messages.len() - 2];
        assert_eq!(learner.sender, MessageSender::User);
        assert_eq!(learner.kind, Some(MessageType::Reflection));
        let last = state.transcript().last().unwrap();
        assert_eq!(last.sender, MessageSender::Mentor);
        assert_eq!(last.kind, Some(MessageType::Reflection));
    }

    #[tokio::test]
    async fn reflection_during_encounter_is_rejected() {
        let model = ScriptedModel::new(vec![Ok("Hello doctor".into())]);
        let sim = PatientSimulator::new(model.clone());
        let handle = session(&sim).await;

        let err = reflect(&handle, &sim, "Going well").await.unwrap_err();
        assert!(matches!(err, SimError::InvalidTransition { .. }));
        assert_eq!(model.requests().len(), 1);
        assert_eq!(handle.lock().await.transcript().len(), 1);
    }

    #[tokio::test]
    async fn tutor_leaves_transcript_untouched() {
        let model = ScriptedModel::new(vec![
            Ok("Hello doctor".into()),
            Ok("Consider a 12-lead ECG.".into()),
        ]);
        let sim = PatientSimulator::new(model);
        let handle = session(&sim).await;

        let answer = ask_tutor(&handle, &sim, "What next?").await.unwrap();
        assert_eq!(answer, "Consider a 12-lead ECG.");
        assert_eq!(handle.lock().await.transcript().len(), 1);
    }
}
