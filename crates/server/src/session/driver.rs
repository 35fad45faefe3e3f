//! Autopilot turn driver.
//!
//! One driver task per session at most. The loop takes a turn whenever the
//! guard holds and exits as soon as it does not; any later event that makes
//! a turn due again (a manual reply, re-enabling autopilot) starts a new
//! driver through [`kick`].

use clinsim_core::{ActionKind, AutoPilotAction, MessageSender, SimError};

use super::ops;
use super::state::TurnTicket;
use super::SessionHandle;
use crate::ai::PatientSimulator;

/// Default upper bound on autopilot turns per activation
pub const DEFAULT_MAX_TURNS: u32 = 40;

/// Start a driver if a turn is due and none is running
pub async fn kick(handle: &SessionHandle, simulator: &PatientSimulator, max_turns: u32) {
    let claimed = handle.lock().await.claim_driver();
    if claimed {
        tokio::spawn(run(handle.clone(), simulator.clone(), max_turns));
    }
}

/// Drive autopilot turns until the guard no longer holds.
///
/// Callers must have claimed the driver slot first.
pub async fn run(handle: SessionHandle, simulator: PatientSimulator, max_turns: u32) {
    loop {
        let ticket = handle.lock().await.begin_autopilot_turn(max_turns);
        let Some(ticket) = ticket else {
            tracing::debug!("Autopilot driver idle");
            return;
        };

        let action = match simulator.autopilot_action(&ticket.case, &ticket.history).await {
            Ok(action) => action,
            Err(e) => {
                handle
                    .lock()
                    .await
                    .fail_autopilot_turn(ticket.generation, &e.to_string());
                continue;
            }
        };

        metrics::counter!("autopilot_turns_total", "action" => action.kind.as_str())
            .increment(1);
        tracing::info!(
            action = action.kind.as_str(),
            reasoning = %action.reasoning,
            "Autopilot decided"
        );

        match apply(&handle, &simulator, &ticket, &action).await {
            Ok(()) => handle.lock().await.end_turn(),
            Err(SimError::Inactive) => {}
            Err(e) => handle
                .lock()
                .await
                .fail_autopilot_turn(ticket.generation, &e.to_string()),
        }
    }
}

async fn apply(
    handle: &SessionHandle,
    simulator: &PatientSimulator,
    ticket: &TurnTicket,
    action: &AutoPilotAction,
) -> Result<(), SimError> {
    match action.kind {
        ActionKind::Message => {
            let message = {
                let mut state = handle.lock().await;
                state.resolve_turn(ticket)?;
                state.begin_message(&action.content, MessageSender::AutoPilot)?
            };
            ops::complete_message(handle, simulator, message).await;
            Ok(())
        }
        ActionKind::Order => {
            let order = {
                let mut state = handle.lock().await;
                state.resolve_turn(ticket)?;
                state.begin_order(&action.content)?
            };
            ops::complete_order(handle, simulator, order).await
        }
        ActionKind::Diagnosis => {
            let mut state = handle.lock().await;
            state.resolve_turn(ticket)?;
            state.conclude(action);
            Ok(())
        }
    }
}
