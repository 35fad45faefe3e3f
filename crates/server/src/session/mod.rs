//! Simulation sessions: lifecycle state, shared play pathways and the
//! autopilot driver

pub mod driver;
pub mod ops;
pub mod registry;
pub mod state;

use std::sync::Arc;
use tokio::sync::Mutex;

pub use registry::SessionRegistry;
pub use state::{Phase, SessionState, SessionView, TurnState};

/// Shared, lockable session. The lock is never held across a model call.
pub type SessionHandle = Arc<Mutex<SessionState>>;
