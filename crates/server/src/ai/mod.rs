//! AI features powered by the Gemini API

pub mod client;
pub mod json;
pub mod prompts;
pub mod simulator;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AiError, GeminiClient, GenerativeModel};
pub use simulator::{LabResult, PatientChat, PatientSimulator, ProtocolFile};
