//! clinsim-core: Shared clinical simulator types
//!
//! This crate provides the domain types used across the simulator service,
//! including cases, transcripts, autopilot actions, scores and the error
//! body returned by the HTTP API.

pub mod action;
pub mod case;
pub mod catalog;
pub mod error;
pub mod message;
pub mod outcome;
pub mod score;

pub use action::{ActionKind, AutoPilotAction};
pub use case::{
    AssetType, CaseCategory, ClinicalCase, DiagnosticAsset, Difficulty, Role, Visibility, Vitals,
};
pub use catalog::{CaseCatalog, CaseFilter, CaseView};
pub use error::SimError;
pub use message::{Message, MessageSender, MessageType, Transcript};
pub use outcome::{IssueSeverity, IssueType, Outcome, OutcomeIssue};
pub use score::{CostItem, ScoreBook, SimulationScore, TimelineEvent, TimelineRating};
