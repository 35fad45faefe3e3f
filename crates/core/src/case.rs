//! Clinical case definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Novice,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// How the patient persona should behave at this difficulty
    pub fn historian_instruction(&self) -> &'static str {
        match self {
            Difficulty::Novice => "You are a 'Straightforward Historian'. Answer clearly.",
            Difficulty::Intermediate => "You are a 'Realistic Historian'. Normal anxiety.",
            Difficulty::Advanced => {
                "You are a 'Difficult Historian'. Vague, anxious, or contradictory."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CaseCategory {
    Cardiology,
    Respiratory,
    Gastroenterology,
    Neurology,
    Trauma,
    Pediatrics,
    Endocrinology,
    Psychiatry,
    #[serde(rename = "Infectious Disease")]
    InfectiousDisease,
    Dermatology,
    Rheumatology,
}

/// Clinical role the learner plays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Doctor,
    Nurse,
    Paramedic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Institution,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    pub bp: String,
    pub hr: u32,
    pub rr: u32,
    pub temp: f32,
    pub o2: u32,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            bp: "120/80".to_string(),
            hr: 80,
            rr: 16,
            temp: 37.0,
            o2: 98,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssetType {
    Image,
    Document,
    Lab,
}

/// A pre-authored diagnostic result attached to a case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticAsset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetType,
    /// Base64 data URL or plain URL
    pub url: String,
    /// Text result reported when the asset is ordered
    pub description: String,
    pub mime_type: String,
}

impl DiagnosticAsset {
    /// Whether an ordered test refers to this asset. Either name may contain
    /// the other, compared case-insensitively. Blank names never match.
    pub fn matches_order(&self, test_name: &str) -> bool {
        let asset = self.name.trim().to_lowercase();
        let order = test_name.trim().to_lowercase();
        if asset.is_empty() || order.is_empty() {
            return false;
        }
        asset.contains(&order) || order.contains(&asset)
    }

    /// Raw base64 payload, with any `data:<mime>;base64,` prefix removed
    pub fn base64_payload(&self) -> &str {
        match self.url.split_once(',') {
            Some((_, data)) if !data.is_empty() => data,
            _ => &self.url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalCase {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    pub patient_name: String,
    pub age: u32,
    pub gender: String,
    pub chief_complaint: String,
    pub difficulty: Difficulty,
    pub category: CaseCategory,
    pub role: Role,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub initial_vitals: Vitals,
    /// Persona prompt for the patient
    pub system_instruction: String,
    /// Ground truth, never shown to the learner
    pub diagnosis: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assets: Vec<DiagnosticAsset>,
}

impl ClinicalCase {
    /// First attached asset matching the ordered test
    pub fn find_asset(&self, test_name: &str) -> Option<&DiagnosticAsset> {
        self.assets.iter().find(|a| a.matches_order(test_name))
    }
}
