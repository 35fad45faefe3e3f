//! Case catalog: built-in scenarios plus cases authored at runtime

use serde::Deserialize;

use crate::case::{CaseCategory, ClinicalCase, Difficulty, Role, Visibility, Vitals};

/// Which slice of the catalog a learner is browsing
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaseView {
    /// Everything assigned to the learner
    #[default]
    All,
    /// Cases the learner authored
    Mine,
    /// Institution-scoped (or unscoped) cases
    Institution,
    /// Publicly shared cases
    Public,
}

/// Catalog query; `None` fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseFilter {
    pub role: Option<Role>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<CaseCategory>,
    #[serde(default)]
    pub view: CaseView,
    /// Learner id, used by the `mine` view
    pub author: Option<String>,
}

impl CaseFilter {
    pub fn matches(&self, case: &ClinicalCase) -> bool {
        if self.role.is_some_and(|r| r != case.role) {
            return false;
        }
        if self.difficulty.is_some_and(|d| d != case.difficulty) {
            return false;
        }
        if self.category.is_some_and(|c| c != case.category) {
            return false;
        }

        match self.view {
            CaseView::All => true,
            CaseView::Mine => {
                self.author.is_some() && case.author_id.as_deref() == self.author.as_deref()
            }
            CaseView::Institution => {
                matches!(case.visibility, None | Some(Visibility::Institution))
            }
            CaseView::Public => case.visibility == Some(Visibility::Public),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseCatalog {
    cases: Vec<ClinicalCase>,
}

impl CaseCatalog {
    pub fn new(cases: Vec<ClinicalCase>) -> Self {
        Self { cases }
    }

    /// Catalog seeded with the bundled scenarios
    pub fn builtin() -> Self {
        Self::new(builtin_scenarios())
    }

    pub fn get(&self, id: &str) -> Option<&ClinicalCase> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// Newest cases are listed first
    pub fn add(&mut self, case: ClinicalCase) {
        self.cases.insert(0, case);
    }

    pub fn search(&self, filter: &CaseFilter) -> Vec<&ClinicalCase> {
        self.cases.iter().filter(|c| filter.matches(c)).collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl Default for CaseCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_scenarios() -> Vec<ClinicalCase> {
    vec![
        ClinicalCase {
            id: "cardio-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Arthur Dent".to_string(),
            age: 68,
            gender: "Male".to_string(),
            chief_complaint: "Crushing chest pain".to_string(),
            difficulty: Difficulty::Novice,
            category: CaseCategory::Cardiology,
            role: Role::Doctor,
            description: "A 68-year-old male presenting to the ER with sudden onset substernal \
                          chest pain radiating to the left arm."
                .to_string(),
            avatar_url: "https://picsum.photos/200/200?random=1".to_string(),
            initial_vitals: Vitals {
                bp: "158/92".to_string(),
                hr: 110,
                rr: 22,
                temp: 37.1,
                o2: 96,
            },
            system_instruction: "You are Arthur Dent, 68M.\n\
                Current situation: In ER, scared, clutching chest.\n\
                Symptoms: Crushing central chest pain (8/10), started 45m ago. Radiates to jaw/arm. Nauseous.\n\
                History: Smoker (40yrs), HTN, High Cholesterol.\n\
                Personality: Anxious, breathless sentences.\n\
                Goal: Convey symptoms of a heart attack without saying \"I am having a heart attack\"."
                .to_string(),
            diagnosis: "Acute Myocardial Infarction (STEMI)".to_string(),
            tags: vec!["Acute".to_string(), "Emergency".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "cardio-002".to_string(),
            author_id: None,
            institution_id: None,
            visibility: Some(Visibility::Public),
            patient_name: "Eleanor Vance".to_string(),
            age: 74,
            gender: "Female".to_string(),
            chief_complaint: "Shortness of breath at night".to_string(),
            difficulty: Difficulty::Intermediate,
            category: CaseCategory::Cardiology,
            role: Role::Nurse,
            description: "74-year-old female admitted for observation. Nurse assessment reveals \
                          worsening orthopnea."
                .to_string(),
            avatar_url: "https://picsum.photos/200/200?random=4".to_string(),
            initial_vitals: Vitals {
                bp: "145/85".to_string(),
                hr: 88,
                rr: 20,
                temp: 36.9,
                o2: 93,
            },
            system_instruction: "You are Eleanor Vance, 74F.\n\
                Symptoms: Legs are swollen (\"like tree trunks\"), very tired. Can't sleep flat (orthopnea), need 3 pillows.\n\
                History: HTN, previous heart attack 5 years ago.\n\
                Personality: Sweet, apologetic for bothering the nurse, minimizes pain but admits to \"heaviness\"."
                .to_string(),
            diagnosis: "Congestive Heart Failure Exacerbation".to_string(),
            tags: vec![
                "Chronic".to_string(),
                "Geriatric".to_string(),
                "Nursing Assessment".to_string(),
            ],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "cardio-003".to_string(),
            author_id: None,
            institution_id: None,
            visibility: Some(Visibility::Institution),
            patient_name: "Marcus Miller".to_string(),
            age: 52,
            gender: "Male".to_string(),
            chief_complaint: "Syncope at gym".to_string(),
            difficulty: Difficulty::Advanced,
            category: CaseCategory::Cardiology,
            role: Role::Paramedic,
            description: "Called to a local gym for a 52-year-old male who collapsed while \
                          running on the treadmill."
                .to_string(),
            avatar_url: "https://picsum.photos/200/200?random=12".to_string(),
            initial_vitals: Vitals {
                bp: "90/60".to_string(),
                hr: 130,
                rr: 24,
                temp: 36.5,
                o2: 94,
            },
            system_instruction: "You are Marcus Miller, 52M.\n\
                Situation: You are lying on the floor of a gym. You feel dizzy and your chest is fluttering.\n\
                Symptoms: Lightheadedness, palpitations, chest tightness. No pain before passing out, just \"lights out\".\n\
                History: Family history of \"sudden death\" in young brother.\n\
                Personality: Confused, disoriented, trying to stand up but too weak."
                .to_string(),
            diagnosis: "Hypertrophic Cardiomyopathy / Arrhythmia".to_string(),
            tags: vec!["Pre-hospital".to_string(), "Syncope".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "resp-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Maya Lin".to_string(),
            age: 24,
            gender: "Female".to_string(),
            chief_complaint: "Wheezing after run".to_string(),
            difficulty: Difficulty::Intermediate,
            category: CaseCategory::Respiratory,
            role: Role::Doctor,
            description: "A 24-year-old female complaining of worsening dyspnea and wheezing after a run in cold weather.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=2".to_string(),
            initial_vitals: Vitals {
                bp: "120/78".to_string(),
                hr: 104,
                rr: 28,
                temp: 36.8,
                o2: 91,
            },
            system_instruction: "You are Maya Lin, 24F.\n\
                Symptoms: Tight chest, wheezing, can't catch breath. Started after jogging in cold air.\n\
                History: Asthma. Ran out of inhaler.\n\
                Personality: Anxious, speaks in short bursts due to air hunger."
                .to_string(),
            diagnosis: "Acute Asthma Exacerbation".to_string(),
            tags: vec!["Chronic".to_string(), "Exacerbation".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "gastro-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Robert \"Bob\" Thorne".to_string(),
            age: 55,
            gender: "Male".to_string(),
            chief_complaint: "Abdominal pain".to_string(),
            difficulty: Difficulty::Advanced,
            category: CaseCategory::Gastroenterology,
            role: Role::Doctor,
            description: "A 55-year-old male with a 2-day history of right upper quadrant pain and fever.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=3".to_string(),
            initial_vitals: Vitals {
                bp: "135/85".to_string(),
                hr: 92,
                rr: 18,
                temp: 38.5,
                o2: 98,
            },
            system_instruction: "You are Bob Thorne, 55M.\n\
                Symptoms: Pain in upper right belly, radiates to shoulder. Worse after fatty food.\n\
                History: Heavy drinker (denies it initially).\n\
                Personality: Grumpy, resistant, hates hospitals."
                .to_string(),
            diagnosis: "Acute Cholecystitis".to_string(),
            tags: vec!["Infectious".to_string(), "Acute".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "neuro-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Alice Cooper".to_string(),
            age: 78,
            gender: "Female".to_string(),
            chief_complaint: "Slurred speech".to_string(),
            difficulty: Difficulty::Novice,
            category: CaseCategory::Neurology,
            role: Role::Paramedic,
            description: "Called to a nursing home. 78F found by staff with facial droop and left-sided weakness.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=7".to_string(),
            initial_vitals: Vitals {
                bp: "180/100".to_string(),
                hr: 78,
                rr: 16,
                temp: 36.7,
                o2: 97,
            },
            system_instruction: "You are Alice Cooper, 78F.\n\
                Symptoms: You try to speak but words come out wrong. You cannot move your left arm well. You feel fine otherwise, just confused why people are rushing.\n\
                Personality: Confused, frustrated that you can't talk."
                .to_string(),
            diagnosis: "Acute Ischemic Stroke (R-MCA)".to_string(),
            tags: vec!["Stroke Alert".to_string(), "Geriatric".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "trauma-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "John Doe".to_string(),
            age: 25,
            gender: "Male".to_string(),
            chief_complaint: "Motorcycle accident".to_string(),
            difficulty: Difficulty::Advanced,
            category: CaseCategory::Trauma,
            role: Role::Paramedic,
            description: "25M motorcyclist struck by car. Wearing helmet. Complains of pelvic pain.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=10".to_string(),
            initial_vitals: Vitals {
                bp: "88/50".to_string(),
                hr: 135,
                rr: 28,
                temp: 36.0,
                o2: 95,
            },
            system_instruction: "You are John Doe, 25M.\n\
                Situation: Hit by car. Lying on asphalt.\n\
                Symptoms: Severe pain in hips. Feel cold and sleepy.\n\
                Personality: In shock. Anxious. Asking \"Is my bike okay?\""
                .to_string(),
            diagnosis: "Unstable Pelvic Fracture / Internal Bleeding".to_string(),
            tags: vec!["Trauma".to_string(), "Shock".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "peds-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Noah Smith".to_string(),
            age: 4,
            gender: "Male".to_string(),
            chief_complaint: "Barking cough".to_string(),
            difficulty: Difficulty::Novice,
            category: CaseCategory::Pediatrics,
            role: Role::Doctor,
            description: "4-year-old male brought by parents with a seal-like bark cough and stridor at night.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=15".to_string(),
            initial_vitals: Vitals {
                bp: "100/60".to_string(),
                hr: 115,
                rr: 28,
                temp: 38.0,
                o2: 95,
            },
            system_instruction: "You are Noah's Mom (acting as the historian). Noah is 4.\n\
                Symptoms: He woke up making a sound like a seal. He has trouble breathing in. He had a runny nose for 2 days.\n\
                Personality: Worried mother, holding the child."
                .to_string(),
            diagnosis: "Croup (Laryngotracheobronchitis)".to_string(),
            tags: vec!["Infectious".to_string(), "Pediatric".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "endo-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Jennifer Lopez".to_string(),
            age: 19,
            gender: "Female".to_string(),
            chief_complaint: "Vomiting and confusion".to_string(),
            difficulty: Difficulty::Intermediate,
            category: CaseCategory::Endocrinology,
            role: Role::Nurse,
            description: "19F brought in by roommates. Drowsy, fruity odor on breath, deep rapid breathing.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=9".to_string(),
            initial_vitals: Vitals {
                bp: "100/60".to_string(),
                hr: 125,
                rr: 32,
                temp: 37.2,
                o2: 96,
            },
            system_instruction: "You are Jennifer, 19F.\n\
                Symptoms: Feeling very weak, thirsty, peeing a lot earlier, now just sick to stomach.\n\
                History: Type 1 Diabetes (ran out of insulin due to cost).\n\
                Personality: Drowsy, slow to answer, confused."
                .to_string(),
            diagnosis: "Diabetic Ketoacidosis (DKA)".to_string(),
            tags: vec!["Metabolic".to_string(), "Critical".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "psych-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Vincent Black".to_string(),
            age: 40,
            gender: "Male".to_string(),
            chief_complaint: "Hearing voices".to_string(),
            difficulty: Difficulty::Intermediate,
            category: CaseCategory::Psychiatry,
            role: Role::Doctor,
            description: "40M brought by police for acting erratically. Appears agitated and paranoid.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=11".to_string(),
            initial_vitals: Vitals {
                bp: "140/85".to_string(),
                hr: 95,
                rr: 18,
                temp: 37.0,
                o2: 98,
            },
            system_instruction: "You are Vincent Black, 40M.\n\
                Symptoms: Voices telling you the CIA is watching. You stopped taking meds because they are \"poison\".\n\
                Personality: Suspicious, avoids eye contact, speaks in riddles."
                .to_string(),
            diagnosis: "Paranoid Schizophrenia Exacerbation".to_string(),
            tags: vec!["Mental Health".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "id-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Lucas Grey".to_string(),
            age: 23,
            gender: "Male".to_string(),
            chief_complaint: "Fever and stiff neck".to_string(),
            difficulty: Difficulty::Advanced,
            category: CaseCategory::InfectiousDisease,
            role: Role::Doctor,
            description: "23M college student presents with high fever, headache, and photophobia for 12 hours.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=50".to_string(),
            initial_vitals: Vitals {
                bp: "100/60".to_string(),
                hr: 110,
                rr: 20,
                temp: 39.5,
                o2: 98,
            },
            system_instruction: "You are Lucas, 23M.\n\
                Symptoms: Worst headache ever. Light hurts eyes. Neck is extremely stiff.\n\
                History: Lives in dorms. No recent travel.\n\
                Personality: Lethargic, shielding eyes from light."
                .to_string(),
            diagnosis: "Meningococcal Meningitis".to_string(),
            tags: vec!["Critical".to_string(), "Emergency".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "derm-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Chloe Decker".to_string(),
            age: 16,
            gender: "Female".to_string(),
            chief_complaint: "Itchy rash on hands".to_string(),
            difficulty: Difficulty::Novice,
            category: CaseCategory::Dermatology,
            role: Role::Doctor,
            description: "16F with itchy, vesicular rash on hands and wrists. Worse at night.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=53".to_string(),
            initial_vitals: Vitals {
                bp: "110/70".to_string(),
                hr: 75,
                rr: 16,
                temp: 36.8,
                o2: 99,
            },
            system_instruction: "You are Chloe, 16F.\n\
                Symptoms: Intense itching, especially between fingers and on wrists. Can't sleep because of itching.\n\
                History: Boyfriend has it too.\n\
                Personality: Embarrassed, scratching constantly."
                .to_string(),
            diagnosis: "Scabies".to_string(),
            tags: vec!["Parasitic".to_string(), "Outpatient".to_string()],
            assets: Vec::new(),
        },
        ClinicalCase {
            id: "rheum-001".to_string(),
            author_id: None,
            institution_id: None,
            visibility: None,
            patient_name: "Diana Prince".to_string(),
            age: 28,
            gender: "Female".to_string(),
            chief_complaint: "Morning stiffness and joint pain".to_string(),
            difficulty: Difficulty::Intermediate,
            category: CaseCategory::Rheumatology,
            role: Role::Doctor,
            description: "28F with pain in hands and feet, worse in the morning for more than an hour. Fatigue.".to_string(),
            avatar_url: "https://picsum.photos/200/200?random=55".to_string(),
            initial_vitals: Vitals {
                bp: "120/70".to_string(),
                hr: 78,
                rr: 16,
                temp: 37.2,
                o2: 99,
            },
            system_instruction: "You are Diana, 28F.\n\
                Symptoms: Hands feel stiff like claws for 2 hours every morning. Knuckles are swollen. Exhausted all the time.\n\
                Personality: Frustrated, used to be very active."
                .to_string(),
            diagnosis: "Rheumatoid Arthritis".to_string(),
            tags: vec!["Autoimmune".to_string(), "Chronic".to_string()],
            assets: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_resolves_ids() {
        let catalog = CaseCatalog::builtin();
        assert_eq!(catalog.len(), 13);
        assert_eq!(
            catalog.get("cardio-001").map(|c| c.patient_name.as_str()),
            Some("Arthur Dent")
        );
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn filters_by_role_and_difficulty() {
        let catalog = CaseCatalog::builtin();
        let filter = CaseFilter {
            role: Some(Role::Nurse),
            ..Default::default()
        };
        let found: Vec<_> = catalog.search(&filter).into_iter().map(|c| c.id.as_str()).collect();
        assert_eq!(found, ["cardio-002", "endo-001"]);

        let filter = CaseFilter {
            difficulty: Some(Difficulty::Advanced),
            ..Default::default()
        };
        assert_eq!(catalog.search(&filter)[0].id, "cardio-003");
    }

    #[test]
    fn views_partition_by_visibility_and_author() {
        let mut catalog = CaseCatalog::builtin();
        let mut mine = catalog.get("cardio-001").unwrap().clone();
        mine.id = "custom-1".to_string();
        mine.author_id = Some("u1".to_string());
        mine.visibility = Some(Visibility::Private);
        catalog.add(mine);

        let public = CaseFilter {
            view: CaseView::Public,
            ..Default::default()
        };
        assert_eq!(catalog.search(&public).len(), 1);

        let institution = CaseFilter {
            view: CaseView::Institution,
            ..Default::default()
        };
        // unscoped builtins plus institution-scoped cardio-003
        assert_eq!(catalog.search(&institution).len(), 12);

        let own = CaseFilter {
            view: CaseView::Mine,
            author: Some("u1".to_string()),
            ..Default::default()
        };
        let found = catalog.search(&own);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "custom-1");

        let anonymous = CaseFilter {
            view: CaseView::Mine,
            ..Default::default()
        };
        assert!(catalog.search(&anonymous).is_empty());
    }

    #[test]
    fn added_cases_come_first() {
        let mut catalog = CaseCatalog::builtin();
        let mut case = catalog.get("cardio-002").unwrap().clone();
        case.id = "custom-2".to_string();
        catalog.add(case);

        let all = catalog.search(&CaseFilter::default());
        assert_eq!(all[0].id, "custom-2");
        assert_eq!(all.len(), 14);
    }

    #[test]
    fn every_category_has_a_builtin_case() {
        use CaseCategory::*;
        let catalog = CaseCatalog::builtin();
        for category in [
            Cardiology,
            Respiratory,
            Gastroenterology,
            Neurology,
            Trauma,
            Pediatrics,
            Endocrinology,
            Psychiatry,
            InfectiousDisease,
            Dermatology,
            Rheumatology,
        ] {
            let filter = CaseFilter {
                category: Some(category),
                ..Default::default()
            };
            assert!(!catalog.search(&filter).is_empty(), "{category:?}");
        }
    }
}
