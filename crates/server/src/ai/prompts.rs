//! Prompt templates and response schemas sent to the model

use clinsim_core::ClinicalCase;
use serde_json::{Value as JsonValue, json};

/// Tests that also get a generated image
const VISUAL_KEYWORDS: &[&str] = &[
    "ecg",
    "ekg",
    "x-ray",
    "cxr",
    "ct",
    "mri",
    "ultrasound",
    "scan",
    "us",
    "echo",
    "imaging",
    "derm",
    "skin",
    "rash",
    "lesion",
    "angio",
];

pub const ASSET_ANALYSIS_PROMPT: &str = "Analyze this medical asset. Describe findings.";

pub fn patient_system_instruction(case: &ClinicalCase) -> String {
    format!(
        r#"{instruction}
[SIMULATION RULES]
{historian}
- CRITICAL: You are the PATIENT ({name}).
- CRITICAL: The user is the {role:?}. Do NOT act as a medical professional.
- Keep responses under 40 words unless telling a specific story."#,
        instruction = case.system_instruction.trim(),
        historian = case.difficulty.historian_instruction(),
        name = case.patient_name,
        role = case.role,
    )
}

pub fn opening_prompt(case: &ClinicalCase) -> String {
    format!(
        r#"[SYSTEM EVENT: START_SIMULATION]
CONTEXT: The {role:?} has just entered the room.
YOUR ACTION: Speak first as the patient. State your chief complaint ("{complaint}") in your own words based on your persona.
DO NOT greet them as a colleague. You are the patient."#,
        role = case.role,
        complaint = case.chief_complaint,
    )
}

pub fn autopilot_prompt(case: &ClinicalCase, history: &str) -> String {
    format!(
        r#"You are an Expert AI Physician interacting with a patient simulation.
Your goal is to efficiently diagnose the patient by asking questions and ordering relevant tests.

Current Patient: {age} {gender}, CC: {complaint}

Transcript Protocol:
- [AUTOPILOT]: You (The Doctor)
- [PATIENT]: The Patient
- [SYSTEM]: Lab Results / Vitals

Session History:
{history}

INSTRUCTIONS:
1. Analyze the history.
2. If you have enough info, 'diagnosis'.
3. If you need objective data (labs/imaging) and haven't ordered it yet, 'order'.
4. Otherwise, ask a relevant clinical question ('message').

CONSTRAINTS:
- Do not repeat questions.
- Do not re-order tests already present in [SYSTEM].
- If the last message was a Lab Result, INTERPRET it in your next 'message' or 'diagnosis'.

OUTPUT JSON ONLY."#,
        age = case.age,
        gender = case.gender,
        complaint = case.chief_complaint,
    )
}

pub fn autopilot_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "type": { "type": "STRING", "enum": ["message", "order", "diagnosis"] },
            "content": { "type": "STRING" },
            "reasoning": { "type": "STRING" }
        },
        "required": ["type", "content", "reasoning"]
    })
}

pub fn lab_report_prompt(case: &ClinicalCase, test_name: &str) -> String {
    format!(
        r#"Act as a Laboratory Information System (LIS).

Patient: {name}, {age} {gender}.
Diagnosis (Ground Truth): {diagnosis}
Doctor Order: "{test_name}".

INSTRUCTIONS:
1. ALWAYS provide a full, realistic report. NEVER just say "Normal limits" or "Unremarkable".
2. If values are normal, generate a full table with normal values.
3. IF QUANTITATIVE LAB (e.g. CBC, BMP, Trop): OUTPUT A MARKDOWN TABLE with columns: | Component | Result | Ref Range | Flag |.
4. IF IMAGING/PROCEDURAL (e.g. X-Ray, CT, ECG): Provide a formal report sectioned by "TECHNIQUE", "FINDINGS", and "IMPRESSION".

Do NOT write a preamble. Just output the report/table."#,
        name = case.patient_name,
        age = case.age,
        gender = case.gender,
        diagnosis = case.diagnosis,
    )
}

/// Whether the ordered test should come with a generated image
pub fn is_visual_test(test_name: &str) -> bool {
    let lower = test_name.to_lowercase();
    VISUAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn image_style(test_name: &str) -> &'static str {
    let lower = test_name.to_lowercase();
    if lower.contains("ecg") || lower.contains("ekg") {
        "TYPE: 12-Lead ECG Rhythm Strip.\n\
         VISUALS: Close-up macro view of the pink grid paper and black waveform lines only.\n\
         CONTENT: Show distinct P-waves, QRS complexes, and T-waves.\n\
         NEGATIVE PROMPT: Do NOT show a document header, do not show text, do not show a hospital logo. Just the waves."
    } else if lower.contains("x-ray") || lower.contains("cxr") {
        "TYPE: Chest X-Ray (CXR) or skeletal radiograph.\n\
         VISUALS: High contrast, black and white DICOM style image.\n\
         CONTENT: Clear lung fields, heart shadow, or bone structure.\n\
         NEGATIVE PROMPT: No text annotations, no yellow labels."
    } else if lower.contains("derm") || lower.contains("skin") {
        "TYPE: Clinical Macro Photography.\n\
         VISUALS: Realistic skin texture, professional medical lighting.\n\
         CONTENT: Close up of the lesion/rash."
    } else if lower.contains("ct") || lower.contains("mri") {
        "TYPE: Axial CT or MRI Slice.\n\
         VISUALS: Grayscale medical scan.\n\
         CONTENT: Anatomical cross-section.\n\
         NEGATIVE PROMPT: No phantom artifacts, no text overlay."
    } else {
        "High quality medical image."
    }
}

pub fn image_prompt(case: &ClinicalCase, test_name: &str, report: &str) -> String {
    let findings: String = report.chars().take(300).collect();
    format!(
        r#"Generate a RAW MEDICAL DIAGNOSTIC IMAGE.

{style}

PATIENT CONTEXT:
Age/Sex: {age} {gender}
Pathology to illustrate: {diagnosis}
Specific Findings based on report: {findings}

CRITICAL: Do not generate a picture of a paper report. Generate the scan/image itself."#,
        style = image_style(test_name),
        age = case.age,
        gender = case.gender,
        diagnosis = case.diagnosis,
    )
}

pub fn interpretation_prompt(result: &str) -> String {
    format!(
        r#"You are a senior attending physician teaching a resident.
Analyze the following diagnostic result:
"{result}"

Your Task:
1. Explain the key abnormal findings.
2. Explain the clinical significance (pathophysiology).
3. CRITICAL RULE: DO NOT state the final diagnosis or the name of the disease. Keep it as an "interpretation of findings" only to let the learner figure out the diagnosis.
4. Keep it concise (under 3 sentences)."#
    )
}

pub fn tutor_prompt(case: &ClinicalCase, question: &str, history: &str) -> String {
    format!(
        "Tutor this student based on diagnosis {diagnosis}.\n\
         Session so far:\n{history}\n\
         Question: {question}",
        diagnosis = case.diagnosis,
    )
}

pub fn reflection_prompt(history: &str, reflection: &str) -> String {
    let combined = format!("{history}\nStudent Reflection: {reflection}");
    // Only the tail of long transcripts is relevant to the reflection
    let tail = tail_chars(&combined, 1000);
    format!(
        r#"Act as a Clinical Educator.
Review this chat history: {tail}.
Ask the student ONE thoughtful, open-ended question to help them reflect on a potential gap or a good move they made.
Do not give the answer yet. Just ask the question."#
    )
}

pub fn evaluation_prompt(case: &ClinicalCase, transcript: &str, handover_note: &str) -> String {
    format!(
        r#"You are a Medical Board Examiner. Evaluate this clinical session.

Patient Case: {name} ({diagnosis})

FULL TRANSCRIPT:
{transcript}

USER HANDOVER NOTE (SBAR):
"{handover_note}"

EVALUATION RULES:
1. IGNORE actions taken by [AI_AUTOPILOT]. They do NOT count towards the user's score.
2. EVALUATE ONLY the [USER_DOCTOR] moves.
3. If the user ordered tests, check if they were NECESSARY (High Value Care) or WASTEFUL.
4. If the user did very little (e.g. mostly AutoPilot), give a neutral/low score and note it.

TASK:
1. Score (0-100) based strictly on User performance.
2. Create a 'billBreakdown' list of tests specifically ordered by the USER. Mark if they were necessary.
3. Provide specific feedback on User's choices.

Output JSON Schema."#,
        name = case.patient_name,
        diagnosis = case.diagnosis,
    )
}

pub fn score_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "totalScore": { "type": "INTEGER" },
            "diagnosisCorrect": { "type": "BOOLEAN" },
            "userDiagnosis": { "type": "STRING" },
            "actualDiagnosis": { "type": "STRING" },
            "accuracyScore": { "type": "INTEGER" },
            "efficiencyScore": { "type": "INTEGER" },
            "communicationScore": { "type": "INTEGER" },
            "empathyFeedback": { "type": "STRING" },
            "handoverScore": { "type": "INTEGER" },
            "handoverFeedback": { "type": "STRING" },
            "totalBill": { "type": "NUMBER" },
            "billBreakdown": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "item": { "type": "STRING" },
                        "cost": { "type": "NUMBER" },
                        "isNecessary": { "type": "BOOLEAN" },
                        "notes": { "type": "STRING" }
                    }
                }
            },
            "feedbackSummary": { "type": "STRING" },
            "keyTakeaway": { "type": "STRING" },
            "missedCriticalSteps": { "type": "ARRAY", "items": { "type": "STRING" } },
            "nextRecommendedSteps": { "type": "ARRAY", "items": { "type": "STRING" } },
            "timelineAnalysis": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "turnIndex": { "type": "INTEGER" },
                        "type": { "type": "STRING", "enum": ["good", "bad", "neutral", "critical"] },
                        "comment": { "type": "STRING" },
                        "originalMessage": { "type": "STRING" }
                    }
                }
            }
        },
        "required": ["totalScore", "diagnosisCorrect", "billBreakdown", "nextRecommendedSteps"]
    })
}

pub fn custom_case_prompt(description: &str) -> String {
    format!(
        r#"Generate a ClinicalCase based on: "{description}".
Output JSON with the keys: patientName, age, gender, chiefComplaint, difficulty (Novice|Intermediate|Advanced),
category, role (Doctor|Nurse|Paramedic), description, initialVitals {{bp, hr, rr, temp, o2}},
systemInstruction (the patient persona), diagnosis, tags."#
    )
}

fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    match text.char_indices().nth(count - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinsim_core::CaseCatalog;

    #[test]
    fn visual_tests_are_detected_case_insensitively() {
        assert!(is_visual_test("12-lead ECG"));
        assert!(is_visual_test("Chest X-Ray"));
        assert!(is_visual_test("CT Head"));
        assert!(!is_visual_test("CBC"));
        assert!(!is_visual_test("Troponin"));
    }

    #[test]
    fn image_style_follows_modality() {
        assert!(image_style("ECG").contains("Rhythm Strip"));
        assert!(image_style("CXR").contains("radiograph"));
        assert!(image_style("MRI brain").contains("Axial"));
        assert_eq!(image_style("Echo"), "High quality medical image.");
    }

    #[test]
    fn patient_instruction_embeds_persona_and_difficulty() {
        let catalog = CaseCatalog::builtin();
        let case = catalog.get("cardio-003").unwrap();
        let prompt = patient_system_instruction(case);

        assert!(prompt.starts_with("You are Marcus Miller"));
        assert!(prompt.contains("Difficult Historian"));
        assert!(prompt.contains("The user is the Paramedic"));
    }

    #[test]
    fn reflection_keeps_only_recent_history() {
        let history = format!("{}END", "x".repeat(2000));
        let prompt = reflection_prompt(&history, "I missed the ECG");
        assert!(prompt.contains("END\nStudent Reflection: I missed the ECG"));
        assert!(!prompt.contains(&"x".repeat(1001)));
    }

    #[test]
    fn tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("héllo", 3), "llo");
        assert_eq!(tail_chars("hi", 5), "hi");
    }
}
