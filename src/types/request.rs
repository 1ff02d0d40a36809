//! Inbound consultation body and the abstract outbound request built from it.

use serde::{Deserialize, Serialize};

/// Process-wide system instruction sent with every consultation.
pub const SYSTEM_PROMPT: &str = "You are provided with notes written by a doctor from a patient's visit.
Your job is to summarize the visit for the doctor and provide an email.
Reply with exactly three sections with the headings:
### Summary of visit for the doctor's records
### Next steps for the doctor
### Draft of email to patient in patient-friendly language";

/// Consultation body posted by the caller. Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Visit {
    pub patient_name: String,
    pub date_of_visit: String,
    pub notes: String,
}

/// Provider-agnostic outbound prompt.
///
/// Immutable once built; one instance lives for exactly one relay invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsultRequest {
    system_instruction: String,
    user_content: String,
}

impl ConsultRequest {
    /// A request carrying the process-wide [`SYSTEM_PROMPT`].
    pub fn new(user_content: impl Into<String>) -> Self {
        Self::with_system_instruction(SYSTEM_PROMPT, user_content)
    }

    pub fn with_system_instruction(
        system_instruction: impl Into<String>,
        user_content: impl Into<String>,
    ) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            user_content: user_content.into(),
        }
    }

    pub fn from_visit(visit: &Visit) -> Self {
        Self::new(format!(
            "Patient Name: {}\nDate of Visit: {}\nNotes:\n{}",
            visit.patient_name, visit.date_of_visit, visit.notes
        ))
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn user_content(&self) -> &str {
        &self.user_content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_missing_fields_default_to_empty() {
        let visit: Visit = serde_json::from_str(r#"{"notes":"cough for 3 days"}"#).unwrap();
        assert_eq!(visit.patient_name, "");
        assert_eq!(visit.notes, "cough for 3 days");
    }

    #[test]
    fn test_from_visit_formats_user_content() {
        let visit = Visit {
            patient_name: "Jane Doe".into(),
            date_of_visit: "2024-05-01".into(),
            notes: "BP 120/80".into(),
        };
        let req = ConsultRequest::from_visit(&visit);
        assert_eq!(req.system_instruction(), SYSTEM_PROMPT);
        assert_eq!(
            req.user_content(),
            "Patient Name: Jane Doe\nDate of Visit: 2024-05-01\nNotes:\nBP 120/80"
        );
    }
}
