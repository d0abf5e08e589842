//! Builds the per-session system instruction from caller identity and an
//! optional patient context. Pure string assembly — no I/O, recomputed per
//! request.

use serde::Serialize;
use tera::Error as TeraError;

use crate::patients::{Medication, PatientRecord};
use crate::prompt_template::render_prompt;

/// The base Drugsy instruction, used verbatim for anonymous sessions.
pub const BASE_INSTRUCTION: &str = include_str!("prompts/system.md");

/// Canned greeting seeded as the first assistant message of a conversation.
pub const WELCOME_MESSAGE: &str = include_str!("prompts/welcome.md");

const PERSONALIZATION_TEMPLATE: &str = include_str!("prompts/personalization.md");

/// The authenticated caller, as resolved by the identity provider.
#[derive(Debug, Clone, Serialize)]
pub struct Caller {
    pub id: i64,
    pub name: String,
}

/// The patient the session is scoped to, when the caller selected one.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectContext {
    pub id: i64,
    pub name: String,
    pub medications: Vec<Medication>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

impl SubjectContext {
    pub fn from_record(record: &PatientRecord) -> Self {
        SubjectContext {
            id: record.id,
            name: record.full_name(),
            medications: record.medications.clone(),
            conditions: record.chronic_conditions.clone(),
        }
    }
}

#[derive(Serialize)]
struct InstructionContext<'a> {
    base: &'a str,
    caller_name: &'a str,
    subject: Option<&'a SubjectContext>,
}

/// Compose the session instruction. With a subject, the text binds every
/// patient-scoped tool call to the subject's record id — this is an
/// instruction to the model; the ownership check in the patient tools is the
/// programmatic backstop.
pub fn build_instruction(
    base: &str,
    caller: &Caller,
    subject: Option<&SubjectContext>,
) -> Result<String, TeraError> {
    let context = InstructionContext {
        base,
        caller_name: &caller.name,
        subject,
    };
    render_prompt(PERSONALIZATION_TEMPLATE, &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller() -> Caller {
        Caller {
            id: 7,
            name: "Alex Doe".into(),
        }
    }

    fn subject() -> SubjectContext {
        SubjectContext {
            id: 42,
            name: "Jane Roe".into(),
            medications: vec![Medication {
                name: "Aspirin".into(),
                dosage: "100mg".into(),
                frequency: "daily".into(),
            }],
            conditions: Some("Hypertension, Diabetes".into()),
        }
    }

    #[test]
    fn without_subject_contains_caller_but_no_binding() {
        let text = build_instruction("BASE PROMPT", &caller(), None).unwrap();
        assert!(text.contains("Alex Doe"));
        assert!(text.contains("BASE PROMPT"));
        assert!(!text.contains("patient id"));
        assert!(!text.contains("reviewing patient"));
    }

    #[test]
    fn with_subject_binds_tools_to_record_id() {
        let text = build_instruction("BASE PROMPT", &caller(), Some(&subject())).unwrap();
        assert!(text.contains("Alex Doe"));
        assert!(text.contains("42"));
        assert!(text.contains("Aspirin"));
        assert!(text.contains("must use patient id 42"));
        assert!(text.contains("Hypertension, Diabetes"));
    }

    #[test]
    fn absent_fields_are_omitted_entirely() {
        let mut subject = subject();
        subject.medications.clear();
        subject.conditions = None;
        let text = build_instruction("BASE", &caller(), Some(&subject)).unwrap();
        assert!(!text.contains("following medications"));
        assert!(!text.contains("chronic conditions"));
    }

    #[test]
    fn subject_context_copies_record_fields() {
        let record = crate::patients::test_record(42, 7);
        let subject = SubjectContext::from_record(&record);
        assert_eq!(subject.id, 42);
        assert_eq!(subject.name, "Jane Doe");
        assert_eq!(subject.medications.len(), 1);
    }
}
