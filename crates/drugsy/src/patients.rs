use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNote {
    /// ISO date the note was recorded, YYYY-MM-DD
    pub date: String,
    pub content: String,
}

/// A patient record as the tools see it. Persistence lives behind
/// `PatientStore`; the core never writes a record except through the
/// append operations below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: i64,
    /// The clinician account this record belongs to.
    pub owner_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chronic_conditions: Option<String>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub progress_notes: Vec<ProgressNote>,
}

impl PatientRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// External record store contract. Mutations are append-only from the core's
/// point of view; the store itself decides about durability and retries.
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn get(&self, id: i64) -> anyhow::Result<Option<PatientRecord>>;

    /// Append a medication and return the updated record, `None` if the
    /// patient does not exist.
    async fn append_medication(
        &self,
        id: i64,
        medication: Medication,
    ) -> anyhow::Result<Option<PatientRecord>>;

    /// Append a progress note and return the updated record, `None` if the
    /// patient does not exist.
    async fn append_progress_note(
        &self,
        id: i64,
        note: ProgressNote,
    ) -> anyhow::Result<Option<PatientRecord>>;
}

/// In-memory store backing the default server wiring and the tests.
#[derive(Default)]
pub struct MemoryPatientStore {
    records: RwLock<HashMap<i64, PatientRecord>>,
}

impl MemoryPatientStore {
    pub fn new() -> Self {
        MemoryPatientStore::default()
    }

    pub async fn insert(&self, record: PatientRecord) {
        self.records.write().await.insert(record.id, record);
    }
}

#[async_trait]
impl PatientStore for MemoryPatientStore {
    async fn get(&self, id: i64) -> anyhow::Result<Option<PatientRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn append_medication(
        &self,
        id: i64,
        medication: Medication,
    ) -> anyhow::Result<Option<PatientRecord>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|record| {
            record.medications.push(medication);
            record.clone()
        }))
    }

    async fn append_progress_note(
        &self,
        id: i64,
        note: ProgressNote,
    ) -> anyhow::Result<Option<PatientRecord>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|record| {
            record.progress_notes.push(note);
            record.clone()
        }))
    }
}

#[cfg(test)]
pub(crate) fn test_record(id: i64, owner_id: i64) -> PatientRecord {
    PatientRecord {
        id,
        owner_id,
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        date_of_birth: Some("1980-02-01".into()),
        chronic_conditions: Some("Hypertension".into()),
        medications: vec![Medication {
            name: "Lisinopril".into(),
            dosage: "10mg".into(),
            frequency: "once daily".into(),
        }],
        progress_notes: Vec::new(),
    }
}
