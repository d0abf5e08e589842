//! Patient-record tools.
//!
//! The session instruction binds these tools to one patient id, but that is
//! only an instruction to the model. The hard guarantee lives here: every
//! handler verifies that the authenticated caller owns the record before it
//! reads or mutates anything.
//!
//! The mutating handlers are append-only and safe to retry; the registry
//! never retries them on its own.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{ParamKind, ParamSpec, ToolSpec};
use crate::patients::{Medication, PatientRecord, PatientStore, ProgressNote};
use crate::registry::{CallContext, ToolHandler};

fn authorize(record: &PatientRecord, ctx: &CallContext) -> ToolResult<()> {
    match ctx.caller_id {
        Some(caller_id) if caller_id == record.owner_id => Ok(()),
        _ => Err(ToolError::ExecutionFailed(format!(
            "not authorized to access patient record {}",
            record.id
        ))),
    }
}

fn patient_id(arguments: &Value) -> i64 {
    arguments["patient_id"].as_i64().unwrap_or_default()
}

async fn load_authorized(
    store: &Arc<dyn PatientStore>,
    id: i64,
    ctx: &CallContext,
) -> ToolResult<Option<PatientRecord>> {
    let record = store
        .get(id)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("record store failed: {}", e)))?;
    match record {
        Some(record) => {
            authorize(&record, ctx)?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

fn render_record(record: &PatientRecord) -> ToolResult<String> {
    serde_json::to_string_pretty(record).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
}

pub struct GetPatientTool {
    store: Arc<dyn PatientStore>,
    spec: ToolSpec,
}

impl GetPatientTool {
    pub fn new(store: Arc<dyn PatientStore>) -> Self {
        let spec = ToolSpec::new(
            "get_patient",
            "Retrieve a patient record: name, chronic conditions, medications \
             and progress notes.",
            vec![ParamSpec::required(
                "patient_id",
                ParamKind::Integer,
                "the id of the patient to retrieve",
            )],
        );
        Self { store, spec }
    }
}

#[async_trait]
impl ToolHandler for GetPatientTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: Value, ctx: &CallContext) -> ToolResult<String> {
        let id = patient_id(&arguments);
        match load_authorized(&self.store, id, ctx).await? {
            Some(record) => render_record(&record),
            None => Ok(format!("No patient record with id {}", id)),
        }
    }
}

pub struct AddMedicationTool {
    store: Arc<dyn PatientStore>,
    spec: ToolSpec,
}

impl AddMedicationTool {
    pub fn new(store: Arc<dyn PatientStore>) -> Self {
        let spec = ToolSpec::new(
            "add_medication",
            "Append a medication to a patient's record.",
            vec![
                ParamSpec::required("patient_id", ParamKind::Integer, "the id of the patient"),
                ParamSpec::required("name", ParamKind::String, "medication name"),
                ParamSpec::required("dosage", ParamKind::String, "dosage, e.g. '10mg'"),
                ParamSpec::required(
                    "frequency",
                    ParamKind::String,
                    "how often to take it, e.g. 'once daily'",
                ),
            ],
        );
        Self { store, spec }
    }
}

#[async_trait]
impl ToolHandler for AddMedicationTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: Value, ctx: &CallContext) -> ToolResult<String> {
        let id = patient_id(&arguments);
        if load_authorized(&self.store, id, ctx).await?.is_none() {
            return Ok(format!("No patient record with id {}", id));
        }

        let medication = Medication {
            name: arguments["name"].as_str().unwrap_or_default().to_string(),
            dosage: arguments["dosage"].as_str().unwrap_or_default().to_string(),
            frequency: arguments["frequency"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        };

        let updated = self
            .store
            .append_medication(id, medication)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("record store failed: {}", e)))?;
        match updated {
            Some(record) => render_record(&record),
            None => Ok(format!("No patient record with id {}", id)),
        }
    }
}

pub struct AddProgressNoteTool {
    store: Arc<dyn PatientStore>,
    spec: ToolSpec,
}

impl AddProgressNoteTool {
    pub fn new(store: Arc<dyn PatientStore>) -> Self {
        let spec = ToolSpec::new(
            "add_progress_note",
            "Append a dated progress note to a patient's record.",
            vec![
                ParamSpec::required("patient_id", ParamKind::Integer, "the id of the patient"),
                ParamSpec::required("content", ParamKind::String, "the content of the note"),
            ],
        );
        Self { store, spec }
    }
}

#[async_trait]
impl ToolHandler for AddProgressNoteTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: Value, ctx: &CallContext) -> ToolResult<String> {
        let id = patient_id(&arguments);
        if load_authorized(&self.store, id, ctx).await?.is_none() {
            return Ok(format!("No patient record with id {}", id));
        }

        let note = ProgressNote {
            date: Utc::now().format("%Y-%m-%d").to_string(),
            content: arguments["content"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        };

        let updated = self
            .store
            .append_progress_note(id, note)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("record store failed: {}", e)))?;
        match updated {
            Some(record) => render_record(&record),
            None => Ok(format!("No patient record with id {}", id)),
        }
    }
}
