//! Tool handlers exposed to the model through the registry.
//!
//! Lookup tools (FDA labels, USDA food data, literature search) are
//! read-only. The patient-record tools mutate the external record store and
//! are append-only and safe to retry at the caller's discretion; the registry
//! itself never retries them.
pub mod drug_label;
pub mod food_data;
pub mod literature;
pub mod patient_record;
pub mod risk;
