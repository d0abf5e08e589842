use std::sync::Arc;

use drugsy::orchestrator::Orchestrator;
use drugsy::patients::PatientStore;
use drugsy::store::SessionStore;

use crate::identity::Identity;

/// Shared application state. Everything is constructed once at startup and
/// handed to the handlers by reference.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<dyn SessionStore>,
    pub patients: Arc<dyn PatientStore>,
    pub identity: Arc<dyn Identity>,
}
