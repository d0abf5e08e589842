mod configuration;
mod error;
mod identity;
mod routes;
mod state;

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use drugsy::orchestrator::Orchestrator;
use drugsy::providers::factory;
use drugsy::registry::ToolRegistry;
use drugsy::retrieval::embedding::HttpEmbeddingClient;
use drugsy::retrieval::engine::RagEngine;
use drugsy::retrieval::literature::PubMedClient;
use drugsy::store::{FileSessionStore, MemorySessionStore, SessionStore};
use drugsy::tools::drug_label::{DrugLabelTool, FdaConfig};
use drugsy::tools::food_data::FoodDataTool;
use drugsy::tools::literature::LiteratureTool;
use drugsy::tools::patient_record::{AddMedicationTool, AddProgressNoteTool, GetPatientTool};

use configuration::Settings;
use identity::{Identity, NoIdentity, TokenIdentity};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = Settings::new()?;
    let addr = settings.server.socket_addr()?;

    // Every service is constructed once here and injected; no ambient
    // singletons
    let provider = factory::get_provider(settings.provider.into_config())?;
    let embeddings = Arc::new(HttpEmbeddingClient::new(settings.embeddings.into_config())?);
    let literature = Arc::new(PubMedClient::new(settings.pubmed.into_config())?);
    let rag = Arc::new(RagEngine::new(
        literature,
        embeddings,
        provider.clone(),
        settings.rag.into_config(),
    ));

    let patients = Arc::new(drugsy::patients::MemoryPatientStore::new());

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DrugLabelTool::new(FdaConfig::default())?));
    registry.register(Box::new(FoodDataTool::new(settings.usda.into_config())?));
    registry.register(Box::new(LiteratureTool::new(rag)));
    registry.register(Box::new(GetPatientTool::new(patients.clone())));
    registry.register(Box::new(AddMedicationTool::new(patients.clone())));
    registry.register(Box::new(AddProgressNoteTool::new(patients.clone())));
    // Risk models are deployment-provided; without any configured, the
    // predict_risk tool is not registered

    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        Arc::new(registry),
        settings.chat.into_config(),
    ));

    let sessions: Arc<dyn SessionStore> = match &settings.session_dir {
        Some(dir) => Arc::new(FileSessionStore::new(dir)?),
        None => Arc::new(MemorySessionStore::new()),
    };

    let identity: Arc<dyn Identity> = match TokenIdentity::from_settings(&settings.auth) {
        Some(identity) => Arc::new(identity),
        None => Arc::new(NoIdentity),
    };

    let state = AppState {
        orchestrator,
        sessions,
        patients,
        identity,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::routes(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
