use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drugsy::personalization::{
    build_instruction, SubjectContext, BASE_INSTRUCTION, WELCOME_MESSAGE,
};
use drugsy::registry::CallContext;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub patient_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BotResponse {
    pub response: String,
    pub conversation_id: Uuid,
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PromptRequest>,
) -> Result<Json<BotResponse>, ApiError> {
    let caller = state.identity.resolve(&headers);
    let conversation_id = request.conversation_id.unwrap_or_else(Uuid::new_v4);

    // Personalize the instruction for authenticated callers; patient context
    // only attaches when the caller owns the record
    let (instruction, ctx) = match &caller {
        Some(caller) => {
            let subject = match request.patient_id {
                Some(patient_id) => state
                    .patients
                    .get(patient_id)
                    .await
                    .map_err(ApiError::from)?
                    .filter(|record| record.owner_id == caller.id)
                    .map(|record| SubjectContext::from_record(&record)),
                None => None,
            };
            let instruction = build_instruction(BASE_INSTRUCTION, caller, subject.as_ref())
                .map_err(|e| ApiError::from(anyhow::Error::from(e)))?;
            (instruction, CallContext::for_caller(caller.id))
        }
        None => (BASE_INSTRUCTION.to_string(), CallContext::anonymous()),
    };

    let current = match state.sessions.get(&conversation_id).await? {
        Some(existing) => existing,
        None => state
            .orchestrator
            .initialize(conversation_id, &instruction, WELCOME_MESSAGE.trim()),
    };

    let updated = state.orchestrator.submit(&current, &request.prompt, &ctx).await?;
    state.sessions.put(&updated).await?;

    Ok(Json(BotResponse {
        response: updated.last_response(),
        conversation_id,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NoIdentity;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use drugsy::models::message::Message;
    use drugsy::orchestrator::{Orchestrator, OrchestratorConfig};
    use drugsy::patients::MemoryPatientStore;
    use drugsy::providers::mock::{FailingProvider, MockProvider};
    use drugsy::registry::ToolRegistry;
    use drugsy::store::{MemorySessionStore, SessionStore};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(provider: Arc<dyn drugsy::providers::base::Provider>) -> (axum::Router, AppState) {
        let state = AppState {
            orchestrator: Arc::new(Orchestrator::new(
                provider,
                Arc::new(ToolRegistry::new()),
                OrchestratorConfig::default(),
            )),
            sessions: Arc::new(MemorySessionStore::new()),
            patients: Arc::new(MemoryPatientStore::new()),
            identity: Arc::new(NoIdentity),
        };
        (crate::routes::routes(state.clone()), state)
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .uri("/chat")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn chat_turn_returns_answer_and_conversation_id() {
        let (app, state) = app(Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("Take it with food. ✅"),
        ])));

        let response = app
            .oneshot(chat_request(serde_json::json!({"prompt": "How do I take ibuprofen?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: BotResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.response, "Take it with food. ✅");

        // The turn was persisted under the returned id
        let stored = state
            .sessions
            .get(&parsed.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_response(), "Take it with food. ✅");
    }

    #[tokio::test]
    async fn second_turn_reuses_the_conversation() {
        let (app, state) = app(Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("first"),
            Message::assistant().with_text("second"),
        ])));

        let response = app
            .clone()
            .oneshot(chat_request(serde_json::json!({"prompt": "one"})))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let first: BotResponse = serde_json::from_slice(&body).unwrap();

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "prompt": "two",
                "conversation_id": first.conversation_id,
            })))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let second: BotResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(second.conversation_id, first.conversation_id);
        let stored = state
            .sessions
            .get(&first.conversation_id)
            .await
            .unwrap()
            .unwrap();
        // system, welcome, user, assistant, user, assistant
        assert_eq!(stored.messages.len(), 6);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_polite_bad_gateway() {
        let (app, _state) = app(Arc::new(FailingProvider));

        let response = app
            .oneshot(chat_request(serde_json::json!({"prompt": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let message = parsed["error"].as_str().unwrap();
        assert!(message.contains("try again"));
        // No internals leak into the body
        assert!(!message.contains("mock upstream failure"));
    }
}
