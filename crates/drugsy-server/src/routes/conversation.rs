use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use drugsy::models::role::Role;
use drugsy::personalization::WELCOME_MESSAGE;

use crate::error::ApiError;
use crate::state::AppState;

async fn welcome() -> Json<Value> {
    Json(json!({ "welcome_message": WELCOME_MESSAGE.trim() }))
}

/// Conversation transcript for the UI: plain text exchanges only, the tool
/// plumbing stays internal.
async fn conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let Some(conversation) = state.sessions.get(&conversation_id).await? else {
        return Err(ApiError::NotFound);
    };

    let messages: Vec<Value> = conversation
        .messages
        .iter()
        .filter(|message| message.role != Role::Tool)
        .filter_map(|message| {
            let text = message.text();
            if text.is_empty() {
                return None;
            }
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => unreachable!("filtered above"),
            };
            Some(json!({ "role": role, "content": text }))
        })
        .collect();

    Ok(Json(json!({
        "conversation_id": conversation_id,
        "messages": messages,
        "finished": conversation.finished,
    })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/welcome", get(welcome))
        .route("/conversations/:conversation_id", get(conversation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NoIdentity;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use drugsy::models::message::Message;
    use drugsy::models::tool::ToolCall;
    use drugsy::orchestrator::{ConversationState, Orchestrator, OrchestratorConfig};
    use drugsy::patients::MemoryPatientStore;
    use drugsy::providers::mock::MockProvider;
    use drugsy::registry::ToolRegistry;
    use drugsy::store::{MemorySessionStore, SessionStore};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (axum::Router, AppState) {
        let state = AppState {
            orchestrator: Arc::new(Orchestrator::new(
                Arc::new(MockProvider::new(vec![])),
                Arc::new(ToolRegistry::new()),
                OrchestratorConfig::default(),
            )),
            sessions: Arc::new(MemorySessionStore::new()),
            patients: Arc::new(MemoryPatientStore::new()),
            identity: Arc::new(NoIdentity),
        };
        (crate::routes::routes(state.clone()), state)
    }

    #[tokio::test]
    async fn welcome_returns_the_canned_greeting() {
        let (app, _state) = app();
        let response = app
            .oneshot(Request::builder().uri("/welcome").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["welcome_message"]
            .as_str()
            .unwrap()
            .starts_with("Hello! I'm Drugsy!"));
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let (app, _state) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/conversations/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transcript_hides_tool_plumbing() {
        let (app, state) = app();
        let conversation = ConversationState::new(Uuid::new_v4()).with_appended(vec![
            Message::system().with_text("instruction"),
            Message::assistant().with_text("welcome"),
            Message::user().with_text("question"),
            Message::assistant().with_tool_request(
                "call_0",
                Ok(ToolCall::new("drug_label", json!({"search": "x"}))),
            ),
            Message::tool().with_tool_response("call_0", Ok("label".into())),
            Message::assistant().with_text("answer"),
        ]);
        state.sessions.put(&conversation).await.unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/conversations/{}", conversation.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        let messages = parsed["messages"].as_array().unwrap();

        // system, welcome, user, answer — the tool exchange is omitted
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3]["content"], "answer");
        assert_eq!(parsed["finished"], false);
    }
}
