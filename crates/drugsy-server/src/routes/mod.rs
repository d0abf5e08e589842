pub mod chat;
pub mod conversation;

use axum::Router;

use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes())
        .merge(conversation::routes())
        .with_state(state)
}
