use axum::{Json, extract::State};

use mytutor_types::api::PresenceResponse;

use crate::state::AppState;

pub async fn online_users(State(state): State<AppState>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        online_users: state.dispatcher.online_users().await,
    })
}
