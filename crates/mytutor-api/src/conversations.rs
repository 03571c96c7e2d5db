use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use mytutor_db::models::format_timestamp;
use mytutor_types::api::{Claims, ConversationResponse, CreateConversationRequest};
use mytutor_types::models::ConnectedAccount;

use crate::state::{AppState, blocking};

fn to_response(account: &ConnectedAccount, caller: &str) -> Option<ConversationResponse> {
    Some(ConversationResponse {
        connected_id: account.id.clone(),
        peer_id: account.peer_of(caller)?.to_string(),
        created_at: account.created_at,
    })
}

/// Establish the conversation between the caller and `peer_id`, or return
/// the existing one.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let peer_id = req.peer_id.trim().to_string();
    if peer_id.is_empty() || peer_id == claims.sub {
        return Err(StatusCode::BAD_REQUEST);
    }

    let caller = claims.sub.clone();
    let (account, created) = blocking(&state, move |db| {
        let id = Uuid::new_v4().to_string();
        let (row, created) =
            db.create_connected_account(&id, &caller, &peer_id, &format_timestamp(Utc::now()))?;
        Ok((ConnectedAccount::try_from(row)?, created))
    })
    .await?;

    if created {
        info!("{} connected with {} ({})", account.user_a, account.user_b, account.id);
    }

    let body = to_response(&account, &claims.sub).ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(body)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let caller = claims.sub.clone();
    let accounts = blocking(&state, move |db| {
        db.list_connected_accounts(&caller)?
            .into_iter()
            .map(ConnectedAccount::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    let conversations: Vec<ConversationResponse> = accounts
        .iter()
        .filter_map(|account| to_response(account, &claims.sub))
        .collect();

    Ok(Json(conversations))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_create_conversation_is_idempotent() {
        let app = TestApp::new();

        let (status, first) = app.post("u1", "/conversations", json!({"peerId": "u2"})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["peerId"], "u2");

        // Same pair from the other side resolves to the same conversation
        let (status, second) = app.post("u2", "/conversations", json!({"peerId": "u1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["connectedId"], first["connectedId"]);
        assert_eq!(second["peerId"], "u1");
    }

    #[tokio::test]
    async fn test_create_conversation_with_self_is_rejected() {
        let app = TestApp::new();
        let (status, _) = app.post("u1", "/conversations", json!({"peerId": "u1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.post("u1", "/conversations", json!({"peerId": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_conversations() {
        let app = TestApp::new();
        app.post("u1", "/conversations", json!({"peerId": "u2"})).await;
        app.post("u3", "/conversations", json!({"peerId": "u1"})).await;
        app.post("u2", "/conversations", json!({"peerId": "u3"})).await;

        let (status, body) = app.get("u1", "/conversations").await;
        assert_eq!(status, StatusCode::OK);
        let mut peers: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["peerId"].as_str().unwrap())
            .collect();
        peers.sort();
        assert_eq!(peers, vec!["u2", "u3"]);
    }

    #[tokio::test]
    async fn test_requires_token() {
        let app = TestApp::new();
        let status = app.get_without_token("/conversations").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
