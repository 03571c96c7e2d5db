use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use mytutor_db::models::{format_timestamp, parse_timestamp};
use mytutor_types::api::Claims;
use mytutor_types::models::{ChatMessage, ConnectedAccount};

use crate::state::{AppState, blocking};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: pass the `createdAt` of the oldest message
    /// from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

const MAX_LIMIT: u32 = 200;

/// Message history of a conversation, newest first. Only its two parties
/// may read it.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(connected_id): Path<String>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    // Normalise the cursor to the stored timestamp format
    let before = query
        .before
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|_| StatusCode::BAD_REQUEST)?
        .map(format_timestamp);
    let limit = query.limit.clamp(1, MAX_LIMIT);

    let cid = connected_id.clone();
    let account = blocking(&state, move |db| {
        db.get_connected_account(&cid)?
            .map(ConnectedAccount::try_from)
            .transpose()
    })
    .await?
    .ok_or(StatusCode::NOT_FOUND)?;
    if !account.has_participant(&claims.sub) {
        return Err(StatusCode::FORBIDDEN);
    }

    let messages = blocking(&state, move |db| {
        db.get_messages(&connected_id, limit, before.as_deref())?
            .into_iter()
            .map(ChatMessage::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(messages))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_history_is_newest_first_with_cursor() {
        let app = TestApp::new();
        let connected_id = app.connect_pair("u1", "u2").await;
        for body in ["one", "two", "three"] {
            app.insert_message(&connected_id, "u1", "u2", body).await;
        }

        let (status, page) = app
            .get("u2", &format!("/conversations/{}/messages?limit=2", connected_id))
            .await;
        assert_eq!(status, StatusCode::OK);
        let bodies: Vec<&str> = page
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message"].as_str().unwrap())
            .collect();
        assert_eq!(bodies, vec!["three", "two"]);

        let cursor = page[1]["createdAt"].as_str().unwrap().to_string();
        let (status, older) = app
            .get(
                "u1",
                &format!(
                    "/conversations/{}/messages?before={}",
                    connected_id,
                    cursor.replace('+', "%2B")
                ),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(older.as_array().unwrap().len(), 1);
        assert_eq!(older[0]["message"], "one");
    }

    #[tokio::test]
    async fn test_history_forbidden_for_outsider() {
        let app = TestApp::new();
        let connected_id = app.connect_pair("u1", "u2").await;

        let (status, _) = app
            .get("u3", &format!("/conversations/{}/messages", connected_id))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_history_unknown_conversation() {
        let app = TestApp::new();
        let (status, _) = app.get("u1", "/conversations/nope/messages").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_rejects_bad_cursor() {
        let app = TestApp::new();
        let connected_id = app.connect_pair("u1", "u2").await;
        let (status, _) = app
            .get(
                "u1",
                &format!("/conversations/{}/messages?before=yesterday", connected_id),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
