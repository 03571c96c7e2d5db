use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use mytutor_db::Database;
use mytutor_db::models::{MessageRow, format_timestamp};
use mytutor_gateway::dispatcher::Dispatcher;
use mytutor_types::api::Claims;

use crate::routes::router;
use crate::state::{AppState, AppStateInner};

const SECRET: &str = "test-secret";

pub struct TestApp {
    pub state: AppState,
    router: Router,
    clock: AtomicI64,
}

impl TestApp {
    pub fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            jwt_secret: SECRET.to_string(),
            dispatcher: Dispatcher::in_memory(),
        });
        Self {
            router: router(state.clone()),
            state,
            clock: AtomicI64::new(0),
        }
    }

    pub fn token(user_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    pub async fn get(&self, user_id: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", Self::token(user_id)))
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn post(&self, user_id: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", Self::token(user_id)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn get_without_token(&self, uri: &str) -> StatusCode {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        self.send(req).await.0
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn connect_pair(&self, a: &str, b: &str) -> String {
        let (row, _) = self
            .state
            .db
            .create_connected_account(&Uuid::new_v4().to_string(), a, b, &format_timestamp(Utc::now()))
            .unwrap();
        row.id
    }

    /// Insert with strictly increasing timestamps so ordering is deterministic.
    pub async fn insert_message(&self, connected_id: &str, sender: &str, receiver: &str, body: &str) {
        let step = self.clock.fetch_add(1, Ordering::SeqCst);
        self.state
            .db
            .insert_message(&MessageRow {
                id: Uuid::new_v4().to_string(),
                connected_id: connected_id.to_string(),
                sender_id: sender.to_string(),
                receiver_id: receiver.to_string(),
                body: body.to_string(),
                created_at: format_timestamp(Utc::now() + Duration::milliseconds(step * 10)),
            })
            .unwrap();
    }
}
