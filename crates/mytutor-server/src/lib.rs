pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use mytutor_api::routes;
use mytutor_api::state::{AppState, AppStateInner};
use mytutor_db::Database;
use mytutor_gateway::connection;
use mytutor_gateway::dispatcher::Dispatcher;
use mytutor_gateway::relay::{MessageRelay, RelayPolicy};
use mytutor_gateway::store::SqliteStore;

#[derive(Debug, Deserialize)]
struct SocketQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Build the full application: REST routes plus the `/socket` gateway.
pub fn app(db: Arc<Database>, jwt_secret: String, policy: RelayPolicy) -> Router {
    let dispatcher = Dispatcher::in_memory();
    let relay = MessageRelay::new(
        dispatcher.clone(),
        Arc::new(SqliteStore::new(db.clone())),
        policy,
    );

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        dispatcher,
    });

    let ws_route = Router::new()
        .route("/socket", get(ws_upgrade))
        .with_state(relay);

    Router::new()
        .merge(routes::router(app_state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(relay): State<MessageRelay>,
    Query(query): Query<SocketQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // A blank id counts as missing
    let user_id = query.user_id.filter(|id| !id.trim().is_empty());
    ws.on_upgrade(move |socket| connection::handle_connection(socket, relay, user_id))
}
