use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use mytutor_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mytutor=debug,mytutor_server=debug,mytutor_gateway=debug,mytutor_api=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "membership verification {}, sender binding {}",
        if config.policy.verify_membership { "on" } else { "off" },
        if config.policy.bind_sender { "on" } else { "off" },
    );

    // Init database
    let db = Arc::new(mytutor_db::Database::open(&config.db_path)?);

    let app = mytutor_server::app(db, config.jwt_secret.clone(), config.policy);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("MyTutor server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
