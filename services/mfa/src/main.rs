use sea_orm::Database;
use tracing::info;

use bilten_core::tracing::init_tracing;
use bilten_mfa::config::MfaConfig;
use bilten_mfa::router::build_router;
use bilten_mfa::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = MfaConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    let state = AppState { db, redis };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.mfa_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("mfa service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
