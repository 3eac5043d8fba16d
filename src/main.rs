use actix_web::{web, App, HttpServer};
use ephemeral_chat_service::{
    config, db, error, logging, routes,
    services::{ExpirationSweeper, VisibilityService},
    state::AppState,
    store::{MemoryStore, PostgresStore, VisibilityStore},
};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let store: Arc<dyn VisibilityStore> = match &cfg.database_url {
        Some(url) => {
            let pool = db::init_pool(url).await?;
            tracing::info!("using postgres ledger store");
            Arc::new(PostgresStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory ledger store");
            Arc::new(MemoryStore::new())
        }
    };

    let visibility = Arc::new(VisibilityService::new(
        store.clone(),
        cfg.max_conflict_retries,
    ));

    // Shutdown signal shared with the sweeper
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_signal.send(true);
        }
    });

    let sweeper = Arc::new(ExpirationSweeper::new(
        store.clone(),
        cfg.sweeper.interval_secs,
        cfg.sweeper.media_ttl_hours,
    ));
    let sweeper_handle = sweeper.spawn(shutdown_rx);

    let state = AppState {
        store: store.clone(),
        visibility,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting ephemeral-chat-service");

    let rest_state = state.clone();
    let rest_server = HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(rest_state.clone()))
            .service(routes::conversations::create_conversation)
            .service(routes::conversations::open_conversation)
            .service(routes::conversations::get_messages)
            .service(routes::messages::send_message)
            .service(routes::messages::toggle_save)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind REST: {e}")))?
    .run();

    let result = rest_server
        .await
        .map_err(|e| error::AppError::StartServer(format!("REST server: {e}")));

    // Let the sweeper finish its cycle before exiting
    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    result
}
