use actix_web::{web, App, HttpServer};
use direct_chat_service::{
    auth::{HttpCookieVerifier, TokenCodec},
    config, error, logging, routes,
    services::membership::HttpMembershipLookup,
    state::AppState,
    storage::memory::MemoryStore,
    storage::ChatStore,
    websocket::{
        fanout::{FanoutTransport, LocalFanout, RedisFanout},
        ConnectionRegistry, SessionRegistry,
    },
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    // Pluggable tuple-store backend; in-memory is the built-in one.
    let store: Arc<dyn ChatStore> = Arc::new(MemoryStore::new());
    let registry = ConnectionRegistry::new();
    let sessions = SessionRegistry::new();

    let fanout: Arc<dyn FanoutTransport> = match &cfg.redis_url {
        Some(url) => {
            let fanout = RedisFanout::connect(url, registry.clone())
                .await
                .map_err(|e| error::AppError::StartServer(format!("redis fanout: {e}")))?;
            tracing::info!("cross-instance fanout connected");
            Arc::new(fanout)
        }
        None => {
            tracing::info!("REDIS_URL not set, using in-process fanout");
            Arc::new(LocalFanout::new(registry.clone()))
        }
    };

    let verifier = Arc::new(HttpCookieVerifier::new(cfg.backend_base_url.clone()));
    let membership = Arc::new(HttpMembershipLookup::new(cfg.backend_base_url.clone()));
    let tokens = Arc::new(TokenCodec::new(
        cfg.secret_key.clone(),
        cfg.token_algorithm,
    ));

    let state = AppState {
        store,
        registry,
        sessions,
        fanout,
        verifier,
        membership,
        tokens,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting direct-chat-service");

    let cors_origins = cfg.cors_origins.clone();
    HttpServer::new(move || {
        let mut cors = actix_cors::Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::chat::get_user_chat_rooms)
            .service(routes::chat::get_room_messages)
            .service(routes::prekeys::check_prekey_bundle_exists)
            .service(routes::prekeys::claim_prekey_bundle)
            .service(routes::prekeys::upload_prekey_bundle)
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run: {e}")))
}
