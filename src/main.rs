use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum_server::tls_openssl::OpenSSLConfig;
use log::{error, info};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod auth;
mod conversation;
mod error;
mod event;
mod integration;
mod message;
mod schema;
mod state;
mod user;

type Result<T> = std::result::Result<T, error::Error>;

#[tokio::main]
async fn main() {
    integration::init_logger().expect("Failed to initialize logger");
    let cfg = integration::Config::env().expect("Failed to load configuration");

    let app_state = AppState::init(&cfg)
        .await
        .expect("Failed to initialize application state");

    let protected = Router::new()
        .nest(
            "/api",
            conversation::api(app_state.clone()).merge(message::api(app_state.clone())),
        )
        .merge(event::api(app_state.clone()))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            auth::middleware::authorize,
        ));

    let app = Router::new()
        .merge(protected)
        .route("/health", get(|| async { "OK" }))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(cfg.allow_origin())
                    .allow_methods(cfg.env.allow_methods())
                    .allow_headers(cfg.env.allow_headers()),
            ),
        );

    let addr = cfg.env.addr();
    info!("Starting {:?} server on {addr}", cfg.env);

    let served = match &cfg.tls {
        Some(tls) => {
            let ssl_config = OpenSSLConfig::from_pem_file(&tls.cert_file, &tls.key_file)
                .expect("Failed to load TLS certificate");
            axum_server::bind_openssl(addr, ssl_config)
                .serve(app.into_make_service())
                .await
        }
        None => {
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        error!("Server stopped: {e}");
    }
}
