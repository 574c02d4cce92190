//! Redlining Map Server - HTTP front end
//!
//! Wires the `redlining-lib` collection and the pin store into an axum router:
//!
//! - `GET /get-redlining-data?minLat&minLng&maxLat&maxLng`: zones fully inside a box
//! - `GET /search-redlining?keyword`: zones whose descriptions mention a keyword
//! - `GET /add-pin?userId&pinId&latitude&longitude&timestamp`: store a user pin
//! - `GET /get-all-pins`: list every pin
//! - `GET /drop-pins?userId`: remove all pins of a user

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    http::{
        HeaderName, Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN},
    },
    response::Response,
    routing::get,
};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod error;
pub mod routes;
pub mod settings;
pub mod state;
pub mod storage;

use error::error_envelope;
use routes::{
    add_pin_handler, drop_pins_handler, get_all_pins_handler, redlining_data_handler,
    search_handler,
};
pub use settings::Settings;
pub use state::AppState;

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Install the global `tracing` subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            X_REQUESTED_WITH,
            CONTENT_LENGTH,
            ACCEPT,
            ORIGIN,
        ])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {detail}");

    error_envelope(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Build the application router over shared state
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/get-redlining-data", get(redlining_data_handler))
        .route("/search-redlining", get(search_handler))
        .route("/add-pin", get(add_pin_handler))
        .route("/get-all-pins", get(get_all_pins_handler))
        .route("/drop-pins", get(drop_pins_handler))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load state from `settings`, bind and serve until ctrl-c or SIGTERM
pub async fn start_server(
    settings: Settings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing state...");
    let state = {
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || AppState::from_settings(&settings)).await??
    };

    info!("Starting server...");
    let app = build_router(Arc::new(state));

    let address = settings.bind_address();
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
