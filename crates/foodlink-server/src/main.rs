mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use foodlink_api::{AppState, AppStateInner, auth};
use foodlink_db::Database;
use foodlink_gateway::connection;
use foodlink_gateway::dispatcher::Dispatcher;
use foodlink_types::models::Role;

use crate::config::{AdminSeed, Config};

#[derive(Clone)]
struct ServerState {
    db: Database,
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foodlink=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::open(&config.db_path)?;

    if let Some(seed) = &config.admin {
        bootstrap_admin(&db, seed)?;
    }

    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
        dispatcher: dispatcher.clone(),
    });

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState {
            db,
            dispatcher,
            jwt_secret: config.jwt_secret.clone(),
        });

    let app = foodlink_api::router(app_state)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("FoodLink server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.db, state.jwt_secret)
    })
}

/// Create the configured admin unless that email is already registered.
fn bootstrap_admin(db: &Database, seed: &AdminSeed) -> anyhow::Result<()> {
    if db.get_user_by_email(&seed.email)?.is_some() {
        info!("Admin bootstrap skipped, {} already exists", seed.email);
        return Ok(());
    }
    if seed.password.len() < 8 {
        anyhow::bail!("FOODLINK_ADMIN_PASSWORD must be at least 8 characters");
    }

    let hash = auth::hash_password(&seed.password)?;
    db.create_user(Uuid::new_v4(), &seed.email, &hash, "Administrator", Role::Admin)?;
    info!("Created admin account {}", seed.email);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable ({}), waiting for Ctrl+C", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
