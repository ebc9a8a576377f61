use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use campusdesk_api::auth::{self, AppState, AppStateInner};
use campusdesk_api::middleware::require_auth;
use campusdesk_api::{admin, announcements, faqs, profile, tickets};
use campusdesk_core::sync::ChangeBus;
use campusdesk_gateway::connection;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campusdesk=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("CAMPUSDESK_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("CAMPUSDESK_DB_PATH").unwrap_or_else(|_| "campusdesk.db".into());
    let host = std::env::var("CAMPUSDESK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CAMPUSDESK_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(campusdesk_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let bus = ChangeBus::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: jwt_secret.clone(),
        bus,
    });

    let state = ServerState {
        app: app_state.clone(),
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/tickets", get(tickets::list_tickets).post(tickets::create_ticket))
        .route("/tickets/{ticket_id}", get(tickets::get_ticket))
        .route("/tickets/{ticket_id}/status", put(tickets::set_status))
        .route(
            "/tickets/{ticket_id}/messages",
            get(tickets::list_messages).post(tickets::send_message),
        )
        .route(
            "/announcements",
            get(announcements::list).post(announcements::post_announcement),
        )
        .route("/faqs", get(faqs::list))
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/admin/students", get(admin::students))
        .route("/admin/students/{student_id}/tickets", get(admin::student_tickets))
        .route("/admin/pending", get(admin::pending))
        .route("/admin/{user_id}/approve", post(admin::approve))
        .route("/admin/{user_id}/reject", post(admin::reject))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("CampusDesk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.app.db.clone(),
            state.app.bus.clone(),
            state.jwt_secret,
        )
    })
}
