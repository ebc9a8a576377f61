use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use campusdesk_core::{conversation, identity, tickets};
use campusdesk_types::api::{Claims, CreateTicketRequest, SendMessageRequest, SetStatusRequest};

use crate::auth::AppState;
use crate::error::{ApiError, join_err};

pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let description = req.description.trim().to_string();
    if description.is_empty() {
        return Err(ApiError::BadRequest("description must not be empty"));
    }

    let db = state.db.clone();
    let bus = state.bus.clone();
    let ticket = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        tickets::create_ticket(&db, &bus, &actor, req.category, &description)
    })
    .await
    .map_err(join_err)??;

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let all = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        tickets::list_tickets(&db, &actor)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(all))
}

/// The view path: loading a Pending ticket as a verified admin is what
/// advances it to In Progress.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let bus = state.bus.clone();
    let ticket = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        tickets::load_ticket(&db, &bus, &actor, ticket_id)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(ticket))
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let bus = state.bus.clone();
    let ticket = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        tickets::set_status(&db, &bus, &actor, ticket_id, req.status)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(ticket))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let messages = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        conversation::load_messages(&db, &actor, ticket_id)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty"));
    }

    let db = state.db.clone();
    let bus = state.bus.clone();
    let posted = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        conversation::post_message(&db, &bus, &actor, ticket_id, &message)
    })
    .await
    .map_err(join_err)??;

    Ok((StatusCode::CREATED, Json(posted)))
}
