use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use campusdesk_core::{directory, identity, tickets, verification};
use campusdesk_types::api::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, join_err};

pub async fn students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let overview = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        directory::students_with_tickets(&db, &actor)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(overview))
}

pub async fn student_tickets(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let all = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        tickets::student_tickets(&db, &actor, student_id)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(all))
}

pub async fn pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let admins = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        directory::pending_admins(&db, &actor)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(admins))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        verification::approve_admin(&db, &actor, user_id)
    })
    .await
    .map_err(join_err)??;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn reject(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        verification::reject_admin(&db, &actor, user_id)
    })
    .await
    .map_err(join_err)??;

    Ok(StatusCode::NO_CONTENT)
}
