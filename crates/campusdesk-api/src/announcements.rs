use axum::{
    Extension, Json, extract::State, http::StatusCode, response::IntoResponse,
};

use campusdesk_core::{announcements, identity};
use campusdesk_types::api::{Claims, PostAnnouncementRequest};

use crate::auth::AppState;
use crate::error::{ApiError, join_err};

pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let all = tokio::task::spawn_blocking(move || announcements::list(&db))
        .await
        .map_err(join_err)??;

    Ok(Json(all))
}

pub async fn post_announcement(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    let message = req.message.trim().to_string();
    if title.is_empty() || message.is_empty() {
        return Err(ApiError::BadRequest("title and message must not be empty"));
    }

    let db = state.db.clone();
    let bus = state.bus.clone();
    let posted = tokio::task::spawn_blocking(move || {
        let actor = identity::resolve(&db, claims.sub)?;
        announcements::post(&db, &bus, &actor, &title, &message)
    })
    .await
    .map_err(join_err)??;

    Ok((StatusCode::CREATED, Json(posted)))
}
