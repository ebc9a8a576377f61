use axum::{Extension, Json, extract::State, response::IntoResponse};

use campusdesk_core::CoreError;
use campusdesk_types::api::{Claims, UpdateProfileRequest};
use campusdesk_types::models::{Profile, parse_row_timestamp, parse_row_uuid};

use crate::auth::AppState;
use crate::error::{ApiError, join_err};

fn profile_response(row: campusdesk_db::models::ProfileRow) -> Profile {
    Profile {
        id: parse_row_uuid(&row.id, "profile id"),
        full_name: row.full_name,
        email: row.email,
        university: row.university,
        photo_url: row.photo_url,
        created_at: parse_row_timestamp(&row.created_at, "profile"),
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.get_profile(&claims.sub.to_string()))
        .await
        .map_err(join_err)?
        .map_err(CoreError::Transient)?
        .ok_or(CoreError::ProfileMissing(claims.sub))?;

    Ok(Json(profile_response(row)))
}

/// Display fields only; role and university are fixed at registration.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("full_name must not be empty"));
    }

    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let id = claims.sub.to_string();
        db.update_profile(&id, &full_name, req.photo_url.as_deref())?;
        db.get_profile(&id)
    })
    .await
    .map_err(join_err)?
    .map_err(CoreError::Transient)?
    .ok_or(CoreError::ProfileMissing(claims.sub))?;

    Ok(Json(profile_response(row)))
}
