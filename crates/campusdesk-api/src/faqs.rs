use axum::{Extension, Json, extract::State, response::IntoResponse};

use campusdesk_types::api::Claims;
use campusdesk_types::models::{Faq, parse_row_timestamp, parse_row_uuid};

use crate::auth::AppState;
use crate::error::{ApiError, join_err};

pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_faqs())
        .await
        .map_err(join_err)?
        .map_err(campusdesk_core::CoreError::Transient)?;

    let faqs: Vec<Faq> = rows
        .into_iter()
        .map(|row| Faq {
            id: parse_row_uuid(&row.id, "faq id"),
            question: row.question,
            answer: row.answer,
            category: row.category,
            created_at: parse_row_timestamp(&row.created_at, "faq"),
        })
        .collect();

    Ok(Json(faqs))
}
