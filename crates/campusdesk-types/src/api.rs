use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, TicketCategory, TicketStatus};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket gateway.
/// Deliberately minimal: role and university are resolved from storage per
/// request, never trusted from the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub university: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub role: Role,
    pub is_verified: bool,
    pub token: String,
}

// -- Tickets --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTicketRequest {
    pub category: TicketCategory,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetStatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub message: String,
}

// -- Announcements --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostAnnouncementRequest {
    pub title: String,
    pub message: String,
}

// -- Profile --

/// Only display fields are editable; role and university are fixed at
/// registration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub full_name: String,
    pub photo_url: Option<String>,
}
