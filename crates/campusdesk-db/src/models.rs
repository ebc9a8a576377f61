/// Database row types — these map directly to SQLite rows.
/// Distinct from the campusdesk-types API models to keep the DB layer
/// independent; timestamps stay as the raw TEXT SQLite stores.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub university: String,
    pub photo_url: Option<String>,
    pub created_at: String,
}

pub struct RoleRow {
    pub user_id: String,
    pub role: String,
    pub is_verified: bool,
}

pub struct TicketRow {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub student_university: String,
    pub category: String,
    pub description: String,
    pub status: String,
    pub created_at: String,
}

pub struct ChatRow {
    pub id: String,
    pub ticket_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    pub created_at: String,
}

pub struct AnnouncementRow {
    pub id: String,
    pub title: String,
    pub message: String,
    pub posted_by: String,
    pub posted_by_name: String,
    pub created_at: String,
}

pub struct FaqRow {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub created_at: String,
}

/// One directory line: a student plus their per-status ticket counts.
pub struct StudentStatsRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub university: String,
    pub photo_url: Option<String>,
    pub total: u32,
    pub pending: u32,
    pub in_progress: u32,
    pub resolved: u32,
}
