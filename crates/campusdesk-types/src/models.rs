use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Ticket lifecycle status. Stored and serialized as the display strings
/// (`"In Progress"` carries a space), so parsing goes through `parse` rather
/// than a derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "Pending",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Resolved => "Resolved",
        }
    }

    pub fn parse(s: &str) -> Option<TicketStatus> {
        match s {
            "Pending" => Some(TicketStatus::Pending),
            "In Progress" => Some(TicketStatus::InProgress),
            "Resolved" => Some(TicketStatus::Resolved),
            _ => None,
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCategory {
    Portal,
    Academics,
    Housing,
    Finance,
    Other,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Portal => "Portal",
            TicketCategory::Academics => "Academics",
            TicketCategory::Housing => "Housing",
            TicketCategory::Finance => "Finance",
            TicketCategory::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<TicketCategory> {
        match s {
            "Portal" => Some(TicketCategory::Portal),
            "Academics" => Some(TicketCategory::Academics),
            "Housing" => Some(TicketCategory::Housing),
            "Finance" => Some(TicketCategory::Finance),
            "Other" => Some(TicketCategory::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub university: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A support request. Carries the owning student's name and university so
/// scoping decisions and admin views don't need a second profile fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub university: String,
    pub category: TicketCategory,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub posted_by: Uuid,
    pub posted_by_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Per-student ticket counts for the admin directory.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TicketStats {
    pub total: u32,
    pub pending: u32,
    pub in_progress: u32,
    pub resolved: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentOverview {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub university: String,
    pub photo_url: Option<String>,
    pub stats: TicketStats,
}

/// Parse a stored id, falling back to the nil UUID on corrupt rows so one
/// bad record can't take down a whole listing.
pub fn parse_row_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

/// Parse a SQLite timestamp. `datetime('now')` stores "YYYY-MM-DD HH:MM:SS"
/// without a timezone, so fall back to naive-UTC when RFC 3339 parsing fails.
pub fn parse_row_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, what, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_strings() {
        for status in [
            TicketStatus::Pending,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
        ] {
            assert_eq!(TicketStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("InProgress"), None);
    }

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let ts = parse_row_timestamp("2026-03-01 12:30:00", "test row");
        assert_eq!(ts.to_rfc3339(), "2026-03-01T12:30:00+00:00");
    }
}
