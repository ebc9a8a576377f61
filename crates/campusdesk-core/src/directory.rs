use campusdesk_db::Database;
use campusdesk_db::models::ProfileRow;
use campusdesk_types::models::{
    Profile, StudentOverview, TicketStats, parse_row_timestamp, parse_row_uuid,
};

use crate::error::CoreResult;
use crate::identity::Actor;
use crate::policy::{self, Action};

pub(crate) fn profile_from_row(row: ProfileRow) -> Profile {
    Profile {
        id: parse_row_uuid(&row.id, "profile id"),
        full_name: row.full_name,
        email: row.email,
        university: row.university,
        photo_url: row.photo_url,
        created_at: parse_row_timestamp(&row.created_at, "profile"),
    }
}

/// Students of the actor's university with at least one ticket, annotated
/// with per-status counts. A plain aggregation over storage at call time —
/// no cache to go stale.
pub fn students_with_tickets(db: &Database, actor: &Actor) -> CoreResult<Vec<StudentOverview>> {
    policy::require(actor, &Action::ViewDirectory)?;

    let rows = db.student_ticket_stats(&actor.university)?;
    Ok(rows
        .into_iter()
        .map(|row| StudentOverview {
            id: parse_row_uuid(&row.id, "student id"),
            full_name: row.full_name,
            email: row.email,
            university: row.university,
            photo_url: row.photo_url,
            stats: TicketStats {
                total: row.total,
                pending: row.pending,
                in_progress: row.in_progress,
                resolved: row.resolved,
            },
        })
        .collect())
}

/// Admins of the actor's university still awaiting verification.
pub fn pending_admins(db: &Database, actor: &Actor) -> CoreResult<Vec<Profile>> {
    policy::require(actor, &Action::ViewDirectory)?;

    let rows = db.pending_admins(&actor.university)?;
    Ok(rows.into_iter().map(profile_from_row).collect())
}
