use std::sync::Arc;

use campusdesk_db::Database;
use campusdesk_db::models::TicketRow;
use campusdesk_types::events::{ChangeEvent, Collection};
use campusdesk_types::models::{
    Role, Ticket, TicketCategory, TicketStatus, parse_row_timestamp, parse_row_uuid,
};
use tracing::warn;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::identity::Actor;
use crate::policy::{self, Action, TicketScope};
use crate::sync::{ChangeBus, Subscription, subscribe};

pub(crate) fn ticket_from_row(row: TicketRow) -> Ticket {
    let id = parse_row_uuid(&row.id, "ticket id");
    Ticket {
        id,
        student_id: parse_row_uuid(&row.student_id, "ticket student_id"),
        student_name: row.student_name,
        university: row.student_university,
        category: TicketCategory::parse(&row.category).unwrap_or_else(|| {
            warn!("Corrupt category '{}' on ticket '{}'", row.category, row.id);
            TicketCategory::Other
        }),
        description: row.description,
        status: TicketStatus::parse(&row.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on ticket '{}'", row.status, row.id);
            TicketStatus::Pending
        }),
        created_at: parse_row_timestamp(&row.created_at, "ticket"),
    }
}

pub(crate) fn scope_of(ticket: &Ticket) -> TicketScope {
    TicketScope {
        student_id: ticket.student_id,
        university: ticket.university.clone(),
    }
}

/// File a new request. Students only; the actor is always the owner and the
/// lifecycle always starts at Pending.
pub fn create_ticket(
    db: &Database,
    bus: &ChangeBus,
    actor: &Actor,
    category: TicketCategory,
    description: &str,
) -> CoreResult<Ticket> {
    policy::require(actor, &Action::CreateTicket)?;

    let id = Uuid::new_v4();
    db.insert_ticket(
        &id.to_string(),
        &actor.user_id.to_string(),
        category.as_str(),
        description,
        TicketStatus::Pending.as_str(),
    )?;
    let row = db
        .get_ticket(&id.to_string())?
        .ok_or(CoreError::NotFound("ticket"))?;

    bus.publish(ChangeEvent::ticket(id, actor.user_id));
    Ok(ticket_from_row(row))
}

/// Policy-checked read without side effects.
pub fn fetch_ticket(db: &Database, actor: &Actor, ticket_id: Uuid) -> CoreResult<Ticket> {
    let row = db
        .get_ticket(&ticket_id.to_string())?
        .ok_or(CoreError::NotFound("ticket"))?;
    let ticket = ticket_from_row(row);
    policy::require(actor, &Action::ReadTicket(&scope_of(&ticket)))?;
    Ok(ticket)
}

/// Load one ticket for display. Viewing is what moves a Pending ticket
/// forward: the first load by an admin who could also change the status
/// advances it to In Progress, exactly once. The advance is best-effort —
/// losing the race to another admin, or a storage hiccup, leaves the last
/// known status on screen and the next reload shows the winner.
pub fn load_ticket(db: &Database, bus: &ChangeBus, actor: &Actor, ticket_id: Uuid) -> CoreResult<Ticket> {
    let mut ticket = fetch_ticket(db, actor, ticket_id)?;

    if ticket.status == TicketStatus::Pending
        && policy::can_perform(actor, &Action::SetTicketStatus(&scope_of(&ticket)))
    {
        match db.set_ticket_status_if(
            &ticket.id.to_string(),
            TicketStatus::Pending.as_str(),
            TicketStatus::InProgress.as_str(),
        ) {
            Ok(1) => {
                ticket.status = TicketStatus::InProgress;
                bus.publish(ChangeEvent::ticket(ticket.id, ticket.student_id));
            }
            Ok(_) => {} // another writer got there first
            Err(e) => warn!("auto-advance failed for ticket {}: {}", ticket.id, e),
        }
    }

    Ok(ticket)
}

/// Explicit status override. Verified same-university admins may move a
/// ticket between any two states at any time; nobody else moves it at all.
pub fn set_status(
    db: &Database,
    bus: &ChangeBus,
    actor: &Actor,
    ticket_id: Uuid,
    status: TicketStatus,
) -> CoreResult<Ticket> {
    let ticket = fetch_ticket(db, actor, ticket_id)?;
    policy::require(actor, &Action::SetTicketStatus(&scope_of(&ticket)))?;

    let rows = db.set_ticket_status(&ticket.id.to_string(), status.as_str())?;
    if rows == 0 {
        return Err(CoreError::Conflict);
    }

    bus.publish(ChangeEvent::ticket(ticket.id, ticket.student_id));

    let row = db
        .get_ticket(&ticket.id.to_string())?
        .ok_or(CoreError::NotFound("ticket"))?;
    Ok(ticket_from_row(row))
}

/// The caller's ticket list: a student sees their own requests, an admin
/// (verified or not — reading is allowed either way) sees the university's.
pub fn list_tickets(db: &Database, actor: &Actor) -> CoreResult<Vec<Ticket>> {
    let rows = match actor.role {
        Role::Student => db.tickets_by_student(&actor.user_id.to_string())?,
        Role::Admin => {
            if actor.university.is_empty() {
                return Err(CoreError::Forbidden);
            }
            db.tickets_by_university(&actor.university)?
        }
    };
    Ok(rows.into_iter().map(ticket_from_row).collect())
}

/// Directory drill-down: one student's tickets, for a verified admin of the
/// same university.
pub fn student_tickets(db: &Database, actor: &Actor, student_id: Uuid) -> CoreResult<Vec<Ticket>> {
    policy::require(actor, &Action::ViewDirectory)?;

    let profile = db
        .get_profile(&student_id.to_string())?
        .ok_or(CoreError::NotFound("student"))?;
    if profile.university != actor.university {
        return Err(CoreError::Forbidden);
    }

    let rows = db.tickets_by_student(&student_id.to_string())?;
    Ok(rows.into_iter().map(ticket_from_row).collect())
}

/// Live ticket-list feed, reloaded in full on every tickets change that
/// concerns the actor.
pub async fn subscribe_list(
    db: Arc<Database>,
    bus: &ChangeBus,
    actor: &Actor,
) -> CoreResult<Subscription<Ticket>> {
    let matcher_actor = actor.clone();
    let reload_actor = actor.clone();

    subscribe(
        db,
        bus,
        move |ev| {
            if ev.collection != Collection::Tickets {
                return false;
            }
            match matcher_actor.role {
                Role::Student => ev.student_id == Some(matcher_actor.user_id),
                // Out-of-university events trigger a spurious reload at
                // worst; the scoped query keeps the view correct.
                Role::Admin => true,
            }
        },
        move |db| {
            let rows = match reload_actor.role {
                Role::Student => db.tickets_by_student(&reload_actor.user_id.to_string())?,
                Role::Admin => db.tickets_by_university(&reload_actor.university)?,
            };
            Ok(rows.into_iter().map(ticket_from_row).collect())
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn students_create_pending_tickets_admins_cannot() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let admin = testutil::admin(&db, "Dana", "State U", true);

        let ticket =
            create_ticket(&db, &bus, &student, TicketCategory::Academics, "missing grade").unwrap();
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(ticket.student_id, student.user_id);
        assert_eq!(ticket.university, "State U");

        assert!(matches!(
            create_ticket(&db, &bus, &admin, TicketCategory::Other, "nope"),
            Err(CoreError::Forbidden)
        ));
    }

    #[test]
    fn admin_view_advances_pending_exactly_once() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let admin = testutil::admin(&db, "Dana", "State U", true);
        let ticket =
            create_ticket(&db, &bus, &student, TicketCategory::Academics, "missing grade").unwrap();

        let seen = load_ticket(&db, &bus, &admin, ticket.id).unwrap();
        assert_eq!(seen.status, TicketStatus::InProgress);

        // Repeat views change nothing further, even after resolution.
        let again = load_ticket(&db, &bus, &admin, ticket.id).unwrap();
        assert_eq!(again.status, TicketStatus::InProgress);
        set_status(&db, &bus, &admin, ticket.id, TicketStatus::Resolved).unwrap();
        let resolved = load_ticket(&db, &bus, &admin, ticket.id).unwrap();
        assert_eq!(resolved.status, TicketStatus::Resolved);
    }

    #[test]
    fn student_and_unverified_views_do_not_advance() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let unverified = testutil::admin(&db, "Uma", "State U", false);
        let ticket = create_ticket(&db, &bus, &student, TicketCategory::Portal, "locked out").unwrap();

        assert_eq!(
            load_ticket(&db, &bus, &student, ticket.id).unwrap().status,
            TicketStatus::Pending
        );
        assert_eq!(
            load_ticket(&db, &bus, &unverified, ticket.id).unwrap().status,
            TicketStatus::Pending
        );
    }

    #[test]
    fn unauthorized_status_changes_leave_storage_untouched() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let unverified = testutil::admin(&db, "Uma", "State U", false);
        let foreign = testutil::admin(&db, "Fay", "Other U", true);
        let ticket = create_ticket(&db, &bus, &student, TicketCategory::Finance, "fee dispute").unwrap();

        for actor in [&student, &unverified] {
            assert!(matches!(
                set_status(&db, &bus, actor, ticket.id, TicketStatus::Resolved),
                Err(CoreError::Forbidden)
            ));
        }
        // The out-of-university admin can't even see it.
        assert!(matches!(
            set_status(&db, &bus, &foreign, ticket.id, TicketStatus::Resolved),
            Err(CoreError::Forbidden)
        ));

        let stored = db.get_ticket(&ticket.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.status, "Pending");
    }

    #[test]
    fn admin_override_moves_any_state_to_any_state() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let admin = testutil::admin(&db, "Dana", "State U", true);
        let ticket = create_ticket(&db, &bus, &student, TicketCategory::Housing, "no heat").unwrap();

        let t = set_status(&db, &bus, &admin, ticket.id, TicketStatus::Resolved).unwrap();
        assert_eq!(t.status, TicketStatus::Resolved);
        // Reopening straight back to Pending is an allowed override.
        let t = set_status(&db, &bus, &admin, ticket.id, TicketStatus::Pending).unwrap();
        assert_eq!(t.status, TicketStatus::Pending);
    }

    #[test]
    fn missing_tickets_report_not_found() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let admin = testutil::admin(&db, "Dana", "State U", true);

        assert!(matches!(
            set_status(&db, &bus, &admin, Uuid::new_v4(), TicketStatus::Resolved),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            load_ticket(&db, &bus, &admin, Uuid::new_v4()),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn lists_are_scoped_to_owner_or_university() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let sam = testutil::student(&db, "Sam", "State U");
        let eli = testutil::student(&db, "Eli", "Other U");
        let admin = testutil::admin(&db, "Dana", "State U", true);
        create_ticket(&db, &bus, &sam, TicketCategory::Portal, "locked out").unwrap();
        create_ticket(&db, &bus, &eli, TicketCategory::Portal, "also locked out").unwrap();

        let sams = list_tickets(&db, &sam).unwrap();
        assert_eq!(sams.len(), 1);
        assert_eq!(sams[0].student_id, sam.user_id);

        let admins = list_tickets(&db, &admin).unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].university, "State U");
    }

    #[test]
    fn drill_down_respects_university_boundary() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let sam = testutil::student(&db, "Sam", "State U");
        let eli = testutil::student(&db, "Eli", "Other U");
        let admin = testutil::admin(&db, "Dana", "State U", true);
        create_ticket(&db, &bus, &sam, TicketCategory::Portal, "locked out").unwrap();

        assert_eq!(student_tickets(&db, &admin, sam.user_id).unwrap().len(), 1);
        assert!(matches!(
            student_tickets(&db, &admin, eli.user_id),
            Err(CoreError::Forbidden)
        ));
        assert!(matches!(
            student_tickets(&db, &admin, Uuid::new_v4()),
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn ticket_feed_tracks_status_changes() {
        let (_dir, db) = testutil::open_db();
        let db = Arc::new(db);
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let admin = testutil::admin(&db, "Dana", "State U", true);

        let sub = subscribe_list(db.clone(), &bus, &student).await.unwrap();
        assert!(sub.view().is_empty());

        let ticket =
            create_ticket(&db, &bus, &student, TicketCategory::Academics, "missing grade").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(sub.view().len(), 1);
        assert_eq!(sub.view()[0].status, TicketStatus::Pending);

        set_status(&db, &bus, &admin, ticket.id, TicketStatus::Resolved).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(sub.view()[0].status, TicketStatus::Resolved);
    }
}
