use std::sync::Arc;

use campusdesk_db::Database;
use campusdesk_db::models::ChatRow;
use campusdesk_types::events::{ChangeEvent, Collection};
use campusdesk_types::models::{TicketMessage, parse_row_timestamp, parse_row_uuid};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::identity::Actor;
use crate::policy::{self, Action, TicketScope};
use crate::sync::{ChangeBus, Subscription, subscribe};

fn message_from_row(row: ChatRow) -> TicketMessage {
    TicketMessage {
        id: parse_row_uuid(&row.id, "message id"),
        ticket_id: parse_row_uuid(&row.ticket_id, "message ticket_id"),
        sender_id: parse_row_uuid(&row.sender_id, "message sender_id"),
        sender_name: row.sender_name,
        message: row.message,
        created_at: parse_row_timestamp(&row.created_at, "message"),
    }
}

fn ticket_scope(db: &Database, ticket_id: Uuid) -> CoreResult<(TicketScope, Uuid)> {
    let row = db
        .get_ticket(&ticket_id.to_string())?
        .ok_or(CoreError::NotFound("ticket"))?;
    let student_id = parse_row_uuid(&row.student_id, "ticket student_id");
    Ok((
        TicketScope {
            student_id,
            university: row.student_university,
        },
        student_id,
    ))
}

/// Append one message to a ticket's thread. The stored row is the single
/// source of truth: callers see it through the published change event (or an
/// explicit reload), never through an optimistic local insertion that could
/// duplicate on reconciliation.
pub fn post_message(
    db: &Database,
    bus: &ChangeBus,
    actor: &Actor,
    ticket_id: Uuid,
    message: &str,
) -> CoreResult<TicketMessage> {
    let (scope, student_id) = ticket_scope(db, ticket_id)?;
    policy::require(actor, &Action::PostTicketMessage(&scope))?;

    let id = Uuid::new_v4();
    db.insert_chat(
        &id.to_string(),
        &ticket_id.to_string(),
        &actor.user_id.to_string(),
        message,
    )?;
    let row = db
        .get_chat(&id.to_string())?
        .ok_or(CoreError::NotFound("message"))?;

    bus.publish(ChangeEvent::chat(ticket_id, student_id));
    Ok(message_from_row(row))
}

/// The whole thread, ordered by (created_at, id) ascending — a total order
/// even when the clock's second granularity produces ties.
pub fn load_messages(db: &Database, actor: &Actor, ticket_id: Uuid) -> CoreResult<Vec<TicketMessage>> {
    let (scope, _) = ticket_scope(db, ticket_id)?;
    policy::require(actor, &Action::ReadTicket(&scope))?;

    let rows = db.chats_by_ticket(&ticket_id.to_string())?;
    Ok(rows.into_iter().map(message_from_row).collect())
}

/// Live view of one ticket's thread: full reload on every chats event for
/// that ticket. Read access is checked once up front; the storage queries
/// behind the reload are already scoped to the ticket.
pub async fn subscribe_messages(
    db: Arc<Database>,
    bus: &ChangeBus,
    actor: &Actor,
    ticket_id: Uuid,
) -> CoreResult<Subscription<TicketMessage>> {
    {
        let db = db.clone();
        let actor = actor.clone();
        tokio::task::spawn_blocking(move || -> CoreResult<()> {
            let (scope, _) = ticket_scope(&db, ticket_id)?;
            policy::require(&actor, &Action::ReadTicket(&scope))
        })
        .await
        .map_err(|e| CoreError::Transient(anyhow::anyhow!("subscription setup failed: {}", e)))??;
    }

    subscribe(
        db,
        bus,
        move |ev| ev.collection == Collection::Chats && ev.ticket_id == Some(ticket_id),
        move |db| {
            Ok(db
                .chats_by_ticket(&ticket_id.to_string())?
                .into_iter()
                .map(message_from_row)
                .collect())
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use campusdesk_types::models::{TicketCategory, TicketStatus};

    use super::*;
    use crate::testutil;
    use crate::tickets;

    #[test]
    fn participants_see_one_totally_ordered_thread() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let admin = testutil::admin(&db, "Dana", "State U", true);
        let ticket =
            tickets::create_ticket(&db, &bus, &student, TicketCategory::Academics, "missing grade")
                .unwrap();

        // Admin opens the ticket, then the two trade three messages.
        assert_eq!(
            tickets::load_ticket(&db, &bus, &admin, ticket.id).unwrap().status,
            TicketStatus::InProgress
        );
        post_message(&db, &bus, &student, ticket.id, "any update?").unwrap();
        post_message(&db, &bus, &admin, ticket.id, "looking into it").unwrap();
        post_message(&db, &bus, &student, ticket.id, "thanks!").unwrap();

        let student_view = load_messages(&db, &student, ticket.id).unwrap();
        let admin_view = load_messages(&db, &admin, ticket.id).unwrap();
        assert_eq!(student_view.len(), 3);

        // Both sides render the identical order, and that order is the
        // strict (created_at, id) total order — no duplicates, no drops.
        let ids: Vec<Uuid> = student_view.iter().map(|m| m.id).collect();
        assert_eq!(ids, admin_view.iter().map(|m| m.id).collect::<Vec<_>>());
        let keys: Vec<(chrono::DateTime<chrono::Utc>, String)> = student_view
            .iter()
            .map(|m| (m.created_at, m.id.to_string()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys, sorted);

        let bodies: std::collections::HashSet<&str> =
            student_view.iter().map(|m| m.message.as_str()).collect();
        assert!(bodies.contains("any update?") && bodies.contains("thanks!"));
        assert!(
            student_view
                .iter()
                .any(|m| m.sender_id == admin.user_id && m.message == "looking into it")
        );
    }

    #[test]
    fn posting_is_policy_gated() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let other_student = testutil::student(&db, "Eli", "State U");
        let unverified = testutil::admin(&db, "Uma", "State U", false);
        let foreign = testutil::admin(&db, "Fay", "Other U", true);
        let ticket =
            tickets::create_ticket(&db, &bus, &student, TicketCategory::Portal, "locked out").unwrap();

        for actor in [&other_student, &unverified, &foreign] {
            assert!(matches!(
                post_message(&db, &bus, actor, ticket.id, "hi"),
                Err(CoreError::Forbidden)
            ));
        }
        assert!(matches!(
            post_message(&db, &bus, &student, Uuid::new_v4(), "hi"),
            Err(CoreError::NotFound(_))
        ));

        // Unverified admins may still read.
        assert!(load_messages(&db, &unverified, ticket.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_reconciles_both_sides_identically() {
        let (_dir, db) = testutil::open_db();
        let db = Arc::new(db);
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let admin = testutil::admin(&db, "Dana", "State U", true);
        let ticket =
            tickets::create_ticket(&db, &bus, &student, TicketCategory::Academics, "missing grade")
                .unwrap();

        let student_sub = subscribe_messages(db.clone(), &bus, &student, ticket.id)
            .await
            .unwrap();
        let admin_sub = subscribe_messages(db.clone(), &bus, &admin, ticket.id)
            .await
            .unwrap();

        post_message(&db, &bus, &student, ticket.id, "any update?").unwrap();
        post_message(&db, &bus, &admin, ticket.id, "looking into it").unwrap();
        post_message(&db, &bus, &student, ticket.id, "thanks!").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let student_view: Vec<Uuid> = student_sub.view().iter().map(|m| m.id).collect();
        let admin_view: Vec<Uuid> = admin_sub.view().iter().map(|m| m.id).collect();
        assert_eq!(student_view.len(), 3);
        assert_eq!(student_view, admin_view);
    }

    #[tokio::test]
    async fn subscription_requires_read_access() {
        let (_dir, db) = testutil::open_db();
        let db = Arc::new(db);
        let bus = ChangeBus::new();
        let student = testutil::student(&db, "Sam", "State U");
        let snoop = testutil::student(&db, "Eli", "State U");
        let ticket =
            tickets::create_ticket(&db, &bus, &student, TicketCategory::Portal, "locked out").unwrap();

        assert!(matches!(
            subscribe_messages(db.clone(), &bus, &snoop, ticket.id).await,
            Err(CoreError::Forbidden)
        ));
    }
}
