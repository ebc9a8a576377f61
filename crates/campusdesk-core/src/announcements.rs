use std::sync::Arc;

use campusdesk_db::Database;
use campusdesk_db::models::AnnouncementRow;
use campusdesk_types::events::{ChangeEvent, Collection};
use campusdesk_types::models::{Announcement, parse_row_timestamp, parse_row_uuid};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::identity::Actor;
use crate::policy::{self, Action};
use crate::sync::{ChangeBus, Subscription, subscribe};

fn announcement_from_row(row: AnnouncementRow) -> Announcement {
    Announcement {
        id: parse_row_uuid(&row.id, "announcement id"),
        title: row.title,
        message: row.message,
        posted_by: parse_row_uuid(&row.posted_by, "announcement posted_by"),
        posted_by_name: row.posted_by_name,
        created_at: parse_row_timestamp(&row.created_at, "announcement"),
    }
}

/// Post a campus-wide announcement. Verified admins only.
pub fn post(
    db: &Database,
    bus: &ChangeBus,
    actor: &Actor,
    title: &str,
    message: &str,
) -> CoreResult<Announcement> {
    policy::require(actor, &Action::PostAnnouncement)?;

    let id = Uuid::new_v4();
    db.insert_announcement(&id.to_string(), title, message, &actor.user_id.to_string())?;
    let row = db
        .get_announcement(&id.to_string())?
        .ok_or(CoreError::NotFound("announcement"))?;

    bus.publish(ChangeEvent::announcement());
    Ok(announcement_from_row(row))
}

/// Everyone may read announcements; newest first.
pub fn list(db: &Database) -> CoreResult<Vec<Announcement>> {
    let rows = db.list_announcements()?;
    Ok(rows.into_iter().map(announcement_from_row).collect())
}

/// Live announcement feed, shared by every connected client.
pub async fn subscribe_feed(db: Arc<Database>, bus: &ChangeBus) -> CoreResult<Subscription<Announcement>> {
    subscribe(
        db,
        bus,
        |ev| ev.collection == Collection::Announcements,
        |db| {
            Ok(db
                .list_announcements()?
                .into_iter()
                .map(announcement_from_row)
                .collect())
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn only_verified_admins_post_everyone_reads() {
        let (_dir, db) = testutil::open_db();
        let bus = ChangeBus::new();
        let admin = testutil::admin(&db, "Dana", "State U", true);
        let unverified = testutil::admin(&db, "Uma", "State U", false);
        let student = testutil::student(&db, "Sam", "State U");

        let posted = post(&db, &bus, &admin, "Maintenance window", "Portal down Friday night").unwrap();
        assert_eq!(posted.posted_by, admin.user_id);
        assert_eq!(posted.posted_by_name, "Dana");

        for actor in [&student, &unverified] {
            assert!(matches!(
                post(&db, &bus, actor, "nope", "nope"),
                Err(CoreError::Forbidden)
            ));
        }

        let all = list(&db).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Maintenance window");
    }

    #[tokio::test]
    async fn feed_picks_up_new_posts() {
        let (_dir, db) = testutil::open_db();
        let db = Arc::new(db);
        let bus = ChangeBus::new();
        let admin = testutil::admin(&db, "Dana", "State U", true);

        let sub = subscribe_feed(db.clone(), &bus).await.unwrap();
        assert!(sub.view().is_empty());

        post(&db, &bus, &admin, "Welcome week", "Schedule posted").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let view = sub.view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].title, "Welcome week");
    }
}
