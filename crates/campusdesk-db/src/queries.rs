use crate::Database;
use crate::models::{
    AnnouncementRow, ChatRow, FaqRow, ProfileRow, RoleRow, StudentStatsRow, TicketRow, UserRow,
};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    // -- Profiles --

    pub fn create_profile(
        &self,
        id: &str,
        full_name: &str,
        email: &str,
        university: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, full_name, email, university) VALUES (?1, ?2, ?3, ?4)",
                (id, full_name, email, university),
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, full_name, email, university, photo_url, created_at
                 FROM profiles WHERE id = ?1",
            )?;
            stmt.query_row([id], map_profile).optional()
        })
    }

    pub fn update_profile(&self, id: &str, full_name: &str, photo_url: Option<&str>) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE profiles SET full_name = ?2, photo_url = ?3 WHERE id = ?1",
                (id, full_name, photo_url),
            )?;
            Ok(rows)
        })
    }

    // -- Roles --

    pub fn create_role(&self, user_id: &str, role: &str, is_verified: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_roles (user_id, role, is_verified) VALUES (?1, ?2, ?3)",
                (user_id, role, is_verified),
            )?;
            Ok(())
        })
    }

    pub fn get_role(&self, user_id: &str) -> Result<Option<RoleRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT user_id, role, is_verified FROM user_roles WHERE user_id = ?1")?;
            stmt.query_row([user_id], |row| {
                Ok(RoleRow {
                    user_id: row.get(0)?,
                    role: row.get(1)?,
                    is_verified: row.get(2)?,
                })
            })
            .optional()
        })
    }

    /// Returns the number of rows updated; 0 means the role row disappeared
    /// under us.
    pub fn mark_role_verified(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE user_roles SET is_verified = 1 WHERE user_id = ?1",
                [user_id],
            )?;
            Ok(rows)
        })
    }

    pub fn delete_role(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM user_roles WHERE user_id = ?1", [user_id])?;
            Ok(rows)
        })
    }

    // -- Tickets --

    pub fn insert_ticket(
        &self,
        id: &str,
        student_id: &str,
        category: &str,
        description: &str,
        status: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tickets (id, student_id, category, description, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, student_id, category, description, status),
            )?;
            Ok(())
        })
    }

    pub fn get_ticket(&self, id: &str) -> Result<Option<TicketRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{TICKET_SELECT} WHERE t.id = ?1"))?;
            stmt.query_row([id], map_ticket).optional()
        })
    }

    pub fn tickets_by_student(&self, student_id: &str) -> Result<Vec<TicketRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TICKET_SELECT} WHERE t.student_id = ?1 ORDER BY t.created_at DESC, t.id DESC"
            ))?;
            let rows = stmt
                .query_map([student_id], map_ticket)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn tickets_by_university(&self, university: &str) -> Result<Vec<TicketRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TICKET_SELECT} WHERE p.university = ?1 ORDER BY t.created_at DESC, t.id DESC"
            ))?;
            let rows = stmt
                .query_map([university], map_ticket)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_ticket_status(&self, id: &str, status: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE tickets SET status = ?2 WHERE id = ?1",
                (id, status),
            )?;
            Ok(rows)
        })
    }

    /// Conditional transition: only fires while the stored status still
    /// matches `from`. Row count 0 means another writer won the race.
    pub fn set_ticket_status_if(&self, id: &str, from: &str, to: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE tickets SET status = ?3 WHERE id = ?1 AND status = ?2",
                (id, from, to),
            )?;
            Ok(rows)
        })
    }

    // -- Chats --

    pub fn insert_chat(&self, id: &str, ticket_id: &str, sender_id: &str, message: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (id, ticket_id, sender_id, message) VALUES (?1, ?2, ?3, ?4)",
                (id, ticket_id, sender_id, message),
            )?;
            Ok(())
        })
    }

    pub fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{CHAT_SELECT} WHERE c.id = ?1"))?;
            stmt.query_row([id], map_chat).optional()
        })
    }

    /// The conversation in reconciliation order: (created_at, id) ascending.
    /// The id tie-break makes the order total under SQLite's second-granular
    /// timestamps.
    pub fn chats_by_ticket(&self, ticket_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{CHAT_SELECT} WHERE c.ticket_id = ?1 ORDER BY c.created_at ASC, c.id ASC"
            ))?;
            let rows = stmt
                .query_map([ticket_id], map_chat)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Announcements --

    pub fn insert_announcement(&self, id: &str, title: &str, message: &str, posted_by: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO announcements (id, title, message, posted_by) VALUES (?1, ?2, ?3, ?4)",
                (id, title, message, posted_by),
            )?;
            Ok(())
        })
    }

    pub fn get_announcement(&self, id: &str) -> Result<Option<AnnouncementRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.title, a.message, a.posted_by, p.full_name, a.created_at
                 FROM announcements a
                 LEFT JOIN profiles p ON a.posted_by = p.id
                 WHERE a.id = ?1",
            )?;
            stmt.query_row([id], map_announcement).optional()
        })
    }

    pub fn list_announcements(&self) -> Result<Vec<AnnouncementRow>> {
        self.with_conn(|conn| {
            // JOIN profiles to fetch the poster's name in a single query
            let mut stmt = conn.prepare(
                "SELECT a.id, a.title, a.message, a.posted_by, p.full_name, a.created_at
                 FROM announcements a
                 LEFT JOIN profiles p ON a.posted_by = p.id
                 ORDER BY a.created_at DESC, a.id DESC",
            )?;
            let rows = stmt
                .query_map([], map_announcement)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- FAQs --

    pub fn list_faqs(&self) -> Result<Vec<FaqRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, question, answer, category, created_at
                 FROM faqs ORDER BY created_at DESC, id ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(FaqRow {
                        id: row.get(0)?,
                        question: row.get(1)?,
                        answer: row.get(2)?,
                        category: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Directory aggregations --

    /// Students of one university with at least one ticket, annotated with
    /// per-status counts. Aggregated in SQL so the directory is one query,
    /// not a profile+tickets fetch per student.
    pub fn student_ticket_stats(&self, university: &str) -> Result<Vec<StudentStatsRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.full_name, p.email, p.university, p.photo_url,
                        COUNT(t.id),
                        SUM(CASE WHEN t.status = 'Pending' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN t.status = 'In Progress' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN t.status = 'Resolved' THEN 1 ELSE 0 END)
                 FROM profiles p
                 JOIN user_roles r ON r.user_id = p.id AND r.role = 'student'
                 JOIN tickets t ON t.student_id = p.id
                 WHERE p.university = ?1
                 GROUP BY p.id
                 ORDER BY p.full_name ASC",
            )?;
            let rows = stmt
                .query_map([university], |row| {
                    Ok(StudentStatsRow {
                        id: row.get(0)?,
                        full_name: row.get(1)?,
                        email: row.get(2)?,
                        university: row.get(3)?,
                        photo_url: row.get(4)?,
                        total: row.get(5)?,
                        pending: row.get(6)?,
                        in_progress: row.get(7)?,
                        resolved: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Admins of one university still awaiting verification.
    pub fn pending_admins(&self, university: &str) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.full_name, p.email, p.university, p.photo_url, p.created_at
                 FROM profiles p
                 JOIN user_roles r ON r.user_id = p.id
                 WHERE r.role = 'admin' AND r.is_verified = 0 AND p.university = ?1
                 ORDER BY p.created_at DESC",
            )?;
            let rows = stmt
                .query_map([university], map_profile)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

// JOIN profiles to fetch the owning student in a single query (eliminates N+1)
const TICKET_SELECT: &str =
    "SELECT t.id, t.student_id, p.full_name, p.university, t.category, t.description, t.status, t.created_at
     FROM tickets t
     LEFT JOIN profiles p ON t.student_id = p.id";

const CHAT_SELECT: &str =
    "SELECT c.id, c.ticket_id, c.sender_id, p.full_name, c.message, c.created_at
     FROM chats c
     LEFT JOIN profiles p ON c.sender_id = p.id";

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, email, password, created_at FROM users WHERE email = ?1")?;

    stmt.query_row([email], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            created_at: row.get(3)?,
        })
    })
    .optional()
}

fn map_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        university: row.get(3)?,
        photo_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_ticket(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        student_name: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| "Unknown".to_string()),
        student_university: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_default(),
        category: row.get(4)?,
        description: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_announcement(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnnouncementRow> {
    Ok(AnnouncementRow {
        id: row.get(0)?,
        title: row.get(1)?,
        message: row.get(2)?,
        posted_by: row.get(3)?,
        posted_by_name: row
            .get::<_, Option<String>>(4)?
            .unwrap_or_else(|| "Administrator".to_string()),
        created_at: row.get(5)?,
    })
}

fn map_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "Unknown".to_string()),
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(&dir.path().join("test.db")).expect("open db");
        (dir, db)
    }

    fn seed_student(db: &Database, id: &str, name: &str, university: &str) {
        db.create_user(id, &format!("{id}@example.edu"), "hash").unwrap();
        db.create_profile(id, name, &format!("{id}@example.edu"), university)
            .unwrap();
        db.create_role(id, "student", false).unwrap();
    }

    #[test]
    fn chats_order_by_created_at_then_id() {
        let (_dir, db) = open_db();
        seed_student(&db, "s1", "Sam Student", "State U");
        db.insert_ticket("t1", "s1", "Other", "help", "Pending").unwrap();

        // Same-second timestamps: the id must decide the order.
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO chats (id, ticket_id, sender_id, message, created_at) VALUES
                    ('m-b', 't1', 's1', 'second', '2026-01-01 10:00:00'),
                    ('m-a', 't1', 's1', 'first',  '2026-01-01 10:00:00'),
                    ('m-c', 't1', 's1', 'third',  '2026-01-01 10:00:01');",
            )?;
            Ok(())
        })
        .unwrap();

        let rows = db.chats_by_ticket("t1").unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["m-a", "m-b", "m-c"]);
    }

    #[test]
    fn conditional_status_update_detects_races() {
        let (_dir, db) = open_db();
        seed_student(&db, "s1", "Sam Student", "State U");
        db.insert_ticket("t1", "s1", "Portal", "locked out", "Pending").unwrap();

        assert_eq!(db.set_ticket_status_if("t1", "Pending", "In Progress").unwrap(), 1);
        // Second conditional fire finds nothing to do.
        assert_eq!(db.set_ticket_status_if("t1", "Pending", "In Progress").unwrap(), 0);
        assert_eq!(db.get_ticket("t1").unwrap().unwrap().status, "In Progress");
    }

    #[test]
    fn student_stats_scope_to_university_and_require_tickets() {
        let (_dir, db) = open_db();
        seed_student(&db, "s1", "Ana", "State U");
        seed_student(&db, "s2", "Ben", "State U");
        seed_student(&db, "s3", "Cho", "Other U");
        db.insert_ticket("t1", "s1", "Housing", "leaky roof", "Pending").unwrap();
        db.insert_ticket("t2", "s1", "Housing", "still leaky", "Resolved").unwrap();
        db.insert_ticket("t3", "s3", "Finance", "fees", "Pending").unwrap();

        let rows = db.student_ticket_stats("State U").unwrap();
        assert_eq!(rows.len(), 1); // Ben has no tickets, Cho is elsewhere
        assert_eq!(rows[0].id, "s1");
        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[0].pending, 1);
        assert_eq!(rows[0].in_progress, 0);
        assert_eq!(rows[0].resolved, 1);
    }

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        assert!(db.list_faqs().unwrap().len() >= 3);
    }
}
