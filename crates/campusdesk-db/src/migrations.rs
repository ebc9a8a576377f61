use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id          TEXT PRIMARY KEY REFERENCES users(id),
            full_name   TEXT NOT NULL,
            email       TEXT NOT NULL,
            university  TEXT NOT NULL,
            photo_url   TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS user_roles (
            user_id     TEXT PRIMARY KEY REFERENCES users(id),
            role        TEXT NOT NULL,
            is_verified INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS tickets (
            id          TEXT PRIMARY KEY,
            student_id  TEXT NOT NULL REFERENCES profiles(id),
            category    TEXT NOT NULL,
            description TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'Pending',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tickets_student
            ON tickets(student_id, created_at);

        CREATE TABLE IF NOT EXISTS chats (
            id          TEXT PRIMARY KEY,
            ticket_id   TEXT NOT NULL REFERENCES tickets(id),
            sender_id   TEXT NOT NULL REFERENCES profiles(id),
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_chats_ticket
            ON chats(ticket_id, created_at, id);

        CREATE TABLE IF NOT EXISTS announcements (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            message     TEXT NOT NULL,
            posted_by   TEXT NOT NULL REFERENCES profiles(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS faqs (
            id          TEXT PRIMARY KEY,
            question    TEXT NOT NULL,
            answer      TEXT NOT NULL,
            category    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Seed starter FAQs
        INSERT OR IGNORE INTO faqs (id, question, answer, category) VALUES
            ('00000000-0000-0000-0000-0000000000f1',
             'How do I reset my portal password?',
             'Use the Forgot Password link on the portal sign-in page. If the reset email never arrives, file a Portal ticket.',
             'Portal'),
            ('00000000-0000-0000-0000-0000000000f2',
             'How long until my request is handled?',
             'Tickets move to In Progress as soon as an administrator picks them up; most are resolved within two business days.',
             'Other'),
            ('00000000-0000-0000-0000-0000000000f3',
             'Who can see my tickets?',
             'Only you and administrators of your own university.',
             'Other');
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
