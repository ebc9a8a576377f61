//! Shared fixtures: a throwaway SQLite file plus seeded actors.

use campusdesk_db::Database;
use campusdesk_types::models::Role;
use tempfile::TempDir;
use uuid::Uuid;

use crate::identity::Actor;

pub fn open_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&dir.path().join("test.db")).expect("open db");
    (dir, db)
}

pub fn seed_user(db: &Database, name: &str, university: &str, role: Role, verified: bool) -> Actor {
    let id = Uuid::new_v4();
    let email = format!("{}.{}@example.edu", name.to_lowercase(), id.simple());
    db.create_user(&id.to_string(), &email, "hash").expect("user");
    db.create_profile(&id.to_string(), name, &email, university)
        .expect("profile");
    db.create_role(&id.to_string(), role.as_str(), verified)
        .expect("role");
    Actor {
        user_id: id,
        role,
        university: university.to_string(),
        is_verified: verified,
    }
}

pub fn student(db: &Database, name: &str, university: &str) -> Actor {
    seed_user(db, name, university, Role::Student, false)
}

pub fn admin(db: &Database, name: &str, university: &str, verified: bool) -> Actor {
    seed_user(db, name, university, Role::Admin, verified)
}
