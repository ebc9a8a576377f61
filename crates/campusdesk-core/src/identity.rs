use campusdesk_db::Database;
use campusdesk_types::models::Role;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Resolved identity, threaded explicitly into every core operation so
/// tests can fabricate actors without any session machinery.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub university: String,
    /// Meaningful for admins only; students carry whatever the row says.
    pub is_verified: bool,
}

/// Map an authenticated user id to its profile and role. A session whose
/// profile or role row is missing resolves to `ProfileMissing` — it must
/// never silently default to a student actor, which would bypass the
/// admin-verification gate.
pub fn resolve(db: &Database, user_id: Uuid) -> CoreResult<Actor> {
    let id = user_id.to_string();

    let profile = db
        .get_profile(&id)?
        .ok_or(CoreError::ProfileMissing(user_id))?;
    let role_row = db.get_role(&id)?.ok_or(CoreError::ProfileMissing(user_id))?;
    let role = Role::parse(&role_row.role).ok_or(CoreError::ProfileMissing(user_id))?;

    Ok(Actor {
        user_id,
        role,
        university: profile.university,
        is_verified: role_row.is_verified,
    })
}
