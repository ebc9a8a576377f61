use campusdesk_db::Database;
use campusdesk_types::models::Role;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::identity::Actor;
use crate::policy::{self, Action};

fn admin_university(db: &Database, target: Uuid) -> CoreResult<Option<String>> {
    let id = target.to_string();
    let Some(role) = db.get_role(&id)? else {
        return Ok(None);
    };
    if Role::parse(&role.role) != Some(Role::Admin) {
        return Ok(None);
    }
    let Some(profile) = db.get_profile(&id)? else {
        return Ok(None);
    };
    Ok(Some(profile.university))
}

// Gate on the actor's own standing before looking up the target, so callers
// who could never review anyone learn nothing about who exists.
fn require_reviewer(actor: &Actor) -> CoreResult<()> {
    policy::require(actor, &Action::ReviewAdmin {
        target_university: &actor.university,
    })
}

/// Approve a pending admin. Idempotent: approving an already-verified admin
/// is a no-op, not an error.
pub fn approve_admin(db: &Database, actor: &Actor, target: Uuid) -> CoreResult<()> {
    require_reviewer(actor)?;

    let university = admin_university(db, target)?.ok_or(CoreError::NotFound("admin"))?;
    policy::require(actor, &Action::ReviewAdmin {
        target_university: &university,
    })?;

    let rows = db.mark_role_verified(&target.to_string())?;
    if rows == 0 {
        // The role row vanished between lookup and update.
        return Err(CoreError::NotFound("admin"));
    }
    Ok(())
}

/// Reject a pending admin by removing the role grant entirely. There is no
/// soft revocation: a rejected admin must register again. A second reject
/// therefore reports NotFound.
pub fn reject_admin(db: &Database, actor: &Actor, target: Uuid) -> CoreResult<()> {
    require_reviewer(actor)?;

    let university = admin_university(db, target)?.ok_or(CoreError::NotFound("admin"))?;
    policy::require(actor, &Action::ReviewAdmin {
        target_university: &university,
    })?;

    let rows = db.delete_role(&target.to_string())?;
    if rows == 0 {
        return Err(CoreError::NotFound("admin"));
    }
    Ok(())
}
