use campusdesk_types::models::Role;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::identity::Actor;

/// Ownership and scoping facts about the ticket an action targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketScope {
    pub student_id: Uuid,
    pub university: String,
}

/// Every operation the core gates. Actions carry the resource scope they
/// target so the check stays a pure function of its arguments.
#[derive(Debug, Clone)]
pub enum Action<'a> {
    CreateTicket,
    ReadTicket(&'a TicketScope),
    SetTicketStatus(&'a TicketScope),
    PostTicketMessage(&'a TicketScope),
    PostAnnouncement,
    ReviewAdmin { target_university: &'a str },
    ViewDirectory,
}

/// Pure policy check, no I/O. Runs in-process before any mutation reaches
/// storage; whatever the storage layer enforces on top is defense in depth,
/// not the authority.
///
/// Unverified admins get student-equivalent read-only capability: they may
/// read same-university tickets but mutate nothing and post nowhere.
pub fn can_perform(actor: &Actor, action: &Action<'_>) -> bool {
    match action {
        Action::CreateTicket => actor.role == Role::Student,

        Action::ReadTicket(ticket) => match actor.role {
            Role::Student => ticket.student_id == actor.user_id,
            Role::Admin => in_university(actor, &ticket.university),
        },

        Action::SetTicketStatus(ticket) => {
            actor.role == Role::Admin && actor.is_verified && in_university(actor, &ticket.university)
        }

        Action::PostTicketMessage(ticket) => match actor.role {
            Role::Student => ticket.student_id == actor.user_id,
            Role::Admin => actor.is_verified && in_university(actor, &ticket.university),
        },

        Action::PostAnnouncement => actor.role == Role::Admin && actor.is_verified,

        Action::ReviewAdmin { target_university } => {
            actor.role == Role::Admin && actor.is_verified && in_university(actor, target_university)
        }

        Action::ViewDirectory => actor.role == Role::Admin && actor.is_verified,
    }
}

/// Evaluate and convert a denial into `Forbidden`.
pub fn require(actor: &Actor, action: &Action<'_>) -> CoreResult<()> {
    if can_perform(actor, action) {
        Ok(())
    } else {
        Err(CoreError::Forbidden)
    }
}

// Fails closed: an actor with a blank university matches no scope at all.
fn in_university(actor: &Actor, university: &str) -> bool {
    !actor.university.is_empty() && actor.university == university
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Student), Just(Role::Admin)]
    }

    fn arb_university() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("State U".to_string()),
            Just("Other U".to_string()),
        ]
    }

    fn arb_actor() -> impl Strategy<Value = Actor> {
        (arb_role(), arb_university(), any::<bool>(), any::<u128>()).prop_map(
            |(role, university, is_verified, raw)| Actor {
                user_id: Uuid::from_u128(raw),
                role,
                university,
                is_verified,
            },
        )
    }

    fn arb_scope() -> impl Strategy<Value = TicketScope> {
        (any::<u128>(), arb_university()).prop_map(|(raw, university)| TicketScope {
            student_id: Uuid::from_u128(raw),
            university,
        })
    }

    proptest! {
        // Nobody without a verified admin role ever passes a mutating check.
        #[test]
        fn mutations_require_verified_admin(actor in arb_actor(), scope in arb_scope()) {
            let verified_admin = actor.role == Role::Admin && actor.is_verified;
            if !verified_admin {
                prop_assert!(!can_perform(&actor, &Action::SetTicketStatus(&scope)));
                prop_assert!(!can_perform(&actor, &Action::PostAnnouncement));
                prop_assert!(!can_perform(&actor, &Action::ViewDirectory));
                let review_admin = Action::ReviewAdmin {
                    target_university: &scope.university,
                };
                prop_assert!(!can_perform(&actor, &review_admin));
            }
        }

        // No admin capability ever crosses a university boundary.
        #[test]
        fn admin_scope_never_crosses_universities(actor in arb_actor(), scope in arb_scope()) {
            if actor.role == Role::Admin && actor.university != scope.university {
                prop_assert!(!can_perform(&actor, &Action::ReadTicket(&scope)));
                prop_assert!(!can_perform(&actor, &Action::SetTicketStatus(&scope)));
                prop_assert!(!can_perform(&actor, &Action::PostTicketMessage(&scope)));
            }
        }

        // A student's reach is exactly their own tickets.
        #[test]
        fn student_reach_is_ownership(actor in arb_actor(), scope in arb_scope()) {
            if actor.role == Role::Student {
                let owns = scope.student_id == actor.user_id;
                prop_assert_eq!(can_perform(&actor, &Action::ReadTicket(&scope)), owns);
                prop_assert_eq!(can_perform(&actor, &Action::PostTicketMessage(&scope)), owns);
                prop_assert!(!can_perform(&actor, &Action::SetTicketStatus(&scope)));
            }
        }

        // The evaluator is total: any input produces a boolean, never a panic.
        #[test]
        fn evaluator_is_total(actor in arb_actor(), scope in arb_scope()) {
            for action in [
                Action::CreateTicket,
                Action::ReadTicket(&scope),
                Action::SetTicketStatus(&scope),
                Action::PostTicketMessage(&scope),
                Action::PostAnnouncement,
                Action::ReviewAdmin { target_university: &scope.university },
                Action::ViewDirectory,
            ] {
                let _ = can_perform(&actor, &action);
            }
        }
    }
}
