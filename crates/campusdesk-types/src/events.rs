use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Announcement, Ticket, TicketMessage};

/// Record collections the change bus reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tickets,
    Chats,
    Announcements,
}

/// A "something changed" signal. Carries no row data on purpose: consumers
/// re-read the affected collection from storage (full reload) instead of
/// applying a patch, so duplicated or reordered delivery is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    /// Set for ticket-scoped collections (tickets, chats).
    pub ticket_id: Option<Uuid>,
    /// Owning student, so ticket-list feeds can match without a storage hit.
    pub student_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn ticket(ticket_id: Uuid, student_id: Uuid) -> Self {
        Self {
            collection: Collection::Tickets,
            ticket_id: Some(ticket_id),
            student_id: Some(student_id),
        }
    }

    pub fn chat(ticket_id: Uuid, student_id: Uuid) -> Self {
        Self {
            collection: Collection::Chats,
            ticket_id: Some(ticket_id),
            student_id: Some(student_id),
        }
    }

    pub fn announcement() -> Self {
        Self {
            collection: Collection::Announcements,
            ticket_id: None,
            student_id: None,
        }
    }
}

/// Events sent over the WebSocket gateway. Feeds carry the whole reconciled
/// view, replaced on every change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// The caller's ticket list (own tickets for students, the university's
    /// tickets for admins)
    TicketList { tickets: Vec<Ticket> },

    /// Full message thread of one subscribed ticket
    Conversation {
        ticket_id: Uuid,
        messages: Vec<TicketMessage>,
    },

    /// The global announcement feed
    Announcements { announcements: Vec<Announcement> },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Replace the set of ticket conversations this client watches.
    /// Tickets the caller may not read are dropped, not errored.
    Subscribe { ticket_ids: Vec<Uuid> },
}
