use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use campusdesk_core::sync::{ChangeBus, Subscription};
use campusdesk_core::{Actor, announcements, conversation, identity, tickets};
use campusdesk_db::Database;
use campusdesk_types::api::Claims;
use campusdesk_types::events::{GatewayCommand, GatewayEvent};

/// Handle a single WebSocket connection: Identify handshake, then live
/// feeds. Each feed is a full-reload subscription; the client receives the
/// whole reconciled view on every change and renders it as-is.
pub async fn handle_connection(socket: WebSocket, db: Arc<Database>, bus: ChangeBus, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    // Step 2: Resolve the actor; a token without a provisioned profile gets
    // no feeds at all.
    let actor = {
        let db = db.clone();
        match tokio::task::spawn_blocking(move || identity::resolve(&db, user_id)).await {
            Ok(Ok(actor)) => actor,
            Ok(Err(e)) => {
                warn!("gateway identity rejected for {}: {}", user_id, e);
                return;
            }
            Err(e) => {
                warn!("gateway identity task failed: {}", e);
                return;
            }
        }
    };

    info!("{} connected to gateway", user_id);

    // Step 3: Send Ready event
    let ready = GatewayEvent::Ready { user_id };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // All feeds push into one outbound queue drained by the send task.
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewayEvent>();

    // Standing feeds: the caller's ticket list and the announcement stream.
    let mut feed_tasks: Vec<JoinHandle<()>> = Vec::new();
    match tickets::subscribe_list(db.clone(), &bus, &actor).await {
        Ok(sub) => feed_tasks.push(spawn_feed(sub, tx.clone(), |tickets| {
            GatewayEvent::TicketList { tickets }
        })),
        Err(e) => warn!("ticket feed unavailable for {}: {}", user_id, e),
    }
    match announcements::subscribe_feed(db.clone(), &bus).await {
        Ok(sub) => feed_tasks.push(spawn_feed(sub, tx.clone(), |announcements| {
            GatewayEvent::Announcements { announcements }
        })),
        Err(e) => warn!("announcement feed unavailable for {}: {}", user_id, e),
    }

    // Forward queued events -> client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode gateway event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Read commands from client; conversation feeds come and go with
    // Subscribe commands.
    let recv_db = db.clone();
    let recv_bus = bus.clone();
    let recv_actor = actor.clone();
    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut conversations: HashMap<Uuid, JoinHandle<()>> = HashMap::new();

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Identify { .. }) => {} // Already handled
                    Ok(GatewayCommand::Subscribe { ticket_ids }) => {
                        apply_subscriptions(
                            &recv_db,
                            &recv_bus,
                            &recv_actor,
                            &recv_tx,
                            &mut conversations,
                            ticket_ids,
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }

        for (_, task) in conversations {
            task.abort();
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    for task in feed_tasks {
        task.abort();
    }

    info!("{} disconnected from gateway", user_id);
}

/// Replace the watched-conversation set. Requested tickets the actor may
/// not read are skipped with a warning; the REST layer re-checks on every
/// fetch anyway, so a skipped feed can never leak.
async fn apply_subscriptions(
    db: &Arc<Database>,
    bus: &ChangeBus,
    actor: &Actor,
    tx: &mpsc::UnboundedSender<GatewayEvent>,
    conversations: &mut HashMap<Uuid, JoinHandle<()>>,
    ticket_ids: Vec<Uuid>,
) {
    let wanted: HashSet<Uuid> = ticket_ids.into_iter().collect();

    conversations.retain(|ticket_id, task| {
        if wanted.contains(ticket_id) {
            true
        } else {
            task.abort();
            false
        }
    });

    for ticket_id in wanted {
        if conversations.contains_key(&ticket_id) {
            continue;
        }
        match conversation::subscribe_messages(db.clone(), bus, actor, ticket_id).await {
            Ok(sub) => {
                let task = spawn_feed(sub, tx.clone(), move |messages| GatewayEvent::Conversation {
                    ticket_id,
                    messages,
                });
                conversations.insert(ticket_id, task);
            }
            Err(e) => warn!(
                "{} denied conversation feed for ticket {}: {}",
                actor.user_id, ticket_id, e
            ),
        }
    }
}

/// Pump one subscription into the connection's outbound queue: initial
/// snapshot first, then a fresh snapshot per reload. Ends as soon as the
/// queue closes; dropping the subscription cancels its reload task.
fn spawn_feed<T, F>(
    mut sub: Subscription<T>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
    to_event: F,
) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Vec<T>) -> GatewayEvent + Send + 'static,
{
    tokio::spawn(async move {
        if tx.send(to_event(sub.view())).is_err() {
            return;
        }
        loop {
            tokio::select! {
                changed = sub.changed() => {
                    if !changed {
                        break;
                    }
                    if tx.send(to_event(sub.view())).is_err() {
                        break;
                    }
                }
                _ = tx.closed() => break,
            }
        }
    })
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Uuid> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}
