use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use campusdesk_db::Database;
use campusdesk_types::events::ChangeEvent;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// Fan-out bus for change notifications. Delivery is a bare "something
/// changed" signal: duplicates and reordering are expected, and every
/// receiver reacts the same way — reload the whole view from storage.
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish to whoever is listening; a bus with no subscribers is fine.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live, cancellable view over one query. A background task re-runs the
/// reload on every matching change event and replaces the view wholesale;
/// nothing is patched incrementally, so the view can never drift from
/// storage by more than one round trip.
pub struct Subscription<T> {
    view: watch::Receiver<Vec<T>>,
    alive: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl<T: Clone> Subscription<T> {
    /// The current reconciled view.
    pub fn view(&self) -> Vec<T> {
        self.view.borrow().clone()
    }

    /// Wait until the view has been replaced. Returns false once the
    /// subscription is cancelled.
    pub async fn changed(&mut self) -> bool {
        self.view.changed().await.is_ok()
    }
}

impl<T> Subscription<T> {
    /// Stop reloading and release the transport handle. A reload already in
    /// flight is discarded: the task re-checks liveness before applying it.
    pub fn cancel(&self) {
        self.alive.store(false, Ordering::Release);
        self.task.abort();
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Subscribe to `bus`, re-running `reload` whenever `matches` accepts an
/// event. The initial view is loaded before this returns, so callers start
/// from storage state, not from empty.
pub async fn subscribe<T, M, F>(
    db: Arc<Database>,
    bus: &ChangeBus,
    matches: M,
    reload: F,
) -> CoreResult<Subscription<T>>
where
    T: Clone + Send + Sync + 'static,
    M: Fn(&ChangeEvent) -> bool + Send + 'static,
    F: Fn(&Database) -> anyhow::Result<Vec<T>> + Send + Sync + 'static,
{
    let reload = Arc::new(reload);

    let initial = run_reload(db.clone(), reload.clone())
        .await
        .map_err(CoreError::Transient)?;

    let (tx, rx) = watch::channel(initial);
    let alive = Arc::new(AtomicBool::new(true));
    // Register before returning so no event between now and the task's
    // first recv is lost.
    let mut events = bus.subscribe();

    let task_alive = alive.clone();
    let task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if !matches(&event) {
                        continue;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Missed events collapse into one reload; reloads are
                    // idempotent, so nothing is lost.
                    warn!("change stream lagged by {} events, reloading", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }

            if !task_alive.load(Ordering::Acquire) {
                break;
            }

            match run_reload(db.clone(), reload.clone()).await {
                Ok(rows) => {
                    // A cancel may have landed while the read was in flight;
                    // never apply a stale result.
                    if !task_alive.load(Ordering::Acquire) {
                        break;
                    }
                    if tx.send(rows).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("background reload failed, keeping last view: {}", e),
            }
        }
    });

    Ok(Subscription { view: rx, alive, task })
}

async fn run_reload<T, F>(db: Arc<Database>, reload: Arc<F>) -> anyhow::Result<Vec<T>>
where
    T: Send + 'static,
    F: Fn(&Database) -> anyhow::Result<Vec<T>> + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || reload(&db))
        .await
        .map_err(|e| anyhow::anyhow!("reload task failed: {}", e))?
}
