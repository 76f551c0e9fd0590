use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::{sync::Mutex, sync::RwLock, task::JoinHandle};
use tracing::{debug, error};

use crate::repositories::entity::Entity;

/// Receiver of the entities a repository changed during one ingestion cycle.
#[async_trait]
pub trait Observer<E>: Send + Sync {
    async fn on_change(&self, updates: Vec<E>) -> Result<()>;
}

/// Collects changed entities and fans them out to attached observers.
pub struct Subject<E: Entity, O> {
    observers: RwLock<Vec<Arc<O>>>,
    updates: Mutex<Vec<E>>,
}

impl<E, O> Subject<E, O>
where
    E: Entity,
    O: Observer<E> + 'static,
{
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub async fn attach(&self, observer: Arc<O>) {
        self.observers.write().await.push(observer);
    }

    /// Queues `entity` for the next `notify`; a later change of the same key replaces the earlier one.
    pub async fn record(&self, entity: E) {
        let mut updates = self.updates.lock().await;
        let key = entity.key();
        match updates.iter_mut().find(|e| e.key() == key) {
            Some(slot) => *slot = entity,
            None => updates.push(entity),
        }
    }

    pub async fn pending(&self) -> Vec<E> {
        self.updates.lock().await.clone()
    }

    /// Delivers the queued updates to every observer, each on its own task.
    pub async fn notify(&self) -> Vec<JoinHandle<()>> {
        let updates = std::mem::take(&mut *self.updates.lock().await);
        self.deliver(updates).await
    }

    /// Delivers `updates` directly, bypassing the queue.
    pub async fn deliver(&self, updates: Vec<E>) -> Vec<JoinHandle<()>> {
        if updates.is_empty() {
            return Vec::new();
        }

        let observers = self.observers.read().await.clone();
        debug!(
            "📣 Notifying {} observer(s) of {} {} change(s)",
            observers.len(),
            updates.len(),
            E::NAME
        );

        observers
            .into_iter()
            .enumerate()
            .map(|(index, observer)| {
                let updates = updates.clone();
                tokio::spawn(async move {
                    if let Err(e) = observer.on_change(updates).await {
                        error!("❌ Observer {} of {} failed: {:#}", index, E::NAME, e);
                    }
                })
            })
            .collect()
    }
}

impl<E, O> Default for Subject<E, O>
where
    E: Entity,
    O: Observer<E> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
