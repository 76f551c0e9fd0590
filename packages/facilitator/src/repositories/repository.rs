use std::{collections::HashMap, sync::Arc};

use ethers::types::{Address, H256};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::debug;

use crate::{
    crypto::secret::verify_secret,
    database::store::{EntityStore, Store},
    models::{
        error::{FacilitatorResult, ValidationError},
        model::{Message, MessageTransferRequest},
    },
    repositories::{
        entity::Entity,
        subject::{Observer, Subject},
    },
};

/// Result of a conditional `update`.
#[derive(Debug, Clone, PartialEq)]
pub enum Updated<E> {
    Written(E),
    /// Nothing was written; carries the stored record, if any.
    Unchanged(Option<E>),
}

impl<E> Updated<E> {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }

    pub fn into_entity(self) -> Option<E> {
        match self {
            Self::Written(entity) => Some(entity),
            Self::Unchanged(stored) => stored,
        }
    }
}

/// Validated, per-key serialized access to one entity type plus change notification.
pub struct Repository<E: Entity, O> {
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<E::Key, Arc<Mutex<()>>>>,
    subject: Subject<E, O>,
}

impl<E, O> Repository<E, O>
where
    E: Entity,
    O: Observer<E> + 'static,
    dyn Store: EntityStore<E>,
{
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            subject: Subject::new(),
        }
    }

    pub fn subject(&self) -> &Subject<E, O> {
        &self.subject
    }

    pub async fn attach(&self, observer: Arc<O>) {
        self.subject.attach(observer).await;
    }

    pub async fn notify(&self) -> Vec<JoinHandle<()>> {
        self.subject.notify().await
    }

    pub async fn get(&self, key: &E::Key) -> FacilitatorResult<Option<E>> {
        Ok(EntityStore::<E>::get(self.store.as_ref(), key).await?)
    }

    /// Merges `entity` over the stored record and writes it if anything changed.
    pub async fn save(&self, entity: E) -> FacilitatorResult<E> {
        let lock = self.key_lock(&entity.key()).await;
        let _guard = lock.lock().await;

        let stored = self.get(&entity.key()).await?;
        let merged = match &stored {
            Some(stored) => entity.merge(stored),
            None => entity,
        };
        self.write(merged, stored).await
    }

    /// Read-decide-write under the key's lock. `decide` returns `None` to leave the record alone.
    pub async fn update<F>(&self, key: &E::Key, decide: F) -> FacilitatorResult<Updated<E>>
    where
        F: FnOnce(Option<E>) -> Option<E> + Send,
    {
        let lock = self.key_lock(key).await;
        let _guard = lock.lock().await;

        let stored = self.get(key).await?;
        let Some(next) = decide(stored.clone()) else {
            return Ok(Updated::Unchanged(stored));
        };
        let merged = match &stored {
            Some(stored) => next.merge(stored),
            None => next,
        };
        if stored.as_ref() == Some(&merged) {
            return Ok(Updated::Unchanged(stored));
        }
        self.write(merged, stored).await.map(Updated::Written)
    }

    async fn write(&self, merged: E, stored: Option<E>) -> FacilitatorResult<E> {
        if stored.as_ref() == Some(&merged) {
            debug!("⏭️  {} {:?} unchanged", E::NAME, merged.key());
            return Ok(merged);
        }

        let violations = merged.validate(stored.as_ref());
        if !violations.is_empty() {
            return Err(ValidationError {
                entity: E::NAME,
                violations,
            }
            .into());
        }

        EntityStore::<E>::put(self.store.as_ref(), &merged).await?;
        self.subject.record(merged.clone()).await;
        Ok(merged)
    }

    async fn key_lock(&self, key: &E::Key) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key.clone()).or_default().clone()
    }
}

// ==================== Message queries ====================

impl<O> Repository<Message, O>
where
    O: Observer<Message> + 'static,
{
    pub async fn messages_pending_confirmation(
        &self,
        gateway: Address,
        block_height: u64,
    ) -> FacilitatorResult<Vec<Message>> {
        Ok(self
            .store
            .messages_pending_confirmation(gateway, block_height)
            .await?)
    }

    /// Vaults the commit secret of a message that has not been revealed yet.
    pub async fn store_secret(&self, message_hash: H256, secret: H256) -> FacilitatorResult<()> {
        Ok(self.store.put_secret(message_hash, secret).await?)
    }

    /// The revealed or vaulted secret of `message`, if it opens the message's hash lock.
    pub async fn known_secret(&self, message: &Message) -> FacilitatorResult<Option<H256>> {
        let Some(hash_lock) = message.hash_lock else {
            return Ok(None);
        };

        let secret = match message.secret {
            Some(secret) => Some(secret),
            None => self.store.get_secret(message.message_hash).await?,
        };

        Ok(secret.filter(|s| verify_secret(s, &hash_lock)))
    }
}

// ==================== Request queries ====================

impl<O> Repository<MessageTransferRequest, O>
where
    O: Observer<MessageTransferRequest> + 'static,
{
    pub async fn request_by_message_hash(
        &self,
        message_hash: H256,
    ) -> FacilitatorResult<Option<MessageTransferRequest>> {
        Ok(self.store.request_by_message_hash(message_hash).await?)
    }

    pub async fn uncommitted(&self) -> FacilitatorResult<Vec<MessageTransferRequest>> {
        Ok(self.store.uncommitted_requests().await?)
    }
}
