use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, H256, TxHash};

use crate::models::model::{AuxiliaryChain, Gateway, Message, MessageTransferRequest};
use crate::repositories::entity::Entity;

/// Point lookup and full upsert of one entity type.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    async fn get(&self, key: &E::Key) -> Result<Option<E>>;
    async fn put(&self, entity: &E) -> Result<()>;
}

#[async_trait]
pub trait MessageQueries: Send + Sync {
    /// Messages on `gateway` declared at or below `block_height` whose target side is still open.
    async fn messages_pending_confirmation(
        &self,
        gateway: Address,
        block_height: u64,
    ) -> Result<Vec<Message>>;

    async fn put_secret(&self, message_hash: H256, secret: H256) -> Result<()>;
    async fn get_secret(&self, message_hash: H256) -> Result<Option<H256>>;
}

#[async_trait]
pub trait RequestQueries: Send + Sync {
    async fn request_by_message_hash(
        &self,
        message_hash: H256,
    ) -> Result<Option<MessageTransferRequest>>;

    async fn uncommitted_requests(&self) -> Result<Vec<MessageTransferRequest>>;
}

/// Record of every transaction the facilitator broadcast.
#[async_trait]
pub trait TransactionJournal: Send + Sync {
    async fn record_transaction(
        &self,
        chain_id: u64,
        call_label: &str,
        tx_hash: TxHash,
        status: &str,
    ) -> Result<()>;

    async fn transaction_status(&self, tx_hash: TxHash) -> Result<Option<String>>;
}

/// Last fully ingested block per event source.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn checkpoint(&self, source: &str) -> Result<Option<u64>>;
    async fn save_checkpoint(&self, source: &str, block_number: u64) -> Result<()>;
}

pub trait Store:
    EntityStore<Message>
    + EntityStore<MessageTransferRequest>
    + EntityStore<Gateway>
    + EntityStore<AuxiliaryChain>
    + MessageQueries
    + RequestQueries
{
}

impl<T> Store for T where
    T: EntityStore<Message>
        + EntityStore<MessageTransferRequest>
        + EntityStore<Gateway>
        + EntityStore<AuxiliaryChain>
        + MessageQueries
        + RequestQueries
{
}

/// Shared filter for `messages_pending_confirmation`.
pub fn is_pending_confirmation(message: &Message, gateway: Address, block_height: u64) -> bool {
    use crate::models::model::MessageStatus;

    message.gateway_address == Some(gateway)
        && message.source_status == Some(MessageStatus::Declared)
        && message.target_status == Some(MessageStatus::Undeclared)
        && message.hash_lock.is_some()
        && message
            .source_declaration_block_height
            .is_some_and(|height| height <= block_height)
}
