use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, H256, TxHash};
use tokio::sync::RwLock;

use crate::{
    database::store::{
        CheckpointStore, EntityStore, MessageQueries, RequestQueries, TransactionJournal,
        is_pending_confirmation,
    },
    models::model::{AuxiliaryChain, Gateway, Message, MessageTransferRequest},
};

/// Process-local store with the same contract as the Postgres one.
#[derive(Default)]
pub struct MemoryStore {
    messages: RwLock<HashMap<H256, Message>>,
    requests: RwLock<HashMap<H256, MessageTransferRequest>>,
    gateways: RwLock<HashMap<Address, Gateway>>,
    auxiliary_chains: RwLock<HashMap<u64, AuxiliaryChain>>,
    secrets: RwLock<HashMap<H256, H256>>,
    transactions: RwLock<HashMap<TxHash, (u64, String, String)>>,
    checkpoints: RwLock<HashMap<String, u64>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entity upserts performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.values().cloned().collect()
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntityStore<Message> for MemoryStore {
    async fn get(&self, key: &H256) -> Result<Option<Message>> {
        Ok(self.messages.read().await.get(key).cloned())
    }

    async fn put(&self, entity: &Message) -> Result<()> {
        self.messages
            .write()
            .await
            .insert(entity.message_hash, entity.clone());
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl EntityStore<MessageTransferRequest> for MemoryStore {
    async fn get(&self, key: &H256) -> Result<Option<MessageTransferRequest>> {
        Ok(self.requests.read().await.get(key).cloned())
    }

    async fn put(&self, entity: &MessageTransferRequest) -> Result<()> {
        self.requests
            .write()
            .await
            .insert(entity.request_hash, entity.clone());
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl EntityStore<Gateway> for MemoryStore {
    async fn get(&self, key: &Address) -> Result<Option<Gateway>> {
        Ok(self.gateways.read().await.get(key).cloned())
    }

    async fn put(&self, entity: &Gateway) -> Result<()> {
        self.gateways
            .write()
            .await
            .insert(entity.gateway_address, entity.clone());
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl EntityStore<AuxiliaryChain> for MemoryStore {
    async fn get(&self, key: &u64) -> Result<Option<AuxiliaryChain>> {
        Ok(self.auxiliary_chains.read().await.get(key).cloned())
    }

    async fn put(&self, entity: &AuxiliaryChain) -> Result<()> {
        self.auxiliary_chains
            .write()
            .await
            .insert(entity.chain_id, entity.clone());
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl MessageQueries for MemoryStore {
    async fn messages_pending_confirmation(
        &self,
        gateway: Address,
        block_height: u64,
    ) -> Result<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut pending: Vec<Message> = messages
            .values()
            .filter(|m| is_pending_confirmation(m, gateway, block_height))
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.source_declaration_block_height);
        Ok(pending)
    }

    async fn put_secret(&self, message_hash: H256, secret: H256) -> Result<()> {
        self.secrets.write().await.insert(message_hash, secret);
        Ok(())
    }

    async fn get_secret(&self, message_hash: H256) -> Result<Option<H256>> {
        Ok(self.secrets.read().await.get(&message_hash).copied())
    }
}

#[async_trait]
impl RequestQueries for MemoryStore {
    async fn request_by_message_hash(
        &self,
        message_hash: H256,
    ) -> Result<Option<MessageTransferRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|r| r.message_hash.message_hash() == Some(message_hash))
            .cloned())
    }

    async fn uncommitted_requests(&self) -> Result<Vec<MessageTransferRequest>> {
        let requests = self.requests.read().await;
        let mut uncommitted: Vec<MessageTransferRequest> = requests
            .values()
            .filter(|r| !r.message_hash.is_committed())
            .cloned()
            .collect();
        uncommitted.sort_by_key(|r| r.block_number);
        Ok(uncommitted)
    }
}

#[async_trait]
impl TransactionJournal for MemoryStore {
    async fn record_transaction(
        &self,
        chain_id: u64,
        call_label: &str,
        tx_hash: TxHash,
        status: &str,
    ) -> Result<()> {
        self.transactions.write().await.insert(
            tx_hash,
            (chain_id, call_label.to_string(), status.to_string()),
        );
        Ok(())
    }

    async fn transaction_status(&self, tx_hash: TxHash) -> Result<Option<String>> {
        Ok(self
            .transactions
            .read()
            .await
            .get(&tx_hash)
            .map(|(_, _, status)| status.clone()))
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn checkpoint(&self, source: &str) -> Result<Option<u64>> {
        Ok(self.checkpoints.read().await.get(source).copied())
    }

    async fn save_checkpoint(&self, source: &str, block_number: u64) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(source.to_string(), block_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::model::{MessageStatus, MessageType};

    fn declared(byte: u8, gateway: Address, height: u64) -> Message {
        Message {
            source_status: Some(MessageStatus::Declared),
            source_declaration_block_height: Some(height),
            hash_lock: Some(H256::repeat_byte(0x01)),
            ..Message::synthesized(H256::repeat_byte(byte), MessageType::Stake, gateway)
        }
    }

    #[tokio::test]
    async fn test_pending_confirmation_filters_and_orders() {
        let store = MemoryStore::new();
        let gateway = Address::from_low_u64_be(0x6A7E);

        store.put(&declared(1, gateway, 9)).await.unwrap();
        store.put(&declared(2, gateway, 4)).await.unwrap();
        store.put(&declared(3, gateway, 20)).await.unwrap();
        store
            .put(&declared(4, Address::from_low_u64_be(0xC06A), 1))
            .await
            .unwrap();
        let mut confirmed = declared(5, gateway, 2);
        confirmed.target_status = Some(MessageStatus::Declared);
        store.put(&confirmed).await.unwrap();

        let pending = store.messages_pending_confirmation(gateway, 10).await.unwrap();
        let hashes: Vec<H256> = pending.iter().map(|m| m.message_hash).collect();
        assert_eq!(hashes, vec![H256::repeat_byte(2), H256::repeat_byte(1)]);
    }

    #[tokio::test]
    async fn test_journal_keeps_latest_status() {
        let store = MemoryStore::new();
        let tx_hash = TxHash::repeat_byte(0x09);

        store
            .record_transaction(1, "progressStake", tx_hash, "submitted")
            .await
            .unwrap();
        store
            .record_transaction(1, "progressStake", tx_hash, "confirmed")
            .await
            .unwrap();

        assert_eq!(
            store.transaction_status(tx_hash).await.unwrap().as_deref(),
            Some("confirmed")
        );
        assert_eq!(store.checkpoint("origin").await.unwrap(), None);
    }
}
