//! Shared fixtures and chain doubles for unit tests.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, TxHash, U256};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::{
    crypto::hash_utils::{TransferTerms, request_hash},
    database::memory::MemoryStore,
    handlers::event::RawEvent,
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{
            AuxiliaryChain, Gateway, GatewayType, MessageCommitment, MessageTransferRequest,
            MessageType,
        },
        traits::{
            AccountProof, ContractCall, ProofGenerator, StorageProof, TransactionSubmitter,
            TxOptions,
        },
    },
    repositories::repositories::Repositories,
    services::{
        context::{ChainContext, Chains},
        retry::RetryPolicy,
    },
};

pub const ORIGIN_CHAIN_ID: u64 = 1;
pub const AUXILIARY_CHAIN_ID: u64 = 3;

// ==================== Addresses ====================

pub fn origin_gateway_address() -> Address {
    Address::from_low_u64_be(0x6A7E)
}

pub fn co_gateway_address() -> Address {
    Address::from_low_u64_be(0xC06A)
}

pub fn stake_pool() -> Address {
    Address::from_low_u64_be(0x5700)
}

pub fn redeem_pool() -> Address {
    Address::from_low_u64_be(0x4ED0)
}

fn anchor_address() -> Address {
    Address::from_low_u64_be(0xA1)
}

fn co_anchor_address() -> Address {
    Address::from_low_u64_be(0xA2)
}

// ==================== Entities ====================

pub fn origin_gateway() -> Gateway {
    Gateway {
        gateway_address: origin_gateway_address(),
        chain_id: ORIGIN_CHAIN_ID,
        gateway_type: GatewayType::Origin,
        remote_gateway_address: co_gateway_address(),
        token_address: Address::from_low_u64_be(0x70C),
        anchor_address: co_anchor_address(),
        bounty: U256::from(100),
        activation: true,
        last_remote_gateway_proven_block_height: 0,
    }
}

pub fn co_gateway() -> Gateway {
    Gateway {
        gateway_address: co_gateway_address(),
        chain_id: AUXILIARY_CHAIN_ID,
        gateway_type: GatewayType::Auxiliary,
        remote_gateway_address: origin_gateway_address(),
        token_address: Address::from_low_u64_be(0x7C0),
        anchor_address: anchor_address(),
        bounty: U256::from(100),
        activation: true,
        last_remote_gateway_proven_block_height: 0,
    }
}

pub fn auxiliary_chain() -> AuxiliaryChain {
    AuxiliaryChain {
        chain_id: AUXILIARY_CHAIN_ID,
        anchor_address: anchor_address(),
        co_anchor_address: co_anchor_address(),
        last_origin_block_height: 0,
        last_auxiliary_block_height: 0,
    }
}

pub async fn seed(repositories: &Repositories) {
    repositories.gateway.save(origin_gateway()).await.unwrap();
    repositories.gateway.save(co_gateway()).await.unwrap();
    repositories
        .auxiliary_chain
        .save(auxiliary_chain())
        .await
        .unwrap();
    // Seeding is not a change anyone should react to.
    repositories.notify().await;
}

pub async fn seeded_repositories() -> (Arc<MemoryStore>, Arc<Repositories>) {
    let store = Arc::new(MemoryStore::new());
    let repositories = Arc::new(Repositories::new(store.clone()));
    seed(&repositories).await;
    (store, repositories)
}

// ==================== Events ====================

pub fn event(value: Value) -> RawEvent {
    match value {
        Value::Object(map) => map,
        other => panic!("event fixture must be an object, got {}", other),
    }
}

pub fn stake_terms() -> TransferTerms {
    TransferTerms {
        amount: U256::from(10),
        beneficiary: Address::from_low_u64_be(0xBEEF),
        gas_price: U256::one(),
        gas_limit: U256::one(),
        nonce: U256::one(),
        sender: Address::from_low_u64_be(0xABC),
        gateway: origin_gateway_address(),
    }
}

fn staker_proxy() -> Address {
    Address::from_low_u64_be(0xABC1)
}

pub fn stake_request(terms: &TransferTerms, block_number: u64) -> MessageTransferRequest {
    MessageTransferRequest {
        request_hash: request_hash(MessageType::Stake, terms, stake_pool()),
        request_type: MessageType::Stake,
        block_number,
        amount: terms.amount,
        beneficiary: terms.beneficiary,
        gas_price: terms.gas_price,
        gas_limit: terms.gas_limit,
        nonce: terms.nonce,
        gateway: terms.gateway,
        sender: terms.sender,
        sender_proxy: staker_proxy(),
        message_hash: MessageCommitment::Uncommitted,
    }
}

pub fn stake_request_event(terms: &TransferTerms, block_number: u64) -> RawEvent {
    event(json!({
        "amount": terms.amount.to_string(),
        "beneficiary": format!("{:?}", terms.beneficiary),
        "gasPrice": terms.gas_price.to_string(),
        "gasLimit": terms.gas_limit.to_string(),
        "nonce": terms.nonce.to_string(),
        "staker": format!("{:?}", terms.sender),
        "stakerProxy": format!("{:?}", staker_proxy()),
        "gateway": format!("{:?}", terms.gateway),
        "stakeRequestHash": format!("{:?}", request_hash(MessageType::Stake, terms, stake_pool())),
        "contractAddress": format!("{:?}", stake_pool()),
        "blockNumber": block_number,
    }))
}

// ==================== Chain doubles ====================

type CallPredicate = Box<dyn Fn(&ContractCall) -> bool + Send + Sync>;

/// Records every submitted call and answers with a fresh transaction hash.
pub struct MockSubmitter {
    calls: Mutex<Vec<(ContractCall, TxOptions)>>,
    fail_when: Option<CallPredicate>,
    hang: bool,
    counter: AtomicU64,
}

impl Default for MockSubmitter {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_when: None,
            hang: false,
            counter: AtomicU64::new(1),
        }
    }
}

impl MockSubmitter {
    pub fn failing_when(predicate: impl Fn(&ContractCall) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_when: Some(Box::new(predicate)),
            ..Self::default()
        }
    }

    /// Never answers, like a node that stopped responding.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Successfully submitted calls, in order.
    pub async fn calls(&self) -> Vec<(ContractCall, TxOptions)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TransactionSubmitter for MockSubmitter {
    async fn submit(&self, call: ContractCall, options: TxOptions) -> FacilitatorResult<TxHash> {
        if self.hang {
            futures::future::pending::<()>().await;
        }
        if self.fail_when.as_ref().is_some_and(|fails| fails(&call)) {
            return Err(FacilitatorError::submission(call.label, "execution reverted"));
        }
        self.calls.lock().await.push((call, options));
        Ok(TxHash::from_low_u64_be(
            self.counter.fetch_add(1, Ordering::SeqCst),
        ))
    }
}

type OutboxRequest = (Address, Vec<H256>, u64, u64);

/// Serves canned proofs and records what was asked for.
pub struct MockProofGenerator {
    storage_value: U256,
    outbox_requests: Mutex<Vec<OutboxRequest>>,
    account_requests: Mutex<Vec<(Address, u64)>>,
}

impl Default for MockProofGenerator {
    fn default() -> Self {
        Self {
            storage_value: U256::one(),
            outbox_requests: Mutex::new(Vec::new()),
            account_requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockProofGenerator {
    /// Every outbox slot reads as zero.
    pub fn unavailable() -> Self {
        Self {
            storage_value: U256::zero(),
            ..Self::default()
        }
    }

    pub async fn outbox_requests(&self) -> Vec<OutboxRequest> {
        self.outbox_requests.lock().await.clone()
    }

    pub async fn account_requests(&self) -> Vec<(Address, u64)> {
        self.account_requests.lock().await.clone()
    }
}

#[async_trait]
impl ProofGenerator for MockProofGenerator {
    async fn outbox_proof(
        &self,
        address: Address,
        keys: &[H256],
        block_height: u64,
        offset: u64,
    ) -> FacilitatorResult<Vec<StorageProof>> {
        self.outbox_requests
            .lock()
            .await
            .push((address, keys.to_vec(), block_height, offset));

        Ok(keys
            .iter()
            .map(|key| StorageProof {
                key: *key,
                value: self.storage_value,
                serialized_proof: Bytes::from(vec![0xC0]),
            })
            .collect())
    }

    async fn account_proof(
        &self,
        address: Address,
        block_height: u64,
    ) -> FacilitatorResult<AccountProof> {
        self.account_requests
            .lock()
            .await
            .push((address, block_height));

        Ok(AccountProof {
            block_height,
            encoded_account: Bytes::from(vec![0xC4, 0x80, 0x80, 0x80, 0x80]),
            serialized_proof: Bytes::from(vec![0xC0]),
        })
    }
}

fn context(
    chain_id: u64,
    submitter: Arc<MockSubmitter>,
    proofs: Arc<MockProofGenerator>,
) -> ChainContext {
    ChainContext {
        chain_id,
        submitter,
        proof_generator: proofs,
        worker: Address::from_low_u64_be(0xF00D),
        gas_price: U256::from(1_000_000_000u64),
        retry: RetryPolicy::once(),
    }
}

pub fn chains_with(
    origin: Arc<MockSubmitter>,
    auxiliary: Arc<MockSubmitter>,
    proofs: Arc<MockProofGenerator>,
) -> Chains {
    Chains {
        origin: context(ORIGIN_CHAIN_ID, origin, proofs.clone()),
        auxiliary: context(AUXILIARY_CHAIN_ID, auxiliary, proofs),
    }
}
