use std::sync::Arc;

use ethers::{
    abi::AbiEncode,
    types::{Address, H256},
};
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::{
    chain::contracts::{redeem_pool::AcceptRedeemRequestCall, stake_pool::AcceptStakeRequestCall},
    crypto::{
        hash_utils::{TransferTerms, compute_message_hash},
        secret::create_secret_hash_lock,
    },
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{
            Message, MessageCommitment, MessageStatus, MessageTransferRequest, MessageType,
        },
        traits::ContractCall,
    },
    repositories::repositories::Repositories,
    services::context::Chains,
};

/// Commits to uncommitted transfer requests by accepting them at their pool.
pub struct AcceptService {
    repositories: Arc<Repositories>,
    chains: Arc<Chains>,
    stake_pool: Address,
    redeem_pool: Address,
}

impl AcceptService {
    pub fn new(
        repositories: Arc<Repositories>,
        chains: Arc<Chains>,
        stake_pool: Address,
        redeem_pool: Address,
    ) -> Self {
        Self {
            repositories,
            chains,
            stake_pool,
            redeem_pool,
        }
    }

    pub async fn on_change(
        &self,
        requests: Vec<MessageTransferRequest>,
    ) -> Vec<FacilitatorResult<H256>> {
        let pending: Vec<_> = requests
            .into_iter()
            .filter(|r| !r.message_hash.is_committed())
            .collect();
        if pending.is_empty() {
            return Vec::new();
        }

        info!("🤝 Accepting {} request(s)", pending.len());
        let results = join_all(pending.iter().map(|r| self.accept(r))).await;

        for (request, result) in pending.iter().zip(&results) {
            match result {
                Ok(message_hash) => info!(
                    "✅ Request {:?} committed to message {:?}",
                    request.request_hash, message_hash
                ),
                Err(e) => error!(
                    "❌ Failed to accept request {:?}: {}",
                    request.request_hash, e
                ),
            }
        }
        results
    }

    async fn accept(&self, request: &MessageTransferRequest) -> FacilitatorResult<H256> {
        let gateway = self
            .repositories
            .gateway
            .get(&request.gateway)
            .await?
            .ok_or_else(|| FacilitatorError::not_found("gateway", request.gateway))?;

        let (secret, hash_lock) = create_secret_hash_lock();
        let terms = TransferTerms {
            amount: request.amount,
            beneficiary: request.beneficiary,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            nonce: request.nonce,
            sender: request.sender_proxy,
            gateway: request.gateway,
        };
        let message_hash = compute_message_hash(request.request_type, &terms, hash_lock);

        // The secret must survive a crash between submission and commit.
        self.repositories
            .message
            .store_secret(message_hash, secret)
            .await?;

        let (call, value) = match request.request_type {
            MessageType::Stake => (
                ContractCall {
                    label: "acceptStakeRequest",
                    to: self.stake_pool,
                    data: AcceptStakeRequestCall {
                        amount: request.amount,
                        beneficiary: request.beneficiary,
                        gas_price: request.gas_price,
                        gas_limit: request.gas_limit,
                        nonce: request.nonce,
                        staker: request.sender,
                        gateway: request.gateway,
                        hash_lock: hash_lock.0,
                    }
                    .encode()
                    .into(),
                },
                None,
            ),
            MessageType::Redeem => (
                ContractCall {
                    label: "acceptRedeemRequest",
                    to: self.redeem_pool,
                    data: AcceptRedeemRequestCall {
                        amount: request.amount,
                        beneficiary: request.beneficiary,
                        gas_price: request.gas_price,
                        gas_limit: request.gas_limit,
                        nonce: request.nonce,
                        redeemer: request.sender,
                        cogateway: request.gateway,
                        hash_lock: hash_lock.0,
                    }
                    .encode()
                    .into(),
                },
                Some(gateway.bounty),
            ),
        };

        self.chains
            .for_gateway_type(gateway.gateway_type)
            .submit(call, value)
            .await?;

        // No message row for an accept that never left.
        self.repositories
            .message
            .save(Message {
                message_type: Some(request.request_type),
                direction: Some(request.request_type.direction()),
                gateway_address: Some(request.gateway),
                source_status: Some(MessageStatus::Undeclared),
                target_status: Some(MessageStatus::Undeclared),
                sender: Some(request.sender_proxy),
                nonce: Some(request.nonce),
                gas_price: Some(request.gas_price),
                gas_limit: Some(request.gas_limit),
                hash_lock: Some(hash_lock),
                ..Message::new(message_hash)
            })
            .await?;

        let block_number = request.block_number;
        let outcome = self
            .repositories
            .request
            .update(&request.request_hash, move |stored| {
                stored
                    .filter(|s| !s.message_hash.is_committed() && s.block_number == block_number)
                    .map(|s| MessageTransferRequest {
                        message_hash: MessageCommitment::Committed(message_hash),
                        ..s
                    })
            })
            .await?;

        if !outcome.is_written() {
            debug!(
                "⏭️  Request {:?} changed while accepting; leaving it for the next cycle",
                request.request_hash
            );
        }
        Ok(message_hash)
    }
}
