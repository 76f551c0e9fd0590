use std::sync::Arc;

use ethers::{
    abi::AbiEncode,
    types::{TxHash, U256},
};
use futures::future::join_all;
use tracing::{error, info};

use crate::{
    chain::contracts::{co_gateway::ConfirmStakeIntentCall, gateway::ConfirmRedeemIntentCall},
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{Gateway, Message, MessageType},
        traits::ContractCall,
    },
    repositories::repositories::Repositories,
    services::context::Chains,
};

/// Storage slot of the gateways' outbox mapping.
pub const OUTBOX_OFFSET: u64 = 7;

/// Confirms declared messages on the opposite chain once their gateway has been proven there.
pub struct ConfirmService {
    repositories: Arc<Repositories>,
    chains: Arc<Chains>,
}

impl ConfirmService {
    pub fn new(repositories: Arc<Repositories>, chains: Arc<Chains>) -> Self {
        Self {
            repositories,
            chains,
        }
    }

    pub async fn on_change(&self, gateways: Vec<Gateway>) -> Vec<FacilitatorResult<TxHash>> {
        let mut results = Vec::new();
        for gateway in gateways
            .iter()
            .filter(|g| g.last_remote_gateway_proven_block_height > 0)
        {
            match self.confirm_gateway(gateway).await {
                Ok(confirmed) => results.extend(confirmed),
                Err(e) => {
                    error!(
                        "❌ Failed to load messages for gateway {:?}: {}",
                        gateway.gateway_address, e
                    );
                    results.push(Err(e));
                }
            }
        }
        results
    }

    async fn confirm_gateway(
        &self,
        gateway: &Gateway,
    ) -> FacilitatorResult<Vec<FacilitatorResult<TxHash>>> {
        let height = gateway.last_remote_gateway_proven_block_height;
        let pending = self
            .repositories
            .message
            .messages_pending_confirmation(gateway.remote_gateway_address, height)
            .await?;

        let mut candidates = Vec::new();
        for message in pending {
            if self.repositories.message.known_secret(&message).await?.is_some() {
                candidates.push(message);
            }
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "🧾 Confirming {} message(s) on {:?} at proven height {}",
            candidates.len(),
            gateway.gateway_address,
            height
        );

        let results = join_all(
            candidates
                .iter()
                .map(|message| self.confirm_message(gateway, message)),
        )
        .await;

        for (message, result) in candidates.iter().zip(&results) {
            match result {
                Ok(tx_hash) => info!(
                    "✅ Confirmed message {:?}: {:?}",
                    message.message_hash, tx_hash
                ),
                Err(FacilitatorError::ProofUnavailable { .. }) => info!(
                    "⏳ Outbox proof for {:?} not available yet",
                    message.message_hash
                ),
                Err(e) => error!(
                    "❌ Failed to confirm message {:?}: {}",
                    message.message_hash, e
                ),
            }
        }
        Ok(results)
    }

    async fn confirm_message(&self, gateway: &Gateway, message: &Message) -> FacilitatorResult<TxHash> {
        let message_hash = message.message_hash;
        let height = gateway.last_remote_gateway_proven_block_height;

        let request = self
            .repositories
            .request
            .request_by_message_hash(message_hash)
            .await?
            .ok_or_else(|| FacilitatorError::not_found("message_transfer_request", message_hash))?;
        let hash_lock = message
            .hash_lock
            .ok_or_else(|| FacilitatorError::not_found("hash_lock", message_hash))?;

        let source = self.chains.for_gateway_type(gateway.gateway_type.opposite());
        let proof = source
            .proof_generator
            .outbox_proof(
                gateway.remote_gateway_address,
                &[message_hash],
                height,
                OUTBOX_OFFSET,
            )
            .await?
            .into_iter()
            .next()
            .filter(|p| !p.value.is_zero())
            .ok_or_else(|| FacilitatorError::ProofUnavailable {
                key: format!("{:?}", message_hash),
                block_height: height,
            })?;

        let sender = message.sender.unwrap_or(request.sender_proxy);
        let nonce = message.nonce.unwrap_or(request.nonce);
        let gas_price = message.gas_price.unwrap_or(request.gas_price);
        let gas_limit = message.gas_limit.unwrap_or(request.gas_limit);
        let block_height = U256::from(height);

        let call = match message.message_type.unwrap_or(request.request_type) {
            MessageType::Stake => ContractCall {
                label: "confirmStakeIntent",
                to: gateway.gateway_address,
                data: ConfirmStakeIntentCall {
                    staker: sender,
                    staker_nonce: nonce,
                    beneficiary: request.beneficiary,
                    amount: request.amount,
                    gas_price,
                    gas_limit,
                    hash_lock: hash_lock.0,
                    block_height,
                    rlp_parent_nodes: proof.serialized_proof,
                }
                .encode()
                .into(),
            },
            MessageType::Redeem => ContractCall {
                label: "confirmRedeemIntent",
                to: gateway.gateway_address,
                data: ConfirmRedeemIntentCall {
                    redeemer: sender,
                    redeemer_nonce: nonce,
                    beneficiary: request.beneficiary,
                    amount: request.amount,
                    gas_price,
                    gas_limit,
                    block_height,
                    hash_lock: hash_lock.0,
                    rlp_parent_nodes: proof.serialized_proof,
                }
                .encode()
                .into(),
            },
        };

        self.chains
            .for_gateway_type(gateway.gateway_type)
            .submit(call, None)
            .await
    }
}
