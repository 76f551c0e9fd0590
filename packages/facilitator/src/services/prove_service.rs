use std::sync::Arc;

use ethers::{
    abi::AbiEncode,
    types::{Address, TxHash, U256},
};
use futures::future::join_all;
use tracing::{error, info};

use crate::{
    chain::contracts::{co_gateway, gateway},
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{AuxiliaryChain, GatewayType},
        traits::ContractCall,
    },
    repositories::repositories::Repositories,
    services::context::Chains,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProveOutcome {
    Submitted(TxHash),
    /// The target gateway already knows the source gateway at this height.
    AlreadyProven { block_height: u64 },
    /// No declared message is waiting on this proof.
    NothingToProve { block_height: u64 },
}

/// Proves a gateway's storage on the opposite chain whenever a new state root is anchored.
pub struct ProveService {
    repositories: Arc<Repositories>,
    chains: Arc<Chains>,
    auxiliary_chain_id: u64,
    origin_gateway: Address,
    co_gateway: Address,
}

impl ProveService {
    pub fn new(
        repositories: Arc<Repositories>,
        chains: Arc<Chains>,
        auxiliary_chain_id: u64,
        origin_gateway: Address,
        co_gateway: Address,
    ) -> Self {
        Self {
            repositories,
            chains,
            auxiliary_chain_id,
            origin_gateway,
            co_gateway,
        }
    }

    pub async fn on_change(
        &self,
        chains: Vec<AuxiliaryChain>,
    ) -> Vec<FacilitatorResult<ProveOutcome>> {
        let Some(chain) = chains
            .into_iter()
            .find(|c| c.chain_id == self.auxiliary_chain_id)
        else {
            return Vec::new();
        };

        let mut jobs = Vec::new();
        if chain.last_origin_block_height > 0 {
            // Origin root anchored on auxiliary: the co-gateway can verify the origin gateway.
            jobs.push((self.origin_gateway, self.co_gateway, chain.last_origin_block_height));
        }
        if chain.last_auxiliary_block_height > 0 {
            jobs.push((self.co_gateway, self.origin_gateway, chain.last_auxiliary_block_height));
        }

        let results = join_all(
            jobs.iter()
                .map(|&(source, target, height)| self.prove(source, target, height)),
        )
        .await;

        for ((source, _, height), result) in jobs.iter().zip(&results) {
            match result {
                Ok(ProveOutcome::Submitted(tx_hash)) => info!(
                    "✅ Proving {:?} at {}: {:?}",
                    source, height, tx_hash
                ),
                Ok(outcome) => info!("⏭️  Not proving {:?}: {:?}", source, outcome),
                Err(e) => error!("❌ Failed to prove {:?} at {}: {}", source, height, e),
            }
        }
        results
    }

    /// Proves `source` into `target` at `block_height` of the source chain.
    pub async fn prove(
        &self,
        source: Address,
        target: Address,
        block_height: u64,
    ) -> FacilitatorResult<ProveOutcome> {
        let target_gateway = self
            .repositories
            .gateway
            .get(&target)
            .await?
            .ok_or_else(|| FacilitatorError::not_found("gateway", target))?;

        if target_gateway.last_remote_gateway_proven_block_height >= block_height {
            return Ok(ProveOutcome::AlreadyProven { block_height });
        }

        let pending = self
            .repositories
            .message
            .messages_pending_confirmation(source, block_height)
            .await?;
        if pending.is_empty() {
            return Ok(ProveOutcome::NothingToProve { block_height });
        }

        let source_chain = self
            .chains
            .for_gateway_type(target_gateway.gateway_type.opposite());
        let proof = source_chain
            .proof_generator
            .account_proof(source, block_height)
            .await?;

        let height = U256::from(block_height);
        let data = match target_gateway.gateway_type {
            GatewayType::Auxiliary => co_gateway::ProveGatewayCall {
                block_height: height,
                rlp_account: proof.encoded_account,
                rlp_parent_nodes: proof.serialized_proof,
            }
            .encode(),
            GatewayType::Origin => gateway::ProveGatewayCall {
                block_height: height,
                rlp_account: proof.encoded_account,
                rlp_parent_nodes: proof.serialized_proof,
            }
            .encode(),
        };

        let call = ContractCall {
            label: "proveGateway",
            to: target,
            data: data.into(),
        };
        let tx_hash = self
            .chains
            .for_gateway_type(target_gateway.gateway_type)
            .submit(call, None)
            .await?;

        Ok(ProveOutcome::Submitted(tx_hash))
    }
}
