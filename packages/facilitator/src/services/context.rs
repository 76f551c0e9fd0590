use std::sync::Arc;

use ethers::types::{Address, TxHash, U256};
use tracing::info;

use crate::{
    models::{
        error::FacilitatorResult,
        model::GatewayType,
        traits::{ContractCall, ProofGenerator, TransactionSubmitter, TxOptions},
    },
    services::retry::RetryPolicy,
};

/// Everything a service needs to act on one chain.
pub struct ChainContext {
    pub chain_id: u64,
    pub submitter: Arc<dyn TransactionSubmitter>,
    pub proof_generator: Arc<dyn ProofGenerator>,
    /// Account that signs facilitator transactions.
    pub worker: Address,
    pub gas_price: U256,
    pub retry: RetryPolicy,
}

impl ChainContext {
    pub fn options(&self, value: Option<U256>) -> TxOptions {
        TxOptions {
            from: self.worker,
            gas_price: self.gas_price,
            value,
        }
    }

    /// Submits `call` under the chain's retry policy.
    pub async fn submit(&self, call: ContractCall, value: Option<U256>) -> FacilitatorResult<TxHash> {
        let label = format!("{} on chain {}", call.label, self.chain_id);
        let options = self.options(value);

        let tx_hash = self
            .retry
            .run(&label, || self.submitter.submit(call.clone(), options.clone()))
            .await?;

        info!("📤 {} sent: {:?}", label, tx_hash);
        Ok(tx_hash)
    }
}

pub struct Chains {
    pub origin: ChainContext,
    pub auxiliary: ChainContext,
}

impl Chains {
    /// Chain hosting a gateway of the given type.
    pub fn for_gateway_type(&self, gateway_type: GatewayType) -> &ChainContext {
        match gateway_type {
            GatewayType::Origin => &self.origin,
            GatewayType::Auxiliary => &self.auxiliary,
        }
    }
}
