use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, TxHash, U256};

use crate::models::error::FacilitatorResult;

/// Unsigned contract call: target contract and ABI-encoded calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub label: &'static str,
    pub to: Address,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    pub from: Address,
    pub gas_price: U256,
    pub value: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageProof {
    pub key: H256,
    pub value: U256,
    pub serialized_proof: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProof {
    pub block_height: u64,
    pub encoded_account: Bytes,
    pub serialized_proof: Bytes,
}

#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Signs and broadcasts the call; resolves once the node accepted it.
    async fn submit(&self, call: ContractCall, options: TxOptions) -> FacilitatorResult<TxHash>;
}

#[async_trait]
pub trait ProofGenerator: Send + Sync {
    /// Storage proofs for `keys` in the mapping at slot `offset` of `address`.
    async fn outbox_proof(
        &self,
        address: Address,
        keys: &[H256],
        block_height: u64,
        offset: u64,
    ) -> FacilitatorResult<Vec<StorageProof>>;

    async fn account_proof(
        &self,
        address: Address,
        block_height: u64,
    ) -> FacilitatorResult<AccountProof>;
}
