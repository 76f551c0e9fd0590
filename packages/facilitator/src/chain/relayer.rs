use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, BlockId, BlockNumber, H256, TransactionRequest, TxHash},
};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    chain::proof::{account_proof, storage_proofs},
    crypto::hash_utils::mapping_storage_key,
    database::store::TransactionJournal,
    models::{
        error::{FacilitatorError, FacilitatorResult},
        traits::{
            AccountProof, ContractCall, ProofGenerator, StorageProof, TransactionSubmitter,
            TxOptions,
        },
    },
};

pub type ChainClient = SignerMiddleware<Provider<Http>, LocalWallet>;

const RECEIPT_POLLS: u32 = 60;

/// Signs, broadcasts and proves against one chain.
pub struct ChainRelayer {
    client: Arc<ChainClient>,
    journal: Arc<dyn TransactionJournal>,
    chain_id: u64,
    receipt_poll: Duration,
}

impl ChainRelayer {
    pub async fn new(
        rpc_url: &str,
        private_key: &str,
        expected_chain_id: u64,
        journal: Arc<dyn TransactionJournal>,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| anyhow!("Failed to create provider: {}", e))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| anyhow!("Failed to get chain ID: {}", e))?
            .as_u64();
        if chain_id != expected_chain_id {
            return Err(anyhow!(
                "RPC {} serves chain {}, expected {}",
                rpc_url,
                chain_id,
                expected_chain_id
            ));
        }

        let wallet: LocalWallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| anyhow!("Invalid private key: {}", e))?
            .with_chain_id(chain_id);

        info!(
            "🔗 Chain {} relayer ready (worker {:?})",
            chain_id,
            wallet.address()
        );

        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            journal,
            chain_id,
            receipt_poll: Duration::from_secs(5),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Account that signs every transaction sent through this relayer.
    pub fn worker(&self) -> Address {
        self.client.address()
    }

    pub fn provider(&self) -> &Provider<Http> {
        self.client.inner()
    }

    pub async fn health_check(&self) -> Result<()> {
        self.client
            .get_block_number()
            .await
            .map_err(|e| anyhow!("Chain {} RPC unhealthy: {}", self.chain_id, e))?;
        Ok(())
    }

    /// Follows the receipt in the background and journals the final status.
    fn watch_receipt(&self, label: &'static str, tx_hash: TxHash) {
        let client = self.client.clone();
        let journal = self.journal.clone();
        let chain_id = self.chain_id;
        let poll = self.receipt_poll;

        tokio::spawn(async move {
            for _ in 0..RECEIPT_POLLS {
                sleep(poll).await;

                let receipt = match client.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => receipt,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("⚠️  Failed to fetch receipt for {:?}: {}", tx_hash, e);
                        continue;
                    }
                };

                let status = if receipt.status == Some(1.into()) {
                    info!("✅ {} confirmed on chain {}: {:?}", label, chain_id, tx_hash);
                    "confirmed"
                } else {
                    warn!("❌ {} reverted on chain {}: {:?}", label, chain_id, tx_hash);
                    "reverted"
                };

                if let Err(e) = journal
                    .record_transaction(chain_id, label, tx_hash, status)
                    .await
                {
                    warn!("⚠️  Failed to journal {:?}: {}", tx_hash, e);
                }
                return;
            }

            warn!("⚠️  No receipt for {} {:?} after {} polls", label, tx_hash, RECEIPT_POLLS);
        });
    }

    fn at_height(block_height: u64) -> Option<BlockId> {
        Some(BlockId::Number(BlockNumber::Number(block_height.into())))
    }
}

#[async_trait]
impl TransactionSubmitter for ChainRelayer {
    async fn submit(&self, call: ContractCall, options: TxOptions) -> FacilitatorResult<TxHash> {
        let mut tx = TransactionRequest::new()
            .from(options.from)
            .to(call.to)
            .data(call.data.clone())
            .gas_price(options.gas_price);
        if let Some(value) = options.value {
            tx = tx.value(value);
        }

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| FacilitatorError::submission(call.label, e))?;
        let tx_hash = pending.tx_hash();

        self.journal
            .record_transaction(self.chain_id, call.label, tx_hash, "submitted")
            .await?;
        self.watch_receipt(call.label, tx_hash);

        Ok(tx_hash)
    }
}

#[async_trait]
impl ProofGenerator for ChainRelayer {
    async fn outbox_proof(
        &self,
        address: Address,
        keys: &[H256],
        block_height: u64,
        offset: u64,
    ) -> FacilitatorResult<Vec<StorageProof>> {
        let slots = keys
            .iter()
            .map(|key| mapping_storage_key(*key, offset))
            .collect();

        let response = self
            .client
            .get_proof(address, slots, Self::at_height(block_height))
            .await
            .map_err(|e| {
                FacilitatorError::Rpc(format!(
                    "eth_getProof for {:?} at {} failed: {}",
                    address, block_height, e
                ))
            })?;

        Ok(storage_proofs(&response, keys))
    }

    async fn account_proof(
        &self,
        address: Address,
        block_height: u64,
    ) -> FacilitatorResult<AccountProof> {
        let response = self
            .client
            .get_proof(address, Vec::new(), Self::at_height(block_height))
            .await
            .map_err(|e| {
                FacilitatorError::Rpc(format!(
                    "eth_getProof for {:?} at {} failed: {}",
                    address, block_height, e
                ))
            })?;

        Ok(account_proof(&response, block_height))
    }
}
