use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    config::config::FacilitatorConfig,
    models::model::{AuxiliaryChain, Gateway, GatewayType},
    repositories::repositories::Repositories,
};

/// Setup records the bridge needs before any event can be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupRecords {
    pub origin_gateway: Gateway,
    pub co_gateway: Gateway,
    pub auxiliary_chain: AuxiliaryChain,
}

impl SetupRecords {
    pub fn from_config(config: &FacilitatorConfig) -> Result<Self> {
        let origin = &config.origin;
        let auxiliary = &config.auxiliary;

        let origin_gateway = Gateway {
            gateway_address: origin.gateway()?,
            chain_id: origin.chain_id,
            gateway_type: GatewayType::Origin,
            remote_gateway_address: auxiliary.gateway()?,
            token_address: origin.token()?,
            anchor_address: origin.anchor()?,
            bounty: origin.bounty()?,
            activation: true,
            last_remote_gateway_proven_block_height: 0,
        };

        let co_gateway = Gateway {
            gateway_address: auxiliary.gateway()?,
            chain_id: auxiliary.chain_id,
            gateway_type: GatewayType::Auxiliary,
            remote_gateway_address: origin.gateway()?,
            token_address: auxiliary.token()?,
            anchor_address: auxiliary.anchor()?,
            bounty: auxiliary.bounty()?,
            activation: true,
            last_remote_gateway_proven_block_height: 0,
        };

        // The auxiliary-side anchor tracks origin heights, the origin-side one auxiliary heights.
        let auxiliary_chain = AuxiliaryChain {
            chain_id: auxiliary.chain_id,
            anchor_address: auxiliary.anchor()?,
            co_anchor_address: origin.anchor()?,
            last_origin_block_height: 0,
            last_auxiliary_block_height: 0,
        };

        Ok(Self {
            origin_gateway,
            co_gateway,
            auxiliary_chain,
        })
    }

    /// Creates whichever records are missing. Existing ones are left untouched.
    pub async fn seed(&self, repositories: &Repositories) -> Result<usize> {
        let mut created = 0;

        for gateway in [&self.origin_gateway, &self.co_gateway] {
            if repositories.gateway.get(&gateway.gateway_address).await?.is_some() {
                debug!("⏭️  Gateway {:?} already set up", gateway.gateway_address);
                continue;
            }
            repositories
                .gateway
                .save(gateway.clone())
                .await
                .with_context(|| format!("Failed to seed gateway {:?}", gateway.gateway_address))?;
            info!(
                "🌱 Seeded {} gateway {:?}",
                gateway.gateway_type.as_str(),
                gateway.gateway_address
            );
            created += 1;
        }

        let chain = &self.auxiliary_chain;
        if repositories.auxiliary_chain.get(&chain.chain_id).await?.is_none() {
            repositories
                .auxiliary_chain
                .save(chain.clone())
                .await
                .with_context(|| format!("Failed to seed auxiliary chain {}", chain.chain_id))?;
            info!("🌱 Seeded auxiliary chain {}", chain.chain_id);
            created += 1;
        }

        // Seeded records are not changes for the services to act on.
        repositories.notify().await;
        Ok(created)
    }
}
