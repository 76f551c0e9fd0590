use std::{collections::HashMap, sync::Arc};

use ethers::types::Address;
use tracing::{debug, info};

use crate::{
    handlers::{
        event::{EventFields, EventKind, RawEvent},
        handler::{PersistReport, parse_events, persist_each},
    },
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::Gateway,
    },
    repositories::repositories::Repositories,
};

#[derive(Debug, Clone, Copy)]
struct GatewayProof {
    /// Gateway that verified the proof.
    prover: Address,
    remote_gateway: Address,
    block_height: u64,
}

/// Records the highest remote block height at which each gateway proved its counterpart.
pub struct GatewayProvenHandler {
    repositories: Arc<Repositories>,
}

impl GatewayProvenHandler {
    pub fn new(repositories: Arc<Repositories>) -> Self {
        Self { repositories }
    }

    fn parse(event: &EventFields) -> FacilitatorResult<GatewayProof> {
        Ok(GatewayProof {
            prover: event.contract_address()?,
            remote_gateway: event.address("_gateway")?,
            block_height: event.u64("_blockHeight")?,
        })
    }

    pub async fn persist(&self, events: &[RawEvent]) -> PersistReport<Gateway> {
        let (proofs, failures) = parse_events(EventKind::GatewayProven, events, Self::parse);

        let mut highest: Vec<GatewayProof> = Vec::new();
        let mut index: HashMap<Address, usize> = HashMap::new();
        for proof in proofs {
            match index.get(&proof.prover) {
                Some(&at) if highest[at].block_height >= proof.block_height => {}
                Some(&at) => highest[at] = proof,
                None => {
                    index.insert(proof.prover, highest.len());
                    highest.push(proof);
                }
            }
        }

        let items = highest
            .into_iter()
            .map(|proof| (proof.prover, self.persist_one(proof)))
            .collect();

        let report = persist_each(EventKind::GatewayProven, items, failures).await;
        info!(
            "🔐 GatewayProven: {} gateway(s) persisted, {} failed",
            report.persisted.len(),
            report.failures.len()
        );
        report
    }

    async fn persist_one(&self, proof: GatewayProof) -> FacilitatorResult<Option<Gateway>> {
        let gateway = self
            .repositories
            .gateway
            .get(&proof.prover)
            .await?
            .ok_or_else(|| FacilitatorError::not_found("gateway", proof.prover))?;

        if gateway.remote_gateway_address != proof.remote_gateway {
            debug!(
                "⚠️  Gateway {:?} proved {:?}, expected remote {:?}",
                proof.prover, proof.remote_gateway, gateway.remote_gateway_address
            );
        }

        let outcome = self
            .repositories
            .gateway
            .update(&proof.prover, |stored| {
                stored
                    .filter(|g| proof.block_height > g.last_remote_gateway_proven_block_height)
                    .map(|g| Gateway {
                        last_remote_gateway_proven_block_height: proof.block_height,
                        ..g
                    })
            })
            .await?;

        Ok(outcome.into_entity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        co_gateway_address, event, origin_gateway, origin_gateway_address, seeded_repositories,
    };
    use serde_json::json;

    fn proven(prover: Address, remote: Address, height: u64) -> RawEvent {
        event(json!({
            "_gateway": format!("{:?}", remote),
            "_blockHeight": height,
            "_storageRoot": format!("{:?}", ethers::types::H256::repeat_byte(0x5A)),
            "_wasAlreadyProved": false,
            "contractAddress": format!("{:?}", prover),
            "blockNumber": 200,
        }))
    }

    async fn set_height(repositories: &Repositories, height: u64) {
        repositories
            .gateway
            .save(Gateway {
                last_remote_gateway_proven_block_height: height,
                ..origin_gateway()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lower_height_is_ignored_higher_is_taken() {
        let (store, repositories) = seeded_repositories().await;
        set_height(&repositories, 5).await;
        let handler = GatewayProvenHandler::new(repositories.clone());
        let writes = store.write_count();

        let report = handler
            .persist(&[proven(origin_gateway_address(), co_gateway_address(), 3)])
            .await;
        assert_eq!(report.persisted[0].last_remote_gateway_proven_block_height, 5);
        assert_eq!(store.write_count(), writes);

        let report = handler
            .persist(&[proven(origin_gateway_address(), co_gateway_address(), 10)])
            .await;
        assert_eq!(report.persisted[0].last_remote_gateway_proven_block_height, 10);
        assert_eq!(store.write_count(), writes + 1);
    }

    #[tokio::test]
    async fn test_batch_takes_highest_height_regardless_of_order() {
        let (_, repositories) = seeded_repositories().await;
        let handler = GatewayProvenHandler::new(repositories.clone());

        let report = handler
            .persist(&[
                proven(origin_gateway_address(), co_gateway_address(), 9),
                proven(origin_gateway_address(), co_gateway_address(), 14),
                proven(origin_gateway_address(), co_gateway_address(), 11),
            ])
            .await;

        assert_eq!(report.persisted.len(), 1);
        assert_eq!(report.persisted[0].last_remote_gateway_proven_block_height, 14);
    }

    #[tokio::test]
    async fn test_unknown_gateway_does_not_abort_siblings() {
        let (_, repositories) = seeded_repositories().await;
        let handler = GatewayProvenHandler::new(repositories.clone());

        let report = handler
            .persist(&[
                proven(Address::from_low_u64_be(0xDEAD), co_gateway_address(), 9),
                proven(co_gateway_address(), origin_gateway_address(), 7),
            ])
            .await;

        assert_eq!(report.persisted.len(), 1);
        assert_eq!(report.persisted[0].gateway_address, co_gateway_address());
        assert_eq!(report.persisted[0].last_remote_gateway_proven_block_height, 7);
        assert_eq!(report.failures.len(), 1);
    }
}
