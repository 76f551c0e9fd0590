use std::sync::Arc;

use ethers::types::Address;
use tracing::{debug, info, warn};

use crate::{
    handlers::{
        event::{EventFields, EventKind, RawEvent},
        handler::{PersistReport, parse_events},
    },
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::AuxiliaryChain,
    },
    repositories::repositories::Repositories,
};

#[derive(Debug, Clone, Copy)]
struct StateRoot {
    anchor: Address,
    block_height: u64,
}

/// Tracks the highest state root each anchor of one auxiliary chain has made available.
pub struct AnchorHandler {
    repositories: Arc<Repositories>,
    auxiliary_chain_id: u64,
}

impl AnchorHandler {
    pub fn new(repositories: Arc<Repositories>, auxiliary_chain_id: u64) -> Self {
        Self {
            repositories,
            auxiliary_chain_id,
        }
    }

    fn parse(event: &EventFields) -> FacilitatorResult<StateRoot> {
        Ok(StateRoot {
            anchor: event.contract_address()?,
            block_height: event.u64("_blockHeight")?,
        })
    }

    pub async fn persist(&self, events: &[RawEvent]) -> PersistReport<AuxiliaryChain> {
        let (roots, mut failures) = parse_events(EventKind::StateRootAvailable, events, Self::parse);
        let mut report = PersistReport::default();

        match self.apply(&roots, &mut failures).await {
            Ok(Some(chain)) => report.persisted.push(chain),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "❌ Failed to record state roots for chain {}: {}",
                    self.auxiliary_chain_id, e
                );
                failures.push(e);
            }
        }

        report.failures = failures;
        info!(
            "⚓ StateRootAvailable: {} root(s) seen, {} failed",
            roots.len(),
            report.failures.len()
        );
        report
    }

    async fn apply(
        &self,
        roots: &[StateRoot],
        failures: &mut Vec<FacilitatorError>,
    ) -> FacilitatorResult<Option<AuxiliaryChain>> {
        if roots.is_empty() {
            return Ok(None);
        }

        let chain = self
            .repositories
            .auxiliary_chain
            .get(&self.auxiliary_chain_id)
            .await?
            .ok_or_else(|| FacilitatorError::not_found("auxiliary_chain", self.auxiliary_chain_id))?;

        let mut origin_height = None;
        let mut auxiliary_height = None;
        for root in roots {
            // The auxiliary-side anchor stores origin state roots and vice versa.
            let slot = if root.anchor == chain.anchor_address {
                &mut origin_height
            } else if root.anchor == chain.co_anchor_address {
                &mut auxiliary_height
            } else {
                warn!("⚠️  StateRootAvailable from unknown anchor {:?}", root.anchor);
                failures.push(FacilitatorError::not_found("anchor", root.anchor));
                continue;
            };
            *slot = Some(slot.map_or(root.block_height, |h: u64| h.max(root.block_height)));
        }

        let outcome = self
            .repositories
            .auxiliary_chain
            .update(&self.auxiliary_chain_id, |stored| {
                let stored = stored?;
                let raises_origin =
                    origin_height.is_some_and(|h| h > stored.last_origin_block_height);
                let raises_auxiliary =
                    auxiliary_height.is_some_and(|h| h > stored.last_auxiliary_block_height);
                if !raises_origin && !raises_auxiliary {
                    return None;
                }

                Some(AuxiliaryChain {
                    last_origin_block_height: stored
                        .last_origin_block_height
                        .max(origin_height.unwrap_or(0)),
                    last_auxiliary_block_height: stored
                        .last_auxiliary_block_height
                        .max(auxiliary_height.unwrap_or(0)),
                    ..stored
                })
            })
            .await?;

        if outcome.is_written() {
            debug!(
                "⚓ Chain {} anchored heights advanced",
                self.auxiliary_chain_id
            );
        }
        Ok(outcome.into_entity())
    }
}
