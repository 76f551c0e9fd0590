use std::sync::Arc;

use ethers::types::Address;
use tracing::{debug, info};

use crate::{
    crypto::hash_utils::{TransferTerms, request_hash},
    handlers::{
        event::{EventFields, EventKind, RawEvent},
        handler::{PersistReport, latest_by_key, parse_events, persist_each},
    },
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{MessageCommitment, MessageTransferRequest, MessageType},
    },
    repositories::repositories::Repositories,
};

/// Event field names of one request type.
struct RequestFields {
    sender: &'static str,
    sender_proxy: &'static str,
    gateway: &'static str,
    request_hash: &'static str,
}

const STAKE_FIELDS: RequestFields = RequestFields {
    sender: "staker",
    sender_proxy: "stakerProxy",
    gateway: "gateway",
    request_hash: "stakeRequestHash",
};

const REDEEM_FIELDS: RequestFields = RequestFields {
    sender: "redeemer",
    sender_proxy: "redeemerProxy",
    gateway: "cogateway",
    request_hash: "redeemRequestHash",
};

/// Ingests `StakeRequested` / `RedeemRequested` pool events.
pub struct RequestHandler {
    repositories: Arc<Repositories>,
    kind: EventKind,
    request_type: MessageType,
}

impl RequestHandler {
    pub fn new(repositories: Arc<Repositories>, kind: EventKind, request_type: MessageType) -> Self {
        Self {
            repositories,
            kind,
            request_type,
        }
    }

    fn fields(&self) -> &'static RequestFields {
        match self.request_type {
            MessageType::Stake => &STAKE_FIELDS,
            MessageType::Redeem => &REDEEM_FIELDS,
        }
    }

    fn parse(&self, event: &EventFields) -> FacilitatorResult<MessageTransferRequest> {
        let names = self.fields();
        let pool = event.contract_address()?;

        let terms = TransferTerms {
            amount: event.u256("amount")?,
            beneficiary: event.address("beneficiary")?,
            gas_price: event.u256("gasPrice")?,
            gas_limit: event.u256("gasLimit")?,
            nonce: event.u256("nonce")?,
            sender: event.address(names.sender)?,
            gateway: event.address(names.gateway)?,
        };
        let carried = event.h256(names.request_hash)?;

        let computed = request_hash(self.request_type, &terms, pool);
        if computed != carried {
            return Err(FacilitatorError::MalformedEvent {
                kind: self.kind.to_string(),
                field: names.request_hash.to_string(),
                reason: format!("{:?} does not match the request terms ({:?})", carried, computed),
            });
        }

        Ok(MessageTransferRequest {
            request_hash: carried,
            request_type: self.request_type,
            block_number: event.block_number()?,
            amount: terms.amount,
            beneficiary: terms.beneficiary,
            gas_price: terms.gas_price,
            gas_limit: terms.gas_limit,
            nonce: terms.nonce,
            gateway: terms.gateway,
            sender: terms.sender,
            sender_proxy: event.address(names.sender_proxy)?,
            message_hash: MessageCommitment::Uncommitted,
        })
    }

    pub async fn persist(&self, events: &[RawEvent]) -> PersistReport<MessageTransferRequest> {
        let (requests, failures) = parse_events(self.kind, events, |e| self.parse(e));
        let requests = latest_by_key(requests, |r| r.request_hash);

        let items = requests
            .into_iter()
            .map(|request| (request.request_hash, self.persist_one(request)))
            .collect();

        let report = persist_each(self.kind, items, failures).await;
        info!(
            "📥 {}: {} request(s) persisted, {} failed",
            self.kind,
            report.persisted.len(),
            report.failures.len()
        );
        report
    }

    async fn persist_one(
        &self,
        request: MessageTransferRequest,
    ) -> FacilitatorResult<Option<MessageTransferRequest>> {
        self.require_gateway(request.gateway).await?;

        let request_hash = request.request_hash;
        let block_number = request.block_number;
        let outcome = self
            .repositories
            .request
            .update(&request_hash, move |stored| match stored {
                None => Some(request),
                // A later block means the chain reorganised; the old commitment no longer holds.
                Some(stored) if block_number > stored.block_number => Some(request),
                Some(_) => None,
            })
            .await?;

        if !outcome.is_written() {
            debug!("⏭️  Request {:?} at block {} is stale", request_hash, block_number);
        }
        Ok(outcome.into_entity())
    }

    async fn require_gateway(&self, gateway: Address) -> FacilitatorResult<()> {
        match self.repositories.gateway.get(&gateway).await? {
            Some(_) => Ok(()),
            None => Err(FacilitatorError::not_found("gateway", gateway)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        origin_gateway_address, seeded_repositories, stake_pool, stake_request_event,
        stake_terms,
    };
    use ethers::types::{H256, U256};

    fn handler(repositories: Arc<Repositories>) -> RequestHandler {
        RequestHandler::new(repositories, EventKind::StakeRequested, MessageType::Stake)
    }

    #[tokio::test]
    async fn test_new_request_is_stored_uncommitted() {
        let (_, repositories) = seeded_repositories().await;
        let event = stake_request_event(&stake_terms(), 10);

        let report = handler(repositories.clone()).persist(&[event]).await;
        assert!(report.failures.is_empty());
        assert_eq!(report.persisted.len(), 1);

        let request = &report.persisted[0];
        assert_eq!(request.block_number, 10);
        assert_eq!(request.gateway, origin_gateway_address());
        assert_eq!(request.amount, U256::from(10));
        assert_eq!(request.message_hash, MessageCommitment::Uncommitted);
        assert_eq!(
            request.request_hash,
            request_hash(MessageType::Stake, &stake_terms(), stake_pool())
        );
    }

    #[tokio::test]
    async fn test_fork_rule_resets_commitment_only_for_later_blocks() {
        let (_, repositories) = seeded_repositories().await;
        let handler = handler(repositories.clone());

        handler
            .persist(&[stake_request_event(&stake_terms(), 10)])
            .await;
        let request_hash = request_hash(MessageType::Stake, &stake_terms(), stake_pool());
        let committed = repositories
            .request
            .update(&request_hash, |stored| {
                stored.map(|r| MessageTransferRequest {
                    message_hash: MessageCommitment::Committed(H256::repeat_byte(0x01)),
                    ..r
                })
            })
            .await
            .unwrap()
            .into_entity()
            .unwrap();

        // Stale observation leaves the record untouched.
        handler
            .persist(&[stake_request_event(&stake_terms(), 5)])
            .await;
        let stored = repositories.request.get(&request_hash).await.unwrap().unwrap();
        assert_eq!(stored, committed);

        handler
            .persist(&[stake_request_event(&stake_terms(), 20)])
            .await;
        let stored = repositories.request.get(&request_hash).await.unwrap().unwrap();
        assert_eq!(stored.block_number, 20);
        assert_eq!(stored.message_hash, MessageCommitment::Uncommitted);
    }

    #[tokio::test]
    async fn test_last_event_in_batch_wins() {
        let (store, repositories) = seeded_repositories().await;
        let writes_before = store.write_count();

        let report = handler(repositories.clone())
            .persist(&[
                stake_request_event(&stake_terms(), 12),
                stake_request_event(&stake_terms(), 11),
            ])
            .await;

        assert_eq!(report.persisted.len(), 1);
        assert_eq!(report.persisted[0].block_number, 11);
        assert_eq!(store.write_count(), writes_before + 1);
    }

    #[tokio::test]
    async fn test_unknown_gateway_fails_only_that_request() {
        let (_, repositories) = seeded_repositories().await;
        let orphan = TransferTerms {
            gateway: Address::from_low_u64_be(0xDEAD),
            ..stake_terms()
        };
        let sibling = TransferTerms {
            nonce: U256::from(2),
            ..stake_terms()
        };

        let report = handler(repositories)
            .persist(&[
                stake_request_event(&orphan, 10),
                stake_request_event(&sibling, 10),
            ])
            .await;

        assert_eq!(report.persisted.len(), 1);
        assert_eq!(report.persisted[0].nonce, U256::from(2));
        assert!(matches!(
            report.failures.as_slice(),
            [FacilitatorError::RecordNotFound { entity: "gateway", .. }]
        ));
    }

    #[tokio::test]
    async fn test_tampered_request_hash_is_rejected() {
        let (_, repositories) = seeded_repositories().await;
        let mut event = stake_request_event(&stake_terms(), 10);
        event.insert("amount".into(), "11".into());

        let report = handler(repositories).persist(&[event]).await;
        assert!(report.persisted.is_empty());
        assert!(matches!(
            &report.failures[0],
            FacilitatorError::MalformedEvent { field, .. } if field == "stakeRequestHash"
        ));
    }
}
