use std::{collections::BTreeMap, sync::Arc};

use crate::{
    handlers::{
        anchor_handler::AnchorHandler,
        event::{EventKind, RawEvent},
        gateway_proven_handler::GatewayProvenHandler,
        handler::PersistReport,
        message_status_handler::MessageStatusHandler,
        request_handler::RequestHandler,
    },
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{AuxiliaryChain, Gateway, Message, MessageTransferRequest},
    },
    repositories::repositories::Repositories,
};

pub enum Handler {
    Request(RequestHandler),
    MessageStatus(MessageStatusHandler),
    Anchor(AnchorHandler),
    GatewayProven(GatewayProvenHandler),
}

/// Output of one handler run, by entity type.
#[derive(Debug)]
pub enum Persisted {
    Requests(PersistReport<MessageTransferRequest>),
    Messages(PersistReport<Message>),
    AuxiliaryChains(PersistReport<AuxiliaryChain>),
    Gateways(PersistReport<Gateway>),
}

impl Persisted {
    pub fn persisted_count(&self) -> usize {
        match self {
            Self::Requests(r) => r.persisted.len(),
            Self::Messages(r) => r.persisted.len(),
            Self::AuxiliaryChains(r) => r.persisted.len(),
            Self::Gateways(r) => r.persisted.len(),
        }
    }

    pub fn failures(&self) -> &[FacilitatorError] {
        match self {
            Self::Requests(r) => &r.failures,
            Self::Messages(r) => &r.failures,
            Self::AuxiliaryChains(r) => &r.failures,
            Self::Gateways(r) => &r.failures,
        }
    }
}

impl Handler {
    pub fn for_kind(kind: EventKind, repositories: Arc<Repositories>, auxiliary_chain_id: u64) -> Self {
        if let Some(request_type) = kind.request_type() {
            return Self::Request(RequestHandler::new(repositories, kind, request_type));
        }
        if let Some(event) = kind.message_event() {
            return Self::MessageStatus(MessageStatusHandler::new(repositories, kind, event));
        }
        match kind {
            EventKind::StateRootAvailable => {
                Self::Anchor(AnchorHandler::new(repositories, auxiliary_chain_id))
            }
            _ => Self::GatewayProven(GatewayProvenHandler::new(repositories)),
        }
    }

    pub async fn persist(&self, events: &[RawEvent]) -> Persisted {
        match self {
            Self::Request(h) => Persisted::Requests(h.persist(events).await),
            Self::MessageStatus(h) => Persisted::Messages(h.persist(events).await),
            Self::Anchor(h) => Persisted::AuxiliaryChains(h.persist(events).await),
            Self::GatewayProven(h) => Persisted::Gateways(h.persist(events).await),
        }
    }
}

/// Event kind to handler table, fixed at startup.
pub struct HandlerRegistry {
    handlers: BTreeMap<EventKind, Handler>,
}

impl HandlerRegistry {
    pub fn new(kinds: &[EventKind], repositories: Arc<Repositories>, auxiliary_chain_id: u64) -> Self {
        let handlers = kinds
            .iter()
            .map(|&kind| {
                (
                    kind,
                    Handler::for_kind(kind, repositories.clone(), auxiliary_chain_id),
                )
            })
            .collect();
        Self { handlers }
    }

    pub fn get(&self, kind: EventKind) -> FacilitatorResult<&Handler> {
        self.handlers
            .get(&kind)
            .ok_or_else(|| FacilitatorError::UnknownEventKind(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AUXILIARY_CHAIN_ID, seeded_repositories};

    #[tokio::test]
    async fn test_every_kind_maps_to_its_handler() {
        let (_, repositories) = seeded_repositories().await;
        let registry = HandlerRegistry::new(&EventKind::ALL, repositories, AUXILIARY_CHAIN_ID);

        assert_eq!(registry.kinds().len(), 18);
        assert!(matches!(
            registry.get(EventKind::RedeemRequested).unwrap(),
            Handler::Request(_)
        ));
        assert!(matches!(
            registry.get(EventKind::RevertRedeemComplete).unwrap(),
            Handler::MessageStatus(_)
        ));
        assert!(matches!(
            registry.get(EventKind::StateRootAvailable).unwrap(),
            Handler::Anchor(_)
        ));
        assert!(matches!(
            registry.get(EventKind::GatewayProven).unwrap(),
            Handler::GatewayProven(_)
        ));
    }

    #[tokio::test]
    async fn test_unsubscribed_kind_is_not_dispatched() {
        let (_, repositories) = seeded_repositories().await;
        let registry =
            HandlerRegistry::new(&[EventKind::StakeRequested], repositories, AUXILIARY_CHAIN_ID);

        assert!(registry.get(EventKind::GatewayProven).is_err());
    }
}
