use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use tracing::{debug, info};

use crate::{
    handlers::{
        event::{BLOCK_NUMBER, EventFields, EventKind, MessageEvent, RawEvent, Transition},
        handler::{PersistReport, latest_by_key, parse_events, persist_each},
    },
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{Message, MessageSide, MessageStatus, MessageType},
    },
    repositories::repositories::Repositories,
};

/// One gateway event naming a message.
#[derive(Debug, Clone)]
struct StatusEvent {
    message_hash: H256,
    emitter: Address,
    sender: Option<Address>,
    nonce: Option<U256>,
    hash_lock: Option<H256>,
    secret: Option<H256>,
    block_number: Option<u64>,
}

/// Applies declare, progress and revocation events to one side of a message.
pub struct MessageStatusHandler {
    repositories: Arc<Repositories>,
    kind: EventKind,
    event: MessageEvent,
}

impl Transition {
    /// States a side may be in for this transition to apply.
    fn applies_from(&self, current: MessageStatus) -> bool {
        use MessageStatus::*;

        match self {
            Self::Declare => current == Undeclared,
            Self::Progress | Self::DeclareRevocation => matches!(current, Undeclared | Declared),
            Self::Revoke => matches!(current, Undeclared | Declared | RevocationDeclared),
        }
    }

    fn target(&self) -> MessageStatus {
        match self {
            Self::Declare => MessageStatus::Declared,
            Self::Progress => MessageStatus::Progressed,
            Self::DeclareRevocation => MessageStatus::RevocationDeclared,
            Self::Revoke => MessageStatus::Revoked,
        }
    }
}

impl MessageStatusHandler {
    pub fn new(repositories: Arc<Repositories>, kind: EventKind, event: MessageEvent) -> Self {
        Self {
            repositories,
            kind,
            event,
        }
    }

    fn parse(&self, event: &EventFields) -> FacilitatorResult<StatusEvent> {
        let (sender, nonce) = match self.event.message_type {
            MessageType::Stake => ("_staker", "_stakerNonce"),
            MessageType::Redeem => ("_redeemer", "_redeemerNonce"),
        };

        Ok(StatusEvent {
            message_hash: event.h256("_messageHash")?,
            emitter: event.contract_address()?,
            sender: event.optional_address(sender)?,
            nonce: event.optional_u256(nonce)?,
            hash_lock: event.optional_h256("_hashLock")?,
            secret: event.optional_h256("_unlockSecret")?,
            block_number: event.optional_u64(BLOCK_NUMBER)?,
        })
    }

    pub async fn persist(&self, events: &[RawEvent]) -> PersistReport<Message> {
        let (parsed, failures) = parse_events(self.kind, events, |e| self.parse(e));
        let parsed = latest_by_key(parsed, |e| e.message_hash);

        let items = parsed
            .into_iter()
            .map(|event| (event.message_hash, self.persist_one(event)))
            .collect();

        let report = persist_each(self.kind, items, failures).await;
        info!(
            "📥 {}: {} message(s) persisted, {} failed",
            self.kind,
            report.persisted.len(),
            report.failures.len()
        );
        report
    }

    /// Source-side gateway of the message; target-side events are emitted by its remote.
    async fn source_gateway(&self, emitter: Address) -> FacilitatorResult<Address> {
        let gateway = self
            .repositories
            .gateway
            .get(&emitter)
            .await?
            .ok_or_else(|| FacilitatorError::not_found("gateway", emitter))?;

        Ok(match self.event.side {
            MessageSide::Source => gateway.gateway_address,
            MessageSide::Target => gateway.remote_gateway_address,
        })
    }

    async fn persist_one(&self, event: StatusEvent) -> FacilitatorResult<Option<Message>> {
        let gateway = self.source_gateway(event.emitter).await?;
        let MessageEvent {
            message_type,
            side,
            transition,
        } = self.event;
        let kind = self.kind;

        let outcome = self
            .repositories
            .message
            .update(&event.message_hash, move |stored| {
                let mut message = stored.unwrap_or_else(|| {
                    Message::synthesized(event.message_hash, message_type, gateway)
                });

                let current = message.status(side);
                if transition.applies_from(current) {
                    message.set_status(side, transition.target());
                    if side == MessageSide::Source && transition == Transition::Declare {
                        message.source_declaration_block_height = message
                            .source_declaration_block_height
                            .or(event.block_number);
                    }
                } else {
                    debug!(
                        "⏭️  {} ignored for {:?}: {:?} side already {}",
                        kind, event.message_hash, side, current
                    );
                }

                message.sender = message.sender.or(event.sender);
                message.nonce = message.nonce.or(event.nonce);
                message.hash_lock = message.hash_lock.or(event.hash_lock);

                if transition == Transition::Progress && event.secret.is_some() {
                    message.secret = event.secret;
                }

                Some(message)
            })
            .await?;

        Ok(outcome.into_entity())
    }
}
