use std::sync::Arc;

use ethers::{
    abi::AbiEncode,
    types::{Address, H256, TxHash},
};
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::{
    chain::contracts::{
        co_gateway::{ProgressMintCall, ProgressRedeemCall},
        gateway::{ProgressStakeCall, ProgressUnstakeCall},
    },
    models::{
        error::{FacilitatorError, FacilitatorResult},
        model::{Gateway, Message, MessageSide, MessageStatus, MessageType},
        traits::ContractCall,
    },
    repositories::repositories::Repositories,
    services::context::Chains,
};

/// Reveals the secret of declared messages to unlock each declared side.
pub struct ProgressService {
    repositories: Arc<Repositories>,
    chains: Arc<Chains>,
}

fn progress_call(
    message_type: MessageType,
    side: MessageSide,
    gateway: Address,
    message_hash: H256,
    secret: H256,
) -> ContractCall {
    let (message_hash, unlock_secret) = (message_hash.0, secret.0);
    let (label, data): (&'static str, Vec<u8>) = match (message_type, side) {
        (MessageType::Stake, MessageSide::Source) => (
            "progressStake",
            ProgressStakeCall {
                message_hash,
                unlock_secret,
            }
            .encode(),
        ),
        (MessageType::Stake, MessageSide::Target) => (
            "progressMint",
            ProgressMintCall {
                message_hash,
                unlock_secret,
            }
            .encode(),
        ),
        (MessageType::Redeem, MessageSide::Source) => (
            "progressRedeem",
            ProgressRedeemCall {
                message_hash,
                unlock_secret,
            }
            .encode(),
        ),
        (MessageType::Redeem, MessageSide::Target) => (
            "progressUnstake",
            ProgressUnstakeCall {
                message_hash,
                unlock_secret,
            }
            .encode(),
        ),
    };

    ContractCall {
        label,
        to: gateway,
        data: data.into(),
    }
}

impl ProgressService {
    pub fn new(repositories: Arc<Repositories>, chains: Arc<Chains>) -> Self {
        Self {
            repositories,
            chains,
        }
    }

    pub async fn on_change(&self, messages: Vec<Message>) -> Vec<FacilitatorResult<Vec<TxHash>>> {
        let ready: Vec<_> = messages
            .into_iter()
            .filter(|m| {
                m.source_status == Some(MessageStatus::Declared)
                    || m.target_status == Some(MessageStatus::Declared)
            })
            .collect();
        if ready.is_empty() {
            return Vec::new();
        }

        let results = join_all(ready.iter().map(|m| self.progress(m))).await;
        for (message, result) in ready.iter().zip(&results) {
            match result {
                Ok(hashes) if hashes.is_empty() => {}
                Ok(hashes) => info!(
                    "✅ Progressed message {:?} ({} transaction(s))",
                    message.message_hash,
                    hashes.len()
                ),
                Err(e) => error!(
                    "❌ Failed to progress message {:?}: {}",
                    message.message_hash, e
                ),
            }
        }
        results
    }

    /// Submits progress for every side still `Declared`; both sides go out together.
    async fn progress(&self, message: &Message) -> FacilitatorResult<Vec<TxHash>> {
        let Some(secret) = self.repositories.message.known_secret(message).await? else {
            debug!("⏭️  No secret known for {:?}", message.message_hash);
            return Ok(Vec::new());
        };

        let message_type = message
            .message_type
            .ok_or_else(|| FacilitatorError::not_found("message_type", message.message_hash))?;
        let gateway_address = message
            .gateway_address
            .ok_or_else(|| FacilitatorError::not_found("gateway", message.message_hash))?;
        let source_gateway = self
            .repositories
            .gateway
            .get(&gateway_address)
            .await?
            .ok_or_else(|| FacilitatorError::not_found("gateway", gateway_address))?;

        let sides: Vec<MessageSide> = [MessageSide::Source, MessageSide::Target]
            .into_iter()
            .filter(|&side| message.status(side) == MessageStatus::Declared)
            .collect();

        let submissions = sides.iter().map(|&side| {
            self.submit_side(message, message_type, side, &source_gateway, secret)
        });
        join_all(submissions).await.into_iter().collect()
    }

    async fn submit_side(
        &self,
        message: &Message,
        message_type: MessageType,
        side: MessageSide,
        source_gateway: &Gateway,
        secret: H256,
    ) -> FacilitatorResult<TxHash> {
        let (gateway, gateway_type) = match side {
            MessageSide::Source => (source_gateway.gateway_address, source_gateway.gateway_type),
            MessageSide::Target => (
                source_gateway.remote_gateway_address,
                source_gateway.gateway_type.opposite(),
            ),
        };

        let call = progress_call(message_type, side, gateway, message.message_hash, secret);
        self.chains
            .for_gateway_type(gateway_type)
            .submit(call, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::secret::create_secret_hash_lock,
        testing::{
            MockProofGenerator, MockSubmitter, chains_with, co_gateway_address,
            origin_gateway_address, seeded_repositories,
        },
    };
    use ethers::abi::AbiDecode;

    struct Fixture {
        repositories: Arc<Repositories>,
        origin: Arc<MockSubmitter>,
        auxiliary: Arc<MockSubmitter>,
    }

    impl Fixture {
        async fn new(origin: MockSubmitter) -> Self {
            let (_, repositories) = seeded_repositories().await;
            Self {
                repositories,
                origin: Arc::new(origin),
                auxiliary: Arc::new(MockSubmitter::default()),
            }
        }

        fn service(&self) -> ProgressService {
            let chains = chains_with(
                self.origin.clone(),
                self.auxiliary.clone(),
                Arc::new(MockProofGenerator::default()),
            );
            ProgressService::new(self.repositories.clone(), Arc::new(chains))
        }

        async fn message(
            &self,
            message_type: MessageType,
            source: MessageStatus,
            target: MessageStatus,
        ) -> (Message, H256) {
            let (secret, lock) = create_secret_hash_lock();
            let gateway = match message_type {
                MessageType::Stake => origin_gateway_address(),
                MessageType::Redeem => co_gateway_address(),
            };
            let message = Message {
                source_status: Some(source),
                target_status: Some(target),
                hash_lock: Some(lock),
                ..Message::synthesized(H256::repeat_byte(0x77), message_type, gateway)
            };
            self.repositories
                .message
                .store_secret(message.message_hash, secret)
                .await
                .unwrap();
            (message, secret)
        }
    }

    #[tokio::test]
    async fn test_both_declared_sides_progress_together() {
        let fixture = Fixture::new(MockSubmitter::default()).await;
        let (message, secret) = fixture
            .message(MessageType::Stake, MessageStatus::Declared, MessageStatus::Declared)
            .await;

        let results = fixture.service().on_change(vec![message.clone()]).await;
        assert_eq!(results[0].as_ref().unwrap().len(), 2);

        let origin_calls = fixture.origin.calls().await;
        let (call, _) = &origin_calls[0];
        assert_eq!(call.to, origin_gateway_address());
        let decoded = ProgressStakeCall::decode(&call.data).unwrap();
        assert_eq!(decoded.message_hash, message.message_hash.0);
        assert_eq!(decoded.unlock_secret, secret.0);

        let auxiliary_calls = fixture.auxiliary.calls().await;
        let (call, _) = &auxiliary_calls[0];
        assert_eq!(call.to, co_gateway_address());
        assert!(ProgressMintCall::decode(&call.data).is_ok());
    }

    #[tokio::test]
    async fn test_only_declared_side_is_progressed() {
        let fixture = Fixture::new(MockSubmitter::default()).await;
        let (message, _) = fixture
            .message(MessageType::Redeem, MessageStatus::Progressed, MessageStatus::Declared)
            .await;

        let results = fixture.service().on_change(vec![message]).await;
        assert_eq!(results[0].as_ref().unwrap().len(), 1);

        assert!(fixture.auxiliary.calls().await.is_empty());
        let calls = fixture.origin.calls().await;
        assert_eq!(calls[0].0.label, "progressUnstake");
        assert_eq!(calls[0].0.to, origin_gateway_address());
    }

    #[tokio::test]
    async fn test_revocation_states_are_left_alone() {
        let fixture = Fixture::new(MockSubmitter::default()).await;
        let (message, _) = fixture
            .message(
                MessageType::Stake,
                MessageStatus::RevocationDeclared,
                MessageStatus::Revoked,
            )
            .await;

        let results = fixture.service().on_change(vec![message]).await;
        assert!(results.is_empty());
        assert!(fixture.origin.calls().await.is_empty());
        assert!(fixture.auxiliary.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_secret_submits_nothing() {
        let fixture = Fixture::new(MockSubmitter::default()).await;
        let message = Message {
            source_status: Some(MessageStatus::Declared),
            hash_lock: Some(H256::repeat_byte(0x01)),
            ..Message::synthesized(
                H256::repeat_byte(0x78),
                MessageType::Stake,
                origin_gateway_address(),
            )
        };

        let results = fixture.service().on_change(vec![message]).await;
        assert!(results[0].as_ref().unwrap().is_empty());
        assert!(fixture.origin.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_side_reports_error_but_other_side_is_sent() {
        let fixture = Fixture::new(MockSubmitter::failing_when(|_| true)).await;
        let (message, _) = fixture
            .message(MessageType::Stake, MessageStatus::Declared, MessageStatus::Declared)
            .await;

        let results = fixture.service().on_change(vec![message]).await;
        assert!(matches!(results[0], Err(FacilitatorError::Submission { .. })));
        assert_eq!(fixture.auxiliary.calls().await.len(), 1);
    }
}
