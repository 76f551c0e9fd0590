use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    database::store::Store,
    models::model::{AuxiliaryChain, Gateway, Message, MessageTransferRequest},
    repositories::{
        observers::{AuxiliaryChainObserver, GatewayObserver, MessageObserver, RequestObserver},
        repository::Repository,
    },
};

pub type MessageRepository = Repository<Message, MessageObserver>;
pub type RequestRepository = Repository<MessageTransferRequest, RequestObserver>;
pub type GatewayRepository = Repository<Gateway, GatewayObserver>;
pub type AuxiliaryChainRepository = Repository<AuxiliaryChain, AuxiliaryChainObserver>;

/// All entity repositories over one store.
pub struct Repositories {
    pub message: MessageRepository,
    pub request: RequestRepository,
    pub gateway: GatewayRepository,
    pub auxiliary_chain: AuxiliaryChainRepository,
}

impl Repositories {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            message: Repository::new(store.clone()),
            request: Repository::new(store.clone()),
            gateway: Repository::new(store.clone()),
            auxiliary_chain: Repository::new(store),
        }
    }

    /// Flushes every repository's changes to its observers. The returned tasks are already running.
    pub async fn notify(&self) -> Vec<JoinHandle<()>> {
        let mut handles = self.request.notify().await;
        handles.extend(self.gateway.notify().await);
        handles.extend(self.auxiliary_chain.notify().await);
        handles.extend(self.message.notify().await);
        handles
    }
}
