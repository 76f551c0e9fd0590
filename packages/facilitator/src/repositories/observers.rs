use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    models::model::{AuxiliaryChain, Gateway, Message, MessageTransferRequest},
    repositories::subject::Observer,
    services::{
        accept_service::AcceptService, confirm_service::ConfirmService,
        progress_service::ProgressService, prove_service::ProveService,
    },
};

// Services log their own per-item failures, so observers always report success.

pub enum RequestObserver {
    Accept(Arc<AcceptService>),
}

pub enum GatewayObserver {
    Confirm(Arc<ConfirmService>),
}

pub enum MessageObserver {
    Progress(Arc<ProgressService>),
}

pub enum AuxiliaryChainObserver {
    Prove(Arc<ProveService>),
}

#[async_trait]
impl Observer<MessageTransferRequest> for RequestObserver {
    async fn on_change(&self, updates: Vec<MessageTransferRequest>) -> Result<()> {
        match self {
            Self::Accept(service) => {
                service.on_change(updates).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Observer<Gateway> for GatewayObserver {
    async fn on_change(&self, updates: Vec<Gateway>) -> Result<()> {
        match self {
            Self::Confirm(service) => {
                service.on_change(updates).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Observer<Message> for MessageObserver {
    async fn on_change(&self, updates: Vec<Message>) -> Result<()> {
        match self {
            Self::Progress(service) => {
                service.on_change(updates).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Observer<AuxiliaryChain> for AuxiliaryChainObserver {
    async fn on_change(&self, updates: Vec<AuxiliaryChain>) -> Result<()> {
        match self {
            Self::Prove(service) => {
                service.on_change(updates).await;
            }
        }
        Ok(())
    }
}
