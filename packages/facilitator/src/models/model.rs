use std::fmt;

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Stake,
    Redeem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageDirection {
    OriginToAuxiliary,
    AuxiliaryToOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    Undeclared,
    Declared,
    Progressed,
    RevocationDeclared,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayType {
    Origin,
    Auxiliary,
}

/// Side of a message a chain event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageSide {
    Source,
    Target,
}

/// Commitment state of a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MessageCommitment {
    #[default]
    Uncommitted,
    Committed(H256),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_hash: H256,
    pub message_type: Option<MessageType>,
    pub direction: Option<MessageDirection>,
    pub gateway_address: Option<Address>,
    pub source_status: Option<MessageStatus>,
    pub target_status: Option<MessageStatus>,
    pub sender: Option<Address>,
    pub nonce: Option<U256>,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<U256>,
    pub source_declaration_block_height: Option<u64>,
    pub secret: Option<H256>,
    pub hash_lock: Option<H256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTransferRequest {
    pub request_hash: H256,
    pub request_type: MessageType,
    pub block_number: u64,
    pub amount: U256,
    pub beneficiary: Address,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub nonce: U256,
    pub gateway: Address,
    pub sender: Address,
    pub sender_proxy: Address,
    pub message_hash: MessageCommitment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub gateway_address: Address,
    pub chain_id: u64,
    pub gateway_type: GatewayType,
    pub remote_gateway_address: Address,
    pub token_address: Address,
    pub anchor_address: Address,
    pub bounty: U256,
    pub activation: bool,
    pub last_remote_gateway_proven_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryChain {
    pub chain_id: u64,
    pub anchor_address: Address,
    pub co_anchor_address: Address,
    pub last_origin_block_height: u64,
    pub last_auxiliary_block_height: u64,
}

// ==================== Enum helpers ====================

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stake => "stake",
            Self::Redeem => "redeem",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stake" => Some(Self::Stake),
            "redeem" => Some(Self::Redeem),
            _ => None,
        }
    }

    pub fn direction(&self) -> MessageDirection {
        match self {
            Self::Stake => MessageDirection::OriginToAuxiliary,
            Self::Redeem => MessageDirection::AuxiliaryToOrigin,
        }
    }
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OriginToAuxiliary => "origin_to_auxiliary",
            Self::AuxiliaryToOrigin => "auxiliary_to_origin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "origin_to_auxiliary" => Some(Self::OriginToAuxiliary),
            "auxiliary_to_origin" => Some(Self::AuxiliaryToOrigin),
            _ => None,
        }
    }
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undeclared => "undeclared",
            Self::Declared => "declared",
            Self::Progressed => "progressed",
            Self::RevocationDeclared => "revocation_declared",
            Self::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "undeclared" => Some(Self::Undeclared),
            "declared" => Some(Self::Declared),
            "progressed" => Some(Self::Progressed),
            "revocation_declared" => Some(Self::RevocationDeclared),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    /// Whether a side may move from `self` to `next`. Staying put is always allowed.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;

        if *self == next {
            return true;
        }

        match self {
            Undeclared => true,
            Declared => matches!(next, Progressed | RevocationDeclared | Revoked),
            RevocationDeclared => next == Revoked,
            Progressed | Revoked => false,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Auxiliary => "auxiliary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "origin" => Some(Self::Origin),
            "auxiliary" => Some(Self::Auxiliary),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Origin => Self::Auxiliary,
            Self::Auxiliary => Self::Origin,
        }
    }
}

impl MessageCommitment {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn message_hash(&self) -> Option<H256> {
        match self {
            Self::Committed(hash) => Some(*hash),
            Self::Uncommitted => None,
        }
    }
}

impl From<Option<H256>> for MessageCommitment {
    fn from(hash: Option<H256>) -> Self {
        match hash {
            Some(hash) => Self::Committed(hash),
            None => Self::Uncommitted,
        }
    }
}

// ==================== Message ====================

impl Message {
    /// A record carrying only its key; every other field is left for `save` to keep.
    pub fn new(message_hash: H256) -> Self {
        Self {
            message_hash,
            message_type: None,
            direction: None,
            gateway_address: None,
            source_status: None,
            target_status: None,
            sender: None,
            nonce: None,
            gas_price: None,
            gas_limit: None,
            source_declaration_block_height: None,
            secret: None,
            hash_lock: None,
        }
    }

    /// Placeholder for a message first seen through a chain event.
    pub fn synthesized(message_hash: H256, message_type: MessageType, gateway: Address) -> Self {
        Self {
            message_type: Some(message_type),
            direction: Some(message_type.direction()),
            gateway_address: Some(gateway),
            source_status: Some(MessageStatus::Undeclared),
            target_status: Some(MessageStatus::Undeclared),
            ..Self::new(message_hash)
        }
    }

    pub fn status(&self, side: MessageSide) -> MessageStatus {
        let status = match side {
            MessageSide::Source => self.source_status,
            MessageSide::Target => self.target_status,
        };
        status.unwrap_or(MessageStatus::Undeclared)
    }

    pub fn set_status(&mut self, side: MessageSide, status: MessageStatus) {
        match side {
            MessageSide::Source => self.source_status = Some(status),
            MessageSide::Target => self.target_status = Some(status),
        }
    }
}
