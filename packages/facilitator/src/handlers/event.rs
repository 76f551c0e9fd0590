use std::{fmt, str::FromStr};

use ethers::types::{Address, H256, U256};
use serde_json::{Map, Value};

use crate::models::{
    error::{FacilitatorError, FacilitatorResult},
    model::{MessageSide, MessageType},
};

/// Untyped key/value record of one chain event.
pub type RawEvent = Map<String, Value>;

pub const CONTRACT_ADDRESS: &str = "contractAddress";
pub const BLOCK_NUMBER: &str = "blockNumber";
pub const TRANSACTION_HASH: &str = "transactionHash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    StakeRequested,
    RedeemRequested,
    StakeIntentDeclared,
    StakeProgressed,
    RedeemIntentConfirmed,
    UnstakeProgressed,
    RevertStakeIntentDeclared,
    RevertStakeProgressed,
    RevertRedeemIntentConfirmed,
    StakeIntentConfirmed,
    MintProgressed,
    RedeemIntentDeclared,
    RedeemProgressed,
    RevertStakeIntentConfirmed,
    RevertRedeemDeclared,
    RevertRedeemComplete,
    StateRootAvailable,
    GatewayProven,
}

/// Status change a message event applies to one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Declare,
    Progress,
    DeclareRevocation,
    Revoke,
}

/// What a message-status event means for the message it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageEvent {
    pub message_type: MessageType,
    pub side: MessageSide,
    pub transition: Transition,
}

impl EventKind {
    pub const ALL: [EventKind; 18] = [
        Self::StakeRequested,
        Self::RedeemRequested,
        Self::StakeIntentDeclared,
        Self::StakeProgressed,
        Self::RedeemIntentConfirmed,
        Self::UnstakeProgressed,
        Self::RevertStakeIntentDeclared,
        Self::RevertStakeProgressed,
        Self::RevertRedeemIntentConfirmed,
        Self::StakeIntentConfirmed,
        Self::MintProgressed,
        Self::RedeemIntentDeclared,
        Self::RedeemProgressed,
        Self::RevertStakeIntentConfirmed,
        Self::RevertRedeemDeclared,
        Self::RevertRedeemComplete,
        Self::StateRootAvailable,
        Self::GatewayProven,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StakeRequested => "StakeRequested",
            Self::RedeemRequested => "RedeemRequested",
            Self::StakeIntentDeclared => "StakeIntentDeclared",
            Self::StakeProgressed => "StakeProgressed",
            Self::RedeemIntentConfirmed => "RedeemIntentConfirmed",
            Self::UnstakeProgressed => "UnstakeProgressed",
            Self::RevertStakeIntentDeclared => "RevertStakeIntentDeclared",
            Self::RevertStakeProgressed => "RevertStakeProgressed",
            Self::RevertRedeemIntentConfirmed => "RevertRedeemIntentConfirmed",
            Self::StakeIntentConfirmed => "StakeIntentConfirmed",
            Self::MintProgressed => "MintProgressed",
            Self::RedeemIntentDeclared => "RedeemIntentDeclared",
            Self::RedeemProgressed => "RedeemProgressed",
            Self::RevertStakeIntentConfirmed => "RevertStakeIntentConfirmed",
            Self::RevertRedeemDeclared => "RevertRedeemDeclared",
            Self::RevertRedeemComplete => "RevertRedeemComplete",
            Self::StateRootAvailable => "StateRootAvailable",
            Self::GatewayProven => "GatewayProven",
        }
    }

    /// Request type of a pool event.
    pub fn request_type(&self) -> Option<MessageType> {
        match self {
            Self::StakeRequested => Some(MessageType::Stake),
            Self::RedeemRequested => Some(MessageType::Redeem),
            _ => None,
        }
    }

    /// Side and transition of a gateway message event.
    pub fn message_event(&self) -> Option<MessageEvent> {
        use MessageSide::{Source, Target};
        use MessageType::{Redeem, Stake};
        use Transition::*;

        let (message_type, side, transition) = match self {
            Self::StakeIntentDeclared => (Stake, Source, Declare),
            Self::StakeProgressed => (Stake, Source, Progress),
            Self::RevertStakeIntentDeclared => (Stake, Source, DeclareRevocation),
            Self::RevertStakeProgressed => (Stake, Source, Revoke),
            Self::StakeIntentConfirmed => (Stake, Target, Declare),
            Self::MintProgressed => (Stake, Target, Progress),
            Self::RevertStakeIntentConfirmed => (Stake, Target, Revoke),
            Self::RedeemIntentDeclared => (Redeem, Source, Declare),
            Self::RedeemProgressed => (Redeem, Source, Progress),
            Self::RevertRedeemDeclared => (Redeem, Source, DeclareRevocation),
            Self::RevertRedeemComplete => (Redeem, Source, Revoke),
            Self::RedeemIntentConfirmed => (Redeem, Target, Declare),
            Self::UnstakeProgressed => (Redeem, Target, Progress),
            Self::RevertRedeemIntentConfirmed => (Redeem, Target, Revoke),
            _ => return None,
        };

        Some(MessageEvent {
            message_type,
            side,
            transition,
        })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FacilitatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FacilitatorError::UnknownEventKind(s.to_string()))
    }
}

// ==================== Field access ====================

/// Typed view over a raw event; every accessor reports the field it failed on.
pub struct EventFields<'a> {
    kind: EventKind,
    raw: &'a RawEvent,
}

impl<'a> EventFields<'a> {
    pub fn new(kind: EventKind, raw: &'a RawEvent) -> Self {
        Self { kind, raw }
    }

    fn malformed(&self, field: &str, reason: impl Into<String>) -> FacilitatorError {
        FacilitatorError::MalformedEvent {
            kind: self.kind.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn text(&self, field: &str) -> FacilitatorResult<Option<String>> {
        match self.raw.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.malformed(field, format!("has unexpected value {}", other))),
        }
    }

    fn required(&self, field: &str) -> FacilitatorResult<String> {
        self.text(field)?
            .ok_or_else(|| self.malformed(field, "is missing"))
    }

    pub fn address(&self, field: &str) -> FacilitatorResult<Address> {
        let value = self.required(field)?;
        parse_address(&value).map_err(|reason| self.malformed(field, reason))
    }

    pub fn optional_address(&self, field: &str) -> FacilitatorResult<Option<Address>> {
        self.text(field)?
            .map(|value| parse_address(&value).map_err(|reason| self.malformed(field, reason)))
            .transpose()
    }

    pub fn h256(&self, field: &str) -> FacilitatorResult<H256> {
        let value = self.required(field)?;
        parse_h256(&value).map_err(|reason| self.malformed(field, reason))
    }

    pub fn optional_h256(&self, field: &str) -> FacilitatorResult<Option<H256>> {
        self.text(field)?
            .map(|value| parse_h256(&value).map_err(|reason| self.malformed(field, reason)))
            .transpose()
    }

    pub fn u256(&self, field: &str) -> FacilitatorResult<U256> {
        let value = self.required(field)?;
        parse_u256(&value).map_err(|reason| self.malformed(field, reason))
    }

    pub fn optional_u256(&self, field: &str) -> FacilitatorResult<Option<U256>> {
        self.text(field)?
            .map(|value| parse_u256(&value).map_err(|reason| self.malformed(field, reason)))
            .transpose()
    }

    pub fn u64(&self, field: &str) -> FacilitatorResult<u64> {
        let value = self.u256(field)?;
        if value > U256::from(u64::MAX) {
            return Err(self.malformed(field, "does not fit in 64 bits"));
        }
        Ok(value.as_u64())
    }

    pub fn optional_u64(&self, field: &str) -> FacilitatorResult<Option<u64>> {
        if self.text(field)?.is_none() {
            return Ok(None);
        }
        self.u64(field).map(Some)
    }

    pub fn contract_address(&self) -> FacilitatorResult<Address> {
        self.address(CONTRACT_ADDRESS)
    }

    pub fn block_number(&self) -> FacilitatorResult<u64> {
        self.u64(BLOCK_NUMBER)
    }
}

fn parse_address(value: &str) -> Result<Address, String> {
    value
        .parse::<Address>()
        .map_err(|e| format!("is not an address ({})", e))
}

fn parse_h256(value: &str) -> Result<H256, String> {
    value
        .parse::<H256>()
        .map_err(|e| format!("is not a 32-byte hash ({})", e))
}

/// Decimal, or hex with a `0x` prefix.
fn parse_u256(value: &str) -> Result<U256, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(value).ok(),
    };
    parsed.ok_or_else(|| format!("is not an unsigned integer: {}", value))
}
