use std::fmt::Debug;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use ethers::types::{Address, H256, U256};

use crate::models::{
    model::{
        AuxiliaryChain, Gateway, GatewayType, Message, MessageCommitment, MessageDirection,
        MessageStatus, MessageTransferRequest, MessageType,
    },
    schema::{
        auxiliary_chains, chain_transactions, gateways, message_transfer_requests, messages,
    },
};

// ==================== Column codecs ====================

pub fn to_hex<T: Debug>(value: &T) -> String {
    format!("{:?}", value)
}

pub fn parse_address(value: &str) -> Result<Address> {
    value
        .parse()
        .with_context(|| format!("Invalid address column: {}", value))
}

pub fn parse_h256(value: &str) -> Result<H256> {
    value
        .parse()
        .with_context(|| format!("Invalid hash column: {}", value))
}

pub fn parse_u256(value: &str) -> Result<U256> {
    U256::from_dec_str(value).with_context(|| format!("Invalid integer column: {}", value))
}

fn parse_height(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("Negative block height: {}", value))
}

pub fn height_column(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("Block height out of range: {}", value))
}

fn parse_enum<T>(column: &str, value: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| anyhow!("Invalid {} column: {}", column, value))
}

fn optional<T>(value: Option<&str>, parse: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
    value.map(parse).transpose()
}

// ==================== Messages ====================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = messages)]
#[diesel(primary_key(message_hash))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbMessage {
    pub message_hash: String,
    pub message_type: Option<String>,
    pub direction: Option<String>,
    pub gateway_address: Option<String>,
    pub source_status: Option<String>,
    pub target_status: Option<String>,
    pub sender: Option<String>,
    pub nonce: Option<String>,
    pub gas_price: Option<String>,
    pub gas_limit: Option<String>,
    pub source_declaration_block_height: Option<i64>,
    pub secret: Option<String>,
    pub hash_lock: Option<String>,
}

impl DbMessage {
    pub fn from_entity(message: &Message) -> Result<Self> {
        Ok(Self {
            message_hash: to_hex(&message.message_hash),
            message_type: message.message_type.map(|t| t.as_str().to_string()),
            direction: message.direction.map(|d| d.as_str().to_string()),
            gateway_address: message.gateway_address.as_ref().map(to_hex),
            source_status: message.source_status.map(|s| s.as_str().to_string()),
            target_status: message.target_status.map(|s| s.as_str().to_string()),
            sender: message.sender.as_ref().map(to_hex),
            nonce: message.nonce.map(|n| n.to_string()),
            gas_price: message.gas_price.map(|n| n.to_string()),
            gas_limit: message.gas_limit.map(|n| n.to_string()),
            source_declaration_block_height: message
                .source_declaration_block_height
                .map(height_column)
                .transpose()?,
            secret: message.secret.as_ref().map(to_hex),
            hash_lock: message.hash_lock.as_ref().map(to_hex),
        })
    }

    pub fn into_entity(self) -> Result<Message> {
        let status = |value: &str| parse_enum("status", value, MessageStatus::from_str);

        Ok(Message {
            message_hash: parse_h256(&self.message_hash)?,
            message_type: optional(self.message_type.as_deref(), |v| {
                parse_enum("message_type", v, MessageType::from_str)
            })?,
            direction: optional(self.direction.as_deref(), |v| {
                parse_enum("direction", v, MessageDirection::from_str)
            })?,
            gateway_address: optional(self.gateway_address.as_deref(), parse_address)?,
            source_status: optional(self.source_status.as_deref(), status)?,
            target_status: optional(self.target_status.as_deref(), status)?,
            sender: optional(self.sender.as_deref(), parse_address)?,
            nonce: optional(self.nonce.as_deref(), parse_u256)?,
            gas_price: optional(self.gas_price.as_deref(), parse_u256)?,
            gas_limit: optional(self.gas_limit.as_deref(), parse_u256)?,
            source_declaration_block_height: self
                .source_declaration_block_height
                .map(parse_height)
                .transpose()?,
            secret: optional(self.secret.as_deref(), parse_h256)?,
            hash_lock: optional(self.hash_lock.as_deref(), parse_h256)?,
        })
    }
}

// ==================== Transfer Requests ====================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = message_transfer_requests)]
#[diesel(primary_key(request_hash))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbMessageTransferRequest {
    pub request_hash: String,
    pub request_type: String,
    pub block_number: i64,
    pub amount: String,
    pub beneficiary: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub nonce: String,
    pub gateway: String,
    pub sender: String,
    pub sender_proxy: String,
    pub message_hash: Option<String>,
}

impl DbMessageTransferRequest {
    pub fn from_entity(request: &MessageTransferRequest) -> Result<Self> {
        Ok(Self {
            request_hash: to_hex(&request.request_hash),
            request_type: request.request_type.as_str().to_string(),
            block_number: height_column(request.block_number)?,
            amount: request.amount.to_string(),
            beneficiary: to_hex(&request.beneficiary),
            gas_price: request.gas_price.to_string(),
            gas_limit: request.gas_limit.to_string(),
            nonce: request.nonce.to_string(),
            gateway: to_hex(&request.gateway),
            sender: to_hex(&request.sender),
            sender_proxy: to_hex(&request.sender_proxy),
            message_hash: request.message_hash.message_hash().as_ref().map(to_hex),
        })
    }

    pub fn into_entity(self) -> Result<MessageTransferRequest> {
        Ok(MessageTransferRequest {
            request_hash: parse_h256(&self.request_hash)?,
            request_type: parse_enum("request_type", &self.request_type, MessageType::from_str)?,
            block_number: parse_height(self.block_number)?,
            amount: parse_u256(&self.amount)?,
            beneficiary: parse_address(&self.beneficiary)?,
            gas_price: parse_u256(&self.gas_price)?,
            gas_limit: parse_u256(&self.gas_limit)?,
            nonce: parse_u256(&self.nonce)?,
            gateway: parse_address(&self.gateway)?,
            sender: parse_address(&self.sender)?,
            sender_proxy: parse_address(&self.sender_proxy)?,
            message_hash: MessageCommitment::from(optional(
                self.message_hash.as_deref(),
                parse_h256,
            )?),
        })
    }
}

// ==================== Gateways ====================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = gateways)]
#[diesel(primary_key(gateway_address))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbGateway {
    pub gateway_address: String,
    pub chain_id: i64,
    pub gateway_type: String,
    pub remote_gateway_address: String,
    pub token_address: String,
    pub anchor_address: String,
    pub bounty: String,
    pub activation: bool,
    pub last_remote_gateway_proven_block_height: i64,
}

impl DbGateway {
    pub fn from_entity(gateway: &Gateway) -> Result<Self> {
        Ok(Self {
            gateway_address: to_hex(&gateway.gateway_address),
            chain_id: height_column(gateway.chain_id)?,
            gateway_type: gateway.gateway_type.as_str().to_string(),
            remote_gateway_address: to_hex(&gateway.remote_gateway_address),
            token_address: to_hex(&gateway.token_address),
            anchor_address: to_hex(&gateway.anchor_address),
            bounty: gateway.bounty.to_string(),
            activation: gateway.activation,
            last_remote_gateway_proven_block_height: height_column(
                gateway.last_remote_gateway_proven_block_height,
            )?,
        })
    }

    pub fn into_entity(self) -> Result<Gateway> {
        Ok(Gateway {
            gateway_address: parse_address(&self.gateway_address)?,
            chain_id: parse_height(self.chain_id)?,
            gateway_type: parse_enum("gateway_type", &self.gateway_type, GatewayType::from_str)?,
            remote_gateway_address: parse_address(&self.remote_gateway_address)?,
            token_address: parse_address(&self.token_address)?,
            anchor_address: parse_address(&self.anchor_address)?,
            bounty: parse_u256(&self.bounty)?,
            activation: self.activation,
            last_remote_gateway_proven_block_height: parse_height(
                self.last_remote_gateway_proven_block_height,
            )?,
        })
    }
}

// ==================== Auxiliary Chains ====================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = auxiliary_chains)]
#[diesel(primary_key(chain_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbAuxiliaryChain {
    pub chain_id: i64,
    pub anchor_address: String,
    pub co_anchor_address: String,
    pub last_origin_block_height: i64,
    pub last_auxiliary_block_height: i64,
}

impl DbAuxiliaryChain {
    pub fn from_entity(chain: &AuxiliaryChain) -> Result<Self> {
        Ok(Self {
            chain_id: height_column(chain.chain_id)?,
            anchor_address: to_hex(&chain.anchor_address),
            co_anchor_address: to_hex(&chain.co_anchor_address),
            last_origin_block_height: height_column(chain.last_origin_block_height)?,
            last_auxiliary_block_height: height_column(chain.last_auxiliary_block_height)?,
        })
    }

    pub fn into_entity(self) -> Result<AuxiliaryChain> {
        Ok(AuxiliaryChain {
            chain_id: parse_height(self.chain_id)?,
            anchor_address: parse_address(&self.anchor_address)?,
            co_anchor_address: parse_address(&self.co_anchor_address)?,
            last_origin_block_height: parse_height(self.last_origin_block_height)?,
            last_auxiliary_block_height: parse_height(self.last_auxiliary_block_height)?,
        })
    }
}

// ==================== Chain Transactions ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = chain_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbChainTransaction {
    pub id: i32,
    pub chain_id: i64,
    pub call_label: String,
    pub tx_hash: String,
    pub status: String,
    pub timestamp: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chain_transactions)]
pub struct NewChainTransaction<'a> {
    pub chain_id: i64,
    pub call_label: &'a str,
    pub tx_hash: &'a str,
    pub status: &'a str,
    pub timestamp: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_row_keeps_commitment() {
        let request = MessageTransferRequest {
            request_hash: H256::repeat_byte(0x01),
            request_type: MessageType::Redeem,
            block_number: 42,
            amount: U256::exp10(20),
            beneficiary: Address::from_low_u64_be(0xBEEF),
            gas_price: U256::one(),
            gas_limit: U256::from(21_000),
            nonce: U256::from(7),
            gateway: Address::from_low_u64_be(0xC06A),
            sender: Address::from_low_u64_be(0xABC),
            sender_proxy: Address::from_low_u64_be(0xABC1),
            message_hash: MessageCommitment::Committed(H256::repeat_byte(0x02)),
        };

        let row = DbMessageTransferRequest::from_entity(&request).unwrap();
        assert_eq!(row.amount, "100000000000000000000");
        assert_eq!(row.request_type, "redeem");
        assert_eq!(row.into_entity().unwrap(), request);
    }

    #[test]
    fn test_sparse_message_row_stays_sparse() {
        let message = Message::new(H256::repeat_byte(0x4D));

        let row = DbMessage::from_entity(&message).unwrap();
        assert!(row.source_status.is_none());
        assert_eq!(row.into_entity().unwrap(), message);
    }

    #[test]
    fn test_corrupt_columns_are_rejected() {
        let row = DbGateway {
            gateway_address: "not-an-address".into(),
            chain_id: 1,
            gateway_type: "origin".into(),
            remote_gateway_address: to_hex(&Address::from_low_u64_be(1)),
            token_address: to_hex(&Address::from_low_u64_be(2)),
            anchor_address: to_hex(&Address::from_low_u64_be(3)),
            bounty: "0".into(),
            activation: true,
            last_remote_gateway_proven_block_height: 0,
        };
        assert!(row.into_entity().is_err());

        assert!(parse_u256("0x10").is_err());
        assert!(height_column(u64::MAX).is_err());
    }
}
