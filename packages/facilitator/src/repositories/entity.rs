use std::{fmt::Debug, hash::Hash};

use ethers::types::{Address, H256, U256};

use crate::{
    crypto::secret::verify_secret,
    models::{
        error::FieldViolation,
        model::{AuxiliaryChain, Gateway, Message, MessageCommitment, MessageTransferRequest},
    },
};

pub trait Entity: Clone + Debug + PartialEq + Send + Sync + 'static {
    type Key: Clone + Debug + Eq + Hash + Send + Sync + 'static;

    const NAME: &'static str;

    fn key(&self) -> Self::Key;

    /// Combines an incoming record with the stored one. Defaults to replacing it.
    fn merge(self, _stored: &Self) -> Self {
        self
    }

    /// Constraint violations of `self` as it would be written over `stored`.
    fn validate(&self, stored: Option<&Self>) -> Vec<FieldViolation>;
}

fn require<T>(violations: &mut Vec<FieldViolation>, field: &'static str, value: &Option<T>) {
    if value.is_none() {
        violations.push(FieldViolation::new(field, "is required"));
    }
}

fn require_address(violations: &mut Vec<FieldViolation>, field: &'static str, value: Address) {
    if value.is_zero() {
        violations.push(FieldViolation::new(field, "must be a non-zero address"));
    }
}

fn never_decreases(
    violations: &mut Vec<FieldViolation>,
    field: &'static str,
    stored: Option<u64>,
    value: u64,
) {
    if let Some(stored) = stored {
        if value < stored {
            violations.push(FieldViolation::new(
                field,
                format!("cannot decrease from {} to {}", stored, value),
            ));
        }
    }
}

// ==================== Message ====================

impl Entity for Message {
    type Key = H256;

    const NAME: &'static str = "message";

    fn key(&self) -> H256 {
        self.message_hash
    }

    fn merge(self, stored: &Self) -> Self {
        Self {
            message_hash: self.message_hash,
            message_type: self.message_type.or(stored.message_type),
            direction: self.direction.or(stored.direction),
            gateway_address: self.gateway_address.or(stored.gateway_address),
            source_status: self.source_status.or(stored.source_status),
            target_status: self.target_status.or(stored.target_status),
            sender: self.sender.or(stored.sender),
            nonce: self.nonce.or(stored.nonce),
            gas_price: self.gas_price.or(stored.gas_price),
            gas_limit: self.gas_limit.or(stored.gas_limit),
            source_declaration_block_height: self
                .source_declaration_block_height
                .or(stored.source_declaration_block_height),
            secret: self.secret.or(stored.secret),
            hash_lock: self.hash_lock.or(stored.hash_lock),
        }
    }

    fn validate(&self, stored: Option<&Self>) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        if self.message_hash.is_zero() {
            violations.push(FieldViolation::new("message_hash", "must be non-zero"));
        }
        require(&mut violations, "message_type", &self.message_type);
        require(&mut violations, "direction", &self.direction);
        require(&mut violations, "gateway_address", &self.gateway_address);
        require(&mut violations, "source_status", &self.source_status);
        require(&mut violations, "target_status", &self.target_status);

        if let (Some(message_type), Some(direction)) = (self.message_type, self.direction) {
            if message_type.direction() != direction {
                violations.push(FieldViolation::new(
                    "direction",
                    format!("does not match message type {}", message_type.as_str()),
                ));
            }
        }

        if let (Some(secret), Some(hash_lock)) = (self.secret, self.hash_lock) {
            if !verify_secret(&secret, &hash_lock) {
                violations.push(FieldViolation::new("secret", "does not match hash lock"));
            }
        }

        if let Some(stored) = stored {
            if let (Some(old), Some(new)) = (stored.hash_lock, self.hash_lock) {
                if old != new {
                    violations.push(FieldViolation::new("hash_lock", "cannot change once set"));
                }
            }

            if stored.secret.is_some() && self.secret != stored.secret {
                violations.push(FieldViolation::new("secret", "cannot change once revealed"));
            }

            let sides = [
                ("source_status", stored.source_status, self.source_status),
                ("target_status", stored.target_status, self.target_status),
            ];
            for (field, old, new) in sides {
                if let (Some(old), Some(new)) = (old, new) {
                    if !old.can_transition_to(new) {
                        violations.push(FieldViolation::new(
                            field,
                            format!("cannot move from {} to {}", old, new),
                        ));
                    }
                }
            }
        }

        violations
    }
}

// ==================== MessageTransferRequest ====================

impl Entity for MessageTransferRequest {
    type Key = H256;

    const NAME: &'static str = "message_transfer_request";

    fn key(&self) -> H256 {
        self.request_hash
    }

    fn validate(&self, stored: Option<&Self>) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        if self.request_hash.is_zero() {
            violations.push(FieldViolation::new("request_hash", "must be non-zero"));
        }
        if self.amount == U256::zero() {
            violations.push(FieldViolation::new("amount", "must be greater than zero"));
        }
        require_address(&mut violations, "beneficiary", self.beneficiary);
        require_address(&mut violations, "gateway", self.gateway);
        require_address(&mut violations, "sender", self.sender);

        if let MessageCommitment::Committed(hash) = self.message_hash {
            if hash.is_zero() {
                violations.push(FieldViolation::new("message_hash", "must be non-zero"));
            }
        }

        never_decreases(
            &mut violations,
            "block_number",
            stored.map(|s| s.block_number),
            self.block_number,
        );

        violations
    }
}

// ==================== Gateway ====================

impl Entity for Gateway {
    type Key = Address;

    const NAME: &'static str = "gateway";

    fn key(&self) -> Address {
        self.gateway_address
    }

    fn validate(&self, stored: Option<&Self>) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        require_address(&mut violations, "gateway_address", self.gateway_address);
        require_address(&mut violations, "remote_gateway_address", self.remote_gateway_address);
        require_address(&mut violations, "anchor_address", self.anchor_address);
        if self.chain_id == 0 {
            violations.push(FieldViolation::new("chain_id", "must be greater than zero"));
        }

        never_decreases(
            &mut violations,
            "last_remote_gateway_proven_block_height",
            stored.map(|s| s.last_remote_gateway_proven_block_height),
            self.last_remote_gateway_proven_block_height,
        );

        violations
    }
}

// ==================== AuxiliaryChain ====================

impl Entity for AuxiliaryChain {
    type Key = u64;

    const NAME: &'static str = "auxiliary_chain";

    fn key(&self) -> u64 {
        self.chain_id
    }

    fn validate(&self, stored: Option<&Self>) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        if self.chain_id == 0 {
            violations.push(FieldViolation::new("chain_id", "must be greater than zero"));
        }
        require_address(&mut violations, "anchor_address", self.anchor_address);
        require_address(&mut violations, "co_anchor_address", self.co_anchor_address);

        never_decreases(
            &mut violations,
            "last_origin_block_height",
            stored.map(|s| s.last_origin_block_height),
            self.last_origin_block_height,
        );
        never_decreases(
            &mut violations,
            "last_auxiliary_block_height",
            stored.map(|s| s.last_auxiliary_block_height),
            self.last_auxiliary_block_height,
        );

        violations
    }
}
