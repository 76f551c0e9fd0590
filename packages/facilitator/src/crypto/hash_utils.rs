use ethers::{
    abi::{Token, encode},
    types::{Address, H256, U256},
    utils::keccak256,
};

use crate::models::model::MessageType;

pub const STAKE_INTENT_TYPE: &str = "StakeIntent(uint256 amount,address beneficiary,address gateway)";
pub const REDEEM_INTENT_TYPE: &str =
    "RedeemIntent(uint256 amount,address beneficiary,address gateway)";
pub const MESSAGE_TYPE: &str = "Message(bytes32 intentHash,uint256 nonce,uint256 gasPrice,uint256 gasLimit,address sender,bytes32 hashLock)";
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain(address verifyingContract)";
pub const STAKE_REQUEST_TYPE: &str = "StakeRequest(uint256 amount,address beneficiary,uint256 gasPrice,uint256 gasLimit,uint256 nonce,address staker,address gateway)";
pub const REDEEM_REQUEST_TYPE: &str = "RedeemRequest(uint256 amount,address beneficiary,uint256 gasPrice,uint256 gasLimit,uint256 nonce,address redeemer,address cogateway)";

/// Terms shared by a transfer request and the message it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTerms {
    pub amount: U256,
    pub beneficiary: Address,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub nonce: U256,
    pub sender: Address,
    pub gateway: Address,
}

pub fn type_hash(signature: &str) -> H256 {
    H256(keccak256(signature.as_bytes()))
}

fn hash_tokens(tokens: &[Token]) -> H256 {
    H256(keccak256(encode(tokens)))
}

fn word(hash: H256) -> Token {
    Token::FixedBytes(hash.as_bytes().to_vec())
}

pub fn intent_hash(
    message_type: MessageType,
    amount: U256,
    beneficiary: Address,
    gateway: Address,
) -> H256 {
    let type_signature = match message_type {
        MessageType::Stake => STAKE_INTENT_TYPE,
        MessageType::Redeem => REDEEM_INTENT_TYPE,
    };

    hash_tokens(&[
        word(type_hash(type_signature)),
        Token::Uint(amount),
        Token::Address(beneficiary),
        Token::Address(gateway),
    ])
}

pub fn message_hash(
    intent_hash: H256,
    nonce: U256,
    gas_price: U256,
    gas_limit: U256,
    sender: Address,
    hash_lock: H256,
) -> H256 {
    hash_tokens(&[
        word(type_hash(MESSAGE_TYPE)),
        word(intent_hash),
        Token::Uint(nonce),
        Token::Uint(gas_price),
        Token::Uint(gas_limit),
        Token::Address(sender),
        word(hash_lock),
    ])
}

/// Message hash for `terms`, where `terms.sender` is the sender proxy that owns the nonce.
pub fn compute_message_hash(
    message_type: MessageType,
    terms: &TransferTerms,
    hash_lock: H256,
) -> H256 {
    let intent = intent_hash(message_type, terms.amount, terms.beneficiary, terms.gateway);
    message_hash(
        intent,
        terms.nonce,
        terms.gas_price,
        terms.gas_limit,
        terms.sender,
        hash_lock,
    )
}

/// EIP-712 digest of a stake/redeem request, domain-separated by the accepting pool.
pub fn request_hash(request_type: MessageType, terms: &TransferTerms, pool: Address) -> H256 {
    let type_signature = match request_type {
        MessageType::Stake => STAKE_REQUEST_TYPE,
        MessageType::Redeem => REDEEM_REQUEST_TYPE,
    };

    let struct_hash = hash_tokens(&[
        word(type_hash(type_signature)),
        Token::Uint(terms.amount),
        Token::Address(terms.beneficiary),
        Token::Uint(terms.gas_price),
        Token::Uint(terms.gas_limit),
        Token::Uint(terms.nonce),
        Token::Address(terms.sender),
        Token::Address(terms.gateway),
    ]);

    let domain_separator = hash_tokens(&[word(type_hash(EIP712_DOMAIN_TYPE)), Token::Address(pool)]);

    let mut digest_input = Vec::with_capacity(66);
    digest_input.extend_from_slice(&[0x19, 0x01]);
    digest_input.extend_from_slice(domain_separator.as_bytes());
    digest_input.extend_from_slice(struct_hash.as_bytes());

    H256(keccak256(digest_input))
}

/// Storage key of `key` in a `mapping(bytes32 => _)` declared at slot `offset`.
pub fn mapping_storage_key(key: H256, offset: u64) -> H256 {
    hash_tokens(&[word(key), Token::Uint(U256::from(offset))])
}
