//! Call bindings and event fragments of the bridge contracts.

pub mod stake_pool {
    use ethers::contract::abigen;

    abigen!(
        StakePool,
        r#"[
            function acceptStakeRequest(uint256 amount, address beneficiary, uint256 gasPrice, uint256 gasLimit, uint256 nonce, address staker, address gateway, bytes32 hashLock) external returns (bytes32)
        ]"#
    );
}

pub mod redeem_pool {
    use ethers::contract::abigen;

    abigen!(
        RedeemPool,
        r#"[
            function acceptRedeemRequest(uint256 amount, address beneficiary, uint256 gasPrice, uint256 gasLimit, uint256 nonce, address redeemer, address cogateway, bytes32 hashLock) external payable returns (bytes32)
        ]"#
    );
}

pub mod gateway {
    use ethers::contract::abigen;

    abigen!(
        Gateway,
        r#"[
            function progressStake(bytes32 messageHash, bytes32 unlockSecret) external returns (address, uint256)
            function confirmRedeemIntent(address redeemer, uint256 redeemerNonce, address beneficiary, uint256 amount, uint256 gasPrice, uint256 gasLimit, uint256 blockHeight, bytes32 hashLock, bytes rlpParentNodes) external returns (bytes32)
            function progressUnstake(bytes32 messageHash, bytes32 unlockSecret) external returns (uint256, uint256, uint256)
            function proveGateway(uint256 blockHeight, bytes rlpAccount, bytes rlpParentNodes) external returns (bool)
        ]"#
    );
}

pub mod co_gateway {
    use ethers::contract::abigen;

    abigen!(
        CoGateway,
        r#"[
            function confirmStakeIntent(address staker, uint256 stakerNonce, address beneficiary, uint256 amount, uint256 gasPrice, uint256 gasLimit, bytes32 hashLock, uint256 blockHeight, bytes rlpParentNodes) external returns (bytes32)
            function progressMint(bytes32 messageHash, bytes32 unlockSecret) external returns (address, uint256, uint256, uint256)
            function progressRedeem(bytes32 messageHash, bytes32 unlockSecret) external returns (address, uint256)
            function proveGateway(uint256 blockHeight, bytes rlpAccount, bytes rlpParentNodes) external returns (bool)
        ]"#
    );
}

// ==================== Event fragments ====================

pub const STAKE_POOL_EVENTS: &[&str] = &[
    "event StakeRequested(uint256 amount, address beneficiary, uint256 gasPrice, uint256 gasLimit, uint256 nonce, address indexed staker, address stakerProxy, address gateway, bytes32 stakeRequestHash)",
];

pub const REDEEM_POOL_EVENTS: &[&str] = &[
    "event RedeemRequested(uint256 amount, address beneficiary, uint256 gasPrice, uint256 gasLimit, uint256 nonce, address indexed redeemer, address redeemerProxy, address cogateway, bytes32 redeemRequestHash)",
];

pub const GATEWAY_EVENTS: &[&str] = &[
    "event StakeIntentDeclared(bytes32 indexed _messageHash, address _staker, uint256 _stakerNonce, address _beneficiary, uint256 _amount)",
    "event StakeProgressed(bytes32 indexed _messageHash, address _staker, uint256 _stakerNonce, uint256 _amount, bool _proofProgress, bytes32 _unlockSecret)",
    "event RedeemIntentConfirmed(bytes32 indexed _messageHash, address _redeemer, uint256 _redeemerNonce, address _beneficiary, uint256 _amount, uint256 _blockHeight, bytes32 _hashLock)",
    "event UnstakeProgressed(bytes32 indexed _messageHash, address _redeemer, address _beneficiary, uint256 _redeemAmount, uint256 _unstakeAmount, uint256 _rewardAmount, bool _proofProgress, bytes32 _unlockSecret)",
    "event RevertStakeIntentDeclared(bytes32 indexed _messageHash, address _staker, uint256 _stakerNonce, uint256 _amount)",
    "event RevertStakeProgressed(bytes32 indexed _messageHash, address _staker, uint256 _stakerNonce, uint256 _amount)",
    "event RevertRedeemIntentConfirmed(bytes32 indexed _messageHash, address _redeemer, uint256 _redeemerNonce, uint256 _amount)",
    "event GatewayProven(address _gateway, uint256 _blockHeight, bytes32 _storageRoot, bool _wasAlreadyProved)",
];

pub const CO_GATEWAY_EVENTS: &[&str] = &[
    "event StakeIntentConfirmed(bytes32 indexed _messageHash, address _staker, uint256 _stakerNonce, address _beneficiary, uint256 _amount, uint256 _blockHeight, bytes32 _hashLock)",
    "event MintProgressed(bytes32 indexed _messageHash, address _staker, address _beneficiary, uint256 _stakeAmount, uint256 _mintedAmount, uint256 _rewardAmount, bool _proofProgress, bytes32 _unlockSecret)",
    "event RedeemIntentDeclared(bytes32 indexed _messageHash, address _redeemer, uint256 _redeemerNonce, address _beneficiary, uint256 _amount)",
    "event RedeemProgressed(bytes32 indexed _messageHash, address _redeemer, uint256 _redeemerNonce, uint256 _amount, bool _proofProgress, bytes32 _unlockSecret)",
    "event RevertStakeIntentConfirmed(bytes32 indexed _messageHash, address _staker, uint256 _stakerNonce, uint256 _amount)",
    "event RevertRedeemDeclared(bytes32 indexed _messageHash, address _redeemer, uint256 _redeemerNonce, uint256 _amount)",
    "event RevertRedeemComplete(bytes32 indexed _messageHash, address _redeemer, uint256 _redeemerNonce, uint256 _amount)",
    "event GatewayProven(address _gateway, uint256 _blockHeight, bytes32 _storageRoot, bool _wasAlreadyProved)",
];

pub const ANCHOR_EVENTS: &[&str] =
    &["event StateRootAvailable(uint256 _blockHeight, bytes32 _stateRoot)"];

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::{
        abi::{AbiDecode, AbiEncode},
        types::{Address, U256},
    };

    #[test]
    fn test_call_bindings_resolve_through_their_modules() {
        let call = stake_pool::AcceptStakeRequestCall {
            amount: U256::from(10),
            beneficiary: Address::repeat_byte(0x01),
            gas_price: U256::one(),
            gas_limit: U256::one(),
            nonce: U256::from(2),
            staker: Address::repeat_byte(0x02),
            gateway: Address::repeat_byte(0x03),
            hash_lock: [0x04; 32],
        };
        let decoded = stake_pool::AcceptStakeRequestCall::decode(call.clone().encode()).unwrap();
        assert_eq!(decoded, call);

        let progress = gateway::ProgressStakeCall {
            message_hash: [0x05; 32],
            unlock_secret: [0x06; 32],
        };
        assert_eq!(
            gateway::ProgressStakeCall::decode(progress.clone().encode()).unwrap(),
            progress
        );

        let mint = co_gateway::ProgressMintCall {
            message_hash: [0x07; 32],
            unlock_secret: [0x08; 32],
        };
        assert_eq!(
            co_gateway::ProgressMintCall::decode(mint.clone().encode()).unwrap(),
            mint
        );

        let redeem = redeem_pool::AcceptRedeemRequestCall {
            amount: U256::from(10),
            beneficiary: Address::repeat_byte(0x01),
            gas_price: U256::one(),
            gas_limit: U256::one(),
            nonce: U256::from(2),
            redeemer: Address::repeat_byte(0x02),
            cogateway: Address::repeat_byte(0x03),
            hash_lock: [0x04; 32],
        };
        assert_eq!(
            redeem_pool::AcceptRedeemRequestCall::decode(redeem.clone().encode()).unwrap(),
            redeem
        );
    }
}
