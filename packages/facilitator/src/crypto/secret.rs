use ethers::{types::H256, utils::keccak256};
use rand::RngCore;

/// Fresh 32-byte commit secret.
pub fn generate_secret() -> H256 {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    H256(secret)
}

pub fn hash_lock(secret: &H256) -> H256 {
    H256(keccak256(secret.as_bytes()))
}

pub fn verify_secret(secret: &H256, hash_lock_value: &H256) -> bool {
    hash_lock(secret) == *hash_lock_value
}

/// Generates a secret together with its hash lock.
pub fn create_secret_hash_lock() -> (H256, H256) {
    let secret = generate_secret();
    let lock = hash_lock(&secret);
    (secret, lock)
}
