use ethers::{
    types::{Bytes, EIP1186ProofResponse, H256},
    utils::rlp::RlpStream,
};

use crate::models::traits::{AccountProof, StorageProof};

/// `rlp([nonce, balance, storageRoot, codeHash])` as held in the state trie.
pub fn encode_account(response: &EIP1186ProofResponse) -> Bytes {
    let mut stream = RlpStream::new_list(4);
    stream.append(&response.nonce.as_u64());
    stream.append(&response.balance);
    stream.append(&response.storage_hash);
    stream.append(&response.code_hash);
    stream.out().to_vec().into()
}

/// RLP list of already-encoded trie nodes, root first.
pub fn encode_parent_nodes(nodes: &[Bytes]) -> Bytes {
    let mut stream = RlpStream::new_list(nodes.len());
    for node in nodes {
        stream.append_raw(node, 1);
    }
    stream.out().to_vec().into()
}

pub fn account_proof(response: &EIP1186ProofResponse, block_height: u64) -> AccountProof {
    AccountProof {
        block_height,
        encoded_account: encode_account(response),
        serialized_proof: encode_parent_nodes(&response.account_proof),
    }
}

/// Storage proofs labelled with the mapping keys they were requested for, in request order.
pub fn storage_proofs(response: &EIP1186ProofResponse, keys: &[H256]) -> Vec<StorageProof> {
    keys.iter()
        .zip(&response.storage_proof)
        .map(|(key, proof)| StorageProof {
            key: *key,
            value: proof.value,
            serialized_proof: encode_parent_nodes(&proof.proof),
        })
        .collect()
}
