//! Merkle root over transaction ids
//!
//! Leaves are the transaction id strings themselves. Each pair of adjacent
//! nodes is joined as text and hashed into its parent; a trailing node
//! without a partner is carried up to the next level unchanged.

use super::hash::sha256_hex;

/// Merkle root of a block with no transactions
pub const EMPTY_MERKLE_ROOT: &str = "0";

/// Calculate the merkle root from a list of transaction ids
pub fn calculate_merkle_root<S: AsRef<str>>(tx_ids: &[S]) -> String {
    if tx_ids.is_empty() {
        return EMPTY_MERKLE_ROOT.to_string();
    }

    let mut current_level: Vec<String> = tx_ids.iter().map(|id| id.as_ref().to_string()).collect();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));

        for chunk in current_level.chunks(2) {
            let node = match chunk {
                [left, right] => hash_pair(left, right),
                // Odd node is promoted as-is
                [single] => single.clone(),
                _ => unreachable!("chunks(2) yields one or two items"),
            };
            next_level.push(node);
        }

        current_level = next_level;
    }

    current_level.remove(0)
}

/// Hash two sibling nodes into their parent
pub fn hash_pair(left: &str, right: &str) -> String {
    let mut combined = String::with_capacity(left.len() + right.len());
    combined.push_str(left);
    combined.push_str(right);
    sha256_hex(combined.as_bytes())
}
