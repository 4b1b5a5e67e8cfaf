//! # Merkle Root
//!
//! Pairwise SHA-256 reduction over the ordered transaction hashes of a block.
//! An unpaired last node is carried up to the next level unchanged.

use super::hash::Hash;

/// Merkle root of `leaves`, or `None` when there are no leaves.
pub fn merkle_root(leaves: &[Hash]) -> Option<Hash> {
    if leaves.is_empty() {
        return None;
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => Hash::combine(left, right),
                _ => pair[0],
            })
            .collect();
    }
    level.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash {
        Hash::digest(&[n])
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(merkle_root(&[]), None);
    }

    #[test]
    fn test_single_leaf_is_root() {
        assert_eq!(merkle_root(&[leaf(1)]), Some(leaf(1)));
    }

    #[test]
    fn test_odd_leaf_carried_up() {
        let (a, b, c) = (leaf(1), leaf(2), leaf(3));
        let expected = Hash::combine(&Hash::combine(&a, &b), &c);
        assert_eq!(merkle_root(&[a, b, c]), Some(expected));
    }

    #[test]
    fn test_order_matters() {
        assert_ne!(
            merkle_root(&[leaf(1), leaf(2)]),
            merkle_root(&[leaf(2), leaf(1)])
        );
    }
}
