//! Binary format for a persisted ValueRadixTree
//!
//! ```text
//! +--------+-------------+---------------------------+
//! | "VRDX" | version u32 | MessagePack tree body     |
//! | 4 bytes| little-end. | (rmp-serde, struct = seq) |
//! +--------+-------------+---------------------------+
//! ```
//!
//! Encoding is deterministic for a given tree: the tree holds no hash maps,
//! so equal trees always produce equal bytes. Decoding re-checks the sibling
//! ordering the lookup code relies on before handing the tree out.

use metaindex_core::{Error, Result};

use crate::radix::ValueRadixTree;

/// Magic bytes at the start of every encoded tree
pub const TREE_MAGIC: &[u8; 4] = b"VRDX";
/// Current format version
pub const TREE_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

// ============================================================================
// Encode / Decode
// ============================================================================

/// Encode a tree as header + MessagePack body.
pub fn encode(tree: &ValueRadixTree) -> Result<Vec<u8>> {
    let payload =
        rmp_serde::to_vec(tree).map_err(|e| Error::Codec(format!("serialize error: {}", e)))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(TREE_MAGIC);
    buf.extend_from_slice(&TREE_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode bytes produced by [`encode`].
///
/// # Errors
///
/// `Codec` on a short buffer, bad magic, unknown version, undecodable body,
/// or a body whose sibling edges are empty or out of order.
pub fn decode(buf: &[u8]) -> Result<ValueRadixTree> {
    if buf.len() < HEADER_LEN {
        return Err(Error::Codec(format!(
            "tree blob too small: {} bytes",
            buf.len()
        )));
    }
    if &buf[0..4] != TREE_MAGIC {
        return Err(Error::Codec("bad tree magic".to_string()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&buf[4..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != TREE_VERSION {
        return Err(Error::Codec(format!(
            "unsupported tree version {}",
            version
        )));
    }

    let tree: ValueRadixTree = rmp_serde::from_slice(&buf[HEADER_LEN..])
        .map_err(|e| Error::Codec(format!("decode error: {}", e)))?;
    tree.check_invariants()
        .map_err(|reason| Error::Codec(format!("corrupt tree: {}", reason)))?;
    Ok(tree)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radix::{Edge, RadixNode};

    fn sample_tree() -> ValueRadixTree {
        let mut tree = ValueRadixTree::new();
        tree.add_tag_value("intel", 0);
        tree.add_tag_value("intel-i7", 1);
        tree.add_tag_value("intel-i7", 2);
        tree.add_tag_value("amd", 3);
        tree.add_tag_value("intel-i9", 4);
        tree.add_tag_value("intel-i7", 5);
        tree
    }

    #[test]
    fn test_roundtrip_preserves_queries() {
        let tree = sample_tree();
        let bytes = encode(&tree).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded, tree);
        for pattern in ["amd", "intel", "intel*", "a*", "c", "*"] {
            assert_eq!(
                decoded.find_all_matched_nodes(pattern).unwrap(),
                tree.find_all_matched_nodes(pattern).unwrap()
            );
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(encode(&sample_tree()).unwrap(), encode(&sample_tree()).unwrap());
    }

    #[test]
    fn test_empty_tree_roundtrip() {
        let bytes = encode(&ValueRadixTree::new()).unwrap();
        assert_eq!(&bytes[0..4], TREE_MAGIC);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(matches!(decode(b"VRD"), Err(Error::Codec(_))));
        assert!(matches!(decode(&[]), Err(Error::Codec(_))));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode(&sample_tree()).unwrap();
        bytes[0] = b'X';
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = encode(&sample_tree()).unwrap();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 2"));
    }

    #[test]
    fn test_rejects_truncated_body() {
        let bytes = encode(&sample_tree()).unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(decode(truncated), Err(Error::Codec(_))));
    }

    #[test]
    fn test_rejects_unsorted_siblings() {
        let leaf = |label: &str| Edge {
            label: label.to_string(),
            node: RadixNode::default(),
        };
        let tree = ValueRadixTree {
            root: RadixNode {
                edges: vec![leaf("zeta"), leaf("alpha")],
                terminal: None,
            },
        };
        let bytes = encode(&tree).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("corrupt tree"));
    }

    #[test]
    fn test_rejects_empty_label() {
        let tree = ValueRadixTree {
            root: RadixNode {
                edges: vec![Edge::default()],
                terminal: None,
            },
        };
        let bytes = encode(&tree).unwrap();
        assert!(matches!(decode(&bytes), Err(Error::Codec(_))));
    }
}
