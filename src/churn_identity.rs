//! Node Identity Generation
//!
//! Node identities are the public half of a fresh **X25519** key pair. The
//! churn engine never looks inside an identity, it only needs two calls to
//! produce different values.
//!
//! Key material comes straight from the operating system RNG. If that source
//! fails the environment is broken; the error is returned and callers are
//! expected to abort startup rather than continue with fewer nodes.

use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::churn_interface::NodeId;

/// Encoded public keys carrying a format tag strip this many leading bytes.
/// X25519 keys have no tag, so nothing is removed by default.
pub const PUBLIC_KEY_PREFIX_LEN: usize = 0;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("randomness source failed: {0}")]
    Entropy(#[from] rand::Error),

    #[error("public key has {got} bytes after removing a {prefix} byte prefix, expected 32")]
    KeyLength { got: usize, prefix: usize },
}

/// Generate one node identity from a fresh key pair
pub fn random_node_id() -> Result<NodeId, IdentityError> {
    let mut secret_bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut secret_bytes)?;

    let secret = StaticSecret::from(secret_bytes);
    let public_key = PublicKey::from(&secret);

    node_id_from_public_key(public_key.as_bytes(), PUBLIC_KEY_PREFIX_LEN)
}

/// Generate `count` node identities
///
/// Stops at the first failure; a partial population is never returned.
pub fn random_node_ids(count: usize) -> Result<Vec<NodeId>, IdentityError> {
    let ids = (0..count)
        .map(|_| random_node_id())
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Generated {} node identities", ids.len());
    Ok(ids)
}

/// Derive an identity from encoded public key bytes with a fixed-length prefix removed
pub fn node_id_from_public_key(encoded: &[u8], prefix: usize) -> Result<NodeId, IdentityError> {
    let body = encoded.get(prefix..).unwrap_or(&[]);
    let bytes: [u8; 32] = body.try_into().map_err(|_| IdentityError::KeyLength {
        got: body.len(),
        prefix,
    })?;
    Ok(NodeId(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_ids_are_unique() {
        let ids = random_node_ids(64).unwrap();
        assert_eq!(ids.len(), 64);

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 64);
    }

    #[test]
    fn test_zero_ids() {
        assert!(random_node_ids(0).unwrap().is_empty());
    }

    #[test]
    fn test_prefix_removed() {
        let mut encoded = vec![0x04];
        encoded.extend_from_slice(&[7u8; 32]);

        let id = node_id_from_public_key(&encoded, 1).unwrap();
        assert_eq!(id, NodeId([7u8; 32]));
    }

    #[test]
    fn test_wrong_key_length() {
        let err = node_id_from_public_key(&[1u8; 20], 1).unwrap_err();
        assert!(matches!(err, IdentityError::KeyLength { got: 19, prefix: 1 }));

        // prefix longer than the key
        let err = node_id_from_public_key(&[1u8; 4], 8).unwrap_err();
        assert!(matches!(err, IdentityError::KeyLength { got: 0, prefix: 8 }));
    }
}
