//! Hashing helpers.
//!
//! Used to derive stable, collision-resistant names for generated files
//! (compiled script artifacts are named after a hash of their source path).

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::consts::ARTIFACT_HASH_LEN;

/// Full lowercase hex SHA-256 of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  format!("{:x}", hasher.finalize())
}

/// Truncated hash of a path's textual form.
///
/// Two different source paths with the same file stem produce different
/// hashes, so their artifacts never collide.
pub fn short_path_hash(path: &Path) -> String {
  let full = hash_bytes(path.to_string_lossy().as_bytes());
  full[..ARTIFACT_HASH_LEN].to_string()
}
