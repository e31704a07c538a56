use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use xxhash_rust::xxh3::xxh3_64;
use xxhash_rust::xxh3::Xxh3;

/// Depot needs a hasher for generating internal identifiers (shared bundle
/// names, simulated bundle hashes in tests).
///
/// These don't need to be fast, but they must be stable across runs, machines
/// and platforms because they end up inside persisted manifests.
pub type IdentifierHasher = Xxh3;

pub fn hash_string(s: &str) -> String {
  hash_bytes(s.as_bytes())
}

pub fn hash_bytes(s: &[u8]) -> String {
  let res = xxh3_64(s);
  format!("{:016x}", res)
}

/// Cryptographic content hash of a compiled bundle payload.
///
/// This is the bundle's cache identity: the content-addressable cache is
/// keyed by it, and download descriptors carry it as the expected hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
  pub fn of(bytes: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ContentHash(hex::encode(hasher.finalize()))
  }

  pub fn from_hex(digest: impl Into<String>) -> Self {
    ContentHash(digest.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

pub fn crc32(bytes: &[u8]) -> u32 {
  let mut hasher = crc32fast::Hasher::new();
  hasher.update(bytes);
  hasher.finalize()
}
