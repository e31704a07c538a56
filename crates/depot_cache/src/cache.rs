use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use depot_core::hash::ContentHash;
use depot_filesystem::FileSystemRef;
use serde::Deserialize;
use serde::Serialize;

/// Store of compiled bundle payloads keyed by their content hash.
///
/// One shared store exists per package. A key either holds exactly the bytes
/// it was first written with or nothing; writers can never replace an entry
/// with different content for the same key.
#[mockall::automock]
pub trait CacheStore {
  fn contains(&self, hash: &ContentHash) -> bool;
  fn read(&self, hash: &ContentHash) -> anyhow::Result<Option<Vec<u8>>>;
  fn write(&self, hash: &ContentHash, contents: &[u8]) -> anyhow::Result<()>;
  fn remove(&self, hash: &ContentHash) -> anyhow::Result<()>;
}

/// Sidecar metadata stored next to each entry's data file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntryInfo {
  file_hash: String,
  file_size: u64,
}

/// File-system backed cache store.
///
/// Layout: `<cache_root>/<package_name>/<hash>/data` plus an `info` sidecar.
pub struct FsCacheStore {
  fs: FileSystemRef,
  root: PathBuf,
}

impl FsCacheStore {
  pub fn new(fs: FileSystemRef, cache_root: impl Into<PathBuf>, package_name: &str) -> Self {
    FsCacheStore {
      fs,
      root: cache_root.into().join(package_name),
    }
  }

  fn entry_dir(&self, hash: &ContentHash) -> PathBuf {
    self.root.join(hash.as_str())
  }

  fn data_path(&self, hash: &ContentHash) -> PathBuf {
    self.entry_dir(hash).join("data")
  }

  fn info_path(&self, hash: &ContentHash) -> PathBuf {
    self.entry_dir(hash).join("info")
  }
}

impl CacheStore for FsCacheStore {
  fn contains(&self, hash: &ContentHash) -> bool {
    self.fs.is_file(&self.data_path(hash))
  }

  #[tracing::instrument(level = "debug", skip_all, fields(hash = %hash))]
  fn read(&self, hash: &ContentHash) -> anyhow::Result<Option<Vec<u8>>> {
    if !self.contains(hash) {
      return Ok(None);
    }
    let contents = self
      .fs
      .read(&self.data_path(hash))
      .with_context(|| format!("failed to read cache entry {hash}"))?;
    Ok(Some(contents))
  }

  #[tracing::instrument(level = "debug", skip_all, fields(hash = %hash, bytes = contents.len()))]
  fn write(&self, hash: &ContentHash, contents: &[u8]) -> anyhow::Result<()> {
    let data_path = self.data_path(hash);
    if self.fs.is_file(&data_path) {
      let existing = self
        .fs
        .read(&data_path)
        .with_context(|| format!("failed to read existing cache entry {hash}"))?;
      if existing != contents {
        // Same key, different bytes: either the hash function broke or the
        // entry was tampered with. Refusing beats corrupting.
        bail!("cache entry {hash} already holds different content");
      }
      return Ok(());
    }

    self
      .fs
      .create_dir_all(&self.entry_dir(hash))
      .with_context(|| format!("failed to create cache entry directory for {hash}"))?;
    self
      .fs
      .write(&data_path, contents)
      .with_context(|| format!("failed to write cache entry {hash}"))?;

    let info = CacheEntryInfo {
      file_hash: hash.as_str().to_string(),
      file_size: contents.len() as u64,
    };
    let info_json = serde_json::to_string(&info)?;
    self
      .fs
      .write(&self.info_path(hash), info_json.as_bytes())
      .with_context(|| format!("failed to write cache entry info for {hash}"))?;
    Ok(())
  }

  fn remove(&self, hash: &ContentHash) -> anyhow::Result<()> {
    self
      .fs
      .remove_dir_all(&self.entry_dir(hash))
      .with_context(|| format!("failed to remove cache entry {hash}"))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use depot_filesystem::{InMemoryFileSystem, OsFileSystem};
  use pretty_assertions::assert_eq;

  use super::*;

  fn in_memory_store() -> FsCacheStore {
    FsCacheStore::new(Arc::new(InMemoryFileSystem::new()), "/cache", "Demo")
  }

  #[test]
  fn write_then_read_round_trips() {
    let store = in_memory_store();
    let hash = ContentHash::of(b"payload");

    assert!(!store.contains(&hash));
    store.write(&hash, b"payload").unwrap();

    assert!(store.contains(&hash));
    assert_eq!(store.read(&hash).unwrap(), Some(b"payload".to_vec()));
  }

  #[test]
  fn rewriting_identical_content_is_idempotent() {
    let store = in_memory_store();
    let hash = ContentHash::of(b"payload");

    store.write(&hash, b"payload").unwrap();
    store.write(&hash, b"payload").unwrap();

    assert_eq!(store.read(&hash).unwrap(), Some(b"payload".to_vec()));
  }

  #[test]
  fn rewriting_different_content_for_the_same_key_is_fatal() {
    let store = in_memory_store();
    let hash = ContentHash::of(b"payload");
    store.write(&hash, b"payload").unwrap();

    let error = store.write(&hash, b"other payload").unwrap_err();
    assert!(error.to_string().contains("different content"), "{error}");

    // The original entry survives untouched.
    assert_eq!(store.read(&hash).unwrap(), Some(b"payload".to_vec()));
  }

  #[test]
  fn remove_clears_the_entry() {
    let store = in_memory_store();
    let hash = ContentHash::of(b"payload");
    store.write(&hash, b"payload").unwrap();

    store.remove(&hash).unwrap();
    assert!(!store.contains(&hash));
    assert_eq!(store.read(&hash).unwrap(), None);
  }

  #[test]
  fn stores_are_scoped_per_package() {
    let fs: FileSystemRef = Arc::new(InMemoryFileSystem::new());
    let demo = FsCacheStore::new(fs.clone(), "/cache", "Demo");
    let other = FsCacheStore::new(fs, "/cache", "Other");
    let hash = ContentHash::of(b"payload");

    demo.write(&hash, b"payload").unwrap();
    assert!(demo.contains(&hash));
    assert!(!other.contains(&hash));
  }

  #[test]
  fn mocked_store_backs_trait_object_callers() {
    let mut mock = MockCacheStore::default();
    mock.expect_contains().return_const(true);

    let store: &dyn CacheStore = &mock;
    assert!(store.contains(&ContentHash::of(b"payload")));
  }

  #[test]
  fn works_against_the_real_file_system() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsCacheStore::new(Arc::new(OsFileSystem), dir.path(), "Demo");
    let hash = ContentHash::of(b"payload");

    store.write(&hash, b"payload").unwrap();
    assert_eq!(store.read(&hash).unwrap(), Some(b"payload".to_vec()));
    assert!(dir.path().join("Demo").join(hash.as_str()).join("info").exists());
  }
}
