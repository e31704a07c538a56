use std::collections::HashSet;
use std::time::Duration;

use depot_core::hash::ContentHash;
use depot_core::types::BundleId;

use crate::resolver::LoadSource;
use crate::resolver::ResolverContext;

/// Everything the external transport collaborator needs to fetch one bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadDescriptor {
  pub bundle_name: String,
  pub file_hash: ContentHash,
  pub crc: u32,
  pub file_size: u64,
  pub url: String,
  pub fallback_url: String,
}

/// Copy one embedded bundle into the content-addressable cache.
#[derive(Clone, Debug, PartialEq)]
pub struct UnpackDescriptor {
  pub bundle_name: String,
  pub file_hash: ContentHash,
  pub crc: u32,
  pub file_size: u64,

  /// File name inside the embedded store.
  pub file_name: String,
}

/// Caller-supplied limits the transport collaborator runs a batch under.
///
/// Timeouts apply per transfer, not per batch; cancelling a batch stops new
/// transfers from being issued but leaves in-flight ones to finish or abort
/// individually. Descriptor lists are idempotent by content hash, so a
/// partially completed batch resumes by re-requesting the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferPolicy {
  pub max_concurrent: usize,
  pub max_retries: u32,
  pub timeout: Duration,
}

impl Default for TransferPolicy {
  fn default() -> Self {
    TransferPolicy {
      max_concurrent: 8,
      max_retries: 3,
      timeout: Duration::from_secs(60),
    }
  }
}

fn matches_tags(bundle_tags: &[String], tags: &[String]) -> bool {
  // Untagged bundles are always included so shared content that carries no
  // tags is never silently skipped.
  if bundle_tags.is_empty() || tags.is_empty() {
    return true;
  }
  bundle_tags.iter().any(|tag| tags.contains(tag))
}

impl ResolverContext {
  fn remote_descriptor(&self, id: BundleId) -> Option<DownloadDescriptor> {
    let resolved = self.classify(id)?;
    let LoadSource::Remote { url, fallback_url } = resolved.source else {
      return None;
    };
    Some(DownloadDescriptor {
      bundle_name: resolved.bundle_name,
      file_hash: resolved.file_hash,
      crc: resolved.crc,
      file_size: resolved.file_size,
      url,
      fallback_url,
    })
  }

  fn embedded_descriptor(&self, id: BundleId) -> Option<UnpackDescriptor> {
    let resolved = self.classify(id)?;
    if resolved.source != LoadSource::Embedded {
      return None;
    }
    Some(UnpackDescriptor {
      bundle_name: resolved.bundle_name,
      file_hash: resolved.file_hash,
      crc: resolved.crc,
      file_size: resolved.file_size,
      file_name: resolved.output_file_name,
    })
  }

  /// All bundles that are neither cached nor embedded.
  #[tracing::instrument(level = "debug", skip_all)]
  pub fn download_list_all(&self) -> Vec<DownloadDescriptor> {
    self
      .manifest()
      .manifest()
      .bundle_ids()
      .filter_map(|id| self.remote_descriptor(id))
      .collect()
  }

  /// Remote bundles carrying any of the given tags. Bundles with no tags at
  /// all are always included; an empty filter means everything.
  #[tracing::instrument(level = "debug", skip_all, fields(tags = tags.len()))]
  pub fn download_list_by_tags(&self, tags: &[String]) -> Vec<DownloadDescriptor> {
    let manifest = self.manifest().manifest();
    manifest
      .bundle_ids()
      .filter(|id| {
        manifest
          .bundle(*id)
          .is_some_and(|bundle| matches_tags(&bundle.tags, tags))
      })
      .filter_map(|id| self.remote_descriptor(id))
      .collect()
  }

  /// Remote bundles needed by the given locations: each asset's owning
  /// bundle plus every transitive bundle dependency.
  ///
  /// Locations that resolve to nothing are skipped, so one bad entry does
  /// not fail the batch.
  #[tracing::instrument(level = "debug", skip_all, fields(locations = locations.len()))]
  pub fn download_list_for_locations(&self, locations: &[String]) -> Vec<DownloadDescriptor> {
    let mut seen: HashSet<BundleId> = HashSet::new();
    let mut descriptors = Vec::new();
    for location in locations {
      let resolution = self.resolve_location(location);
      let Some(asset) = resolution.asset() else {
        tracing::warn!(
          location = location.as_str(),
          error = resolution.error(),
          "Skipping unresolvable location"
        );
        continue;
      };
      for id in self.bundles_for_asset(asset) {
        if seen.insert(id) {
          if let Some(descriptor) = self.remote_descriptor(id) {
            descriptors.push(descriptor);
          }
        }
      }
    }
    descriptors
  }

  /// Embedded bundles not yet present in the cache.
  #[tracing::instrument(level = "debug", skip_all)]
  pub fn unpack_list_all(&self) -> Vec<UnpackDescriptor> {
    self
      .manifest()
      .manifest()
      .bundle_ids()
      .filter_map(|id| self.embedded_descriptor(id))
      .collect()
  }

  /// Embedded analogue of [`ResolverContext::download_list_by_tags`].
  #[tracing::instrument(level = "debug", skip_all, fields(tags = tags.len()))]
  pub fn unpack_list_by_tags(&self, tags: &[String]) -> Vec<UnpackDescriptor> {
    let manifest = self.manifest().manifest();
    manifest
      .bundle_ids()
      .filter(|id| {
        manifest
          .bundle(*id)
          .is_some_and(|bundle| matches_tags(&bundle.tags, tags))
      })
      .filter_map(|id| self.embedded_descriptor(id))
      .collect()
  }

  /// Embedded analogue of [`ResolverContext::download_list_for_locations`].
  pub fn unpack_list_for_locations(&self, locations: &[String]) -> Vec<UnpackDescriptor> {
    let mut seen: HashSet<BundleId> = HashSet::new();
    let mut descriptors = Vec::new();
    for location in locations {
      let Some(asset) = self.resolve_location(location).asset() else {
        continue;
      };
      for id in self.bundles_for_asset(asset) {
        if seen.insert(id) {
          if let Some(descriptor) = self.embedded_descriptor(id) {
            descriptors.push(descriptor);
          }
        }
      }
    }
    descriptors
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;
  use std::sync::Arc;

  use depot_cache::{CacheStore, FsCacheStore};
  use depot_core::types::{
    AssetRecord, BundleRecord, LoadMethod, Manifest, OutputNameStyle,
  };
  use depot_filesystem::{FileSystemRef, InMemoryFileSystem};
  use depot_manifest::{decode, encode};
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::embedded::EmbeddedStore;
  use crate::resolver::RemoteHosts;

  fn bundle(name: &str, payload: &[u8], tags: Vec<&str>) -> BundleRecord {
    BundleRecord {
      bundle_name: name.into(),
      file_hash: ContentHash::of(payload),
      crc: depot_core::hash::crc32(payload),
      file_size: payload.len() as u64,
      is_raw_file: false,
      load_method: LoadMethod::Normal,
      tags: tags.into_iter().map(String::from).collect(),
      reference_ids: vec![],
    }
  }

  fn sample_manifest() -> Manifest {
    let mut bundle_r = bundle("bundle_r", b"raw payload", vec![]);
    bundle_r.is_raw_file = true;

    let mut share_c = bundle("share_c", b"share_c payload", vec![]);
    share_c.reference_ids = vec![BundleId::from_index(0)];

    Manifest {
      enable_addressable: true,
      output_name_style: OutputNameStyle::BundleName,
      package_name: "Demo".into(),
      package_version: "1.0.0".into(),
      assets: vec![
        AssetRecord {
          address: "A".into(),
          path: "a.prefab".into(),
          tags: vec!["chars".into()],
          bundle_id: BundleId::from_index(0),
          depend_bundle_ids: vec![BundleId::from_index(2)],
        },
        AssetRecord {
          address: "R".into(),
          path: "r.bin".into(),
          tags: vec![],
          bundle_id: BundleId::from_index(1),
          depend_bundle_ids: vec![],
        },
      ],
      bundles: vec![
        bundle("bundle_a", b"bundle_a payload", vec!["chars"]),
        bundle_r,
        share_c,
      ],
    }
  }

  struct Fixture {
    fs: FileSystemRef,
    cache: Arc<FsCacheStore>,
    context: ResolverContext,
  }

  fn fixture() -> Fixture {
    let fs: FileSystemRef = Arc::new(InMemoryFileSystem::new());
    let cache = Arc::new(FsCacheStore::new(fs.clone(), "/cache", "Demo"));
    let embedded = EmbeddedStore::new(fs.clone(), "/embedded");
    let hosts = RemoteHosts::new(
      "https://cdn.example.com/demo",
      "https://backup.example.com/demo",
    )
    .unwrap();
    let decoded = decode(&encode(&sample_manifest())).unwrap();
    Fixture {
      fs,
      cache: cache.clone(),
      context: ResolverContext::new(decoded, cache, embedded, hosts),
    }
  }

  #[test]
  fn download_list_all_excludes_cached_and_embedded_bundles() {
    let fixture = fixture();

    let names: Vec<String> = fixture
      .context
      .download_list_all()
      .into_iter()
      .map(|d| d.bundle_name)
      .collect();
    assert_eq!(names, vec!["bundle_a", "bundle_r", "share_c"]);

    // Cache one bundle and embed another; only the third stays remote.
    fixture
      .cache
      .write(&ContentHash::of(b"bundle_a payload"), b"bundle_a payload")
      .unwrap();
    fixture
      .fs
      .write(Path::new("/embedded/bundle_r.bundle"), b"raw payload")
      .unwrap();

    let names: Vec<String> = fixture
      .context
      .download_list_all()
      .into_iter()
      .map(|d| d.bundle_name)
      .collect();
    assert_eq!(names, vec!["share_c"]);
  }

  #[test]
  fn download_list_is_idempotent_until_the_cache_changes() {
    let fixture = fixture();

    let first = fixture.context.download_list_all();
    let second = fixture.context.download_list_all();
    assert_eq!(first, second);

    // Simulate the first descriptor landing in the cache; it disappears
    // from the next request.
    let landed = &first[0];
    fixture
      .cache
      .write(&landed.file_hash, b"bundle_a payload")
      .unwrap();

    let third = fixture.context.download_list_all();
    assert_eq!(third.len(), first.len() - 1);
    assert!(third.iter().all(|d| d.bundle_name != landed.bundle_name));
  }

  #[test]
  fn tag_filter_keeps_untagged_bundles() {
    let fixture = fixture();

    let names: Vec<String> = fixture
      .context
      .download_list_by_tags(&["chars".into()])
      .into_iter()
      .map(|d| d.bundle_name)
      .collect();

    // bundle_a matches the tag; bundle_r and share_c are untagged and so
    // always included.
    assert_eq!(names, vec!["bundle_a", "bundle_r", "share_c"]);
  }

  #[test]
  fn tag_filter_excludes_tagged_bundles_without_a_match() {
    let fixture = fixture();

    let names: Vec<String> = fixture
      .context
      .download_list_by_tags(&["props".into()])
      .into_iter()
      .map(|d| d.bundle_name)
      .collect();

    assert_eq!(names, vec!["bundle_r", "share_c"]);
  }

  #[test]
  fn location_driven_list_includes_transitive_dependencies() {
    let fixture = fixture();

    let names: Vec<String> = fixture
      .context
      .download_list_for_locations(&["A".into(), "ghost".into()])
      .into_iter()
      .map(|d| d.bundle_name)
      .collect();

    assert_eq!(names, vec!["bundle_a", "share_c"]);
  }

  #[test]
  fn descriptors_carry_urls_and_expected_hashes() {
    let fixture = fixture();

    let descriptor = fixture
      .context
      .download_list_for_locations(&["A".into()])
      .remove(0);
    assert_eq!(descriptor.bundle_name, "bundle_a");
    assert_eq!(descriptor.file_hash, ContentHash::of(b"bundle_a payload"));
    assert_eq!(
      descriptor.url,
      "https://cdn.example.com/demo/bundle_a.bundle"
    );
    assert_eq!(
      descriptor.fallback_url,
      "https://backup.example.com/demo/bundle_a.bundle"
    );
    assert_eq!(descriptor.file_size, b"bundle_a payload".len() as u64);
  }

  #[test]
  fn unpack_list_moves_embedded_bundles_toward_the_cache() {
    let fixture = fixture();
    fixture
      .fs
      .write(Path::new("/embedded/bundle_a.bundle"), b"bundle_a payload")
      .unwrap();

    let unpack: Vec<String> = fixture
      .context
      .unpack_list_all()
      .into_iter()
      .map(|d| d.file_name)
      .collect();
    assert_eq!(unpack, vec!["bundle_a.bundle"]);

    // Once cached, nothing is left to unpack.
    fixture
      .cache
      .write(&ContentHash::of(b"bundle_a payload"), b"bundle_a payload")
      .unwrap();
    assert_eq!(fixture.context.unpack_list_all(), vec![]);
  }

  #[test]
  fn unpack_lists_support_tag_and_location_filters() {
    let fixture = fixture();
    fixture
      .fs
      .write(Path::new("/embedded/bundle_a.bundle"), b"bundle_a payload")
      .unwrap();
    fixture
      .fs
      .write(Path::new("/embedded/bundle_r.bundle"), b"raw payload")
      .unwrap();

    let by_tag: Vec<String> = fixture
      .context
      .unpack_list_by_tags(&["chars".into()])
      .into_iter()
      .map(|d| d.bundle_name)
      .collect();
    assert_eq!(by_tag, vec!["bundle_a", "bundle_r"]);

    let by_location: Vec<String> = fixture
      .context
      .unpack_list_for_locations(&["R".into()])
      .into_iter()
      .map(|d| d.bundle_name)
      .collect();
    assert_eq!(by_location, vec!["bundle_r"]);
  }

  #[test]
  fn transfer_policy_defaults_are_bounded() {
    let policy = TransferPolicy::default();

    assert!(policy.max_concurrent > 0);
    assert!(policy.max_retries > 0);
    assert!(policy.timeout > Duration::ZERO);
  }
}
