use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Context;
use depot_cache::CacheStore;
use depot_core::hash::ContentHash;
use depot_core::types::AssetRecord;
use depot_core::types::BundleId;
use depot_core::types::LoadMethod;
use depot_manifest::DecodedManifest;
use url::Url;

use crate::embedded::EmbeddedStore;

/// Where a bundle's bytes come from at load time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadSource {
  /// Present in the local content-addressable cache under its content hash.
  Cached,

  /// Shipped inside the application install.
  Embedded,

  /// Must be fetched.
  Remote { url: String, fallback_url: String },
}

/// Read-only projection of one bundle record plus its load-source
/// classification.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedBundle {
  pub id: BundleId,
  pub bundle_name: String,
  pub file_hash: ContentHash,
  pub crc: u32,
  pub file_size: u64,
  pub is_raw_file: bool,
  pub load_method: LoadMethod,
  pub output_file_name: String,
  pub source: LoadSource,
}

/// Primary and fallback download hosts, package-scoped.
#[derive(Clone, Debug)]
pub struct RemoteHosts {
  primary: Url,
  fallback: Url,
}

impl RemoteHosts {
  pub fn new(primary: &str, fallback: &str) -> anyhow::Result<Self> {
    Ok(RemoteHosts {
      primary: parse_host(primary)?,
      fallback: parse_host(fallback)?,
    })
  }

  fn urls_for(&self, file_name: &str) -> (String, String) {
    // The bases are normalized with a trailing slash, so join cannot fail
    // for the flat file names output naming produces.
    let primary = self
      .primary
      .join(file_name)
      .map(String::from)
      .unwrap_or_default();
    let fallback = self
      .fallback
      .join(file_name)
      .map(String::from)
      .unwrap_or_default();
    (primary, fallback)
  }
}

fn parse_host(host: &str) -> anyhow::Result<Url> {
  let normalized = if host.ends_with('/') {
    host.to_string()
  } else {
    format!("{host}/")
  };
  Url::parse(&normalized).with_context(|| format!("invalid remote host '{host}'"))
}

/// Outcome of mapping a human-facing location to an asset record.
///
/// Misses are values, not errors: batch callers check `is_valid` and skip
/// just the offending entry.
#[derive(Clone, Debug)]
pub struct LocationResolution<'a> {
  pub location: String,
  asset: Option<&'a AssetRecord>,
  error: Option<String>,
}

impl<'a> LocationResolution<'a> {
  fn valid(location: &str, asset: &'a AssetRecord) -> Self {
    LocationResolution {
      location: location.to_string(),
      asset: Some(asset),
      error: None,
    }
  }

  fn invalid(location: &str, error: String) -> Self {
    LocationResolution {
      location: location.to_string(),
      asset: None,
      error: Some(error),
    }
  }

  pub fn is_valid(&self) -> bool {
    self.asset.is_some()
  }

  pub fn asset(&self) -> Option<&'a AssetRecord> {
    self.asset
  }

  /// Human-readable reason when the resolution is invalid.
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }
}

/// Pure, read-only query surface over one immutable decoded manifest.
///
/// Requires no locking once constructed; the manifest never changes under
/// it.
pub struct ResolverContext {
  manifest: DecodedManifest,
  cache: Arc<dyn CacheStore>,
  embedded: EmbeddedStore,
  hosts: RemoteHosts,
}

impl ResolverContext {
  pub fn new(
    manifest: DecodedManifest,
    cache: Arc<dyn CacheStore>,
    embedded: EmbeddedStore,
    hosts: RemoteHosts,
  ) -> Self {
    ResolverContext {
      manifest,
      cache,
      embedded,
      hosts,
    }
  }

  pub fn manifest(&self) -> &DecodedManifest {
    &self.manifest
  }

  /// Maps a location string to an asset record.
  ///
  /// With addressing enabled the location is an address; otherwise it is a
  /// path, falling back to a path-without-extension match.
  pub fn resolve_location<'a>(&'a self, location: &str) -> LocationResolution<'a> {
    let manifest = self.manifest.manifest();
    let asset = if manifest.enable_addressable {
      self.manifest.asset_by_address(location)
    } else {
      self
        .manifest
        .asset_by_path(location)
        .or_else(|| self.manifest.asset_by_stem(location))
    };

    match asset {
      Some(asset) => LocationResolution::valid(location, asset),
      None => LocationResolution::invalid(
        location,
        format!(
          "location '{}' does not map to any asset in package '{}'",
          location, manifest.package_name
        ),
      ),
    }
  }

  /// Classifies where a bundle's bytes come from, in priority order: local
  /// cache by content hash, then the embedded store, then remote.
  pub fn classify(&self, id: BundleId) -> Option<ResolvedBundle> {
    let manifest = self.manifest.manifest();
    let record = manifest.bundle(id)?;
    let output_file_name = record.output_file_name(manifest.output_name_style);

    let source = if self.cache.contains(&record.file_hash) {
      LoadSource::Cached
    } else if self.embedded.contains(&output_file_name) {
      LoadSource::Embedded
    } else {
      let (url, fallback_url) = self.hosts.urls_for(&output_file_name);
      LoadSource::Remote { url, fallback_url }
    };

    Some(ResolvedBundle {
      id,
      bundle_name: record.bundle_name.clone(),
      file_hash: record.file_hash.clone(),
      crc: record.crc,
      file_size: record.file_size,
      is_raw_file: record.is_raw_file,
      load_method: record.load_method,
      output_file_name,
      source,
    })
  }

  /// The asset's owning bundle plus every transitive bundle dependency.
  pub fn bundles_for_asset(&self, asset: &AssetRecord) -> Vec<BundleId> {
    let mut queue: VecDeque<BundleId> = VecDeque::new();
    let mut seen: HashSet<BundleId> = HashSet::new();
    let mut ordered: Vec<BundleId> = Vec::new();

    queue.push_back(asset.bundle_id);
    for id in &asset.depend_bundle_ids {
      queue.push_back(*id);
    }

    while let Some(id) = queue.pop_front() {
      if !seen.insert(id) {
        continue;
      }
      ordered.push(id);
      for dependency in self.manifest.dependencies_of(id) {
        queue.push_back(*dependency);
      }
    }

    ordered
  }
}
