use anyhow::anyhow;
use serde::Deserialize;
use serde::Serialize;

use crate::hash::ContentHash;
use crate::types::LoadMethod;
use crate::types::OutputNameStyle;

/// Stable index of a bundle record inside one manifest instance.
///
/// Ids are raw array indices on the wire; this wrapper keeps them opaque in
/// the API so an id fished out of one manifest is never silently indexed into
/// another (all lookups go through [`Manifest`] accessors that bounds-check).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BundleId(u32);

impl BundleId {
  pub fn from_index(index: usize) -> Self {
    BundleId(index as u32)
  }

  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

impl Default for BundleId {
  fn default() -> Self {
    BundleId(0)
  }
}

/// One tracked content unit in a persisted manifest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
  pub address: String,
  pub path: String,
  pub tags: Vec<String>,

  /// The bundle this asset is packed into.
  pub bundle_id: BundleId,

  /// Bundles holding this asset's direct dependencies.
  pub depend_bundle_ids: Vec<BundleId>,
}

/// One deployable bundle in a persisted manifest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRecord {
  pub bundle_name: String,
  pub file_hash: ContentHash,
  pub crc: u32,
  pub file_size: u64,
  pub is_raw_file: bool,
  pub load_method: LoadMethod,
  pub tags: Vec<String>,

  /// Bundles that depend on this one (inverse edges, stored so a consumer
  /// can answer "if I evict bundle X, who breaks").
  pub reference_ids: Vec<BundleId>,
}

impl BundleRecord {
  pub fn output_file_name(&self, style: OutputNameStyle) -> String {
    style.output_file_name(&self.bundle_name, &self.file_hash)
  }
}

/// The durable, versioned artifact describing one (package, version) pair.
///
/// Immutable once loaded; a new package version gets a whole new manifest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
  pub enable_addressable: bool,
  pub output_name_style: OutputNameStyle,
  pub package_name: String,
  pub package_version: String,
  pub assets: Vec<AssetRecord>,
  pub bundles: Vec<BundleRecord>,
}

impl Manifest {
  pub fn bundle(&self, id: BundleId) -> Option<&BundleRecord> {
    self.bundles.get(id.index())
  }

  pub fn bundle_ids(&self) -> impl Iterator<Item = BundleId> + '_ {
    (0..self.bundles.len()).map(BundleId::from_index)
  }

  /// Every cross-reference id must be a valid index into the bundle table,
  /// otherwise the manifest is malformed.
  pub fn validate(&self) -> anyhow::Result<()> {
    let bundle_count = self.bundles.len();
    let check = |id: BundleId, owner: &str| {
      if id.index() >= bundle_count {
        return Err(anyhow!(
          "manifest for package '{}' is malformed: {} references bundle id {} but only {} bundles exist",
          self.package_name,
          owner,
          id.index(),
          bundle_count
        ));
      }
      Ok(())
    };

    for asset in &self.assets {
      check(asset.bundle_id, &format!("asset '{}'", asset.path))?;
      for id in &asset.depend_bundle_ids {
        check(*id, &format!("asset '{}'", asset.path))?;
      }
    }
    for bundle in &self.bundles {
      for id in &bundle.reference_ids {
        check(*id, &format!("bundle '{}'", bundle.bundle_name))?;
      }
    }
    Ok(())
  }
}
