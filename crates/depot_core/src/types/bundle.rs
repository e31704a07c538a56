use serde::Deserialize;
use serde::Serialize;

use crate::hash::ContentHash;

/// How a bundle payload must be opened at load time.
///
/// Transform variants are applied post-hoc by external steps (for example an
/// encryption pass); the pipeline itself only records which one was used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadMethod {
  #[default]
  Normal,
  OffsetHeader,
  Encrypted,
}

impl LoadMethod {
  pub fn to_byte(self) -> u8 {
    match self {
      LoadMethod::Normal => 0,
      LoadMethod::OffsetHeader => 1,
      LoadMethod::Encrypted => 2,
    }
  }

  pub fn from_byte(value: u8) -> Option<Self> {
    match value {
      0 => Some(LoadMethod::Normal),
      1 => Some(LoadMethod::OffsetHeader),
      2 => Some(LoadMethod::Encrypted),
      _ => None,
    }
  }
}

/// Naming scheme for compiled bundle files on disk and on remote hosts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputNameStyle {
  #[default]
  HashName,
  BundleName,
  BundleNameWithHash,
}

impl OutputNameStyle {
  pub fn to_i32(self) -> i32 {
    match self {
      OutputNameStyle::HashName => 0,
      OutputNameStyle::BundleName => 1,
      OutputNameStyle::BundleNameWithHash => 2,
    }
  }

  pub fn from_i32(value: i32) -> Option<Self> {
    match value {
      0 => Some(OutputNameStyle::HashName),
      1 => Some(OutputNameStyle::BundleName),
      2 => Some(OutputNameStyle::BundleNameWithHash),
      _ => None,
    }
  }

  /// The concrete file name a compiled bundle is stored under.
  ///
  /// Bundle names are path-like ("chars/hero"), so separators are flattened
  /// before they become file names.
  pub fn output_file_name(&self, bundle_name: &str, file_hash: &ContentHash) -> String {
    let flat_name = bundle_name.replace(['/', '\\'], "_");
    match self {
      OutputNameStyle::HashName => format!("{}.bundle", file_hash),
      OutputNameStyle::BundleName => format!("{}.bundle", flat_name),
      OutputNameStyle::BundleNameWithHash => format!("{}_{}.bundle", flat_name, file_hash),
    }
  }
}

/// A named, deployable grouping of items produced by one build pass.
///
/// The hash/CRC/size fields stay at their defaults until the external bundle
/// compiler reports payload metadata back.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildBundle {
  pub bundle_name: String,

  /// Ordered, duplicate-free member item paths. Raw bundles hold exactly one.
  pub item_paths: Vec<String>,

  pub is_raw_file: bool,
  pub file_hash: ContentHash,
  pub crc: u32,
  pub file_size: u64,
  pub output_file_path: String,
  pub package_file_path: String,
  pub load_method: LoadMethod,

  /// Union of the tags of every contained item.
  pub tags: Vec<String>,
}

impl BuildBundle {
  pub fn new(bundle_name: impl Into<String>) -> Self {
    BuildBundle {
      bundle_name: bundle_name.into(),
      ..BuildBundle::default()
    }
  }

  /// Appends an item, keeping the member list duplicate-free and the tag set
  /// a sorted union.
  pub fn push_item(&mut self, path: &str, is_raw_file: bool, tags: &[String]) {
    if self.item_paths.iter().any(|existing| existing == path) {
      return;
    }
    self.item_paths.push(path.to_string());
    self.is_raw_file |= is_raw_file;
    for tag in tags {
      if !self.tags.contains(tag) {
        self.tags.push(tag.clone());
      }
    }
    self.tags.sort();
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn push_item_deduplicates_members_and_unions_tags() {
    let mut bundle = BuildBundle::new("chars/hero");

    bundle.push_item("hero.prefab", false, &["chars".into()]);
    bundle.push_item("hero.prefab", false, &["chars".into()]);
    bundle.push_item("hero.mat", false, &["mats".into(), "chars".into()]);

    assert_eq!(bundle.item_paths, vec!["hero.prefab", "hero.mat"]);
    assert_eq!(bundle.tags, vec!["chars", "mats"]);
    assert!(!bundle.is_raw_file);
  }

  #[test]
  fn output_file_name_follows_style() {
    let hash = ContentHash::from_hex("abcd");

    assert_eq!(
      OutputNameStyle::HashName.output_file_name("chars/hero", &hash),
      "abcd.bundle"
    );
    assert_eq!(
      OutputNameStyle::BundleName.output_file_name("chars/hero", &hash),
      "chars_hero.bundle"
    );
    assert_eq!(
      OutputNameStyle::BundleNameWithHash.output_file_name("chars/hero", &hash),
      "chars_hero_abcd.bundle"
    );
  }

  #[test]
  fn load_method_byte_round_trip() {
    for method in [
      LoadMethod::Normal,
      LoadMethod::OffsetHeader,
      LoadMethod::Encrypted,
    ] {
      assert_eq!(LoadMethod::from_byte(method.to_byte()), Some(method));
    }
    assert_eq!(LoadMethod::from_byte(9), None);
  }
}
