use serde::Deserialize;
use serde::Serialize;

/// Which collector produced an item.
///
/// Dependency-only collectors exist to pre-register content, but an item they
/// harvest is only kept when a main or static item actually reaches it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectorKind {
  #[default]
  MainAsset,
  StaticAsset,
  DependencyAsset,
}

impl CollectorKind {
  pub fn is_dependency_only(&self) -> bool {
    matches!(self, CollectorKind::DependencyAsset)
  }
}

/// One content unit as reported by the collector rules, keyed by a stable
/// path-like string.
///
/// `bundle_name` stays mutable (conceptually) until shared-bundle assignment
/// finalizes; an empty name on an implicit dependency means "not yet
/// assigned". `bundle_tags` propagate transitively to every bundle that
/// contains or depends on this item, `asset_tags` do not.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedItem {
  pub path: String,
  pub bundle_name: String,
  pub address: String,
  pub is_raw_file: bool,
  pub is_shader: bool,
  pub asset_tags: Vec<String>,
  pub bundle_tags: Vec<String>,
  pub depend_paths: Vec<String>,
  pub collector_kind: CollectorKind,
}

impl CollectedItem {
  /// Shorthand used all over the bundling tests.
  pub fn main(path: impl Into<String>, bundle_name: impl Into<String>) -> Self {
    CollectedItem {
      path: path.into(),
      bundle_name: bundle_name.into(),
      ..CollectedItem::default()
    }
  }

  pub fn with_address(mut self, address: impl Into<String>) -> Self {
    self.address = address.into();
    self
  }

  pub fn with_depend_paths(mut self, depend_paths: Vec<&str>) -> Self {
    self.depend_paths = depend_paths.into_iter().map(String::from).collect();
    self
  }

  pub fn with_tags(mut self, tags: Vec<&str>) -> Self {
    let tags: Vec<String> = tags.into_iter().map(String::from).collect();
    self.asset_tags = tags.clone();
    self.bundle_tags = tags;
    self
  }

  pub fn raw(mut self) -> Self {
    self.is_raw_file = true;
    self
  }
}
