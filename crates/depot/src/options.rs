use std::path::PathBuf;

use depot_core::types::LoadMethod;
use depot_core::types::OutputNameStyle;
use serde::Deserialize;
use serde::Serialize;

/// Options for one package build, as loaded from build configuration or
/// passed programmatically.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageBuildOptions {
  pub package_name: String,
  pub package_version: String,

  /// When enabled, every main asset gets a user-facing address that must be
  /// unique within the package.
  pub enable_addressable: bool,

  pub output_name_style: OutputNameStyle,

  /// Key into the share rule registry.
  pub share_rule: String,

  /// Scope shared bundle names to this package so two packages sharing a
  /// host directory cannot collide.
  pub force_unique_names: bool,

  /// Bundle that all shader-like content is routed to.
  pub shader_bundle_name: String,

  pub load_method: LoadMethod,

  /// Directory the manifest artifacts are written to.
  pub output_directory: PathBuf,
}

impl Default for PackageBuildOptions {
  fn default() -> Self {
    PackageBuildOptions {
      package_name: String::new(),
      package_version: String::new(),
      enable_addressable: false,
      output_name_style: OutputNameStyle::default(),
      share_rule: "share-by-directory".into(),
      force_unique_names: false,
      shader_bundle_name: "share_shaders".into(),
      load_method: LoadMethod::default(),
      output_directory: PathBuf::from("output"),
    }
  }
}
