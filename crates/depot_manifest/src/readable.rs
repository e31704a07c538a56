use anyhow::Context;
use depot_core::types::Manifest;

/// The human-diffable companion form of a manifest.
///
/// Build machines write it next to the binary form so packaging changes show
/// up in review; nothing at runtime consumes it.
pub fn to_readable_json(manifest: &Manifest) -> anyhow::Result<String> {
  serde_json::to_string_pretty(manifest).context("failed to serialize readable manifest")
}
