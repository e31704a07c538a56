use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use depot_core::hash::ContentHash;
use depot_core::types::Manifest;
use depot_filesystem::FileSystem;

use crate::binary::decode;
use crate::binary::encode;
use crate::binary::DecodedManifest;
use crate::readable::to_readable_json;

/// Paths of everything one manifest write produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFiles {
  pub binary: PathBuf,
  pub readable: PathBuf,
  pub hash: PathBuf,
  pub version: PathBuf,
}

fn manifest_stem(package_name: &str, package_version: &str) -> String {
  format!("{package_name}_{package_version}")
}

/// Writes the four manifest artifacts: the canonical binary form, the
/// human-diffable JSON form, the hash file guarding the binary form, and the
/// plain-string package version file.
#[tracing::instrument(level = "debug", skip_all, fields(package = %manifest.package_name))]
pub fn write_manifest_files(
  fs: &dyn FileSystem,
  directory: &Path,
  manifest: &Manifest,
) -> anyhow::Result<ManifestFiles> {
  fs.create_dir_all(directory)
    .with_context(|| format!("failed to create manifest directory {directory:?}"))?;

  let stem = manifest_stem(&manifest.package_name, &manifest.package_version);
  let files = ManifestFiles {
    binary: directory.join(format!("{stem}.manifest")),
    readable: directory.join(format!("{stem}.json")),
    hash: directory.join(format!("{stem}.hash")),
    version: directory.join(format!("{}.version", manifest.package_name)),
  };

  let binary = encode(manifest);
  let hash = ContentHash::of(&binary);

  fs.write(&files.binary, &binary)
    .with_context(|| format!("failed to write {:?}", files.binary))?;
  fs.write(&files.readable, to_readable_json(manifest)?.as_bytes())
    .with_context(|| format!("failed to write {:?}", files.readable))?;
  fs.write(&files.hash, hash.as_str().as_bytes())
    .with_context(|| format!("failed to write {:?}", files.hash))?;
  fs.write(&files.version, manifest.package_version.as_bytes())
    .with_context(|| format!("failed to write {:?}", files.version))?;

  Ok(files)
}

/// The current package version recorded next to the manifests, if any.
pub fn read_package_version(
  fs: &dyn FileSystem,
  directory: &Path,
  package_name: &str,
) -> Option<String> {
  let path = directory.join(format!("{package_name}.version"));
  fs.read_to_string(&path)
    .ok()
    .map(|version| version.trim().to_string())
}

/// Loads a previously cached manifest, trusting it only if its hash file
/// matches the recomputed content hash.
///
/// A missing or mismatching hash file means the cache entry is stale or
/// corrupt: the pair is deleted and `None` is returned so the caller falls
/// back to the embedded or remote copy. Decode failures on a hash-verified
/// manifest are real format errors and propagate.
#[tracing::instrument(level = "debug", skip_all, fields(package = package_name))]
pub fn load_cached_manifest(
  fs: &dyn FileSystem,
  directory: &Path,
  package_name: &str,
  package_version: &str,
) -> anyhow::Result<Option<DecodedManifest>> {
  let stem = manifest_stem(package_name, package_version);
  let binary_path = directory.join(format!("{stem}.manifest"));
  let hash_path = directory.join(format!("{stem}.hash"));

  let Ok(binary) = fs.read(&binary_path) else {
    return Ok(None);
  };
  let stored_hash = fs.read_to_string(&hash_path).ok();

  let recomputed = ContentHash::of(&binary);
  if stored_hash.as_deref().map(str::trim) != Some(recomputed.as_str()) {
    tracing::warn!(
      package = package_name,
      "Cached manifest failed its hash check, discarding it"
    );
    let _ = fs.remove_file(&binary_path);
    let _ = fs.remove_file(&hash_path);
    return Ok(None);
  }

  decode(&binary).map(Some)
}
