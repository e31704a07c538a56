use std::collections::HashMap;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use depot_core::hash::ContentHash;
use depot_core::types::AssetRecord;
use depot_core::types::BundleId;
use depot_core::types::BundleRecord;
use depot_core::types::LoadMethod;
use depot_core::types::Manifest;
use depot_core::types::OutputNameStyle;

use crate::MANIFEST_SIGNATURE;
use crate::FORMAT_VERSION;
use crate::SUPPORTED_VERSIONS;

/// Serializes a manifest into the canonical binary layout.
///
/// The layout is fixed and byte-for-byte deterministic: the same manifest
/// always encodes to the same bytes, which is what makes the binary form
/// usable as a hashing/identity input.
pub fn encode(manifest: &Manifest) -> Vec<u8> {
  let mut out = Vec::new();
  // Writes into a Vec cannot fail, so unwraps below are safe.
  out.write_u32::<LittleEndian>(MANIFEST_SIGNATURE).unwrap();
  write_string(&mut out, FORMAT_VERSION);
  out.write_u8(manifest.enable_addressable as u8).unwrap();
  out
    .write_i32::<LittleEndian>(manifest.output_name_style.to_i32())
    .unwrap();
  write_string(&mut out, &manifest.package_name);
  write_string(&mut out, &manifest.package_version);

  out
    .write_i32::<LittleEndian>(manifest.assets.len() as i32)
    .unwrap();
  for asset in &manifest.assets {
    write_string(&mut out, &asset.address);
    write_string(&mut out, &asset.path);
    write_string_list(&mut out, &asset.tags);
    out
      .write_i32::<LittleEndian>(asset.bundle_id.index() as i32)
      .unwrap();
    write_id_list(&mut out, &asset.depend_bundle_ids);
  }

  out
    .write_i32::<LittleEndian>(manifest.bundles.len() as i32)
    .unwrap();
  for bundle in &manifest.bundles {
    write_string(&mut out, &bundle.bundle_name);
    write_string(&mut out, bundle.file_hash.as_str());
    out.write_u32::<LittleEndian>(bundle.crc).unwrap();
    out.write_i64::<LittleEndian>(bundle.file_size as i64).unwrap();
    out.write_u8(bundle.is_raw_file as u8).unwrap();
    out.write_u8(bundle.load_method.to_byte()).unwrap();
    write_string_list(&mut out, &bundle.tags);
    write_id_list(&mut out, &bundle.reference_ids);
  }

  out
}

fn write_string(out: &mut Vec<u8>, value: &str) {
  out
    .write_i32::<LittleEndian>(value.len() as i32)
    .unwrap();
  out.write_all(value.as_bytes()).unwrap();
}

fn write_string_list(out: &mut Vec<u8>, values: &[String]) {
  out.write_i32::<LittleEndian>(values.len() as i32).unwrap();
  for value in values {
    write_string(out, value);
  }
}

fn write_id_list(out: &mut Vec<u8>, ids: &[BundleId]) {
  out.write_i32::<LittleEndian>(ids.len() as i32).unwrap();
  for id in ids {
    out.write_i32::<LittleEndian>(id.index() as i32).unwrap();
  }
}

/// A decoded manifest plus the lookup indices rebuilt during decoding.
///
/// Read-only once constructed; every runtime query runs against this.
#[derive(Debug)]
pub struct DecodedManifest {
  manifest: Manifest,
  asset_by_path: HashMap<String, usize>,
  asset_by_address: HashMap<String, usize>,
  bundle_by_name: HashMap<String, usize>,

  /// Path-without-extension fallback lookup. `None` marks a stem shared by
  /// more than one asset, which resolves as a miss.
  asset_by_stem: HashMap<String, Option<usize>>,

  /// Forward dependency edges per bundle, derived by inverting the persisted
  /// reference lists.
  forward_dependencies: Vec<Vec<BundleId>>,
}

impl DecodedManifest {
  pub fn manifest(&self) -> &Manifest {
    &self.manifest
  }

  pub fn asset_by_path(&self, path: &str) -> Option<&AssetRecord> {
    self
      .asset_by_path
      .get(path)
      .map(|index| &self.manifest.assets[*index])
  }

  pub fn asset_by_address(&self, address: &str) -> Option<&AssetRecord> {
    self
      .asset_by_address
      .get(address)
      .map(|index| &self.manifest.assets[*index])
  }

  pub fn asset_by_stem(&self, stem: &str) -> Option<&AssetRecord> {
    match self.asset_by_stem.get(stem) {
      Some(Some(index)) => Some(&self.manifest.assets[*index]),
      _ => None,
    }
  }

  pub fn bundle_by_name(&self, name: &str) -> Option<(BundleId, &BundleRecord)> {
    self.bundle_by_name.get(name).map(|index| {
      (
        BundleId::from_index(*index),
        &self.manifest.bundles[*index],
      )
    })
  }

  /// Bundles the given bundle directly depends on.
  pub fn dependencies_of(&self, id: BundleId) -> &[BundleId] {
    &self.forward_dependencies[id.index()]
  }
}

/// Decodes and validates the binary layout.
///
/// Signature and format version are checked first and fail fast; nothing of
/// a partially-read manifest escapes this function on error.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
pub fn decode(bytes: &[u8]) -> anyhow::Result<DecodedManifest> {
  let mut reader = Cursor::new(bytes);

  let signature = reader
    .read_u32::<LittleEndian>()
    .context("manifest is truncated before the signature")?;
  if signature != MANIFEST_SIGNATURE {
    bail!(
      "invalid manifest signature {signature:#010x}, expected {:#010x}",
      MANIFEST_SIGNATURE
    );
  }

  let version = read_string(&mut reader)?;
  if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
    bail!("unsupported manifest format version '{version}'");
  }

  let enable_addressable = reader.read_u8()? != 0;
  let output_name_style = OutputNameStyle::from_i32(reader.read_i32::<LittleEndian>()?)
    .ok_or_else(|| anyhow!("invalid output name style"))?;
  let package_name = read_string(&mut reader)?;
  let package_version = read_string(&mut reader)?;

  let asset_count = read_count(&mut reader, "asset")?;
  let mut assets = Vec::with_capacity(asset_count);
  for _ in 0..asset_count {
    let address = read_string(&mut reader)?;
    let path = read_string(&mut reader)?;
    let tags = read_string_list(&mut reader)?;
    let bundle_id = read_id(&mut reader)?;
    let depend_bundle_ids = read_id_list(&mut reader)?;
    assets.push(AssetRecord {
      address,
      path,
      tags,
      bundle_id,
      depend_bundle_ids,
    });
  }

  let bundle_count = read_count(&mut reader, "bundle")?;
  let mut bundles = Vec::with_capacity(bundle_count);
  for _ in 0..bundle_count {
    let bundle_name = read_string(&mut reader)?;
    let file_hash = ContentHash::from_hex(read_string(&mut reader)?);
    let crc = reader.read_u32::<LittleEndian>()?;
    let file_size = reader.read_i64::<LittleEndian>()?;
    if file_size < 0 {
      bail!("bundle '{bundle_name}' has negative file size");
    }
    let is_raw_file = reader.read_u8()? != 0;
    let load_method = LoadMethod::from_byte(reader.read_u8()?)
      .ok_or_else(|| anyhow!("bundle '{bundle_name}' has an invalid load method"))?;
    let tags = read_string_list(&mut reader)?;
    let reference_ids = read_id_list(&mut reader)?;
    bundles.push(BundleRecord {
      bundle_name,
      file_hash,
      crc,
      file_size: file_size as u64,
      is_raw_file,
      load_method,
      tags,
      reference_ids,
    });
  }

  let manifest = Manifest {
    enable_addressable,
    output_name_style,
    package_name,
    package_version,
    assets,
    bundles,
  };
  manifest.validate()?;

  index(manifest)
}

/// Decode off the caller's execution context. One suspension point; the
/// result is only observable after the blocking task rejoins.
pub async fn decode_async(bytes: Vec<u8>) -> anyhow::Result<DecodedManifest> {
  tokio::task::spawn_blocking(move || decode(&bytes))
    .await
    .context("manifest decode task failed")?
}

fn index(manifest: Manifest) -> anyhow::Result<DecodedManifest> {
  let mut asset_by_path = HashMap::new();
  let mut asset_by_address = HashMap::new();
  let mut asset_by_stem: HashMap<String, Option<usize>> = HashMap::new();
  for (idx, asset) in manifest.assets.iter().enumerate() {
    if asset_by_path.insert(asset.path.clone(), idx).is_some() {
      bail!("manifest contains duplicate asset path '{}'", asset.path);
    }
    if !asset.address.is_empty()
      && asset_by_address.insert(asset.address.clone(), idx).is_some()
    {
      bail!("manifest contains duplicate address '{}'", asset.address);
    }
    let stem = match asset.path.rsplit_once('.') {
      Some((stem, _)) if !stem.is_empty() => stem.to_string(),
      _ => asset.path.clone(),
    };
    asset_by_stem
      .entry(stem)
      .and_modify(|existing| *existing = None)
      .or_insert(Some(idx));
  }

  let mut bundle_by_name = HashMap::new();
  for (idx, bundle) in manifest.bundles.iter().enumerate() {
    if bundle_by_name
      .insert(bundle.bundle_name.clone(), idx)
      .is_some()
    {
      bail!(
        "manifest contains duplicate bundle name '{}'",
        bundle.bundle_name
      );
    }
  }

  let mut forward_dependencies: Vec<Vec<BundleId>> = vec![Vec::new(); manifest.bundles.len()];
  for (idx, bundle) in manifest.bundles.iter().enumerate() {
    let target = BundleId::from_index(idx);
    for referencer in &bundle.reference_ids {
      let forward = &mut forward_dependencies[referencer.index()];
      if !forward.contains(&target) {
        forward.push(target);
      }
    }
  }

  Ok(DecodedManifest {
    manifest,
    asset_by_path,
    asset_by_address,
    bundle_by_name,
    asset_by_stem,
    forward_dependencies,
  })
}

fn read_string(reader: &mut Cursor<&[u8]>) -> anyhow::Result<String> {
  let length = reader.read_i32::<LittleEndian>()?;
  if length < 0 {
    bail!("manifest contains a negative string length");
  }
  let length = length as usize;
  let remaining = reader.get_ref().len() - reader.position() as usize;
  if length > remaining {
    bail!("manifest string runs past the end of the buffer");
  }
  let mut buffer = vec![0u8; length];
  reader.read_exact(&mut buffer)?;
  String::from_utf8(buffer).context("manifest string is not valid UTF-8")
}

fn read_string_list(reader: &mut Cursor<&[u8]>) -> anyhow::Result<Vec<String>> {
  let count = read_count(reader, "string")?;
  let mut values = Vec::with_capacity(count);
  for _ in 0..count {
    values.push(read_string(reader)?);
  }
  Ok(values)
}

fn read_id(reader: &mut Cursor<&[u8]>) -> anyhow::Result<BundleId> {
  let value = reader.read_i32::<LittleEndian>()?;
  if value < 0 {
    bail!("manifest contains a negative bundle id");
  }
  Ok(BundleId::from_index(value as usize))
}

fn read_id_list(reader: &mut Cursor<&[u8]>) -> anyhow::Result<Vec<BundleId>> {
  let count = read_count(reader, "id")?;
  let mut ids = Vec::with_capacity(count);
  for _ in 0..count {
    ids.push(read_id(reader)?);
  }
  Ok(ids)
}

fn read_count(reader: &mut Cursor<&[u8]>, what: &str) -> anyhow::Result<usize> {
  let count = reader.read_i32::<LittleEndian>()?;
  if count < 0 {
    bail!("manifest contains a negative {what} count");
  }
  Ok(count as usize)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn sample_manifest() -> Manifest {
    Manifest {
      enable_addressable: true,
      output_name_style: OutputNameStyle::BundleNameWithHash,
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
          address: "B".into(),
          path: "b.prefab".into(),
          tags: vec![],
          bundle_id: BundleId::from_index(1),
          depend_bundle_ids: vec![BundleId::from_index(2)],
        },
      ],
      bundles: vec![
        BundleRecord {
          bundle_name: "bundle_a".into(),
          file_hash: ContentHash::of(b"bundle_a payload"),
          crc: 7,
          file_size: 1024,
          is_raw_file: false,
          load_method: LoadMethod::Normal,
          tags: vec!["chars".into()],
          reference_ids: vec![],
        },
        BundleRecord {
          bundle_name: "bundle_b".into(),
          file_hash: ContentHash::of(b"bundle_b payload"),
          crc: 8,
          file_size: 2048,
          is_raw_file: false,
          load_method: LoadMethod::Normal,
          tags: vec![],
          reference_ids: vec![],
        },
        BundleRecord {
          bundle_name: "share_c".into(),
          file_hash: ContentHash::of(b"share_c payload"),
          crc: 9,
          file_size: 128,
          is_raw_file: false,
          load_method: LoadMethod::Encrypted,
          tags: vec![],
          reference_ids: vec![BundleId::from_index(0), BundleId::from_index(1)],
        },
      ],
    }
  }

  #[test]
  fn encoding_is_deterministic() {
    let manifest = sample_manifest();
    assert_eq!(encode(&manifest), encode(&manifest));
  }

  #[test]
  fn encode_then_decode_round_trips() {
    let manifest = sample_manifest();
    let decoded = decode(&encode(&manifest)).unwrap();

    assert_eq!(decoded.manifest(), &manifest);
  }

  #[test]
  fn decode_rebuilds_lookup_indices() {
    let decoded = decode(&encode(&sample_manifest())).unwrap();

    assert_eq!(
      decoded.asset_by_path("a.prefab").map(|a| a.address.as_str()),
      Some("A")
    );
    assert_eq!(
      decoded.asset_by_address("B").map(|a| a.path.as_str()),
      Some("b.prefab")
    );
    assert_eq!(
      decoded.asset_by_stem("a").map(|a| a.path.as_str()),
      Some("a.prefab")
    );
    let (id, bundle) = decoded.bundle_by_name("share_c").unwrap();
    assert_eq!(id, BundleId::from_index(2));
    assert_eq!(bundle.crc, 9);
  }

  #[test]
  fn decode_derives_forward_dependencies_from_reference_ids() {
    let decoded = decode(&encode(&sample_manifest())).unwrap();

    assert_eq!(
      decoded.dependencies_of(BundleId::from_index(0)),
      &[BundleId::from_index(2)]
    );
    assert_eq!(
      decoded.dependencies_of(BundleId::from_index(1)),
      &[BundleId::from_index(2)]
    );
    assert_eq!(decoded.dependencies_of(BundleId::from_index(2)), &[]);
  }

  #[test]
  fn bad_signature_fails_with_a_format_error() {
    let mut bytes = encode(&sample_manifest());
    bytes[0] ^= 0xff;

    let error = decode(&bytes).unwrap_err();
    assert!(error.to_string().contains("signature"), "{error}");
  }

  #[test]
  fn unsupported_version_fails_fast() {
    let manifest = sample_manifest();
    let mut bytes = Vec::new();
    byteorder::WriteBytesExt::write_u32::<LittleEndian>(&mut bytes, MANIFEST_SIGNATURE).unwrap();
    super::write_string(&mut bytes, "0.9.0");
    bytes.extend_from_slice(&encode(&manifest)[4 + 4 + FORMAT_VERSION.len()..]);

    let error = decode(&bytes).unwrap_err();
    assert!(error.to_string().contains("0.9.0"), "{error}");
  }

  #[test]
  fn truncated_buffer_is_rejected() {
    let bytes = encode(&sample_manifest());

    assert!(decode(&bytes[..bytes.len() - 5]).is_err());
  }

  #[test]
  fn duplicate_asset_paths_are_rejected() {
    let mut manifest = sample_manifest();
    manifest.assets[1].path = "a.prefab".into();
    manifest.assets[1].address = String::new();

    let error = decode(&encode(&manifest)).unwrap_err();
    assert!(error.to_string().contains("duplicate asset path"), "{error}");
  }

  #[test]
  fn ambiguous_stems_resolve_as_a_miss() {
    let mut manifest = sample_manifest();
    manifest.assets[1].path = "a.mat".into();

    let decoded = decode(&encode(&manifest)).unwrap();
    assert!(decoded.asset_by_stem("a").is_none());
  }

  #[tokio::test]
  async fn decode_async_rejoins_with_the_decoded_manifest() {
    let manifest = sample_manifest();
    let decoded = decode_async(encode(&manifest)).await.unwrap();

    assert_eq!(decoded.manifest(), &manifest);
  }
}
