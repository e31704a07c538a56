use std::collections::HashMap;
use std::collections::HashSet;

use anyhow::anyhow;
use anyhow::Context;
use depot_bundling::assign;
use depot_bundling::build_reference_ids_with_shader_fold;
use depot_bundling::build_table;
use depot_bundling::expand;
use depot_bundling::assign::AssignOptions;
use depot_bundling::assign::ShareRuleRegistry;
use depot_bundling::references::DirectDependencyReport;
use depot_core::types::AssetRecord;
use depot_core::types::BundleId;
use depot_core::types::BundleRecord;
use depot_core::types::CollectedItem;
use depot_core::types::Manifest;
use depot_core::Diagnostic;
use depot_filesystem::FileSystem;
use depot_manifest::write_manifest_files;
use depot_manifest::ManifestFiles;

use crate::compiler::BundleCompiler;
use crate::options::PackageBuildOptions;

/// Everything one successful package build produces.
#[derive(Debug)]
pub struct BuildOutput {
  pub manifest: Manifest,
  pub files: ManifestFiles,
}

/// Runs the whole build pipeline as an ordered sequence of synchronous
/// steps: expand, assign, build the bundle table, compile, build the
/// reference graph, assemble and persist the manifest.
///
/// Each step either completes fully or aborts the rest of the sequence;
/// there is no partial-success continuation.
#[tracing::instrument(level = "info", skip_all, fields(package = %options.package_name))]
pub fn build_package(
  options: &PackageBuildOptions,
  items: Vec<CollectedItem>,
  compiler: &dyn BundleCompiler,
  fs: &dyn FileSystem,
) -> anyhow::Result<BuildOutput> {
  let registry = ShareRuleRegistry::new();
  let share_rule = registry.resolve(&options.share_rule)?;

  let graph = expand(items)?;
  let assignment = assign(
    &graph,
    &AssignOptions {
      package_name: options.package_name.clone(),
      share_rule,
      force_unique_names: options.force_unique_names,
      shader_bundle_name: options.shader_bundle_name.clone(),
    },
  )?;
  let mut table = build_table(&graph, &assignment)?;

  let compiled = compiler
    .compile(&table, &graph)
    .context("bundle compiler failed")?;
  let compiled_by_name: HashMap<&str, &crate::compiler::CompiledBundle> = compiled
    .iter()
    .map(|bundle| (bundle.bundle_name.as_str(), bundle))
    .collect();

  // Fold the compiler's payload metadata back into the table.
  for bundle in table.bundles_mut() {
    let compiled = compiled_by_name.get(bundle.bundle_name.as_str()).ok_or_else(|| {
      anyhow!(Diagnostic::new(format!(
        "compiler reported no result for bundle '{}'",
        bundle.bundle_name
      ))
      .with_origin("depot::build"))
    })?;
    bundle.file_hash = compiled.file_hash.clone();
    bundle.crc = compiled.crc;
    bundle.file_size = compiled.file_size;
    bundle.load_method = options.load_method;

    let file_name = options
      .output_name_style
      .output_file_name(&bundle.bundle_name, &bundle.file_hash);
    bundle.output_file_path = options
      .output_directory
      .join(&file_name)
      .to_string_lossy()
      .into_owned();
    bundle.package_file_path = file_name;
  }

  let bundle_names: Vec<String> = table
    .bundles()
    .iter()
    .map(|bundle| bundle.bundle_name.clone())
    .collect();
  let bundle_id_by_name: HashMap<&str, BundleId> = bundle_names
    .iter()
    .enumerate()
    .map(|(index, name)| (name.as_str(), BundleId::from_index(index)))
    .collect();

  let mut direct_dependencies = DirectDependencyReport::new();
  for compiled in &compiled {
    direct_dependencies.insert(
      compiled.bundle_name.clone(),
      compiled.direct_dependencies.clone(),
    );
  }
  let reference_ids = build_reference_ids_with_shader_fold(
    &bundle_names,
    &direct_dependencies,
    &options.shader_bundle_name,
    &compiler.shader_dependents(),
  )?;

  // Asset records, in item registration order, for every packed item.
  let mut assets: Vec<AssetRecord> = Vec::new();
  let mut seen_addresses: HashSet<&str> = HashSet::new();
  for (index, expanded) in graph.items().iter().enumerate() {
    let Some(owner) = assignment.placement(index).bundle_name() else {
      continue;
    };
    let bundle_id = *bundle_id_by_name.get(owner).ok_or_else(|| {
      anyhow!(Diagnostic::new(format!(
        "item '{}' is assigned to unknown bundle '{}'",
        expanded.item.path, owner
      ))
      .with_origin("depot::build"))
    })?;

    if options.enable_addressable
      && !expanded.item.address.is_empty()
      && !seen_addresses.insert(expanded.item.address.as_str())
    {
      return Err(anyhow!(Diagnostic::new(format!(
        "address '{}' is used by more than one item",
        expanded.item.address
      ))
      .with_origin("depot::build")
      .with_hint("addresses must be unique within a package")));
    }

    let mut depend_bundle_ids: Vec<BundleId> = Vec::new();
    for depend_index in &expanded.depend_indices {
      let depend_path = &graph.item(*depend_index).item.path;
      let Some(depend_owner) = table.owner_of(depend_path) else {
        continue;
      };
      let depend_id = bundle_id_by_name[depend_owner];
      if depend_id != bundle_id && !depend_bundle_ids.contains(&depend_id) {
        depend_bundle_ids.push(depend_id);
      }
    }

    let mut tags = expanded.item.asset_tags.clone();
    for tag in &expanded.item.bundle_tags {
      if !tags.contains(tag) {
        tags.push(tag.clone());
      }
    }

    assets.push(AssetRecord {
      address: expanded.item.address.clone(),
      path: expanded.item.path.clone(),
      tags,
      bundle_id,
      depend_bundle_ids,
    });
  }

  let bundles: Vec<BundleRecord> = table
    .bundles()
    .iter()
    .zip(reference_ids)
    .map(|(bundle, reference_ids)| BundleRecord {
      bundle_name: bundle.bundle_name.clone(),
      file_hash: bundle.file_hash.clone(),
      crc: bundle.crc,
      file_size: bundle.file_size,
      is_raw_file: bundle.is_raw_file,
      load_method: bundle.load_method,
      tags: bundle.tags.clone(),
      reference_ids,
    })
    .collect();

  let manifest = Manifest {
    enable_addressable: options.enable_addressable,
    output_name_style: options.output_name_style,
    package_name: options.package_name.clone(),
    package_version: options.package_version.clone(),
    assets,
    bundles,
  };
  manifest.validate()?;

  let files = write_manifest_files(fs, &options.output_directory, &manifest)?;
  tracing::info!(
    bundles = manifest.bundles.len(),
    assets = manifest.assets.len(),
    "Built package manifest"
  );

  Ok(BuildOutput { manifest, files })
}
