use std::collections::HashSet;

use depot_bundling::ExpandedGraph;
use depot_bundling::BuildBundleTable;
use depot_core::hash::crc32;
use depot_core::hash::ContentHash;

/// Per-bundle result reported back by the bundle compiler.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledBundle {
  pub bundle_name: String,
  pub file_hash: ContentHash,
  pub crc: u32,
  pub file_size: u64,

  /// Direct bundle-name dependencies discovered while compiling.
  pub direct_dependencies: Vec<String>,
}

/// The external compiler boundary: a pure function from the final bundle
/// table to compiled payload metadata. Payload bytes land on disk outside
/// this seam.
pub trait BundleCompiler {
  fn compile(
    &self,
    table: &BuildBundleTable,
    graph: &ExpandedGraph,
  ) -> anyhow::Result<Vec<CompiledBundle>>;

  /// Bundles known to depend on built-in shader content the collector
  /// cannot see directly. Empty unless the compiler tracks it.
  fn shader_dependents(&self) -> HashSet<String> {
    HashSet::new()
  }
}

/// Deterministic stand-in for the real compiler, backing tests and the
/// simplified build mode.
///
/// The "payload" of a bundle is the newline-joined list of its member
/// paths; bundle dependencies come from a one-hop query over the expanded
/// graph (the owner bundles of each member's direct dependencies).
#[derive(Debug, Default)]
pub struct SimulatedBundleCompiler;

impl BundleCompiler for SimulatedBundleCompiler {
  fn compile(
    &self,
    table: &BuildBundleTable,
    graph: &ExpandedGraph,
  ) -> anyhow::Result<Vec<CompiledBundle>> {
    let mut compiled = Vec::with_capacity(table.len());
    for bundle in table.bundles() {
      let payload = bundle.item_paths.join("\n");
      let payload = payload.as_bytes();

      let mut direct_dependencies: Vec<String> = Vec::new();
      for item_path in &bundle.item_paths {
        let Some(index) = graph.index_of(item_path) else {
          continue;
        };
        for depend_index in &graph.item(index).depend_indices {
          let depend_path = &graph.item(*depend_index).item.path;
          let Some(owner) = table.owner_of(depend_path) else {
            continue;
          };
          if owner != bundle.bundle_name && !direct_dependencies.iter().any(|name| name == owner) {
            direct_dependencies.push(owner.to_string());
          }
        }
      }

      compiled.push(CompiledBundle {
        bundle_name: bundle.bundle_name.clone(),
        file_hash: ContentHash::of(payload),
        crc: crc32(payload),
        file_size: payload.len() as u64,
        direct_dependencies,
      });
    }
    Ok(compiled)
  }
}
