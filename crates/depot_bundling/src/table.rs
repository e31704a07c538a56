use std::collections::HashMap;

use anyhow::anyhow;
use depot_core::types::BuildBundle;
use depot_core::Diagnostic;

use crate::assign::Assignment;
use crate::assign::ItemPlacement;
use crate::expand::ExpandedGraph;

/// The final map from bundle name to packed items, ready for the external
/// bundle compiler.
#[derive(Debug, Default)]
pub struct BuildBundleTable {
  bundles: Vec<BuildBundle>,
  index_by_name: HashMap<String, usize>,

  /// Item path -> owning bundle name, folded items included.
  item_owners: HashMap<String, String>,
}

impl BuildBundleTable {
  pub fn bundles(&self) -> &[BuildBundle] {
    &self.bundles
  }

  pub fn bundles_mut(&mut self) -> &mut [BuildBundle] {
    &mut self.bundles
  }

  pub fn bundle_by_name(&self, name: &str) -> Option<&BuildBundle> {
    self.index_by_name.get(name).map(|index| &self.bundles[*index])
  }

  pub fn owner_of(&self, item_path: &str) -> Option<&str> {
    self.item_owners.get(item_path).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.bundles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bundles.is_empty()
  }

  fn bundle_entry(&mut self, name: &str) -> &mut BuildBundle {
    let index = match self.index_by_name.get(name) {
      Some(index) => *index,
      None => {
        let index = self.bundles.len();
        self.bundles.push(BuildBundle::new(name));
        self.index_by_name.insert(name.to_string(), index);
        index
      }
    };
    &mut self.bundles[index]
  }
}

/// Materializes the bundle table from an expanded graph and its assignment,
/// then runs the raw-content integrity checks.
#[tracing::instrument(level = "debug", skip_all, fields(items = graph.len()))]
pub fn build_table(
  graph: &ExpandedGraph,
  assignment: &Assignment,
) -> anyhow::Result<BuildBundleTable> {
  let mut table = BuildBundleTable::default();

  // First the items that name a bundle of their own (explicit and shared),
  // so every fold target exists before folded items are appended.
  for (index, expanded) in graph.items().iter().enumerate() {
    let placement = assignment.placement(index);
    let name = match placement {
      ItemPlacement::Explicit(name) | ItemPlacement::Shared(name) => name,
      _ => continue,
    };
    let tags = item_tags(expanded);
    table
      .bundle_entry(name)
      .push_item(&expanded.item.path, expanded.item.is_raw_file, &tags);
    table
      .item_owners
      .insert(expanded.item.path.clone(), name.clone());
  }

  for (index, expanded) in graph.items().iter().enumerate() {
    let ItemPlacement::Folded { owner } = assignment.placement(index) else {
      continue;
    };
    // Folding is strictly 1:1. Seeing a second referencing bundle here means
    // reference counting changed between passes, which is an integrity
    // error, not something to silently duplicate.
    if expanded.referencing_bundles.len() != 1 {
      return Err(anyhow!(Diagnostic::new(format!(
        "item '{}' should fold into a single bundle but is referenced by {:?}",
        expanded.item.path, expanded.referencing_bundles
      ))
      .with_origin("depot_bundling::table")));
    }
    if !table.index_by_name.contains_key(owner) {
      return Err(anyhow!(Diagnostic::new(format!(
        "item '{}' folds into bundle '{}' which holds no items of its own",
        expanded.item.path, owner
      ))
      .with_origin("depot_bundling::table")));
    }
    let tags = item_tags(expanded);
    table
      .bundle_entry(owner)
      .push_item(&expanded.item.path, expanded.item.is_raw_file, &tags);
    table
      .item_owners
      .insert(expanded.item.path.clone(), owner.clone());
  }

  validate(graph, assignment, &table)?;

  tracing::debug!(bundles = table.len(), "Built bundle table");
  Ok(table)
}

fn item_tags(expanded: &crate::expand::ExpandedItem) -> Vec<String> {
  let mut tags = expanded.item.asset_tags.clone();
  for tag in &expanded.item.bundle_tags {
    if !tags.contains(tag) {
      tags.push(tag.clone());
    }
  }
  tags
}

fn validate(
  graph: &ExpandedGraph,
  assignment: &Assignment,
  table: &BuildBundleTable,
) -> anyhow::Result<()> {
  // A raw bundle serves its one item verbatim.
  for bundle in table.bundles() {
    if bundle.is_raw_file && bundle.item_paths.len() != 1 {
      return Err(anyhow!(Diagnostic::new(format!(
        "raw bundle '{}' must contain exactly one item but holds {}",
        bundle.bundle_name,
        bundle.item_paths.len()
      ))
      .with_origin("depot_bundling::table")
      .with_hint("raw content cannot share a bundle with other items")));
    }
  }

  // Raw content can never be a dependency of packed content.
  for (index, expanded) in graph.items().iter().enumerate() {
    if assignment.placement(index) == &ItemPlacement::Dropped {
      continue;
    }
    for depend_index in &expanded.depend_indices {
      let depend = graph.item(*depend_index);
      if depend.item.is_raw_file
        && assignment.placement(*depend_index) != &ItemPlacement::Dropped
      {
        return Err(anyhow!(Diagnostic::new(format!(
          "packed item '{}' depends on raw item '{}'",
          expanded.item.path, depend.item.path
        ))
        .with_origin("depot_bundling::table")));
      }
    }
  }

  Ok(())
}
