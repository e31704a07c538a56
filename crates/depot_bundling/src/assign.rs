use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use depot_core::hash::hash_string;

use crate::expand::ExpandedGraph;

/// Context handed to share rules when they compute a shared bundle name.
#[derive(Debug, Clone)]
pub struct ShareRuleContext<'a> {
  pub package_name: &'a str,
  pub force_unique_names: bool,
}

/// Computes the canonical shared-bundle name for an item that two or more
/// bundles reference.
pub trait SharedBundleRule: Send + Sync {
  fn shared_bundle_name(&self, item_path: &str, context: &ShareRuleContext<'_>) -> String;
}

/// Groups shared content by the directory it lives in.
pub struct ShareByDirectoryRule;

impl SharedBundleRule for ShareByDirectoryRule {
  fn shared_bundle_name(&self, item_path: &str, context: &ShareRuleContext<'_>) -> String {
    let directory = match item_path.rsplit_once('/') {
      Some((directory, _)) => directory.replace(['/', '\\'], "_"),
      None => "root".to_string(),
    };
    if context.force_unique_names {
      format!(
        "share_{}_{}_{}",
        context.package_name.to_lowercase(),
        directory,
        &hash_string(item_path)[..8]
      )
    } else {
      format!("share_{directory}")
    }
  }
}

/// Folds all shared content into a single bundle.
pub struct ShareSingleRule;

impl SharedBundleRule for ShareSingleRule {
  fn shared_bundle_name(&self, _item_path: &str, context: &ShareRuleContext<'_>) -> String {
    if context.force_unique_names {
      format!("share_{}_all", context.package_name.to_lowercase())
    } else {
      "share_all".to_string()
    }
  }
}

/// Share rules are persisted by a stable string key; the registry resolves
/// that key to a typed handle once at startup. No reflection, no process-wide
/// state.
pub struct ShareRuleRegistry {
  rules: HashMap<String, Arc<dyn SharedBundleRule>>,
}

impl Default for ShareRuleRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl ShareRuleRegistry {
  pub fn new() -> Self {
    let mut registry = ShareRuleRegistry {
      rules: HashMap::new(),
    };
    registry.register("share-by-directory", Arc::new(ShareByDirectoryRule));
    registry.register("share-single", Arc::new(ShareSingleRule));
    registry
  }

  pub fn register(&mut self, key: impl Into<String>, rule: Arc<dyn SharedBundleRule>) {
    self.rules.insert(key.into(), rule);
  }

  pub fn resolve(&self, key: &str) -> anyhow::Result<Arc<dyn SharedBundleRule>> {
    self
      .rules
      .get(key)
      .cloned()
      .ok_or_else(|| anyhow!("unknown share rule '{key}'"))
  }
}

/// Final placement decided for one item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemPlacement {
  /// The collector named the bundle.
  Explicit(String),

  /// Routed to a shared bundle (share rule or the shader bundle).
  Shared(String),

  /// Referenced by exactly one bundle; packed into that bundle's item list
  /// instead of becoming a standalone bundle.
  Folded { owner: String },

  /// Referenced by nothing after the reachability pass.
  Dropped,
}

impl ItemPlacement {
  /// The bundle this item's bytes end up in, if any.
  pub fn bundle_name(&self) -> Option<&str> {
    match self {
      ItemPlacement::Explicit(name) | ItemPlacement::Shared(name) => Some(name),
      ItemPlacement::Folded { owner } => Some(owner),
      ItemPlacement::Dropped => None,
    }
  }
}

#[derive(Clone)]
pub struct AssignOptions {
  pub package_name: String,
  pub share_rule: Arc<dyn SharedBundleRule>,
  pub force_unique_names: bool,

  /// Well-known bundle that all shader-like content is routed to, no matter
  /// how often it is referenced.
  pub shader_bundle_name: String,
}

/// Per-item bundle assignment. Index-aligned with the expanded graph it was
/// computed from.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
  placements: Vec<ItemPlacement>,
}

impl Assignment {
  pub fn placement(&self, index: usize) -> &ItemPlacement {
    &self.placements[index]
  }

  pub fn placements(&self) -> &[ItemPlacement] {
    &self.placements
  }
}

/// Decides, per item, whether it keeps its explicit bundle, becomes shared
/// content, folds into its single referencing bundle, or is dropped.
///
/// Pure function over the expanded graph; the graph itself is not touched.
#[tracing::instrument(level = "debug", skip_all, fields(items = graph.len()))]
pub fn assign(graph: &ExpandedGraph, options: &AssignOptions) -> anyhow::Result<Assignment> {
  let context = ShareRuleContext {
    package_name: &options.package_name,
    force_unique_names: options.force_unique_names,
  };

  let mut placements = Vec::with_capacity(graph.len());
  for expanded in graph.items() {
    let placement = if !expanded.item.bundle_name.is_empty() {
      ItemPlacement::Explicit(expanded.item.bundle_name.clone())
    } else if expanded.item.is_shader {
      ItemPlacement::Shared(options.shader_bundle_name.clone())
    } else {
      match expanded.referencing_bundles.len() {
        0 => ItemPlacement::Dropped,
        1 => ItemPlacement::Folded {
          owner: expanded.referencing_bundles[0].clone(),
        },
        _ => ItemPlacement::Shared(
          options
            .share_rule
            .shared_bundle_name(&expanded.item.path, &context),
        ),
      }
    };
    placements.push(placement);
  }

  Ok(Assignment { placements })
}

#[cfg(test)]
mod tests {
  use depot_core::types::CollectedItem;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::expand::expand;

  fn options() -> AssignOptions {
    AssignOptions {
      package_name: "Demo".into(),
      share_rule: Arc::new(ShareByDirectoryRule),
      force_unique_names: false,
      shader_bundle_name: "share_shaders".into(),
    }
  }

  #[test]
  fn single_reference_folds_and_double_reference_shares() {
    let graph = expand(vec![
      CollectedItem::main("a.prefab", "bundle_a").with_depend_paths(vec!["only_a.mat", "c.mat"]),
      CollectedItem::main("b.prefab", "bundle_b").with_depend_paths(vec!["c.mat"]),
    ])
    .unwrap();
    let assignment = assign(&graph, &options()).unwrap();

    let only_a = graph.index_of("only_a.mat").unwrap();
    assert_eq!(
      assignment.placement(only_a),
      &ItemPlacement::Folded {
        owner: "bundle_a".into()
      }
    );

    let c = graph.index_of("c.mat").unwrap();
    assert_eq!(
      assignment.placement(c),
      &ItemPlacement::Shared("share_root".into())
    );
  }

  #[test]
  fn shader_items_always_go_to_the_shader_bundle() {
    let graph = expand(vec![
      CollectedItem::main("a.prefab", "bundle_a").with_depend_paths(vec!["water.shader"])
    ])
    .unwrap();
    let assignment = assign(&graph, &options()).unwrap();

    let shader = graph.index_of("water.shader").unwrap();
    assert_eq!(
      assignment.placement(shader),
      &ItemPlacement::Shared("share_shaders".into())
    );
  }

  #[test]
  fn share_by_directory_groups_by_parent_directory() {
    let rule = ShareByDirectoryRule;
    let context = ShareRuleContext {
      package_name: "Demo",
      force_unique_names: false,
    };

    assert_eq!(
      rule.shared_bundle_name("mats/common/c.mat", &context),
      "share_mats_common"
    );
    assert_eq!(rule.shared_bundle_name("c.mat", &context), "share_root");
  }

  #[test]
  fn force_unique_names_scope_shared_bundles_to_the_package() {
    let rule = ShareSingleRule;
    let context = ShareRuleContext {
      package_name: "Demo",
      force_unique_names: true,
    };

    assert_eq!(rule.shared_bundle_name("c.mat", &context), "share_demo_all");
  }

  #[test]
  fn registry_resolves_known_rules_and_rejects_unknown_keys() {
    let registry = ShareRuleRegistry::new();

    assert!(registry.resolve("share-by-directory").is_ok());
    assert!(registry.resolve("share-single").is_ok());
    assert!(registry.resolve("share-by-owner").is_err());
  }
}
