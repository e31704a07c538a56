use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use anyhow::anyhow;
use depot_core::types::CollectedItem;
use depot_core::types::CollectorKind;
use depot_core::Diagnostic;
use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::Dfs;
use petgraph::Direction;

/// One item in the expanded graph.
///
/// Explicit items keep the collector's data verbatim; implicit items are
/// synthesized during expansion with an empty bundle name and address.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpandedItem {
  pub item: CollectedItem,

  /// Distinct bundle names of the explicit items whose dependency walks
  /// reach this item, in discovery order. Only meaningful for items without
  /// an explicit bundle name.
  pub referencing_bundles: Vec<String>,

  /// Resolved direct dependencies as indices into the item list.
  pub depend_indices: Vec<usize>,

  pub is_implicit: bool,
}

/// Immutable output of the dependency expansion phase.
///
/// Shared-bundle assignment is a pure function over this value; nothing
/// mutates it across passes.
#[derive(Debug)]
pub struct ExpandedGraph {
  items: Vec<ExpandedItem>,
  index_by_path: HashMap<String, usize>,
  graph: DiGraph<usize, ()>,
  node_indices: Vec<NodeIndex>,
}

impl ExpandedGraph {
  pub fn items(&self) -> &[ExpandedItem] {
    &self.items
  }

  pub fn item(&self, index: usize) -> &ExpandedItem {
    &self.items[index]
  }

  pub fn index_of(&self, path: &str) -> Option<usize> {
    self.index_by_path.get(path).copied()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Items that directly depend on `index`.
  pub fn direct_dependents(&self, index: usize) -> Vec<usize> {
    self
      .graph
      .neighbors_directed(self.node_indices[index], Direction::Incoming)
      .map(|node| self.graph[node])
      .collect()
  }
}

struct Expansion {
  items: Vec<ExpandedItem>,
  index_by_path: HashMap<String, usize>,
}

impl Expansion {
  /// Registers an implicit dependency item the first time a walk reaches its
  /// path. Shader-like content is recognized by extension so it can later be
  /// routed to the dedicated shared bundle.
  fn register_implicit(&mut self, path: &str) -> usize {
    if let Some(index) = self.index_by_path.get(path) {
      return *index;
    }

    let index = self.items.len();
    self.items.push(ExpandedItem {
      item: CollectedItem {
        path: path.to_string(),
        is_shader: path.ends_with(".shader"),
        collector_kind: CollectorKind::DependencyAsset,
        ..CollectedItem::default()
      },
      referencing_bundles: Vec::new(),
      depend_indices: Vec::new(),
      is_implicit: true,
    });
    self.index_by_path.insert(path.to_string(), index);
    index
  }
}

/// Discovers and registers every transitively-reachable dependency of the
/// collected items, prunes content no main or static item actually needs,
/// and resolves all dependency paths to direct item references.
#[tracing::instrument(level = "debug", skip_all, fields(collected = items.len()))]
pub fn expand(items: Vec<CollectedItem>) -> anyhow::Result<ExpandedGraph> {
  let mut expansion = Expansion {
    items: Vec::with_capacity(items.len()),
    index_by_path: HashMap::new(),
  };

  // Explicit items go in first and must not collide.
  for item in items {
    if expansion.index_by_path.contains_key(&item.path) {
      return Err(anyhow!(Diagnostic::new(format!(
        "item '{}' was collected more than once",
        item.path
      ))
      .with_origin("depot_bundling::expand")
      .with_hint("two collector rules produced the same path; remove one")));
    }
    let index = expansion.items.len();
    expansion.index_by_path.insert(item.path.clone(), index);
    expansion.items.push(ExpandedItem {
      item,
      referencing_bundles: Vec::new(),
      depend_indices: Vec::new(),
      is_implicit: false,
    });
  }

  // Walk the dependency closure, creating implicit items as new paths turn
  // up. Implicit items carry no dependency list of their own (the compiler's
  // static-dependency query already flattened transitive dependencies into
  // each collected item), but the worklist covers them anyway.
  let mut worklist: VecDeque<usize> = (0..expansion.items.len()).collect();
  while let Some(index) = worklist.pop_front() {
    let depend_paths = expansion.items[index].item.depend_paths.clone();
    for depend_path in depend_paths {
      if !expansion.index_by_path.contains_key(&depend_path) {
        let new_index = expansion.register_implicit(&depend_path);
        worklist.push_back(new_index);
      }
    }
  }

  let mut graph: DiGraph<usize, ()> = DiGraph::new();
  let node_indices: Vec<NodeIndex> = (0..expansion.items.len())
    .map(|index| graph.add_node(index))
    .collect();
  for (index, expanded) in expansion.items.iter().enumerate() {
    for depend_path in &expanded.item.depend_paths {
      let depend_index = *expansion.index_by_path.get(depend_path).ok_or_else(|| {
        anyhow!(Diagnostic::new(format!(
          "item '{}' depends on '{}' which was never registered",
          expanded.item.path, depend_path
        ))
        .with_origin("depot_bundling::expand"))
      })?;
      graph.add_edge(node_indices[index], node_indices[depend_index], ());
    }
  }

  // Reachability pass: anything that only a dependency-only collector pulled
  // in, and that no main or static item reaches, is a collector over-harvest
  // and gets dropped.
  let mut reachable: HashSet<usize> = HashSet::new();
  for (index, expanded) in expansion.items.iter().enumerate() {
    if !expanded.is_implicit && !expanded.item.collector_kind.is_dependency_only() {
      let mut dfs = Dfs::new(&graph, node_indices[index]);
      while let Some(node) = dfs.next(&graph) {
        reachable.insert(graph[node]);
      }
    }
  }

  let mut kept_items: Vec<ExpandedItem> = Vec::with_capacity(expansion.items.len());
  let mut kept_index_by_path: HashMap<String, usize> = HashMap::new();
  for (index, expanded) in expansion.items.into_iter().enumerate() {
    let dependency_only =
      expanded.is_implicit || expanded.item.collector_kind.is_dependency_only();
    if dependency_only && !reachable.contains(&index) {
      tracing::debug!(path = %expanded.item.path, "Dropping unreachable dependency-only item");
      continue;
    }
    kept_index_by_path.insert(expanded.item.path.clone(), kept_items.len());
    kept_items.push(expanded);
  }

  // Rebuild the graph over the surviving items and resolve direct
  // references. A surviving item can only depend on surviving items; a miss
  // here is an integrity bug, not a user error.
  let mut kept_graph: DiGraph<usize, ()> = DiGraph::new();
  let kept_nodes: Vec<NodeIndex> = (0..kept_items.len())
    .map(|index| kept_graph.add_node(index))
    .collect();
  for index in 0..kept_items.len() {
    let depend_paths = kept_items[index].item.depend_paths.clone();
    let mut depend_indices = Vec::with_capacity(depend_paths.len());
    for depend_path in &depend_paths {
      let depend_index = *kept_index_by_path.get(depend_path).ok_or_else(|| {
        anyhow!(Diagnostic::new(format!(
          "item '{}' depends on '{}' which was pruned while still referenced",
          kept_items[index].item.path, depend_path
        ))
        .with_origin("depot_bundling::expand"))
      })?;
      depend_indices.push(depend_index);
      kept_graph.add_edge(kept_nodes[index], kept_nodes[depend_index], ());
    }
    kept_items[index].depend_indices = depend_indices;
  }

  // Tag walk: every explicit item marks the implicit items it transitively
  // reaches with its bundle name and bundle tags. The walk descends through
  // implicit items only; an explicit item met on the way runs its own walk.
  let roots: Vec<usize> = kept_items
    .iter()
    .enumerate()
    .filter(|(_, expanded)| !expanded.is_implicit)
    .map(|(index, _)| index)
    .collect();
  for root in roots {
    let root_bundle = kept_items[root].item.bundle_name.clone();
    let root_tags = kept_items[root].item.bundle_tags.clone();

    let mut stack: Vec<usize> = kept_items[root].depend_indices.clone();
    let mut visited: HashSet<usize> = HashSet::new();
    while let Some(index) = stack.pop() {
      if !visited.insert(index) {
        continue;
      }
      if !kept_items[index].is_implicit {
        continue;
      }
      {
        let expanded = &mut kept_items[index];
        if !root_bundle.is_empty() && !expanded.referencing_bundles.contains(&root_bundle) {
          expanded.referencing_bundles.push(root_bundle.clone());
        }
        for tag in &root_tags {
          if !expanded.item.bundle_tags.contains(tag) {
            expanded.item.bundle_tags.push(tag.clone());
          }
        }
      }
      stack.extend(kept_items[index].depend_indices.iter().copied());
    }
  }

  Ok(ExpandedGraph {
    items: kept_items,
    index_by_path: kept_index_by_path,
    graph: kept_graph,
    node_indices: kept_nodes,
  })
}
