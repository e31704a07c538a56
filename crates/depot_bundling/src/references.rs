use std::collections::HashMap;
use std::collections::HashSet;

use anyhow::anyhow;
use depot_core::types::BundleId;
use depot_core::Diagnostic;

/// The external compiler's per-bundle build report, reduced to what the
/// reference graph needs: each bundle's direct bundle-name dependencies.
pub type DirectDependencyReport = HashMap<String, Vec<String>>;

/// Computes, for every bundle, the ids of the bundles that depend on it.
///
/// The forward report says "A loads B"; runtime consumers need the inverse
/// ("who breaks if B is evicted"), stored on each bundle record. Both lookup
/// maps are built fresh per invocation.
#[tracing::instrument(level = "debug", skip_all, fields(bundles = bundle_names.len()))]
pub fn build_reference_ids(
  bundle_names: &[String],
  direct_dependencies: &DirectDependencyReport,
) -> anyhow::Result<Vec<Vec<BundleId>>> {
  let id_by_name: HashMap<&str, BundleId> = bundle_names
    .iter()
    .enumerate()
    .map(|(index, name)| (name.as_str(), BundleId::from_index(index)))
    .collect();

  for (name, dependencies) in direct_dependencies {
    if !id_by_name.contains_key(name.as_str()) {
      return Err(anyhow!(Diagnostic::new(format!(
        "compiler reported dependencies for unknown bundle '{name}'"
      ))
      .with_origin("depot_bundling::references")));
    }
    for dependency in dependencies {
      if !id_by_name.contains_key(dependency.as_str()) {
        return Err(anyhow!(Diagnostic::new(format!(
          "bundle '{name}' depends on unknown bundle '{dependency}'"
        ))
        .with_origin("depot_bundling::references")));
      }
    }
  }

  let mut reference_ids: Vec<Vec<BundleId>> = vec![Vec::new(); bundle_names.len()];
  for (target_index, target_name) in bundle_names.iter().enumerate() {
    let mut seen: HashSet<BundleId> = HashSet::new();
    for (other_index, other_name) in bundle_names.iter().enumerate() {
      if other_index == target_index {
        continue;
      }
      let depends_on_target = direct_dependencies
        .get(other_name)
        .is_some_and(|dependencies| dependencies.iter().any(|name| name == target_name));
      if depends_on_target {
        let other_id = BundleId::from_index(other_index);
        if seen.insert(other_id) {
          reference_ids[target_index].push(other_id);
        }
      }
    }
  }

  Ok(reference_ids)
}

/// Variant for builds where content silently depends on built-in engine
/// shaders the collector cannot see: an externally discovered set of bundles
/// known to pull shader content is folded into the shader bundle's
/// reference list.
pub fn build_reference_ids_with_shader_fold(
  bundle_names: &[String],
  direct_dependencies: &DirectDependencyReport,
  shader_bundle_name: &str,
  shader_dependents: &HashSet<String>,
) -> anyhow::Result<Vec<Vec<BundleId>>> {
  let mut reference_ids = build_reference_ids(bundle_names, direct_dependencies)?;

  let Some(shader_index) = bundle_names
    .iter()
    .position(|name| name == shader_bundle_name)
  else {
    return Ok(reference_ids);
  };

  for (index, name) in bundle_names.iter().enumerate() {
    if index == shader_index || !shader_dependents.contains(name) {
      continue;
    }
    let id = BundleId::from_index(index);
    if !reference_ids[shader_index].contains(&id) {
      reference_ids[shader_index].push(id);
    }
  }

  Ok(reference_ids)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
  }

  #[test]
  fn inverts_direct_dependencies() {
    let bundle_names = names(&["bundle_a", "bundle_b", "share_c"]);
    let mut report = DirectDependencyReport::new();
    report.insert("bundle_a".into(), vec!["share_c".into()]);
    report.insert("bundle_b".into(), vec!["share_c".into()]);

    let reference_ids = build_reference_ids(&bundle_names, &report).unwrap();

    assert_eq!(reference_ids[0], vec![]);
    assert_eq!(reference_ids[1], vec![]);
    assert_eq!(
      reference_ids[2],
      vec![BundleId::from_index(0), BundleId::from_index(1)]
    );
  }

  #[test]
  fn reference_symmetry_holds_for_every_pair() {
    let bundle_names = names(&["a", "b", "c", "d"]);
    let mut report = DirectDependencyReport::new();
    report.insert("a".into(), vec!["b".into(), "c".into()]);
    report.insert("b".into(), vec!["c".into()]);
    report.insert("d".into(), vec!["a".into()]);

    let reference_ids = build_reference_ids(&bundle_names, &report).unwrap();

    for (from_index, from_name) in bundle_names.iter().enumerate() {
      for to_name in report.get(from_name).into_iter().flatten() {
        let to_index = bundle_names.iter().position(|n| n == to_name).unwrap();
        assert!(
          reference_ids[to_index].contains(&BundleId::from_index(from_index)),
          "expected {to_name} to list {from_name} as a referencer"
        );
      }
    }
  }

  #[test]
  fn duplicate_dependency_entries_produce_one_reference() {
    let bundle_names = names(&["a", "c"]);
    let mut report = DirectDependencyReport::new();
    report.insert("a".into(), vec!["c".into(), "c".into()]);

    let reference_ids = build_reference_ids(&bundle_names, &report).unwrap();

    assert_eq!(reference_ids[1], vec![BundleId::from_index(0)]);
  }

  #[test]
  fn unknown_dependency_name_is_fatal() {
    let bundle_names = names(&["a"]);
    let mut report = DirectDependencyReport::new();
    report.insert("a".into(), vec!["ghost".into()]);

    let error = build_reference_ids(&bundle_names, &report).unwrap_err();
    assert!(error.to_string().contains("ghost"));
  }

  #[test]
  fn shader_fold_adds_external_dependents() {
    let bundle_names = names(&["bundle_a", "share_shaders"]);
    let report = DirectDependencyReport::new();
    let shader_dependents: HashSet<String> = ["bundle_a".to_string()].into();

    let reference_ids = build_reference_ids_with_shader_fold(
      &bundle_names,
      &report,
      "share_shaders",
      &shader_dependents,
    )
    .unwrap();

    assert_eq!(reference_ids[1], vec![BundleId::from_index(0)]);
  }
}
