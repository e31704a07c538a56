pub mod assign;
pub mod expand;
pub mod references;
pub mod table;

pub use assign::{assign, AssignOptions, Assignment, ItemPlacement, ShareRuleRegistry};
pub use expand::{expand, ExpandedGraph, ExpandedItem};
pub use references::{build_reference_ids, build_reference_ids_with_shader_fold};
pub use table::{build_table, BuildBundleTable};
