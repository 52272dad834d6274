//! Two-level classification tree: storage, construction and counts.

mod builder;
mod counts;
mod store;
mod tree;
mod types;

pub use builder::{
    validate_mapping, BuildReport, ClassificationTreeBuilder, CollisionKind, MappingCollision,
    MappingValidation,
};
pub use counts::{adjust_counts, is_ancestor, move_mod, recompute_counts};
pub use store::{ClassificationStore, SqliteClassificationStore};
pub use tree::{assemble_tree, find_node, node_count, walk};
pub use types::{ClassificationNode, CreateOutcome, NewNode};
