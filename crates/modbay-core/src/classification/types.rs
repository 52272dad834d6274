//! Classification tree types.

use serde::{Deserialize, Serialize};

/// One node of the two-level category -> object tree.
///
/// Category nodes use the legacy category name as id; object nodes use the
/// plain object name, never a composed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationNode {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub priority: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Mods in this node's subtree.
    #[serde(default)]
    pub mod_count: u64,
    #[serde(default)]
    pub children: Vec<ClassificationNode>,
}

impl ClassificationNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }
}

/// Request to create a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub priority: i64,
    pub description: String,
}

impl NewNode {
    /// A node whose display name equals its id.
    pub fn named(id: impl Into<String>, parent_id: Option<String>, priority: i64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            parent_id,
            priority,
            description: String::new(),
        }
    }
}

/// Outcome of the idempotent create primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(ClassificationNode),
    /// A node with the same id was already present; nothing changed.
    AlreadyExists,
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}
