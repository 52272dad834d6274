//! Mod count maintenance over classification tree snapshots.
//!
//! Everything here is a pure transform: the input tree is never mutated and
//! callers apply the returned snapshot in one step. `mod_count` aggregates a
//! node's own mods plus those of its descendants, so moving a mod up to an
//! ancestor must not increment the ancestor a second time.

use super::tree::find_node;
use super::types::ClassificationNode;
use crate::catalog::ModCatalogEntry;
use crate::error::{ModbayError, Result};
use std::collections::HashMap;

/// Whether `descendant` lies strictly below `ancestor`.
pub fn is_ancestor(tree: &[ClassificationNode], ancestor: &str, descendant: &str) -> bool {
    match find_node(tree, ancestor) {
        Some(node) => contains(&node.children, descendant),
        None => false,
    }
}

fn contains(nodes: &[ClassificationNode], id: &str) -> bool {
    nodes
        .iter()
        .any(|node| node.id == id || contains(&node.children, id))
}

/// Apply one mod moving from `old_category` to `new_category`.
///
/// The old node loses one (never below zero). The new node gains one
/// unless it is an ancestor of the old node. No other node changes.
pub fn adjust_counts(
    tree: &[ClassificationNode],
    old_category: &str,
    new_category: &str,
) -> Vec<ClassificationNode> {
    if old_category == new_category {
        return tree.to_vec();
    }
    let increment_new = !is_ancestor(tree, new_category, old_category);
    tree.iter()
        .map(|node| adjust_node(node, old_category, new_category, increment_new))
        .collect()
}

fn adjust_node(
    node: &ClassificationNode,
    old_category: &str,
    new_category: &str,
    increment_new: bool,
) -> ClassificationNode {
    let mut mod_count = node.mod_count;
    if node.id == old_category {
        mod_count = mod_count.saturating_sub(1);
    } else if node.id == new_category && increment_new {
        mod_count += 1;
    }

    ClassificationNode {
        mod_count,
        children: node
            .children
            .iter()
            .map(|child| adjust_node(child, old_category, new_category, increment_new))
            .collect(),
        ..node.clone()
    }
}

/// Move mod `sha` to `new_category`, returning the new tree and mod list.
pub fn move_mod(
    tree: &[ClassificationNode],
    mods: &[ModCatalogEntry],
    sha: &str,
    new_category: &str,
) -> Result<(Vec<ClassificationNode>, Vec<ModCatalogEntry>)> {
    let current = mods
        .iter()
        .find(|m| m.sha == sha)
        .ok_or_else(|| ModbayError::ModNotFound {
            sha: sha.to_string(),
        })?;

    let new_tree = adjust_counts(tree, &current.category, new_category);
    let new_mods = mods
        .iter()
        .map(|m| {
            if m.sha == sha {
                ModCatalogEntry {
                    category: new_category.to_string(),
                    ..m.clone()
                }
            } else {
                m.clone()
            }
        })
        .collect();

    Ok((new_tree, new_mods))
}

/// Recompute every count from scratch: own mods plus all descendants'.
pub fn recompute_counts(
    tree: &[ClassificationNode],
    mods: &[ModCatalogEntry],
) -> Vec<ClassificationNode> {
    let mut direct: HashMap<&str, u64> = HashMap::new();
    for entry in mods {
        *direct.entry(entry.category.as_str()).or_default() += 1;
    }
    tree.iter().map(|node| recompute_node(node, &direct)).collect()
}

fn recompute_node(node: &ClassificationNode, direct: &HashMap<&str, u64>) -> ClassificationNode {
    let children: Vec<ClassificationNode> = node
        .children
        .iter()
        .map(|child| recompute_node(child, direct))
        .collect();
    let own = direct.get(node.id.as_str()).copied().unwrap_or(0);
    let mod_count = own + children.iter().map(|c| c.mod_count).sum::<u64>();

    ClassificationNode {
        mod_count,
        children,
        ..node.clone()
    }
}
