//! Assembly and lookup over owned classification trees.

use super::types::ClassificationNode;
use std::collections::HashMap;
use tracing::warn;

/// Build an owned tree from flat rows given in insertion order.
///
/// Children keep the relative order of the input. A row whose parent is
/// missing is promoted to a root so it stays visible.
pub fn assemble_tree(rows: Vec<ClassificationNode>) -> Vec<ClassificationNode> {
    let known: std::collections::HashSet<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut roots = Vec::new();
    let mut by_parent: HashMap<String, Vec<ClassificationNode>> = HashMap::new();

    for mut row in rows {
        row.children.clear();
        match row.parent_id.clone() {
            Some(parent) if known.contains(&parent) && parent != row.id => {
                by_parent.entry(parent).or_default().push(row);
            }
            Some(parent) => {
                warn!(
                    "Classification node {} references missing parent {}",
                    row.id, parent
                );
                roots.push(row);
            }
            None => roots.push(row),
        }
    }

    for root in &mut roots {
        attach_children(root, &mut by_parent);
    }
    roots
}

fn attach_children(
    node: &mut ClassificationNode,
    by_parent: &mut HashMap<String, Vec<ClassificationNode>>,
) {
    if let Some(mut children) = by_parent.remove(&node.id) {
        for child in &mut children {
            attach_children(child, by_parent);
        }
        node.children = children;
    }
}

/// Find a node anywhere in the tree.
pub fn find_node<'a>(tree: &'a [ClassificationNode], id: &str) -> Option<&'a ClassificationNode> {
    for node in tree {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Visit every node depth-first, parents before children.
pub fn walk<'a>(tree: &'a [ClassificationNode], visit: &mut impl FnMut(&'a ClassificationNode)) {
    for node in tree {
        visit(node);
        walk(&node.children, visit);
    }
}

/// Total number of nodes in the tree.
pub fn node_count(tree: &[ClassificationNode]) -> usize {
    tree.iter().map(ClassificationNode::subtree_len).sum()
}


#[cfg(test)]
mod tests {
    use super::fixtures::node;
    use super::*;

    #[test]
    fn test_assemble_preserves_order() {
        let rows = vec![
            node("fire", None, 0),
            node("lw", Some("fire"), 0),
            node("ice", None, 0),
            node("ifrit", Some("fire"), 0),
            node("snow", Some("ice"), 0),
        ];
        let tree = assemble_tree(rows);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, "fire");
        let fire_children: Vec<&str> = tree[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(fire_children, vec!["lw", "ifrit"]);
        assert_eq!(tree[1].children[0].id, "snow");
        assert_eq!(node_count(&tree), 5);
    }

    #[test]
    fn test_orphan_promoted_to_root() {
        let tree = assemble_tree(vec![node("lost", Some("gone"), 0)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, "lost");
    }

    #[test]
    fn test_find_node_nested() {
        let tree = assemble_tree(vec![node("fire", None, 0), node("lw", Some("fire"), 3)]);
        assert_eq!(find_node(&tree, "lw").unwrap().mod_count, 3);
        assert!(find_node(&tree, "nope").is_none());
    }

    #[test]
    fn test_walk_parent_first() {
        let tree = assemble_tree(vec![node("a", None, 0), node("b", Some("a"), 0)]);
        let mut seen = Vec::new();
        walk(&tree, &mut |n| seen.push(n.id.clone()));
        assert_eq!(seen, vec!["a", "b"]);
    }
}
