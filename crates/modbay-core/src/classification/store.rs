//! Classification store trait and its SQLite implementation.

use super::tree::{assemble_tree, walk};
use super::types::{ClassificationNode, CreateOutcome, NewNode};
use crate::db::Database;
use crate::error::{ModbayError, Result};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

/// Persistent classification tree.
///
/// All operations are synchronous to match rusqlite's API.
pub trait ClassificationStore: Send + Sync {
    /// Create a node, or report that one with the same id exists.
    ///
    /// Fails with a validation error when `parent_id` names no node.
    fn create_node(&self, node: &NewNode) -> Result<CreateOutcome>;

    fn node_exists(&self, id: &str) -> Result<bool>;

    fn get_node(&self, id: &str) -> Result<Option<ClassificationNode>>;

    /// First node (in insertion order) with this display name.
    fn get_node_by_name(&self, name: &str) -> Result<Option<ClassificationNode>>;

    fn set_node_thumbnail(&self, id: &str, path: &str) -> Result<()>;

    /// The whole tree, roots and children in insertion order.
    fn load_tree(&self) -> Result<Vec<ClassificationNode>>;

    /// Persist the `mod_count` of every node in `tree`.
    fn save_counts(&self, tree: &[ClassificationNode]) -> Result<()>;

    fn node_count(&self) -> Result<usize>;
}

/// SQLite-backed classification store.
#[derive(Clone)]
pub struct SqliteClassificationStore {
    db: Database,
}

impl SqliteClassificationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn row_to_node(row: &Row<'_>) -> rusqlite::Result<ClassificationNode> {
        let mod_count: i64 = row.get(6)?;
        Ok(ClassificationNode {
            id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
            priority: row.get(3)?,
            description: row.get(4)?,
            thumbnail: row.get(5)?,
            mod_count: mod_count.max(0) as u64,
            children: Vec::new(),
        })
    }
}

const NODE_COLUMNS: &str =
    "id, name, parent_id, priority, description, thumbnail, mod_count";

impl ClassificationStore for SqliteClassificationStore {
    fn create_node(&self, node: &NewNode) -> Result<CreateOutcome> {
        let conn = self.db.lock()?;

        if let Some(parent) = &node.parent_id {
            let parent_exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM classification_nodes WHERE id = ?1)",
                params![parent],
                |row| row.get(0),
            )?;
            if !parent_exists {
                return Err(ModbayError::Validation {
                    field: "parent_id".to_string(),
                    message: format!("parent {} of {} does not exist", parent, node.id),
                });
            }
        }

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO classification_nodes
                 (id, name, parent_id, priority, description, thumbnail, mod_count, position)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0,
                 (SELECT COALESCE(MAX(position), 0) + 1 FROM classification_nodes))",
            params![
                node.id,
                node.name,
                node.parent_id,
                node.priority,
                node.description
            ],
        )?;

        if inserted == 0 {
            debug!("Classification node already exists: {}", node.id);
            return Ok(CreateOutcome::AlreadyExists);
        }

        Ok(CreateOutcome::Created(ClassificationNode {
            id: node.id.clone(),
            name: node.name.clone(),
            parent_id: node.parent_id.clone(),
            priority: node.priority,
            description: node.description.clone(),
            thumbnail: None,
            mod_count: 0,
            children: Vec::new(),
        }))
    }

    fn node_exists(&self, id: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM classification_nodes WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_node(&self, id: &str) -> Result<Option<ClassificationNode>> {
        let conn = self.db.lock()?;
        let node = conn
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM classification_nodes WHERE id = ?1"),
                params![id],
                Self::row_to_node,
            )
            .optional()?;
        Ok(node)
    }

    fn get_node_by_name(&self, name: &str) -> Result<Option<ClassificationNode>> {
        let conn = self.db.lock()?;
        let node = conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM classification_nodes
                     WHERE name = ?1 ORDER BY position LIMIT 1"
                ),
                params![name],
                Self::row_to_node,
            )
            .optional()?;
        Ok(node)
    }

    fn set_node_thumbnail(&self, id: &str, path: &str) -> Result<()> {
        let conn = self.db.lock()?;
        let updated = conn.execute(
            "UPDATE classification_nodes SET thumbnail = ?2 WHERE id = ?1",
            params![id, path],
        )?;
        if updated == 0 {
            return Err(ModbayError::Validation {
                field: "id".to_string(),
                message: format!("classification node {} does not exist", id),
            });
        }
        Ok(())
    }

    fn load_tree(&self) -> Result<Vec<ClassificationNode>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM classification_nodes ORDER BY position"
        ))?;
        let rows = stmt
            .query_map([], Self::row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assemble_tree(rows))
    }

    fn save_counts(&self, tree: &[ClassificationNode]) -> Result<()> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE classification_nodes SET mod_count = ?2 WHERE id = ?1")?;
            let mut result = Ok(());
            walk(tree, &mut |node| {
                if result.is_ok() {
                    result = stmt
                        .execute(params![node.id, node.mod_count as i64])
                        .map(|_| ());
                }
            });
            result?;
        }
        tx.commit()?;
        Ok(())
    }

    fn node_count(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM classification_nodes", [], |row| {
                row.get(0)
            })?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteClassificationStore {
        SqliteClassificationStore::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_create_is_idempotent() {
        let store = store();
        let node = NewNode::named("干员·灼热", None, 100);

        let first = store.create_node(&node).unwrap();
        assert!(first.is_created());
        let second = store.create_node(&node).unwrap();
        assert_eq!(second, CreateOutcome::AlreadyExists);
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn test_child_requires_parent() {
        let store = store();
        let orphan = NewNode::named("莱万汀", Some("missing".into()), 50);
        assert!(matches!(
            store.create_node(&orphan),
            Err(ModbayError::Validation { .. })
        ));
        assert!(!store.node_exists("莱万汀").unwrap());
    }

    #[test]
    fn test_load_tree_nests_children() {
        let store = store();
        store
            .create_node(&NewNode::named("fire", None, 100))
            .unwrap();
        store
            .create_node(&NewNode::named("lw", Some("fire".into()), 50))
            .unwrap();
        store
            .create_node(&NewNode::named("ice", None, 100))
            .unwrap();

        let tree = store.load_tree().unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].parent_id.as_deref(), Some("fire"));
        assert_eq!(tree[0].children[0].priority, 50);
    }

    #[test]
    fn test_thumbnail_and_lookup_by_name() {
        let store = store();
        store
            .create_node(&NewNode::named("fire", None, 100))
            .unwrap();
        store.set_node_thumbnail("fire", "/thumbs/fire.png").unwrap();

        let node = store.get_node_by_name("fire").unwrap().unwrap();
        assert_eq!(node.thumbnail.as_deref(), Some("/thumbs/fire.png"));
        assert!(store.set_node_thumbnail("nope", "/x.png").is_err());
    }

    #[test]
    fn test_save_counts() {
        let store = store();
        store
            .create_node(&NewNode::named("fire", None, 100))
            .unwrap();
        store
            .create_node(&NewNode::named("lw", Some("fire".into()), 50))
            .unwrap();

        let mut tree = store.load_tree().unwrap();
        tree[0].mod_count = 4;
        tree[0].children[0].mod_count = 3;
        store.save_counts(&tree).unwrap();

        assert_eq!(store.get_node("fire").unwrap().unwrap().mod_count, 4);
        assert_eq!(store.get_node("lw").unwrap().unwrap().mod_count, 3);
    }
}
