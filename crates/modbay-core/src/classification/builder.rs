//! Turns a parsed category -> objects mapping into persisted tree nodes.

use super::store::ClassificationStore;
use super::types::{CreateOutcome, NewNode};
use crate::catalog::ModCatalog;
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::legacy::{CategoryObjects, ClassificationMapping};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Why an object line cannot become a node of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    /// The object name is also the name of a category file.
    CategoryAndObject,
    /// The object is listed in more than one category file.
    ObjectInMultipleCategories,
}

/// An id that would appear twice in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCollision {
    pub id: String,
    pub kind: CollisionKind,
    /// Category that keeps the id.
    pub kept_in: String,
    /// Category whose line was skipped.
    pub skipped_in: String,
}

impl std::fmt::Display for MappingCollision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            CollisionKind::CategoryAndObject => write!(
                f,
                "'{}' in category '{}' is also a category name",
                self.id, self.skipped_in
            ),
            CollisionKind::ObjectInMultipleCategories => write!(
                f,
                "'{}' in category '{}' already belongs to category '{}'",
                self.id, self.skipped_in, self.kept_in
            ),
        }
    }
}

/// Result of checking a mapping for global id uniqueness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingValidation {
    pub collisions: Vec<MappingCollision>,
    skipped: HashSet<(String, String)>,
}

impl MappingValidation {
    pub fn is_valid(&self) -> bool {
        self.collisions.is_empty()
    }

    /// Whether `object` under `category` may be created.
    pub fn accepts(&self, category: &str, object: &str) -> bool {
        !self
            .skipped
            .contains(&(category.to_string(), object.to_string()))
    }
}

/// Check that every category and object name maps to a distinct node id.
///
/// Category names always win. Among categories, the first one in parse
/// order keeps a shared object. Repeats of an object inside one file are
/// dropped without being reported.
pub fn validate_mapping(mapping: &ClassificationMapping) -> MappingValidation {
    let categories: HashSet<&str> = mapping.iter().map(|c| c.category.as_str()).collect();
    let mut owner: HashMap<&str, &str> = HashMap::new();
    let mut validation = MappingValidation::default();

    for entry in mapping.iter() {
        for object in &entry.objects {
            let key = (entry.category.clone(), object.clone());

            if categories.contains(object.as_str()) {
                validation.collisions.push(MappingCollision {
                    id: object.clone(),
                    kind: CollisionKind::CategoryAndObject,
                    kept_in: object.clone(),
                    skipped_in: entry.category.clone(),
                });
                validation.skipped.insert(key);
                continue;
            }

            match owner.get(object.as_str()) {
                Some(first) if *first == entry.category => {
                    validation.skipped.insert(key);
                }
                Some(first) => {
                    validation.collisions.push(MappingCollision {
                        id: object.clone(),
                        kind: CollisionKind::ObjectInMultipleCategories,
                        kept_in: first.to_string(),
                        skipped_in: entry.category.clone(),
                    });
                    validation.skipped.insert(key);
                }
                None => {
                    owner.insert(object.as_str(), entry.category.as_str());
                }
            }
        }
    }

    validation
}

/// Counters produced while building the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub categories_created: usize,
    pub objects_created: usize,
    /// Nodes that were already present.
    pub existing: usize,
    /// Catalog entries found under the created or reused object nodes.
    pub linked_mods: usize,
    /// Object nodes with no catalog entry yet.
    pub unlinked_objects: usize,
}

impl BuildReport {
    pub fn nodes_created(&self) -> usize {
        self.categories_created + self.objects_created
    }
}

/// Creates category and object nodes and reports their catalog links.
pub struct ClassificationTreeBuilder<'a> {
    store: &'a dyn ClassificationStore,
    catalog: &'a dyn ModCatalog,
}

impl<'a> ClassificationTreeBuilder<'a> {
    pub fn new(store: &'a dyn ClassificationStore, catalog: &'a dyn ModCatalog) -> Self {
        Self { store, catalog }
    }

    /// Build the whole mapping in parse order.
    pub fn build(
        &self,
        mapping: &ClassificationMapping,
        validation: &MappingValidation,
    ) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        for entry in mapping.iter() {
            self.build_category(entry, validation, &mut report)?;
        }
        Ok(report)
    }

    /// Create one category node and its object nodes.
    pub fn build_category(
        &self,
        entry: &CategoryObjects,
        validation: &MappingValidation,
        report: &mut BuildReport,
    ) -> Result<()> {
        let category = NewNode::named(
            entry.category.clone(),
            None,
            MigrationConfig::CATEGORY_PRIORITY,
        );
        match self.store.create_node(&category)? {
            CreateOutcome::Created(_) => report.categories_created += 1,
            CreateOutcome::AlreadyExists => report.existing += 1,
        }

        for object in &entry.objects {
            if !validation.accepts(&entry.category, object) {
                debug!("Skipping object {} of {}", object, entry.category);
                continue;
            }

            let node = NewNode::named(
                object.clone(),
                Some(entry.category.clone()),
                MigrationConfig::OBJECT_PRIORITY,
            );
            match self.store.create_node(&node)? {
                CreateOutcome::Created(_) => report.objects_created += 1,
                CreateOutcome::AlreadyExists => report.existing += 1,
            }

            let linked = self.catalog.get_by_category(object)?;
            if linked.is_empty() {
                info!("No mods found for classification {}", object);
                report.unlinked_objects += 1;
            } else {
                debug!("{} mods linked to {}", linked.len(), object);
                report.linked_mods += linked.len();
            }
        }

        Ok(())
    }
}
