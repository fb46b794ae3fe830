//! Correlation resolver.
//!
//! Links every object of the previous model version to its counterpart in
//! the new version: entities, attributes, tables, columns, and the named
//! objects (indexes, foreign keys, constraints, triggers). Explicit rename
//! hints are applied first; same-name matches fill in the rest.
//!
//! Links live in a [`Correlation`] built per diff run, so the models
//! themselves are never mutated.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::{debug, info};

use crate::error::{MigrationError, Result};
use crate::model::{Entity, Model, RenameHints};
use crate::operations::ObjectKind;
use crate::schema::{AttrRef, TableSchema};

/// A key that can be linked across model versions.
pub trait LinkKey: Clone + Eq + Hash {
    /// Human-readable form used in logs and errors.
    fn label(&self) -> String;
}

impl LinkKey for String {
    fn label(&self) -> String {
        self.clone()
    }
}

impl LinkKey for (String, String) {
    fn label(&self) -> String {
        format!("{}.{}", self.0, self.1)
    }
}

impl LinkKey for (ObjectKind, String) {
    fn label(&self) -> String {
        format!("{} {}", self.0, self.1)
    }
}

/// One-to-one, bidirectional links between previous and new keys.
#[derive(Debug, Clone)]
pub struct Links<K> {
    family: &'static str,
    prev_to_new: HashMap<K, K>,
    new_to_prev: HashMap<K, K>,
}

impl<K: LinkKey> Links<K> {
    /// Creates an empty link family.
    #[must_use]
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            prev_to_new: HashMap::new(),
            new_to_prev: HashMap::new(),
        }
    }

    /// Links `prev` with `new`.
    ///
    /// Re-linking the same pair is a no-op; linking either side to a
    /// different partner fails.
    pub fn link(&mut self, prev: K, new: K) -> Result<()> {
        let existing_new = self.prev_to_new.get(&prev);
        if existing_new == Some(&new) {
            return Ok(());
        }
        if let Some(other) = existing_new {
            return Err(MigrationError::AmbiguousRename {
                target: new.label(),
                reason: format!(
                    "{} '{}' is already correlated with '{}'",
                    self.family,
                    prev.label(),
                    other.label()
                ),
            });
        }
        if let Some(other) = self.new_to_prev.get(&new) {
            return Err(MigrationError::AmbiguousRename {
                target: new.label(),
                reason: format!(
                    "{} '{}' is already correlated with '{}'",
                    self.family,
                    new.label(),
                    other.label()
                ),
            });
        }

        debug!(family = self.family, prev = %prev.label(), new = %new.label(), "Correlated");
        self.prev_to_new.insert(prev.clone(), new.clone());
        self.new_to_prev.insert(new, prev);
        Ok(())
    }

    /// Links only if neither side is linked yet. Returns whether it linked.
    pub fn link_if_free(&mut self, prev: K, new: K) -> Result<bool> {
        if self.prev_to_new.contains_key(&prev) || self.new_to_prev.contains_key(&new) {
            return Ok(false);
        }
        self.link(prev, new)?;
        Ok(true)
    }

    /// The new counterpart of a previous key.
    #[must_use]
    pub fn new_of(&self, prev: &K) -> Option<&K> {
        self.prev_to_new.get(prev)
    }

    /// The previous counterpart of a new key.
    #[must_use]
    pub fn prev_of(&self, new: &K) -> Option<&K> {
        self.new_to_prev.get(new)
    }

    /// Returns true if the previous key has a counterpart.
    #[must_use]
    pub fn has_prev(&self, prev: &K) -> bool {
        self.prev_to_new.contains_key(prev)
    }

    /// Returns true if the new key has a counterpart.
    #[must_use]
    pub fn has_new(&self, new: &K) -> bool {
        self.new_to_prev.contains_key(new)
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prev_to_new.len()
    }

    /// Returns true if nothing is linked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prev_to_new.is_empty()
    }

    /// Iterates over `(prev, new)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &K)> {
        self.prev_to_new.iter()
    }
}

fn key(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

fn object_key(kind: ObjectKind, name: &str) -> (ObjectKind, String) {
    (kind, name.to_string())
}

/// All links established for one diff run.
#[derive(Debug, Clone)]
pub struct Correlation {
    /// Entity names.
    pub entities: Links<String>,
    /// `(entity, attribute)` pairs.
    pub attributes: Links<(String, String)>,
    /// Table names.
    pub tables: Links<String>,
    /// `(table, column)` pairs.
    pub columns: Links<(String, String)>,
    /// `(kind, name)` of indexes, foreign keys, constraints and triggers.
    pub objects: Links<(ObjectKind, String)>,
}

impl Default for Correlation {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlation {
    /// Creates an empty correlation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Links::new("entity"),
            attributes: Links::new("attribute"),
            tables: Links::new("table"),
            columns: Links::new("column"),
            objects: Links::new("object"),
        }
    }

    /// New name of a previous table.
    #[must_use]
    pub fn table_new(&self, prev: &str) -> Option<&str> {
        self.tables.new_of(&prev.to_string()).map(String::as_str)
    }

    /// Previous name of a new table.
    #[must_use]
    pub fn table_prev(&self, new: &str) -> Option<&str> {
        self.tables.prev_of(&new.to_string()).map(String::as_str)
    }

    /// New `(table, column)` of a previous column.
    #[must_use]
    pub fn column_new(&self, table: &str, column: &str) -> Option<&(String, String)> {
        self.columns.new_of(&key(table, column))
    }

    /// Previous `(table, column)` of a new column.
    #[must_use]
    pub fn column_prev(&self, table: &str, column: &str) -> Option<&(String, String)> {
        self.columns.prev_of(&key(table, column))
    }

    /// New name of a previous named object.
    #[must_use]
    pub fn object_new(&self, kind: ObjectKind, name: &str) -> Option<&str> {
        self.objects.new_of(&object_key(kind, name)).map(|(_, n)| n.as_str())
    }

    /// Previous name of a new named object.
    #[must_use]
    pub fn object_prev(&self, kind: ObjectKind, name: &str) -> Option<&str> {
        self.objects.prev_of(&object_key(kind, name)).map(|(_, n)| n.as_str())
    }

    /// New `(entity, attribute)` of a previous attribute.
    #[must_use]
    pub fn attribute_new(&self, entity: &str, attribute: &str) -> Option<&(String, String)> {
        self.attributes.new_of(&key(entity, attribute))
    }

    /// Previous `(entity, attribute)` of a new attribute.
    #[must_use]
    pub fn attribute_prev(&self, entity: &str, attribute: &str) -> Option<&(String, String)> {
        self.attributes.prev_of(&key(entity, attribute))
    }

    /// Maps previous column names of a table into the new name space.
    /// Returns `None` if any column has no counterpart.
    #[must_use]
    pub fn map_columns(&self, table: &str, columns: &[String]) -> Option<Vec<String>> {
        columns
            .iter()
            .map(|c| self.column_new(table, c).map(|(_, n)| n.clone()))
            .collect()
    }
}

/// Correlates two model versions.
pub fn correlate(prev: &Model, new: &Model, hints: &RenameHints) -> Result<Correlation> {
    let mut resolver = Resolver {
        prev,
        new,
        links: Correlation::new(),
    };

    resolver.rename_entities(hints)?;
    resolver.match_entities()?;
    resolver.rename_attributes(hints)?;
    resolver.match_attributes()?;
    resolver.check_primary_keys()?;
    resolver.link_attribute_columns()?;
    resolver.link_m2m_tables()?;
    resolver.link_free_tables()?;
    resolver.link_named_objects()?;
    resolver.link_structural_objects()?;

    info!(
        entities = resolver.links.entities.len(),
        tables = resolver.links.tables.len(),
        columns = resolver.links.columns.len(),
        objects = resolver.links.objects.len(),
        "Correlation resolved"
    );
    Ok(resolver.links)
}

struct Resolver<'a> {
    prev: &'a Model,
    new: &'a Model,
    links: Correlation,
}

impl<'a> Resolver<'a> {
    /// Linked entity pairs, in previous declaration order.
    fn entity_pairs(&self) -> Vec<(&'a Entity, &'a Entity)> {
        self.prev
            .entities
            .iter()
            .filter_map(|pe| {
                let new_name = self.links.entities.new_of(&pe.name)?;
                let ne = self.new.get_entity(new_name)?;
                Some((pe, ne))
            })
            .collect()
    }

    /// Linked table pairs, in previous creation order.
    fn table_pairs(&self) -> Vec<(&'a TableSchema, &'a TableSchema)> {
        self.prev
            .snapshot
            .tables
            .iter()
            .filter_map(|pt| {
                let new_name = self.links.table_new(&pt.name)?;
                let nt = self.new.snapshot.get_table(new_name)?;
                Some((pt, nt))
            })
            .collect()
    }

    fn rename_entities(&mut self, hints: &RenameHints) -> Result<()> {
        for rename in &hints.entities {
            if self.prev.get_entity(&rename.from).is_none() {
                return Err(MigrationError::UnknownEntity {
                    name: rename.from.clone(),
                    side: "previous",
                });
            }
            if self.new.get_entity(&rename.to).is_none() {
                return Err(MigrationError::UnknownEntity {
                    name: rename.to.clone(),
                    side: "new",
                });
            }
            let occupied = rename.from != rename.to
                && self.prev.get_entity(&rename.to).is_some()
                && !hints.entities.iter().any(|r| r.from == rename.to);
            if occupied {
                return Err(MigrationError::AmbiguousRename {
                    target: rename.to.clone(),
                    reason: format!(
                        "entity '{}' already exists in the previous model and is not renamed",
                        rename.to
                    ),
                });
            }
            self.links
                .entities
                .link(rename.from.clone(), rename.to.clone())?;
        }
        Ok(())
    }

    fn match_entities(&mut self) -> Result<()> {
        for pe in &self.prev.entities {
            if self.new.get_entity(&pe.name).is_some() {
                self.links
                    .entities
                    .link_if_free(pe.name.clone(), pe.name.clone())?;
            }
        }

        for (pe, ne) in self.entity_pairs() {
            if pe.is_root() && ne.is_root() {
                self.links.tables.link(pe.table.clone(), ne.table.clone())?;
            }
        }
        Ok(())
    }

    fn rename_attributes(&mut self, hints: &RenameHints) -> Result<()> {
        for rename in &hints.attributes {
            let Some(ne) = self.new.get_entity(&rename.entity) else {
                return Err(MigrationError::UnknownEntity {
                    name: rename.entity.clone(),
                    side: "new",
                });
            };
            let Some(pe) = self
                .links
                .entities
                .prev_of(&ne.name)
                .and_then(|name| self.prev.get_entity(name))
            else {
                return Err(MigrationError::UncorrelatedEntity {
                    entity: rename.entity.clone(),
                    attribute: rename.from.clone(),
                });
            };
            if pe.get_attribute(&rename.from).is_none() {
                return Err(MigrationError::UnknownAttribute {
                    entity: pe.name.clone(),
                    attribute: rename.from.clone(),
                    side: "previous",
                });
            }
            if ne.get_attribute(&rename.to).is_none() {
                return Err(MigrationError::UnknownAttribute {
                    entity: ne.name.clone(),
                    attribute: rename.to.clone(),
                    side: "new",
                });
            }
            self.links
                .attributes
                .link(key(&pe.name, &rename.from), key(&ne.name, &rename.to))?;
        }
        Ok(())
    }

    fn match_attributes(&mut self) -> Result<()> {
        for (pe, ne) in self.entity_pairs() {
            for pa in &pe.attributes {
                if ne.get_attribute(&pa.name).is_some() {
                    self.links
                        .attributes
                        .link_if_free(key(&pe.name, &pa.name), key(&ne.name, &pa.name))?;
                }
            }
        }
        Ok(())
    }

    fn check_primary_keys(&self) -> Result<()> {
        for (pe, ne) in self.entity_pairs() {
            let changed = || MigrationError::PrimaryKeyChange {
                owner: ne.name.clone(),
            };

            if pe.is_root() != ne.is_root() {
                return Err(changed());
            }
            if !pe.is_root() {
                // A derived entity takes its key from its hierarchy root.
                if let (Some(pr), Some(nr)) = (self.prev.root_of(pe), self.new.root_of(ne)) {
                    if self.links.entities.new_of(&pr.name) != Some(&nr.name) {
                        return Err(changed());
                    }
                }
                continue;
            }

            for pk in &pe.primary_key {
                match self.links.attribute_new(&pe.name, pk) {
                    Some((_, na)) if ne.primary_key.contains(na) => {}
                    _ => return Err(changed()),
                }
            }
            for pk in &ne.primary_key {
                match self.links.attribute_prev(&ne.name, pk) {
                    Some((_, pa)) if pe.primary_key.contains(pa) => {}
                    _ => return Err(changed()),
                }
            }

            let prev_table = self.prev.snapshot.get_table(&pe.table);
            let new_table = self.new.snapshot.get_table(&ne.table);
            let (Some(prev_table), Some(new_table)) = (prev_table, new_table) else {
                continue;
            };
            for pk in &pe.primary_key {
                let Some((_, new_pk)) = self.links.attribute_new(&pe.name, pk) else {
                    continue;
                };
                let (Some(pa), Some(na)) = (pe.get_attribute(pk), ne.get_attribute(new_pk)) else {
                    continue;
                };
                if pa.columns.len() != na.columns.len() {
                    return Err(changed());
                }
                for (pc, nc) in pa.columns.iter().zip(&na.columns) {
                    let (Some(pc), Some(nc)) = (prev_table.get_column(pc), new_table.get_column(nc))
                    else {
                        continue;
                    };
                    if pc.sql_type != nc.sql_type || pc.auto_increment != nc.auto_increment {
                        return Err(changed());
                    }
                }
            }
        }
        Ok(())
    }

    fn link_attribute_columns(&mut self) -> Result<()> {
        for (pe, ne) in self.entity_pairs() {
            for pa in &pe.attributes {
                let Some((_, new_attr)) = self.links.attribute_new(&pe.name, &pa.name).cloned() else {
                    continue;
                };
                let Some(na) = ne.get_attribute(&new_attr) else {
                    continue;
                };
                if pa.columns.len() != na.columns.len() {
                    return Err(MigrationError::ColumnCountMismatch {
                        entity: ne.name.clone(),
                        attribute: na.name.clone(),
                        prev: pa.columns.len(),
                        new: na.columns.len(),
                    });
                }
                if self.links.table_new(&pe.table) != Some(ne.table.as_str()) {
                    continue;
                }
                for (pc, nc) in pa.columns.iter().zip(&na.columns) {
                    self.links
                        .columns
                        .link(key(&pe.table, pc), key(&ne.table, nc))?;
                }
            }
        }
        Ok(())
    }

    fn link_m2m_tables(&mut self) -> Result<()> {
        for pt in &self.prev.snapshot.tables {
            if !pt.is_m2m() || self.links.tables.has_prev(&pt.name) {
                continue;
            }
            let first = &pt.m2m[0];
            let Some((entity, attribute)) = self
                .links
                .attribute_new(&first.entity, &first.attribute)
                .cloned()
            else {
                continue;
            };
            let participant = AttrRef::new(entity, attribute);
            let Some(nt) = self
                .new
                .snapshot
                .tables
                .iter()
                .find(|t| t.m2m.contains(&participant) && !self.links.tables.has_new(&t.name))
            else {
                continue;
            };

            if pt.columns.len() != nt.columns.len() {
                return Err(MigrationError::ColumnCountMismatch {
                    entity: participant.entity,
                    attribute: participant.attribute,
                    prev: pt.columns.len(),
                    new: nt.columns.len(),
                });
            }
            self.links.tables.link(pt.name.clone(), nt.name.clone())?;
            for (pc, nc) in pt.columns.iter().zip(&nt.columns) {
                self.links
                    .columns
                    .link(key(&pt.name, &pc.name), key(&nt.name, &nc.name))?;
            }
        }
        Ok(())
    }

    fn link_free_tables(&mut self) -> Result<()> {
        for pt in &self.prev.snapshot.tables {
            if pt.is_m2m() || self.prev.owns_table(&pt.name) {
                continue;
            }
            let Some(nt) = self.new.snapshot.get_table(&pt.name) else {
                continue;
            };
            if nt.is_m2m() || self.new.owns_table(&nt.name) {
                continue;
            }
            if !self.links.tables.link_if_free(pt.name.clone(), nt.name.clone())? {
                continue;
            }
            for pc in &pt.columns {
                if nt.get_column(&pc.name).is_some() {
                    self.links
                        .columns
                        .link(key(&pt.name, &pc.name), key(&nt.name, &pc.name))?;
                }
            }
        }
        Ok(())
    }

    fn link_named_objects(&mut self) -> Result<()> {
        for (pt, nt) in self.table_pairs() {
            for index in &pt.indexes {
                if nt.indexes.iter().any(|i| i.name == index.name) {
                    self.link_object(ObjectKind::Index, &index.name, &index.name)?;
                }
            }
            for fk in &pt.foreign_keys {
                if nt.foreign_keys.iter().any(|f| f.name == fk.name) {
                    self.link_object(ObjectKind::ForeignKey, &fk.name, &fk.name)?;
                }
            }
            for constraint in &pt.constraints {
                if nt.constraints.iter().any(|c| c.name == constraint.name) {
                    self.link_object(ObjectKind::Constraint, &constraint.name, &constraint.name)?;
                }
            }
            for trigger in &pt.triggers {
                if nt.triggers.iter().any(|t| t.name == trigger.name) {
                    self.link_object(ObjectKind::Trigger, &trigger.name, &trigger.name)?;
                }
            }
        }
        Ok(())
    }

    fn link_object(&mut self, kind: ObjectKind, prev: &str, new: &str) -> Result<bool> {
        self.links
            .objects
            .link_if_free(object_key(kind, prev), object_key(kind, new))
    }

    fn is_object_linked(&self, kind: ObjectKind, prev: Option<&str>, new: Option<&str>) -> bool {
        prev.is_some_and(|p| self.links.objects.has_prev(&object_key(kind, p)))
            || new.is_some_and(|n| self.links.objects.has_new(&object_key(kind, n)))
    }

    // Pairs still-unlinked objects whose columns correspond through the
    // column links, which is how derived names like `fk_<table>__<col>`
    // follow a table rename.
    fn link_structural_objects(&mut self) -> Result<()> {
        for (pt, nt) in self.table_pairs() {
            for index in &pt.indexes {
                if self.is_object_linked(ObjectKind::Index, Some(&index.name), None) {
                    continue;
                }
                let Some(mapped) = self.links.map_columns(&pt.name, &index.columns) else {
                    continue;
                };
                let candidate = nt.indexes.iter().find(|i| {
                    i.columns == mapped
                        && i.unique == index.unique
                        && !self.is_object_linked(ObjectKind::Index, None, Some(&i.name))
                });
                if let Some(candidate) = candidate {
                    self.link_object(ObjectKind::Index, &index.name, &candidate.name)?;
                }
            }

            for fk in &pt.foreign_keys {
                if self.is_object_linked(ObjectKind::ForeignKey, Some(&fk.name), None) {
                    continue;
                }
                let Some(mapped) = self.links.map_columns(&pt.name, &fk.columns) else {
                    continue;
                };
                let Some(target) = self.links.table_new(&fk.references_table) else {
                    continue;
                };
                let Some(mapped_refs) = self
                    .links
                    .map_columns(&fk.references_table, &fk.references_columns)
                else {
                    continue;
                };
                let candidate = nt.foreign_keys.iter().find(|f| {
                    f.columns == mapped
                        && f.references_table == target
                        && f.references_columns == mapped_refs
                        && !self.is_object_linked(ObjectKind::ForeignKey, None, Some(&f.name))
                });
                if let Some(candidate) = candidate {
                    self.link_object(ObjectKind::ForeignKey, &fk.name, &candidate.name)?;
                }
            }

            for constraint in &pt.constraints {
                if constraint.columns().is_empty()
                    || self.is_object_linked(ObjectKind::Constraint, Some(&constraint.name), None)
                {
                    continue;
                }
                let Some(mapped) = self.links.map_columns(&pt.name, constraint.columns()) else {
                    continue;
                };
                let candidate = nt.constraints.iter().find(|c| {
                    c.columns() == mapped.as_slice()
                        && !self.is_object_linked(ObjectKind::Constraint, None, Some(&c.name))
                });
                if let Some(candidate) = candidate {
                    self.link_object(ObjectKind::Constraint, &constraint.name, &candidate.name)?;
                }
            }
        }
        Ok(())
    }
}
