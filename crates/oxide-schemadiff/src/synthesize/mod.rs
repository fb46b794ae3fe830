//! Operation synthesizer.
//!
//! Compares the two snapshots object by object through the correlation and
//! produces unordered [`Step`]s:
//!
//! 1. new-side pass: create what has no counterpart, alter what changed;
//! 2. previous-side pass: drop what has no counterpart;
//! 3. rename pass: one batch of renames per surviving table;
//! 4. backfill pass: `UPDATE`s for attributes that became required.
//!
//! Dialects that cannot alter tables in place get a rebuild batch per
//! changed table instead of per-object alters.

mod backfill;
mod rebuild;

use std::collections::HashSet;

use tracing::{debug, info};

use crate::correlate::Correlation;
use crate::dialect::{Fragment, MigrationDialect};
use crate::error::{MigrationError, Result};
use crate::model::Model;
use crate::object::{find_object, objects_to_create, NameMapper, SchemaObject};
use crate::operations::{ObjectKind, ObjectRef, OpKind, Operation, OperationBatch, Step};
use crate::schema::{ConstraintKind, SchemaSnapshot, TableSchema};

/// Options for a diff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Treat `''` like NULL when backfilling attributes that were optional
    /// strings.
    pub empty_string_sentinel: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            empty_string_sentinel: true,
        }
    }
}

/// Everything the synthesizer reads.
#[derive(Clone, Copy)]
pub struct SynthesisContext<'a> {
    /// Previous model version.
    pub prev: &'a Model,
    /// New model version.
    pub new: &'a Model,
    /// Links between the two.
    pub correlation: &'a Correlation,
    /// Target dialect.
    pub dialect: &'a dyn MigrationDialect,
    /// Run options.
    pub options: &'a DiffOptions,
}

/// Synthesizes the steps turning `ctx.prev` into `ctx.new`.
pub fn synthesize(ctx: &SynthesisContext<'_>) -> Result<Vec<Step>> {
    let mut synth = Synthesizer::new(ctx);
    synth.new_side()?;
    synth.prev_side();
    synth.renames();
    synth.required_backfills();

    info!(
        dialect = ctx.dialect.name(),
        steps = synth.steps.len(),
        rebuilt_tables = synth.rebuilt.len(),
        "Synthesized migration steps"
    );
    Ok(synth.steps)
}

pub(crate) fn operation(kind: OpKind, object: ObjectRef, fragment: Fragment) -> Operation {
    Operation::new(kind, object, fragment.sql).with_prefix(fragment.prefix)
}

struct Synthesizer<'a> {
    ctx: &'a SynthesisContext<'a>,
    mapper: NameMapper<'a>,
    steps: Vec<Step>,
    /// New names of tables replaced by a rebuild batch.
    rebuilt: HashSet<String>,
    /// Previous `(kind, name)` of objects dropped and created again.
    recreated: HashSet<(ObjectKind, String)>,
    /// New `(table, column)` pairs already backfilled.
    backfilled: HashSet<(String, String)>,
}

impl<'a> Synthesizer<'a> {
    fn new(ctx: &'a SynthesisContext<'a>) -> Self {
        Self {
            ctx,
            mapper: NameMapper::new(ctx.correlation),
            steps: Vec::new(),
            rebuilt: rebuild::plan(ctx),
            recreated: HashSet::new(),
            backfilled: HashSet::new(),
        }
    }

    fn prev_snapshot(&self) -> &'a SchemaSnapshot {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        &ctx.prev.snapshot
    }

    fn new_snapshot(&self) -> &'a SchemaSnapshot {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        &ctx.new.snapshot
    }

    fn push(&mut self, step: Step) {
        for op in step.operations() {
            debug!(
                kind = op.kind.as_str(),
                object = %op.object.kind,
                table = %op.object.table,
                name = %op.object.name,
                "Synthesized operation"
            );
        }
        self.steps.push(step);
    }

    fn push_op(&mut self, kind: OpKind, object: ObjectRef, fragment: Fragment) {
        self.push(Step::Single(operation(kind, object, fragment)));
    }

    fn is_rebuilt(&self, table: &str) -> bool {
        self.rebuilt.contains(table)
    }

    // --- new-side pass ---

    fn new_side(&mut self) -> Result<()> {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        for object in objects_to_create(self.new_snapshot(), ctx.dialect) {
            match self.counterpart(object) {
                None => self.create(object),
                Some(prev) => self.alter(prev, object)?,
            }
        }
        Ok(())
    }

    fn counterpart(&self, object: SchemaObject<'a>) -> Option<SchemaObject<'a>> {
        let corr: &'a Correlation = self.ctx.correlation;
        let prev = self.prev_snapshot();
        match object {
            SchemaObject::Table(t) => corr
                .table_prev(&t.name)
                .and_then(|name| prev.get_table(name))
                .map(SchemaObject::Table),
            SchemaObject::Column(t, c) => {
                let (table, column) = corr.column_prev(&t.name, &c.name)?;
                let table = prev.get_table(table)?;
                let column = table.get_column(column)?;
                Some(SchemaObject::Column(table, column))
            }
            other => {
                let name = corr.object_prev(other.kind(), other.name())?;
                find_object(prev, other.kind(), name)
            }
        }
    }

    fn create(&mut self, object: SchemaObject<'a>) {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        let d = ctx.dialect;
        let object_ref = object.object_ref();
        match object {
            SchemaObject::Table(t) => {
                self.push_op(OpKind::Create, object_ref, Fragment::new(d.create_table(t)));
            }
            SchemaObject::Column(t, c) => {
                // Columns of new tables are part of CREATE TABLE.
                if ctx.correlation.table_prev(&t.name).is_none() || self.is_rebuilt(&t.name) {
                    return;
                }
                let step = backfill::added_column(ctx, t, c, &mut self.backfilled);
                self.push(step);
            }
            SchemaObject::Index(t, i) => {
                if !self.is_rebuilt(&t.name) {
                    self.push_op(OpKind::Create, object_ref, d.create_index(&t.name, i));
                }
            }
            SchemaObject::ForeignKey(t, f) => {
                self.push_op(OpKind::Create, object_ref, d.add_foreign_key(&t.name, f));
            }
            SchemaObject::Constraint(t, c) => {
                if !self.is_rebuilt(&t.name) {
                    self.push_op(OpKind::Create, object_ref, d.add_constraint(&t.name, c));
                }
            }
            SchemaObject::Trigger(t, tr) => {
                if !self.is_rebuilt(&t.name) {
                    self.push_op(OpKind::Create, object_ref, d.create_trigger(&t.name, tr));
                }
            }
        }
    }

    /// Create text of a previous object rendered under its new names.
    fn mapped_text(&self, prev: SchemaObject<'_>) -> String {
        let d = self.ctx.dialect;
        let m = &self.mapper;
        match prev {
            SchemaObject::Table(pt) => d.create_table(&m.map_table(pt)),
            SchemaObject::Column(pt, pc) => d.column_definition(&m.column_schema(&pt.name, pc), None),
            SchemaObject::Index(pt, i) => d
                .create_index(m.table(&pt.name), &m.index(&pt.name, i))
                .statement(),
            SchemaObject::ForeignKey(pt, f) => d
                .add_foreign_key(m.table(&pt.name), &m.foreign_key(&pt.name, f))
                .statement(),
            SchemaObject::Constraint(pt, c) => d
                .add_constraint(m.table(&pt.name), &m.constraint(&pt.name, c))
                .statement(),
            SchemaObject::Trigger(pt, tr) => d
                .create_trigger(m.table(&pt.name), &m.trigger(tr))
                .statement(),
        }
    }

    fn alter(&mut self, prev: SchemaObject<'a>, new: SchemaObject<'a>) -> Result<()> {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        match (prev, new) {
            (SchemaObject::Table(pt), SchemaObject::Table(t)) => {
                let mapped_pk: Vec<&str> = pt
                    .primary_key
                    .iter()
                    .map(|c| self.mapper.column(&pt.name, c))
                    .collect();
                if mapped_pk != t.primary_key.iter().map(String::as_str).collect::<Vec<_>>() {
                    return Err(MigrationError::PrimaryKeyChange {
                        owner: t.name.clone(),
                    });
                }
                if self.is_rebuilt(&t.name) {
                    let batch = rebuild::rebuild_batch(ctx, pt, t);
                    if let Some(step) = batch.into_step() {
                        self.push(step);
                    }
                }
            }
            (SchemaObject::Column(pt, pc), SchemaObject::Column(t, c)) => {
                if self.is_rebuilt(&t.name) || self.mapped_text(prev) == new.create_text(ctx.dialect) {
                    return Ok(());
                }
                if pc.primary_key || c.primary_key {
                    return Err(MigrationError::PrimaryKeyChange {
                        owner: t.name.clone(),
                    });
                }
                let step = backfill::altered_column(ctx, &self.mapper, pt, pc, t, c, &mut self.backfilled);
                if let Some(step) = step {
                    self.push(step);
                }
            }
            _ => {
                if prev.kind() != new.kind() {
                    return Err(MigrationError::Inconsistency(format!(
                        "{} '{}' correlated with {} '{}'",
                        prev.kind(),
                        prev.name(),
                        new.kind(),
                        new.name()
                    )));
                }
                if self.is_rebuilt(&new.table().name) || self.mapped_text(prev) == new.create_text(ctx.dialect) {
                    return Ok(());
                }
                self.recreate(prev, new);
            }
        }
        Ok(())
    }

    /// Drops the previous definition and creates the new one as separate
    /// steps so the drop sorts with its drop class.
    fn recreate(&mut self, prev: SchemaObject<'a>, new: SchemaObject<'a>) {
        let d = self.ctx.dialect;
        let new_table = new.table().name.as_str();
        let (object, fragment) = match prev {
            SchemaObject::Index(pt, i) => (
                ObjectRef::new(ObjectKind::Index, pt.name.as_str(), i.name.as_str()),
                d.drop_index(&pt.name, &i.name),
            ),
            SchemaObject::ForeignKey(pt, f) => (
                ObjectRef::new(ObjectKind::ForeignKey, pt.name.as_str(), f.name.as_str()),
                d.drop_foreign_key(&pt.name, &f.name),
            ),
            SchemaObject::Trigger(pt, tr) => (
                ObjectRef::new(ObjectKind::Trigger, pt.name.as_str(), tr.name.as_str()),
                d.drop_trigger(&pt.name, &tr.name),
            ),
            // Constraint drops run after renames, against the new table name.
            SchemaObject::Constraint(_, c) => (
                ObjectRef::new(ObjectKind::Constraint, new_table, c.name.as_str()),
                d.drop_constraint(new_table, c),
            ),
            SchemaObject::Table(_) | SchemaObject::Column(..) => return,
        };
        self.recreated.insert((prev.kind(), prev.name().to_string()));
        self.push_op(OpKind::Drop, object, fragment);
        self.create(new);
    }

    // --- previous-side pass ---

    fn prev_side(&mut self) {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        let (foreign_keys, rest): (Vec<_>, Vec<_>) = objects_to_create(self.prev_snapshot(), ctx.dialect)
            .into_iter()
            .partition(|o| o.kind() == ObjectKind::ForeignKey);

        for object in foreign_keys.into_iter().chain(rest.into_iter().rev()) {
            if !self.has_counterpart(object) {
                self.drop(object);
            }
        }
    }

    fn has_counterpart(&self, object: SchemaObject<'_>) -> bool {
        let corr = self.ctx.correlation;
        match object {
            SchemaObject::Table(t) => corr.table_new(&t.name).is_some(),
            SchemaObject::Column(t, c) => corr.column_new(&t.name, &c.name).is_some(),
            other => corr.object_new(other.kind(), other.name()).is_some(),
        }
    }

    fn any_column_dropped(&self, table: &str, columns: &[String]) -> bool {
        columns
            .iter()
            .any(|c| self.ctx.correlation.column_new(table, c).is_none())
    }

    fn drop(&mut self, object: SchemaObject<'a>) {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        let corr: &'a Correlation = ctx.correlation;
        let d = ctx.dialect;
        let table = object.table();
        let new_table = corr.table_new(&table.name);

        match object {
            SchemaObject::Table(pt) => {
                self.push_op(
                    OpKind::Drop,
                    object.object_ref(),
                    Fragment::new(d.drop_table(&pt.name)),
                );
            }
            SchemaObject::ForeignKey(pt, f) => {
                // Goes away with its table unless the referenced table is
                // dropped too, in which case table drop order would matter.
                if new_table.is_none() && corr.table_new(&f.references_table).is_some() {
                    return;
                }
                self.push_op(OpKind::Drop, object.object_ref(), d.drop_foreign_key(&pt.name, &f.name));
            }
            _ => {
                let Some(new_table) = new_table else {
                    return;
                };
                if self.is_rebuilt(new_table) {
                    return;
                }
                let cascades = d.drop_column_cascades();
                match object {
                    SchemaObject::Trigger(pt, tr) => {
                        self.push_op(OpKind::Drop, object.object_ref(), d.drop_trigger(&pt.name, &tr.name));
                    }
                    SchemaObject::Index(pt, i) => {
                        if cascades && self.any_column_dropped(&pt.name, &i.columns) {
                            return;
                        }
                        self.push_op(OpKind::Drop, object.object_ref(), d.drop_index(&pt.name, &i.name));
                    }
                    SchemaObject::Constraint(pt, c) => {
                        if cascades && self.any_column_dropped(&pt.name, c.columns()) {
                            return;
                        }
                        self.push_op(
                            OpKind::Drop,
                            ObjectRef::new(ObjectKind::Constraint, new_table, c.name.as_str()),
                            d.drop_constraint(new_table, c),
                        );
                    }
                    SchemaObject::Column(_, c) => {
                        self.push_op(
                            OpKind::Drop,
                            ObjectRef::new(ObjectKind::Column, new_table, c.name.as_str()),
                            d.drop_column(new_table, &c.name),
                        );
                    }
                    SchemaObject::Table(_) | SchemaObject::ForeignKey(..) => {}
                }
            }
        }
    }

    // --- rename pass ---

    fn renames(&mut self) {
        let ctx: &'a SynthesisContext<'a> = self.ctx;
        let corr: &'a Correlation = ctx.correlation;
        let d = ctx.dialect;

        for pt in &self.prev_snapshot().tables {
            let Some(new_name) = corr.table_new(&pt.name) else {
                continue;
            };

            let mut batch = OperationBatch::new(ObjectRef::table(new_name));
            if pt.name != new_name {
                batch.push(operation(
                    OpKind::Rename,
                    ObjectRef::table(new_name),
                    d.rename_table(&pt.name, new_name),
                ));
            }

            // A rebuilt table is renamed in place first so references from
            // other tables follow it; the rebuild recreates everything else.
            if self.is_rebuilt(new_name) {
                if let Some(step) = batch.into_step() {
                    self.push(step);
                }
                continue;
            }

            if !d.rebuilds_table_on_alter() {
                for pc in &pt.columns {
                    if let Some((_, nc)) = corr.column_new(&pt.name, &pc.name) {
                        if *nc != pc.name {
                            batch.push(operation(
                                OpKind::Rename,
                                ObjectRef::new(ObjectKind::Column, new_name, nc.as_str()),
                                d.rename_column(new_name, &pc.name, nc),
                            ));
                        }
                    }
                }
            }

            for (kind, old) in renameable_objects(pt, d) {
                let Some(new_object) = corr.object_new(kind, old) else {
                    continue;
                };
                if new_object == old || self.recreated.contains(&(kind, old.to_string())) {
                    continue;
                }
                let fragment = match kind {
                    ObjectKind::Index => d.rename_index(new_name, old, new_object),
                    ObjectKind::Trigger => d.rename_trigger(new_name, old, new_object),
                    _ => d.rename_constraint(new_name, old, new_object),
                };
                match fragment {
                    Some(fragment) => batch.push(operation(
                        OpKind::Rename,
                        ObjectRef::new(kind, new_name, new_object),
                        fragment,
                    )),
                    None => {
                        let prev = find_object(self.prev_snapshot(), kind, old);
                        let new = find_object(self.new_snapshot(), kind, new_object);
                        if let (Some(prev), Some(new)) = (prev, new) {
                            self.recreate(prev, new);
                        }
                    }
                }
            }

            if let Some(step) = batch.into_step() {
                self.push(step);
            }
        }
    }

    // --- backfill pass ---

    fn required_backfills(&mut self) {
        let steps = backfill::required_backfills(self.ctx, &self.rebuilt, &self.backfilled);
        for step in steps {
            self.push(step);
        }
    }
}

/// Named objects of a table in rename order: foreign keys, constraints,
/// indexes, triggers. Inline constraints are left to table rebuilds.
fn renameable_objects<'t>(table: &'t TableSchema, dialect: &dyn MigrationDialect) -> Vec<(ObjectKind, &'t str)> {
    let separate = dialect.supports_add_constraint();
    let mut objects = Vec::new();
    if separate {
        objects.extend(
            table
                .foreign_keys
                .iter()
                .map(|f| (ObjectKind::ForeignKey, f.name.as_str())),
        );
    }
    objects.extend(
        table
            .constraints
            .iter()
            .filter(|c| separate || matches!(c.kind, ConstraintKind::Unique { .. }))
            .map(|c| (ObjectKind::Constraint, c.name.as_str())),
    );
    objects.extend(table.indexes.iter().map(|i| (ObjectKind::Index, i.name.as_str())));
    objects.extend(table.triggers.iter().map(|t| (ObjectKind::Trigger, t.name.as_str())));
    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::correlate;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use crate::model::RenameHints;
    use crate::schema::{ColumnSchema, IndexSchema, SqlType};

    fn bare(index: &str) -> Model {
        Model::new(
            Vec::new(),
            SchemaSnapshot::new().table(
                TableSchema::new("t")
                    .column(ColumnSchema::new("id", SqlType::Integer).primary_key())
                    .column(ColumnSchema::new("a", SqlType::Text))
                    .index(IndexSchema::new(index, &["a"])),
            ),
        )
    }

    fn run(dialect: &dyn MigrationDialect, prev: &Model, new: &Model) -> Vec<Operation> {
        let correlation = correlate(prev, new, &RenameHints::new()).unwrap();
        let options = DiffOptions::default();
        let ctx = SynthesisContext {
            prev,
            new,
            correlation: &correlation,
            dialect,
            options: &options,
        };
        synthesize(&ctx)
            .unwrap()
            .into_iter()
            .flat_map(Step::into_operations)
            .collect()
    }

    #[test]
    fn test_index_rename_in_place() {
        let ops = run(&PostgresDialect::new(), &bare("idx_old"), &bare("idx_new"));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Rename);
        assert_eq!(ops[0].statement(), "ALTER INDEX \"idx_old\" RENAME TO \"idx_new\"");
    }

    #[test]
    fn test_index_rename_falls_back_to_recreate() {
        let ops = run(&SqliteDialect::new(), &bare("idx_old"), &bare("idx_new"));
        let sql: Vec<String> = ops.iter().map(Operation::statement).collect();
        assert_eq!(
            sql,
            vec!["DROP INDEX \"idx_old\"", "CREATE INDEX \"idx_new\" ON \"t\" (\"a\")"]
        );
        assert_eq!(ops[0].kind, OpKind::Drop);
    }

    #[test]
    fn test_free_table_key_change_fails() {
        let mut new = bare("idx_old");
        new.snapshot.tables[0].primary_key = vec!["id".to_string(), "a".to_string()];
        let correlation = correlate(&bare("idx_old"), &new, &RenameHints::new()).unwrap();
        let options = DiffOptions::default();
        let prev = bare("idx_old");
        let ctx = SynthesisContext {
            prev: &prev,
            new: &new,
            correlation: &correlation,
            dialect: &PostgresDialect::new(),
            options: &options,
        };
        assert!(matches!(
            synthesize(&ctx),
            Err(MigrationError::PrimaryKeyChange { .. })
        ));
    }

    #[test]
    fn test_renameable_objects_skip_inline_foreign_keys() {
        let table = TableSchema::new("t")
            .foreign_key(crate::schema::ForeignKeySchema::new("fk", &["a"], "u", &["id"]))
            .index(IndexSchema::new("idx", &["a"]));
        let pg = renameable_objects(&table, &PostgresDialect::new());
        let lite = renameable_objects(&table, &SqliteDialect::new());
        assert_eq!(pg, vec![(ObjectKind::ForeignKey, "fk"), (ObjectKind::Index, "idx")]);
        assert_eq!(lite, vec![(ObjectKind::Index, "idx")]);
    }
}
