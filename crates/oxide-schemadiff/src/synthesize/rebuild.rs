//! Table rebuilds for dialects that cannot alter tables in place.
//!
//! A rebuilt table is created under a staging name, filled from the old
//! table, swapped in, and given back its indexes, unique constraints and
//! triggers.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::dialect::MigrationDialect;
use crate::model::AttrKind;
use crate::object::NameMapper;
use crate::operations::{ObjectKind, ObjectRef, OpKind, Operation, OperationBatch};
use crate::schema::{ConstraintKind, TableSchema};

use super::{operation, SynthesisContext};

/// New names of the linked tables that need a rebuild.
pub(super) fn plan(ctx: &SynthesisContext<'_>) -> HashSet<String> {
    let mut rebuilt = HashSet::new();
    if !ctx.dialect.rebuilds_table_on_alter() {
        return rebuilt;
    }

    let mapper = NameMapper::new(ctx.correlation);
    for pt in &ctx.prev.snapshot.tables {
        let Some(new_name) = ctx.correlation.table_new(&pt.name) else {
            continue;
        };
        let Some(nt) = ctx.new.snapshot.get_table(new_name) else {
            continue;
        };
        if needs_rebuild(ctx, &mapper, pt, nt) {
            debug!(table = %nt.name, "Table will be rebuilt");
            rebuilt.insert(nt.name.clone());
        }
    }
    rebuilt
}

fn needs_rebuild(ctx: &SynthesisContext<'_>, mapper: &NameMapper<'_>, pt: &TableSchema, nt: &TableSchema) -> bool {
    let d = ctx.dialect;
    let corr = ctx.correlation;

    for pc in &pt.columns {
        let Some((_, name)) = corr.column_new(&pt.name, &pc.name) else {
            return true;
        };
        if *name != pc.name {
            return true;
        }
        let Some(nc) = nt.get_column(name) else {
            return true;
        };
        if d.column_definition(&mapper.column_schema(&pt.name, pc), None) != d.column_definition(nc, None) {
            return true;
        }
    }

    // ADD COLUMN cannot add key columns or NOT NULL columns without default.
    let needs_full_add = nt.columns.iter().any(|nc| {
        corr.column_prev(&nt.name, &nc.name).is_none()
            && (nc.primary_key || (!nc.nullable && nc.default.is_none()))
    });
    if needs_full_add {
        return true;
    }

    inline_constraints(d, &mapper.map_table(pt)) != inline_constraints(d, nt)
}

/// Constraint clauses that live inside `CREATE TABLE`.
fn inline_constraints(dialect: &dyn MigrationDialect, table: &TableSchema) -> Vec<String> {
    if dialect.supports_add_constraint() {
        return Vec::new();
    }
    let mut clauses: Vec<String> = table
        .foreign_keys
        .iter()
        .map(|f| dialect.foreign_key_clause(f))
        .collect();
    clauses.extend(
        table
            .constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Check { .. }))
            .map(|c| dialect.constraint_clause(c)),
    );
    clauses
}

/// The rebuild batch replacing `pt` by `nt`.
///
/// Runs after the rename pass, so the old table already carries the new
/// name while its columns keep their previous names.
pub(super) fn rebuild_batch(ctx: &SynthesisContext<'_>, pt: &TableSchema, nt: &TableSchema) -> OperationBatch {
    let d = ctx.dialect;
    let staging = format!("{}__new", nt.name);
    let object = ObjectRef::table(&nt.name);
    let mut batch = OperationBatch::new(object.clone());

    let staged = TableSchema {
        name: staging.clone(),
        ..nt.clone()
    };
    batch.push(Operation::new(OpKind::Create, object.clone(), d.create_table(&staged)));

    let (targets, sources) = copy_columns(ctx, pt, nt);
    if !targets.is_empty() {
        batch.push(Operation::new(
            OpKind::Alter,
            object.clone(),
            format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                d.quote_identifier(&staging),
                targets.join(", "),
                sources.join(", "),
                d.quote_identifier(&nt.name)
            ),
        ));
    }

    batch.push(Operation::new(OpKind::Drop, object.clone(), d.drop_table(&nt.name)));
    batch.push(operation(OpKind::Rename, object, d.rename_table(&staging, &nt.name)));

    for index in &nt.indexes {
        batch.push(operation(
            OpKind::Create,
            ObjectRef::new(ObjectKind::Index, nt.name.as_str(), index.name.as_str()),
            d.create_index(&nt.name, index),
        ));
    }
    for constraint in &nt.constraints {
        if matches!(constraint.kind, ConstraintKind::Unique { .. }) {
            batch.push(operation(
                OpKind::Create,
                ObjectRef::new(ObjectKind::Constraint, nt.name.as_str(), constraint.name.as_str()),
                d.add_constraint(&nt.name, constraint),
            ));
        }
    }
    for trigger in &nt.triggers {
        batch.push(operation(
            OpKind::Create,
            ObjectRef::new(ObjectKind::Trigger, nt.name.as_str(), trigger.name.as_str()),
            d.create_trigger(&nt.name, trigger),
        ));
    }

    debug!(table = %nt.name, operations = batch.operations.len(), "Built rebuild batch");
    batch
}

/// Target columns and source expressions of the copy.
fn copy_columns(ctx: &SynthesisContext<'_>, pt: &TableSchema, nt: &TableSchema) -> (Vec<String>, Vec<String>) {
    let d = ctx.dialect;
    let mut targets = Vec::new();
    let mut sources = Vec::new();

    for nc in &nt.columns {
        let initial = ctx
            .new
            .attribute_for_column(&nt.name, &nc.name)
            .filter(|(_, a)| a.columns.len() == 1)
            .and_then(|(_, a)| a.initial.as_ref());

        match ctx.correlation.column_prev(&nt.name, &nc.name) {
            Some((_, prev_name)) => {
                let source = d.quote_identifier(prev_name);
                let expr = match initial {
                    Some(value) if !nc.nullable => {
                        let value = d.render_value(value);
                        let prev_column = pt.get_column(prev_name);
                        let was_optional_string = ctx.options.empty_string_sentinel
                            && prev_column.is_some_and(|c| c.sql_type.is_textual())
                            && ctx
                                .prev
                                .attribute_for_column(&pt.name, prev_name)
                                .is_some_and(|(_, a)| a.kind == AttrKind::Optional);
                        if was_optional_string {
                            format!("COALESCE(NULLIF({}, ''), {})", source, value)
                        } else if prev_column.map_or(true, |c| c.nullable) {
                            format!("COALESCE({}, {})", source, value)
                        } else {
                            source
                        }
                    }
                    _ => source,
                };
                targets.push(d.quote_identifier(&nc.name));
                sources.push(expr);
            }
            None => match initial {
                Some(value) => {
                    targets.push(d.quote_identifier(&nc.name));
                    sources.push(d.render_value(value));
                }
                None => {
                    if !nc.nullable && nc.default.is_none() && !nc.auto_increment {
                        warn!(
                            table = %nt.name,
                            column = %nc.name,
                            "Rebuilt table gains a NOT NULL column without default or initial value"
                        );
                    }
                }
            },
        }
    }

    (targets, sources)
}
