//! Default-value backfills.
//!
//! Existing rows must satisfy a column that becomes (or is added as)
//! `NOT NULL`. When the owning attribute declares an initial value, that
//! value fills the gap: through a temporary column default for added
//! columns, through an `UPDATE` for existing ones.

use std::collections::HashSet;

use tracing::warn;

use crate::dialect::ColumnChange;
use crate::model::{AttrKind, Model};
use crate::object::NameMapper;
use crate::operations::{ObjectKind, ObjectRef, OpKind, Operation, OperationBatch, Step};
use crate::schema::{ColumnSchema, TableSchema, Value};
use crate::sql::{Expr, UpdateStatement};

use super::{operation, SynthesisContext};

/// Initial value of the attribute owning a column, if it owns only that
/// column.
fn initial_value<'m>(model: &'m Model, table: &str, column: &str) -> Option<&'m Value> {
    let (entity, attribute) = model.attribute_for_column(table, column)?;
    let initial = attribute.initial.as_ref()?;
    if attribute.columns.len() != 1 {
        warn!(
            entity = %entity.name,
            attribute = %attribute.name,
            "Skipping backfill of a multi-column attribute"
        );
        return None;
    }
    Some(initial)
}

/// `ADD COLUMN`, with a temporary default when a `NOT NULL` column needs
/// one for existing rows.
pub(super) fn added_column(
    ctx: &SynthesisContext<'_>,
    table: &TableSchema,
    column: &ColumnSchema,
    backfilled: &mut HashSet<(String, String)>,
) -> Step {
    let d = ctx.dialect;
    let object = ObjectRef::new(ObjectKind::Column, table.name.as_str(), column.name.as_str());

    if column.nullable || column.default.is_some() {
        return Step::Single(operation(OpKind::Create, object, d.add_column(&table.name, column, None)));
    }

    let Some(initial) = initial_value(ctx.new, &table.name, &column.name) else {
        warn!(
            table = %table.name,
            column = %column.name,
            "Adding a NOT NULL column without default or initial value"
        );
        return Step::Single(operation(OpKind::Create, object, d.add_column(&table.name, column, None)));
    };

    backfilled.insert((table.name.clone(), column.name.clone()));
    let mut batch = OperationBatch::new(object.clone());
    batch.push(operation(
        OpKind::Create,
        object.clone(),
        d.add_column(&table.name, column, Some(initial)),
    ));
    batch.push(
        Operation::new(OpKind::Alter, object, d.default_clause(&column.name, None))
            .with_prefix(Some(d.alter_table_prefix(&table.name))),
    );
    Step::Batch(batch)
}

/// Alter clauses for a changed column. A `SET NOT NULL` is preceded by an
/// `UPDATE` filling the NULLs when an initial value is known.
pub(super) fn altered_column(
    ctx: &SynthesisContext<'_>,
    mapper: &NameMapper<'_>,
    prev_table: &TableSchema,
    prev: &ColumnSchema,
    table: &TableSchema,
    column: &ColumnSchema,
    backfilled: &mut HashSet<(String, String)>,
) -> Option<Step> {
    let d = ctx.dialect;
    let before = mapper.column_schema(&prev_table.name, prev);
    let prefix = d.alter_table_prefix(&table.name);
    let object = ObjectRef::new(ObjectKind::Column, table.name.as_str(), column.name.as_str());
    let mut batch = OperationBatch::new(object.clone());

    for (change, clause) in d.alter_column_clauses(&before, column) {
        let tightens = change == ColumnChange::Nullability && !column.nullable;
        // A new SQL default does not fill existing NULLs.
        if tightens {
            if let Some(initial) = initial_value(ctx.new, &table.name, &column.name) {
                let update = UpdateStatement::new(table.name.as_str())
                    .set(column.name.as_str(), Expr::value(initial.clone()))
                    .filter(Expr::column(column.name.as_str()).is_null());
                batch.push(Operation::new(OpKind::SetDefaults, object.clone(), d.compile_update(&update)));
                backfilled.insert((table.name.clone(), column.name.clone()));
            }
        }
        batch.push(Operation::new(OpKind::Alter, object.clone(), clause).with_prefix(Some(prefix.clone())));
    }

    batch.into_step()
}

/// `UPDATE` steps for attributes that went from optional to required and
/// declare an initial value, unless already covered.
pub(super) fn required_backfills(
    ctx: &SynthesisContext<'_>,
    rebuilt: &HashSet<String>,
    backfilled: &HashSet<(String, String)>,
) -> Vec<Step> {
    let mut steps = Vec::new();

    for pe in &ctx.prev.entities {
        for pa in pe.attributes.iter().filter(|a| a.kind == AttrKind::Optional) {
            let Some((entity, attribute)) = ctx.correlation.attribute_new(&pe.name, &pa.name) else {
                continue;
            };
            let Some(ne) = ctx.new.get_entity(entity) else {
                continue;
            };
            let Some(na) = ne.get_attribute(attribute) else {
                continue;
            };
            if na.kind != AttrKind::Required {
                continue;
            }
            let Some(initial) = &na.initial else {
                continue;
            };
            if na.columns.len() != 1 || pa.columns.len() != 1 {
                warn!(
                    entity = %ne.name,
                    attribute = %na.name,
                    "Skipping backfill of a multi-column attribute"
                );
                continue;
            }

            let column = &na.columns[0];
            if rebuilt.contains(&ne.table) || backfilled.contains(&(ne.table.clone(), column.clone())) {
                continue;
            }

            let was_string = ctx
                .prev
                .snapshot
                .get_table(&pe.table)
                .and_then(|t| t.get_column(&pa.columns[0]))
                .is_some_and(|c| c.sql_type.is_textual());

            let target = Expr::column(column.as_str());
            let condition = if ctx.options.empty_string_sentinel && was_string {
                Expr::or(vec![
                    target.clone().equals(Expr::value(Value::String(String::new()))),
                    target.is_null(),
                ])
            } else {
                target.is_null()
            };
            let update = UpdateStatement::new(ne.table.as_str())
                .set(column.as_str(), Expr::value(initial.clone()))
                .filter(condition);

            steps.push(Step::Single(Operation::new(
                OpKind::SetDefaults,
                ObjectRef::new(ObjectKind::Column, ne.table.as_str(), column.as_str()),
                ctx.dialect.compile_update(&update),
            )));
        }
    }

    steps
}
