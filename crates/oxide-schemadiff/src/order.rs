//! Operation orderer.
//!
//! Drops of dependent objects run first and under their previous names,
//! then every rename, then table drops, then everything else in the order
//! it was synthesized. The sort is stable and batches move as a whole.

use crate::operations::{ObjectKind, OpKind, Operation, Step};

/// Sort class of a step; lower classes run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrderClass {
    /// Trigger drops.
    TriggerDrop,
    /// Foreign key drops.
    ForeignKeyDrop,
    /// Index drops.
    IndexDrop,
    /// Renames of any kind.
    Rename,
    /// Table drops.
    TableDrop,
    /// Creates, alters, column and constraint drops, backfills.
    Generic,
}

fn classify_operation(op: &Operation) -> OrderClass {
    match op.kind {
        OpKind::Rename => OrderClass::Rename,
        OpKind::Drop => match op.object.kind {
            ObjectKind::Trigger => OrderClass::TriggerDrop,
            ObjectKind::ForeignKey => OrderClass::ForeignKeyDrop,
            ObjectKind::Index => OrderClass::IndexDrop,
            ObjectKind::Table => OrderClass::TableDrop,
            ObjectKind::Column | ObjectKind::Constraint => OrderClass::Generic,
        },
        OpKind::Create | OpKind::Alter | OpKind::SetDefaults => OrderClass::Generic,
    }
}

/// Classifies a step. A batch of renames is a rename; otherwise a batch
/// takes the class of a leading drop, or is generic.
#[must_use]
pub fn classify(step: &Step) -> OrderClass {
    match step {
        Step::Single(op) => classify_operation(op),
        Step::Batch(batch) => {
            if !batch.operations.is_empty() && batch.operations.iter().all(|op| op.kind == OpKind::Rename) {
                return OrderClass::Rename;
            }
            match batch.operations.first() {
                Some(op) if op.kind == OpKind::Drop => classify_operation(op),
                _ => OrderClass::Generic,
            }
        }
    }
}

/// Orders steps and flattens them into the final operation list.
#[must_use]
pub fn order(mut steps: Vec<Step>) -> Vec<Operation> {
    steps.sort_by_key(classify);
    steps.into_iter().flat_map(Step::into_operations).collect()
}
