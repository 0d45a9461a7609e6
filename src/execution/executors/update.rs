use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::common::{DbError, Oid, RecordId, Result, TxnId};
use crate::execution::executor::{placeholder_rid, Executor, ExecutorContext};
use crate::execution::expression::Expression;
use crate::index::Index;
use crate::storage::page::TupleMeta;
use crate::tuple::{Schema, Tuple, Value};

/// Updates rows as delete-then-insert: the original row is marked
/// deleted, the rewritten row goes in under a fresh record id, and every
/// index entry is replaced. Emits a single row holding the updated count.
///
/// Self-updates terminate because the child scan snapshots its record ids
/// before the first mutation.
pub struct UpdateExecutor {
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    txn: TxnId,
    target_exprs: Vec<Arc<Expression>>,
    child: Box<Executor>,
    output_schema: Arc<Schema>,
    done: bool,
}

impl UpdateExecutor {
    pub fn new(
        ctx: &Arc<ExecutorContext>,
        table_oid: Oid,
        target_exprs: Vec<Arc<Expression>>,
        child: Box<Executor>,
        output_schema: Arc<Schema>,
    ) -> Result<Self> {
        let table = ctx
            .catalog
            .table(table_oid)
            .ok_or_else(|| DbError::TableNotFound(table_oid.to_string()))?;
        let indexes = ctx.catalog.table_indexes(&table.name);
        Ok(Self {
            table,
            indexes,
            txn: ctx.txn,
            target_exprs,
            child,
            output_schema,
            done: false,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.done = false;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let child_schema = Arc::clone(self.child.output_schema());
        let mut count = 0i32;

        while let Some((old_tuple, old_rid)) = self.child.next()? {
            self.table
                .heap
                .update_tuple_meta(TupleMeta::new(self.txn, true), old_rid)?;

            let new_values: Vec<Value> = self
                .target_exprs
                .iter()
                .map(|expr| expr.evaluate(&old_tuple, &child_schema))
                .collect();
            let new_tuple = Tuple::new(Arc::clone(&self.table.schema), new_values);

            let meta = TupleMeta::new(self.txn, false);
            let Some(new_rid) = self.table.heap.insert_tuple(meta, &new_tuple)? else {
                continue;
            };
            count += 1;

            for index_info in &self.indexes {
                let index = &index_info.index;
                if let Some(old_key) = index.key_from_tuple(&old_tuple) {
                    index.delete_entry(&old_key, old_rid, self.txn)?;
                }
                if let Some(new_key) = index.key_from_tuple(&new_tuple) {
                    index.insert_entry(&new_key, new_rid, self.txn)?;
                }
            }
        }

        let result = Tuple::new(
            Arc::clone(&self.output_schema),
            vec![Value::Integer(count)],
        );
        Ok(Some((result, placeholder_rid())))
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
