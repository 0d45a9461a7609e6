use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::common::{DbError, Oid, RecordId, Result, TxnId};
use crate::execution::executor::{placeholder_rid, Executor, ExecutorContext};
use crate::index::Index;
use crate::storage::page::TupleMeta;
use crate::tuple::{Schema, Tuple, Value};

/// Inserts every child row into the table and its indexes, then emits a
/// single row holding the inserted count. Subsequent `next` calls end the
/// stream.
pub struct InsertExecutor {
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    txn: TxnId,
    child: Box<Executor>,
    output_schema: Arc<Schema>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(
        ctx: &Arc<ExecutorContext>,
        table_oid: Oid,
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

        let mut count = 0i32;
        while let Some((tuple, _)) = self.child.next()? {
            let meta = TupleMeta::new(self.txn, false);
            let Some(rid) = self.table.heap.insert_tuple(meta, &tuple)? else {
                continue;
            };
            count += 1;

            for index_info in &self.indexes {
                if let Some(key) = index_info.index.key_from_tuple(&tuple) {
                    index_info.index.insert_entry(&key, rid, self.txn)?;
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
