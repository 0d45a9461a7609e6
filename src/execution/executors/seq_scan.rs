use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{DbError, Oid, RecordId, Result};
use crate::execution::executor::ExecutorContext;
use crate::execution::expression::Expression;
use crate::storage::table::TableIterator;
use crate::tuple::{Schema, Tuple};

/// Sequential scan over a table heap.
///
/// `init` snapshots the record ids, so rows inserted during the scan (for
/// example by an update over the same table) are never visited. Deleted
/// rows and rows failing the pushed-down filter are skipped.
pub struct SeqScanExecutor {
    table: Arc<TableInfo>,
    filter: Option<Arc<Expression>>,
    output_schema: Arc<Schema>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(
        ctx: &Arc<ExecutorContext>,
        table_oid: Oid,
        filter: Option<Arc<Expression>>,
        output_schema: Arc<Schema>,
    ) -> Result<Self> {
        let table = ctx
            .catalog
            .table(table_oid)
            .ok_or_else(|| DbError::TableNotFound(table_oid.to_string()))?;
        Ok(Self {
            table,
            filter,
            output_schema,
            iter: None,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.iter = Some(self.table.heap.make_iterator()?);
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let iter = self.iter.as_mut().expect("init not called");

        for rid in iter.by_ref() {
            let (meta, tuple) = self.table.heap.get_tuple(rid)?;
            if meta.is_deleted {
                continue;
            }
            if let Some(filter) = &self.filter {
                if !filter.evaluate(&tuple, &self.table.schema).is_true() {
                    continue;
                }
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
