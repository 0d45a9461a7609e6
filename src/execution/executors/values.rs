use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::execution::executor::placeholder_rid;
use crate::execution::expression::Expression;
use crate::tuple::{Schema, Tuple};

/// Emits literal rows, one per `next` call. The usual child of an insert.
pub struct ValuesExecutor {
    rows: Vec<Vec<Arc<Expression>>>,
    output_schema: Arc<Schema>,
    cursor: usize,
}

impl ValuesExecutor {
    pub fn new(rows: Vec<Vec<Arc<Expression>>>, output_schema: Arc<Schema>) -> Self {
        Self {
            rows,
            output_schema,
            cursor: 0,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let Some(row) = self.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        // Value rows reference no input; evaluate against an empty tuple.
        let empty_schema = Arc::new(Schema::new(Vec::new()));
        let empty = Tuple::new(empty_schema, Vec::new());
        let values = row
            .iter()
            .map(|expr| expr.evaluate(&empty, &Schema::new(Vec::new())))
            .collect();

        Ok(Some((
            Tuple::new(Arc::clone(&self.output_schema), values),
            placeholder_rid(),
        )))
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
