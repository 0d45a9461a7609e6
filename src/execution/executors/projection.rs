use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::execution::executor::Executor;
use crate::execution::expression::Expression;
use crate::tuple::{Schema, Tuple, Value};

/// Evaluates one expression per output column against each child row.
pub struct ProjectionExecutor {
    exprs: Vec<Arc<Expression>>,
    child: Box<Executor>,
    output_schema: Arc<Schema>,
}

impl ProjectionExecutor {
    pub fn new(
        exprs: Vec<Arc<Expression>>,
        child: Box<Executor>,
        output_schema: Arc<Schema>,
    ) -> Self {
        Self {
            exprs,
            child,
            output_schema,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let Some((tuple, rid)) = self.child.next()? else {
            return Ok(None);
        };

        let child_schema = self.child.output_schema();
        let values: Vec<Value> = self
            .exprs
            .iter()
            .map(|expr| expr.evaluate(&tuple, child_schema))
            .collect();

        Ok(Some((
            Tuple::new(Arc::clone(&self.output_schema), values),
            rid,
        )))
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
