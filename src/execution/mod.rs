pub mod executor;
pub mod executors;
pub mod expression;
pub mod plan;

pub use executor::{Executor, ExecutorContext};
pub use expression::{ArithmeticOp, ComparisonOp, Expression, LogicOp};
pub use plan::{AggregationType, JoinType, OrderBy, OrderByType, PlanKind, PlanNode};

use std::sync::Arc;

use crate::common::Result;
use crate::tuple::Tuple;

/// Builds the executor tree for `plan`, pulls it to exhaustion and
/// collects the emitted tuples.
pub fn execute(ctx: &Arc<ExecutorContext>, plan: &Arc<PlanNode>) -> Result<Vec<Tuple>> {
    let mut executor = Executor::build(ctx, plan)?;
    executor.init()?;

    let mut results = Vec::new();
    while let Some((tuple, _rid)) = executor.next()? {
        results.push(tuple);
    }
    Ok(results)
}
