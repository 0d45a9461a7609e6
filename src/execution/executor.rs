use std::sync::Arc;

use crate::catalog::Catalog;
use crate::common::{DbError, RecordId, Result, SlotId, TxnId, INVALID_PAGE_ID};
use crate::tuple::{Schema, Tuple};

use super::executors::{
    AggregationExecutor, DeleteExecutor, InsertExecutor, ProjectionExecutor, SeqScanExecutor,
    TopNExecutor, UpdateExecutor, ValuesExecutor,
};
use super::plan::{PlanKind, PlanNode};

/// Shared state every executor in a query sees.
pub struct ExecutorContext {
    pub catalog: Arc<Catalog>,
    pub txn: TxnId,
}

impl ExecutorContext {
    pub fn new(catalog: Arc<Catalog>, txn: TxnId) -> Arc<Self> {
        Arc::new(Self { catalog, txn })
    }
}

/// The record id executors emit for synthesized rows (counts, aggregates).
pub(crate) fn placeholder_rid() -> RecordId {
    RecordId::new(INVALID_PAGE_ID, SlotId::new(0))
}

/// A Volcano-model operator: `init` once, then `next` until it yields
/// `None`.
///
/// Executors are a sum type over the supported operators; plan nodes that
/// exist only for the optimizer (Sort, Limit, joins, IndexScan) have no
/// variant and fail to build.
pub enum Executor {
    SeqScan(SeqScanExecutor),
    Insert(InsertExecutor),
    Update(UpdateExecutor),
    Delete(DeleteExecutor),
    Values(ValuesExecutor),
    Projection(ProjectionExecutor),
    Aggregation(AggregationExecutor),
    TopN(TopNExecutor),
}

impl Executor {
    /// Builds the executor tree for a plan tree.
    pub fn build(ctx: &Arc<ExecutorContext>, plan: &Arc<PlanNode>) -> Result<Executor> {
        let child = |index: usize| -> Result<Box<Executor>> {
            let child_plan = plan
                .child(index)
                .ok_or(DbError::Unexecutable(plan.name()))?;
            Ok(Box::new(Self::build(ctx, child_plan)?))
        };

        match &plan.kind {
            PlanKind::SeqScan {
                table_oid, filter, ..
            } => Ok(Executor::SeqScan(SeqScanExecutor::new(
                ctx,
                *table_oid,
                filter.clone(),
                Arc::clone(&plan.output_schema),
            )?)),
            PlanKind::Insert { table_oid } => Ok(Executor::Insert(InsertExecutor::new(
                ctx,
                *table_oid,
                child(0)?,
                Arc::clone(&plan.output_schema),
            )?)),
            PlanKind::Update {
                table_oid,
                target_exprs,
            } => Ok(Executor::Update(UpdateExecutor::new(
                ctx,
                *table_oid,
                target_exprs.clone(),
                child(0)?,
                Arc::clone(&plan.output_schema),
            )?)),
            PlanKind::Delete { table_oid } => Ok(Executor::Delete(DeleteExecutor::new(
                ctx,
                *table_oid,
                child(0)?,
                Arc::clone(&plan.output_schema),
            )?)),
            PlanKind::Values { rows } => Ok(Executor::Values(ValuesExecutor::new(
                rows.clone(),
                Arc::clone(&plan.output_schema),
            ))),
            PlanKind::Projection { exprs } => Ok(Executor::Projection(ProjectionExecutor::new(
                exprs.clone(),
                child(0)?,
                Arc::clone(&plan.output_schema),
            ))),
            PlanKind::Aggregation {
                group_bys,
                aggregates,
                agg_types,
            } => Ok(Executor::Aggregation(AggregationExecutor::new(
                group_bys.clone(),
                aggregates.clone(),
                agg_types.clone(),
                child(0)?,
                Arc::clone(&plan.output_schema),
            ))),
            PlanKind::TopN { n, order_bys } => Ok(Executor::TopN(TopNExecutor::new(
                *n,
                order_bys.clone(),
                child(0)?,
                Arc::clone(&plan.output_schema),
            ))),
            PlanKind::IndexScan { .. }
            | PlanKind::Sort { .. }
            | PlanKind::Limit { .. }
            | PlanKind::NestedLoopJoin { .. }
            | PlanKind::HashJoin { .. } => Err(DbError::Unexecutable(plan.name())),
        }
    }

    /// Prepares this executor (and its children) to produce tuples.
    pub fn init(&mut self) -> Result<()> {
        match self {
            Executor::SeqScan(e) => e.init(),
            Executor::Insert(e) => e.init(),
            Executor::Update(e) => e.init(),
            Executor::Delete(e) => e.init(),
            Executor::Values(e) => e.init(),
            Executor::Projection(e) => e.init(),
            Executor::Aggregation(e) => e.init(),
            Executor::TopN(e) => e.init(),
        }
    }

    /// Pulls the next tuple; `None` signals end of stream.
    pub fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        match self {
            Executor::SeqScan(e) => e.next(),
            Executor::Insert(e) => e.next(),
            Executor::Update(e) => e.next(),
            Executor::Delete(e) => e.next(),
            Executor::Values(e) => e.next(),
            Executor::Projection(e) => e.next(),
            Executor::Aggregation(e) => e.next(),
            Executor::TopN(e) => e.next(),
        }
    }

    /// Schema of the tuples this executor emits.
    pub fn output_schema(&self) -> &Arc<Schema> {
        match self {
            Executor::SeqScan(e) => e.output_schema(),
            Executor::Insert(e) => e.output_schema(),
            Executor::Update(e) => e.output_schema(),
            Executor::Delete(e) => e.output_schema(),
            Executor::Values(e) => e.output_schema(),
            Executor::Projection(e) => e.output_schema(),
            Executor::Aggregation(e) => e.output_schema(),
            Executor::TopN(e) => e.output_schema(),
        }
    }
}
