use std::sync::Arc;

use crate::common::Oid;
use crate::tuple::Schema;

use super::expression::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    Asc,
    Desc,
}

/// One sort key: direction plus the expression producing it.
pub type OrderBy = (OrderByType, Arc<Expression>);

/// The aggregate functions the aggregation executor computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    /// COUNT(*): counts rows, NULLs included; starts at 0
    CountStar,
    /// COUNT(expr): counts non-NULL inputs; starts at NULL
    Count,
    /// SUM(expr) over non-NULL inputs; starts at NULL
    Sum,
    /// MIN(expr) over non-NULL inputs; starts at NULL
    Min,
    /// MAX(expr) over non-NULL inputs; starts at NULL
    Max,
}

/// A node of a query plan tree.
///
/// Tagged variants rather than an open hierarchy; the executor factory
/// turns the executable subset into operators, the optimizer pattern
/// matches on the rest.
#[derive(Debug, Clone)]
pub struct PlanNode {
    /// Schema of the tuples this node emits
    pub output_schema: Arc<Schema>,
    pub children: Vec<Arc<PlanNode>>,
    pub kind: PlanKind,
}

#[derive(Debug, Clone)]
pub enum PlanKind {
    /// Full scan of a table, with an optional pushed-down filter
    SeqScan {
        table_oid: Oid,
        table_name: String,
        filter: Option<Arc<Expression>>,
    },
    /// Point lookup through an index for `column = constant` filters
    IndexScan {
        table_oid: Oid,
        index_oid: Oid,
        filter: Arc<Expression>,
        pred_key: Arc<Expression>,
    },
    /// Inserts child rows into a table; emits one row holding the count
    Insert { table_oid: Oid },
    /// Re-writes child rows through the target expressions; emits a count
    Update {
        table_oid: Oid,
        target_exprs: Vec<Arc<Expression>>,
    },
    /// Marks child rows deleted; emits one row holding the count
    Delete { table_oid: Oid },
    /// Literal rows, each a list of expressions
    Values { rows: Vec<Vec<Arc<Expression>>> },
    /// Evaluates one expression per output column
    Projection { exprs: Vec<Arc<Expression>> },
    /// Group-by hash aggregation
    Aggregation {
        group_bys: Vec<Arc<Expression>>,
        aggregates: Vec<Arc<Expression>>,
        agg_types: Vec<AggregationType>,
    },
    /// Total sort of the child (plan-level only; rewritten to TopN)
    Sort { order_bys: Vec<OrderBy> },
    /// First `limit` rows of the child (plan-level only; rewritten to TopN)
    Limit { limit: usize },
    /// The `limit` smallest child rows under the sort order
    TopN { n: usize, order_bys: Vec<OrderBy> },
    /// Nested-loop join (plan-level only; rewritten to HashJoin)
    NestedLoopJoin {
        predicate: Arc<Expression>,
        join_type: JoinType,
    },
    /// Equi-join on extracted key expressions
    HashJoin {
        left_keys: Vec<Arc<Expression>>,
        right_keys: Vec<Arc<Expression>>,
        join_type: JoinType,
    },
}

impl PlanNode {
    pub fn new(output_schema: Arc<Schema>, children: Vec<Arc<PlanNode>>, kind: PlanKind) -> Self {
        Self {
            output_schema,
            children,
            kind,
        }
    }

    pub fn child(&self, index: usize) -> Option<&Arc<PlanNode>> {
        self.children.get(index)
    }

    /// Rebuilds this node over new children.
    pub fn clone_with_children(&self, children: Vec<Arc<PlanNode>>) -> PlanNode {
        PlanNode {
            output_schema: Arc::clone(&self.output_schema),
            children,
            kind: self.kind.clone(),
        }
    }

    /// Human-readable operator name, used in errors and plan dumps.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            PlanKind::SeqScan { .. } => "SeqScan",
            PlanKind::IndexScan { .. } => "IndexScan",
            PlanKind::Insert { .. } => "Insert",
            PlanKind::Update { .. } => "Update",
            PlanKind::Delete { .. } => "Delete",
            PlanKind::Values { .. } => "Values",
            PlanKind::Projection { .. } => "Projection",
            PlanKind::Aggregation { .. } => "Aggregation",
            PlanKind::Sort { .. } => "Sort",
            PlanKind::Limit { .. } => "Limit",
            PlanKind::TopN { .. } => "TopN",
            PlanKind::NestedLoopJoin { .. } => "NestedLoopJoin",
            PlanKind::HashJoin { .. } => "HashJoin",
        }
    }
}
