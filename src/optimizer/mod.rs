use std::sync::Arc;

use crate::catalog::Catalog;
use crate::execution::expression::{ComparisonOp, Expression, LogicOp};
use crate::execution::plan::{PlanKind, PlanNode};

/// Rule-based plan rewriter.
///
/// Three algebraic rewrites, each applied post-order over the plan tree:
/// Sort+Limit becomes TopN, an equi-predicate nested-loop join becomes a
/// hash join, and a single-equality filtered scan becomes an index scan
/// when a matching index exists.
pub struct Optimizer {
    catalog: Arc<Catalog>,
}

impl Optimizer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Applies every rule.
    pub fn optimize(&self, plan: Arc<PlanNode>) -> Arc<PlanNode> {
        let plan = self.sort_limit_as_topn(plan);
        let plan = self.nlj_as_hash_join(plan);
        self.seq_scan_as_index_scan(plan)
    }

    /// `Limit(N)` directly over `Sort(order)` collapses into
    /// `TopN(N, order)` over the sort's input.
    pub fn sort_limit_as_topn(&self, plan: Arc<PlanNode>) -> Arc<PlanNode> {
        let children = plan
            .children
            .iter()
            .map(|child| self.sort_limit_as_topn(Arc::clone(child)))
            .collect();
        let optimized = plan.clone_with_children(children);

        if let PlanKind::Limit { limit } = &optimized.kind {
            if let Some(child) = optimized.child(0) {
                if let PlanKind::Sort { order_bys } = &child.kind {
                    return Arc::new(PlanNode::new(
                        Arc::clone(&optimized.output_schema),
                        child.children.clone(),
                        PlanKind::TopN {
                            n: *limit,
                            order_bys: order_bys.clone(),
                        },
                    ));
                }
            }
        }
        Arc::new(optimized)
    }

    /// A nested-loop join whose predicate is an AND-tree of column
    /// equalities becomes a hash join over the extracted key columns.
    pub fn nlj_as_hash_join(&self, plan: Arc<PlanNode>) -> Arc<PlanNode> {
        let children = plan
            .children
            .iter()
            .map(|child| self.nlj_as_hash_join(Arc::clone(child)))
            .collect();
        let optimized = plan.clone_with_children(children);

        if let PlanKind::NestedLoopJoin {
            predicate,
            join_type,
        } = &optimized.kind
        {
            let mut left_keys = Vec::new();
            let mut right_keys = Vec::new();
            if Self::extract_equi_keys(predicate, &mut left_keys, &mut right_keys) {
                return Arc::new(PlanNode::new(
                    Arc::clone(&optimized.output_schema),
                    optimized.children.clone(),
                    PlanKind::HashJoin {
                        left_keys,
                        right_keys,
                        join_type: *join_type,
                    },
                ));
            }
        }
        Arc::new(optimized)
    }

    /// Splits an AND-tree of `column = column` comparisons into per-side
    /// key vectors. Returns false when any leaf is not such an equality.
    fn extract_equi_keys(
        predicate: &Arc<Expression>,
        left_keys: &mut Vec<Arc<Expression>>,
        right_keys: &mut Vec<Arc<Expression>>,
    ) -> bool {
        match predicate.as_ref() {
            Expression::Logic {
                op: LogicOp::And,
                left,
                right,
            } => {
                Self::extract_equi_keys(left, left_keys, right_keys)
                    && Self::extract_equi_keys(right, left_keys, right_keys)
            }
            Expression::Comparison {
                op: ComparisonOp::Equal,
                left,
                right,
            } => {
                let (
                    Expression::ColumnRef {
                        tuple_idx: left_side,
                        ..
                    },
                    Expression::ColumnRef {
                        tuple_idx: right_side,
                        ..
                    },
                ) = (left.as_ref(), right.as_ref())
                else {
                    return false;
                };
                if left_side == right_side {
                    return false;
                }
                // Operands partition by the side their column lives on.
                if *left_side == 0 {
                    left_keys.push(Arc::clone(left));
                    right_keys.push(Arc::clone(right));
                } else {
                    left_keys.push(Arc::clone(right));
                    right_keys.push(Arc::clone(left));
                }
                true
            }
            _ => false,
        }
    }

    /// A seq scan filtered by a single `column = constant` equality
    /// becomes an index scan when an index keyed exactly on that column
    /// exists. Conjunctions and non-equality filters keep the seq scan.
    pub fn seq_scan_as_index_scan(&self, plan: Arc<PlanNode>) -> Arc<PlanNode> {
        let children = plan
            .children
            .iter()
            .map(|child| self.seq_scan_as_index_scan(Arc::clone(child)))
            .collect();
        let optimized = plan.clone_with_children(children);

        if let PlanKind::SeqScan {
            table_oid,
            table_name,
            filter: Some(filter),
        } = &optimized.kind
        {
            if let Expression::Comparison {
                op: ComparisonOp::Equal,
                left,
                right,
            } = filter.as_ref()
            {
                if let (Expression::ColumnRef { col_idx, .. }, Expression::Constant { .. }) =
                    (left.as_ref(), right.as_ref())
                {
                    for index_info in self.catalog.table_indexes(table_name) {
                        if index_info.key_attrs == [*col_idx] {
                            return Arc::new(PlanNode::new(
                                Arc::clone(&optimized.output_schema),
                                Vec::new(),
                                PlanKind::IndexScan {
                                    table_oid: *table_oid,
                                    index_oid: index_info.oid,
                                    filter: Arc::clone(filter),
                                    pred_key: Arc::clone(right),
                                },
                            ));
                        }
                    }
                }
            }
        }
        Arc::new(optimized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::execution::plan::{JoinType, OrderByType};
    use crate::storage::disk::DiskManager;
    use crate::tuple::{DataType, Schema};
    use tempfile::NamedTempFile;

    fn create_catalog() -> (Arc<Catalog>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, 2, dm));
        (Arc::new(Catalog::new(bpm)), temp_file)
    }

    fn scan_schema() -> Arc<Schema> {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("age", DataType::Integer)
            .build_arc()
    }

    fn seq_scan(table_oid: u32, filter: Option<Arc<Expression>>) -> Arc<PlanNode> {
        Arc::new(PlanNode::new(
            scan_schema(),
            Vec::new(),
            PlanKind::SeqScan {
                table_oid,
                table_name: "people".to_string(),
                filter,
            },
        ))
    }

    #[test]
    fn test_sort_limit_becomes_topn() {
        let (catalog, _temp) = create_catalog();
        let optimizer = Optimizer::new(catalog);

        let order_bys = vec![(
            OrderByType::Asc,
            Expression::column(0, 1, DataType::Integer),
        )];
        let sort = Arc::new(PlanNode::new(
            scan_schema(),
            vec![seq_scan(0, None)],
            PlanKind::Sort {
                order_bys: order_bys.clone(),
            },
        ));
        let limit = Arc::new(PlanNode::new(
            scan_schema(),
            vec![sort],
            PlanKind::Limit { limit: 5 },
        ));

        let optimized = optimizer.sort_limit_as_topn(limit);
        match &optimized.kind {
            PlanKind::TopN { n, order_bys } => {
                assert_eq!(*n, 5);
                assert_eq!(order_bys.len(), 1);
            }
            other => panic!("expected TopN, got {:?}", other),
        }
        // TopN consumed the sort: its child is the scan.
        assert!(matches!(
            optimized.child(0).unwrap().kind,
            PlanKind::SeqScan { .. }
        ));
    }

    #[test]
    fn test_limit_without_sort_is_kept() {
        let (catalog, _temp) = create_catalog();
        let optimizer = Optimizer::new(catalog);

        let limit = Arc::new(PlanNode::new(
            scan_schema(),
            vec![seq_scan(0, None)],
            PlanKind::Limit { limit: 5 },
        ));

        let optimized = optimizer.sort_limit_as_topn(limit);
        assert!(matches!(optimized.kind, PlanKind::Limit { .. }));
    }

    fn nlj(predicate: Arc<Expression>) -> Arc<PlanNode> {
        Arc::new(PlanNode::new(
            scan_schema(),
            vec![seq_scan(0, None), seq_scan(1, None)],
            PlanKind::NestedLoopJoin {
                predicate,
                join_type: JoinType::Inner,
            },
        ))
    }

    #[test]
    fn test_equi_nlj_becomes_hash_join() {
        let (catalog, _temp) = create_catalog();
        let optimizer = Optimizer::new(catalog);

        // a.id = b.id AND b.age = a.age (one comparison per orientation)
        let predicate = Expression::logic(
            LogicOp::And,
            Expression::comparison(
                ComparisonOp::Equal,
                Expression::column(0, 0, DataType::Integer),
                Expression::column(1, 0, DataType::Integer),
            ),
            Expression::comparison(
                ComparisonOp::Equal,
                Expression::column(1, 1, DataType::Integer),
                Expression::column(0, 1, DataType::Integer),
            ),
        );

        let optimized = optimizer.nlj_as_hash_join(nlj(predicate));
        match &optimized.kind {
            PlanKind::HashJoin {
                left_keys,
                right_keys,
                join_type,
            } => {
                assert_eq!(*join_type, JoinType::Inner);
                assert_eq!(left_keys.len(), 2);
                assert_eq!(right_keys.len(), 2);
                // Every left key references tuple 0, every right key tuple 1.
                for key in left_keys {
                    assert!(matches!(
                        key.as_ref(),
                        Expression::ColumnRef { tuple_idx: 0, .. }
                    ));
                }
                for key in right_keys {
                    assert!(matches!(
                        key.as_ref(),
                        Expression::ColumnRef { tuple_idx: 1, .. }
                    ));
                }
            }
            other => panic!("expected HashJoin, got {:?}", other),
        }
    }

    #[test]
    fn test_non_equi_nlj_is_kept() {
        let (catalog, _temp) = create_catalog();
        let optimizer = Optimizer::new(catalog);

        let predicate = Expression::comparison(
            ComparisonOp::LessThan,
            Expression::column(0, 0, DataType::Integer),
            Expression::column(1, 0, DataType::Integer),
        );
        let optimized = optimizer.nlj_as_hash_join(nlj(predicate));
        assert!(matches!(optimized.kind, PlanKind::NestedLoopJoin { .. }));

        // An OR of equalities is not a conjunction either.
        let predicate = Expression::logic(
            LogicOp::Or,
            Expression::comparison(
                ComparisonOp::Equal,
                Expression::column(0, 0, DataType::Integer),
                Expression::column(1, 0, DataType::Integer),
            ),
            Expression::comparison(
                ComparisonOp::Equal,
                Expression::column(0, 1, DataType::Integer),
                Expression::column(1, 1, DataType::Integer),
            ),
        );
        let optimized = optimizer.nlj_as_hash_join(nlj(predicate));
        assert!(matches!(optimized.kind, PlanKind::NestedLoopJoin { .. }));
    }

    #[test]
    fn test_equality_scan_becomes_index_scan() {
        let (catalog, _temp) = create_catalog();
        let schema = Schema::builder()
            .column("id", DataType::Integer)
            .column("age", DataType::Integer)
            .build();
        let table = catalog.create_table("people", schema).unwrap();
        let index = catalog.create_index("people_id", "people", vec![0]).unwrap();
        let optimizer = Optimizer::new(Arc::clone(&catalog));

        let filter = Expression::comparison(
            ComparisonOp::Equal,
            Expression::column(0, 0, DataType::Integer),
            Expression::constant(42),
        );
        let optimized = optimizer.seq_scan_as_index_scan(seq_scan(table.oid, Some(filter)));

        match &optimized.kind {
            PlanKind::IndexScan {
                table_oid,
                index_oid,
                ..
            } => {
                assert_eq!(*table_oid, table.oid);
                assert_eq!(*index_oid, index.oid);
            }
            other => panic!("expected IndexScan, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_rewrite_needs_matching_index_and_shape() {
        let (catalog, _temp) = create_catalog();
        let schema = Schema::builder()
            .column("id", DataType::Integer)
            .column("age", DataType::Integer)
            .build();
        let table = catalog.create_table("people", schema).unwrap();
        catalog.create_index("people_id", "people", vec![0]).unwrap();
        let optimizer = Optimizer::new(Arc::clone(&catalog));

        // Equality on a column without an index: kept.
        let filter = Expression::comparison(
            ComparisonOp::Equal,
            Expression::column(0, 1, DataType::Integer),
            Expression::constant(30),
        );
        let optimized = optimizer.seq_scan_as_index_scan(seq_scan(table.oid, Some(filter)));
        assert!(matches!(optimized.kind, PlanKind::SeqScan { .. }));

        // Non-equality comparison on the indexed column: kept.
        let filter = Expression::comparison(
            ComparisonOp::GreaterThan,
            Expression::column(0, 0, DataType::Integer),
            Expression::constant(10),
        );
        let optimized = optimizer.seq_scan_as_index_scan(seq_scan(table.oid, Some(filter)));
        assert!(matches!(optimized.kind, PlanKind::SeqScan { .. }));

        // A conjunction keeps the seq scan even when one side matches.
        let filter = Expression::logic(
            LogicOp::And,
            Expression::comparison(
                ComparisonOp::Equal,
                Expression::column(0, 0, DataType::Integer),
                Expression::constant(1),
            ),
            Expression::comparison(
                ComparisonOp::Equal,
                Expression::column(0, 1, DataType::Integer),
                Expression::constant(2),
            ),
        );
        let optimized = optimizer.seq_scan_as_index_scan(seq_scan(table.oid, Some(filter)));
        assert!(matches!(optimized.kind, PlanKind::SeqScan { .. }));

        // No filter at all: kept.
        let optimized = optimizer.seq_scan_as_index_scan(seq_scan(table.oid, None));
        assert!(matches!(optimized.kind, PlanKind::SeqScan { .. }));
    }
}
