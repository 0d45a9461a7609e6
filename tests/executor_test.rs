//! End-to-end tests for the Volcano executors

use std::sync::Arc;

use grebe::buffer::BufferPoolManager;
use grebe::catalog::{Catalog, TableInfo};
use grebe::common::INVALID_TXN_ID;
use grebe::execution::{
    execute, AggregationType, ComparisonOp, ExecutorContext, Expression, OrderByType, PlanKind,
    PlanNode,
};
use grebe::storage::disk::DiskManager;
use grebe::tuple::{DataType, Schema, Tuple, Value};
use tempfile::NamedTempFile;

struct TestDb {
    catalog: Arc<Catalog>,
    ctx: Arc<ExecutorContext>,
    _temp: NamedTempFile,
}

/// A database with table `heroes(id INTEGER, camp VARCHAR(16), power INTEGER)`.
fn create_db() -> TestDb {
    let temp = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(128, 2, dm));
    let catalog = Arc::new(Catalog::new(bpm));

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("camp", DataType::VarChar(16))
        .nullable_column("power", DataType::Integer)
        .build();
    catalog.create_table("heroes", schema).unwrap();
    catalog.create_index("heroes_id", "heroes", vec![0]).unwrap();

    let ctx = ExecutorContext::new(Arc::clone(&catalog), INVALID_TXN_ID);
    TestDb {
        catalog,
        ctx,
        _temp: temp,
    }
}

fn heroes(db: &TestDb) -> Arc<TableInfo> {
    db.catalog.table_by_name("heroes").unwrap()
}

fn count_schema() -> Arc<Schema> {
    Schema::builder().column("count", DataType::Integer).build_arc()
}

fn insert_rows(db: &TestDb, rows: Vec<(i32, &str, Option<i32>)>) -> i32 {
    let table = heroes(db);
    let rows = rows
        .into_iter()
        .map(|(id, camp, power)| {
            vec![
                Expression::constant(id),
                Expression::constant(camp),
                match power {
                    Some(p) => Expression::constant(p),
                    None => Expression::constant(Value::Null),
                },
            ]
        })
        .collect();

    let values = Arc::new(PlanNode::new(
        Arc::clone(&table.schema),
        vec![],
        PlanKind::Values { rows },
    ));
    let insert = Arc::new(PlanNode::new(
        count_schema(),
        vec![values],
        PlanKind::Insert {
            table_oid: table.oid,
        },
    ));

    let result = execute(&db.ctx, &insert).unwrap();
    assert_eq!(result.len(), 1);
    match result[0].value(0).unwrap() {
        Value::Integer(n) => *n,
        other => panic!("unexpected count value {:?}", other),
    }
}

fn scan_plan(db: &TestDb, filter: Option<Arc<Expression>>) -> Arc<PlanNode> {
    let table = heroes(db);
    Arc::new(PlanNode::new(
        Arc::clone(&table.schema),
        vec![],
        PlanKind::SeqScan {
            table_oid: table.oid,
            table_name: table.name.clone(),
            filter,
        },
    ))
}

fn int_value(tuple: &Tuple, index: usize) -> i32 {
    match tuple.value(index).unwrap() {
        Value::Integer(n) => *n,
        other => panic!("expected integer, got {:?}", other),
    }
}

#[test]
fn test_insert_reports_count_and_scan_sees_rows() {
    let db = create_db();

    let inserted = insert_rows(
        &db,
        vec![(1, "Piltover", Some(7)), (2, "Ionia", Some(9)), (3, "Ionia", None)],
    );
    assert_eq!(inserted, 3);

    let rows = execute(&db.ctx, &scan_plan(&db, None)).unwrap();
    assert_eq!(rows.len(), 3);

    let mut ids: Vec<i32> = rows.iter().map(|t| int_value(t, 0)).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_seq_scan_filter_pushdown() {
    let db = create_db();
    insert_rows(
        &db,
        vec![
            (1, "A", Some(10)),
            (2, "B", Some(20)),
            (3, "C", Some(30)),
            (4, "D", None),
        ],
    );

    let filter = Expression::comparison(
        ComparisonOp::GreaterThan,
        Expression::column(0, 2, DataType::Integer),
        Expression::constant(15),
    );
    let rows = execute(&db.ctx, &scan_plan(&db, Some(filter))).unwrap();

    // Row 4's NULL power compares unknown and is filtered out.
    let mut ids: Vec<i32> = rows.iter().map(|t| int_value(t, 0)).collect();
    ids.sort();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_delete_hides_rows_from_scans() {
    let db = create_db();
    insert_rows(&db, vec![(1, "A", None), (2, "B", None), (3, "C", None)]);

    let filter = Expression::comparison(
        ComparisonOp::Equal,
        Expression::column(0, 0, DataType::Integer),
        Expression::constant(2),
    );
    let delete = Arc::new(PlanNode::new(
        count_schema(),
        vec![scan_plan(&db, Some(filter))],
        PlanKind::Delete {
            table_oid: heroes(&db).oid,
        },
    ));

    let result = execute(&db.ctx, &delete).unwrap();
    assert_eq!(int_value(&result[0], 0), 1);

    let remaining = execute(&db.ctx, &scan_plan(&db, None)).unwrap();
    let mut ids: Vec<i32> = remaining.iter().map(|t| int_value(t, 0)).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 3]);

    // Deleting everything leaves an empty scan.
    let delete_all = Arc::new(PlanNode::new(
        count_schema(),
        vec![scan_plan(&db, None)],
        PlanKind::Delete {
            table_oid: heroes(&db).oid,
        },
    ));
    let result = execute(&db.ctx, &delete_all).unwrap();
    assert_eq!(int_value(&result[0], 0), 2);
    assert!(execute(&db.ctx, &scan_plan(&db, None)).unwrap().is_empty());
}

#[test]
fn test_update_rewrites_rows_and_terminates_on_self_scan() {
    let db = create_db();
    insert_rows(&db, vec![(1, "A", Some(5)), (2, "B", Some(6)), (3, "C", Some(7))]);

    // UPDATE heroes SET power = power + 100 (id and camp pass through).
    let table = heroes(&db);
    let target_exprs = vec![
        Expression::column(0, 0, DataType::Integer),
        Expression::column(0, 1, DataType::VarChar(16)),
        Expression::arithmetic(
            grebe::execution::ArithmeticOp::Add,
            Expression::column(0, 2, DataType::Integer),
            Expression::constant(100),
        ),
    ];
    let update = Arc::new(PlanNode::new(
        count_schema(),
        vec![scan_plan(&db, None)],
        PlanKind::Update {
            table_oid: table.oid,
            target_exprs,
        },
    ));

    // The update scans the table it writes to; the snapshot iterator
    // guarantees it terminates after exactly the pre-existing rows.
    let result = execute(&db.ctx, &update).unwrap();
    assert_eq!(int_value(&result[0], 0), 3);

    let rows = execute(&db.ctx, &scan_plan(&db, None)).unwrap();
    assert_eq!(rows.len(), 3);
    let mut powers: Vec<i32> = rows.iter().map(|t| int_value(t, 2)).collect();
    powers.sort();
    assert_eq!(powers, vec![105, 106, 107]);
}

#[test]
fn test_projection_computes_expressions() {
    let db = create_db();
    insert_rows(&db, vec![(1, "A", Some(10)), (2, "B", Some(20))]);

    let out_schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("double_power", DataType::Integer)
        .build_arc();
    let projection = Arc::new(PlanNode::new(
        out_schema,
        vec![scan_plan(&db, None)],
        PlanKind::Projection {
            exprs: vec![
                Expression::column(0, 0, DataType::Integer),
                Expression::arithmetic(
                    grebe::execution::ArithmeticOp::Add,
                    Expression::column(0, 2, DataType::Integer),
                    Expression::column(0, 2, DataType::Integer),
                ),
            ],
        },
    ));

    let mut rows: Vec<(i32, i32)> = execute(&db.ctx, &projection)
        .unwrap()
        .iter()
        .map(|t| (int_value(t, 0), int_value(t, 1)))
        .collect();
    rows.sort();
    assert_eq!(rows, vec![(1, 20), (2, 40)]);
}

#[test]
fn test_topn_emits_ascending_prefix() {
    let db = create_db();
    insert_rows(
        &db,
        vec![
            (1, "A", Some(50)),
            (2, "B", Some(10)),
            (3, "C", Some(40)),
            (4, "D", Some(20)),
            (5, "E", Some(30)),
            (6, "F", Some(60)),
            (7, "G", Some(5)),
        ],
    );

    let table = heroes(&db);
    let topn = Arc::new(PlanNode::new(
        Arc::clone(&table.schema),
        vec![scan_plan(&db, None)],
        PlanKind::TopN {
            n: 5,
            order_bys: vec![(
                OrderByType::Asc,
                Expression::column(0, 2, DataType::Integer),
            )],
        },
    ));

    let rows = execute(&db.ctx, &topn).unwrap();
    let powers: Vec<i32> = rows.iter().map(|t| int_value(t, 2)).collect();
    assert_eq!(powers, vec![5, 10, 20, 30, 40]);

    // Descending order keeps the five largest instead.
    let topn_desc = Arc::new(PlanNode::new(
        Arc::clone(&table.schema),
        vec![scan_plan(&db, None)],
        PlanKind::TopN {
            n: 2,
            order_bys: vec![(
                OrderByType::Desc,
                Expression::column(0, 2, DataType::Integer),
            )],
        },
    ));
    let rows = execute(&db.ctx, &topn_desc).unwrap();
    let powers: Vec<i32> = rows.iter().map(|t| int_value(t, 2)).collect();
    assert_eq!(powers, vec![60, 50]);
}

fn group_count_plan(db: &TestDb) -> Arc<PlanNode> {
    let out_schema = Schema::builder()
        .column("camp", DataType::VarChar(16))
        .column("count", DataType::Integer)
        .build_arc();
    Arc::new(PlanNode::new(
        out_schema,
        vec![scan_plan(db, None)],
        PlanKind::Aggregation {
            group_bys: vec![Expression::column(0, 1, DataType::VarChar(16))],
            aggregates: vec![Expression::column(0, 2, DataType::Integer)],
            agg_types: vec![AggregationType::Count],
        },
    ))
}

#[test]
fn test_aggregation_group_by_count() {
    let db = create_db();
    // COUNT(power) per camp: NULL powers are not counted.
    insert_rows(
        &db,
        vec![
            (1, "A", Some(10)),
            (2, "A", Some(20)),
            (3, "B", Some(30)),
            (4, "B", None),
        ],
    );

    let mut rows: Vec<(String, i32)> = execute(&db.ctx, &group_count_plan(&db))
        .unwrap()
        .iter()
        .map(|t| {
            let camp = match t.value(0).unwrap() {
                Value::String(s) => s.clone(),
                other => panic!("expected string, got {:?}", other),
            };
            (camp, int_value(t, 1))
        })
        .collect();
    rows.sort();
    assert_eq!(rows, vec![("A".to_string(), 2), ("B".to_string(), 1)]);
}

#[test]
fn test_aggregation_empty_input() {
    let db = create_db();

    // With group-bys and no rows: nothing comes out.
    assert!(execute(&db.ctx, &group_count_plan(&db)).unwrap().is_empty());

    // Without group-bys: one row of initial aggregates, COUNT(*) = 0.
    let out_schema = Schema::builder()
        .column("count_star", DataType::Integer)
        .column("sum_power", DataType::Integer)
        .build_arc();
    let aggregate = Arc::new(PlanNode::new(
        out_schema,
        vec![scan_plan(&db, None)],
        PlanKind::Aggregation {
            group_bys: vec![],
            aggregates: vec![
                Expression::column(0, 2, DataType::Integer),
                Expression::column(0, 2, DataType::Integer),
            ],
            agg_types: vec![AggregationType::CountStar, AggregationType::Sum],
        },
    ));

    let rows = execute(&db.ctx, &aggregate).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(0), Some(&Value::Integer(0)));
    assert_eq!(rows[0].value(1), Some(&Value::Null));
}

#[test]
fn test_aggregation_sum_min_max() {
    let db = create_db();
    insert_rows(
        &db,
        vec![(1, "A", Some(10)), (2, "A", Some(30)), (3, "A", None)],
    );

    let out_schema = Schema::builder()
        .column("sum", DataType::Integer)
        .column("min", DataType::Integer)
        .column("max", DataType::Integer)
        .build_arc();
    let power = || Expression::column(0, 2, DataType::Integer);
    let aggregate = Arc::new(PlanNode::new(
        out_schema,
        vec![scan_plan(&db, None)],
        PlanKind::Aggregation {
            group_bys: vec![],
            aggregates: vec![power(), power(), power()],
            agg_types: vec![
                AggregationType::Sum,
                AggregationType::Min,
                AggregationType::Max,
            ],
        },
    ));

    let rows = execute(&db.ctx, &aggregate).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(int_value(&rows[0], 0), 40);
    assert_eq!(int_value(&rows[0], 1), 10);
    assert_eq!(int_value(&rows[0], 2), 30);
}

#[test]
fn test_index_maintained_through_write_executors() {
    let db = create_db();
    insert_rows(&db, vec![(1, "A", Some(1)), (2, "B", Some(2))]);

    let table = heroes(&db);
    let indexes = db.catalog.table_indexes("heroes");
    let index_info = &indexes[0];
    let key = |id: i32| {
        grebe::tuple::TupleBuilder::new(Arc::clone(&index_info.key_schema))
            .value(id)
            .build()
    };

    use grebe::index::Index;
    // Insert populated the index.
    assert_eq!(
        index_info
            .index
            .scan_key(&key(1), INVALID_TXN_ID)
            .unwrap()
            .len(),
        1
    );

    // Delete removes the entries again.
    let delete_all = Arc::new(PlanNode::new(
        count_schema(),
        vec![scan_plan(&db, None)],
        PlanKind::Delete {
            table_oid: table.oid,
        },
    ));
    execute(&db.ctx, &delete_all).unwrap();

    assert!(index_info
        .index
        .scan_key(&key(1), INVALID_TXN_ID)
        .unwrap()
        .is_empty());
    assert!(index_info
        .index
        .scan_key(&key(2), INVALID_TXN_ID)
        .unwrap()
        .is_empty());
}
