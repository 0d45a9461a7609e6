use std::sync::Arc;

use grebe::buffer::BufferPoolManager;
use grebe::catalog::Catalog;
use grebe::common::INVALID_TXN_ID;
use grebe::execution::{
    execute, AggregationType, ComparisonOp, Executor, ExecutorContext, Expression, PlanKind,
    PlanNode,
};
use grebe::storage::disk::DiskManager;
use grebe::tuple::{DataType, Schema};

fn main() {
    println!("Grebe - a disk-oriented teaching RDBMS");
    println!("======================================\n");

    let db_path = "demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
    let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));
    println!("Created buffer pool with 64 frames\n");

    // CREATE TABLE heroes (id INTEGER, camp VARCHAR(16));
    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("camp", DataType::VarChar(16))
        .build();
    let table = catalog
        .create_table("heroes", schema)
        .expect("Failed to create table");
    catalog
        .create_index("heroes_id", "heroes", vec![0])
        .expect("Failed to create index");
    println!("Created table 'heroes' with an index on id");

    let ctx = ExecutorContext::new(Arc::clone(&catalog), INVALID_TXN_ID);

    // INSERT INTO heroes VALUES (1, 'Piltover'), (2, 'Piltover'), (3, 'Ionia');
    let rows = vec![
        vec![Expression::constant(1), Expression::constant("Piltover")],
        vec![Expression::constant(2), Expression::constant("Piltover")],
        vec![Expression::constant(3), Expression::constant("Ionia")],
    ];
    let values = Arc::new(PlanNode::new(
        Arc::clone(&table.schema),
        vec![],
        PlanKind::Values { rows },
    ));
    let count_schema = Schema::builder().column("count", DataType::Integer).build_arc();
    let insert = Arc::new(PlanNode::new(
        count_schema,
        vec![values],
        PlanKind::Insert {
            table_oid: table.oid,
        },
    ));

    let inserted = execute(&ctx, &insert).expect("Insert failed");
    println!("Inserted rows: {}", inserted[0].value(0).unwrap());

    // SELECT id, camp FROM heroes WHERE id < 3;
    let filter = Expression::comparison(
        ComparisonOp::LessThan,
        Expression::column(0, 0, DataType::Integer),
        Expression::constant(3),
    );
    let scan = Arc::new(PlanNode::new(
        Arc::clone(&table.schema),
        vec![],
        PlanKind::SeqScan {
            table_oid: table.oid,
            table_name: table.name.clone(),
            filter: Some(filter),
        },
    ));

    println!("\nHeroes with id < 3:");
    let mut executor = Executor::build(&ctx, &scan).expect("Failed to build scan");
    executor.init().expect("Scan init failed");
    while let Some((tuple, rid)) = executor.next().expect("Scan failed") {
        println!(
            "  {} | {}  (at {})",
            tuple.value(0).unwrap(),
            tuple.value(1).unwrap(),
            rid
        );
    }

    // SELECT camp, COUNT(*) FROM heroes GROUP BY camp;
    let agg_schema = Schema::builder()
        .column("camp", DataType::VarChar(16))
        .column("count", DataType::Integer)
        .build_arc();
    let scan_all = Arc::new(PlanNode::new(
        Arc::clone(&table.schema),
        vec![],
        PlanKind::SeqScan {
            table_oid: table.oid,
            table_name: table.name.clone(),
            filter: None,
        },
    ));
    let aggregate = Arc::new(PlanNode::new(
        agg_schema,
        vec![scan_all],
        PlanKind::Aggregation {
            group_bys: vec![Expression::column(0, 1, DataType::VarChar(16))],
            aggregates: vec![Expression::column(0, 0, DataType::Integer)],
            agg_types: vec![AggregationType::CountStar],
        },
    ));

    println!("\nHeroes per camp:");
    for row in execute(&ctx, &aggregate).expect("Aggregation failed") {
        println!("  {} -> {}", row.value(0).unwrap(), row.value(1).unwrap());
    }

    bpm.flush_all_pages().expect("Flush failed");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
