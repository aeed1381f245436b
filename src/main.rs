use std::path::Path;

use heapstore::tuple::{DataType, Schema, TupleBuilder};
use heapstore::{Config, Database};
use tracing::Level;

fn main() -> heapstore::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    println!("Heapstore - a transactional heap file store");
    println!("===========================================\n");

    let db_path = Path::new("demo.db");
    let db = Database::new(Config::new().with_page_size(256).with_pool_pages(8));

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(24))
        .build_arc();
    let table = db.create_table(db_path, "people", schema.clone())?;
    println!("Created table 'people' ({}) at {}", schema, db_path.display());

    // Insert and commit
    let txn = db.begin();
    let names = ["Ada", "Grace", "Edsger", "Barbara", "Donald"];
    for (i, name) in names.iter().enumerate() {
        let mut row = TupleBuilder::new(schema.clone())
            .value(i as i32)
            .value(*name)
            .build()?;
        txn.insert_tuple(table, &mut row)?;
        if let Some(rid) = row.record_id() {
            println!("Inserted {} at {}", row, rid);
        }
    }
    txn.commit()?;
    println!("\nCommitted {} rows", names.len());

    // Scan, then delete one row and abort
    let file = db.catalog().database_file(table)?;
    let txn = db.begin();
    let rows = file
        .iter(db.buffer_pool(), txn.id())
        .collect::<heapstore::Result<Vec<_>>>()?;
    println!("\nScan sees {} rows:", rows.len());
    for row in &rows {
        println!("  {}", row);
    }

    if let Some(first) = rows.first() {
        txn.delete_tuple(first)?;
        println!("\nDeleted '{}', then aborting", first);
    }
    txn.abort()?;

    let txn = db.begin();
    let count = file
        .iter(db.buffer_pool(), txn.id())
        .collect::<heapstore::Result<Vec<_>>>()?
        .len();
    txn.commit()?;
    println!("After abort the table still has {} rows", count);
    println!("File holds {} page(s)", file.num_pages());

    // Clean up
    drop(file);
    drop(db);
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}
