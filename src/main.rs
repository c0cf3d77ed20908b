//! Small demo driver over the `rustic_db` library: loads a schema file,
//! inserts a few rows concurrently, and prints the table back via a
//! sequential scan. Real query planning, parsing, and a CLI loop are out of
//! scope for this core.

use std::thread;

use rustic_db::database;
use rustic_db::fields::{FieldVal, IntField, StringField};
use rustic_db::table::Table;
use rustic_db::transaction::TransactionId;
use rustic_db::tuple::Tuple;

fn main() {
    env_logger::init();

    let db = database::get_global_db();
    let mut schema_path = std::env::current_dir().unwrap();
    schema_path.push("schemas.txt");
    let mut data_dir = std::env::current_dir().unwrap();
    data_dir.push("data");
    std::fs::create_dir_all(&data_dir).unwrap();

    if let Err(e) = db
        .get_catalog()
        .load_schema(schema_path.to_str().unwrap(), data_dir.to_str().unwrap())
    {
        eprintln!("failed to load schemas.txt: {e}");
        return;
    }

    let table = match Table::open("employees".to_string()) {
        Some(t) => t,
        None => {
            eprintln!("schemas.txt has no 'employees' table");
            return;
        }
    };
    let td = table.get_tuple_desc().clone();
    println!("table id: {}", table.get_id());
    println!("fields: {:?}", (0..td.get_num_fields()).map(|i| td.get_field_name(i).cloned()).collect::<Vec<_>>());

    // Insert three rows from three concurrent transactions. Each thread
    // retries on TxnAborted, matching the lock manager's self-abort contract
    // (the caller, not the lock manager, decides whether to retry).
    let handles: Vec<_> = (0..3)
        .map(|i| {
            thread::spawn(move || {
                let db = database::get_global_db();
                let table = Table::open("employees".to_string()).unwrap();
                loop {
                    let tid = TransactionId::new();
                    let tuple = Tuple::new(
                        vec![
                            FieldVal::IntField(IntField::new(i)),
                            FieldVal::StringField(StringField::new(format!("employee-{i}"), 128)),
                        ],
                        table.get_tuple_desc(),
                    );
                    match table.insert_tuple(tuple, tid) {
                        Ok(()) => {
                            db.get_buffer_pool()
                                .transaction_complete(tid, true)
                                .unwrap();
                            break;
                        }
                        Err(_) => {
                            db.get_buffer_pool()
                                .transaction_complete(tid, false)
                                .ok();
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let tid = TransactionId::new();
    for (i, t) in table.scan(0, tid).unwrap().enumerate() {
        println!("{i}: {t}");
    }
    db.get_buffer_pool().transaction_complete(tid, true).unwrap();
}
