//! Two-pass table statistics used for cost-based selectivity estimation: one
//! pass to discover each column's range, a second to populate histograms
//! over it. Exposed as a small process-wide registry keyed by table name, the
//! way downstream cost-based planning code (out of scope here) would look
//! them up.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;

use crate::config::NUM_HIST_BINS;
use crate::database;
use crate::error::DbResult;
use crate::fields::FieldVal;
use crate::heap_file::HeapFile;
use crate::histogram::{IntHistogram, StringHistogram};
use crate::predicate::Op;
use crate::transaction::TransactionId;
use crate::types::Type;

#[derive(Debug, Clone)]
enum FieldHistogram {
    Int(IntHistogram),
    Str(StringHistogram),
}

#[derive(Debug, Clone)]
pub struct TableStats {
    histograms: Vec<FieldHistogram>,
    num_tuples: usize,
    num_pages: usize,
    io_cost_per_page: usize,
}

impl TableStats {
    /// Scans `table` twice via the buffer pool: once to find each integer
    /// field's `[min, max]` and count tuples/pages, once to populate a
    /// histogram per field.
    pub fn compute(table: &HeapFile, io_cost_per_page: usize) -> DbResult<TableStats> {
        let db = database::get_global_db();
        let bp = db.get_buffer_pool();
        let td = table.get_tuple_desc();
        let num_fields = td.get_num_fields();

        let mut mins = vec![i32::MAX; num_fields];
        let mut maxs = vec![i32::MIN; num_fields];
        let mut num_tuples = 0usize;
        let mut num_pages = 0usize;

        let scan_tid = TransactionId::new();
        for page in table.iter(bp, scan_tid) {
            let page = page?;
            let guard = page.read().unwrap();
            num_pages += 1;
            for tuple in guard.iter() {
                num_tuples += 1;
                for i in 0..num_fields {
                    if let Some(FieldVal::IntField(f)) = tuple.get_field(i) {
                        let v = f.get_value();
                        mins[i] = mins[i].min(v);
                        maxs[i] = maxs[i].max(v);
                    }
                }
            }
        }
        bp.transaction_complete(scan_tid, true)?;

        let mut histograms = Vec::with_capacity(num_fields);
        for i in 0..num_fields {
            let hist = match td.get_field_type(i).unwrap() {
                Type::Int => {
                    let (min, max) = if mins[i] <= maxs[i] {
                        (mins[i], maxs[i])
                    } else {
                        (0, 0)
                    };
                    FieldHistogram::Int(IntHistogram::new(NUM_HIST_BINS, min, max))
                }
                Type::String(_) => FieldHistogram::Str(StringHistogram::new(NUM_HIST_BINS)),
            };
            histograms.push(hist);
        }

        let populate_tid = TransactionId::new();
        for page in table.iter(bp, populate_tid) {
            let page = page?;
            let guard = page.read().unwrap();
            for tuple in guard.iter() {
                for (i, hist) in histograms.iter_mut().enumerate() {
                    match (hist, tuple.get_field(i)) {
                        (FieldHistogram::Int(h), Some(FieldVal::IntField(f))) => {
                            h.add_value(f.get_value())
                        }
                        (FieldHistogram::Str(h), Some(FieldVal::StringField(s))) => {
                            h.add_value(&s.get_value())
                        }
                        _ => {}
                    }
                }
            }
        }
        bp.transaction_complete(populate_tid, true)?;

        Ok(TableStats {
            histograms,
            num_tuples,
            num_pages,
            io_cost_per_page,
        })
    }

    /// `2 * pageCount * ioCostPerPage`; the factor of 2 accounts for a
    /// sequential scan's read-ahead cost in the source convention.
    pub fn estimate_scan_cost(&self) -> f64 {
        2.0 * self.num_pages as f64 * self.io_cost_per_page as f64
    }

    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.num_tuples as f64 * selectivity).floor() as usize
    }

    /// Dispatches on the constant's field type; a type mismatch against the
    /// field's own histogram returns 1.0 (no information, assume everything
    /// matches) rather than panicking.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &FieldVal) -> f64 {
        match (&self.histograms[field], constant) {
            (FieldHistogram::Int(h), FieldVal::IntField(v)) => {
                h.estimate_selectivity(op, v.get_value())
            }
            (FieldHistogram::Str(h), FieldVal::StringField(v)) => {
                h.estimate_selectivity(op, &v.get_value())
            }
            _ => 1.0,
        }
    }

    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }
}

static REGISTRY: OnceCell<RwLock<HashMap<String, Arc<TableStats>>>> = OnceCell::new();

fn registry() -> &'static RwLock<HashMap<String, Arc<TableStats>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Computes and stores statistics for `table` under `table_name`, replacing
/// any prior entry.
pub fn compute_statistics(
    table_name: &str,
    table: &HeapFile,
    io_cost_per_page: usize,
) -> DbResult<()> {
    let stats = TableStats::compute(table, io_cost_per_page)?;
    registry()
        .write()
        .unwrap()
        .insert(table_name.to_string(), Arc::new(stats));
    Ok(())
}

pub fn get_stats_for_table(table_name: &str) -> Option<Arc<TableStats>> {
    registry().read().unwrap().get(table_name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::fields::IntField;
    use crate::tuple::{Tuple, TupleDesc};
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    #[test]
    fn two_pass_scan_reports_range_and_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.dat");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .unwrap();
        let td = TupleDesc::new(vec![Type::Int], vec!["n".to_string()]);
        let heap_file = HeapFile::new(file, td.clone());
        let table_id = heap_file.get_id();
        database::get_global_db()
            .get_catalog()
            .add_table(heap_file, "stats_table".to_string());

        let bp = database::get_global_db().get_buffer_pool();
        let tid = TransactionId::new();
        for v in 1..=20 {
            bp.insert_tuple(
                tid,
                table_id,
                Tuple::new(vec![FieldVal::IntField(IntField::new(v))], &td),
            )
            .unwrap();
        }
        bp.transaction_complete(tid, true).unwrap();

        let table = database::get_global_db()
            .get_catalog()
            .get_table_from_id(table_id)
            .unwrap();
        compute_statistics("stats_table", &table, config::IOCOSTPERPAGE).unwrap();
        let stats = get_stats_for_table("stats_table").unwrap();
        assert_eq!(stats.num_tuples(), 20);

        let sel = stats.estimate_selectivity(0, Op::LessThan, &FieldVal::IntField(IntField::new(10)));
        assert!(sel > 0.0 && sel < 1.0);
        assert!(stats.estimate_scan_cost() > 0.0);
        assert_eq!(stats.estimate_table_cardinality(0.5), 10);
    }
}
