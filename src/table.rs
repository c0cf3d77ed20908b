use std::sync::Arc;

use crate::database;
use crate::error::DbResult;
use crate::heap_file::HeapFile;
use crate::predicate::Op;
use crate::transaction::TransactionId;
use crate::tuple;
use crate::tuple::Tuple;
use crate::tuple::TupleDesc;

/// Thin handle onto a catalog-registered table: name, its heap file, and a
/// convenience surface over insertion and scanning. The pull-model operator
/// glue (project/filter/join) lives on `TableIterator` below, not here.
pub struct Table {
    name: String,
    heap_file: Arc<HeapFile>,
    table_id: usize,
    tuple_desc: TupleDesc,
}

impl Table {
    /// Looks up `name` in the global catalog; the table must already be
    /// registered (via `Catalog::add_table` or `load_schema`).
    pub fn open(name: String) -> Option<Self> {
        let db = database::get_global_db();
        let heap_file = db.get_catalog().get_table_from_name(&name)?;
        let table_id = heap_file.get_id();
        Some(Table {
            name,
            tuple_desc: heap_file.get_tuple_desc().clone(),
            heap_file,
            table_id,
        })
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn insert_tuple(&self, tuple: Tuple, tid: TransactionId) -> DbResult<()> {
        let db = database::get_global_db();
        db.get_buffer_pool().insert_tuple(tid, self.table_id, tuple)
    }

    pub fn insert_many_tuples(&self, tuples: Vec<Tuple>, tid: TransactionId) -> DbResult<()> {
        for tuple in tuples {
            self.insert_tuple(tuple, tid)?;
        }
        Ok(())
    }

    pub fn get_tuple_desc(&self) -> &TupleDesc {
        &self.tuple_desc
    }

    pub fn get_id(&self) -> usize {
        self.table_id
    }

    /// Materializes up to `count` tuples (or every tuple if `count == 0`)
    /// into an in-memory iterator that filters/projects/joins can build on.
    pub fn scan(&self, count: usize, tid: TransactionId) -> DbResult<TableIterator<'_>> {
        TableIterator::new(self, tid, count)
    }
}

/// In-memory "view" over a bounded slice of a table's tuples. Separate from
/// `HeapFile::iter` so filter/project/join can compose without re-touching
/// the buffer pool for every stage.
pub struct TableIterator<'a> {
    table: &'a Table,
    current_index: usize,
    data: Vec<tuple::Tuple>,
    filters: Vec<(String, Op, FieldValConstant)>,
}

/// A filter's right-hand side: a literal value compared against a named
/// field on each scanned tuple.
type FieldValConstant = crate::fields::FieldVal;

impl<'a> TableIterator<'a> {
    fn new(table: &'a Table, tid: TransactionId, count: usize) -> DbResult<Self> {
        let mut data = Vec::new();
        let mut remaining = if count == 0 { usize::MAX } else { count };
        let db = database::get_global_db();
        let bp = db.get_buffer_pool();
        for page in table.heap_file.iter(bp, tid) {
            let page = page?;
            let page = page.read().unwrap();
            for tuple in page.iter() {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
                data.push(tuple.clone());
            }
        }
        Ok(TableIterator {
            table,
            current_index: 0,
            data,
            filters: Vec::new(),
        })
    }

    /// Drops every field not named in `fields`, in the order requested.
    pub fn project(&self, fields: Vec<String>) -> TableIterator<'a> {
        let mut data = Vec::new();
        for tuple in self.data.iter() {
            let mut new_field_types = Vec::new();
            let mut new_field_vals = Vec::new();
            for i in 0..tuple.get_tuple_desc().get_num_fields() {
                let field_name = tuple.get_tuple_desc().get_field_name(i).unwrap().clone();
                if fields.contains(&field_name) {
                    new_field_types.push(tuple.get_tuple_desc().get_field_type(i).unwrap().clone());
                    new_field_vals.push(tuple.get_field(i).unwrap().clone());
                }
            }
            let new_tuple_desc = TupleDesc::new(new_field_types, fields.clone());
            data.push(Tuple::new(new_field_vals, &new_tuple_desc));
        }
        TableIterator {
            table: self.table,
            current_index: 0,
            data,
            filters: Vec::new(),
        }
    }

    /// Queues a `field_name <op> constant` predicate, applied lazily by
    /// `next()`.
    pub fn table_filter(&mut self, field_name: &str, op: Op, constant: FieldValConstant) {
        self.filters.push((field_name.to_string(), op, constant));
    }

    /// Nested-loop equi-join against `other` on the named fields, producing
    /// tuples with `other`'s fields appended after `self`'s.
    pub fn join(
        &self,
        other: &TableIterator,
        field_name_left: &str,
        field_name_right: &str,
    ) -> TableIterator<'a> {
        let mut data = Vec::new();
        for tuple in self.data.iter() {
            let target_col_left = match tuple.get_tuple_desc().name_to_id(field_name_left) {
                Some(i) => i,
                None => continue,
            };
            for other_tuple in other.data.iter() {
                let target_col_right =
                    match other_tuple.get_tuple_desc().name_to_id(field_name_right) {
                        Some(i) => i,
                        None => continue,
                    };
                if tuple.get_field(target_col_left).unwrap()
                    == other_tuple.get_field(target_col_right).unwrap()
                {
                    let ctd = TupleDesc::combine(tuple.get_tuple_desc(), other_tuple.get_tuple_desc());
                    let combined_fields = tuple
                        .get_fields()
                        .iter()
                        .chain(other_tuple.get_fields().iter())
                        .cloned()
                        .collect::<Vec<_>>();
                    data.push(Tuple::new(combined_fields, &ctd));
                }
            }
        }
        TableIterator {
            table: self.table,
            current_index: 0,
            data,
            filters: Vec::new(),
        }
    }
}

impl<'a> Iterator for TableIterator<'a> {
    type Item = tuple::Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_index < self.data.len() {
            let tuple = self.data[self.current_index].clone();
            self.current_index += 1;
            if matches_filters(&tuple, &self.filters) {
                return Some(tuple);
            }
        }
        None
    }
}

fn matches_filters(tuple: &Tuple, filters: &[(String, Op, FieldValConstant)]) -> bool {
    filters.iter().all(|(field_name, op, constant)| {
        match tuple.get_tuple_desc().name_to_id(field_name) {
            Some(i) => {
                let field = tuple.get_field(i).unwrap();
                op.evaluate(field, constant)
            }
            None => false,
        }
    })
}
