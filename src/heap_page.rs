use crate::config;
use crate::error::DbError;
use crate::page_id::HeapPageId;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

pub use crate::page_id::Permission;

/// Fixed-size byte image of a heap page, parsed into a header bitmap plus
/// `num_slots` fixed-width tuple slots.
///
/// Layout, bit-exact:
///   - header: `ceil(num_slots / 8)` bytes, bit `i` = 1 iff slot `i` is used,
///     LSB = lowest slot index within each byte.
///   - slots: `num_slots` fixed-size tuple images at
///     `header_size + slot * tuple_size`.
///   - trailing bytes after the last slot are padding and round-trip
///     unchanged.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: HeapPageId,
    td: TupleDesc,
    header_size: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    num_slots: usize,
    dirtied_by: Option<TransactionId>,
}

/// `num_slots = floor((page_size * 8) / (tuple_size * 8 + 1))`, clamped so a
/// zero-size tuple never divides by zero in degenerate configurations.
pub fn num_slots_for(tuple_size: usize, page_size: usize) -> usize {
    if tuple_size == 0 {
        return 0;
    }
    (page_size * 8) / (tuple_size * 8 + 1)
}

pub fn header_size_for(num_slots: usize) -> usize {
    (num_slots + 7) / 8
}

impl HeapPage {
    /// Parses a page image read off disk into a `HeapPage`. `data` must be
    /// exactly `config::page_size()` bytes.
    pub fn new(pid: HeapPageId, data: Vec<u8>, td: TupleDesc) -> Self {
        let page_size = config::page_size();
        let num_slots = num_slots_for(td.get_size(), page_size);
        let header_size = header_size_for(num_slots);
        let header = data[..header_size].to_vec();

        let mut tuples = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            if Self::get_slot(&header, i) {
                let start = header_size + i * td.get_size();
                let end = start + td.get_size();
                let tuple_data = &data[start..end];
                let mut t = Tuple::deserialize(tuple_data, &td);
                t.set_record_id(crate::tuple::RecordId::new(pid, i));
                tuples.push(Some(t));
            } else {
                tuples.push(None);
            }
        }

        HeapPage {
            pid,
            td,
            header_size,
            header,
            tuples,
            num_slots,
            dirtied_by: None,
        }
    }

    pub fn get_id(&self) -> HeapPageId {
        self.pid
    }

    /// Serializes back to the exact on-disk layout. Round-trips byte for
    /// byte on a page that hasn't been mutated since `new`.
    pub fn get_page_data(&self) -> Vec<u8> {
        let page_size = config::page_size();
        let mut data = self.header.clone();
        data.resize(self.header_size, 0);
        for slot in &self.tuples {
            match slot {
                Some(t) => data.extend(t.serialize()),
                None => data.extend(vec![0u8; self.td.get_size()]),
            }
        }
        data.resize(page_size, 0);
        data
    }

    fn get_slot(header: &[u8], i: usize) -> bool {
        let idx = i / 8;
        let bit = i % 8;
        if idx >= header.len() {
            return false;
        }
        (header[idx] & (1 << bit)) != 0
    }

    fn set_slot(header: &mut [u8], i: usize, value: bool) {
        let idx = i / 8;
        let bit = i % 8;
        if value {
            header[idx] |= 1 << bit;
        } else {
            header[idx] &= !(1 << bit);
        }
    }

    /// All-zero header and payload, `config::page_size()` bytes.
    pub fn create_empty_page_data() -> Vec<u8> {
        vec![0u8; config::page_size()]
    }

    /// Inserts into the lowest-index free slot. Fails `SlotFull` if none.
    pub fn insert_tuple(&mut self, mut t: Tuple) -> Result<(), DbError> {
        for i in 0..self.num_slots {
            if !Self::get_slot(&self.header, i) {
                t.set_record_id(crate::tuple::RecordId::new(self.pid, i));
                self.tuples[i] = Some(t);
                Self::set_slot(&mut self.header, i, true);
                return Ok(());
            }
        }
        Err(DbError::SlotFull(self.pid))
    }

    /// Fails `TupleNotFound` unless the record id refers to a set slot on
    /// this page.
    pub fn delete_tuple(&mut self, t: &Tuple) -> Result<(), DbError> {
        let rid = t.get_record_id();
        if rid.get_page_id() != self.pid {
            return Err(DbError::TupleNotFound);
        }
        let slot = rid.get_tuple_no();
        if slot >= self.num_slots || !Self::get_slot(&self.header, slot) {
            return Err(DbError::TupleNotFound);
        }
        self.tuples[slot] = None;
        Self::set_slot(&mut self.header, slot, false);
        Ok(())
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots)
            .filter(|&i| !Self::get_slot(&self.header, i))
            .count()
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtied_by = if dirty { Some(tid) } else { None };
    }

    /// The transaction id that last dirtied this page, if any.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    /// Lazy, non-restartable iterator over set slots in ascending order.
    pub fn iter(&self) -> HeapPageIterator<'_> {
        HeapPageIterator {
            page: self,
            index: 0,
        }
    }

    pub fn get_tuple(&self, i: usize) -> Option<&Tuple> {
        self.tuples.get(i).and_then(|t| t.as_ref())
    }
}

pub struct HeapPageIterator<'a> {
    page: &'a HeapPage,
    index: usize,
}

impl<'a> Iterator for HeapPageIterator<'a> {
    type Item = &'a Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.page.num_slots {
            let i = self.index;
            self.index += 1;
            if let Some(t) = &self.page.tuples[i] {
                return Some(t);
            }
        }
        None
    }
}
