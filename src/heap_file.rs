use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::debug;

use crate::buffer_pool::BufferPool;
use crate::config;
use crate::error::{DbError, DbResult};
use crate::heap_page::HeapPage;
use crate::page_id::{HeapPageId, Permission};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

/// A table's on-disk representation: a contiguous sequence of
/// `config::page_size()`-byte heap pages in a single backing file, with no
/// file header. Page number `n` occupies bytes `[n*page_size, (n+1)*page_size)`.
pub struct HeapFile {
    file: Mutex<File>,
    td: TupleDesc,
    id: usize,
}

fn next_table_id() -> usize {
    // Derived from a process-wide counter rather than the file's path hash,
    // since the teaching-grade scope never persists a catalog across
    // process restarts; stability only needs to hold for the file's
    // in-process lifetime, which this satisfies trivially.
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    NEXT.fetch_add(1, Ordering::SeqCst)
}

impl HeapFile {
    pub fn new(file: File, td: TupleDesc) -> Self {
        HeapFile {
            file: Mutex::new(file),
            td,
            id: next_table_id(),
        }
    }

    pub fn get_id(&self) -> usize {
        self.id
    }

    pub fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    /// Reads the page with the given id from disk. Fails `InvalidPage` if
    /// the page number falls beyond the current file length or a short read
    /// occurs.
    pub fn read_page(&self, pid: &HeapPageId) -> DbResult<HeapPage> {
        let page_size = config::page_size();
        let mut file = self.file.lock().unwrap();
        let file_len = file.metadata()?.len() as usize;
        let page_no = pid.get_page_number();
        if (page_no + 1) * page_size > file_len {
            return Err(DbError::InvalidPage(*pid));
        }
        let mut data = vec![0u8; page_size];
        file.seek(SeekFrom::Start((page_no * page_size) as u64))?;
        file.read_exact(&mut data)
            .map_err(|_| DbError::InvalidPage(*pid))?;
        Ok(HeapPage::new(*pid, data, self.td.clone()))
    }

    /// Writes exactly `config::page_size()` bytes at the page's offset.
    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let page_size = config::page_size();
        let pid = page.get_id();
        let data = page.get_page_data();
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.get_page_number() * page_size) as u64))?;
        file.write_all(&data)?;
        Ok(())
    }

    /// `floor(file_length / page_size)`, integer division (see Design
    /// Notes: the prior floating-point `ceil` division could overcount a
    /// file whose length isn't an exact multiple of `page_size`).
    pub fn num_pages(&self) -> usize {
        let page_size = config::page_size();
        let file = self.file.lock().unwrap();
        let len = file.metadata().unwrap().len() as usize;
        len / page_size
    }

    /// Appends one all-zero page to the backing file and returns its page
    /// number. Caller must hold the buffer pool's pool-level mutex across
    /// the grow-and-reacquire sequence so `num_pages()` doesn't change
    /// underneath it (see `BufferPool::insert_tuple`).
    fn grow_by_one_page(&self) -> DbResult<usize> {
        let page_size = config::page_size();
        let mut file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        let new_page_no = (len as usize) / page_size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&HeapPage::create_empty_page_data())?;
        debug!("table {} grew to {} pages", self.id, new_page_no + 1);
        Ok(new_page_no)
    }

    /// Scans pages `[0, num_pages())` via the buffer pool for the first one
    /// with a free slot; if none, grows the file by one page and inserts
    /// there. Returns the single modified page, per the external contract.
    pub fn insert_tuple(
        &self,
        bp: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> DbResult<Vec<Arc<RwLock<HeapPage>>>> {
        self.td.check_compatible(tuple.get_tuple_desc())?;

        // Holding the pool's insert mutex for the whole scan-then-maybe-grow
        // sequence keeps "grow by one page" and "re-fetch the new last page"
        // atomic: two concurrent inserters can't both decide to grow.
        let _guard = bp.insert_guard();

        let mut page_no = 0;
        let num_pages = self.num_pages();
        while page_no < num_pages {
            let pid = HeapPageId::new(self.id, page_no);
            let page = bp.get_page(tid, pid, Permission::Write)?;
            let has_slot = page.read().unwrap().num_empty_slots() > 0;
            if has_slot {
                let mut guard = page.write().unwrap();
                guard.insert_tuple(tuple)?;
                guard.mark_dirty(true, tid);
                drop(guard);
                return Ok(vec![page]);
            }
            page_no += 1;
        }

        let new_page_no = self.grow_by_one_page()?;
        let pid = HeapPageId::new(self.id, new_page_no);
        let page = bp.get_page(tid, pid, Permission::Write)?;
        let mut guard = page.write().unwrap();
        guard.insert_tuple(tuple)?;
        guard.mark_dirty(true, tid);
        drop(guard);
        Ok(vec![page])
    }

    /// Acquires the tuple's page exclusively and deletes it there.
    pub fn delete_tuple(
        &self,
        bp: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> DbResult<Vec<Arc<RwLock<HeapPage>>>> {
        let rid = tuple.get_record_id();
        let pid = rid.get_page_id();
        let page = bp.get_page(tid, pid, Permission::Write)?;
        let mut guard = page.write().unwrap();
        guard.delete_tuple(tuple)?;
        guard.mark_dirty(true, tid);
        drop(guard);
        Ok(vec![page])
    }

    /// Lazy, restartable iterator over every page, shared-locked through the
    /// given buffer pool.
    pub fn iter<'a>(&'a self, bp: &'a BufferPool, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator {
            heap_file: self,
            bp,
            current_page_index: 0,
            tid,
        }
    }
}

pub struct HeapFileIterator<'a> {
    heap_file: &'a HeapFile,
    bp: &'a BufferPool,
    current_page_index: usize,
    tid: TransactionId,
}

impl HeapFileIterator<'_> {
    /// Resets the iterator back to page 0, matching the restartable
    /// contract in the external interface.
    pub fn rewind(&mut self) {
        self.current_page_index = 0;
    }
}

impl<'a> Iterator for HeapFileIterator<'a> {
    type Item = DbResult<Arc<RwLock<HeapPage>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_page_index >= self.heap_file.num_pages() {
            return None;
        }
        let pid = HeapPageId::new(self.heap_file.get_id(), self.current_page_index);
        self.current_page_index += 1;
        Some(self.bp.get_page(self.tid, pid, Permission::Read))
    }
}
