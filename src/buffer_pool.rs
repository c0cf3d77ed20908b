use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, trace};

use crate::config;
use crate::database;
use crate::error::{DbError, DbResult};
use crate::heap_page::HeapPage;
use crate::lock_manager::LockManager;
use crate::lru::LruList;
use crate::page_id::{HeapPageId, Permission};
use crate::transaction::TransactionId;
use crate::tuple::Tuple;

/// Bounded, LRU-replaced, lock-guarded cache of heap pages shared by every
/// transaction in the process.
///
/// NO-STEAL: eviction never selects a dirty page. FORCE: a committing
/// transaction's dirty pages are force-flushed at commit. Together these
/// remove the need for an undo log — abort just discards the in-memory
/// dirty copy.
pub struct BufferPool {
    pages: Mutex<HashMap<HeapPageId, Arc<RwLock<HeapPage>>>>,
    lru: Mutex<LruList>,
    lock_manager: LockManager,
    capacity: usize,
    // Serializes HeapFile::insert_tuple's "scan for a free slot, else grow
    // by one page and insert there" sequence across concurrent inserters so
    // the grow-then-reacquire pair is atomic (see Design Notes).
    insert_lock: Mutex<()>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(config::DEFAULT_PAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BufferPool {
            pages: Mutex::new(HashMap::new()),
            lru: Mutex::new(LruList::new()),
            lock_manager: LockManager::new(),
            capacity,
            insert_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_resident_pages(&self) -> usize {
        self.pages.lock().unwrap().len()
    }

    /// Held across `HeapFile::insert_tuple`'s scan-then-grow sequence.
    pub fn insert_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.insert_lock.lock().unwrap()
    }

    /// Acquires a lock on `pid` consistent with `perm` (blocking up to the
    /// lock manager's randomized timeout), then returns the cached page,
    /// fetching it from disk and evicting a clean victim if the pool is
    /// full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permission,
    ) -> DbResult<Arc<RwLock<HeapPage>>> {
        self.lock_manager.acquire_lock(tid, pid, perm)?;

        {
            let pages = self.pages.lock().unwrap();
            if let Some(page) = pages.get(&pid) {
                let page = Arc::clone(page);
                drop(pages);
                self.lru.lock().unwrap().touch(pid);
                return Ok(page);
            }
        }

        // Disk I/O happens without holding the pool mutex, so a slow read
        // doesn't stall other transactions touching unrelated pages.
        let db = database::get_global_db();
        let catalog = db.get_catalog();
        let table = catalog
            .get_table_from_id(pid.get_table_id())
            .expect("page request for a table id not present in the catalog");
        let page_data = table.read_page(&pid)?;

        let mut pages = self.pages.lock().unwrap();
        // Another thread may have loaded this page while we were doing I/O.
        if let Some(page) = pages.get(&pid) {
            let page = Arc::clone(page);
            drop(pages);
            self.lru.lock().unwrap().touch(pid);
            return Ok(page);
        }

        if pages.len() >= self.capacity {
            self.evict_one(&mut pages)?;
        }

        let page = Arc::new(RwLock::new(page_data));
        pages.insert(pid, Arc::clone(&page));
        drop(pages);
        self.lru.lock().unwrap().insert_front(pid);
        trace!("tid {:?} loaded page {:?} from disk", tid, pid);
        Ok(page)
    }

    /// Scans from the LRU tail toward the head for the first clean page and
    /// discards it. Fails `NoSpace` if every resident page is dirty.
    fn evict_one(&self, pages: &mut HashMap<HeapPageId, Arc<RwLock<HeapPage>>>) -> DbResult<()> {
        let mut lru = self.lru.lock().unwrap();
        let victim = lru
            .iter_from_tail()
            .find(|pid| match pages.get(pid) {
                Some(p) => p.read().unwrap().is_dirty().is_none(),
                None => false,
            });
        match victim {
            Some(pid) => {
                pages.remove(&pid);
                lru.remove(pid);
                debug!("evicted clean page {:?}", pid);
                Ok(())
            }
            None => Err(DbError::NoSpace),
        }
    }

    /// Inserts `tuple` into `table_id` via its heap file, then for each page
    /// the heap file touched, promotes it at the head of the LRU list (the
    /// page already carries its dirty owner and exclusive lock from the
    /// heap file's own `get_page` call).
    pub fn insert_tuple(&self, tid: TransactionId, table_id: usize, tuple: Tuple) -> DbResult<()> {
        let db = database::get_global_db();
        let table = db
            .get_catalog()
            .get_table_from_id(table_id)
            .ok_or(DbError::SchemaMismatch)?;
        let pages = table.insert_tuple(self, tid, tuple)?;
        self.touch_written_pages(&pages);
        Ok(())
    }

    /// Deletes `tuple` via its table's heap file.
    pub fn delete_tuple(&self, tid: TransactionId, table_id: usize, tuple: &Tuple) -> DbResult<()> {
        let db = database::get_global_db();
        let table = db
            .get_catalog()
            .get_table_from_id(table_id)
            .ok_or(DbError::SchemaMismatch)?;
        let pages = table.delete_tuple(self, tid, tuple)?;
        self.touch_written_pages(&pages);
        Ok(())
    }

    fn touch_written_pages(&self, pages: &[Arc<RwLock<HeapPage>>]) {
        let mut lru = self.lru.lock().unwrap();
        for page in pages {
            lru.touch(page.read().unwrap().get_id());
        }
    }

    /// Force-releases a lock without transactional bookkeeping. Testing and
    /// deadlock-recovery aid only.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: HeapPageId) {
        self.lock_manager.release_lock(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> bool {
        self.lock_manager.holds_lock(tid, pid).is_some()
    }

    /// Commits `tid`: flushes every resident page it dirtied, clears their
    /// dirty flag, and releases every lock it holds.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        if commit {
            self.commit(tid)?;
        } else {
            self.abort(tid);
        }
        self.lock_manager.release_all(tid);
        Ok(())
    }

    fn commit(&self, tid: TransactionId) -> DbResult<()> {
        let dirtied = self.pages_dirtied_by(tid);
        for pid in dirtied {
            let pages = self.pages.lock().unwrap();
            let page_arc = match pages.get(&pid) {
                Some(p) => Arc::clone(p),
                None => continue,
            };
            drop(pages);
            let mut page = page_arc.write().unwrap();
            let db = database::get_global_db();
            let table = db
                .get_catalog()
                .get_table_from_id(pid.get_table_id())
                .expect("dirtied page belongs to a table absent from the catalog");
            table.write_page(&page)?;
            page.mark_dirty(false, tid);
        }
        debug!("tid {:?} committed", tid);
        Ok(())
    }

    fn abort(&self, tid: TransactionId) {
        let dirtied = self.pages_dirtied_by(tid);
        let mut pages = self.pages.lock().unwrap();
        let mut lru = self.lru.lock().unwrap();
        for pid in dirtied {
            pages.remove(&pid);
            lru.remove(pid);
        }
        debug!("tid {:?} aborted, discarded its dirty pages", tid);
    }

    fn pages_dirtied_by(&self, tid: TransactionId) -> Vec<HeapPageId> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| p.read().unwrap().is_dirty() == Some(tid))
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Flushes every resident page regardless of dirty state. Testing aid;
    /// unsafe under NO-STEAL since it can write pages from transactions that
    /// haven't committed.
    pub fn flush_all_pages(&self) -> DbResult<()> {
        let pages = self.pages.lock().unwrap();
        for (pid, page_arc) in pages.iter() {
            let mut page = page_arc.write().unwrap();
            let db = database::get_global_db();
            let table = db
                .get_catalog()
                .get_table_from_id(pid.get_table_id())
                .expect("resident page belongs to a table absent from the catalog");
            table.write_page(&page)?;
            if let Some(owner) = page.is_dirty() {
                page.mark_dirty(false, owner);
            }
        }
        Ok(())
    }

    /// Removes a page from the pool without flushing it. Used by recovery
    /// and index maintenance paths that know the disk copy is already
    /// authoritative.
    pub fn discard_page(&self, pid: HeapPageId) {
        self.pages.lock().unwrap().remove(&pid);
        self.lru.lock().unwrap().remove(pid);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
