use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::Rng;

use crate::config::{EXCLUSIVE_LOCK_TIMEOUT_MS, SHARED_LOCK_TIMEOUT_MS};
use crate::error::DbError;
use crate::page_id::{HeapPageId, Permission};
use crate::transaction::TransactionId;

/// Per-page lock state: unlocked, shared by a set of holders, or
/// exclusively held by one. A transaction holds at most one mode per page.
#[derive(Debug, Clone, Default)]
enum LockState {
    #[default]
    Unlocked,
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

#[derive(Default)]
struct Inner {
    pages: HashMap<HeapPageId, LockState>,
    holdings: HashMap<TransactionId, HashSet<HeapPageId>>,
}

/// Per-page shared/exclusive lock manager implementing (a fragment of)
/// strict two-phase locking with timeout-based abort in place of deadlock
/// detection.
///
/// No wait-for graph: an acquirer that cannot proceed blocks on a condition
/// variable signaled on every release, re-checking the state against a
/// randomized deadline each time it wakes. When the deadline passes the
/// acquirer gives up and reports `TxnAborted`; the caller is responsible for
/// calling `transaction_complete(tid, false)`.
pub struct LockManager {
    inner: Mutex<Inner>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            inner: Mutex::new(Inner::default()),
            released: Condvar::new(),
        }
    }

    /// Acquires a lock on `pid` consistent with `perm`, blocking until
    /// granted or until a randomized per-acquire timeout expires.
    pub fn acquire_lock(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permission,
    ) -> Result<(), DbError> {
        let exclusive = perm == Permission::Write;
        let timeout = random_timeout(exclusive);
        let deadline = Instant::now() + timeout;

        let mut guard = self.inner.lock().unwrap();
        loop {
            match try_grant(&mut guard, tid, pid, exclusive) {
                Grant::Granted => {
                    trace!("tid {:?} granted {:?} lock on {:?}", tid, perm, pid);
                    return Ok(());
                }
                Grant::Blocked => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            "tid {:?} timed out waiting for {:?} lock on {:?}",
                            tid, perm, pid
                        );
                        drop(guard);
                        return Err(DbError::TxnAborted(tid.get_tid()));
                    }
                    let (g, _timed_out) = self.released.wait_timeout(guard, deadline - now).unwrap();
                    guard = g;
                }
            }
        }
    }

    /// Force-releases a single page's lock for a transaction without
    /// transactional bookkeeping. Intended for tests and deadlock recovery.
    pub fn release_lock(&self, tid: TransactionId, pid: HeapPageId) {
        let mut guard = self.inner.lock().unwrap();
        release_one(&mut guard, tid, pid);
        drop(guard);
        self.released.notify_all();
    }

    /// Releases every lock held by `tid`.
    pub fn release_all(&self, tid: TransactionId) {
        let mut guard = self.inner.lock().unwrap();
        let pids: Vec<HeapPageId> = guard
            .holdings
            .get(&tid)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for pid in pids {
            release_one(&mut guard, tid, pid);
        }
        debug!("tid {:?} released all locks", tid);
        drop(guard);
        self.released.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> Option<Permission> {
        let guard = self.inner.lock().unwrap();
        match guard.pages.get(&pid) {
            Some(LockState::Exclusive(t)) if *t == tid => Some(Permission::Write),
            Some(LockState::Shared(holders)) if holders.contains(&tid) => Some(Permission::Read),
            _ => None,
        }
    }

    /// The set of pages `tid` currently holds any lock on.
    pub fn locked_pages(&self, tid: TransactionId) -> HashSet<HeapPageId> {
        self.inner
            .lock()
            .unwrap()
            .holdings
            .get(&tid)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

enum Grant {
    Granted,
    Blocked,
}

fn try_grant(inner: &mut Inner, tid: TransactionId, pid: HeapPageId, exclusive: bool) -> Grant {
    let state = inner.pages.entry(pid).or_default();
    match state {
        LockState::Unlocked => {
            *state = if exclusive {
                LockState::Exclusive(tid)
            } else {
                LockState::Shared(HashSet::from([tid]))
            };
            record_holding(inner, tid, pid);
            Grant::Granted
        }
        LockState::Shared(holders) => {
            if !exclusive {
                holders.insert(tid);
                record_holding(inner, tid, pid);
                Grant::Granted
            } else if holders.len() == 1 && holders.contains(&tid) {
                // Sole holder upgrading shared -> exclusive.
                *state = LockState::Exclusive(tid);
                Grant::Granted
            } else {
                Grant::Blocked
            }
        }
        LockState::Exclusive(holder) => {
            if *holder == tid {
                // Reentrant no-op, including a repeated request for a
                // transaction that already holds exclusive.
                Grant::Granted
            } else {
                Grant::Blocked
            }
        }
    }
}

fn record_holding(inner: &mut Inner, tid: TransactionId, pid: HeapPageId) {
    inner.holdings.entry(tid).or_default().insert(pid);
}

fn release_one(inner: &mut Inner, tid: TransactionId, pid: HeapPageId) {
    if let Some(state) = inner.pages.get_mut(&pid) {
        match state {
            LockState::Shared(holders) => {
                holders.remove(&tid);
                if holders.is_empty() {
                    inner.pages.remove(&pid);
                }
            }
            LockState::Exclusive(holder) if *holder == tid => {
                inner.pages.remove(&pid);
            }
            _ => {}
        }
    }
    if let Some(held) = inner.holdings.get_mut(&tid) {
        held.remove(&pid);
        if held.is_empty() {
            inner.holdings.remove(&tid);
        }
    }
}

fn random_timeout(exclusive: bool) -> Duration {
    let (lo, hi) = if exclusive {
        EXCLUSIVE_LOCK_TIMEOUT_MS
    } else {
        SHARED_LOCK_TIMEOUT_MS
    };
    let ms = rand::thread_rng().gen_range(lo..hi);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u64) -> TransactionId {
        TransactionId::for_test(n)
    }

    #[test]
    fn shared_locks_from_distinct_transactions_coexist() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        lm.acquire_lock(tid(1), pid, Permission::Read).unwrap();
        lm.acquire_lock(tid(2), pid, Permission::Read).unwrap();
        assert_eq!(lm.holds_lock(tid(1), pid), Some(Permission::Read));
        assert_eq!(lm.holds_lock(tid(2), pid), Some(Permission::Read));
    }

    #[test]
    fn exclusive_lock_excludes_other_transactions() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        lm.acquire_lock(tid(1), pid, Permission::Write).unwrap();
        let err = lm.acquire_lock(tid(2), pid, Permission::Read).unwrap_err();
        assert!(matches!(err, DbError::TxnAborted(_)));
    }

    #[test]
    fn reentrant_exclusive_is_a_no_op() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        lm.acquire_lock(tid(1), pid, Permission::Write).unwrap();
        lm.acquire_lock(tid(1), pid, Permission::Write).unwrap();
        assert_eq!(lm.holds_lock(tid(1), pid), Some(Permission::Write));
    }

    #[test]
    fn sole_shared_holder_upgrades_to_exclusive() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        lm.acquire_lock(tid(1), pid, Permission::Read).unwrap();
        lm.acquire_lock(tid(1), pid, Permission::Write).unwrap();
        assert_eq!(lm.holds_lock(tid(1), pid), Some(Permission::Write));
    }

    #[test]
    fn upgrade_with_other_shared_holder_times_out() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        lm.acquire_lock(tid(1), pid, Permission::Read).unwrap();
        lm.acquire_lock(tid(2), pid, Permission::Read).unwrap();
        let err = lm.acquire_lock(tid(1), pid, Permission::Write).unwrap_err();
        assert!(matches!(err, DbError::TxnAborted(_)));
    }

    #[test]
    fn release_unblocks_waiting_transaction() {
        use std::sync::Arc;
        use std::thread;

        let lm = Arc::new(LockManager::new());
        let pid = HeapPageId::new(1, 0);
        lm.acquire_lock(tid(1), pid, Permission::Write).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || lm2.acquire_lock(tid(2), pid, Permission::Write));

        thread::sleep(Duration::from_millis(50));
        lm.release_all(tid(1));

        assert!(handle.join().unwrap().is_ok());
        assert_eq!(lm.holds_lock(tid(2), pid), Some(Permission::Write));
    }

    #[test]
    fn release_all_clears_every_held_page() {
        let lm = LockManager::new();
        let p0 = HeapPageId::new(1, 0);
        let p1 = HeapPageId::new(1, 1);
        lm.acquire_lock(tid(1), p0, Permission::Read).unwrap();
        lm.acquire_lock(tid(1), p1, Permission::Write).unwrap();
        lm.release_all(tid(1));
        assert_eq!(lm.holds_lock(tid(1), p0), None);
        assert_eq!(lm.holds_lock(tid(1), p1), None);
        assert!(lm.locked_pages(tid(1)).is_empty());
    }
}
