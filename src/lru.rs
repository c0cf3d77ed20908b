//! Intrusive doubly-linked list paired with a page-id -> node index map, used
//! by the buffer pool to track access order in O(1) rather than the
//! linear `indexOf` scans a naive Vec-backed recency list would need.

use std::collections::HashMap;

use crate::page_id::HeapPageId;

struct Node {
    pid: HeapPageId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Most-recently-used at `head`, least-recently-used at `tail`.
#[derive(Default)]
pub struct LruList {
    arena: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<HeapPageId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruList {
    pub fn new() -> Self {
        LruList::default()
    }

    pub fn contains(&self, pid: HeapPageId) -> bool {
        self.index.contains_key(&pid)
    }

    /// Inserts `pid` at the head (most-recently-used position). No-op if
    /// already present — callers should use `touch` to re-promote.
    pub fn insert_front(&mut self, pid: HeapPageId) {
        if self.index.contains_key(&pid) {
            self.touch(pid);
            return;
        }
        let idx = self.alloc(pid);
        self.link_front(idx);
    }

    /// Moves an already-present entry to the head.
    pub fn touch(&mut self, pid: HeapPageId) {
        if let Some(&idx) = self.index.get(&pid) {
            if self.head == Some(idx) {
                return;
            }
            self.unlink(idx);
            self.link_front(idx);
        }
    }

    pub fn remove(&mut self, pid: HeapPageId) {
        if let Some(idx) = self.index.remove(&pid) {
            self.unlink(idx);
            self.free.push(idx);
        }
    }

    /// Iterates from least-recently-used to most-recently-used, i.e. the
    /// order eviction should scan in.
    pub fn iter_from_tail(&self) -> impl Iterator<Item = HeapPageId> + '_ {
        let mut cur = self.tail;
        std::iter::from_fn(move || {
            let idx = cur?;
            cur = self.arena[idx].prev;
            Some(self.arena[idx].pid)
        })
    }

    fn alloc(&mut self, pid: HeapPageId) -> usize {
        let idx = match self.free.pop() {
            Some(i) => {
                self.arena[i] = Node {
                    pid,
                    prev: None,
                    next: None,
                };
                i
            }
            None => {
                self.arena.push(Node {
                    pid,
                    prev: None,
                    next: None,
                });
                self.arena.len() - 1
            }
        };
        self.index.insert(pid, idx);
        idx
    }

    fn link_front(&mut self, idx: usize) {
        self.arena[idx].prev = None;
        self.arena[idx].next = self.head;
        if let Some(h) = self.head {
            self.arena[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.arena[idx].prev;
        let next = self.arena[idx].next;
        match prev {
            Some(p) => self.arena[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena[n].prev = prev,
            None => self.tail = prev,
        }
        self.arena[idx].prev = None;
        self.arena[idx].next = None;
    }
}
