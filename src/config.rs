//! Process-wide knobs named in the external interface (see spec doc, "Configuration
//! recognized by the core"). Modeled as an explicit struct behind a `OnceCell`
//! rather than scattered `const`s, so tests can override `PAGE_SIZE` and reset it
//! afterwards without leaving global mutable statics lying around.

use once_cell::sync::OnceCell;
use std::sync::RwLock;

/// Bytes per page. Globally mutable for testing only; changing it at runtime
/// requires rebuilding all files that were written under the old value.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Pool capacity when unspecified.
pub const DEFAULT_PAGES: usize = 50;

/// Histogram bucket count used by `TableStats`; must be >= 100.
pub const NUM_HIST_BINS: usize = 100;

/// Unit cost per page for `TableStats::estimate_scan_cost`.
pub const IOCOSTPERPAGE: usize = 1000;

/// Shared-lock acquire timeout range, in milliseconds: `[33, 366)`.
pub const SHARED_LOCK_TIMEOUT_MS: (u64, u64) = (33, 366);

/// Exclusive-lock acquire timeout range, in milliseconds: `[444, 544)`.
pub const EXCLUSIVE_LOCK_TIMEOUT_MS: (u64, u64) = (444, 544);

static PAGE_SIZE: OnceCell<RwLock<usize>> = OnceCell::new();

fn cell() -> &'static RwLock<usize> {
    PAGE_SIZE.get_or_init(|| RwLock::new(DEFAULT_PAGE_SIZE))
}

/// Current process-wide page size, in bytes.
pub fn page_size() -> usize {
    *cell().read().unwrap()
}

/// Overrides the process-wide page size. Test-only: existing heap files
/// written under a different page size become unreadable until reset.
pub fn set_page_size(bytes: usize) {
    *cell().write().unwrap() = bytes;
}

/// Restores `PAGE_SIZE` to its default. Tests that call `set_page_size`
/// should call this in a finally/Drop path to avoid bleeding into other tests.
pub fn reset_page_size() {
    set_page_size(DEFAULT_PAGE_SIZE);
}
