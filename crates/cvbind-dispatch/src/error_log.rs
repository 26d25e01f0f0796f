//! Per-thread conversion error log.
//!
//! Each thread running host code has its own log, so concurrent calls on
//! different threads never interleave their diagnostics. The dispatcher
//! clears the log when a call starts, appends one line per rejected
//! candidate, and drains it into the aggregated error when every candidate
//! has failed.

use std::cell::RefCell;

thread_local! {
    static CONVERSION_ERRORS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Empty the log and reserve room for `capacity` lines.
pub fn clear_and_reserve(capacity: usize) {
    CONVERSION_ERRORS.with_borrow_mut(|log| {
        log.clear();
        log.reserve(capacity);
    });
}

/// Append one failed attempt.
pub fn record(line: impl Into<String>) {
    let line = line.into();
    CONVERSION_ERRORS.with_borrow_mut(|log| log.push(line));
}

/// Snapshot of the lines recorded since the last clear.
pub fn recorded() -> Vec<String> {
    CONVERSION_ERRORS.with_borrow(Clone::clone)
}

pub fn len() -> usize {
    CONVERSION_ERRORS.with_borrow(Vec::len)
}

pub fn is_empty() -> bool {
    len() == 0
}

/// Drain the log.
pub fn take() -> Vec<String> {
    CONVERSION_ERRORS.with_borrow_mut(std::mem::take)
}

/// Replace the log with `lines`, discarding whatever it held.
pub fn restore(lines: Vec<String>) {
    CONVERSION_ERRORS.with_borrow_mut(|log| *log = lines);
}
