#[cfg(any(test, feature = "mutants"))]
use std::cell::Cell;

#[cfg(any(test, feature = "mutants"))]
thread_local! {
    static READ_LIMIT: Cell<usize> = const { Cell::new(usize::MAX) };
    static WAIT_COUNT: Cell<usize> = const { Cell::new(0) };
}

/// Cap a read length; tests shrink it to force records across many reads.
pub(super) fn read_limit(len: usize) -> usize {
    #[cfg(any(test, feature = "mutants"))]
    {
        READ_LIMIT.with(|limit| len.min(limit.get()).max(1))
    }
    #[cfg(not(any(test, feature = "mutants")))]
    {
        len
    }
}

#[cfg(any(test, feature = "mutants"))]
#[allow(dead_code)]
pub(crate) fn set_read_limit(limit: Option<usize>) {
    READ_LIMIT.with(|value| value.set(limit.unwrap_or(usize::MAX)));
}

#[cfg(any(test, feature = "mutants"))]
pub(super) fn record_wait() {
    WAIT_COUNT.with(|count| count.set(count.get() + 1));
}

#[cfg(any(test, feature = "mutants"))]
#[allow(dead_code)]
pub(crate) fn wait_count() -> usize {
    WAIT_COUNT.with(|count| count.get())
}

#[cfg(any(test, feature = "mutants"))]
#[allow(dead_code)]
pub(crate) fn reset_wait_count() {
    WAIT_COUNT.with(|count| count.set(0));
}
