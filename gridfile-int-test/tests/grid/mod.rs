//! Grid file integration tests.
//!
//! These exercise the public index operations against real files in a
//! fresh temporary directory per test.

mod crud_test;
mod range_query_test;
mod split_test;
mod multi_threaded_test;

/// Deterministic points scattered over [-1000, 1000)
pub(crate) fn scattered_points(count: u64) -> Vec<(i64, i64)> {
    (0..count)
        .map(|i| {
            let x = ((i * 7919) % 2000) as i64 - 1000;
            let y = ((i * 104729) % 2000) as i64 - 1000;
            (x, y)
        })
        .collect()
}
