//! Persistence integration tests.

mod reopen_test;
