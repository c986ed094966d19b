//! Executor tests that need several modules at once
