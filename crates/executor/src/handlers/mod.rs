//! Command handlers, grouped by target

pub mod cursor;
pub mod store;
