//! On-disk persistence.

pub mod cache;
