//! Mailfleet Storage - PostgreSQL persistence layer
//!
//! This crate provides the database pool, row models, and repositories
//! the dispatch pipeline reads from and writes to.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
