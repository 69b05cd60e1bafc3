//! Domain types - core business entities
//!
//! These types describe media files, detected faces, configuration and the
//! indexing phase. They are independent of persistence and scheduling.

pub mod config;
pub mod file;
pub mod status;
