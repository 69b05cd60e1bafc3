//! Services over the record store.
//!
//! ## Available Services
//!
//! - [`status`] - Library-wide indexing phase and progress
//! - [`faces`] - Per-file face queries
//! - [`library`] - Media library discovery and registration

pub mod faces;
pub mod library;
pub mod status;
