//! Hierarchical file/folder storage over a flat metadata store.
//!
//! Volumes belong to an account and hold entries addressed by slash-separated
//! keys. Folders are entries whose key ends in `/`; their ancestors are
//! materialized on write and their descendants follow them on rename, copy
//! and delete.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
