//! Core domain entities of the entry store.
//!
//! Volumes are per-account containers; entries are the files and folders
//! inside them. Both validate their own fields and only change through
//! setters, so a constructed value is always consistent.

pub mod entry;
pub mod key;
pub mod volume;

pub use entry::{Entry, FOLDER_TYPE};
pub use volume::Volume;
