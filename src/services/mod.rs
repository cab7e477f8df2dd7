//! Domain services and the use-case layer built on them.

pub mod entry_service;
pub mod storage_service;
pub mod volume_service;
