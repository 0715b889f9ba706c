pub mod config;
pub mod error;
pub mod logging;
pub mod repository;
pub mod sqlite_repository;
pub mod storage;
