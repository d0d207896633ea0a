pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod session;
pub mod sql;
pub mod types;
