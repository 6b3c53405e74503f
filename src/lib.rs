// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod config;
pub mod db;
pub mod mart;
pub mod pipeline;
pub mod publish;
pub mod source;
