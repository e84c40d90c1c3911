// Library root: the boundary around the rules engine (config, deadline
// schedule, SQLite store, points import, and season orchestration). Exposed
// as a library so integration tests and the binary share one API.

pub mod config;
pub mod db;
pub mod points_import;
pub mod schedule;
pub mod service;
