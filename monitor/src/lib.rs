//! Artifactory monitor library
//!
//! Watches an artifact repository for new application versions and rolls
//! them out through a cluster deploy service, recording every attempt in a
//! durable ledger.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod ledger;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workers;
