//! Detection and deployment of new application versions

pub mod detector;
pub mod extract;
pub mod files;
pub mod manifest;
pub mod pipeline;
pub mod worker;
