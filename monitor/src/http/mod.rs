pub mod artifactory;
pub mod client;
pub mod deployments;
