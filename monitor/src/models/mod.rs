pub mod deployment;
pub mod repository;
