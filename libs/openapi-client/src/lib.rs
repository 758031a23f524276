//! Models exchanged with the cluster deploy service.

pub mod models;
