//! Models served by the artmon HTTP front-end.

pub mod models;
