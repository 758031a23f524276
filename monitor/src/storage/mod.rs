//! Local storage: settings and staging layout

pub mod layout;
pub mod settings;
