//! Managed configuration items and the project catalog

pub mod configs;
pub mod projects;

pub use configs::ConfigService;
pub use projects::ProjectService;
