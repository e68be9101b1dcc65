//! Manager API wire models

pub mod models;
