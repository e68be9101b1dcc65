//! Upstream API wire models

pub mod models;
