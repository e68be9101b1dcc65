//! Build-system and version-control API models

pub mod gitlab;
pub mod jenkins;
