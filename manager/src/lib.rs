//! graymgr library
//!
//! Release lifecycle, build pipeline coordination, gray release targeting,
//! fleet version analysis and audited config management for the release
//! manager.

pub mod analyzer;
pub mod app;
pub mod catalog;
pub mod errors;
pub mod filesys;
pub mod fleet;
pub mod gray;
pub mod http;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod release;
pub mod rollout;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
