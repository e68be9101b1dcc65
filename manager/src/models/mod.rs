pub mod config;
pub mod gray;
pub mod node;
pub mod project;
pub mod release;
pub mod rollout;
