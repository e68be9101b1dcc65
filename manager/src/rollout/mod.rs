pub mod canary;

pub use canary::CanaryExecutor;
