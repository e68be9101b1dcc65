pub mod pipeline;
pub mod reconciler;
