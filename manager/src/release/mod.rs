pub mod fsm;
pub mod manager;

pub use fsm::ReleaseEvent;
pub use manager::{PipelineJob, ReleaseManager};
