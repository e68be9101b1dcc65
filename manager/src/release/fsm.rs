//! Release lifecycle state machine

use crate::models::release::ReleaseStatus;

/// Event driving a release between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseEvent {
    Approve,
    Deploy,
    Complete,
    Rollback,
}

impl ReleaseStatus {
    /// Status reached by applying `event`, or why the transition is refused
    pub fn apply(self, event: ReleaseEvent) -> Result<ReleaseStatus, String> {
        let next = match (self, event) {
            (ReleaseStatus::PendingApproval, ReleaseEvent::Approve) => ReleaseStatus::Approved,
            (ReleaseStatus::Approved, ReleaseEvent::Deploy) => ReleaseStatus::Deploying,
            (ReleaseStatus::Deploying, ReleaseEvent::Complete) => ReleaseStatus::Completed,

            // Rollback is accepted from any status, a repeat re-records the target
            (_, ReleaseEvent::Rollback) => ReleaseStatus::RolledBack,

            (state, event) => {
                return Err(format!(
                    "cannot {:?} a release in status {}",
                    event, state
                ));
            }
        };
        Ok(next)
    }
}
