use thiserror::Error;

/// Problems with a target as authored by the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("Repository URI is required")]
    BlankUri,
}

/// Why an owner could not accept a scheduled action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The owner is disabled, stopped, or has been dropped.
    #[error("{0} is not triggerable")]
    NotTriggerable(String),

    #[error("{owner} rejected the trigger: {reason}")]
    Rejected { owner: String, reason: String },
}
