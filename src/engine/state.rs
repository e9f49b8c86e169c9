use serde::{Deserialize, Serialize};

/// Lifecycle of one pool run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PoolState {
    /// Queues built, uploader started
    #[default]
    Init,
    /// Workers pulling batches
    Running,
    /// All workers exited, uploader finishing
    Draining,
    /// Terminal
    Done,
}

impl PoolState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: PoolState) -> bool {
        use PoolState::*;

        matches!(
            (self, target),
            (Init, Running) | (Running, Draining) | (Draining, Done)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Running => "Running",
            Self::Draining => "Draining",
            Self::Done => "Done",
        }
    }
}
