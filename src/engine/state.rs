use serde::Serialize;
use std::time::{Duration, Instant};

/// Pipeline lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Running {
        #[serde(skip)]
        start_time: Option<Instant>,
    },
    /// The driver is done; downstream stages are emptying their channels
    Draining {
        frames_emitted: u64,
    },
    Completed {
        #[serde(skip)]
        duration: Option<Duration>,
    },
    Failed {
        error_msg: String,
    },
}

impl PipelineState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        matches!(
            (self, target),
            (Idle, Running { .. }) |

            (Running { .. }, Draining { .. }) |
            (Running { .. }, Completed { .. }) |
            (Running { .. }, Failed { .. }) |

            (Draining { .. }, Completed { .. }) |
            (Draining { .. }, Failed { .. })
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Running { .. } => "Running",
            Self::Draining { .. } => "Draining",
            Self::Completed { .. } => "Completed",
            Self::Failed { .. } => "Failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let idle = PipelineState::Idle;
        let running = PipelineState::Running { start_time: None };

        assert!(idle.can_transition_to(&running));
        assert!(!running.can_transition_to(&idle));
    }

    #[test]
    fn test_draining_only_after_running() {
        let draining = PipelineState::Draining { frames_emitted: 10 };

        assert!(!PipelineState::Idle.can_transition_to(&draining));
        assert!(PipelineState::Running { start_time: None }.can_transition_to(&draining));
        assert!(draining.can_transition_to(&PipelineState::Completed { duration: None }));
    }

    #[test]
    fn test_finished_states_are_final() {
        let failed = PipelineState::Failed {
            error_msg: "write failed".to_string(),
        };
        let completed = PipelineState::Completed { duration: None };

        assert!(failed.is_finished());
        assert!(!failed.can_transition_to(&PipelineState::Idle));
        assert!(!completed.can_transition_to(&PipelineState::Running { start_time: None }));
    }
}
