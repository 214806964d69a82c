use serde::Serialize;

/// Lifecycle of one bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InjectionState {
    NotReady,
    /// Waiting for readiness; re-armed in place on context loss.
    Polling,
    Ready,
    Failed,
}

impl InjectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InjectionState::Ready | InjectionState::Failed)
    }
}
