//! Per-case lifecycle: `Pending -> Running -> Finished`.

use thiserror::Error;

use crate::outcome::CaseResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CaseState {
    #[default]
    Pending,
    Running,
    Finished(CaseResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("case is already running")]
    AlreadyRunning,
    #[error("case was never started")]
    NotStarted,
    #[error("case already reached a terminal state")]
    AlreadyFinished,
}

impl CaseState {
    /// `Pending -> Running`.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        match self {
            CaseState::Pending => {
                *self = CaseState::Running;
                Ok(())
            }
            CaseState::Running => Err(TransitionError::AlreadyRunning),
            CaseState::Finished(_) => Err(TransitionError::AlreadyFinished),
        }
    }

    /// `Running -> Finished`. Terminal states are final.
    pub fn finish(&mut self, result: CaseResult) -> Result<(), TransitionError> {
        match self {
            CaseState::Running => {
                *self = CaseState::Finished(result);
                Ok(())
            }
            CaseState::Pending => Err(TransitionError::NotStarted),
            CaseState::Finished(_) => Err(TransitionError::AlreadyFinished),
        }
    }

    pub fn result(&self) -> Option<&CaseResult> {
        match self {
            CaseState::Finished(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseState::Finished(_))
    }
}
