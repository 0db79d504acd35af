//! Outcomes and transition results shared by both flows.

use serde::{Deserialize, Serialize};

use super::gate::Rejection;

/// How a session ended. The detail string only exists once the session has
/// an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    None,
    /// Accepted; the detail is the assigned group.
    Accepted(String),
    /// Rejected; the detail is the message shown to the applicant.
    Rejected(String),
}

impl Outcome {
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Accepted(detail) | Self::Rejected(detail) => Some(detail),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// What applying an action did to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<S, A> {
    /// Moved to a new step.
    Advanced(S),
    /// Same step; some sub-state changed.
    Stayed,
    /// A non-terminal gate held the applicant on the current step.
    Blocked(Rejection),
    /// A terminal gate failed; the session is now rejected.
    Rejected(Rejection),
    /// Data collection is complete and the application can be submitted.
    ReadyToSubmit(A),
    /// The session was wiped back to its initial step.
    Reset,
}
