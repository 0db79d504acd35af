//! Eligibility and commitment gates.
//!
//! A gate pairs one predicate with the fixed message shown when it fails.
//! Eligibility gates end the session; social gates only hold the applicant
//! on the current step until they follow the link.

use serde::{Deserialize, Serialize};

/// Every gate either flow can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Soulmate: applicant has never attended a previous cohort.
    SoulmateFirstTime,
    /// Soulmate: applicant agrees to give feedback after the meeting.
    SoulmateFeedback,
    /// Soulmate: applicant followed the Instagram handle before completing.
    SoulmateSocialFollow,
    /// Launchpad: applicant followed the Instagram handle before leaving page 1.
    LaunchpadSocialFollow,
    /// Launchpad: a wedding date has been fixed.
    LaunchpadWeddingDate,
    /// Launchpad: applicant has not attended a previous Launchpad.
    LaunchpadFirstTime,
    /// Launchpad: applicant commits to feedback and active participation.
    LaunchpadCommitment,
}

impl Gate {
    /// The fixed message shown when this gate fails.
    pub fn message(&self) -> &'static str {
        match self {
            Self::SoulmateFirstTime => {
                "Thank you for your truthfulness! Please keep maximizing the encounter you’ve had in the previous cohort. Abide in thanksgiving and be a consistent doer of the word. Your testimony will come. Kindly allow others to maximize the limited slots available. God bless you!"
            }
            Self::SoulmateFeedback => {
                "Thank you for your interest. To ensure a committed community, feedback is required for participation. We hope to see you another time!"
            }
            Self::SoulmateSocialFollow => "Please follow to continue",
            Self::LaunchpadSocialFollow => {
                "Please follow @coupleslaunchpad on Instagram before continuing"
            }
            Self::LaunchpadWeddingDate => {
                "This cohort is strictly for couples with a fixed wedding date. Please wait for the next cohort."
            }
            Self::LaunchpadFirstTime => {
                "We are focusing on first-time attendees for this cohort. Thank you for your honesty!"
            }
            Self::LaunchpadCommitment => {
                "Commitment to feedback and active participation is required to join this cohort."
            }
        }
    }

    /// Whether failing this gate ends the session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::SoulmateSocialFollow | Self::LaunchpadSocialFollow)
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SoulmateFirstTime => "soulmate_first_time",
            Self::SoulmateFeedback => "soulmate_feedback",
            Self::SoulmateSocialFollow => "soulmate_social_follow",
            Self::LaunchpadSocialFollow => "launchpad_social_follow",
            Self::LaunchpadWeddingDate => "launchpad_wedding_date",
            Self::LaunchpadFirstTime => "launchpad_first_time",
            Self::LaunchpadCommitment => "launchpad_commitment",
        };
        write!(f, "{s}")
    }
}

/// A failed gate: which one, and the message to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub gate: Gate,
    pub message: String,
}

impl Rejection {
    pub fn from_gate(gate: Gate) -> Self {
        Self {
            gate,
            message: gate.message().to_string(),
        }
    }
}

/// Result of evaluating one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Pass,
    Reject(Rejection),
}

/// Evaluate `gate` given whether its predicate holds.
pub fn gate_check(gate: Gate, passed: bool) -> GateVerdict {
    if passed {
        GateVerdict::Pass
    } else {
        tracing::debug!(%gate, "Gate failed");
        GateVerdict::Reject(Rejection::from_gate(gate))
    }
}
