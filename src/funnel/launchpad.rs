//! Couples' Launchpad funnel state machine.
//!
//! welcome → form(personal → marriage → commitment) → {success | rejected}.
//! The form step is a three-page sub-wizard whose page index moves one page
//! at a time in either direction.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::FunnelError;

use super::gate::{Gate, GateVerdict, Rejection, gate_check};
use super::model::{Confirmation, FieldValue, LaunchpadApplication, LaunchpadDraft};
use super::outcome::{Outcome, Transition};

/// Fallback shown when the server declines without a readable body.
pub const DEFAULT_DECLINE_MESSAGE: &str = "Registration failed.";

/// Default lifetime of the social-follow advisory.
pub const DEFAULT_ADVISORY_TTL: Duration = Duration::from_millis(4000);

/// Pages of the Launchpad sub-wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WizardPage {
    Personal = 1,
    Marriage = 2,
    Commitment = 3,
}

impl WizardPage {
    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn next(&self) -> Option<WizardPage> {
        match self {
            Self::Personal => Some(Self::Marriage),
            Self::Marriage => Some(Self::Commitment),
            Self::Commitment => None,
        }
    }

    pub fn previous(&self) -> Option<WizardPage> {
        match self {
            Self::Personal => None,
            Self::Marriage => Some(Self::Personal),
            Self::Commitment => Some(Self::Marriage),
        }
    }
}

impl TryFrom<u8> for WizardPage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Personal),
            2 => Ok(Self::Marriage),
            3 => Ok(Self::Commitment),
            other => Err(format!("wizard page {other} is out of range 1..=3")),
        }
    }
}

impl From<WizardPage> for u8 {
    fn from(page: WizardPage) -> Self {
        page.index()
    }
}

/// The steps of the Launchpad flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchpadStep {
    #[default]
    Welcome,
    Form(WizardPage),
    Success,
    Rejected,
}

impl LaunchpadStep {
    /// Step name without the page, as persisted.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Form(_) => "form",
            Self::Success => "success",
            Self::Rejected => "rejected",
        }
    }

    pub fn page(&self) -> Option<WizardPage> {
        match self {
            Self::Form(page) => Some(*page),
            _ => None,
        }
    }

    /// Inverse of `kind()` + `page()`. A form step with no page starts at page 1.
    pub fn from_parts(kind: &str, page: Option<WizardPage>) -> Option<Self> {
        match kind {
            "welcome" => Some(Self::Welcome),
            "form" => Some(Self::Form(page.unwrap_or(WizardPage::Personal))),
            "success" => Some(Self::Success),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Rejected)
    }

    /// Where "back" leads, if anywhere.
    pub fn previous(&self) -> Option<LaunchpadStep> {
        match self {
            Self::Form(page) => Some(page.previous().map_or(Self::Welcome, Self::Form)),
            Self::Welcome | Self::Success | Self::Rejected => None,
        }
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: LaunchpadStep) -> bool {
        use LaunchpadStep::*;
        match (self, target) {
            (Welcome, Form(WizardPage::Personal)) => true,
            (Form(from), Form(to)) => from.next() == Some(to) || from.previous() == Some(to),
            (Form(WizardPage::Personal), Welcome) => true,
            (Form(WizardPage::Commitment), Success) => true,
            (Form(_), Rejected) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LaunchpadStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Form(page) => write!(f, "form:{}", page.index()),
            other => write!(f, "{}", other.kind()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchpadAction {
    Start,
    Back,
    /// Leave the current wizard page (submits from the last page).
    Next,
    FollowSocial,
    Reset,
}

impl std::fmt::Display for LaunchpadAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Back => "back",
            Self::Next => "next",
            Self::FollowSocial => "follow_social",
            Self::Reset => "reset",
        };
        write!(f, "{s}")
    }
}

/// A transient notice that disappears on its own after `ttl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub rejection: Rejection,
    shown_at: Instant,
    ttl: Duration,
}

impl Advisory {
    fn new(rejection: Rejection, ttl: Duration) -> Self {
        Self {
            rejection,
            shown_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.shown_at.elapsed() < self.ttl
    }
}

pub type LaunchpadTransition = Transition<LaunchpadStep, LaunchpadApplication>;

/// Application state for one Launchpad session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchpadState {
    pub step: LaunchpadStep,
    /// Set once the last page validates.
    pub form_data: Option<LaunchpadApplication>,
    pub outcome: Outcome,
    pub confirmation: Option<Confirmation>,
    draft: LaunchpadDraft,
    followed_social: bool,
    advisory: Option<Advisory>,
    advisory_ttl: Duration,
}

impl Default for LaunchpadState {
    fn default() -> Self {
        Self::new(DEFAULT_ADVISORY_TTL)
    }
}

impl LaunchpadState {
    pub fn new(advisory_ttl: Duration) -> Self {
        Self {
            step: LaunchpadStep::Welcome,
            form_data: None,
            outcome: Outcome::None,
            confirmation: None,
            draft: LaunchpadDraft::default(),
            followed_social: false,
            advisory: None,
            advisory_ttl,
        }
    }

    /// Rebuild a session from persisted parts.
    pub fn restore(
        advisory_ttl: Duration,
        step: LaunchpadStep,
        draft: Option<LaunchpadDraft>,
        form_data: Option<LaunchpadApplication>,
        outcome: Outcome,
        confirmation: Option<Confirmation>,
    ) -> Self {
        let draft = draft
            .or_else(|| form_data.as_ref().map(LaunchpadDraft::from_application))
            .unwrap_or_default();
        let mut state = Self {
            step,
            form_data,
            outcome,
            confirmation,
            draft,
            ..Self::new(advisory_ttl)
        };

        match state.step {
            LaunchpadStep::Success => match &state.confirmation {
                Some(confirmation) => state.outcome = Outcome::Accepted(confirmation.summary()),
                None => return Self::new(advisory_ttl),
            },
            LaunchpadStep::Rejected => {
                if !matches!(state.outcome, Outcome::Rejected(_)) {
                    state.outcome = Outcome::Rejected(DEFAULT_DECLINE_MESSAGE.to_string());
                }
            }
            LaunchpadStep::Welcome | LaunchpadStep::Form(_) => {
                state.outcome = Outcome::None;
                state.confirmation = None;
            }
        }
        if let LaunchpadStep::Form(page) = state.step {
            let page = state.earliest_incomplete_page(page);
            if LaunchpadStep::Form(page) != state.step {
                tracing::debug!(from = %state.step, to = page.index(), "Restored page has unmet requirements; moving back");
                state.step = LaunchpadStep::Form(page);
            }
            // Pages past the first are only reachable after the social click.
            state.followed_social = page != WizardPage::Personal;
        }
        state
    }

    /// The first page up to `page` whose entry requirements the draft does not meet.
    fn earliest_incomplete_page(&self, page: WizardPage) -> WizardPage {
        if page == WizardPage::Personal || self.draft.validate_personal().is_err() {
            return WizardPage::Personal;
        }
        if page == WizardPage::Commitment
            && (!self.draft.has_wedding_date() || self.draft.validate_marriage().is_err())
        {
            return WizardPage::Marriage;
        }
        page
    }

    pub fn draft(&self) -> &LaunchpadDraft {
        &self.draft
    }

    pub fn has_followed_social(&self) -> bool {
        self.followed_social
    }

    /// The social advisory, while it is still showing.
    pub fn visible_advisory(&self) -> Option<&Rejection> {
        self.advisory
            .as_ref()
            .filter(|advisory| advisory.is_visible())
            .map(|advisory| &advisory.rejection)
    }

    pub fn record_field(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), FunnelError> {
        if !matches!(self.step, LaunchpadStep::Form(_)) {
            return Err(FunnelError::InvalidAction {
                step: self.step.to_string(),
                action: format!("record_field({name})"),
            });
        }
        self.draft.record_field(name, value)?;
        Ok(())
    }

    /// Apply one user action.
    pub fn apply(&mut self, action: LaunchpadAction) -> Result<LaunchpadTransition, FunnelError> {
        use LaunchpadAction::*;
        use LaunchpadStep::*;

        if action == Reset {
            self.reset();
            return Ok(Transition::Reset);
        }
        if self.step.is_terminal() {
            return Err(FunnelError::Terminal {
                step: self.step.to_string(),
            });
        }

        match (self.step, action) {
            (Welcome, Start) => Ok(self.move_to(Form(WizardPage::Personal))),
            (Form(WizardPage::Personal), FollowSocial) => {
                self.followed_social = true;
                self.advisory = None;
                Ok(Transition::Stayed)
            }
            (Form(WizardPage::Personal), Next) => {
                self.draft.validate_personal()?;
                match gate_check(Gate::LaunchpadSocialFollow, self.followed_social) {
                    GateVerdict::Pass => Ok(self.move_to(Form(WizardPage::Marriage))),
                    GateVerdict::Reject(rejection) => {
                        self.advisory = Some(Advisory::new(rejection.clone(), self.advisory_ttl));
                        Ok(Transition::Blocked(rejection))
                    }
                }
            }
            (Form(WizardPage::Marriage), Next) => {
                if let GateVerdict::Reject(rejection) =
                    gate_check(Gate::LaunchpadWeddingDate, self.draft.has_wedding_date())
                {
                    return Ok(self.reject(rejection));
                }
                self.draft.validate_marriage()?;
                Ok(self.move_to(Form(WizardPage::Commitment)))
            }
            (Form(WizardPage::Commitment), Next) => {
                if let GateVerdict::Reject(rejection) =
                    gate_check(Gate::LaunchpadFirstTime, !self.draft.attended_before)
                {
                    return Ok(self.reject(rejection));
                }
                let committed =
                    self.draft.agreed_to_feedback && self.draft.agreed_to_participation;
                if let GateVerdict::Reject(rejection) =
                    gate_check(Gate::LaunchpadCommitment, committed)
                {
                    return Ok(self.reject(rejection));
                }
                let application = self.draft.validate()?;
                self.form_data = Some(application.clone());
                Ok(Transition::ReadyToSubmit(application))
            }
            (step, Back) => match step.previous() {
                Some(previous) => Ok(self.move_to(previous)),
                None => Err(self.invalid(action)),
            },
            _ => Err(self.invalid(action)),
        }
    }

    pub fn accept(&mut self, confirmation: Confirmation) -> LaunchpadTransition {
        tracing::info!(flow = "launchpad", "Application accepted");
        self.outcome = Outcome::Accepted(confirmation.summary());
        self.confirmation = Some(confirmation);
        self.step = LaunchpadStep::Success;
        Transition::Advanced(LaunchpadStep::Success)
    }

    pub fn decline(&mut self, message: impl Into<String>) -> LaunchpadTransition {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_DECLINE_MESSAGE.to_string()
        } else {
            message
        };
        tracing::info!(flow = "launchpad", from = %self.step, "Application declined by server");
        self.outcome = Outcome::Rejected(message);
        self.step = LaunchpadStep::Rejected;
        Transition::Advanced(LaunchpadStep::Rejected)
    }

    pub fn reset(&mut self) {
        tracing::info!(flow = "launchpad", from = %self.step, "Session reset");
        *self = Self::new(self.advisory_ttl);
    }

    fn move_to(&mut self, target: LaunchpadStep) -> LaunchpadTransition {
        debug_assert!(self.step.can_transition_to(target));
        tracing::info!(flow = "launchpad", from = %self.step, to = %target, "Funnel transition");
        self.advisory = None;
        self.step = target;
        Transition::Advanced(target)
    }

    fn reject(&mut self, rejection: Rejection) -> LaunchpadTransition {
        tracing::info!(
            flow = "launchpad",
            from = %self.step,
            gate = %rejection.gate,
            "Eligibility gate rejected applicant"
        );
        self.outcome = Outcome::Rejected(rejection.message.clone());
        self.step = LaunchpadStep::Rejected;
        Transition::Rejected(rejection)
    }

    fn invalid(&self, action: LaunchpadAction) -> FunnelError {
        FunnelError::InvalidAction {
            step: self.step.to_string(),
            action: action.to_string(),
        }
    }
}
