//! Soulmate funnel state machine.
//!
//! welcome → gatekeeper → registration → social-lock → {success | rejected}.
//! `admin` is a parallel entry point that transitions never reach or leave.

use serde::{Deserialize, Serialize};

use crate::error::FunnelError;

use super::gate::{Gate, GateVerdict, Rejection, gate_check};
use super::model::{Confirmation, FieldValue, SoulmateApplication, SoulmateDraft};
use super::outcome::{Outcome, Transition};

/// Fallback shown when the server declines without saying why.
pub const DEFAULT_DECLINE_MESSAGE: &str = "An error occurred during registration.";

/// The steps of the Soulmate flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoulmateStep {
    #[default]
    Welcome,
    Gatekeeper,
    Registration,
    SocialLock,
    Success,
    Rejected,
    Admin,
}

impl SoulmateStep {
    pub const ALL: [SoulmateStep; 7] = [
        Self::Welcome,
        Self::Gatekeeper,
        Self::Registration,
        Self::SocialLock,
        Self::Success,
        Self::Rejected,
        Self::Admin,
    ];

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: SoulmateStep) -> bool {
        use SoulmateStep::*;
        matches!(
            (self, target),
            (Welcome, Gatekeeper)
                | (Gatekeeper, Registration)
                | (Registration, SocialLock)
                | (SocialLock, Success)
                | (Gatekeeper, Rejected)
                | (SocialLock, Rejected)
                | (Gatekeeper, Welcome)
                | (Registration, Gatekeeper)
                | (SocialLock, Registration)
        )
    }

    /// Where "back" leads, if anywhere.
    pub fn previous(&self) -> Option<SoulmateStep> {
        use SoulmateStep::*;
        match self {
            Gatekeeper => Some(Welcome),
            Registration => Some(Gatekeeper),
            SocialLock => Some(Registration),
            Welcome | Success | Rejected | Admin => None,
        }
    }

    /// Whether this step ends the session (only reset leaves it).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Rejected)
    }
}

impl std::fmt::Display for SoulmateStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Welcome => "welcome",
            Self::Gatekeeper => "gatekeeper",
            Self::Registration => "registration",
            Self::SocialLock => "social-lock",
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

/// User actions the Soulmate flow understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoulmateAction {
    Start,
    Back,
    AnswerAttendance { attended_before: bool },
    AnswerFeedback { will_give_feedback: bool },
    /// Leave the registration form (validates the draft).
    Continue,
    FollowSocial,
    /// Finish the social lock and submit.
    Complete,
    Reset,
}

impl std::fmt::Display for SoulmateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Back => "back",
            Self::AnswerAttendance { .. } => "answer_attendance",
            Self::AnswerFeedback { .. } => "answer_feedback",
            Self::Continue => "continue",
            Self::FollowSocial => "follow_social",
            Self::Complete => "complete",
            Self::Reset => "reset",
        };
        write!(f, "{s}")
    }
}

pub type SoulmateTransition = Transition<SoulmateStep, SoulmateApplication>;

/// Application state for one Soulmate session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoulmateState {
    pub step: SoulmateStep,
    /// Set once the registration form has been validated.
    pub form_data: Option<SoulmateApplication>,
    pub outcome: Outcome,
    /// Assigned clan, once the server accepts the application.
    pub confirmation: Option<Confirmation>,
    draft: SoulmateDraft,
    first_time_confirmed: bool,
    followed_social: bool,
}

impl SoulmateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for the out-of-band admin entry.
    pub fn admin() -> Self {
        Self {
            step: SoulmateStep::Admin,
            ..Self::default()
        }
    }

    /// Rebuild a session from persisted parts, repairing combinations the
    /// machine can never produce itself.
    pub fn restore(
        step: SoulmateStep,
        draft: Option<SoulmateDraft>,
        form_data: Option<SoulmateApplication>,
        outcome: Outcome,
        confirmation: Option<Confirmation>,
    ) -> Self {
        let draft = draft
            .or_else(|| form_data.as_ref().map(SoulmateDraft::from_application))
            .unwrap_or_default();
        let mut state = Self {
            step,
            form_data,
            outcome,
            confirmation,
            draft,
            first_time_confirmed: false,
            followed_social: false,
        };

        match state.step {
            SoulmateStep::Admin => return Self::new(),
            SoulmateStep::SocialLock if state.form_data.is_none() => {
                tracing::debug!("Restored social-lock without form data; back to registration");
                state.step = SoulmateStep::Registration;
            }
            SoulmateStep::Success => match &state.confirmation {
                Some(confirmation) => {
                    state.outcome = Outcome::Accepted(confirmation.summary());
                }
                None => {
                    tracing::debug!("Restored success without a clan; starting over");
                    return Self::new();
                }
            },
            SoulmateStep::Rejected => {
                if !matches!(state.outcome, Outcome::Rejected(_)) {
                    state.outcome = Outcome::Rejected(DEFAULT_DECLINE_MESSAGE.to_string());
                }
            }
            _ => {}
        }
        if !state.step.is_terminal() {
            state.outcome = Outcome::None;
            state.confirmation = None;
        }
        state
    }

    pub fn draft(&self) -> &SoulmateDraft {
        &self.draft
    }

    /// Whether the feedback question is showing (attendance answered "no").
    pub fn feedback_question_open(&self) -> bool {
        self.first_time_confirmed
    }

    pub fn has_followed_social(&self) -> bool {
        self.followed_social
    }

    /// Merge one field into the registration draft.
    pub fn record_field(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), FunnelError> {
        if self.step != SoulmateStep::Registration {
            return Err(FunnelError::InvalidAction {
                step: self.step.to_string(),
                action: format!("record_field({name})"),
            });
        }
        self.draft.record_field(name, value)?;
        Ok(())
    }

    /// Apply one user action.
    pub fn apply(&mut self, action: SoulmateAction) -> Result<SoulmateTransition, FunnelError> {
        use SoulmateAction::*;
        use SoulmateStep::*;

        if self.step == Admin {
            return Err(self.invalid(action));
        }
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
            (Welcome, Start) => Ok(self.move_to(Gatekeeper)),
            (Gatekeeper, AnswerAttendance { attended_before }) => {
                match gate_check(Gate::SoulmateFirstTime, !attended_before) {
                    GateVerdict::Pass => {
                        self.first_time_confirmed = true;
                        Ok(Transition::Stayed)
                    }
                    GateVerdict::Reject(rejection) => Ok(self.reject(rejection)),
                }
            }
            (Gatekeeper, AnswerFeedback { will_give_feedback }) => {
                if !self.first_time_confirmed {
                    return Err(self.invalid(action));
                }
                match gate_check(Gate::SoulmateFeedback, will_give_feedback) {
                    GateVerdict::Pass => Ok(self.move_to(Registration)),
                    GateVerdict::Reject(rejection) => Ok(self.reject(rejection)),
                }
            }
            (Registration, Continue) => {
                let application = self.draft.validate()?;
                self.form_data = Some(application);
                Ok(self.move_to(SocialLock))
            }
            (SocialLock, FollowSocial) => {
                self.followed_social = true;
                Ok(Transition::Stayed)
            }
            (SocialLock, Complete) => {
                let Some(application) = self.form_data.clone() else {
                    return Err(self.invalid(action));
                };
                match gate_check(Gate::SoulmateSocialFollow, self.followed_social) {
                    GateVerdict::Pass => Ok(Transition::ReadyToSubmit(application)),
                    GateVerdict::Reject(rejection) => Ok(Transition::Blocked(rejection)),
                }
            }
            (step, Back) => match step.previous() {
                Some(previous) => Ok(self.move_to(previous)),
                None => Err(self.invalid(action)),
            },
            _ => Err(self.invalid(action)),
        }
    }

    /// Record an accepted submission.
    pub fn accept(&mut self, confirmation: Confirmation) -> SoulmateTransition {
        tracing::info!(
            flow = "soulmate",
            clan = %confirmation.summary(),
            "Application accepted"
        );
        self.outcome = Outcome::Accepted(confirmation.summary());
        self.confirmation = Some(confirmation);
        self.step = SoulmateStep::Success;
        Transition::Advanced(SoulmateStep::Success)
    }

    /// Record a submission the server declined.
    pub fn decline(&mut self, message: impl Into<String>) -> SoulmateTransition {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_DECLINE_MESSAGE.to_string()
        } else {
            message
        };
        tracing::info!(flow = "soulmate", from = %self.step, "Application declined by server");
        self.outcome = Outcome::Rejected(message);
        self.step = SoulmateStep::Rejected;
        Transition::Advanced(SoulmateStep::Rejected)
    }

    /// Wipe the session back to `welcome`.
    pub fn reset(&mut self) {
        tracing::info!(flow = "soulmate", from = %self.step, "Session reset");
        *self = Self::new();
    }

    fn move_to(&mut self, target: SoulmateStep) -> SoulmateTransition {
        debug_assert!(self.step.can_transition_to(target));
        tracing::info!(flow = "soulmate", from = %self.step, to = %target, "Funnel transition");

        match target {
            SoulmateStep::Gatekeeper => self.first_time_confirmed = false,
            SoulmateStep::SocialLock => self.followed_social = false,
            SoulmateStep::Registration if self.draft == SoulmateDraft::default() => {
                if let Some(form_data) = &self.form_data {
                    self.draft = SoulmateDraft::from_application(form_data);
                }
            }
            _ => {}
        }
        self.step = target;
        Transition::Advanced(target)
    }

    fn reject(&mut self, rejection: Rejection) -> SoulmateTransition {
        tracing::info!(
            flow = "soulmate",
            from = %self.step,
            gate = %rejection.gate,
            "Eligibility gate rejected applicant"
        );
        self.outcome = Outcome::Rejected(rejection.message.clone());
        self.step = SoulmateStep::Rejected;
        Transition::Rejected(rejection)
    }

    fn invalid(&self, action: SoulmateAction) -> FunnelError {
        FunnelError::InvalidAction {
            step: self.step.to_string(),
            action: action.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::funnel::model::tests::filled_soulmate_draft;

    fn at_registration() -> SoulmateState {
        let mut state = SoulmateState::new();
        state.apply(SoulmateAction::Start).unwrap();
        state
            .apply(SoulmateAction::AnswerAttendance { attended_before: false })
            .unwrap();
        state
            .apply(SoulmateAction::AnswerFeedback { will_give_feedback: true })
            .unwrap();
        assert_eq!(state.step, SoulmateStep::Registration);
        state
    }

    fn at_social_lock() -> SoulmateState {
        let mut state = at_registration();
        state.draft = filled_soulmate_draft();
        state.apply(SoulmateAction::Continue).unwrap();
        assert_eq!(state.step, SoulmateStep::SocialLock);
        state
    }

    #[test]
    fn valid_transitions() {
        use SoulmateStep::*;
        let transitions = [
            (Welcome, Gatekeeper),
            (Gatekeeper, Registration),
            (Registration, SocialLock),
            (SocialLock, Success),
            (Gatekeeper, Rejected),
            (SocialLock, Rejected),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use SoulmateStep::*;
        // Skip steps
        assert!(!Welcome.can_transition_to(Registration));
        assert!(!Gatekeeper.can_transition_to(SocialLock));
        // Out of terminal states
        assert!(!Success.can_transition_to(Welcome));
        assert!(!Rejected.can_transition_to(SocialLock));
        // Admin is unreachable and has no exits
        for step in SoulmateStep::ALL {
            assert!(!step.can_transition_to(Admin));
            assert!(!Admin.can_transition_to(step));
        }
    }

    #[test]
    fn display_matches_serde() {
        for step in SoulmateStep::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{step}\""), json, "Display and serde should match for {step:?}");
        }
    }

    #[test]
    fn prior_attendance_is_rejected_with_truthfulness_message() {
        let mut state = SoulmateState::new();
        state.apply(SoulmateAction::Start).unwrap();
        let transition = state
            .apply(SoulmateAction::AnswerAttendance { attended_before: true })
            .unwrap();

        assert!(matches!(transition, Transition::Rejected(ref r) if r.gate == Gate::SoulmateFirstTime));
        assert_eq!(state.step, SoulmateStep::Rejected);
        assert_eq!(
            state.outcome,
            Outcome::Rejected(Gate::SoulmateFirstTime.message().to_string())
        );
        // Nothing moves the session forward any more.
        assert!(matches!(
            state.apply(SoulmateAction::AnswerFeedback { will_give_feedback: true }),
            Err(FunnelError::Terminal { .. })
        ));
    }

    #[test]
    fn refusing_feedback_is_rejected() {
        let mut state = SoulmateState::new();
        state.apply(SoulmateAction::Start).unwrap();
        state
            .apply(SoulmateAction::AnswerAttendance { attended_before: false })
            .unwrap();
        state
            .apply(SoulmateAction::AnswerFeedback { will_give_feedback: false })
            .unwrap();
        assert_eq!(state.step, SoulmateStep::Rejected);
        assert_eq!(state.outcome.detail(), Some(Gate::SoulmateFeedback.message()));
    }

    #[test]
    fn feedback_requires_attendance_answer_first() {
        let mut state = SoulmateState::new();
        state.apply(SoulmateAction::Start).unwrap();
        assert!(!state.feedback_question_open());
        let err = state
            .apply(SoulmateAction::AnswerFeedback { will_give_feedback: true })
            .unwrap_err();
        assert!(matches!(err, FunnelError::InvalidAction { .. }));
        assert_eq!(state.step, SoulmateStep::Gatekeeper);
    }

    #[test]
    fn missing_fields_do_not_transition() {
        let mut state = at_registration();
        state.record_field("full_name", "Ada Obi").unwrap();
        let err = state.apply(SoulmateAction::Continue).unwrap_err();
        assert!(matches!(
            err,
            FunnelError::Validation(ValidationError::MissingFields { .. })
        ));
        assert_eq!(state.step, SoulmateStep::Registration);
        assert!(state.form_data.is_none());
    }

    #[test]
    fn record_field_only_on_registration() {
        let mut state = SoulmateState::new();
        assert!(matches!(
            state.record_field("full_name", "Ada"),
            Err(FunnelError::InvalidAction { .. })
        ));
    }

    #[test]
    fn social_lock_blocks_until_followed() {
        let mut state = at_social_lock();
        let blocked = state.apply(SoulmateAction::Complete).unwrap();
        assert!(matches!(blocked, Transition::Blocked(ref r) if r.message == "Please follow to continue"));
        assert_eq!(state.step, SoulmateStep::SocialLock);
        assert!(state.outcome.is_none());

        state.apply(SoulmateAction::FollowSocial).unwrap();
        let ready = state.apply(SoulmateAction::Complete).unwrap();
        assert_eq!(
            ready,
            Transition::ReadyToSubmit(filled_soulmate_draft().validate().unwrap())
        );
    }

    #[test]
    fn back_walks_exactly_one_step() {
        let mut state = at_social_lock();
        let expected = [
            SoulmateStep::Registration,
            SoulmateStep::Gatekeeper,
            SoulmateStep::Welcome,
        ];
        for step in expected {
            assert_eq!(
                state.apply(SoulmateAction::Back).unwrap(),
                Transition::Advanced(step)
            );
            assert_eq!(state.step, step);
        }
        assert!(state.apply(SoulmateAction::Back).is_err());
    }

    #[test]
    fn back_to_gatekeeper_clears_answers() {
        let mut state = at_registration();
        state.apply(SoulmateAction::Back).unwrap();
        assert!(!state.feedback_question_open());
    }

    #[test]
    fn back_from_social_lock_keeps_answers() {
        let mut state = at_social_lock();
        state.apply(SoulmateAction::Back).unwrap();
        assert_eq!(state.draft(), &filled_soulmate_draft());
        assert!(state.form_data.is_some());
    }

    #[test]
    fn terminal_states_only_reset() {
        let mut state = at_social_lock();
        state.decline("");
        assert_eq!(state.outcome.detail(), Some(DEFAULT_DECLINE_MESSAGE));
        assert!(matches!(
            state.apply(SoulmateAction::Back),
            Err(FunnelError::Terminal { .. })
        ));
        assert_eq!(state.apply(SoulmateAction::Reset).unwrap(), Transition::Reset);
        assert_eq!(state, SoulmateState::new());
    }

    #[test]
    fn accept_mirrors_confirmation() {
        let mut state = at_social_lock();
        state.accept(Confirmation::Clan {
            clan_name: "Clan Alpha".into(),
            whatsapp_link: "https://wa.me/x".into(),
        });
        assert_eq!(state.step, SoulmateStep::Success);
        assert_eq!(state.outcome, Outcome::Accepted("Clan Alpha".into()));
    }

    #[test]
    fn admin_accepts_nothing() {
        let mut state = SoulmateState::admin();
        for action in [SoulmateAction::Start, SoulmateAction::Back, SoulmateAction::Reset] {
            assert!(matches!(state.apply(action), Err(FunnelError::InvalidAction { .. })));
            assert_eq!(state.step, SoulmateStep::Admin);
        }
    }

    #[test]
    fn every_action_keeps_step_in_the_state_set() {
        let actions = [
            SoulmateAction::Start,
            SoulmateAction::Back,
            SoulmateAction::AnswerAttendance { attended_before: false },
            SoulmateAction::AnswerFeedback { will_give_feedback: true },
            SoulmateAction::Continue,
            SoulmateAction::FollowSocial,
            SoulmateAction::Complete,
        ];
        // Exhaustive walks of length 4 over the action alphabet.
        let mut frontier = vec![SoulmateState::new()];
        for _ in 0..4 {
            let mut next = Vec::new();
            for state in &frontier {
                for action in actions {
                    let mut candidate = state.clone();
                    candidate.draft = filled_soulmate_draft();
                    let before = candidate.step;
                    let result = candidate.apply(action);
                    assert!(SoulmateStep::ALL.contains(&candidate.step));
                    assert_ne!(candidate.step, SoulmateStep::Admin);
                    match result {
                        Ok(Transition::Advanced(to)) => {
                            assert!(before.can_transition_to(to), "{before} -> {to}");
                            next.push(candidate);
                        }
                        Ok(_) => next.push(candidate),
                        Err(_) => assert_eq!(candidate.step, before),
                    }
                }
            }
            frontier = next;
        }
    }

    #[test]
    fn restore_repairs_impossible_snapshots() {
        let state = SoulmateState::restore(SoulmateStep::SocialLock, None, None, Outcome::None, None);
        assert_eq!(state.step, SoulmateStep::Registration);

        let state = SoulmateState::restore(SoulmateStep::Success, None, None, Outcome::None, None);
        assert_eq!(state, SoulmateState::new());

        let state = SoulmateState::restore(SoulmateStep::Rejected, None, None, Outcome::None, None);
        assert_eq!(state.outcome.detail(), Some(DEFAULT_DECLINE_MESSAGE));

        let state = SoulmateState::restore(SoulmateStep::Admin, None, None, Outcome::None, None);
        assert_eq!(state.step, SoulmateStep::Welcome);
    }

    #[test]
    fn restore_keeps_exact_step_and_form_data() {
        let original = at_social_lock();
        let restored = SoulmateState::restore(
            original.step,
            Some(original.draft().clone()),
            original.form_data.clone(),
            original.outcome.clone(),
            original.confirmation.clone(),
        );
        assert_eq!(restored.step, original.step);
        assert_eq!(restored.form_data, original.form_data);
    }
}
