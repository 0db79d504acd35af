//! Funnel sessions: state ownership, persistence, and submission.
//!
//! A `Funnel` owns one flow's state behind an `RwLock`, writes a snapshot to
//! the `SessionStore` after every change, and drives the submission call when
//! the machine reports it is ready to submit.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::api::RegistrationApi;
use crate::error::{FunnelError, StoreError, SubmissionError};
use crate::store::{SessionStore, session_keys};

use super::launchpad::{LaunchpadAction, LaunchpadState, LaunchpadStep, WizardPage};
use super::model::{Confirmation, FieldValue, LaunchpadApplication, SoulmateApplication};
use super::outcome::{Outcome, Transition};
use super::soulmate::{SoulmateAction, SoulmateState, SoulmateStep};

/// How a Soulmate session was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryMode {
    #[default]
    Applicant,
    /// Out-of-band admin entry (`?mode=admin`).
    Admin,
}

impl EntryMode {
    /// Interpret the `mode` entry parameter. Anything but `admin` is an applicant.
    pub fn from_param(mode: Option<&str>) -> Self {
        match mode.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("admin") => Self::Admin,
            _ => Self::Applicant,
        }
    }
}

/// Keys to write (`Some`) or clear (`None`) for one snapshot.
pub type Snapshot = Vec<(&'static str, Option<Value>)>;

/// The per-flow half of a `Funnel`.
#[async_trait]
pub trait FlowState: Clone + Send + Sync + 'static {
    type Step: Copy + Display + Send + Sync;
    type Action: Copy + Display + Send + Sync;
    type Application: Clone + Send + Sync;

    const FLOW: &'static str;
    /// Every key this flow ever writes.
    const KEYS: &'static [&'static str];

    fn step(&self) -> Self::Step;

    fn apply(
        &mut self,
        action: Self::Action,
    ) -> Result<Transition<Self::Step, Self::Application>, FunnelError>;

    fn record_field(&mut self, name: &str, value: FieldValue) -> Result<(), FunnelError>;

    fn accept(&mut self, confirmation: Confirmation) -> Transition<Self::Step, Self::Application>;

    fn decline(&mut self, message: String) -> Transition<Self::Step, Self::Application>;

    /// What to persist for the current state.
    fn snapshot(&self) -> Result<Snapshot, serde_json::Error>;

    async fn submit(
        api: &dyn RegistrationApi,
        application: &Self::Application,
    ) -> Result<Confirmation, SubmissionError>;
}

#[async_trait]
impl FlowState for SoulmateState {
    type Step = SoulmateStep;
    type Action = SoulmateAction;
    type Application = SoulmateApplication;

    const FLOW: &'static str = "soulmate";
    const KEYS: &'static [&'static str] = &session_keys::SOULMATE;

    fn step(&self) -> SoulmateStep {
        self.step
    }

    fn apply(
        &mut self,
        action: SoulmateAction,
    ) -> Result<Transition<SoulmateStep, SoulmateApplication>, FunnelError> {
        SoulmateState::apply(self, action)
    }

    fn record_field(&mut self, name: &str, value: FieldValue) -> Result<(), FunnelError> {
        SoulmateState::record_field(self, name, value)
    }

    fn accept(&mut self, confirmation: Confirmation) -> Transition<SoulmateStep, SoulmateApplication> {
        SoulmateState::accept(self, confirmation)
    }

    fn decline(&mut self, message: String) -> Transition<SoulmateStep, SoulmateApplication> {
        SoulmateState::decline(self, message)
    }

    fn snapshot(&self) -> Result<Snapshot, serde_json::Error> {
        // The admin view is never written, so a restart lands back in the funnel.
        if self.step == SoulmateStep::Admin {
            return Ok(Vec::new());
        }
        Ok(vec![
            (session_keys::SOULMATE_STEP, Some(serde_json::to_value(self.step)?)),
            (session_keys::SOULMATE_DRAFT, Some(serde_json::to_value(self.draft())?)),
            (
                session_keys::SOULMATE_FORM_DATA,
                self.form_data.as_ref().map(serde_json::to_value).transpose()?,
            ),
            (
                session_keys::SOULMATE_ASSIGNED_CLAN,
                self.confirmation.as_ref().map(serde_json::to_value).transpose()?,
            ),
            (session_keys::SOULMATE_OUTCOME, Some(serde_json::to_value(&self.outcome)?)),
        ])
    }

    async fn submit(
        api: &dyn RegistrationApi,
        application: &SoulmateApplication,
    ) -> Result<Confirmation, SubmissionError> {
        api.register_soulmate(application).await
    }
}

#[async_trait]
impl FlowState for LaunchpadState {
    type Step = LaunchpadStep;
    type Action = LaunchpadAction;
    type Application = LaunchpadApplication;

    const FLOW: &'static str = "launchpad";
    const KEYS: &'static [&'static str] = &session_keys::LAUNCHPAD;

    fn step(&self) -> LaunchpadStep {
        self.step
    }

    fn apply(
        &mut self,
        action: LaunchpadAction,
    ) -> Result<Transition<LaunchpadStep, LaunchpadApplication>, FunnelError> {
        LaunchpadState::apply(self, action)
    }

    fn record_field(&mut self, name: &str, value: FieldValue) -> Result<(), FunnelError> {
        LaunchpadState::record_field(self, name, value)
    }

    fn accept(
        &mut self,
        confirmation: Confirmation,
    ) -> Transition<LaunchpadStep, LaunchpadApplication> {
        LaunchpadState::accept(self, confirmation)
    }

    fn decline(&mut self, message: String) -> Transition<LaunchpadStep, LaunchpadApplication> {
        LaunchpadState::decline(self, message)
    }

    fn snapshot(&self) -> Result<Snapshot, serde_json::Error> {
        Ok(vec![
            (session_keys::LAUNCHPAD_STEP, Some(Value::from(self.step.kind()))),
            (
                session_keys::LAUNCHPAD_PAGE,
                self.step.page().map(serde_json::to_value).transpose()?,
            ),
            (session_keys::LAUNCHPAD_DRAFT, Some(serde_json::to_value(self.draft())?)),
            (
                session_keys::LAUNCHPAD_FORM_DATA,
                self.form_data.as_ref().map(serde_json::to_value).transpose()?,
            ),
            (
                session_keys::LAUNCHPAD_LINKS,
                self.confirmation.as_ref().map(serde_json::to_value).transpose()?,
            ),
            (session_keys::LAUNCHPAD_OUTCOME, Some(serde_json::to_value(&self.outcome)?)),
        ])
    }

    async fn submit(
        api: &dyn RegistrationApi,
        application: &LaunchpadApplication,
    ) -> Result<Confirmation, SubmissionError> {
        api.register_launchpad(application).await
    }
}

/// Clears the pending flag however the submission ends.
struct PendingFlag<'a>(&'a AtomicBool);

impl Drop for PendingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One running funnel session.
pub struct Funnel<S: FlowState> {
    state: Arc<RwLock<S>>,
    store: Arc<dyn SessionStore>,
    api: Arc<dyn RegistrationApi>,
    submitting: AtomicBool,
}

pub type SoulmateFunnel = Funnel<SoulmateState>;
pub type LaunchpadFunnel = Funnel<LaunchpadState>;

impl<S: FlowState> Funnel<S> {
    fn with_state(state: S, store: Arc<dyn SessionStore>, api: Arc<dyn RegistrationApi>) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            store,
            api,
            submitting: AtomicBool::new(false),
        }
    }

    /// A copy of the current state.
    pub async fn state(&self) -> S {
        self.state.read().await.clone()
    }

    pub async fn step(&self) -> S::Step {
        self.state.read().await.step()
    }

    /// Whether a submission is in flight.
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Apply one action, submitting when the machine says the data is complete.
    ///
    /// While a submission is pending every action is refused. A retryable
    /// submission failure is returned as an error and leaves the session
    /// exactly as it was, so the same action can be issued again.
    pub async fn act(
        &self,
        action: S::Action,
    ) -> Result<Transition<S::Step, S::Application>, FunnelError> {
        if self.is_submitting() {
            return Err(FunnelError::SubmissionInFlight);
        }

        let transition = self.state.write().await.apply(action)?;
        match transition {
            Transition::ReadyToSubmit(application) => self.submit(application).await,
            Transition::Reset => {
                self.clear_persisted().await;
                Ok(Transition::Reset)
            }
            other => {
                self.persist().await;
                Ok(other)
            }
        }
    }

    /// Merge one answer into the current draft.
    pub async fn record_field(
        &self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), FunnelError> {
        if self.is_submitting() {
            return Err(FunnelError::SubmissionInFlight);
        }
        self.state.write().await.record_field(name, value.into())?;
        self.persist().await;
        Ok(())
    }

    async fn submit(
        &self,
        application: S::Application,
    ) -> Result<Transition<S::Step, S::Application>, FunnelError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FunnelError::SubmissionInFlight);
        }
        let _pending = PendingFlag(&self.submitting);

        tracing::info!(flow = S::FLOW, "Submitting application");
        let result = S::submit(self.api.as_ref(), &application).await;

        let transition = {
            let mut state = self.state.write().await;
            match result {
                Ok(confirmation) => state.accept(confirmation),
                Err(e) if !e.is_retryable() => state.decline(e.user_message()),
                Err(e) => {
                    tracing::warn!(flow = S::FLOW, error = %e, "Submission failed; session kept for retry");
                    return Err(e.into());
                }
            }
        };
        self.persist().await;
        Ok(transition)
    }

    /// Write the current snapshot. Failures are logged; the in-memory state stands.
    async fn persist(&self) {
        let snapshot = self.state.read().await.snapshot();
        let entries = match snapshot {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(flow = S::FLOW, error = %e, "Failed to serialize session snapshot");
                return;
            }
        };
        for (key, value) in entries {
            let result = match value {
                Some(value) => self.store.save(key, &value).await,
                None => self.store.clear(key).await.map(|_| ()),
            };
            if let Err(e) = result {
                tracing::warn!(flow = S::FLOW, key, error = %e, "Failed to persist session state");
            }
        }
    }

    async fn clear_persisted(&self) {
        for key in S::KEYS {
            if let Err(e) = self.store.clear(key).await {
                tracing::warn!(flow = S::FLOW, key, error = %e, "Failed to clear session state");
            }
        }
    }
}

/// Read and decode every key in `keys`; unreadable values are skipped.
async fn load_entries(store: &dyn SessionStore, flow: &str, keys: &[&'static str]) -> HashMap<&'static str, Value> {
    let mut entries = HashMap::new();
    for &key in keys {
        match store.load(key).await {
            Ok(Some(value)) => {
                entries.insert(key, value);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(flow, key, error = %e, "Failed to load session state"),
        }
    }
    entries
}

fn decode<T: DeserializeOwned>(entries: &HashMap<&'static str, Value>, key: &str) -> Option<T> {
    let value = entries.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            let err = StoreError::Serialization(format!("{key}: {e}"));
            tracing::warn!(error = %err, "Ignoring unreadable session value");
            None
        }
    }
}

impl Funnel<SoulmateState> {
    /// Open a Soulmate session, restoring persisted progress.
    ///
    /// The admin entry always opens on the admin step and leaves the
    /// persisted applicant progress untouched.
    pub async fn open(
        store: Arc<dyn SessionStore>,
        api: Arc<dyn RegistrationApi>,
        mode: EntryMode,
    ) -> Self {
        let state = match mode {
            EntryMode::Admin => SoulmateState::admin(),
            EntryMode::Applicant => {
                let entries = load_entries(store.as_ref(), "soulmate", &session_keys::SOULMATE).await;
                let state = SoulmateState::restore(
                    decode(&entries, session_keys::SOULMATE_STEP).unwrap_or_default(),
                    decode(&entries, session_keys::SOULMATE_DRAFT),
                    decode(&entries, session_keys::SOULMATE_FORM_DATA),
                    decode::<Outcome>(&entries, session_keys::SOULMATE_OUTCOME).unwrap_or_default(),
                    decode(&entries, session_keys::SOULMATE_ASSIGNED_CLAN),
                );
                tracing::debug!(step = %state.step, restored = !entries.is_empty(), "Soulmate session opened");
                state
            }
        };
        Self::with_state(state, store, api)
    }
}

impl Funnel<LaunchpadState> {
    /// Open a Launchpad session, restoring persisted progress.
    pub async fn open(
        store: Arc<dyn SessionStore>,
        api: Arc<dyn RegistrationApi>,
        advisory_ttl: Duration,
    ) -> Self {
        let entries = load_entries(store.as_ref(), "launchpad", &session_keys::LAUNCHPAD).await;
        let page: Option<WizardPage> = decode(&entries, session_keys::LAUNCHPAD_PAGE);
        let step = decode::<String>(&entries, session_keys::LAUNCHPAD_STEP)
            .and_then(|kind| LaunchpadStep::from_parts(&kind, page))
            .unwrap_or_default();

        let state = LaunchpadState::restore(
            advisory_ttl,
            step,
            decode(&entries, session_keys::LAUNCHPAD_DRAFT),
            decode(&entries, session_keys::LAUNCHPAD_FORM_DATA),
            decode::<Outcome>(&entries, session_keys::LAUNCHPAD_OUTCOME).unwrap_or_default(),
            decode(&entries, session_keys::LAUNCHPAD_LINKS),
        );
        tracing::debug!(step = %state.step, restored = !entries.is_empty(), "Launchpad session opened");
        Self::with_state(state, store, api)
    }
}
