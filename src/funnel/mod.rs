//! Registration funnels: the Soulmate and Couples' Launchpad state machines
//! and the sessions that persist and submit them.

pub mod gate;
pub mod launchpad;
pub mod manager;
pub mod model;
pub mod outcome;
pub mod soulmate;

pub use gate::{Gate, GateVerdict, Rejection, gate_check};
pub use launchpad::{LaunchpadAction, LaunchpadState, LaunchpadStep, WizardPage};
pub use manager::{EntryMode, FlowState, Funnel, LaunchpadFunnel, SoulmateFunnel};
pub use model::{
    Confirmation, FieldValue, LaunchpadApplication, LaunchpadDraft, SoulmateApplication,
    SoulmateDraft,
};
pub use outcome::{Outcome, Transition};
pub use soulmate::{SoulmateAction, SoulmateState, SoulmateStep};
