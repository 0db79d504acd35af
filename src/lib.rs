//! Cohort Funnel: registration state machines for the Soulmate and Couples'
//! Launchpad programmes, with a persisted session store and an admin viewer.

pub mod admin;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod funnel;
pub mod store;

pub use error::{Error, Result};
