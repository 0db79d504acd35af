//! Clients for the remote registration service.
//!
//! The funnels and the admin viewer depend only on the traits here, so tests
//! can substitute scripted implementations.

pub mod http;
pub mod types;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::{AdminError, SubmissionError};
use crate::funnel::model::{Confirmation, LaunchpadApplication, SoulmateApplication};

pub use http::HttpClient;
pub use types::{AdminOverview, ClanStat, LaunchpadLinks, Participant, RegisterResponse};

/// The registration submission endpoints.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    /// `POST /api/register`. Accepted applicants receive a clan.
    async fn register_soulmate(
        &self,
        application: &SoulmateApplication,
    ) -> Result<Confirmation, SubmissionError>;

    /// `POST /api/launchpad/register`. Accepted couples receive both group links.
    async fn register_launchpad(
        &self,
        application: &LaunchpadApplication,
    ) -> Result<Confirmation, SubmissionError>;
}

/// The secret-protected admin endpoints.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn clan_stats(&self, secret: &SecretString) -> Result<Vec<ClanStat>, AdminError>;

    async fn participants(
        &self,
        secret: &SecretString,
        clan_id: i64,
    ) -> Result<Vec<Participant>, AdminError>;
}
