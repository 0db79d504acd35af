//! `reqwest` implementation of the registration and admin APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::config::FunnelConfig;
use crate::error::{AdminError, SubmissionError};
use crate::funnel::model::{Confirmation, LaunchpadApplication, SoulmateApplication};

use super::types::{ClanStat, LaunchpadLinks, Participant, RegisterResponse, error_body_message};
use super::{AdminApi, RegistrationApi};

/// Header carrying the shared admin secret.
pub const ADMIN_SECRET_HEADER: &str = "X-Admin-Secret";

/// HTTP client for one registration service deployment.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    /// `base_url` must already be normalized (no trailing slash).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &FunnelConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn send_error(&self, e: reqwest::Error) -> SubmissionError {
        if e.is_timeout() {
            SubmissionError::Timeout(self.timeout)
        } else {
            SubmissionError::Network(e.to_string())
        }
    }

    async fn admin_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        secret: &SecretString,
    ) -> Result<Vec<T>, AdminError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .header(ADMIN_SECRET_HEADER, secret.expose_secret())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AdminError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "Admin secret rejected");
            return Err(AdminError::Unauthorized);
        }
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Admin request failed");
            return Err(AdminError::Server {
                status: status.as_u16(),
            });
        }

        // The service may answer `null` for an empty list.
        let rows: Option<Vec<T>> = resp
            .json()
            .await
            .map_err(|e| AdminError::InvalidResponse(e.to_string()))?;
        Ok(rows.unwrap_or_default())
    }
}

#[async_trait]
impl RegistrationApi for HttpClient {
    async fn register_soulmate(
        &self,
        application: &SoulmateApplication,
    ) -> Result<Confirmation, SubmissionError> {
        let resp = self
            .client
            .post(self.url("/api/register"))
            .json(application)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.send_error(e))?;

        let parsed = serde_json::from_str::<RegisterResponse>(&body);
        if status.is_success() {
            return parsed
                .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?
                .into_confirmation();
        }

        // Declines arrive as `{success: false}` whatever the status code.
        match parsed {
            Ok(declined) if !declined.success => declined.into_confirmation(),
            _ => Err(SubmissionError::Server {
                status: status.as_u16(),
                message: body.trim().to_string(),
            }),
        }
    }

    async fn register_launchpad(
        &self,
        application: &LaunchpadApplication,
    ) -> Result<Confirmation, SubmissionError> {
        let resp = self
            .client
            .post(self.url("/api/launchpad/register"))
            .json(application)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.send_error(e))?;

        if status.is_success() {
            let links: LaunchpadLinks = serde_json::from_str(&body)
                .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;
            return Ok(links.into());
        }

        let message = error_body_message(&body);
        if status.is_client_error() {
            Err(SubmissionError::Declined { message })
        } else {
            Err(SubmissionError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl AdminApi for HttpClient {
    async fn clan_stats(&self, secret: &SecretString) -> Result<Vec<ClanStat>, AdminError> {
        self.admin_get("/api/admin/stats", &[], secret).await
    }

    async fn participants(
        &self,
        secret: &SecretString,
        clan_id: i64,
    ) -> Result<Vec<Participant>, AdminError> {
        self.admin_get(
            "/api/admin/participants",
            &[("clan_id", clan_id.to_string())],
            secret,
        )
        .await
    }
}
