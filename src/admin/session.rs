//! Logged-in admin state and its persistence.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::api::{AdminApi, AdminOverview, ClanStat, Participant};
use crate::error::AdminError;
use crate::store::{SessionStore, session_keys};

/// One admin viewer session.
///
/// The secret is kept in the session store so a restart stays logged in.
/// Any 401 from the service forgets it.
pub struct AdminSession {
    api: Arc<dyn AdminApi>,
    store: Arc<dyn SessionStore>,
    secret: Option<SecretString>,
    stats: Vec<ClanStat>,
}

impl AdminSession {
    pub fn new(api: Arc<dyn AdminApi>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            api,
            store,
            secret: None,
            stats: Vec::new(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.secret.is_some()
    }

    /// Clan stats from the last successful fetch.
    pub fn stats(&self) -> &[ClanStat] {
        &self.stats
    }

    pub fn overview(&self) -> AdminOverview {
        AdminOverview::from_stats(&self.stats)
    }

    /// Resume with the persisted secret, if any. Returns whether the session
    /// ended up logged in.
    pub async fn restore(&mut self) -> Result<bool, AdminError> {
        let stored = match self.store.load(session_keys::ADMIN_SECRET).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load admin secret");
                None
            }
        };
        let Some(Value::String(secret)) = stored else {
            return Ok(false);
        };

        self.secret = Some(SecretString::from(secret));
        self.refresh().await?;
        Ok(true)
    }

    /// Check `secret` against the service and keep it on success.
    pub async fn login(&mut self, secret: SecretString) -> Result<&[ClanStat], AdminError> {
        match self.api.clan_stats(&secret).await {
            Ok(stats) => {
                let value = Value::String(secret.expose_secret().to_string());
                if let Err(e) = self.store.save(session_keys::ADMIN_SECRET, &value).await {
                    tracing::warn!(error = %e, "Failed to persist admin secret");
                }
                tracing::info!(clans = stats.len(), "Admin logged in");
                self.secret = Some(secret);
                self.stats = stats;
                Ok(&self.stats)
            }
            Err(AdminError::Unauthorized) => {
                self.logout().await;
                Err(AdminError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-fetch clan stats with the current secret.
    pub async fn refresh(&mut self) -> Result<&[ClanStat], AdminError> {
        let secret = self.secret.as_ref().ok_or(AdminError::NotLoggedIn)?;
        let result = self.api.clan_stats(secret).await;
        match result {
            Ok(stats) => {
                self.stats = stats;
                Ok(&self.stats)
            }
            Err(e) => Err(self.handle_error(e).await),
        }
    }

    /// Participants of one clan.
    pub async fn participants(&mut self, clan_id: i64) -> Result<Vec<Participant>, AdminError> {
        let secret = self.secret.as_ref().ok_or(AdminError::NotLoggedIn)?;
        let result = self.api.participants(secret, clan_id).await;
        match result {
            Ok(participants) => Ok(participants),
            Err(e) => Err(self.handle_error(e).await),
        }
    }

    /// Forget the secret here and in the store.
    pub async fn logout(&mut self) {
        self.secret = None;
        self.stats.clear();
        if let Err(e) = self.store.clear(session_keys::ADMIN_SECRET).await {
            tracing::warn!(error = %e, "Failed to clear admin secret");
        }
    }

    async fn handle_error(&mut self, e: AdminError) -> AdminError {
        if e == AdminError::Unauthorized {
            tracing::info!("Admin secret no longer valid; logging out");
            self.logout().await;
        }
        e
    }
}
