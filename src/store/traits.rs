//! `SessionStore` trait: a small async key-value interface.

use async_trait::async_trait;

use crate::error::StoreError;

/// Keys each session writes. One value per key, JSON-encoded.
pub mod session_keys {
    pub const SOULMATE_STEP: &str = "soulmate_step";
    pub const SOULMATE_DRAFT: &str = "soulmate_draft";
    pub const SOULMATE_FORM_DATA: &str = "soulmate_form_data";
    pub const SOULMATE_ASSIGNED_CLAN: &str = "soulmate_assigned_clan";
    pub const SOULMATE_OUTCOME: &str = "soulmate_outcome";

    pub const LAUNCHPAD_STEP: &str = "launchpad_step";
    pub const LAUNCHPAD_PAGE: &str = "launchpad_page";
    pub const LAUNCHPAD_DRAFT: &str = "launchpad_draft";
    pub const LAUNCHPAD_FORM_DATA: &str = "launchpad_form_data";
    pub const LAUNCHPAD_LINKS: &str = "launchpad_links";
    pub const LAUNCHPAD_OUTCOME: &str = "launchpad_outcome";

    pub const ADMIN_SECRET: &str = "admin_secret";

    pub const SOULMATE: [&str; 5] = [
        SOULMATE_STEP,
        SOULMATE_DRAFT,
        SOULMATE_FORM_DATA,
        SOULMATE_ASSIGNED_CLAN,
        SOULMATE_OUTCOME,
    ];

    pub const LAUNCHPAD: [&str; 6] = [
        LAUNCHPAD_STEP,
        LAUNCHPAD_PAGE,
        LAUNCHPAD_DRAFT,
        LAUNCHPAD_FORM_DATA,
        LAUNCHPAD_LINKS,
        LAUNCHPAD_OUTCOME,
    ];
}

/// Backend-agnostic persisted key-value store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read a value. `None` when the key was never written or was cleared.
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Write (or overwrite) a value.
    async fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;

    /// Remove a value. Returns whether anything was removed.
    async fn clear(&self, key: &str) -> Result<bool, StoreError>;
}
