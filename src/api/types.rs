//! Wire types for the registration and admin endpoints.

use serde::{Deserialize, Serialize};

use crate::error::SubmissionError;
use crate::funnel::model::Confirmation;
use crate::funnel::{launchpad, soulmate};

/// Body of a Soulmate registration response, successful or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub clan_name: Option<String>,
    #[serde(default)]
    pub whatsapp_link: Option<String>,
}

impl RegisterResponse {
    /// Accepted responses must name a clan; declined ones carry an optional reason.
    pub fn into_confirmation(self) -> Result<Confirmation, SubmissionError> {
        if !self.success {
            let message = self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| soulmate::DEFAULT_DECLINE_MESSAGE.to_string());
            return Err(SubmissionError::Declined { message });
        }
        match (self.clan_name, self.whatsapp_link) {
            (Some(clan_name), Some(whatsapp_link)) if !clan_name.is_empty() => {
                Ok(Confirmation::Clan {
                    clan_name,
                    whatsapp_link,
                })
            }
            _ => Err(SubmissionError::InvalidResponse(
                "success response without clan_name/whatsapp_link".to_string(),
            )),
        }
    }
}

/// Body of a successful Launchpad registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchpadLinks {
    pub whatsapp_link: String,
    pub telegram_link: String,
}

impl From<LaunchpadLinks> for Confirmation {
    fn from(links: LaunchpadLinks) -> Self {
        Confirmation::Couples {
            whatsapp_link: links.whatsapp_link,
            telegram_link: links.telegram_link,
        }
    }
}

/// Pull a human-readable message out of a Launchpad error body.
///
/// Accepts a JSON string, a JSON object with `message` or `error`, or plain
/// text. Blank bodies fall back to the generic decline message.
pub fn error_body_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = match &parsed {
        Some(serde_json::Value::String(s)) => Some(s.as_str()),
        Some(serde_json::Value::Object(map)) => map
            .get("message")
            .and_then(|v| v.as_str())
            .or_else(|| map.get("error").and_then(|v| v.as_str())),
        _ => None,
    };
    let message = from_json.unwrap_or(body).trim();
    if message.is_empty() {
        launchpad::DEFAULT_DECLINE_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

/// One clan's occupancy, as listed on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanStat {
    pub id: i64,
    pub name: String,
    pub current_count: u32,
    pub max_capacity: u32,
}

impl ClanStat {
    /// Percentage filled, rounded down, capped at 100. Zero when capacity is zero.
    pub fn fill_percentage(&self) -> u32 {
        if self.max_capacity == 0 {
            return 0;
        }
        let pct = u64::from(self.current_count) * 100 / u64::from(self.max_capacity);
        pct.min(100) as u32
    }

    pub fn is_full(&self) -> bool {
        self.current_count >= self.max_capacity
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_full() { "FULL" } else { "OPEN" }
    }
}

/// A registered Soulmate participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub whatsapp_number: String,
    pub gender: String,
    pub country: String,
    pub state: String,
    pub age_group: String,
    pub religion: String,
    #[serde(default)]
    pub church_name: String,
    pub instagram_handle: String,
    pub relationship_status: String,
    pub clan_id: i64,
}

/// Aggregate totals across all clans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminOverview {
    pub registered: u64,
    pub capacity: u64,
    pub open_clans: usize,
}

impl AdminOverview {
    pub fn from_stats(stats: &[ClanStat]) -> Self {
        stats.iter().fold(Self::default(), |mut acc, clan| {
            acc.registered += u64::from(clan.current_count);
            acc.capacity += u64::from(clan.max_capacity);
            if !clan.is_full() {
                acc.open_clans += 1;
            }
            acc
        })
    }
}
