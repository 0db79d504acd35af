//! Application records, drafts, and field validation.
//!
//! Each flow collects answers into a draft through `record_field`, then
//! validates the draft into a typed application at the data-collection
//! boundary. Only a validated application is ever submitted.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

/// A single user-supplied answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl FieldValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Flag(flag) => flag.to_string(),
        }
    }

    fn into_flag(self, field: &str) -> Result<bool, ValidationError> {
        match self {
            Self::Flag(flag) => Ok(flag),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "on" => Ok(true),
                "false" | "no" | "n" | "0" | "off" | "" => Ok(false),
                other => Err(invalid(field, format!("'{other}' is not yes/no"))),
            },
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_SHAPE.is_match(email) {
        Ok(())
    } else {
        Err(invalid("email", format!("'{email}' is not an email address")))
    }
}

// ── Select values ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            _ => None,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgeGroup {
    #[default]
    #[serde(rename = "18-25")]
    From18To25,
    #[serde(rename = "26-30")]
    From26To30,
    #[serde(rename = "31-35")]
    From31To35,
    #[serde(rename = "36-40")]
    From36To40,
    #[serde(rename = "40+")]
    Over40,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        Self::From18To25,
        Self::From26To30,
        Self::From31To35,
        Self::From36To40,
        Self::Over40,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From18To25 => "18-25",
            Self::From26To30 => "26-30",
            Self::From31To35 => "31-35",
            Self::From36To40 => "36-40",
            Self::Over40 => "40+",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|g| g.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Religion {
    #[default]
    Christian,
    Muslim,
    Traditional,
    Atheist,
}

impl Religion {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "christian" => Some(Self::Christian),
            "muslim" => Some(Self::Muslim),
            "traditional" => Some(Self::Traditional),
            "atheist" => Some(Self::Atheist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipStatus {
    #[default]
    Single,
    SingleParent,
    Divorced,
    Widowed,
}

impl RelationshipStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" => Some(Self::Single),
            "single-parent" | "single parent" => Some(Self::SingleParent),
            "divorced" => Some(Self::Divorced),
            "widowed" => Some(Self::Widowed),
            _ => None,
        }
    }
}

// ── Soulmate ────────────────────────────────────────────────────────

/// Validated Soulmate registration, the body of `POST /api/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoulmateApplication {
    pub full_name: String,
    pub email: String,
    pub whatsapp_number: String,
    pub gender: Gender,
    pub country: String,
    pub state: String,
    pub age_group: AgeGroup,
    pub religion: Religion,
    pub instagram_handle: String,
    #[serde(default)]
    pub church_name: String,
    pub relationship_status: RelationshipStatus,
}

/// In-progress Soulmate registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoulmateDraft {
    full_name: Option<String>,
    email: Option<String>,
    whatsapp_number: Option<String>,
    gender: Gender,
    country: Option<String>,
    state: Option<String>,
    age_group: AgeGroup,
    religion: Religion,
    instagram_handle: Option<String>,
    church_name: Option<String>,
    relationship_status: RelationshipStatus,
}

impl SoulmateDraft {
    pub const FIELDS: [&'static str; 11] = [
        "full_name",
        "email",
        "whatsapp_number",
        "gender",
        "country",
        "state",
        "age_group",
        "religion",
        "instagram_handle",
        "church_name",
        "relationship_status",
    ];

    /// Seed a draft from a previously completed application (editing after "back").
    pub fn from_application(app: &SoulmateApplication) -> Self {
        Self {
            full_name: Some(app.full_name.clone()),
            email: Some(app.email.clone()),
            whatsapp_number: Some(app.whatsapp_number.clone()),
            gender: app.gender,
            country: Some(app.country.clone()),
            state: Some(app.state.clone()),
            age_group: app.age_group,
            religion: app.religion,
            instagram_handle: Some(app.instagram_handle.clone()),
            church_name: Some(app.church_name.clone()),
            relationship_status: app.relationship_status,
        }
    }

    /// Merge one answer into the draft.
    pub fn record_field(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), ValidationError> {
        let value = value.into();
        match name {
            "full_name" => self.full_name = Some(value.into_text()),
            "email" => self.email = Some(value.into_text()),
            "whatsapp_number" => self.whatsapp_number = Some(value.into_text()),
            "country" => self.country = Some(value.into_text()),
            "state" => self.state = Some(value.into_text()),
            "instagram_handle" => self.instagram_handle = Some(value.into_text()),
            "church_name" => self.church_name = Some(value.into_text()),
            "gender" => {
                let raw = value.into_text();
                self.gender = Gender::parse(&raw)
                    .ok_or_else(|| invalid(name, format!("'{raw}' is not male/female")))?;
            }
            "age_group" => {
                let raw = value.into_text();
                self.age_group = AgeGroup::parse(&raw)
                    .ok_or_else(|| invalid(name, format!("'{raw}' is not an age group")))?;
            }
            "religion" => {
                let raw = value.into_text();
                self.religion = Religion::parse(&raw)
                    .ok_or_else(|| invalid(name, format!("'{raw}' is not a listed religion")))?;
            }
            "relationship_status" => {
                let raw = value.into_text();
                self.relationship_status = RelationshipStatus::parse(&raw).ok_or_else(|| {
                    invalid(name, format!("'{raw}' is not a relationship status"))
                })?;
            }
            other => return Err(ValidationError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Required fields that are still blank, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("whatsapp_number", &self.whatsapp_number),
            ("country", &self.country),
            ("state", &self.state),
            ("instagram_handle", &self.instagram_handle),
        ]
        .into_iter()
        .filter(|(_, value)| non_blank(value).is_none())
        .map(|(field, _)| field)
        .collect()
    }

    pub fn validate(&self) -> Result<SoulmateApplication, ValidationError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { fields: missing });
        }
        let email = self.email.clone().unwrap_or_default();
        check_email(&email)?;

        Ok(SoulmateApplication {
            full_name: self.full_name.clone().unwrap_or_default(),
            email,
            whatsapp_number: self.whatsapp_number.clone().unwrap_or_default(),
            gender: self.gender,
            country: self.country.clone().unwrap_or_default(),
            state: self.state.clone().unwrap_or_default(),
            age_group: self.age_group,
            religion: self.religion,
            instagram_handle: self.instagram_handle.clone().unwrap_or_default(),
            church_name: self.church_name.clone().unwrap_or_default(),
            relationship_status: self.relationship_status,
        })
    }
}

// ── Launchpad ───────────────────────────────────────────────────────

/// Validated Couples' Launchpad registration, the body of
/// `POST /api/launchpad/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchpadApplication {
    pub full_name: String,
    #[serde(with = "title_case_gender")]
    pub gender: Gender,
    pub email: String,
    pub whatsapp_number: String,
    pub country_city: String,
    pub religion: String,
    pub denomination: String,
    pub referral_source: String,
    pub instagram_handle: String,

    pub wedding_date: NaiveDate,
    #[serde(with = "yes_no")]
    pub partner_registered: bool,
    pub spouse_name: String,
    pub spouse_whatsapp: String,

    pub attended_before: bool,
    pub agreed_to_feedback: bool,
    pub agreed_to_participation: bool,
}

/// In-progress Launchpad wizard answers across all three pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchpadDraft {
    full_name: Option<String>,
    gender: Gender,
    email: Option<String>,
    whatsapp_number: Option<String>,
    country_city: Option<String>,
    religion: Option<String>,
    denomination: Option<String>,
    referral_source: Option<String>,
    instagram_handle: Option<String>,
    wedding_date: Option<String>,
    partner_registered: bool,
    spouse_name: Option<String>,
    spouse_whatsapp: Option<String>,
    pub(crate) attended_before: bool,
    pub(crate) agreed_to_feedback: bool,
    pub(crate) agreed_to_participation: bool,
}

impl Default for LaunchpadDraft {
    fn default() -> Self {
        Self {
            full_name: None,
            gender: Gender::Female,
            email: None,
            whatsapp_number: None,
            country_city: None,
            religion: None,
            denomination: None,
            referral_source: None,
            instagram_handle: None,
            wedding_date: None,
            partner_registered: false,
            spouse_name: None,
            spouse_whatsapp: None,
            attended_before: false,
            agreed_to_feedback: false,
            agreed_to_participation: false,
        }
    }
}

impl LaunchpadDraft {
    pub fn from_application(app: &LaunchpadApplication) -> Self {
        Self {
            full_name: Some(app.full_name.clone()),
            gender: app.gender,
            email: Some(app.email.clone()),
            whatsapp_number: Some(app.whatsapp_number.clone()),
            country_city: Some(app.country_city.clone()),
            religion: Some(app.religion.clone()),
            denomination: Some(app.denomination.clone()),
            referral_source: Some(app.referral_source.clone()),
            instagram_handle: Some(app.instagram_handle.clone()),
            wedding_date: Some(app.wedding_date.format("%Y-%m-%d").to_string()),
            partner_registered: app.partner_registered,
            spouse_name: Some(app.spouse_name.clone()),
            spouse_whatsapp: Some(app.spouse_whatsapp.clone()),
            attended_before: app.attended_before,
            agreed_to_feedback: app.agreed_to_feedback,
            agreed_to_participation: app.agreed_to_participation,
        }
    }

    pub fn record_field(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), ValidationError> {
        let value = value.into();
        match name {
            "full_name" => self.full_name = Some(value.into_text()),
            "email" => self.email = Some(value.into_text()),
            "whatsapp_number" => self.whatsapp_number = Some(value.into_text()),
            "country_city" => self.country_city = Some(value.into_text()),
            "religion" => self.religion = Some(value.into_text()),
            "denomination" => self.denomination = Some(value.into_text()),
            "referral_source" => self.referral_source = Some(value.into_text()),
            "instagram_handle" => self.instagram_handle = Some(value.into_text()),
            "wedding_date" => self.wedding_date = Some(value.into_text()),
            "spouse_name" => self.spouse_name = Some(value.into_text()),
            "spouse_whatsapp" => self.spouse_whatsapp = Some(value.into_text()),
            "gender" => {
                let raw = value.into_text();
                self.gender = Gender::parse(&raw)
                    .ok_or_else(|| invalid(name, format!("'{raw}' is not Female/Male")))?;
            }
            "partner_registered" => self.partner_registered = value.into_flag(name)?,
            "attended_before" => self.attended_before = value.into_flag(name)?,
            "agreed_to_feedback" => self.agreed_to_feedback = value.into_flag(name)?,
            "agreed_to_participation" => self.agreed_to_participation = value.into_flag(name)?,
            other => return Err(ValidationError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Page 1 requirements: name, email, WhatsApp number.
    pub fn validate_personal(&self) -> Result<(), ValidationError> {
        let missing: Vec<&'static str> = [
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("whatsapp_number", &self.whatsapp_number),
        ]
        .into_iter()
        .filter(|(_, value)| non_blank(value).is_none())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { fields: missing });
        }
        check_email(non_blank(&self.email).unwrap_or_default())
    }

    /// Whether a wedding date was supplied at all (the eligibility gate).
    pub fn has_wedding_date(&self) -> bool {
        non_blank(&self.wedding_date).is_some()
    }

    /// Page 2 requirements once the date gate has passed.
    pub fn validate_marriage(&self) -> Result<NaiveDate, ValidationError> {
        let date = self.parse_wedding_date()?;
        if non_blank(&self.spouse_name).is_none() {
            return Err(ValidationError::MissingField { field: "spouse_name" });
        }
        Ok(date)
    }

    fn parse_wedding_date(&self) -> Result<NaiveDate, ValidationError> {
        let raw = non_blank(&self.wedding_date)
            .ok_or(ValidationError::MissingField { field: "wedding_date" })?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| invalid("wedding_date", format!("'{raw}' is not a YYYY-MM-DD date")))
    }

    pub fn validate(&self) -> Result<LaunchpadApplication, ValidationError> {
        self.validate_personal()?;
        let wedding_date = self.validate_marriage()?;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        Ok(LaunchpadApplication {
            full_name: text(&self.full_name),
            gender: self.gender,
            email: text(&self.email),
            whatsapp_number: text(&self.whatsapp_number),
            country_city: text(&self.country_city),
            religion: text(&self.religion),
            denomination: text(&self.denomination),
            referral_source: text(&self.referral_source),
            instagram_handle: text(&self.instagram_handle),
            wedding_date,
            partner_registered: self.partner_registered,
            spouse_name: text(&self.spouse_name),
            spouse_whatsapp: text(&self.spouse_whatsapp),
            attended_before: self.attended_before,
            agreed_to_feedback: self.agreed_to_feedback,
            agreed_to_participation: self.agreed_to_participation,
        })
    }
}

/// What the applicant receives once the server accepts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Confirmation {
    /// Soulmate: the clan the applicant was placed in.
    Clan {
        clan_name: String,
        whatsapp_link: String,
    },
    /// Launchpad: both community groups.
    Couples {
        whatsapp_link: String,
        telegram_link: String,
    },
}

impl Confirmation {
    /// Short text recorded as the accepted outcome's detail.
    pub fn summary(&self) -> String {
        match self {
            Self::Clan { clan_name, .. } => clan_name.clone(),
            Self::Couples { .. } => "Couples' Launchpad".to_string(),
        }
    }
}

mod title_case_gender {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Gender;

    pub fn serialize<S: Serializer>(gender: &Gender, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(gender.title())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Gender, D::Error> {
        let raw = String::deserialize(d)?;
        Gender::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown gender {raw}")))
    }
}

mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *value { "Yes" } else { "No" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(d)?;
        match raw.as_str() {
            "Yes" | "yes" => Ok(true),
            "No" | "no" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected Yes/No, got {other}"))),
        }
    }
}
