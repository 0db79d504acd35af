//! Terminal front-end: renders each step as a prompt and maps typed answers
//! to funnel actions.
//!
//! `Console` is generic over its reader and writer so tests can drive it with
//! in-memory buffers. `q` quits at any prompt (progress stays persisted) and
//! `b` goes back where the step allows it.

use std::io;

use secrecy::SecretString;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::admin::AdminSession;
use crate::api::{AdminOverview, ClanStat, Participant};
use crate::config::FunnelConfig;
use crate::error::{AdminError, FunnelError, Result};
use crate::funnel::{
    Confirmation, LaunchpadAction, LaunchpadFunnel, LaunchpadStep, SoulmateAction, SoulmateFunnel,
    SoulmateStep, Transition, WizardPage,
};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Quit,
    Back,
    Text(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "q" | "Q" => Self::Quit,
            "b" | "B" => Self::Back,
            other => Self::Text(other.to_string()),
        }
    }

    fn yes_no(&self) -> Option<bool> {
        match self {
            Self::Text(t) => match t.to_ascii_lowercase().as_str() {
                "y" | "yes" => Some(true),
                "n" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Whether a run loop should keep going.
enum Flow {
    Continue,
    Quit,
}

/// (field name, prompt label)
const SOULMATE_FIELDS: [(&str, &str); 11] = [
    ("full_name", "Full name"),
    ("email", "Email"),
    ("whatsapp_number", "WhatsApp number"),
    ("gender", "Gender (male/female)"),
    ("country", "Country"),
    ("state", "State"),
    ("age_group", "Age group (18-25, 26-30, 31-35, 36-40, 40+)"),
    ("religion", "Religion (Christian/Muslim/Traditional/Atheist)"),
    ("instagram_handle", "Instagram handle"),
    ("church_name", "Church name (optional)"),
    ("relationship_status", "Relationship status (single/single-parent/divorced/widowed)"),
];

const LAUNCHPAD_PERSONAL_FIELDS: [(&str, &str); 9] = [
    ("full_name", "Full name"),
    ("gender", "Gender (Female/Male)"),
    ("email", "Email"),
    ("whatsapp_number", "WhatsApp number"),
    ("country_city", "Country and city"),
    ("religion", "Religion"),
    ("denomination", "Denomination"),
    ("referral_source", "How did you hear about us?"),
    ("instagram_handle", "Instagram handle"),
];

const LAUNCHPAD_MARRIAGE_FIELDS: [(&str, &str); 4] = [
    ("wedding_date", "Wedding date (YYYY-MM-DD, blank if not fixed)"),
    ("partner_registered", "Has your partner registered? (yes/no)"),
    ("spouse_name", "Spouse's name"),
    ("spouse_whatsapp", "Spouse's WhatsApp number"),
];

const LAUNCHPAD_COMMITMENT_FIELDS: [(&str, &str); 3] = [
    ("attended_before", "Have you attended a Launchpad before? (yes/no)"),
    ("agreed_to_feedback", "Will you give feedback after the programme? (yes/no)"),
    ("agreed_to_participation", "Will you participate actively? (yes/no)"),
];

pub struct Console<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, out: W) -> Self {
        Self {
            lines: reader.lines(),
            out,
        }
    }

    /// Give back the writer (tests read what was printed).
    pub fn into_writer(self) -> W {
        self.out
    }

    async fn say(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }

    /// Prompt and read one line. End of input counts as quitting.
    async fn ask(&mut self, prompt: &str) -> io::Result<Input> {
        self.out.write_all(prompt.as_bytes()).await?;
        self.out.write_all(b"> ").await?;
        self.out.flush().await?;
        Ok(match self.lines.next_line().await? {
            Some(line) => Input::parse(&line),
            None => Input::Quit,
        })
    }

    async fn ask_yes_no(&mut self, prompt: &str) -> io::Result<Input> {
        loop {
            let input = self.ask(prompt).await?;
            if matches!(input, Input::Quit | Input::Back) || input.yes_no().is_some() {
                return Ok(input);
            }
            self.say("Please answer y or n.").await?;
        }
    }

    async fn report(&mut self, err: &FunnelError) -> io::Result<()> {
        match err {
            FunnelError::Submission(e) => self.say(&e.user_message()).await,
            other => self.say(&other.to_string()).await,
        }
    }

    // ── Soulmate ────────────────────────────────────────────────────

    /// Drive a Soulmate session until it is quit.
    pub async fn run_soulmate(
        &mut self,
        funnel: &SoulmateFunnel,
        admin: &mut AdminSession,
        config: &FunnelConfig,
    ) -> Result<()> {
        loop {
            let flow = match funnel.step().await {
                SoulmateStep::Welcome => self.soulmate_welcome(funnel).await?,
                SoulmateStep::Gatekeeper => self.soulmate_gatekeeper(funnel).await?,
                SoulmateStep::Registration => self.soulmate_registration(funnel).await?,
                SoulmateStep::SocialLock => self.soulmate_social_lock(funnel, config).await?,
                SoulmateStep::Success | SoulmateStep::Rejected => {
                    self.soulmate_finished(funnel).await?
                }
                SoulmateStep::Admin => {
                    self.run_admin(admin).await?;
                    Flow::Quit
                }
            };
            if let Flow::Quit = flow {
                return Ok(());
            }
        }
    }

    async fn soulmate_act(&mut self, funnel: &SoulmateFunnel, action: SoulmateAction) -> io::Result<()> {
        match funnel.act(action).await {
            Ok(Transition::Blocked(rejection)) => self.say(&rejection.message).await,
            Ok(_) => Ok(()),
            Err(e) => self.report(&e).await,
        }
    }

    async fn soulmate_welcome(&mut self, funnel: &SoulmateFunnel) -> io::Result<Flow> {
        self.say("\nReady for a Soulmate? Registration").await?;
        match self.ask("Press Enter to begin (q to quit)").await? {
            Input::Quit => Ok(Flow::Quit),
            _ => {
                self.soulmate_act(funnel, SoulmateAction::Start).await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn soulmate_gatekeeper(&mut self, funnel: &SoulmateFunnel) -> io::Result<Flow> {
        let state = funnel.state().await;
        let (prompt, feedback) = if state.feedback_question_open() {
            ("Will you give feedback after the meeting? (y/n)", true)
        } else {
            ("Have you attended a previous cohort? (y/n)", false)
        };
        let action = match self.ask_yes_no(prompt).await? {
            Input::Quit => return Ok(Flow::Quit),
            Input::Back => SoulmateAction::Back,
            answer => {
                let yes = answer.yes_no().unwrap_or(false);
                if feedback {
                    SoulmateAction::AnswerFeedback { will_give_feedback: yes }
                } else {
                    SoulmateAction::AnswerAttendance { attended_before: yes }
                }
            }
        };
        self.soulmate_act(funnel, action).await?;
        Ok(Flow::Continue)
    }

    async fn soulmate_registration(&mut self, funnel: &SoulmateFunnel) -> io::Result<Flow> {
        self.say("\nRegistration details (Enter keeps the current answer)").await?;
        for (field, label) in SOULMATE_FIELDS {
            loop {
                match self.ask(label).await? {
                    Input::Quit => return Ok(Flow::Quit),
                    Input::Back => {
                        self.soulmate_act(funnel, SoulmateAction::Back).await?;
                        return Ok(Flow::Continue);
                    }
                    Input::Text(text) if text.is_empty() => break,
                    Input::Text(text) => match funnel.record_field(field, text).await {
                        Ok(()) => break,
                        Err(e) => self.report(&e).await?,
                    },
                }
            }
        }
        self.soulmate_act(funnel, SoulmateAction::Continue).await?;
        Ok(Flow::Continue)
    }

    async fn soulmate_social_lock(
        &mut self,
        funnel: &SoulmateFunnel,
        config: &FunnelConfig,
    ) -> io::Result<Flow> {
        self.say(&format!(
            "\nOne last step: follow us on Instagram\n  {}",
            config.soulmate_instagram_url
        ))
        .await?;
        let action = match self
            .ask("1) I've followed  2) Complete registration  b) Back")
            .await?
        {
            Input::Quit => return Ok(Flow::Quit),
            Input::Back => SoulmateAction::Back,
            Input::Text(t) if t == "1" => SoulmateAction::FollowSocial,
            Input::Text(t) if t == "2" => {
                self.say("Submitting...").await?;
                SoulmateAction::Complete
            }
            Input::Text(_) => return Ok(Flow::Continue),
        };
        self.soulmate_act(funnel, action).await?;
        Ok(Flow::Continue)
    }

    async fn soulmate_finished(&mut self, funnel: &SoulmateFunnel) -> io::Result<Flow> {
        let state = funnel.state().await;
        match (&state.step, &state.confirmation) {
            (SoulmateStep::Success, Some(confirmation)) => self.show_confirmation(confirmation).await?,
            _ => {
                let message = state.outcome.detail().unwrap_or_default().to_string();
                self.say(&format!("\n{message}")).await?;
            }
        }
        match self.ask("r) Return to home  q) Quit").await? {
            Input::Text(t) if t.eq_ignore_ascii_case("r") => {
                self.soulmate_act(funnel, SoulmateAction::Reset).await?;
                Ok(Flow::Continue)
            }
            Input::Quit => Ok(Flow::Quit),
            _ => Ok(Flow::Continue),
        }
    }

    async fn show_confirmation(&mut self, confirmation: &Confirmation) -> io::Result<()> {
        match confirmation {
            Confirmation::Clan {
                clan_name,
                whatsapp_link,
            } => {
                self.say(&format!("\nWelcome! You have been assigned to {clan_name}."))
                    .await?;
                self.say(&format!("Join your clan on WhatsApp: {whatsapp_link}")).await
            }
            Confirmation::Couples {
                whatsapp_link,
                telegram_link,
            } => {
                self.say("\nYou're in! Join the Couples' Launchpad community:").await?;
                self.say(&format!("  WhatsApp: {whatsapp_link}")).await?;
                self.say(&format!("  Telegram: {telegram_link}")).await
            }
        }
    }

    // ── Launchpad ───────────────────────────────────────────────────

    /// Drive a Launchpad session until it is quit.
    pub async fn run_launchpad(
        &mut self,
        funnel: &LaunchpadFunnel,
        config: &FunnelConfig,
    ) -> Result<()> {
        loop {
            let flow = match funnel.step().await {
                LaunchpadStep::Welcome => {
                    self.say("\nCouples' Launchpad Registration").await?;
                    match self.ask("Press Enter to begin (q to quit)").await? {
                        Input::Quit => Flow::Quit,
                        _ => {
                            self.launchpad_act(funnel, LaunchpadAction::Start).await?;
                            Flow::Continue
                        }
                    }
                }
                LaunchpadStep::Form(page) => self.launchpad_page(funnel, page, config).await?,
                LaunchpadStep::Success | LaunchpadStep::Rejected => {
                    self.launchpad_finished(funnel).await?
                }
            };
            if let Flow::Quit = flow {
                return Ok(());
            }
        }
    }

    async fn launchpad_act(&mut self, funnel: &LaunchpadFunnel, action: LaunchpadAction) -> io::Result<()> {
        match funnel.act(action).await {
            Ok(Transition::Blocked(rejection)) => self.say(&rejection.message).await,
            Ok(_) => Ok(()),
            Err(e) => self.report(&e).await,
        }
    }

    async fn launchpad_page(
        &mut self,
        funnel: &LaunchpadFunnel,
        page: WizardPage,
        config: &FunnelConfig,
    ) -> io::Result<Flow> {
        let (title, fields): (&str, &[(&str, &str)]) = match page {
            WizardPage::Personal => ("Personal details", &LAUNCHPAD_PERSONAL_FIELDS[..]),
            WizardPage::Marriage => ("Your marriage", &LAUNCHPAD_MARRIAGE_FIELDS[..]),
            WizardPage::Commitment => ("Commitment", &LAUNCHPAD_COMMITMENT_FIELDS[..]),
        };
        self.say(&format!("\nStep {} of 3: {title}", page.index())).await?;

        for &(field, label) in fields {
            loop {
                match self.ask(label).await? {
                    Input::Quit => return Ok(Flow::Quit),
                    Input::Back => {
                        self.launchpad_act(funnel, LaunchpadAction::Back).await?;
                        return Ok(Flow::Continue);
                    }
                    // A blank wedding date is an answer ("not fixed"), not a skip.
                    Input::Text(text) if text.is_empty() && field != "wedding_date" => break,
                    Input::Text(text) => match funnel.record_field(field, text).await {
                        Ok(()) => break,
                        Err(e) => self.report(&e).await?,
                    },
                }
            }
        }

        if page == WizardPage::Personal && !funnel.state().await.has_followed_social() {
            self.say(&format!(
                "Follow @coupleslaunchpad on Instagram: {}",
                config.launchpad_instagram_url
            ))
            .await?;
            match self.ask("f) I've followed  n) Next").await? {
                Input::Quit => return Ok(Flow::Quit),
                Input::Text(t) if t.eq_ignore_ascii_case("f") => {
                    self.launchpad_act(funnel, LaunchpadAction::FollowSocial).await?;
                }
                _ => {}
            }
        }

        if page == WizardPage::Commitment {
            self.say("Submitting...").await?;
        }
        self.launchpad_act(funnel, LaunchpadAction::Next).await?;
        Ok(Flow::Continue)
    }

    async fn launchpad_finished(&mut self, funnel: &LaunchpadFunnel) -> io::Result<Flow> {
        let state = funnel.state().await;
        match &state.confirmation {
            Some(confirmation) if state.step == LaunchpadStep::Success => {
                self.show_confirmation(confirmation).await?
            }
            _ => {
                let message = state.outcome.detail().unwrap_or_default().to_string();
                self.say(&format!("\n{message}")).await?;
            }
        }
        match self.ask("r) Return to home  q) Quit").await? {
            Input::Text(t) if t.eq_ignore_ascii_case("r") => {
                self.launchpad_act(funnel, LaunchpadAction::Reset).await?;
                Ok(Flow::Continue)
            }
            Input::Quit => Ok(Flow::Quit),
            _ => Ok(Flow::Continue),
        }
    }

    // ── Admin ───────────────────────────────────────────────────────

    /// Admin viewer loop: login, stats table, participant drill-down.
    pub async fn run_admin(&mut self, session: &mut AdminSession) -> Result<()> {
        self.say("\nAdmin Access").await?;
        if let Err(e) = session.restore().await {
            self.say(&admin_message(&e)).await?;
        }

        loop {
            if !session.is_logged_in() {
                match self.ask("Secret key").await? {
                    Input::Quit => return Ok(()),
                    Input::Back => continue,
                    Input::Text(secret) => {
                        if let Err(e) = session.login(SecretString::from(secret)).await {
                            self.say(&admin_message(&e)).await?;
                        }
                        continue;
                    }
                }
            }

            self.say(&render_stats(session.stats(), &session.overview())).await?;
            match self
                .ask("r) Refresh  <id>) Participants  l) Logout  q) Quit")
                .await?
            {
                Input::Quit => return Ok(()),
                Input::Back => {}
                Input::Text(t) if t.eq_ignore_ascii_case("r") => {
                    if let Err(e) = session.refresh().await {
                        self.say(&admin_message(&e)).await?;
                    }
                }
                Input::Text(t) if t.eq_ignore_ascii_case("l") => session.logout().await,
                Input::Text(t) => match t.parse::<i64>() {
                    Ok(clan_id) => match session.participants(clan_id).await {
                        Ok(people) => self.say(&render_participants(clan_id, &people)).await?,
                        Err(e) => self.say(&admin_message(&e)).await?,
                    },
                    Err(_) => self.say("Unknown option.").await?,
                },
            }
        }
    }
}

fn admin_message(err: &AdminError) -> String {
    match err {
        AdminError::Unauthorized => "Invalid Secret Key".to_string(),
        AdminError::Network(_) => "Network Error or Server Offline".to_string(),
        other => other.to_string(),
    }
}

/// Clan table plus totals.
pub fn render_stats(stats: &[ClanStat], overview: &AdminOverview) -> String {
    let mut out = String::from("\nClan Overview\n");
    if stats.is_empty() {
        out.push_str("  (no clans)\n");
    }
    for clan in stats {
        out.push_str(&format!(
            "  [{}] {:<20} {:>4}/{:<4} {:>3}%  {}\n",
            clan.id,
            clan.name,
            clan.current_count,
            clan.max_capacity,
            clan.fill_percentage(),
            clan.status_label(),
        ));
    }
    out.push_str(&format!(
        "  Total: {}/{} registered, {} open clan(s)",
        overview.registered, overview.capacity, overview.open_clans
    ));
    out
}

pub fn render_participants(clan_id: i64, people: &[Participant]) -> String {
    let mut out = format!("\nParticipants in clan {clan_id} ({})\n", people.len());
    for p in people {
        out.push_str(&format!(
            "  {} <{}> {} | {} {} | {} | {}\n",
            p.full_name, p.email, p.whatsapp_number, p.gender, p.age_group, p.state, p.instagram_handle
        ));
    }
    out.truncate(out.trim_end().len());
    out
}
