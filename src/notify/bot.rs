// src/notify/bot.rs

//! Inbound bot commands, served by long polling from the configured chat.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use regex::Regex;

use crate::error::Result;
use crate::models::{Config, HearingWithSubject, NewSubject};
use crate::notify::format::{MESSAGE_LIMIT, escape_html, split_message};
use crate::notify::telegram::TelegramApi;
use crate::scheduler::{RunController, TriggerOutcome};
use crate::storage::Database;
use crate::utils::dates::{local_date, to_display_date, weekday_name};

const DEFAULT_NEXT: usize = 5;
const MAX_NEXT: usize = 20;
const SEARCH_LIMIT: usize = 10;
const DAY_LIMIT: usize = 50;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Next(usize),
    Today,
    Tomorrow,
    Week,
    Search(String),
    Status,
    Check,
    Add(String),
}

impl BotCommand {
    /// Parse `/command[@bot] [args]`. Romanian aliases are accepted.
    /// Returns `None` for plain text and unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        let re = Regex::new(r"^/(\w+)(?:@\S+)?(?:\s+(.*))?$").ok()?;
        let caps = re.captures(text.trim())?;
        let name = caps.get(1)?.as_str().to_lowercase();
        let arg = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let command = match name.as_str() {
            "start" | "help" | "ajutor" => Self::Help,
            "next" | "urmatoarele" => Self::Next(
                arg.parse::<usize>()
                    .map(|n| n.clamp(1, MAX_NEXT))
                    .unwrap_or(DEFAULT_NEXT),
            ),
            "today" | "azi" => Self::Today,
            "tomorrow" | "maine" => Self::Tomorrow,
            "week" | "saptamana" => Self::Week,
            "search" | "cauta" => Self::Search(arg),
            "status" => Self::Status,
            "check" | "verifica" => Self::Check,
            "add" | "adauga" => Self::Add(arg),
            _ => return None,
        };
        Some(command)
    }
}

const HELP: &str = "<b>Court Monitor</b>

/next [N] — next N hearings (default 5)
/today — today's hearings
/tomorrow — tomorrow's hearings
/week — hearings in the next 7 days
/search &lt;text&gt; — search hearings
/status — monitor status
/check — start a check now
/add &lt;name&gt; — monitor a new person";

/// Command handlers. Replies are HTML.
pub struct BotCommands {
    db: Database,
    controller: Arc<RunController>,
    config: Arc<Config>,
}

impl BotCommands {
    pub fn new(db: Database, controller: Arc<RunController>, config: Arc<Config>) -> Self {
        Self {
            db,
            controller,
            config,
        }
    }

    pub fn reply(&self, command: &BotCommand, now: DateTime<Utc>) -> Result<String> {
        let today = local_date(now, self.config.timezone()?);
        match command {
            BotCommand::Help => Ok(HELP.to_string()),
            BotCommand::Next(n) => self.next(today, *n),
            BotCommand::Today => self.day(today, "today"),
            BotCommand::Tomorrow => self.day(today + Days::new(1), "tomorrow"),
            BotCommand::Week => self.week(today),
            BotCommand::Search(q) => self.search(q),
            BotCommand::Status => self.status(today),
            BotCommand::Check => Ok(match self.controller.trigger_manual() {
                TriggerOutcome::Started => "🔄 Starting a check...".to_string(),
                TriggerOutcome::Conflict => "⏳ A check is already in progress...".to_string(),
            }),
            BotCommand::Add(name) => self.add(name, now),
        }
    }

    fn next(&self, today: NaiveDate, n: usize) -> Result<String> {
        let hearings = self.db.upcoming_hearings(today, n)?;
        if hearings.is_empty() {
            return Ok("No upcoming hearings scheduled.".to_string());
        }
        let mut out = format!("<b>Next {} hearings</b>\n", hearings.len());
        for item in &hearings {
            let h = &item.hearing;
            let _ = write!(
                out,
                "\n📅 <b>{}</b> at {}\n👤 {}\n🏛️ {}\n📋 {}\n",
                escape_html(&h.date),
                escape_html(time_or_placeholder(&h.time)),
                escape_html(&item.subject_name),
                escape_html(&h.court_name),
                escape_html(&h.case_number)
            );
            if !h.judge.is_empty() {
                let _ = writeln!(out, "⚖️ {}", escape_html(&h.judge));
            }
        }
        Ok(out.trim_end().to_string())
    }

    fn day(&self, date: NaiveDate, label: &str) -> Result<String> {
        let hearings = self.db.hearings_between(date, date, DAY_LIMIT)?;
        if hearings.is_empty() {
            return Ok(format!("No hearings {label}."));
        }
        let mut out = format!("<b>Hearings {label} ({})</b>\n", hearings.len());
        for item in &hearings {
            push_day_line(&mut out, item);
        }
        Ok(out.trim_end().to_string())
    }

    fn week(&self, today: NaiveDate) -> Result<String> {
        let hearings = self
            .db
            .hearings_between(today, today + Days::new(7), DAY_LIMIT)?;
        if hearings.is_empty() {
            return Ok("No hearings in the next 7 days.".to_string());
        }
        let mut out = format!("<b>Hearings in the next 7 days ({})</b>\n", hearings.len());
        let mut current = None;
        for item in &hearings {
            let iso = &item.hearing.date_iso;
            if current != Some(iso) {
                current = Some(iso);
                let day = NaiveDate::parse_from_str(iso, "%Y-%m-%d")
                    .map(weekday_name)
                    .unwrap_or_default();
                let _ = write!(out, "\n<b>{} {}</b>\n", to_display_date(iso), day);
            }
            push_day_line(&mut out, item);
        }
        Ok(out.trim_end().to_string())
    }

    fn search(&self, q: &str) -> Result<String> {
        if q.trim().is_empty() {
            return Ok("Usage: /search &lt;text&gt;".to_string());
        }
        let hearings = self.db.search_hearings(q, SEARCH_LIMIT)?;
        if hearings.is_empty() {
            return Ok(format!("No results for \"{}\".", escape_html(q)));
        }
        let mut out = format!(
            "<b>Results for \"{}\" ({})</b>\n",
            escape_html(q),
            hearings.len()
        );
        for item in &hearings {
            let h = &item.hearing;
            let _ = write!(
                out,
                "\n📋 <b>{}</b> — {}\n👤 {} | 🏛️ {}\n",
                escape_html(&h.case_number),
                escape_html(&h.date),
                escape_html(&item.subject_name),
                escape_html(&h.court_name)
            );
            if !h.outcome.is_empty() {
                let _ = writeln!(out, "Outcome: {}", escape_html(&h.outcome));
            }
        }
        Ok(out.trim_end().to_string())
    }

    fn status(&self, today: NaiveDate) -> Result<String> {
        let last_check = self
            .db
            .last_run_at()?
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let progress = self.controller.progress();
        let scraper = if progress.running {
            format!("running ({}/{})", progress.index, progress.total)
        } else {
            "idle".to_string()
        };

        Ok(format!(
            "<b>Monitor status</b>\n\nActive subjects: {}\nTotal hearings: {}\nUpcoming hearings: {}\nLast check: {}\nScraper: {}",
            self.db.count_active_subjects()?,
            self.db.count_hearings()?,
            self.db.count_upcoming_hearings(today)?,
            last_check,
            scraper
        ))
    }

    fn add(&self, name: &str, now: DateTime<Utc>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Ok("Usage: /add First Last".to_string());
        }
        if self.db.find_active_subject(name)?.is_some() {
            return Ok(format!("\"{}\" is already monitored.", escape_html(name)));
        }

        let courts = self.config.court_codes();
        let subject = NewSubject::named(name).normalized(&courts)?;
        let created = self.db.create_subject(&subject, now)?;
        log::info!("Subject '{}' added from the bot", created.name);
        Ok(format!(
            "✅ <b>{}</b> added to monitoring.\nCourts: all ({})\nCase type: {}",
            escape_html(&created.name),
            created.courts.len(),
            created.case_type
        ))
    }
}

fn time_or_placeholder(time: &str) -> &str {
    if time.is_empty() { "?" } else { time }
}

fn push_day_line(out: &mut String, item: &HearingWithSubject) {
    let h = &item.hearing;
    let _ = write!(
        out,
        "\n🕐 {} — {}\n   🏛️ {} | 📋 {}\n",
        escape_html(time_or_placeholder(&h.time)),
        escape_html(&item.subject_name),
        escape_html(&h.court_name),
        escape_html(&h.case_number)
    );
}

/// Long-poll loop answering commands from the configured chat only.
pub struct BotService {
    api: TelegramApi,
    chat_id: String,
    commands: BotCommands,
    poll_timeout_secs: u64,
}

impl BotService {
    pub fn new(
        api: TelegramApi,
        chat_id: impl Into<String>,
        commands: BotCommands,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            api,
            chat_id: chat_id.into(),
            commands,
            poll_timeout_secs,
        }
    }

    fn is_authorized(&self, chat_id: i64) -> bool {
        self.chat_id.trim() == chat_id.to_string()
    }

    /// Poll forever. Transport errors are logged and retried after a pause.
    pub async fn run(self) {
        log::info!("Bot polling started");
        let mut offset = 0;
        loop {
            let updates = match self.api.get_updates(offset, self.poll_timeout_secs).await {
                Ok(updates) => updates,
                Err(e) => {
                    log::warn!("Bot polling failed: {}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = update.message else {
                    continue;
                };
                if !self.is_authorized(message.chat.id) {
                    log::debug!("Ignoring message from chat {}", message.chat.id);
                    continue;
                }
                let Some(command) = message.text.as_deref().and_then(BotCommand::parse) else {
                    continue;
                };
                self.answer(&command).await;
            }
        }
    }

    async fn answer(&self, command: &BotCommand) {
        log::debug!("Bot command {:?}", command);
        let text = self
            .commands
            .reply(command, Utc::now())
            .unwrap_or_else(|e| {
                log::error!("Bot command {:?} failed: {}", command, e);
                format!("❌ Error: {}", escape_html(&e.to_string()))
            });
        for chunk in split_message(&text, MESSAGE_LIMIT) {
            if let Err(e) = self.api.send_message(&self.chat_id, &chunk).await {
                log::warn!("Bot reply failed: {}", e);
                break;
            }
        }
    }
}
