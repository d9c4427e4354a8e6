// src/notify/digest.rs

//! Weekly digest: statistics plus last week's news and next week's hearings,
//! rendered as a paginated plain-text document.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{Config, HearingWithSubject, RulingWithSubject};
use crate::notify::telegram::BotChannel;
use crate::storage::{Database, DigestStats};
use crate::utils::dates::{local_date, to_display_date, weekday_name};

const NEW_HEARINGS_LIMIT: usize = 50;
const UPCOMING_LIMIT: usize = 50;
const NEW_RULINGS_LIMIT: usize = 30;

/// Width used to center titles and page footers.
const PAGE_WIDTH: usize = 72;

/// Everything the digest shows, read in one pass.
#[derive(Debug, Clone)]
pub struct DigestData {
    pub generated_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub stats: DigestStats,
    pub new_hearings: Vec<HearingWithSubject>,
    pub upcoming: Vec<HearingWithSubject>,
    pub new_rulings: Vec<RulingWithSubject>,
}

impl DigestData {
    /// `today` is the calendar date in the monitor's timezone.
    pub fn collect(db: &Database, now: DateTime<Utc>, today: NaiveDate) -> Result<Self> {
        let week_ago = now - Duration::days(7);

        let mut new_hearings = db.hearings_first_seen_since(week_ago, NEW_HEARINGS_LIMIT)?;
        new_hearings.sort_by(|a, b| {
            (&a.hearing.date_iso, &a.hearing.time).cmp(&(&b.hearing.date_iso, &b.hearing.time))
        });

        let mut new_rulings = db.rulings_first_seen_since(week_ago, NEW_RULINGS_LIMIT)?;
        new_rulings.sort_by(|a, b| b.ruling.pronounced_on_iso.cmp(&a.ruling.pronounced_on_iso));

        Ok(Self {
            generated_at: now,
            today,
            stats: db.digest_stats(today, now)?,
            new_hearings,
            upcoming: db.hearings_between(today, today + Duration::days(7), UPCOMING_LIMIT)?,
            new_rulings,
        })
    }

    /// Body lines, before pagination.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = vec![
            centered("WEEKLY REPORT"),
            centered(&format!(
                "Generated {}",
                self.generated_at.format("%Y-%m-%d %H:%M UTC")
            )),
            String::new(),
            "Statistics".to_string(),
            format!("  Monitored subjects:       {}", self.stats.active_subjects),
            format!("  New hearings (7 days):    {}", self.stats.new_hearings_7d),
            format!("  Upcoming hearings:        {}", self.stats.upcoming_hearings),
            format!("  New rulings (7 days):     {}", self.stats.new_rulings_7d),
            format!("  Checks performed (7 days): {}", self.stats.attempts_7d),
            String::new(),
        ];

        lines.push(format!("New hearings detected ({})", self.new_hearings.len()));
        if self.new_hearings.is_empty() {
            lines.push("  None.".to_string());
        }
        for item in &self.new_hearings {
            let h = &item.hearing;
            lines.push(format!(
                "  {} {} | {} | {} | {}",
                h.date, h.time, h.court_name, h.case_number, item.subject_name
            ));
            if !h.subject_matter.is_empty() {
                lines.push(format!("      {}", h.subject_matter));
            }
        }
        lines.push(String::new());

        lines.push(format!("Hearings in the next 7 days ({})", self.upcoming.len()));
        if self.upcoming.is_empty() {
            lines.push("  None.".to_string());
        }
        let mut current_date = None;
        for item in &self.upcoming {
            let h = &item.hearing;
            if current_date != Some(&h.date_iso) {
                current_date = Some(&h.date_iso);
                let day = NaiveDate::parse_from_str(&h.date_iso, "%Y-%m-%d")
                    .map(weekday_name)
                    .unwrap_or_default();
                lines.push(format!("  {} {}", to_display_date(&h.date_iso), day));
            }
            let time = if h.time.is_empty() { "?" } else { h.time.as_str() };
            lines.push(format!(
                "    {} — {} — {} — {}",
                time, item.subject_name, h.court_name, h.case_number
            ));
        }
        lines.push(String::new());

        lines.push(format!("New rulings ({})", self.new_rulings.len()));
        if self.new_rulings.is_empty() {
            lines.push("  None.".to_string());
        }
        for item in &self.new_rulings {
            let r = &item.ruling;
            let date = if r.pronounced_on.is_empty() { "?" } else { r.pronounced_on.as_str() };
            lines.push(format!(
                "  {} | {} | {} | {}",
                date, r.kind, r.court_name, r.case_number
            ));
            if !r.disposition.is_empty() {
                lines.push(format!("      {}", r.disposition));
            }
        }
        lines
    }
}

fn centered(text: &str) -> String {
    format!("{:^width$}", text, width = PAGE_WIDTH).trim_end().to_string()
}

/// Fixed-height pages of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestDocument {
    pages: Vec<Vec<String>>,
}

impl DigestDocument {
    pub fn paginate(lines: Vec<String>, lines_per_page: usize) -> Self {
        let per_page = lines_per_page.max(1);
        let mut pages: Vec<Vec<String>> = lines.chunks(per_page).map(<[String]>::to_vec).collect();
        if pages.is_empty() {
            pages.push(Vec::new());
        }
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&[String]> {
        self.pages.get(index).map(Vec::as_slice)
    }

    /// Pages separated by form feeds, each closed by a `Page i/n` footer.
    pub fn to_text(&self) -> String {
        let total = self.pages.len();
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            if i > 0 {
                out.push('\u{c}');
            }
            for line in page {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
            let _ = writeln!(out, "{}", centered(&format!("Page {}/{}", i + 1, total)));
        }
        out
    }

    pub fn file_name(today: NaiveDate) -> String {
        format!("weekly-report-{}.txt", today.format("%Y-%m-%d"))
    }
}

/// Builds the digest and ships it through the bot channel.
pub struct DigestSender {
    db: Database,
    config: Arc<Config>,
    bot: Option<Arc<BotChannel>>,
}

impl DigestSender {
    pub fn new(db: Database, config: Arc<Config>, bot: Option<Arc<BotChannel>>) -> Self {
        Self { db, config, bot }
    }

    pub fn build(&self, now: DateTime<Utc>) -> Result<(NaiveDate, DigestDocument)> {
        let today = local_date(now, self.config.timezone()?);
        let data = DigestData::collect(&self.db, now, today)?;
        let document =
            DigestDocument::paginate(data.render_lines(), self.config.notify.digest_lines_per_page);
        Ok((today, document))
    }

    /// Build and send the digest. Returns `false` when no bot is configured.
    pub async fn send(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(bot) = &self.bot else {
            log::info!("Bot channel not configured, digest not sent");
            return Ok(false);
        };

        let (today, document) = match self.build(now) {
            Ok(built) => built,
            Err(e) => {
                if let Err(send_err) = bot
                    .send_text(&format!("❌ Weekly report failed: {e}"))
                    .await
                {
                    log::warn!("Could not report digest failure: {}", send_err);
                }
                return Err(e);
            }
        };

        log::info!("Sending weekly digest ({} pages)", document.page_count());
        bot.api()
            .send_document(
                bot.chat_id(),
                &DigestDocument::file_name(today),
                document.to_text().into_bytes(),
                &format!("📊 Weekly report — {}", today.format("%d.%m.%Y")),
            )
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSubject, ScrapedHearing};

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn test_paginate_splits_on_fixed_height() {
        let doc = DigestDocument::paginate(lines(10), 4);
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page(2).unwrap(), ["line 9", "line 10"]);

        let text = doc.to_text();
        assert!(text.contains("Page 1/3"));
        assert!(text.contains("Page 3/3"));
        assert_eq!(text.matches('\u{c}').count(), 2);
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let doc = DigestDocument::paginate(Vec::new(), 10);
        assert_eq!(doc.page_count(), 1);
        assert!(doc.to_text().contains("Page 1/1"));
    }

    #[test]
    fn test_file_name() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(DigestDocument::file_name(today), "weekly-report-2025-03-10.txt");
    }

    #[test]
    fn test_upcoming_grouped_by_date() {
        let db = Database::open_in_memory().unwrap();
        let subject = NewSubject::named("Popescu Ion")
            .normalized(&["jc".into()])
            .unwrap();
        let sid = db.create_subject(&subject, Utc::now()).unwrap().id;
        for (hash, iso, time) in [
            ("a", "2025-03-11", "10:00"),
            ("b", "2025-03-11", "09:00"),
            ("c", "2025-03-12", "14:00"),
        ] {
            let row = ScrapedHearing {
                court_code: "jc".into(),
                court_name: "JC".into(),
                case_number: format!("2-{hash}/2025"),
                date_iso: iso.into(),
                time: time.into(),
                ..ScrapedHearing::default()
            };
            db.insert_hearing(sid, &row, hash, Utc::now()).unwrap();
        }

        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let data = DigestData::collect(&db, Utc::now(), today).unwrap();
        assert_eq!(data.upcoming.len(), 3);
        assert_eq!(data.stats.new_hearings_7d, 3);

        let rendered = data.render_lines();
        let day_headers: Vec<_> = rendered
            .iter()
            .filter(|l| l.starts_with("  11.03.2025") || l.starts_with("  12.03.2025"))
            .collect();
        assert_eq!(day_headers, ["  11.03.2025 Tuesday", "  12.03.2025 Wednesday"]);

        let first = rendered.iter().position(|l| l.contains("09:00 —")).unwrap();
        let second = rendered.iter().position(|l| l.contains("10:00 —")).unwrap();
        assert!(first < second);
    }
}
