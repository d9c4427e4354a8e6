// src/pipeline/orchestrator.rs

//! Scrape orchestration across all active subjects and their courts.
//!
//! Requests are strictly sequential with a fixed pause after each one. A
//! failing court never aborts the run: hearing failures land in the run log
//! with zero counts, ruling failures are only logged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{
    ChangeNotice, Config, HearingWithSubject, MonitoredSubject, NewRunLogEntry, RulingKind,
    RulingWithSubject,
};
use crate::pipeline::diff::{HearingOutcome, apply_hearing, apply_ruling};
use crate::pipeline::guard::{RunGuard, RunPermit, RunPhase, RunProgress};
use crate::pipeline::report::{RequestError, RunReport};
use crate::services::CourtSource;
use crate::storage::Database;
use crate::utils::log::{header, step, summary};

/// Result of asking for a run.
#[derive(Debug)]
pub enum RunOutcome {
    /// Another run held the guard
    Skipped,
    Completed(RunReport),
}

pub struct Orchestrator {
    db: Database,
    source: Arc<dyn CourtSource>,
    guard: Arc<RunGuard>,
    delay: Duration,
    fetch_rulings: bool,
}

impl Orchestrator {
    pub fn new(db: Database, source: Arc<dyn CourtSource>, config: &Config) -> Self {
        Self {
            db,
            source,
            guard: RunGuard::new(),
            delay: Duration::from_millis(config.crawler.request_delay_ms),
            fetch_rulings: config.crawler.fetch_rulings,
        }
    }

    /// Override the pause between requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    pub fn progress(&self) -> RunProgress {
        self.guard.progress()
    }

    /// Acquire the run guard without starting work.
    pub fn try_begin(&self) -> Option<RunPermit> {
        self.guard.try_acquire()
    }

    /// Run now unless a run is already in flight.
    pub async fn run(&self) -> Result<RunOutcome> {
        match self.try_begin() {
            Some(permit) => Ok(RunOutcome::Completed(self.execute(permit).await?)),
            None => {
                log::info!("Run already in progress, skipping");
                Ok(RunOutcome::Skipped)
            }
        }
    }

    /// Perform a run under an acquired permit. The guard is released when
    /// this returns, whatever the outcome.
    pub async fn execute(&self, permit: RunPermit) -> Result<RunReport> {
        let mut report = RunReport::new(Utc::now());
        header("Court monitor run");

        let subjects = self.db.active_subjects()?;
        report.subjects = subjects.len();
        log::info!("Checking {} active subjects", subjects.len());

        permit.enter_phase(RunPhase::Hearings, subjects.len());
        for (i, subject) in subjects.iter().enumerate() {
            permit.advance(i + 1, &subject.name);
            step(i + 1, subjects.len(), &format!("Hearings for {}", subject.name));
            for court in &subject.courts {
                self.hearing_attempt(subject, court, &mut report).await;
                self.pause().await;
            }
        }

        if self.fetch_rulings {
            permit.enter_phase(RunPhase::Rulings, subjects.len());
            for (i, subject) in subjects.iter().enumerate() {
                permit.advance(i + 1, &subject.name);
                step(i + 1, subjects.len(), &format!("Rulings for {}", subject.name));
                for court in &subject.courts {
                    for kind in RulingKind::ALL {
                        self.ruling_attempt(subject, court, kind, &mut report).await;
                        self.pause().await;
                    }
                }
            }
        }

        report.finished_at = Utc::now();
        summary("Run complete", &report.summary_items());
        drop(permit);
        Ok(report)
    }

    /// Hearings pass for one subject across its courts, under the same guard
    /// as a full run. Fails with `RunInProgress` while a run holds it.
    pub async fn check_subject(&self, subject: &MonitoredSubject) -> Result<RunReport> {
        let permit = self.try_begin().ok_or(AppError::RunInProgress)?;
        let mut report = RunReport::new(Utc::now());
        report.subjects = 1;
        log::info!("Checking {} across {} courts", subject.name, subject.courts.len());

        permit.enter_phase(RunPhase::Hearings, 1);
        permit.advance(1, &subject.name);
        for court in &subject.courts {
            self.hearing_attempt(subject, court, &mut report).await;
            self.pause().await;
        }

        report.finished_at = Utc::now();
        summary(&format!("Check for {}", subject.name), &report.summary_items());
        drop(permit);
        Ok(report)
    }

    async fn hearing_attempt(
        &self,
        subject: &MonitoredSubject,
        court: &str,
        report: &mut RunReport,
    ) {
        let started = Instant::now();
        let entry = match self.collect_hearings(subject, court, report).await {
            Ok((found, new)) => {
                log::debug!("{} @ {}: {} found, {} new", subject.name, court, found, new);
                NewRunLogEntry::succeeded(subject.id, court, found, new)
            }
            Err(e) => {
                log::warn!("Hearings for {} @ {} failed: {}", subject.name, court, e);
                report.errors.push(RequestError {
                    subject: subject.name.clone(),
                    court_code: court.to_string(),
                    listing: "hearings".to_string(),
                    message: e.to_string(),
                });
                NewRunLogEntry::failed(subject.id, court, &e)
            }
        }
        .with_duration(started.elapsed().as_millis() as u64);

        if let Err(e) = self.db.append_run_log(&entry, Utc::now()) {
            log::error!("Could not write run log for {} @ {}: {}", subject.name, court, e);
        }
    }

    /// Fetch one court's hearings and apply every row. Returns (found, new).
    async fn collect_hearings(
        &self,
        subject: &MonitoredSubject,
        court: &str,
        report: &mut RunReport,
    ) -> Result<(usize, usize)> {
        let rows = self.source.fetch_hearings(subject, court).await?;
        let mut new = 0;

        for row in &rows {
            match apply_hearing(&self.db, subject.id, row, Utc::now())? {
                HearingOutcome::Inserted(hearing) => {
                    new += 1;
                    report.hearings.new += 1;
                    report.new_hearings.push(HearingWithSubject {
                        hearing,
                        subject_name: subject.name.clone(),
                    });
                }
                HearingOutcome::Modified { hearing, changes } => {
                    report.hearings.modified += 1;
                    report
                        .changes
                        .extend(changes.into_iter().map(|change| ChangeNotice {
                            change,
                            case_number: hearing.case_number.clone(),
                            court_name: hearing.court_name.clone(),
                            date: hearing.date.clone(),
                            time: hearing.time.clone(),
                            subject_name: subject.name.clone(),
                        }));
                }
                HearingOutcome::Unchanged => {}
            }
        }

        report.hearings.found += rows.len();
        Ok((rows.len(), new))
    }

    async fn ruling_attempt(
        &self,
        subject: &MonitoredSubject,
        court: &str,
        kind: RulingKind,
        report: &mut RunReport,
    ) {
        let result = async {
            let rows = self.source.fetch_rulings(subject, court, kind).await?;
            report.rulings.found += rows.len();
            for row in &rows {
                if let Some(ruling) = apply_ruling(&self.db, subject.id, row, Utc::now())? {
                    report.rulings.new += 1;
                    report.new_rulings.push(RulingWithSubject {
                        ruling,
                        subject_name: subject.name.clone(),
                    });
                }
            }
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(e) = result {
            log::warn!("{} rulings for {} @ {} failed: {}", kind, subject.name, court, e);
            report.errors.push(RequestError {
                subject: subject.name.clone(),
                court_code: court.to_string(),
                listing: kind.as_str().to_string(),
                message: e.to_string(),
            });
        }
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
