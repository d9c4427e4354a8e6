// src/scheduler.rs

//! Run control and cron triggers.
//!
//! `RunController` pairs the orchestrator with the dispatcher so every entry
//! point (cron, bot `/check`, `POST /api/runs`, CLI) runs and notifies the
//! same way. `Scheduler` owns the cron jobs.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::EffectiveSettings;
use crate::error::{AppError, Result};
use crate::models::MonitoredSubject;
use crate::notify::{DigestSender, Dispatcher};
use crate::pipeline::{Orchestrator, RunOutcome, RunProgress, RunReport};

/// Answer to a manual trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOutcome {
    /// Run started in the background
    Started,
    /// A run was already in flight; nothing was started
    Conflict,
}

pub struct RunController {
    orchestrator: Orchestrator,
    dispatcher: Dispatcher,
}

impl RunController {
    pub fn new(orchestrator: Orchestrator, dispatcher: Dispatcher) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            dispatcher,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn progress(&self) -> RunProgress {
        self.orchestrator.progress()
    }

    /// Run in the foreground and dispatch the report. A run already in
    /// flight yields `Skipped`.
    pub async fn run_and_dispatch(&self) -> Result<RunOutcome> {
        let outcome = self.orchestrator.run().await?;
        if let RunOutcome::Completed(report) = &outcome {
            self.dispatcher.dispatch(report).await;
        }
        Ok(outcome)
    }

    /// Check one subject in the foreground and dispatch what it found.
    pub async fn check_subject(&self, subject: &MonitoredSubject) -> Result<RunReport> {
        let report = self.orchestrator.check_subject(subject).await?;
        self.dispatcher.dispatch(&report).await;
        Ok(report)
    }

    /// Start a run in the background. The guard is taken before returning,
    /// so a second call made right after gets `Conflict`.
    pub fn trigger_manual(self: &Arc<Self>) -> TriggerOutcome {
        let Some(permit) = self.orchestrator.try_begin() else {
            log::info!("Manual run refused: a run is in progress");
            return TriggerOutcome::Conflict;
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.orchestrator.execute(permit).await {
                Ok(report) => {
                    this.dispatcher.dispatch(&report).await;
                }
                Err(e) => log::error!("Manual run failed: {}", e),
            }
        });
        TriggerOutcome::Started
    }
}

/// Accept five-field cron expressions by prefixing a zero seconds field.
pub fn normalize_cron(expr: &str) -> Result<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(AppError::validation(format!(
            "cron expression '{expr}' has {n} fields, expected 5 to 7"
        ))),
    }
}

/// Cron jobs for the two daily runs and the weekly digest.
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn start(
        controller: Arc<RunController>,
        digest: Arc<DigestSender>,
        settings: &EffectiveSettings,
    ) -> Result<Self> {
        let tz: Tz = settings.timezone.parse().map_err(|e| {
            AppError::config(format!("invalid timezone '{}': {e}", settings.timezone))
        })?;
        let scheduler = JobScheduler::new().await?;

        for (label, expr) in [
            ("morning", &settings.cron_morning),
            ("evening", &settings.cron_evening),
        ] {
            let cron = normalize_cron(expr)?;
            let controller = Arc::clone(&controller);
            let job = Job::new_async_tz(cron.as_str(), tz, move |_id, _scheduler| {
                let controller = Arc::clone(&controller);
                Box::pin(async move {
                    log::info!("Scheduled {} run starting", label);
                    match controller.run_and_dispatch().await {
                        Ok(RunOutcome::Skipped) => {
                            log::info!("Scheduled {} run skipped: a run is in progress", label)
                        }
                        Ok(RunOutcome::Completed(_)) => {}
                        Err(e) => log::error!("Scheduled {} run failed: {}", label, e),
                    }
                })
            })?;
            scheduler.add(job).await?;
        }

        let weekly = normalize_cron(&settings.cron_weekly)?;
        let job = Job::new_async_tz(weekly.as_str(), tz, move |_id, _scheduler| {
            let digest = Arc::clone(&digest);
            Box::pin(async move {
                log::info!("Weekly digest starting");
                if let Err(e) = digest.send(Utc::now()).await {
                    log::error!("Weekly digest failed: {}", e);
                }
            })
        })?;
        scheduler.add(job).await?;

        scheduler.start().await?;
        log::info!(
            "Scheduled: morning={}, evening={}, weekly={} ({})",
            settings.cron_morning,
            settings.cron_evening,
            settings.cron_weekly,
            settings.timezone
        );
        Ok(Self { inner: scheduler })
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, NewSubject, RulingKind, ScrapedHearing, ScrapedRuling};
    use crate::services::CourtSource;
    use crate::storage::Database;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Blocks every hearing fetch until released.
    struct Gate {
        release: Notify,
    }

    #[async_trait]
    impl CourtSource for Gate {
        async fn fetch_hearings(
            &self,
            _subject: &MonitoredSubject,
            _court_code: &str,
        ) -> Result<Vec<ScrapedHearing>> {
            self.release.notified().await;
            Ok(Vec::new())
        }

        async fn fetch_rulings(
            &self,
            _subject: &MonitoredSubject,
            _court_code: &str,
            _kind: RulingKind,
        ) -> Result<Vec<ScrapedRuling>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("0 7 * * *").unwrap(), "0 0 7 * * *");
        assert_eq!(normalize_cron(" 0 0 19 * * * ").unwrap(), "0 0 19 * * *");
        assert!(normalize_cron("* * *").is_err());
    }

    #[tokio::test]
    async fn test_back_to_back_triggers() {
        let db = Database::open_in_memory().unwrap();
        let mut subject = NewSubject::named("Popescu Ion");
        subject.courts = vec!["jc".into()];
        db.create_subject(&subject, Utc::now()).unwrap();

        let gate = Arc::new(Gate {
            release: Notify::new(),
        });
        let orchestrator = Orchestrator::new(db, gate.clone(), &Config::default())
            .with_delay(Duration::ZERO);
        let controller = RunController::new(orchestrator, Dispatcher::new());

        assert_eq!(controller.trigger_manual(), TriggerOutcome::Started);
        assert_eq!(controller.trigger_manual(), TriggerOutcome::Conflict);
        assert!(controller.is_running());

        gate.release.notify_one();
        for _ in 0..100 {
            if !controller.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!controller.is_running());
        assert_eq!(controller.trigger_manual(), TriggerOutcome::Started);
        gate.release.notify_one();
    }
}
