//! Run pipeline: identity/diff engine, single-flight guard and orchestrator.
//!
//! - `Orchestrator::run`: poll every active subject's courts once
//! - `diff::apply_hearing` / `diff::apply_ruling`: reconcile one scraped row

pub mod diff;
pub mod guard;
pub mod orchestrator;
pub mod report;

pub use diff::{HearingOutcome, apply_hearing, apply_ruling, hearing_identity, ruling_identity};
pub use guard::{RunGuard, RunPermit, RunPhase, RunProgress};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use report::{RequestError, RunReport, Totals};
