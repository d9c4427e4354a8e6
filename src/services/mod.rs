//! Services for talking to the court portals.

pub mod court;

pub use court::{CourtClient, CourtSource, parse_hearings, parse_rulings};
