// src/lib.rs

//! Court monitor library
//!
//! Polls court portals for hearings and rulings of monitored subjects,
//! keeps them in SQLite, and notifies through the Telegram bot and an
//! optional webhook.

#[cfg(feature = "server")]
pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod utils;
