//! Core domain + application logic for the Concierge assistant bot.
//!
//! This crate is intentionally framework-agnostic. Telegram / Gemini /
//! DuckDuckGo / SQLite live behind ports (traits) implemented in adapter
//! crates.

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod event;
pub mod files;
pub mod limits;
pub mod logging;
pub mod ports;
pub mod registration;
pub mod utils;

pub use errors::{Error, Result};
