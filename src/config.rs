//! Endpoint configuration, read from the environment (and `.env`).

use anyhow::Context;

use crate::rooms::DEFAULT_BACKLOG_LIMIT;

pub const API_URL: &str = "ROOMSYNC_API_URL";
pub const WS_URL: &str = "ROOMSYNC_WS_URL";
pub const BACKLOG_LIMIT: &str = "ROOMSYNC_BACKLOG_LIMIT";

const DEFAULT_API_URL: &str = "http://localhost:8080/api";
const DEFAULT_WS_URL: &str = "ws://localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub ws_url: String,
    pub backlog_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            backlog_limit: DEFAULT_BACKLOG_LIMIT,
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the `ROOMSYNC_*` variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let backlog_limit = match lookup(BACKLOG_LIMIT) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| {
                    format!("{BACKLOG_LIMIT} must be a positive integer, got {raw:?}")
                })?,
            None => defaults.backlog_limit,
        };

        Ok(Self {
            api_url: lookup(API_URL).unwrap_or(defaults.api_url),
            ws_url: lookup(WS_URL).unwrap_or(defaults.ws_url),
            backlog_limit,
        })
    }
}
