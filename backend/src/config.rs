use std::fmt::Display;
use std::str::FromStr;
use shuttle_runtime::SecretStore;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Exact origin allowed by CORS; localhost origins are allowed when unset.
    pub allowed_origin: Option<String>,
    pub vote_limit: u32,
    pub vote_window_minutes: i64,
    pub post_limit: u32,
    pub post_window_minutes: i64,
    pub max_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_origin: None,
            vote_limit: 30,
            vote_window_minutes: 1,
            post_limit: 5,
            post_window_minutes: 10,
            max_page_size: shared::MAX_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_secrets(secrets: &SecretStore) -> Self {
        Self::from_lookup(|key| secrets.get(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let config = Self {
            allowed_origin: lookup("ALLOWED_ORIGIN").filter(|o| !o.trim().is_empty()),
            vote_limit: parse_or(&lookup, "VOTE_RATE_LIMIT", defaults.vote_limit),
            vote_window_minutes: defaults.vote_window_minutes,
            post_limit: parse_or(&lookup, "POST_RATE_LIMIT", defaults.post_limit),
            post_window_minutes: defaults.post_window_minutes,
            max_page_size: parse_or(&lookup, "MAX_PAGE_SIZE", defaults.max_page_size).max(1),
        };
        info!(
            "⚙️ Config: votes {}/{}m, posts {}/{}m, page size <= {}",
            config.vote_limit, config.vote_window_minutes,
            config.post_limit, config.post_window_minutes,
            config.max_page_size
        );
        config
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default {default}");
            default
        }),
    }
}
