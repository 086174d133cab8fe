use std::collections::HashMap;
use std::sync::Mutex;
use time::{OffsetDateTime, Duration};
use tracing::{warn, error};
use crate::error::ApiError;

#[derive(Debug)]
struct RateLimit {
    attempts: u32,
    first_attempt: OffsetDateTime,
}

#[derive(Debug)]
pub struct RateLimiter {
    limits: Mutex<HashMap<String, RateLimit>>,
    max_attempts: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(5, 15)
    }
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_minutes: i64) -> Self {
        Self {
            limits: Mutex::new(HashMap::new()),
            max_attempts,
            window: Duration::minutes(window_minutes),
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> Result<(), ApiError> {
        self.check_at(key, OffsetDateTime::now_utc())
    }

    pub(crate) fn check_at(&self, key: &str, now: OffsetDateTime) -> Result<(), ApiError> {
        let result = {
            let mut limits = match self.limits.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Failed to acquire rate limit lock: {}", e);
                    return Err(ApiError::Internal("Internal rate limit error".into()));
                }
            };

            limits.retain(|_, limit| now - limit.first_attempt <= self.window * 2);

            match limits.get_mut(key) {
                Some(limit) if now - limit.first_attempt > self.window => {
                    *limit = RateLimit { attempts: 1, first_attempt: now };
                    Ok(())
                }
                Some(limit) if limit.attempts >= self.max_attempts => {
                    let minutes_to_wait = (limit.first_attempt + self.window - now).whole_minutes();
                    Err(ApiError::RateLimited(format!(
                        "Rate limit exceeded. Please try again in {} minutes.",
                        minutes_to_wait.max(1)
                    )))
                }
                Some(limit) => {
                    limit.attempts += 1;
                    Ok(())
                }
                None => {
                    limits.insert(key.to_string(), RateLimit { attempts: 1, first_attempt: now });
                    Ok(())
                }
            }
        };

        if let Err(ref e) = result {
            warn!("Rate limit triggered for key {}: {}", key, e);
        }

        result
    }
}
