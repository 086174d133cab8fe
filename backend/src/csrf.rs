use std::collections::HashSet;
use std::sync::Mutex;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, error};
use crate::error::ApiError;

const MAX_TOKENS: usize = 10000;

/// One-time tokens handed to form pages and consumed on submit.
pub struct CsrfGuard {
    tokens: Mutex<HashSet<String>>,
    rng: SystemRandom,
}

impl Default for CsrfGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrfGuard {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashSet::new()),
            rng: SystemRandom::new(),
        }
    }

    pub fn generate_token(&self) -> Result<String, ApiError> {
        let mut bytes = [0u8; 32];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| ApiError::Internal("Failed to generate CSRF token".into()))?;
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let mut tokens = self.tokens.lock().map_err(|_| {
            error!("Failed to acquire lock for token storage");
            ApiError::Internal("CSRF token storage unavailable".into())
        })?;
        if tokens.len() >= MAX_TOKENS {
            tokens.clear();
        }
        tokens.insert(token.clone());
        debug!("Generated new CSRF token");
        Ok(token)
    }

    /// Consumes `token`. An unknown or reused token is answered with a fresh one.
    pub fn verify_token(&self, token: &str) -> Result<(), ApiError> {
        let removed = self
            .tokens
            .lock()
            .map_err(|_| ApiError::Internal("CSRF token storage unavailable".into()))?
            .remove(token);

        if !removed {
            debug!("CSRF token validation failed. Token not found or already used.");
            return Err(ApiError::CsrfExpired(self.generate_token()?));
        }
        debug!("CSRF token validated successfully");
        Ok(())
    }
}
