//! Session verification backed by a static token table.

use std::collections::HashMap;

use tracing::debug;

use crate::config::AuthConfig;
use crate::interfaces::{AuthError, SessionVerifier};
use crate::model::Owner;

/// Maps bearer tokens to owners. Used in standalone mode and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionVerifier {
    tokens: HashMap<String, Owner>,
}

impl StaticSessionVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, owner: Owner) -> Self {
        self.tokens.insert(token.into(), owner);
        self
    }
}

impl From<&AuthConfig> for StaticSessionVerifier {
    fn from(config: &AuthConfig) -> Self {
        Self {
            tokens: config
                .tokens
                .iter()
                .map(|(token, owner)| (token.clone(), Owner::new(owner.as_str())))
                .collect(),
        }
    }
}

impl SessionVerifier for StaticSessionVerifier {
    fn verify(&self, token: &str) -> Result<Owner, AuthError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(AuthError::Missing);
        }
        match self.tokens.get(token) {
            Some(owner) => Ok(owner.clone()),
            None => {
                debug!("Unknown session token");
                Err(AuthError::Invalid)
            }
        }
    }
}
