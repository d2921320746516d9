//! Bearer token resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME (`/backend/token_env`,
//!   default `PCM_API_TOKEN`).
//! - Binaries call [`resolve_token`] once at startup and pass the result to
//!   the backend constructor; nothing else reads the environment for it.
//! - A missing token is not an error. Requests go out unauthenticated and
//!   the backend answers 401, which is surfaced to the user.
//! - `Debug` redacts the value; messages name the variable, never the value.

use serde_json::Value;

use crate::DEFAULT_TOKEN_ENV;

#[derive(Clone)]
pub struct ResolvedToken {
    /// Env var the token was read from.
    pub env_var: String,
    pub token: Option<String>,
}

impl ResolvedToken {
    pub fn is_present(&self) -> bool {
        self.token.is_some()
    }
}

impl std::fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("env_var", &self.env_var)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Read the env var named at `/backend/token_env`. Blank values count as
/// unset.
pub fn resolve_token(config_json: &Value) -> ResolvedToken {
    let env_var = config_json
        .pointer("/backend/token_env")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_TOKEN_ENV)
        .to_string();
    let token = match std::env::var(&env_var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    };
    ResolvedToken { env_var, token }
}
