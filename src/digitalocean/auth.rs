//! API token resolution
//!
//! DigitalOcean authenticates with a plain bearer token. The token is taken
//! from the module parameters when supplied, otherwise from the first
//! non-empty entry in a fixed list of environment variables.

use super::error::ErrorShape;

/// Environment variables consulted for the API token, in priority order.
pub const TOKEN_ENV_VARS: &[&str] = &[
    "DIGITALOCEAN_ACCESS_TOKEN",
    "DIGITALOCEAN_TOKEN",
    "DO_API_TOKEN",
    "DO_API_KEY",
    "DO_OAUTH_TOKEN",
    "OAUTH_TOKEN",
];

/// Resolve the API token from an explicit parameter or the environment.
pub fn resolve_token(param: Option<&str>) -> Result<String, ErrorShape> {
    if let Some(token) = param {
        if !looks_like_token(token) {
            return Err(ErrorShape::invalid_params(
                "token parameter is empty or contains whitespace",
            ));
        }
        return Ok(token.to_string());
    }

    token_from_lookup(|key| std::env::var(key).ok()).ok_or_else(|| {
        ErrorShape::invalid_params(format!(
            "no API token supplied; set the token parameter or one of: {}",
            TOKEN_ENV_VARS.join(", ")
        ))
    })
}

/// Walk the env-var priority list through an injected lookup.
///
/// Split out from [`resolve_token`] so the priority order is testable without
/// mutating the process environment.
pub fn token_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    for key in TOKEN_ENV_VARS {
        if let Some(value) = lookup(key) {
            if looks_like_token(&value) {
                return Some(value);
            }
            tracing::warn!("ignoring malformed token in {}", key);
        }
    }
    None
}

fn looks_like_token(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(char::is_whitespace)
}
