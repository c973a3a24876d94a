use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment variables searched, in order, when no token is configured.
pub const TOKEN_ENV_VARS: [&str; 2] = ["BUMPLINE_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// API token. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First non empty token found in [`TOKEN_ENV_VARS`].
    pub fn from_env() -> Option<Self> {
        TOKEN_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
            .map(|value| Token(value.trim().to_string()))
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Token(<empty>)")
        } else {
            f.write_str("Token(<redacted>)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_leaks_token() {
        let token = Token::from("ghp_secret");
        assert_eq!(format!("{token:?}"), "Token(<redacted>)");
        assert_eq!(token.as_str(), "ghp_secret");
    }

    #[test]
    fn test_deserializes_from_plain_string() {
        let token: Token = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(token.as_str(), "abc");
    }
}
