use serde::{Deserialize, Serialize};

use crate::error::{BumplineError, Result};

const MAX_TITLE_LENGTH: usize = 72;
const DEFAULT_TYPE: &str = "chore";
const CREDIT: &str = "Made with ❤️️ by bumpline";

/// Conventional commit settings.
///
/// See <https://www.conventionalcommits.org/en/v1.0.0/#summary>
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitMessage {
    /// Commit type, defaults to `chore`.
    #[serde(rename = "type")]
    pub kind: String,
    pub scope: String,
    pub footers: String,
    /// Overrides the body derived from the raw message.
    pub body: String,
    pub hidecredit: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedMessage {
    title: String,
    body: String,
}

impl CommitMessage {
    fn kind(&self) -> &str {
        if self.kind.is_empty() {
            DEFAULT_TYPE
        } else {
            &self.kind
        }
    }

    /// Formats a raw change message into a conventional commit message.
    pub fn generate(&self, raw: &str) -> Result<String> {
        let parsed = self.parse_message(raw)?;

        let mut message = self.kind().to_string();
        if !self.scope.is_empty() {
            message.push_str(&format!("({})", self.scope));
        }
        message.push_str(": ");
        message.push_str(&parsed.title);

        if !parsed.body.is_empty() {
            message.push_str("\n\n");
            message.push_str(&parsed.body);
        }
        if !self.hidecredit {
            message.push_str("\n\n");
            message.push_str(CREDIT);
        }
        if !self.footers.is_empty() {
            message.push_str("\n\n");
            message.push_str(&self.footers);
        }

        Ok(message)
    }

    fn parse_message(&self, message: &str) -> Result<ParsedMessage> {
        if message.is_empty() {
            return Err(BumplineError::EmptyCommitMessage);
        }

        // `type(scope): ` counts against the title length
        let mut placeholders = self.kind().chars().count() + 2;
        if !self.scope.is_empty() {
            placeholders += self.scope.chars().count() + 2;
        }
        let max_title = MAX_TITLE_LENGTH.saturating_sub(placeholders).max(4);

        let mut lines = message.split('\n');
        let first = lines.next().unwrap_or_default();

        let mut body = String::new();
        let title = if first.chars().count() > max_title {
            let split_at = first
                .char_indices()
                .nth(max_title - 3)
                .map(|(i, _)| i)
                .unwrap_or(first.len());
            body.push_str("... ");
            body.push_str(&first[split_at..]);
            body.push('\n');
            format!("{}...", &first[..split_at])
        } else {
            first.to_string()
        };

        let rest: Vec<&str> = lines.collect();
        if !rest.is_empty() {
            body.push_str(&rest.join("\n"));
        }
        let mut body = body.trim_end_matches('\n').to_string();

        if !self.body.is_empty() {
            body = self.body.clone();
        }

        Ok(ParsedMessage { title, body })
    }
}
