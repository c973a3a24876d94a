use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BumplineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacer {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindSubMatch {
    pub pattern: String,
    /// Capture group to keep, 0 being the whole match.
    #[serde(default)]
    pub captureindex: usize,
}

/// One transformation step applied to a source value.
///
/// Every configured operation of a step is applied, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transformer {
    pub addprefix: String,
    pub addsuffix: String,
    pub trimprefix: String,
    pub trimsuffix: String,
    pub replacers: Vec<Replacer>,
    pub find: String,
    pub findsubmatch: Option<FindSubMatch>,
    pub quote: bool,
    pub unquote: bool,
}

impl Transformer {
    pub fn validate(&self) -> Result<()> {
        if !self.find.is_empty() {
            Regex::new(&self.find)?;
        }
        if let Some(sub) = &self.findsubmatch {
            if sub.pattern.is_empty() {
                return Err(BumplineError::Transform(
                    "findsubmatch requires a pattern".to_string(),
                ));
            }
            Regex::new(&sub.pattern)?;
        }
        if self.quote && self.unquote {
            return Err(BumplineError::Transform(
                "quote and unquote are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply(&self, input: &str) -> Result<String> {
        if input.is_empty() {
            return Err(BumplineError::Transform(
                "transformer input is empty".to_string(),
            ));
        }

        let mut output = input.to_string();

        if !self.addprefix.is_empty() {
            output = format!("{}{}", self.addprefix, output);
        }
        if !self.addsuffix.is_empty() {
            output.push_str(&self.addsuffix);
        }
        if !self.trimprefix.is_empty() {
            if let Some(stripped) = output.strip_prefix(self.trimprefix.as_str()) {
                output = stripped.to_string();
            }
        }
        if !self.trimsuffix.is_empty() {
            if let Some(stripped) = output.strip_suffix(self.trimsuffix.as_str()) {
                output = stripped.to_string();
            }
        }
        for replacer in &self.replacers {
            output = output.replace(&replacer.from, &replacer.to);
        }
        if !self.find.is_empty() {
            let re = Regex::new(&self.find)?;
            output = re
                .find(&output)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
        }
        if let Some(sub) = &self.findsubmatch {
            let re = Regex::new(&sub.pattern)?;
            output = re
                .captures(&output)
                .and_then(|caps| caps.get(sub.captureindex))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
        }
        if self.quote {
            output = format!("{output:?}");
        }
        if self.unquote {
            output = output.trim_matches('"').to_string();
        }

        Ok(output)
    }
}

/// Ordered list of transformers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transformers(pub Vec<Transformer>);

impl Transformers {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.0.iter().try_for_each(Transformer::validate)
    }

    /// Validates every step first so a bad step never leaves a half transformed value.
    pub fn apply(&self, input: &str) -> Result<String> {
        self.validate()?;

        let mut output = input.to_string();
        for transformer in &self.0 {
            let previous = output;
            output = transformer.apply(&previous)?;
            info!("Result correctly transformed from {previous:?} to {output:?}");
        }
        Ok(output)
    }
}
