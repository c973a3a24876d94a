use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// GitHub API quota snapshot returned alongside queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub cost: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimit {
    /// Time left before the quota resets, `None` while requests remain.
    pub fn wait_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining > 0 {
            return None;
        }
        Some((self.reset_at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Logs current usage and waits for the reset when the quota is exhausted.
    pub async fn show(&self) {
        debug!(
            "GitHub API credit used {}, remaining {} (reset at {})",
            self.cost, self.remaining, self.reset_at
        );
        self.pause().await;
    }

    /// Waits until `reset_at` when no request remains.
    pub async fn pause(&self) {
        if let Some(wait) = self.wait_duration(Utc::now()) {
            warn!(
                "GitHub API rate limit reached, on hold for {}s until {}",
                wait.as_secs(),
                self.reset_at
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn rate_limit(remaining: i64, reset_in: chrono::Duration) -> RateLimit {
        RateLimit {
            cost: 1,
            remaining,
            reset_at: Utc::now() + reset_in,
        }
    }

    #[test]
    fn test_wait_duration() {
        let now = Utc::now();
        let exhausted = RateLimit {
            cost: 1,
            remaining: 0,
            reset_at: now + chrono::Duration::seconds(30),
        };
        assert_eq!(exhausted.wait_duration(now), Some(Duration::from_secs(30)));

        let available = RateLimit {
            remaining: 10,
            ..exhausted.clone()
        };
        assert_eq!(available.wait_duration(now), None);

        let already_reset = RateLimit {
            reset_at: now - chrono::Duration::seconds(5),
            ..exhausted
        };
        assert_eq!(already_reset.wait_duration(now), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_show_blocks_until_reset() {
        let limit = rate_limit(0, chrono::Duration::seconds(2));
        let start = Instant::now();
        limit.show().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(1500), "returned after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "returned after {elapsed:?}");
    }

    #[tokio::test]
    async fn test_show_returns_immediately_with_remaining_quota() {
        let limit = rate_limit(4999, chrono::Duration::seconds(3600));
        let start = Instant::now();
        limit.show().await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_deserializes_github_payload() {
        let limit: RateLimit = serde_json::from_str(
            r#"{"cost":1,"remaining":4990,"resetAt":"2026-10-17T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(limit.remaining, 4990);
        assert_eq!(limit.reset_at.to_rfc3339(), "2026-10-17T10:00:00+00:00");
    }
}
