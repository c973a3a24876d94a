use log::warn;

use super::queries::{
    auto_merge_allowed, repository_id, team_id, user_id, AutoMergeAllowed, RepositoryId, TeamId,
    UserId,
};
use super::GitHubScm;
use crate::error::{BumplineError, Result};

/// A reviewer entry resolved to a GitHub node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reviewer {
    User(String),
    Team(String),
}

/// `org/team` when the entry contains exactly one `/`, a login otherwise.
pub fn parse_reviewer(entry: &str) -> (Option<&str>, &str) {
    let entry = entry.trim();
    if entry.matches('/').count() == 1 {
        if let Some((org, team)) = entry.split_once('/') {
            return (Some(org), team);
        }
    }
    (None, entry)
}

impl GitHubScm {
    pub async fn repository_id(&self) -> Result<String> {
        self.client()
            .execute::<RepositoryId>(repository_id::Variables {
                owner: self.owner().to_string(),
                name: self.repository().to_string(),
            })
            .await?
            .repository
            .map(|repository| repository.id)
            .ok_or_else(|| {
                BumplineError::Config(format!(
                    "repository {}/{} not found",
                    self.owner(),
                    self.repository()
                ))
            })
    }

    pub async fn auto_merge_allowed(&self) -> Result<bool> {
        Ok(self
            .client()
            .execute::<AutoMergeAllowed>(auto_merge_allowed::Variables {
                owner: self.owner().to_string(),
                name: self.repository().to_string(),
            })
            .await?
            .repository
            .map(|repository| repository.auto_merge_allowed)
            .unwrap_or(false))
    }

    pub async fn user_id(&self, login: &str) -> Result<Option<String>> {
        let data = self
            .client()
            .execute::<UserId>(user_id::Variables {
                login: login.to_string(),
            })
            .await?;
        Ok(data.user.map(|user| user.id))
    }

    pub async fn team_id(&self, org: &str, slug: &str) -> Result<Option<String>> {
        let data = self
            .client()
            .execute::<TeamId>(team_id::Variables {
                org: org.to_string(),
                slug: slug.to_string(),
            })
            .await?;
        Ok(data
            .organization
            .and_then(|organization| organization.team)
            .map(|team| team.id))
    }

    /// Resolves a reviewer entry, `None` when GitHub does not know it.
    ///
    /// Only a final rate-limit failure is an error, any other lookup failure
    /// makes the entry unresolvable.
    pub async fn resolve_reviewer(&self, entry: &str) -> Result<Option<Reviewer>> {
        let lookup = match parse_reviewer(entry) {
            (Some(org), team) => self
                .team_id(org, team)
                .await
                .map(|id| id.map(Reviewer::Team)),
            (None, login) => self.user_id(login).await.map(|id| id.map(Reviewer::User)),
        };

        match lookup {
            Ok(reviewer) => Ok(reviewer),
            Err(BumplineError::RateLimitFinalAttempt) => Err(BumplineError::RateLimitFinalAttempt),
            Err(e) => {
                warn!("failed to resolve reviewer {entry:?}: {e}");
                Ok(None)
            }
        }
    }
}
