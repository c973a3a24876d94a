use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::pagination::Pagination;
use super::queries::releases::{self, OrderDirection, ReleaseOrder, ReleaseOrderField};
use super::queries::{changelog, Changelog, Releases};
use super::GitHubScm;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagCommit {
    pub oid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseNode {
    pub name: String,
    pub tag_name: String,
    pub tag_commit: Option<TagCommit>,
    pub is_draft: bool,
    pub is_latest: bool,
    pub is_prerelease: bool,
}

/// Release kinds to keep. `latest` takes precedence over every other flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseType {
    pub draft: bool,
    pub prerelease: bool,
    pub release: bool,
    pub latest: bool,
}

impl Default for ReleaseType {
    fn default() -> Self {
        Self {
            draft: false,
            prerelease: false,
            release: true,
            latest: false,
        }
    }
}

impl ReleaseType {
    pub fn matches(&self, node: &ReleaseNode) -> bool {
        if self.latest {
            return node.is_latest;
        }
        if node.is_draft {
            self.draft
        } else if node.is_prerelease {
            self.prerelease
        } else {
            self.release
        }
    }
}

/// Release descriptions fetched during one run, keyed by owner, repository and tag.
#[derive(Debug, Default)]
pub struct ChangelogCache {
    entries: HashMap<(String, String, String), String>,
}

impl ChangelogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: &str, repository: &str, tag: &str) -> Option<&str> {
        self.entries
            .get(&(owner.to_string(), repository.to_string(), tag.to_string()))
            .map(String::as_str)
    }

    pub fn insert(&mut self, owner: &str, repository: &str, tag: &str, changelog: String) {
        self.entries.insert(
            (owner.to_string(), repository.to_string(), tag.to_string()),
            changelog,
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GitHubScm {
    /// Releases matching `release_type`, oldest first.
    pub async fn search_releases(&self, release_type: ReleaseType) -> Result<Vec<ReleaseNode>> {
        let owner = self.owner().to_string();
        let name = self.repository().to_string();

        let releases = self
            .client()
            .paginate::<Releases, _, _, _>(
                Pagination::BACKWARD_REVERSED,
                |before| releases::Variables {
                    owner: owner.clone(),
                    name: name.clone(),
                    before,
                    order_by: Some(ReleaseOrder {
                        direction: OrderDirection::DESC,
                        field: ReleaseOrderField::CREATED_AT,
                    }),
                },
                releases::ResponseData::into_page,
            )
            .await?;

        let releases: Vec<ReleaseNode> = releases
            .into_iter()
            .filter(|node| release_type.matches(node))
            .collect();

        debug!("{} releases found", releases.len());
        Ok(releases)
    }

    /// Release description published for `tag`, served from `cache` when
    /// already fetched during this run.
    pub async fn changelog(&self, tag: &str, cache: &mut ChangelogCache) -> Result<String> {
        if let Some(changelog) = cache.get(self.owner(), self.repository(), tag) {
            debug!("changelog for {tag:?} served from cache");
            return Ok(changelog.to_string());
        }

        let data = self
            .client()
            .execute::<Changelog>(changelog::Variables {
                owner: self.owner().to_string(),
                name: self.repository().to_string(),
                tag_name: tag.to_string(),
            })
            .await?;

        let changelog = match data.repository.and_then(|repository| repository.release) {
            Some(release) => {
                let published = release
                    .published_at
                    .map(|date| date.to_string())
                    .unwrap_or_else(|| "an unknown date".to_string());
                format!(
                    "Release published on the {published} at the url {}\n\n{}",
                    release.url,
                    release.description.unwrap_or_default()
                )
            }
            None => format!(
                "no GitHub Release found for {tag} on {:?}",
                self.web_url()
            ),
        };

        cache.insert(self.owner(), self.repository(), tag, changelog.clone());
        Ok(changelog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(draft: bool, prerelease: bool, latest: bool) -> ReleaseNode {
        ReleaseNode {
            name: "v1".to_string(),
            tag_name: "v1".to_string(),
            tag_commit: None,
            is_draft: draft,
            is_latest: latest,
            is_prerelease: prerelease,
        }
    }

    #[test]
    fn test_release_type_defaults_to_published_releases() {
        let kind = ReleaseType::default();
        assert!(kind.matches(&node(false, false, false)));
        assert!(!kind.matches(&node(true, false, false)));
        assert!(!kind.matches(&node(false, true, false)));
    }

    #[test]
    fn test_release_type_latest_only() {
        let kind = ReleaseType {
            latest: true,
            ..Default::default()
        };
        assert!(kind.matches(&node(false, false, true)));
        assert!(!kind.matches(&node(false, false, false)));
    }

    #[test]
    fn test_release_type_drafts_and_prereleases() {
        let kind = ReleaseType {
            draft: true,
            prerelease: true,
            release: false,
            latest: false,
        };
        assert!(kind.matches(&node(true, false, false)));
        assert!(kind.matches(&node(false, true, false)));
        assert!(!kind.matches(&node(false, false, false)));
    }

    #[test]
    fn test_changelog_cache_is_keyed_by_repository_and_tag() {
        let mut cache = ChangelogCache::new();
        cache.insert("org", "repo", "v1.0.0", "notes".to_string());

        assert_eq!(cache.get("org", "repo", "v1.0.0"), Some("notes"));
        assert_eq!(cache.get("org", "other", "v1.0.0"), None);
        assert_eq!(cache.get("org", "repo", "v1.0.1"), None);
        assert_eq!(cache.len(), 1);
    }
}
