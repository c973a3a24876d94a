use serde::{Deserialize, Serialize};

use super::client::GitHubClient;
use super::pagination::Pagination;
use super::queries::{search_repositories, SearchRepositories};
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchRef {
    pub name: String,
}

/// Repository returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryNode {
    pub name_with_owner: String,
    pub url: String,
    pub is_archived: bool,
    pub default_branch_ref: Option<BranchRef>,
}

impl RepositoryNode {
    pub fn default_branch(&self) -> Option<&str> {
        self.default_branch_ref.as_ref().map(|b| b.name.as_str())
    }
}

impl GitHubClient {
    /// Repositories matching a GitHub search query, e.g. `org:bumpline topic:go`.
    pub async fn search_repositories(&self, query: &str) -> Result<Vec<RepositoryNode>> {
        self.paginate::<SearchRepositories, _, _, _>(
            Pagination::FORWARD,
            |after| search_repositories::Variables {
                query: query.to_string(),
                after,
            },
            search_repositories::ResponseData::into_page,
        )
        .await
    }
}
