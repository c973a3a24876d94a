use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::pagination::Pagination;
use super::queries::{pull_request_labels, repository_labels, PullRequestLabels, RepositoryLabels};
use super::GitHubScm;
use crate::error::Result;

/// Label as known by GitHub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryLabel {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Union by name of two label sets.
///
/// Every label of `assigned` is kept as is, followed by the labels of
/// `configured` whose name is not already present.
pub fn merge_labels(
    configured: &[RepositoryLabel],
    assigned: &[RepositoryLabel],
) -> Vec<RepositoryLabel> {
    let mut seen = HashSet::new();
    assigned
        .iter()
        .chain(configured)
        .filter(|label| seen.insert(label.name.as_str()))
        .cloned()
        .collect()
}

/// Repository labels whose name appears in `names`.
pub fn matching_labels(names: &[String], repository: &[RepositoryLabel]) -> Vec<RepositoryLabel> {
    names
        .iter()
        .filter_map(|name| repository.iter().find(|label| &label.name == name))
        .cloned()
        .collect()
}

impl GitHubScm {
    /// Every label defined on the repository.
    pub async fn repository_labels(&self) -> Result<Vec<RepositoryLabel>> {
        let owner = self.owner().to_string();
        let name = self.repository().to_string();

        self.client()
            .paginate::<RepositoryLabels, _, _, _>(
                Pagination::BACKWARD,
                |before| repository_labels::Variables {
                    owner: owner.clone(),
                    name: name.clone(),
                    before,
                },
                repository_labels::ResponseData::into_page,
            )
            .await
    }

    /// Labels currently assigned to pull request `number`.
    pub async fn pull_request_labels(&self, number: i64) -> Result<Vec<RepositoryLabel>> {
        let owner = self.owner().to_string();
        let name = self.repository().to_string();

        self.client()
            .paginate::<PullRequestLabels, _, _, _>(
                Pagination::BACKWARD,
                |before| pull_request_labels::Variables {
                    owner: owner.clone(),
                    name: name.clone(),
                    number,
                    before,
                },
                pull_request_labels::ResponseData::into_page,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(id: &str, name: &str) -> RepositoryLabel {
        RepositoryLabel {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_merge_labels_is_union_by_name() {
        let configured = vec![label("L1", "dependencies"), label("L2", "bumpline")];
        let assigned = vec![label("L9", "bumpline"), label("L3", "needs-review")];

        let merged = merge_labels(&configured, &assigned);
        let names: Vec<&str> = merged.iter().map(|l| l.name.as_str()).collect();

        assert_eq!(names, vec!["bumpline", "needs-review", "dependencies"]);
        // assigned labels are kept unchanged
        assert!(merged.contains(&label("L9", "bumpline")));
        assert!(merged.contains(&label("L3", "needs-review")));
    }

    #[test]
    fn test_merge_labels_without_duplicates() {
        let configured = vec![label("L1", "a"), label("L1", "a")];
        let merged = merge_labels(&configured, &[]);
        assert_eq!(merged, vec![label("L1", "a")]);
    }

    #[test]
    fn test_merge_labels_empty_inputs() {
        assert!(merge_labels(&[], &[]).is_empty());
        let assigned = vec![label("L3", "keep")];
        assert_eq!(merge_labels(&[], &assigned), assigned);
    }

    #[test]
    fn test_matching_labels_ignores_unknown_names() {
        let repository = vec![label("L1", "dependencies"), label("L2", "ci")];
        let names = vec!["ci".to_string(), "missing".to_string()];

        assert_eq!(matching_labels(&names, &repository), vec![label("L2", "ci")]);
    }
}
