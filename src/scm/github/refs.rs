use super::pagination::Pagination;
use super::queries::repository_refs::{self, OrderDirection, RefOrder, RefOrderField};
use super::queries::RepositoryRefs;
use super::GitHubScm;
use crate::error::Result;

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

impl GitHubScm {
    async fn search_refs(&self, prefix: &str, order_by: Option<RefOrder>) -> Result<Vec<String>> {
        let owner = self.owner().to_string();
        let name = self.repository().to_string();

        self.client()
            .paginate::<RepositoryRefs, _, _, _>(
                Pagination::BACKWARD_REVERSED,
                |before| repository_refs::Variables {
                    owner: owner.clone(),
                    name: name.clone(),
                    ref_prefix: prefix.to_string(),
                    before,
                    order_by: order_by.clone(),
                },
                repository_refs::ResponseData::into_page,
            )
            .await
    }

    /// Every branch of the repository.
    pub async fn search_branches(&self) -> Result<Vec<String>> {
        self.search_refs(BRANCH_PREFIX, None).await
    }

    /// Every tag of the repository, ordered by tag commit date.
    pub async fn search_tags(&self) -> Result<Vec<String>> {
        let order = RefOrder {
            direction: OrderDirection::DESC,
            field: RefOrderField::TAG_COMMIT_DATE,
        };
        self.search_refs(TAG_PREFIX, Some(order)).await
    }
}
