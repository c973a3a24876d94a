//! GraphQL operations sent to the GitHub v4 API.
//!
//! Documents live in `graphql/` and are checked against the vendored
//! `graphql/github_schema.graphql` at compile time. The generated response
//! types are turned into the crate's own types here, so the rest of the
//! GitHub module never touches generated modules directly.

use graphql_client::GraphQLQuery;
use serde::Serialize;

use super::labels::RepositoryLabel;
use super::pagination::{Page, PageInfo};
use super::pullrequest::PullRequestApi;
use super::ratelimit::RateLimit;
use super::release::{ReleaseNode, TagCommit};
use super::search::{BranchRef, RepositoryNode};

// Custom scalars of the GitHub schema.
type DateTime = chrono::DateTime<chrono::Utc>;
#[allow(clippy::upper_case_acronyms)]
type URI = String;
type GitObjectID = String;

/// Current quota, free of charge.
#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/rate_limit.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct RateLimitQuery;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/repository_id.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct RepositoryId;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/auto_merge_allowed.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct AutoMergeAllowed;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/user_id.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct UserId;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/team_id.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct TeamId;

/// Open pull request between two branches, at most one.
#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/find_pull_request.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct FindPullRequest;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/create_pull_request.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone",
    skip_serializing_none
)]
pub struct CreatePullRequest;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/update_pull_request.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone",
    skip_serializing_none
)]
pub struct UpdatePullRequest;

/// An absent merge method is left out of the input, GitHub then merges.
#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/enable_auto_merge.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone",
    skip_serializing_none
)]
pub struct EnableAutoMerge;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/add_comment.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone",
    skip_serializing_none
)]
pub struct AddComment;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/request_reviews.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone",
    skip_serializing_none
)]
pub struct RequestReviews;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/repository_labels.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct RepositoryLabels;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/pull_request_labels.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct PullRequestLabels;

/// Branches or tags depending on `refPrefix`.
#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/repository_refs.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct RepositoryRefs;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/releases.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct Releases;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/changelog.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct Changelog;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/github_schema.graphql",
    query_path = "graphql/search_repositories.graphql",
    response_derives = "Debug,PartialEq",
    variables_derives = "Debug,Clone"
)]
pub struct SearchRepositories;

/// Name of a generated enum value as sent on the wire.
fn enum_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(String::from))
        .unwrap_or_default()
}

fn total_count(count: i64) -> Option<usize> {
    usize::try_from(count).ok()
}

macro_rules! rate_limit_from {
    ($($generated:path),* $(,)?) => {
        $(impl From<$generated> for RateLimit {
            fn from(rate_limit: $generated) -> Self {
                RateLimit {
                    cost: rate_limit.cost,
                    remaining: rate_limit.remaining,
                    reset_at: rate_limit.reset_at,
                }
            }
        })*
    };
}

rate_limit_from!(
    rate_limit_query::RateLimitQueryRateLimit,
    repository_labels::RepositoryLabelsRateLimit,
    pull_request_labels::PullRequestLabelsRateLimit,
    repository_refs::RepositoryRefsRateLimit,
    releases::ReleasesRateLimit,
    search_repositories::SearchRepositoriesRateLimit,
);

macro_rules! page_info_from {
    ($($generated:path),* $(,)?) => {
        $(impl From<$generated> for PageInfo {
            fn from(info: $generated) -> Self {
                PageInfo {
                    has_next_page: info.has_next_page,
                    has_previous_page: info.has_previous_page,
                    start_cursor: info.start_cursor,
                    end_cursor: info.end_cursor,
                }
            }
        })*
    };
}

page_info_from!(
    repository_labels::RepositoryLabelsRepositoryLabelsPageInfo,
    pull_request_labels::PullRequestLabelsRepositoryPullRequestLabelsPageInfo,
    repository_refs::RepositoryRefsRepositoryRefsPageInfo,
    releases::ReleasesRepositoryReleasesPageInfo,
    search_repositories::SearchRepositoriesSearchPageInfo,
);

macro_rules! pull_request_from {
    ($($generated:path),* $(,)?) => {
        $(impl From<$generated> for PullRequestApi {
            fn from(pull_request: $generated) -> Self {
                PullRequestApi {
                    id: pull_request.id,
                    number: pull_request.number,
                    title: pull_request.title,
                    body: pull_request.body,
                    base_ref_name: pull_request.base_ref_name,
                    head_ref_name: pull_request.head_ref_name,
                    state: enum_name(&pull_request.state),
                    url: pull_request.url,
                }
            }
        })*
    };
}

pull_request_from!(
    find_pull_request::FindPullRequestRepositoryPullRequestsNodes,
    create_pull_request::CreatePullRequestCreatePullRequestPullRequest,
    update_pull_request::UpdatePullRequestUpdatePullRequestPullRequest,
);

macro_rules! label_from {
    ($($generated:path),* $(,)?) => {
        $(impl From<$generated> for RepositoryLabel {
            fn from(label: $generated) -> Self {
                RepositoryLabel {
                    id: label.id,
                    name: label.name,
                    description: label.description,
                }
            }
        })*
    };
}

label_from!(
    repository_labels::RepositoryLabelsRepositoryLabelsNodes,
    pull_request_labels::PullRequestLabelsRepositoryPullRequestLabelsNodes,
);

impl rate_limit_query::ResponseData {
    pub fn into_rate_limit(self) -> Option<RateLimit> {
        self.rate_limit.map(RateLimit::from)
    }
}

impl find_pull_request::ResponseData {
    /// The open pull request, if any.
    pub fn into_pull_request(self) -> Option<PullRequestApi> {
        self.repository?
            .pull_requests
            .nodes?
            .into_iter()
            .flatten()
            .next()
            .map(PullRequestApi::from)
    }
}

impl create_pull_request::ResponseData {
    pub fn into_pull_request(self) -> Option<PullRequestApi> {
        self.create_pull_request?
            .pull_request
            .map(PullRequestApi::from)
    }
}

impl update_pull_request::ResponseData {
    pub fn into_pull_request(self) -> Option<PullRequestApi> {
        self.update_pull_request?
            .pull_request
            .map(PullRequestApi::from)
    }
}

impl repository_labels::ResponseData {
    pub fn into_page(self) -> Page<RepositoryLabel> {
        let rate_limit = self.rate_limit.map(RateLimit::from);
        match self.repository.and_then(|repository| repository.labels) {
            Some(labels) => Page::new(
                labels.nodes,
                labels.page_info.into(),
                total_count(labels.total_count),
                rate_limit,
            ),
            None => Page::empty(),
        }
    }
}

impl pull_request_labels::ResponseData {
    pub fn into_page(self) -> Page<RepositoryLabel> {
        let rate_limit = self.rate_limit.map(RateLimit::from);
        match self
            .repository
            .and_then(|repository| repository.pull_request)
            .and_then(|pull_request| pull_request.labels)
        {
            Some(labels) => Page::new(
                labels.nodes,
                labels.page_info.into(),
                total_count(labels.total_count),
                rate_limit,
            ),
            None => Page::empty(),
        }
    }
}

impl repository_refs::ResponseData {
    /// Ref names of this page.
    pub fn into_page(self) -> Page<String> {
        let rate_limit = self.rate_limit.map(RateLimit::from);
        match self.repository.and_then(|repository| repository.refs) {
            Some(refs) => Page::new(
                refs.nodes
                    .map(|nodes| nodes.into_iter().map(|node| node.map(|r| r.name)).collect()),
                refs.page_info.into(),
                total_count(refs.total_count),
                rate_limit,
            ),
            None => Page::empty(),
        }
    }
}

impl From<releases::ReleasesRepositoryReleasesNodes> for ReleaseNode {
    fn from(release: releases::ReleasesRepositoryReleasesNodes) -> Self {
        ReleaseNode {
            name: release.name.unwrap_or_default(),
            tag_name: release.tag_name,
            tag_commit: release.tag_commit.map(|commit| TagCommit { oid: commit.oid }),
            is_draft: release.is_draft,
            is_latest: release.is_latest,
            is_prerelease: release.is_prerelease,
        }
    }
}

impl releases::ResponseData {
    pub fn into_page(self) -> Page<ReleaseNode> {
        let rate_limit = self.rate_limit.map(RateLimit::from);
        match self.repository {
            Some(repository) => {
                let releases = repository.releases;
                Page::new(
                    releases.nodes,
                    releases.page_info.into(),
                    total_count(releases.total_count),
                    rate_limit,
                )
            }
            None => Page::empty(),
        }
    }
}

impl search_repositories::ResponseData {
    /// Repositories of this page, other search hits are dropped.
    pub fn into_page(self) -> Page<RepositoryNode> {
        use search_repositories::SearchRepositoriesSearchNodes;

        let search = self.search;
        let nodes = search.nodes.map(|nodes| {
            nodes
                .into_iter()
                .map(|node| match node {
                    Some(SearchRepositoriesSearchNodes::Repository(repository)) => {
                        Some(RepositoryNode {
                            name_with_owner: repository.name_with_owner,
                            url: repository.url,
                            is_archived: repository.is_archived,
                            default_branch_ref: repository
                                .default_branch_ref
                                .map(|branch| BranchRef { name: branch.name }),
                        })
                    }
                    _ => None,
                })
                .collect()
        });

        Page::new(
            nodes,
            search.page_info.into(),
            None,
            self.rate_limit.map(RateLimit::from),
        )
    }
}
