//! Pull request reconciliation.
//!
//! [`PullRequest::create`] is safe to call on every run: it looks up the open
//! pull request between the working and the target branch, opens one when
//! missing, then always refreshes title, body and labels before handling
//! auto-merge and reviewers.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::identity::Reviewer;
use super::labels::{matching_labels, merge_labels};
use super::queries::enable_auto_merge::PullRequestMergeMethod;
use super::queries::update_pull_request::PullRequestUpdateState;
use super::queries::{
    add_comment, create_pull_request, enable_auto_merge, find_pull_request, request_reviews,
    update_pull_request, AddComment, CreatePullRequest, EnableAutoMerge, FindPullRequest,
    RequestReviews, UpdatePullRequest,
};
use super::GitHubScm;
use crate::error::{BumplineError, Result};
use crate::scm::ScmHandler;

const MERGE_METHODS: [&str; 3] = ["SQUASH", "MERGE", "REBASE"];

/// Accepts an empty method or, ignoring case, `squash`, `merge` or `rebase`.
pub fn is_merge_method_valid(method: &str) -> Result<()> {
    if method.is_empty() || MERGE_METHODS.contains(&method.to_uppercase().as_str()) {
        Ok(())
    } else {
        debug!("{method} - {}", BumplineError::BadMergeMethod);
        Err(BumplineError::BadMergeMethod)
    }
}

/// Merge method sent to GitHub, `None` keeps the repository default.
fn merge_method(method: &str) -> Option<PullRequestMergeMethod> {
    match method.to_uppercase().as_str() {
        "SQUASH" => Some(PullRequestMergeMethod::SQUASH),
        "MERGE" => Some(PullRequestMergeMethod::MERGE),
        "REBASE" => Some(PullRequestMergeMethod::REBASE),
        _ => None,
    }
}

/// Pull request settings from the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestSpec {
    pub automerge: bool,
    /// Overrides the title handed over by the pipeline.
    pub title: String,
    /// Introduction rendered at the top of the body.
    pub description: String,
    /// Labels to add, they must already exist on the repository.
    pub labels: Vec<String>,
    pub draft: bool,
    pub maintainercannotmodify: bool,
    /// `merge`, `squash`, `rebase` or empty for the repository default.
    pub mergemethod: String,
    /// Logins or `org/team` slugs.
    pub reviewers: Vec<String>,
}

impl PullRequestSpec {
    pub fn validate(&self) -> Result<()> {
        is_merge_method_valid(&self.mergemethod)
    }
}

/// Remote pull request snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequestApi {
    pub id: String,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub state: String,
    pub url: String,
}

/// Renders the pull request body.
pub fn render_body(title: &str, introduction: &str, report: &str, changelog: &str) -> String {
    let mut body = format!("# {title}\n\n");
    if !introduction.is_empty() {
        body.push_str(introduction);
        body.push_str("\n\n");
    }
    body.push_str(&format!(
        "## Report\n\n{report}\n\n\
         ## Changelog\n\n\
         <details><summary>Click to expand</summary>\n\n\
         ````\n{changelog}\n````\n\n\
         </details>\n\n\
         ## Remark\n\n\
         This pull request was automatically created using bumpline.\n"
    ));
    body
}

/// Pull request manager bound to one GitHub SCM.
pub struct PullRequest<'a> {
    scm: &'a GitHubScm,
    spec: PullRequestSpec,
    existing_only: bool,
}

impl<'a> PullRequest<'a> {
    /// Fails on an invalid merge method before any network call.
    pub fn new(spec: PullRequestSpec, scm: &'a GitHubScm) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            scm,
            spec,
            existing_only: false,
        })
    }

    /// Only update a pull request that already exists.
    pub fn existing_only(mut self, existing_only: bool) -> Self {
        self.existing_only = existing_only;
        self
    }

    /// Opens or refreshes the pull request for the working branch.
    ///
    /// Returns `None` when there is nothing to propose. An auto-merge refusal
    /// is returned after labels, body and reviewers have been applied.
    pub async fn create(
        &self,
        title: &str,
        changelog: &str,
        report: &str,
    ) -> Result<Option<PullRequestApi>> {
        let branches = self.scm.branches();
        let title = if self.spec.title.is_empty() {
            title
        } else {
            self.spec.title.as_str()
        };

        if self
            .scm
            .native()
            .is_similar_branch(&branches.working, &branches.target, self.scm.directory())?
        {
            debug!(
                "No changes detected between branches {:?} and {:?}, skipping pullrequest creation",
                branches.working, branches.target
            );
            return Ok(None);
        }

        let body = render_body(title, &self.spec.description, report, changelog);

        let mut pull_request = self.find(&branches.target, &branches.working).await?;

        if pull_request.id.is_empty() {
            if self.existing_only {
                info!(
                    "No pull request open from {:?} to {:?}, not creating one",
                    branches.working, branches.target
                );
                return Ok(None);
            }
            pull_request = self
                .open(&branches.target, &branches.working, title, &body)
                .await?;
        }

        let pull_request = self.update(&pull_request, title, &body).await?;

        let automerge = if self.spec.automerge {
            self.enable_auto_merge(&pull_request).await
        } else {
            Ok(())
        };

        if !self.spec.reviewers.is_empty() {
            self.request_reviews(&pull_request).await?;
        }

        automerge.map(|()| Some(pull_request))
    }

    /// Open pull request from `head` to `base`, empty when none exists.
    async fn find(&self, base: &str, head: &str) -> Result<PullRequestApi> {
        let data = self
            .scm
            .client()
            .execute::<FindPullRequest>(find_pull_request::Variables {
                owner: self.scm.owner().to_string(),
                name: self.scm.repository().to_string(),
                base_ref_name: base.to_string(),
                head_ref_name: head.to_string(),
            })
            .await?;

        Ok(data.into_pull_request().unwrap_or_default())
    }

    async fn open(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestApi> {
        let repository_id = self.scm.repository_id().await?;

        let data = self
            .scm
            .client()
            .execute::<CreatePullRequest>(create_pull_request::Variables {
                input: create_pull_request::CreatePullRequestInput {
                    base_ref_name: base.to_string(),
                    body: Some(body.to_string()),
                    client_mutation_id: None,
                    draft: Some(self.spec.draft),
                    head_ref_name: head.to_string(),
                    head_repository_id: None,
                    maintainer_can_modify: Some(!self.spec.maintainercannotmodify),
                    repository_id,
                    title: title.to_string(),
                },
            })
            .await?;

        data.into_pull_request()
            .ok_or(BumplineError::NoResponseData)
    }

    async fn update(
        &self,
        pull_request: &PullRequestApi,
        title: &str,
        body: &str,
    ) -> Result<PullRequestApi> {
        debug!("Updating GitHub pull request");

        let repository_labels = self.scm.repository_labels().await?;
        let configured = matching_labels(&self.spec.labels, &repository_labels);
        for name in &self.spec.labels {
            if !configured.iter().any(|label| &label.name == name) {
                warn!("label {name:?} does not exist on {}, skipping", self.scm.web_url());
            }
        }

        let assigned = self.scm.pull_request_labels(pull_request.number).await?;
        let label_ids = merge_labels(&configured, &assigned)
            .into_iter()
            .map(|label| label.id)
            .collect();

        let data = self
            .scm
            .client()
            .execute::<UpdatePullRequest>(update_pull_request::Variables {
                input: update_pull_request::UpdatePullRequestInput {
                    assignee_ids: None,
                    base_ref_name: None,
                    body: Some(body.to_string()),
                    client_mutation_id: None,
                    label_ids: Some(label_ids),
                    maintainer_can_modify: None,
                    milestone_id: None,
                    project_ids: None,
                    pull_request_id: pull_request.id.clone(),
                    state: Some(PullRequestUpdateState::OPEN),
                    title: Some(title.to_string()),
                },
            })
            .await?;

        let updated = data
            .into_pull_request()
            .unwrap_or_else(|| pull_request.clone());

        info!("Pull Request available at: {}", updated.url);
        Ok(updated)
    }

    async fn enable_auto_merge(&self, pull_request: &PullRequestApi) -> Result<()> {
        if !self.scm.auto_merge_allowed().await? {
            self.comment(
                pull_request,
                "Auto-merge was requested but it is not allowed on this repository.",
            )
            .await?;
            return Err(BumplineError::AutoMergeNotAllowed);
        }

        self.scm
            .client()
            .execute::<EnableAutoMerge>(enable_auto_merge::Variables {
                input: enable_auto_merge::EnablePullRequestAutoMergeInput {
                    author_email: None,
                    client_mutation_id: None,
                    commit_body: None,
                    commit_headline: None,
                    expected_head_oid: None,
                    merge_method: merge_method(&self.spec.mergemethod),
                    pull_request_id: pull_request.id.clone(),
                },
            })
            .await?;
        Ok(())
    }

    /// Adds a comment to the pull request.
    pub async fn comment(&self, pull_request: &PullRequestApi, body: &str) -> Result<()> {
        self.scm
            .client()
            .execute::<AddComment>(add_comment::Variables {
                input: add_comment::AddCommentInput {
                    body: body.to_string(),
                    client_mutation_id: None,
                    subject_id: pull_request.id.clone(),
                },
            })
            .await?;
        Ok(())
    }

    async fn request_reviews(&self, pull_request: &PullRequestApi) -> Result<()> {
        let mut user_ids = Vec::new();
        let mut team_ids = Vec::new();
        let mut unresolved = Vec::new();

        for entry in &self.spec.reviewers {
            match self.scm.resolve_reviewer(entry).await? {
                Some(Reviewer::User(id)) => user_ids.push(id),
                Some(Reviewer::Team(id)) => team_ids.push(id),
                None => {
                    warn!("reviewer {entry:?} not found, skipping");
                    unresolved.push(entry.as_str());
                }
            }
        }

        if user_ids.is_empty() && team_ids.is_empty() {
            return Err(BumplineError::UnresolvedReviewers(unresolved.join(", ")));
        }

        self.scm
            .client()
            .execute::<RequestReviews>(request_reviews::Variables {
                input: request_reviews::RequestReviewsInput {
                    client_mutation_id: None,
                    pull_request_id: pull_request.id.clone(),
                    team_ids: Some(team_ids),
                    union_: Some(true),
                    user_ids: Some(user_ids),
                },
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_merge_method_valid() {
        for method in ["", "squash", "SQUASH", "merge", "rebase", "Rebase"] {
            assert!(is_merge_method_valid(method).is_ok(), "{method:?}");
        }
        for method in ["fast-forward", " squash", "merges"] {
            let err = is_merge_method_valid(method).unwrap_err();
            assert_eq!(
                err.to_string(),
                "wrong merge method defined, accepting one of 'squash', 'merge', 'rebase', or ''"
            );
        }
    }

    #[test]
    fn test_merge_method_ignores_case() {
        assert_eq!(merge_method("squash"), Some(PullRequestMergeMethod::SQUASH));
        assert_eq!(merge_method("Rebase"), Some(PullRequestMergeMethod::REBASE));
        assert_eq!(merge_method(""), None);
    }

    #[test]
    fn test_render_body_sections() {
        let body = render_body("Bump go", "Weekly update", "* ATTENTION - go", "v1.22 notes");

        assert!(body.starts_with("# Bump go\n\nWeekly update\n\n## Report\n\n* ATTENTION - go"));
        assert!(body.contains("<details><summary>Click to expand</summary>\n\n````\nv1.22 notes\n````"));
        assert!(body.contains("## Remark"));
    }

    #[test]
    fn test_render_body_without_introduction() {
        let body = render_body("Bump go", "", "report", "changelog");
        assert!(body.starts_with("# Bump go\n\n## Report"));
    }

    #[test]
    fn test_pull_request_api_deserializes_partial_payload() {
        let pr: PullRequestApi =
            serde_json::from_str(r#"{"id":"PR_1","number":7,"url":"https://x/7"}"#).unwrap();
        assert_eq!(pr.id, "PR_1");
        assert_eq!(pr.number, 7);
        assert!(pr.title.is_empty());
    }
}
