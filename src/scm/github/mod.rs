//! GitHub flavoured SCM: a git working copy plus the GitHub v4 API.

pub mod client;
pub mod identity;
pub mod labels;
pub mod pagination;
pub mod pullrequest;
pub mod queries;
pub mod ratelimit;
pub mod refs;
pub mod release;
pub mod search;


use std::path::PathBuf;
use std::sync::Arc;

use log::error;
use serde::{Deserialize, Serialize};

use super::commit::CommitMessage;
use super::directory::base_directory;
use super::native::{CommitIdentity, Credentials, GitCli, GpgSpec, NativeGit};
use super::{
    delegate_scm_handler, WorkingCopy, DEFAULT_BRANCH, DEFAULT_WORKING_BRANCH_PREFIX,
    DEFAULT_WORKING_BRANCH_SEPARATOR,
};
use crate::auth::Token;
use crate::error::{BumplineError, Result};
use client::{normalize_url, GitHubClient};

pub use pullrequest::{PullRequest, PullRequestApi, PullRequestSpec};

const DEFAULT_URL: &str = "github.com";
const DEFAULT_USERNAME: &str = "oauth2";

/// GitHub repository settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSpec {
    pub owner: String,
    pub repository: String,
    /// Falls back to `BUMPLINE_GITHUB_TOKEN` then `GITHUB_TOKEN`.
    pub token: Token,
    /// GitHub Enterprise host, defaults to `github.com`.
    pub url: String,
    pub username: String,
    pub branch: String,
    pub directory: Option<PathBuf>,
    pub user: String,
    pub email: String,
    pub gpg: GpgSpec,
    /// Defaults to true.
    pub force: Option<bool>,
    pub submodules: Option<bool>,
    pub commitmessage: CommitMessage,
    /// Defaults to true.
    pub workingbranch: Option<bool>,
    pub workingbranchprefix: Option<String>,
    pub workingbranchseparator: Option<String>,
}

impl GitHubSpec {
    pub fn validate(&self) -> Result<()> {
        let mut required = Vec::new();
        if self.token.is_empty() {
            required.push("token");
        }
        if self.owner.is_empty() {
            required.push("owner");
        }
        if self.repository.is_empty() {
            required.push("repository");
        }

        if required.is_empty() {
            Ok(())
        } else {
            Err(BumplineError::MissingParameters {
                kind: "github".to_string(),
                params: required.join(","),
            })
        }
    }
}

/// SCM for a repository hosted on GitHub.
pub struct GitHubScm {
    spec: GitHubSpec,
    web_url: String,
    client: GitHubClient,
    pub(crate) repo: WorkingCopy,
}

impl GitHubScm {
    pub fn new(spec: GitHubSpec) -> Result<Self> {
        Self::with_native(spec, Arc::new(GitCli::new()))
    }

    pub fn with_native(mut spec: GitHubSpec, native: Arc<dyn NativeGit>) -> Result<Self> {
        if spec.token.is_empty() {
            if let Some(token) = Token::from_env() {
                spec.token = token;
            }
        }
        spec.validate()?;

        let working_branch = spec.workingbranch.unwrap_or(true);
        let force = spec.force.unwrap_or(true);
        if force && !working_branch && spec.force.is_none() {
            error!(
                "Better safe than sorry. The GitHub scm force pushes by default and workingbranch is disabled, \
                 bumpline may push unwanted changes to {:?}. Set force explicitly to confirm.",
                spec.branch
            );
            return Err(BumplineError::Config(
                "unclear configuration, better safe than sorry".to_string(),
            ));
        }

        let web_url = normalize_url(if spec.url.is_empty() {
            DEFAULT_URL
        } else {
            &spec.url
        });
        let client = GitHubClient::new(&web_url, spec.token.clone())?;

        let username = if spec.username.is_empty() {
            DEFAULT_USERNAME.to_string()
        } else {
            spec.username.clone()
        };

        let branch = if spec.branch.is_empty() {
            DEFAULT_BRANCH.to_string()
        } else {
            spec.branch.clone()
        };

        let repo = WorkingCopy {
            url: format!("{web_url}/{}/{}.git", spec.owner, spec.repository),
            directory: spec.directory.clone().unwrap_or_else(|| {
                base_directory()
                    .join("github")
                    .join(&spec.owner)
                    .join(&spec.repository)
            }),
            branch,
            credentials: Credentials::new(username, spec.token.as_str()),
            identity: CommitIdentity {
                user: spec.user.clone(),
                email: spec.email.clone(),
                gpg: spec.gpg.clone(),
            },
            commit_message: spec.commitmessage.clone(),
            force,
            submodules: spec.submodules.unwrap_or(true),
            working_branch,
            prefix: spec
                .workingbranchprefix
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKING_BRANCH_PREFIX.to_string()),
            separator: spec
                .workingbranchseparator
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKING_BRANCH_SEPARATOR.to_string()),
            pipeline_id: String::new(),
            native,
        };

        Ok(Self {
            spec,
            web_url,
            client,
            repo,
        })
    }

    /// Replaces the API client, e.g. to target another endpoint.
    pub fn with_client(mut self, client: GitHubClient) -> Self {
        self.client = client;
        self
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub fn owner(&self) -> &str {
        &self.spec.owner
    }

    pub fn repository(&self) -> &str {
        &self.spec.repository
    }

    /// Repository page, e.g. `https://github.com/owner/repository`.
    pub fn web_url(&self) -> String {
        format!("{}/{}/{}", self.web_url, self.spec.owner, self.spec.repository)
    }

    pub(crate) fn native(&self) -> &dyn NativeGit {
        self.repo.native.as_ref()
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.web_url(), self.repo.branch)
    }
}

delegate_scm_handler!(GitHubScm);
