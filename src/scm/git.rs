use std::path::PathBuf;
use std::sync::Arc;

use log::error;
use serde::{Deserialize, Serialize};

use super::commit::CommitMessage;
use super::directory::default_directory;
use super::native::{CommitIdentity, Credentials, GitCli, GpgSpec, NativeGit};
use super::{
    delegate_scm_handler, WorkingCopy, DEFAULT_BRANCH, DEFAULT_WORKING_BRANCH_PREFIX,
    DEFAULT_WORKING_BRANCH_SEPARATOR,
};
use crate::error::{BumplineError, Result};

/// Plain git remote settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSpec {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Defaults to `main`.
    pub branch: String,
    /// Defaults to a directory derived from `url` under the cache directory.
    pub directory: Option<PathBuf>,
    pub user: String,
    pub email: String,
    pub gpg: GpgSpec,
    /// Runs `git push --force` and resets diverged working branches.
    pub force: bool,
    pub submodules: Option<bool>,
    pub commitmessage: CommitMessage,
    /// Work on a dedicated branch, off by default.
    pub workingbranch: Option<bool>,
    pub workingbranchprefix: Option<String>,
    pub workingbranchseparator: Option<String>,
}

impl GitSpec {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(BumplineError::MissingParameters {
                kind: "git".to_string(),
                params: "url".to_string(),
            });
        }
        Ok(())
    }
}

/// SCM backed by any git remote.
pub struct GitScm {
    spec: GitSpec,
    pub(crate) repo: WorkingCopy,
}

impl GitScm {
    pub fn new(spec: GitSpec) -> Result<Self> {
        Self::with_native(spec, Arc::new(GitCli::new()))
    }

    pub fn with_native(spec: GitSpec, native: Arc<dyn NativeGit>) -> Result<Self> {
        spec.validate()?;

        let working_branch = match spec.workingbranch {
            Some(enabled) => enabled,
            None if spec.force => {
                error!(
                    "Better safe than sorry. Force push is enabled while workingbranch is unset, \
                     bumpline may push unwanted changes to {:?}. Set workingbranch explicitly to confirm.",
                    spec.branch
                );
                return Err(BumplineError::Config(
                    "unclear configuration, better safe than sorry".to_string(),
                ));
            }
            None => false,
        };

        let branch = if spec.branch.is_empty() {
            DEFAULT_BRANCH.to_string()
        } else {
            spec.branch.clone()
        };

        let repo = WorkingCopy {
            url: spec.url.clone(),
            directory: spec
                .directory
                .clone()
                .unwrap_or_else(|| default_directory(&spec.url)),
            branch,
            credentials: Credentials::new(&spec.username, &spec.password),
            identity: CommitIdentity {
                user: spec.user.clone(),
                email: spec.email.clone(),
                gpg: spec.gpg.clone(),
            },
            commit_message: spec.commitmessage.clone(),
            force: spec.force,
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

        Ok(Self { spec, repo })
    }

    pub fn spec(&self) -> &GitSpec {
        &self.spec
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.repo.url, self.repo.branch)
    }
}

delegate_scm_handler!(GitScm);
