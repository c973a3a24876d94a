//! Source control abstraction used by targets.
//!
//! Two variants exist, selected by the `kind` discriminator of the manifest:
//! a plain git remote ([`git::GitScm`]) and a GitHub repository
//! ([`github::GitHubScm`]). Both share the working copy logic in
//! [`WorkingCopy`]; the GitHub variant adds API access on top of it.

pub mod commit;
pub mod directory;
pub mod git;
pub mod github;
pub mod native;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use commit::CommitMessage;
use directory::sanitize_branch_name;
use native::{CommitIdentity, Credentials, NativeGit};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_WORKING_BRANCH_PREFIX: &str = "bumpline";
pub const DEFAULT_WORKING_BRANCH_SEPARATOR: &str = "_";

/// The three branches an SCM works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branches {
    /// Branch the working branch is created from.
    pub source: String,
    /// Branch receiving commits.
    pub working: String,
    /// Branch a pull request targets.
    pub target: String,
}

/// Capabilities a target needs from a source control manager.
pub trait ScmHandler: Send {
    /// Binds the pipeline id and prepares the local working directory.
    fn init(&mut self, pipeline_id: &str) -> Result<()>;
    fn checkout(&self) -> Result<()>;
    fn add(&self, files: &[String]) -> Result<()>;
    fn commit(&self, message: &str) -> Result<()>;
    fn push(&self) -> Result<()>;
    fn push_branch(&self, branch: &str) -> Result<()>;
    fn push_tag(&self, tag: &str) -> Result<()>;
    fn is_remote_branch_up_to_date(&self) -> Result<bool>;
    fn changed_files(&self, dir: &Path) -> Result<Vec<String>>;
    fn directory(&self) -> &Path;
    fn branches(&self) -> Branches;
    fn url(&self) -> String;
    /// Removes the working directory. Irreversible.
    fn clean(&self) -> Result<()>;
    /// Deletes the working branch when it carries nothing on top of the target branch.
    fn clean_working_branch(&self) -> Result<bool>;
    fn summary(&self) -> String;
}

/// Manifest section describing the SCM, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScmConfig {
    Git(git::GitSpec),
    GitHub(github::GitHubSpec),
}

/// A configured SCM.
pub enum Scm {
    Git(git::GitScm),
    GitHub(github::GitHubScm),
}

impl Scm {
    pub fn new(config: &ScmConfig) -> Result<Self> {
        match config {
            ScmConfig::Git(spec) => Ok(Scm::Git(git::GitScm::new(spec.clone())?)),
            ScmConfig::GitHub(spec) => Ok(Scm::GitHub(github::GitHubScm::new(spec.clone())?)),
        }
    }

    pub fn handler(&self) -> &dyn ScmHandler {
        match self {
            Scm::Git(g) => g,
            Scm::GitHub(g) => g,
        }
    }

    pub fn handler_mut(&mut self) -> &mut dyn ScmHandler {
        match self {
            Scm::Git(g) => g,
            Scm::GitHub(g) => g,
        }
    }
}

/// Local clone shared by every SCM variant.
pub(crate) struct WorkingCopy {
    pub url: String,
    pub directory: PathBuf,
    pub branch: String,
    pub credentials: Credentials,
    pub identity: CommitIdentity,
    pub commit_message: CommitMessage,
    pub force: bool,
    pub submodules: bool,
    pub working_branch: bool,
    pub prefix: String,
    pub separator: String,
    pub pipeline_id: String,
    pub native: Arc<dyn NativeGit>,
}

impl WorkingCopy {
    pub fn branches(&self) -> Branches {
        let source = self.branch.clone();
        let target = self.branch.clone();
        let working = if self.working_branch && !self.pipeline_id.is_empty() {
            sanitize_branch_name(&[self.prefix.as_str(), &target, &self.pipeline_id].join(&self.separator))
        } else {
            self.branch.clone()
        };

        Branches {
            source,
            working,
            target,
        }
    }

    pub fn init(&mut self, pipeline_id: &str) -> Result<()> {
        self.pipeline_id = pipeline_id.to_string();
        self.native.clone_repository(
            &self.credentials,
            &self.url,
            &self.directory,
            self.submodules,
        )
    }

    pub fn checkout(&self) -> Result<()> {
        let branches = self.branches();
        self.native.checkout(
            &self.credentials,
            &branches.source,
            &branches.working,
            &self.directory,
            self.force,
        )
    }

    pub fn add(&self, files: &[String]) -> Result<()> {
        self.native.add(files, &self.directory)
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        let message = self.commit_message.generate(message)?;
        self.native.commit(&self.identity, &message, &self.directory)
    }

    pub fn push(&self) -> Result<()> {
        self.native.push(&self.credentials, &self.directory, self.force)
    }

    pub fn push_branch(&self, branch: &str) -> Result<()> {
        self.native
            .push_branch(branch, &self.credentials, &self.directory, self.force)
    }

    pub fn push_tag(&self, tag: &str) -> Result<()> {
        self.native
            .push_tag(tag, &self.credentials, &self.directory, self.force)
    }

    pub fn is_remote_branch_up_to_date(&self) -> Result<bool> {
        let branches = self.branches();
        self.native.is_local_branch_published(
            &branches.source,
            &branches.working,
            &self.credentials,
            &self.directory,
        )
    }

    pub fn changed_files(&self, dir: &Path) -> Result<Vec<String>> {
        self.native.changed_files(dir)
    }

    pub fn clean(&self) -> Result<()> {
        debug!("removing working directory {}", self.directory.display());
        match std::fs::remove_dir_all(&self.directory) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clean_working_branch(&self) -> Result<bool> {
        let branches = self.branches();

        if branches.working == branches.target {
            info!(
                "Skipping cleaning working branch {:?} on {:?} (same as target branch)",
                branches.working, self.url
            );
            return Ok(false);
        }

        if !self
            .native
            .is_similar_branch(&branches.working, &branches.target, &self.directory)?
        {
            return Ok(false);
        }

        self.native
            .delete_branch(&branches.working, &self.credentials, &self.directory)?;
        info!("Working branch {:?} deleted", branches.working);
        Ok(true)
    }
}

/// Implements [`ScmHandler`] for a type holding a `repo: WorkingCopy` field
/// and an inherent `describe()`.
macro_rules! delegate_scm_handler {
    ($ty:ty) => {
        impl $crate::scm::ScmHandler for $ty {
            fn init(&mut self, pipeline_id: &str) -> $crate::error::Result<()> {
                self.repo.init(pipeline_id)
            }
            fn checkout(&self) -> $crate::error::Result<()> {
                self.repo.checkout()
            }
            fn add(&self, files: &[String]) -> $crate::error::Result<()> {
                self.repo.add(files)
            }
            fn commit(&self, message: &str) -> $crate::error::Result<()> {
                self.repo.commit(message)
            }
            fn push(&self) -> $crate::error::Result<()> {
                self.repo.push()
            }
            fn push_branch(&self, branch: &str) -> $crate::error::Result<()> {
                self.repo.push_branch(branch)
            }
            fn push_tag(&self, tag: &str) -> $crate::error::Result<()> {
                self.repo.push_tag(tag)
            }
            fn is_remote_branch_up_to_date(&self) -> $crate::error::Result<bool> {
                self.repo.is_remote_branch_up_to_date()
            }
            fn changed_files(&self, dir: &std::path::Path) -> $crate::error::Result<Vec<String>> {
                self.repo.changed_files(dir)
            }
            fn directory(&self) -> &std::path::Path {
                &self.repo.directory
            }
            fn branches(&self) -> $crate::scm::Branches {
                self.repo.branches()
            }
            fn url(&self) -> String {
                self.repo.url.clone()
            }
            fn clean(&self) -> $crate::error::Result<()> {
                self.repo.clean()
            }
            fn clean_working_branch(&self) -> $crate::error::Result<bool> {
                self.repo.clean_working_branch()
            }
            fn summary(&self) -> String {
                self.describe()
            }
        }
    };
}
pub(crate) use delegate_scm_handler;
