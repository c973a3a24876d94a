//! In-memory stand-ins for git, SCMs and resources.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{BumplineError, Result};
use crate::scm::native::{CommitIdentity, Credentials, NativeGit};
use crate::scm::{Branches, ScmHandler};
use crate::target::resource::{Resource, ScmChange};

fn record(log: &Mutex<Vec<String>>, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn snapshot(log: &Mutex<Vec<String>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// [`NativeGit`] recording every call.
#[derive(Debug)]
pub struct FakeGit {
    clones: Mutex<Vec<String>>,
    checkouts: Mutex<Vec<String>>,
    adds: Mutex<Vec<String>>,
    commits: Mutex<Vec<String>>,
    pushes: Mutex<Vec<String>>,
    deleted_branches: Mutex<Vec<String>>,
    similar: AtomicBool,
    published: AtomicBool,
}

impl Default for FakeGit {
    fn default() -> Self {
        Self {
            clones: Mutex::default(),
            checkouts: Mutex::default(),
            adds: Mutex::default(),
            commits: Mutex::default(),
            pushes: Mutex::default(),
            deleted_branches: Mutex::default(),
            similar: AtomicBool::new(false),
            published: AtomicBool::new(true),
        }
    }
}

impl FakeGit {
    pub fn set_similar(&self, similar: bool) {
        self.similar.store(similar, Ordering::SeqCst);
    }

    pub fn set_published(&self, published: bool) {
        self.published.store(published, Ordering::SeqCst);
    }

    pub fn clones(&self) -> Vec<String> {
        snapshot(&self.clones)
    }

    pub fn checkouts(&self) -> Vec<String> {
        snapshot(&self.checkouts)
    }

    pub fn adds(&self) -> Vec<String> {
        snapshot(&self.adds)
    }

    pub fn commits(&self) -> Vec<String> {
        snapshot(&self.commits)
    }

    pub fn pushes(&self) -> Vec<String> {
        snapshot(&self.pushes)
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        snapshot(&self.deleted_branches)
    }
}

impl NativeGit for FakeGit {
    fn clone_repository(&self, _: &Credentials, url: &str, _: &Path, _: bool) -> Result<()> {
        record(&self.clones, url);
        Ok(())
    }

    fn checkout(&self, _: &Credentials, source: &str, working: &str, _: &Path, _: bool) -> Result<()> {
        record(&self.checkouts, format!("{source}->{working}"));
        Ok(())
    }

    fn add(&self, files: &[String], _: &Path) -> Result<()> {
        record(&self.adds, files.join(" "));
        Ok(())
    }

    fn commit(&self, _: &CommitIdentity, message: &str, _: &Path) -> Result<()> {
        record(&self.commits, message);
        Ok(())
    }

    fn push(&self, _: &Credentials, _: &Path, force: bool) -> Result<()> {
        record(&self.pushes, format!("HEAD force={force}"));
        Ok(())
    }

    fn push_branch(&self, branch: &str, _: &Credentials, _: &Path, force: bool) -> Result<()> {
        record(&self.pushes, format!("{branch} force={force}"));
        Ok(())
    }

    fn push_tag(&self, tag: &str, _: &Credentials, _: &Path, force: bool) -> Result<()> {
        record(&self.pushes, format!("tag {tag} force={force}"));
        Ok(())
    }

    fn is_local_branch_published(&self, _: &str, _: &str, _: &Credentials, _: &Path) -> Result<bool> {
        Ok(self.published.load(Ordering::SeqCst))
    }

    fn changed_files(&self, _: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn is_similar_branch(&self, _: &str, _: &str, _: &Path) -> Result<bool> {
        Ok(self.similar.load(Ordering::SeqCst))
    }

    fn delete_branch(&self, branch: &str, _: &Credentials, _: &Path) -> Result<()> {
        record(&self.deleted_branches, branch);
        Ok(())
    }
}

/// [`ScmHandler`] recording state-changing calls, in order.
pub struct RecordingScm {
    directory: PathBuf,
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    up_to_date: bool,
}

impl RecordingScm {
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            calls: Mutex::default(),
            fail_on: None,
            up_to_date: true,
        }
    }

    /// Makes the call whose name starts with `stage` fail.
    pub fn fail_on(&mut self, stage: &str) {
        self.fail_on = Some(stage.to_string());
    }

    pub fn set_up_to_date(&mut self, up_to_date: bool) {
        self.up_to_date = up_to_date;
    }

    pub fn calls(&self) -> Vec<String> {
        snapshot(&self.calls)
    }

    fn call(&self, entry: String) -> Result<()> {
        if let Some(stage) = &self.fail_on {
            if entry.starts_with(stage.as_str()) {
                return Err(BumplineError::Git {
                    command: entry,
                    stderr: "injected failure".to_string(),
                });
            }
        }
        record(&self.calls, entry);
        Ok(())
    }
}

impl ScmHandler for RecordingScm {
    fn init(&mut self, pipeline_id: &str) -> Result<()> {
        self.call(format!("init {pipeline_id}"))
    }

    fn checkout(&self) -> Result<()> {
        self.call("checkout".to_string())
    }

    fn add(&self, files: &[String]) -> Result<()> {
        self.call(format!("add {}", files.join(" ")))
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.call(format!("commit {message}"))
    }

    fn push(&self) -> Result<()> {
        self.call("push".to_string())
    }

    fn push_branch(&self, branch: &str) -> Result<()> {
        self.call(format!("push_branch {branch}"))
    }

    fn push_tag(&self, tag: &str) -> Result<()> {
        self.call(format!("push_tag {tag}"))
    }

    fn is_remote_branch_up_to_date(&self) -> Result<bool> {
        Ok(self.up_to_date)
    }

    fn changed_files(&self, _: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn directory(&self) -> &Path {
        &self.directory
    }

    fn branches(&self) -> Branches {
        Branches {
            source: "main".to_string(),
            working: "bumpline_main_test".to_string(),
            target: "main".to_string(),
        }
    }

    fn url(&self) -> String {
        "https://example.com/org/repo.git".to_string()
    }

    fn clean(&self) -> Result<()> {
        self.call("clean".to_string())
    }

    fn clean_working_branch(&self) -> Result<bool> {
        self.call("clean_working_branch".to_string())?;
        Ok(false)
    }

    fn summary(&self) -> String {
        "recording".to_string()
    }
}

/// Resource returning a fixed outcome and recording the values it received.
#[derive(Clone)]
pub struct StaticResource {
    outcome: std::result::Result<ScmChange, String>,
    sources: Arc<Mutex<Vec<String>>>,
}

impl StaticResource {
    fn with(outcome: std::result::Result<ScmChange, String>) -> Self {
        Self {
            outcome,
            sources: Arc::default(),
        }
    }

    pub fn changed(files: Vec<&str>, message: &str) -> Self {
        Self::with(Ok(ScmChange {
            changed: true,
            files: files.into_iter().map(String::from).collect(),
            message: message.to_string(),
        }))
    }

    pub fn unchanged() -> Self {
        Self::with(Ok(ScmChange::default()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Err(message.to_string()))
    }

    pub fn sources(&self) -> Vec<String> {
        snapshot(&self.sources)
    }

    fn outcome(&self, source: &str) -> Result<ScmChange> {
        record(&self.sources, source);
        self.outcome
            .clone()
            .map_err(BumplineError::Resource)
    }
}

impl Resource for StaticResource {
    fn apply(&self, source: &str, _: bool) -> Result<bool> {
        self.outcome(source).map(|change| change.changed)
    }

    fn apply_in_scm(&self, source: &str, _: &dyn ScmHandler, _: bool) -> Result<ScmChange> {
        self.outcome(source)
    }
}
