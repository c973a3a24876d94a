//! Native git client used by every SCM handler for working tree operations.
//!
//! [`GitCli`] drives the `git` binary. Credentials are never written to the
//! repository configuration: every network operation receives an authenticated
//! URL built on the fly from the `origin` remote.

use std::path::Path;
use std::process::{Command, Output};

use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BumplineError, Result};

/// Username/password pair used for HTTP(S) remotes.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// GPG signing settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpgSpec {
    /// Key id or fingerprint available in the local keyring.
    pub signingkey: String,
    pub passphrase: String,
}

impl std::fmt::Debug for GpgSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpgSpec")
            .field("signingkey", &self.signingkey)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Author identity and optional signing key for a commit.
#[derive(Debug, Clone, Default)]
pub struct CommitIdentity {
    pub user: String,
    pub email: String,
    pub gpg: GpgSpec,
}

/// Local-side git primitives.
pub trait NativeGit: Send + Sync {
    fn clone_repository(
        &self,
        credentials: &Credentials,
        url: &str,
        dir: &Path,
        submodules: bool,
    ) -> Result<()>;

    /// Creates or reuses `working_branch` from `source_branch`.
    fn checkout(
        &self,
        credentials: &Credentials,
        source_branch: &str,
        working_branch: &str,
        dir: &Path,
        force: bool,
    ) -> Result<()>;

    /// Stages exactly `files`.
    fn add(&self, files: &[String], dir: &Path) -> Result<()>;

    fn commit(&self, identity: &CommitIdentity, message: &str, dir: &Path) -> Result<()>;

    /// Pushes the current branch to its remote counterpart.
    fn push(&self, credentials: &Credentials, dir: &Path, force: bool) -> Result<()>;

    fn push_branch(
        &self,
        branch: &str,
        credentials: &Credentials,
        dir: &Path,
        force: bool,
    ) -> Result<()>;

    fn push_tag(&self, tag: &str, credentials: &Credentials, dir: &Path, force: bool)
        -> Result<()>;

    /// Whether `working_branch` is published on the remote at the local commit.
    fn is_local_branch_published(
        &self,
        source_branch: &str,
        working_branch: &str,
        credentials: &Credentials,
        dir: &Path,
    ) -> Result<bool>;

    /// Paths with uncommitted modifications relative to HEAD.
    fn changed_files(&self, dir: &Path) -> Result<Vec<String>>;

    /// Whether both branches point at the same commit.
    fn is_similar_branch(&self, a: &str, b: &str, dir: &Path) -> Result<bool>;

    /// Deletes a branch locally and on the remote.
    fn delete_branch(&self, branch: &str, credentials: &Credentials, dir: &Path) -> Result<()>;
}

/// [`NativeGit`] implementation driving the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

fn git_command(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir);
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    // stderr is matched against English messages
    cmd.env("LC_ALL", "C");
    cmd
}

/// Runs git and fails on a non zero exit code. `display` is what ends up in
/// errors and logs, so it must never contain credentials.
fn run_git(dir: &Path, args: &[&str], display: &str) -> Result<Output> {
    debug!("running git {display} in {}", dir.display());
    let output = git_command(dir).args(args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(BumplineError::Git {
            command: format!("git {display}"),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn run_git_stdout(dir: &Path, args: &[&str]) -> Result<String> {
    let output = run_git(dir, args, &args.join(" "))?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resolves a ref to a commit, `None` when it does not exist.
fn resolve(dir: &Path, reference: &str) -> Result<Option<String>> {
    let output = git_command(dir)
        .args(["rev-parse", "--verify", "--quiet", &format!("{reference}^{{commit}}")])
        .output()?;

    match output.status.code() {
        Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string())),
        Some(1) => Ok(None),
        _ => Err(BumplineError::Git {
            command: format!("git rev-parse --verify {reference}"),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Resolves a branch name, preferring the local branch over `origin/<name>`.
fn resolve_branch(dir: &Path, branch: &str) -> Result<Option<String>> {
    match resolve(dir, &format!("refs/heads/{branch}"))? {
        Some(sha) => Ok(Some(sha)),
        None => resolve(dir, &format!("refs/remotes/origin/{branch}")),
    }
}

fn is_ancestor(dir: &Path, ancestor: &str, descendant: &str) -> Result<bool> {
    let output = git_command(dir)
        .args(["merge-base", "--is-ancestor", ancestor, descendant])
        .output()?;

    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(BumplineError::Git {
            command: format!("git merge-base --is-ancestor {ancestor} {descendant}"),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Injects credentials into an http(s) remote URL. Other schemes are returned
/// unchanged and rely on the local ssh configuration.
fn authenticated_url(remote: &str, credentials: &Credentials) -> Result<String> {
    if credentials.is_empty() || !(remote.starts_with("https://") || remote.starts_with("http://"))
    {
        return Ok(remote.to_string());
    }

    let mut url = Url::parse(remote)
        .map_err(|e| BumplineError::Config(format!("invalid remote URL {remote}: {e}")))?;
    let username = if credentials.username.is_empty() {
        "oauth2"
    } else {
        credentials.username.as_str()
    };
    url.set_username(username)
        .and_then(|()| url.set_password(Some(&credentials.password)))
        .map_err(|()| BumplineError::Config(format!("cannot set credentials on {remote}")))?;
    Ok(url.to_string())
}

fn origin_url(dir: &Path, credentials: &Credentials) -> Result<String> {
    let remote = run_git_stdout(dir, &["remote", "get-url", "origin"])?;
    authenticated_url(&remote, credentials)
}

fn current_branch(dir: &Path) -> Result<String> {
    let branch = run_git_stdout(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if branch == "HEAD" {
        return Err(BumplineError::Git {
            command: "git push".to_string(),
            stderr: "not pushing from a branch (detached HEAD)".to_string(),
        });
    }
    Ok(branch)
}

/// Fetches a single branch into `refs/remotes/origin/<branch>`. Returns false
/// when the branch does not exist on the remote.
fn fetch_branch(dir: &Path, credentials: &Credentials, branch: &str) -> Result<bool> {
    let remote = origin_url(dir, credentials)?;
    let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
    let output = git_command(dir)
        .args(["fetch", "--quiet", &remote, &refspec])
        .output()?;

    if output.status.success() {
        return Ok(true);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("couldn't find remote ref") {
        debug!("branch {branch:?} not found on remote");
        return Ok(false);
    }
    Err(BumplineError::Git {
        command: format!("git fetch origin {refspec}"),
        stderr: stderr.trim().to_string(),
    })
}

fn push_refspec(dir: &Path, credentials: &Credentials, refspec: &str, force: bool) -> Result<()> {
    let remote = origin_url(dir, credentials)?;
    let mut args = vec!["push", "--porcelain"];
    if force {
        args.push("--force");
    }
    args.push(&remote);
    args.push(refspec);

    let display = format!("push{} origin {refspec}", if force { " --force" } else { "" });
    let output = run_git(dir, &args, &display)?;
    debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}

/// Unlocks the signing key in gpg-agent so the following `git commit -S` does
/// not need an interactive pinentry.
fn unlock_signing_key(gpg: &GpgSpec) -> Result<()> {
    let output = Command::new("gpg")
        .args([
            "--batch",
            "--yes",
            "--pinentry-mode",
            "loopback",
            "--passphrase",
            &gpg.passphrase,
            "--local-user",
            &gpg.signingkey,
            "--output",
            "/dev/null",
            "--clearsign",
            "/dev/null",
        ])
        .output()?;

    if output.status.success() {
        Ok(())
    } else {
        Err(BumplineError::Git {
            command: format!("gpg --local-user {} --clearsign", gpg.signingkey),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Parses `git status --porcelain -z` output into paths.
///
/// Entries are NUL terminated and paths are never quoted. A rename or copy
/// entry is followed by an extra entry holding the source path.
fn parse_porcelain(status: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut entries = status.split('\0');
    while let Some(entry) = entries.next() {
        let (Some(code), Some(path)) = (entry.get(..2), entry.get(3..)) else {
            continue;
        };
        if code.contains(['R', 'C']) {
            entries.next();
        }
        if !path.is_empty() {
            paths.push(path.to_string());
        }
    }
    paths
}

impl NativeGit for GitCli {
    fn clone_repository(
        &self,
        credentials: &Credentials,
        url: &str,
        dir: &Path,
        submodules: bool,
    ) -> Result<()> {
        debug!("stage: git-clone");

        if dir.join(".git").exists() {
            debug!("repository already cloned in {}", dir.display());
            return Ok(());
        }

        std::fs::create_dir_all(dir)?;
        let remote = authenticated_url(url, credentials)?;
        let dir_arg = std::fs::canonicalize(dir)?.to_string_lossy().to_string();

        let mut args = vec!["clone", "--quiet"];
        if submodules {
            args.push("--recurse-submodules");
        }
        args.push(&remote);
        args.push(&dir_arg);
        run_git(dir, &args, &format!("clone {url} {dir_arg}"))?;

        // keep credentials out of .git/config
        run_git(dir, &["remote", "set-url", "origin", url], "remote set-url origin")?;
        Ok(())
    }

    fn checkout(
        &self,
        credentials: &Credentials,
        source_branch: &str,
        working_branch: &str,
        dir: &Path,
        force: bool,
    ) -> Result<()> {
        debug!("stage: git-checkout");
        debug!(
            "checkout branch {working_branch:?}, based on {source_branch:?} to directory {:?}",
            dir.display()
        );

        let dirty = !run_git_stdout(dir, &["status", "--porcelain"])?.is_empty();
        if dirty {
            if !force {
                return Err(BumplineError::DirtyWorkingTree(dir.display().to_string()));
            }
            debug!("discarding local modifications in {}", dir.display());
            run_git(dir, &["reset", "--hard", "--quiet"], "reset --hard")?;
            run_git(dir, &["clean", "-fd", "--quiet"], "clean -fd")?;
        }

        if !fetch_branch(dir, credentials, source_branch)? {
            return Err(BumplineError::Git {
                command: format!("git fetch origin {source_branch}"),
                stderr: format!("source branch {source_branch:?} does not exist on remote"),
            });
        }
        let remote_source = format!("refs/remotes/origin/{source_branch}");

        let local_working = format!("refs/heads/{working_branch}");
        if resolve(dir, &local_working)?.is_some() {
            run_git(dir, &["checkout", "--quiet", working_branch], &format!("checkout {working_branch}"))?;
        } else {
            let start = if working_branch != source_branch
                && fetch_branch(dir, credentials, working_branch)?
            {
                format!("refs/remotes/origin/{working_branch}")
            } else {
                remote_source.clone()
            };
            run_git(
                dir,
                &["checkout", "--quiet", "-b", working_branch, &start],
                &format!("checkout -b {working_branch} {start}"),
            )?;
        }

        if working_branch == source_branch {
            return run_git(
                dir,
                &["merge", "--ff-only", "--quiet", &remote_source],
                &format!("merge --ff-only {remote_source}"),
            )
            .map(|_| ());
        }

        // a working branch left behind by a previous run may be based on an outdated source
        if !is_ancestor(dir, &remote_source, "HEAD")? {
            if force {
                debug!("resetting {working_branch:?} to {remote_source:?}");
                run_git(
                    dir,
                    &["reset", "--hard", "--quiet", &remote_source],
                    &format!("reset --hard {remote_source}"),
                )?;
            } else {
                log::warn!(
                    "branch {working_branch:?} is not based on the latest {source_branch:?}, enable force to reset it"
                );
            }
        }

        Ok(())
    }

    fn add(&self, files: &[String], dir: &Path) -> Result<()> {
        debug!("stage: git-add");

        for file in files {
            let path = Path::new(file);
            let relative = if path.is_absolute() {
                path.strip_prefix(dir)
                    .map_err(|_| {
                        BumplineError::Resource(format!(
                            "file {file:?} is outside of the working directory {}",
                            dir.display()
                        ))
                    })?
                    .to_string_lossy()
                    .to_string()
            } else {
                file.clone()
            };
            debug!("adding file: {relative:?}");
            run_git(dir, &["add", "--", &relative], &format!("add {relative}"))?;
        }
        Ok(())
    }

    fn commit(&self, identity: &CommitIdentity, message: &str, dir: &Path) -> Result<()> {
        debug!("stage: git-commit");

        let mut args: Vec<String> = Vec::new();
        if !identity.user.is_empty() {
            args.extend(["-c".to_string(), format!("user.name={}", identity.user)]);
        }
        if !identity.email.is_empty() {
            args.extend(["-c".to_string(), format!("user.email={}", identity.email)]);
        }
        args.extend(["commit".to_string(), "--quiet".to_string()]);

        let signing_key = &identity.gpg.signingkey;
        if !signing_key.is_empty() {
            if !identity.gpg.passphrase.is_empty() {
                unlock_signing_key(&identity.gpg)?;
            }
            args.push(format!("-S{signing_key}"));
        }
        args.extend(["-m".to_string(), message.to_string()]);

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_git(dir, &args, "commit")?;

        let head = run_git_stdout(dir, &["log", "-1", "--format=%H %s"])?;
        debug!("commit created: {head}");
        Ok(())
    }

    fn push(&self, credentials: &Credentials, dir: &Path, force: bool) -> Result<()> {
        debug!("stage: git-push");

        let branch = current_branch(dir)?;
        push_refspec(
            dir,
            credentials,
            &format!("refs/heads/{branch}:refs/heads/{branch}"),
            force,
        )
    }

    fn push_branch(
        &self,
        branch: &str,
        credentials: &Credentials,
        dir: &Path,
        force: bool,
    ) -> Result<()> {
        push_refspec(
            dir,
            credentials,
            &format!("refs/heads/{branch}:refs/heads/{branch}"),
            force,
        )
    }

    fn push_tag(
        &self,
        tag: &str,
        credentials: &Credentials,
        dir: &Path,
        force: bool,
    ) -> Result<()> {
        push_refspec(
            dir,
            credentials,
            &format!("refs/tags/{tag}:refs/tags/{tag}"),
            force,
        )
    }

    fn is_local_branch_published(
        &self,
        source_branch: &str,
        working_branch: &str,
        credentials: &Credentials,
        dir: &Path,
    ) -> Result<bool> {
        let Some(local) = resolve(dir, &format!("refs/heads/{working_branch}"))? else {
            debug!("local branch {working_branch:?} based on {source_branch:?} does not exist");
            return Ok(false);
        };

        if !fetch_branch(dir, credentials, working_branch)? {
            return Ok(false);
        }

        let remote = resolve(dir, &format!("refs/remotes/origin/{working_branch}"))?;
        Ok(remote.as_deref() == Some(local.as_str()))
    }

    fn changed_files(&self, dir: &Path) -> Result<Vec<String>> {
        let args = ["status", "--porcelain", "-z", "--untracked-files=all"];
        let output = run_git(dir, &args, &args.join(" "))?;
        Ok(parse_porcelain(&String::from_utf8_lossy(&output.stdout)))
    }

    fn is_similar_branch(&self, a: &str, b: &str, dir: &Path) -> Result<bool> {
        let missing = |branch: &str| BumplineError::Git {
            command: format!("git rev-parse {branch}"),
            stderr: format!("reference {branch:?} not found"),
        };
        let ref_a = resolve_branch(dir, a)?.ok_or_else(|| missing(a))?;
        let ref_b = resolve_branch(dir, b)?.ok_or_else(|| missing(b))?;
        Ok(ref_a == ref_b)
    }

    fn delete_branch(&self, branch: &str, credentials: &Credentials, dir: &Path) -> Result<()> {
        if current_branch(dir).ok().as_deref() == Some(branch) {
            run_git(dir, &["checkout", "--quiet", "--detach"], "checkout --detach")?;
        }
        if resolve(dir, &format!("refs/heads/{branch}"))?.is_some() {
            run_git(dir, &["branch", "-D", branch], &format!("branch -D {branch}"))?;
        }

        let remote = origin_url(dir, credentials)?;
        run_git(
            dir,
            &["push", "--quiet", &remote, "--delete", branch],
            &format!("push origin --delete {branch}"),
        )?;
        Ok(())
    }
}
