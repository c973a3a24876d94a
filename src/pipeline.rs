//! One pipeline run: apply the target, reconcile the pull request, clean up.

use log::{debug, error, info};
use serde::Serialize;

use crate::config::Manifest;
use crate::error::{BumplineError, Result};
use crate::result::{Outcome, TargetReport};
use crate::scm::github::{GitHubScm, PullRequest, PullRequestApi, PullRequestSpec};
use crate::scm::{Scm, ScmConfig};
use crate::target::{Options, Target};

const NO_CHANGELOG: &str = "no changelog detected";

/// What a pipeline run did.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub target: TargetReport,
    /// Repository and branch the run worked on.
    pub scm: Option<String>,
    pub pull_request: Option<PullRequestApi>,
    pub branch_cleaned: bool,
    /// Errors from every stage, in order.
    pub errors: Vec<String>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.target.outcome != Outcome::Failure
    }
}

pub struct Pipeline {
    manifest: Manifest,
    options: Options,
    scm: Option<Scm>,
    changelog: String,
}

impl Pipeline {
    /// Builds the pipeline and its SCM. Pull request settings are checked here,
    /// before anything touches the network.
    pub fn new(manifest: Manifest, options: Options) -> Result<Self> {
        if let Some(pull_request) = &manifest.pullrequest {
            if !matches!(manifest.scm, Some(ScmConfig::GitHub(_))) {
                return Err(BumplineError::Config(
                    "pullrequest requires a github scm".to_string(),
                ));
            }
            pull_request.validate()?;
        }

        let scm = manifest.scm.as_ref().map(Scm::new).transpose()?;
        Ok(Self::with_scm(manifest, options, scm))
    }

    /// Uses an already built SCM.
    pub fn with_scm(manifest: Manifest, options: Options, scm: Option<Scm>) -> Self {
        Self {
            manifest,
            options,
            scm,
            changelog: String::new(),
        }
    }

    /// Changelog rendered in the pull request body.
    pub fn with_changelog(mut self, changelog: impl Into<String>) -> Self {
        self.changelog = changelog.into();
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn github(&self) -> Option<&GitHubScm> {
        match &self.scm {
            Some(Scm::GitHub(scm)) => Some(scm),
            _ => None,
        }
    }

    pub async fn run(&mut self, source: &str) -> PipelineReport {
        let pipeline_id = self.manifest.pipeline_id().to_string();
        info!("Pipeline {:?}", self.manifest.title());
        let scm = self.scm.as_ref().map(|scm| scm.handler().summary());
        if let Some(summary) = &scm {
            info!("SCM {summary}");
        }

        let result = {
            let mut target = Target::new(self.manifest.target.clone(), &pipeline_id);
            if let Some(scm) = self.scm.as_mut() {
                target = target.with_scm(scm.handler_mut());
            }
            target.run(source, &self.options)
        };

        let mut report = match result {
            Ok(target) => PipelineReport {
                target,
                scm,
                pull_request: None,
                branch_cleaned: false,
                errors: Vec::new(),
            },
            Err(failure) => {
                error!("target {:?}: {}", failure.report.name, failure.error);
                PipelineReport {
                    errors: vec![failure.error.to_string()],
                    target: failure.report,
                    scm,
                    pull_request: None,
                    branch_cleaned: false,
                }
            }
        };

        let target_ok = report.target.outcome != Outcome::Failure;

        if target_ok && self.options.push && !self.options.dry_run {
            if let (Some(github), Some(spec)) = (self.github(), &self.manifest.pullrequest) {
                let outcome = self.pull_request(github, spec, &report.target).await;
                match outcome {
                    Ok(pull_request) => report.pull_request = pull_request,
                    Err(e) => {
                        error!("pull request: {e}");
                        report.errors.push(e.to_string());
                    }
                }
            }
        }

        if let Some(scm) = &self.scm {
            let handler = scm.handler();

            if target_ok && self.options.clean_git_branches && !self.options.dry_run {
                match handler.clean_working_branch() {
                    Ok(cleaned) => report.branch_cleaned = cleaned,
                    Err(e) => {
                        error!("clean working branch: {e}");
                        report.errors.push(e.to_string());
                    }
                }
            }

            if self.options.clean {
                debug!("cleaning {}", handler.directory().display());
                if let Err(e) = handler.clean() {
                    error!("clean: {e}");
                    report.errors.push(e.to_string());
                }
            }
        }

        report
    }

    async fn pull_request(
        &self,
        github: &GitHubScm,
        spec: &PullRequestSpec,
        target: &TargetReport,
    ) -> Result<Option<PullRequestApi>> {
        let changelog = if self.changelog.is_empty() {
            NO_CHANGELOG
        } else {
            &self.changelog
        };

        PullRequest::new(spec.clone(), github)?
            .existing_only(self.options.existing_only)
            .create(self.manifest.title(), changelog, &target.render())
            .await
    }

    /// Removes the SCM working directory.
    pub fn clean(&self) -> Result<()> {
        match &self.scm {
            Some(scm) => scm.handler().clean(),
            None => Err(BumplineError::Config("no scm configured".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use mockito::{Matcher, Server};
    use url::Url;

    use super::*;
    use crate::auth::Token;
    use crate::scm::git::{GitScm, GitSpec};
    use crate::scm::github::client::GitHubClient;
    use crate::scm::github::GitHubSpec;
    use crate::target::resource::ResourceSpec;
    use crate::target::TargetConfig;
    use crate::test_utils::FakeGit;

    fn file_target(file: &str) -> TargetConfig {
        TargetConfig {
            name: "version".to_string(),
            resource: ResourceSpec {
                kind: "file".to_string(),
                spec: serde_json::json!({ "file": file }),
            },
            ..Default::default()
        }
    }

    fn manifest(file: &str) -> Manifest {
        Manifest {
            name: "Bump version".to_string(),
            pipelineid: "42".to_string(),
            target: file_target(file),
            ..Default::default()
        }
    }

    fn git_scm(dir: &Path, native: Arc<FakeGit>) -> Scm {
        Scm::Git(
            GitScm::with_native(
                GitSpec {
                    url: "https://example.com/org/repo.git".to_string(),
                    directory: Some(dir.to_path_buf()),
                    workingbranch: Some(true),
                    ..Default::default()
                },
                native,
            )
            .unwrap(),
        )
    }

    fn github_scm(server: &mockito::ServerGuard, dir: &Path, native: Arc<FakeGit>) -> Scm {
        let endpoint = Url::parse(&format!("{}/graphql", server.url())).unwrap();
        let client = GitHubClient::with_endpoint(endpoint, Token::from("t")).unwrap();
        Scm::GitHub(
            GitHubScm::with_native(
                GitHubSpec {
                    owner: "org".to_string(),
                    repository: "repo".to_string(),
                    token: Token::from("t"),
                    directory: Some(dir.to_path_buf()),
                    ..Default::default()
                },
                native,
            )
            .unwrap()
            .with_client(client),
        )
    }

    const PULL_REQUEST: &str = r#"{"id":"PR_1","number":7,"title":"Bump version","body":"","baseRefName":"main","headRefName":"bumpline_main_42","state":"OPEN","url":"https://github.com/org/repo/pull/7"}"#;

    fn respond(server: &mut mockito::ServerGuard, operation: &str, data: &str) -> mockito::Mock {
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJsonString(format!(
                r#"{{"operationName":"{operation}"}}"#
            )))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"data":{data}}}"#))
    }

    #[test]
    fn test_pull_request_requires_github() {
        let manifest = Manifest {
            pullrequest: Some(PullRequestSpec::default()),
            ..manifest("VERSION")
        };
        let err = Pipeline::new(manifest, Options::default()).err().unwrap();
        assert_eq!(
            err.to_string(),
            "invalid configuration: pullrequest requires a github scm"
        );
    }

    #[tokio::test]
    async fn test_run_without_scm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VERSION");
        std::fs::write(&path, "1.0.0").unwrap();

        let mut pipeline =
            Pipeline::new(manifest(path.to_str().unwrap()), Options::default()).unwrap();
        let report = pipeline.run("1.1.0").await;

        assert!(report.is_success());
        assert_eq!(report.scm, None);
        assert_eq!(report.target.outcome, Outcome::Attention);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1.1.0");
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let mut pipeline = Pipeline::new(manifest("/nonexistent/VERSION"), Options::default()).unwrap();
        let report = pipeline.run("1.1.0").await;

        assert!(!report.is_success());
        assert_eq!(report.target.outcome, Outcome::Failure);
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_git_change_is_committed_and_pushed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VERSION"), "1.0.0").unwrap();
        let native = Arc::new(FakeGit::default());

        let mut pipeline = Pipeline::with_scm(
            manifest("VERSION"),
            Options::default(),
            Some(git_scm(dir.path(), native.clone())),
        );
        let report = pipeline.run("1.1.0").await;

        assert!(report.is_success());
        assert_eq!(
            report.scm.as_deref(),
            Some("https://example.com/org/repo.git@main")
        );
        assert_eq!(native.checkouts(), vec!["main->bumpline_main_42"]);
        assert_eq!(native.adds(), vec!["VERSION"]);
        assert!(native.commits()[0].starts_with("chore: Update \"VERSION\" to \"1.1.0\""));
        assert_eq!(native.pushes(), vec!["HEAD force=false"]);
    }

    #[tokio::test]
    async fn test_clean_removes_working_directory() {
        let parent = tempfile::tempdir().unwrap();
        let dir = parent.path().join("clone");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("VERSION"), "1.1.0").unwrap();

        let options = Options {
            clean: true,
            ..Options::default()
        };
        let mut pipeline = Pipeline::with_scm(
            manifest("VERSION"),
            options,
            Some(git_scm(&dir, Arc::new(FakeGit::default()))),
        );
        let report = pipeline.run("1.1.0").await;

        assert!(report.is_success());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_clean_git_branches_deletes_unchanged_working_branch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VERSION"), "1.1.0").unwrap();
        let native = Arc::new(FakeGit::default());
        native.set_similar(true);

        let options = Options {
            clean_git_branches: true,
            ..Options::default()
        };
        let mut pipeline = Pipeline::with_scm(
            manifest("VERSION"),
            options,
            Some(git_scm(dir.path(), native.clone())),
        );
        let report = pipeline.run("1.1.0").await;

        assert_eq!(report.target.outcome, Outcome::Success);
        assert!(report.branch_cleaned);
        assert_eq!(native.deleted_branches(), vec!["bumpline_main_42"]);
    }

    #[tokio::test]
    async fn test_github_change_opens_pull_request() {
        let mut server = Server::new_async().await;
        respond(
            &mut server,
            "FindPullRequest",
            &format!(r#"{{"repository":{{"pullRequests":{{"nodes":[{PULL_REQUEST}]}}}}}}"#),
        )
        .create_async()
        .await;
        let empty_labels =
            r#"{"totalCount":0,"pageInfo":{"hasNextPage":false,"hasPreviousPage":false},"nodes":[]}"#;
        respond(
            &mut server,
            "RepositoryLabels",
            &format!(r#"{{"repository":{{"labels":{empty_labels}}}}}"#),
        )
        .create_async()
        .await;
        respond(
            &mut server,
            "PullRequestLabels",
            &format!(r#"{{"repository":{{"pullRequest":{{"labels":{empty_labels}}}}}}}"#),
        )
        .create_async()
        .await;
        let update = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJsonString(
                    r#"{"operationName":"UpdatePullRequest","variables":{"input":{"title":"Bump version"}}}"#
                        .to_string(),
                ),
                Matcher::Regex("ATTENTION - version".to_string()),
                Matcher::Regex("1.1.0 release notes".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"data":{{"updatePullRequest":{{"pullRequest":{PULL_REQUEST}}}}}}}"#
            ))
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VERSION"), "1.0.0").unwrap();
        let native = Arc::new(FakeGit::default());

        let manifest = Manifest {
            pullrequest: Some(PullRequestSpec::default()),
            ..manifest("VERSION")
        };
        let mut pipeline = Pipeline::with_scm(
            manifest,
            Options::default(),
            Some(github_scm(&server, dir.path(), native.clone())),
        )
        .with_changelog("1.1.0 release notes");
        let report = pipeline.run("1.1.0").await;

        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.pull_request.map(|pr| pr.number), Some(7));
        assert_eq!(native.pushes(), vec!["HEAD force=true"]);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_dry_run_leaves_everything_untouched() {
        let mut server = Server::new_async().await;
        let any = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VERSION"), "1.0.0").unwrap();
        let native = Arc::new(FakeGit::default());

        let manifest = Manifest {
            pullrequest: Some(PullRequestSpec::default()),
            ..manifest("VERSION")
        };
        let options = Options {
            dry_run: true,
            ..Options::default()
        };
        let mut pipeline = Pipeline::with_scm(
            manifest,
            options,
            Some(github_scm(&server, dir.path(), native.clone())),
        );
        let report = pipeline.run("1.1.0").await;

        assert_eq!(report.target.outcome, Outcome::Attention);
        assert!(report.target.dry_run);
        assert!(native.commits().is_empty());
        assert!(native.pushes().is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("VERSION")).unwrap(), "1.0.0");
        any.assert_async().await;
    }

    #[test]
    fn test_clean_without_scm_is_error() {
        let pipeline = Pipeline::with_scm(manifest("VERSION"), Options::default(), None);
        assert!(pipeline.clean().is_err());
    }
}
