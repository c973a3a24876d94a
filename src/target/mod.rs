//! Target executor.
//!
//! A [`Target`] writes one source value into one resource, optionally
//! through an SCM. Each run yields a [`TargetReport`] on success or a
//! [`TargetFailure`] carrying the FAILURE report and the stage error.

pub mod resource;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{BumplineError, Result};
use crate::result::{TargetFailure, TargetReport};
use crate::scm::ScmHandler;
use crate::transformer::Transformers;
use resource::{Resource, ResourceSpec};

/// Apply-time policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub commit: bool,
    pub push: bool,
    /// Remove the SCM working directory once done.
    pub clean: bool,
    #[serde(rename = "dryrun")]
    pub dry_run: bool,
    #[serde(rename = "cleangitbranches")]
    pub clean_git_branches: bool,
    #[serde(rename = "existingonly")]
    pub existing_only: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            commit: true,
            push: true,
            clean: false,
            dry_run: false,
            clean_git_branches: false,
            existing_only: false,
        }
    }
}

/// Target settings from the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub name: String,
    #[serde(rename = "sourceid")]
    pub source_id: String,
    #[serde(rename = "scmid")]
    pub scm_id: String,
    pub transformers: Transformers,
    #[serde(flatten)]
    pub resource: ResourceSpec,
}

impl TargetConfig {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BumplineError::MissingParameters {
                kind: "target".to_string(),
                params: "name".to_string(),
            });
        }
        Ok(())
    }
}

type ResourceFactory<'a> = Box<dyn Fn(&ResourceSpec) -> Result<Box<dyn Resource>> + 'a>;

/// One apply unit of a pipeline.
pub struct Target<'a> {
    config: TargetConfig,
    pipeline_id: String,
    scm: Option<&'a mut dyn ScmHandler>,
    factory: ResourceFactory<'a>,
}

impl<'a> Target<'a> {
    pub fn new(config: TargetConfig, pipeline_id: &str) -> Self {
        Self {
            config,
            pipeline_id: pipeline_id.to_string(),
            scm: None,
            factory: Box::new(resource::build),
        }
    }

    /// Routes the change through `scm`.
    pub fn with_scm(mut self, scm: &'a mut dyn ScmHandler) -> Self {
        self.scm = Some(scm);
        self
    }

    /// Overrides how the resource is built from its spec.
    pub fn with_resource_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ResourceSpec) -> Result<Box<dyn Resource>> + 'a,
    {
        self.factory = Box::new(factory);
        self
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Applies `source` to the target.
    pub fn run(
        &mut self,
        source: &str,
        options: &Options,
    ) -> std::result::Result<TargetReport, TargetFailure> {
        let report = TargetReport::new(&self.config.name, options.dry_run);
        let fail = |report: &TargetReport, error| TargetFailure::new(report.clone(), error);

        let source = if self.config.transformers.is_empty() {
            source.to_string()
        } else {
            self.config
                .transformers
                .apply(source)
                .map_err(|e| fail(&report, e))?
        };

        if options.dry_run {
            info!("**Dry Run enabled**");
        }

        let resource = (self.factory)(&self.config.resource).map_err(|e| fail(&report, e))?;

        let Some(scm) = self.scm.as_deref_mut() else {
            let changed = resource
                .apply(&source, options.dry_run)
                .map_err(|e| fail(&report, e))?;
            let description = if changed {
                format!("{:?} updated to {source:?}", self.config.name)
            } else {
                String::new()
            };
            return Ok(report.with_change(changed, Vec::new(), description));
        };

        self.config.validate().map_err(|e| fail(&report, e))?;

        scm.init(&self.pipeline_id).map_err(|e| fail(&report, e))?;
        scm.checkout().map_err(|e| fail(&report, e))?;

        let change = resource
            .apply_in_scm(&source, &*scm, options.dry_run)
            .map_err(|e| fail(&report, e))?;

        if !change.changed {
            if options.push && !options.dry_run {
                let up_to_date = scm
                    .is_remote_branch_up_to_date()
                    .map_err(|e| fail(&report, e))?;
                if !up_to_date {
                    info!("Pushing local commits not yet published on {}", scm.url());
                    scm.push().map_err(|e| fail(&report, e))?;
                }
            }
            return Ok(report.with_change(false, Vec::new(), String::new()));
        }

        let report = report.with_change(true, change.files.clone(), change.message.clone());
        if options.dry_run {
            return Ok(report);
        }

        if change.message.is_empty() {
            return Err(fail(&report, BumplineError::NoChangeMessage));
        }
        if change.files.is_empty() {
            return Err(fail(&report, BumplineError::NoChangedFiles));
        }

        if options.commit {
            scm.add(&change.files).map_err(|e| fail(&report, e))?;
            scm.commit(&change.message).map_err(|e| fail(&report, e))?;
        }

        if options.push {
            scm.push().map_err(|e| fail(&report, e))?;
        }

        Ok(report)
    }
}
