use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::scm::github::PullRequestSpec;
use crate::scm::ScmConfig;
use crate::target::{Options, TargetConfig};

const CANDIDATES: [&str; 4] = ["bumpline.toml", "bumpline.json", "bumpline.yaml", "bumpline.yml"];

/// Pipeline manifest.
///
/// One manifest describes one target, the SCM it writes through and the
/// pull request opened for the change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Pipeline title, also the default pull request title.
    pub name: String,

    /// Identifies the pipeline in working branch names.
    pub pipelineid: String,

    pub scm: Option<ScmConfig>,

    pub target: TargetConfig,

    /// Pull request settings, GitHub SCM only.
    pub pullrequest: Option<PullRequestSpec>,

    /// Defaults for the `apply` flags.
    pub options: Options,
}

impl Manifest {
    /// Load a manifest.
    ///
    /// Without `path`, looks for `bumpline.toml`, `bumpline.json`,
    /// `bumpline.yaml` then `bumpline.yml` in the current directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::find_in(Path::new(".")),
        }
    }

    fn find_in(dir: &Path) -> Result<Self> {
        for candidate in &CANDIDATES {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }
        anyhow::bail!(
            "No manifest found in {}, expected one of {}",
            dir.display(),
            CANDIDATES.join(", ")
        )
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML manifest: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON manifest: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML manifest: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse manifest: {}", path.display())),
        }
    }

    /// `pipelineid`, falling back to the pipeline then the target name.
    pub fn pipeline_id(&self) -> &str {
        [&self.pipelineid, &self.name, &self.target.name]
            .into_iter()
            .find(|id| !id.is_empty())
            .map(String::as_str)
            .unwrap_or("bumpline")
    }

    pub fn title(&self) -> &str {
        if self.name.is_empty() {
            &self.target.name
        } else {
            &self.name
        }
    }
}
