//! Resources a target writes the source value into.

use std::path::Path;

use log::{debug, info};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{BumplineError, Result};
use crate::scm::ScmHandler;

/// What an SCM-aware apply changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScmChange {
    pub changed: bool,
    /// Paths relative to the SCM working directory.
    pub files: Vec<String>,
    /// Change description, becomes the commit message.
    pub message: String,
}

/// A writable resource.
pub trait Resource {
    /// Applies `source` outside of any SCM. Returns whether something changed.
    fn apply(&self, source: &str, dry_run: bool) -> Result<bool>;

    /// Applies `source` inside the working directory of `scm`.
    fn apply_in_scm(&self, source: &str, scm: &dyn ScmHandler, dry_run: bool)
        -> Result<ScmChange>;
}

/// Resource kind and its raw settings, decoded when the target runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSpec {
    pub kind: String,
    pub spec: serde_json::Value,
}

/// Builds the resource described by `spec`.
pub fn build(spec: &ResourceSpec) -> Result<Box<dyn Resource>> {
    match spec.kind.as_str() {
        "file" => {
            let file: FileSpec = serde_json::from_value(spec.spec.clone())?;
            Ok(Box::new(FileResource::new(file)?))
        }
        "" => Err(BumplineError::Resource("missing resource kind".to_string())),
        other => Err(BumplineError::Resource(format!(
            "unsupported resource kind {other:?}"
        ))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSpec {
    pub file: String,
    /// Regex whose every match is replaced. The whole file is replaced when empty.
    pub matchpattern: String,
}

/// Plain file on disk.
#[derive(Debug)]
pub struct FileResource {
    spec: FileSpec,
    pattern: Option<Regex>,
}

impl FileResource {
    pub fn new(spec: FileSpec) -> Result<Self> {
        if spec.file.is_empty() {
            return Err(BumplineError::MissingParameters {
                kind: "file".to_string(),
                params: "file".to_string(),
            });
        }
        let pattern = if spec.matchpattern.is_empty() {
            None
        } else {
            Some(Regex::new(&spec.matchpattern)?)
        };
        Ok(Self { spec, pattern })
    }

    fn render(&self, current: &str, value: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern.replace_all(current, NoExpand(value)).into_owned(),
            None => value.to_string(),
        }
    }

    fn update(&self, path: &Path, value: &str, dry_run: bool) -> Result<bool> {
        let current = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BumplineError::Resource(format!(
                    "file {} does not exist",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let expected = self.render(&current, value);
        if expected == current {
            info!("Content of {} already up to date", path.display());
            return Ok(false);
        }

        if dry_run {
            info!("[dry run] {} would be updated to {value:?}", path.display());
        } else {
            debug!("writing {}", path.display());
            std::fs::write(path, expected)?;
            info!("{} updated to {value:?}", path.display());
        }
        Ok(true)
    }

    fn message(&self, value: &str) -> String {
        format!("Update \"{}\" to \"{}\"", self.spec.file, value)
    }
}

impl Resource for FileResource {
    fn apply(&self, source: &str, dry_run: bool) -> Result<bool> {
        self.update(Path::new(&self.spec.file), source, dry_run)
    }

    fn apply_in_scm(
        &self,
        source: &str,
        scm: &dyn ScmHandler,
        dry_run: bool,
    ) -> Result<ScmChange> {
        let path = scm.directory().join(&self.spec.file);
        if !self.update(&path, source, dry_run)? {
            return Ok(ScmChange::default());
        }

        Ok(ScmChange {
            changed: true,
            files: vec![self.spec.file.clone()],
            message: self.message(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingScm;

    fn file_resource(file: &str, matchpattern: &str) -> FileResource {
        FileResource::new(FileSpec {
            file: file.to_string(),
            matchpattern: matchpattern.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_build_rejects_unknown_kind() {
        let err = build(&ResourceSpec {
            kind: "helmchart".to_string(),
            spec: serde_json::Value::Null,
        })
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "resource error: unsupported resource kind \"helmchart\"");

        assert!(build(&ResourceSpec::default()).is_err());
    }

    #[test]
    fn test_build_file_requires_path() {
        let err = build(&ResourceSpec {
            kind: "file".to_string(),
            spec: serde_json::json!({ "matchpattern": "x" }),
        })
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "file parameter(s) required: [file]");
    }

    #[test]
    fn test_apply_replaces_matches_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("go.mod");
        std::fs::write(&path, "module x\n\ngo 1.21\n").unwrap();

        let resource = file_resource(path.to_str().unwrap(), r"go \d+\.\d+");
        assert!(resource.apply("go 1.22", false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "module x\n\ngo 1.22\n");

        assert!(!resource.apply("go 1.22", false).unwrap());
    }

    #[test]
    fn test_apply_replacement_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VERSION");
        std::fs::write(&path, "v1").unwrap();

        let resource = file_resource(path.to_str().unwrap(), "v1");
        resource.apply("$1-literal", false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "$1-literal");
    }

    #[test]
    fn test_dry_run_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VERSION");
        std::fs::write(&path, "1.0.0").unwrap();

        let resource = file_resource(path.to_str().unwrap(), "");
        assert!(resource.apply("2.0.0", true).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1.0.0");
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let resource = file_resource("/nonexistent/bumpline/VERSION", "");
        let err = resource.apply("1", false).unwrap_err();
        assert!(matches!(err, BumplineError::Resource(_)));
    }

    #[test]
    fn test_apply_in_scm_is_relative_to_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VERSION"), "1.0.0").unwrap();
        let scm = RecordingScm::new(dir.path());

        let resource = file_resource("VERSION", "");
        let change = resource.apply_in_scm("1.1.0", &scm, false).unwrap();

        assert_eq!(
            change,
            ScmChange {
                changed: true,
                files: vec!["VERSION".to_string()],
                message: "Update \"VERSION\" to \"1.1.0\"".to_string(),
            }
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("VERSION")).unwrap(), "1.1.0");

        let unchanged = resource.apply_in_scm("1.1.0", &scm, false).unwrap();
        assert_eq!(unchanged, ScmChange::default());
    }
}
