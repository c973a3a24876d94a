use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use bumpline::config::Manifest;
use bumpline::output;
use bumpline::pipeline::Pipeline;
use bumpline::scm::github::release::{ChangelogCache, ReleaseType};
use bumpline::scm::github::GitHubScm;
use bumpline::target::Options;

#[derive(Parser)]
#[command(name = "bumpline")]
#[command(author, version, about = "Deliver dependency updates as commits and pull requests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write the JSON result to this file.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct ManifestArgs {
    /// Manifest file, defaults to bumpline.{toml,json,yaml,yml}.
    #[arg(short, long, env = "BUMPLINE_CONFIG")]
    config: Option<PathBuf>,
}

impl ManifestArgs {
    fn load(&self) -> Result<Manifest> {
        Manifest::load(self.config.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a value into the target, commit, push and open a pull request.
    Apply {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Source value to apply.
        #[arg(short, long)]
        value: String,

        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        commit: Option<bool>,

        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        push: Option<bool>,

        /// Remove the working directory once done.
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        clean: Option<bool>,

        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        dry_run: Option<bool>,

        /// Delete the working branch when it has nothing to propose.
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        clean_git_branches: Option<bool>,

        /// Only update pull requests that already exist.
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        existing_only: Option<bool>,

        /// Changelog rendered in the pull request body.
        #[arg(long)]
        changelog: Option<String>,
    },

    /// Remove the SCM working directory.
    Clean {
        #[command(flatten)]
        manifest: ManifestArgs,
    },

    /// Read-only queries against the GitHub repository of the manifest.
    Query {
        #[command(flatten)]
        manifest: ManifestArgs,

        #[command(subcommand)]
        query: Query,
    },
}

#[derive(Subcommand)]
enum Query {
    Branches,
    Tags,
    Releases {
        #[arg(long)]
        draft: bool,

        #[arg(long)]
        prerelease: bool,

        /// Only the release marked as latest.
        #[arg(long)]
        latest: bool,
    },
    /// Search repositories, e.g. `org:bumpline topic:go`.
    Repositories { search: String },
    /// Release notes of the given tags.
    Changelog {
        #[arg(required = true)]
        tags: Vec<String>,
    },
}

fn merge(value: Option<bool>, default: bool) -> bool {
    value.unwrap_or(default)
}

impl Cli {
    fn write_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let json_output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Result written to: {}", output_path.display());
        } else {
            println!("{json_output}");
        }
        Ok(())
    }

    async fn execute_apply(
        &self,
        manifest: Manifest,
        value: &str,
        overrides: [Option<bool>; 6],
        changelog: Option<&str>,
    ) -> Result<()> {
        let [commit, push, clean, dry_run, clean_git_branches, existing_only] = overrides;
        let defaults = &manifest.options;
        let options = Options {
            commit: merge(commit, defaults.commit),
            push: merge(push, defaults.push),
            clean: merge(clean, defaults.clean),
            dry_run: merge(dry_run, defaults.dry_run),
            clean_git_branches: merge(clean_git_branches, defaults.clean_git_branches),
            existing_only: merge(existing_only, defaults.existing_only),
        };

        let mut pipeline = Pipeline::new(manifest, options)?;
        if let Some(changelog) = changelog {
            pipeline = pipeline.with_changelog(changelog);
        }

        let report = pipeline.run(value).await;
        output::print_summary(&report);
        if self.output.is_some() {
            self.write_json(&report)?;
        }

        if !report.is_success() {
            anyhow::bail!("pipeline failed");
        }
        Ok(())
    }

    async fn execute_query(&self, github: &GitHubScm, query: &Query) -> Result<()> {
        match query {
            Query::Branches => self.write_json(&github.search_branches().await?),
            Query::Tags => self.write_json(&github.search_tags().await?),
            Query::Releases {
                draft,
                prerelease,
                latest,
            } => {
                let release_type = ReleaseType {
                    draft: *draft,
                    prerelease: *prerelease,
                    latest: *latest,
                    ..Default::default()
                };
                self.write_json(&github.search_releases(release_type).await?)
            }
            Query::Repositories { search } => {
                self.write_json(&github.client().search_repositories(search).await?)
            }
            Query::Changelog { tags } => {
                let mut cache = ChangelogCache::new();
                let mut changelogs = Vec::with_capacity(tags.len());
                for tag in tags {
                    changelogs.push(github.changelog(tag, &mut cache).await?);
                }
                self.write_json(&changelogs)
            }
        }
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Apply {
                manifest,
                value,
                commit,
                push,
                clean,
                dry_run,
                clean_git_branches,
                existing_only,
                changelog,
            } => {
                let manifest = manifest.load()?;
                info!("Applying {value:?} to {:?}", manifest.title());
                self.execute_apply(
                    manifest,
                    value,
                    [
                        *commit,
                        *push,
                        *clean,
                        *dry_run,
                        *clean_git_branches,
                        *existing_only,
                    ],
                    changelog.as_deref(),
                )
                .await
            }
            Commands::Clean { manifest } => {
                let manifest = manifest.load()?;
                let options = manifest.options.clone();
                Pipeline::new(manifest, options)?.clean()?;
                info!("Working directory removed");
                Ok(())
            }
            Commands::Query { manifest, query } => {
                let manifest = manifest.load()?;
                let options = manifest.options.clone();
                let pipeline = Pipeline::new(manifest, options)?;
                let github = pipeline
                    .github()
                    .context("query requires a github scm in the manifest")?;
                self.execute_query(github, query).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags_are_tristate() {
        let cli = Cli::parse_from([
            "bumpline", "apply", "--value", "1.2.3", "--dry-run", "--push=false",
        ]);
        match cli.command {
            Commands::Apply {
                value,
                dry_run,
                push,
                commit,
                ..
            } => {
                assert_eq!(value, "1.2.3");
                assert_eq!(dry_run, Some(true));
                assert_eq!(push, Some(false));
                assert_eq!(commit, None);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_query_changelog_requires_tags() {
        assert!(Cli::try_parse_from(["bumpline", "query", "changelog"]).is_err());
        assert!(Cli::try_parse_from(["bumpline", "query", "changelog", "v1.0.0", "v1.1.0"]).is_ok());
    }
}
