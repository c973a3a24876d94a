use std::fmt::Write;

use crate::pipeline::PipelineReport;

use super::styling::{bright, bright_red, cyan, dim, outcome};

/// Prints a human-readable summary of a pipeline run to stdout.
pub fn print_summary(report: &PipelineReport) {
    println!("{}", render_summary(report));
}

fn add_section_header(output: &mut String, title: &str) {
    let _ = writeln!(output, "{}", bright(title).underlined());
}

pub fn render_summary(report: &PipelineReport) -> String {
    let mut output = String::new();
    let target = &report.target;

    add_section_header(&mut output, "Target");
    let _ = write!(output, "{} {}", outcome(target.outcome), bright(&target.name));
    if target.dry_run {
        let _ = write!(output, " {}", dim("(dry run)"));
    }
    output.push('\n');
    if !target.description.is_empty() {
        let _ = writeln!(output, "  {}", target.description);
    }
    for file in &target.files {
        let _ = writeln!(output, "  {} {}", dim("changed"), file);
    }
    if let Some(scm) = &report.scm {
        let _ = writeln!(output, "  {} {}", dim("scm"), scm);
    }

    if let Some(pull_request) = &report.pull_request {
        output.push('\n');
        add_section_header(&mut output, "Pull request");
        let _ = writeln!(output, "  #{} {}", pull_request.number, cyan(&pull_request.url));
    }

    if report.branch_cleaned {
        let _ = writeln!(output, "\n{}", dim("Working branch deleted"));
    }

    if !report.errors.is_empty() {
        output.push('\n');
        add_section_header(&mut output, "Errors");
        for error in &report.errors {
            let _ = writeln!(output, "  {}", bright_red(error));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::TargetReport;
    use crate::scm::github::PullRequestApi;

    fn plain(report: &PipelineReport) -> String {
        console::strip_ansi_codes(&render_summary(report)).to_string()
    }

    #[test]
    fn test_render_attention_with_pull_request() {
        let report = PipelineReport {
            target: TargetReport::new("go", false).with_change(
                true,
                vec!["go.mod".to_string()],
                "Update \"go.mod\" to \"1.22\"".to_string(),
            ),
            scm: Some("https://github.com/org/repo@main".to_string()),
            pull_request: Some(PullRequestApi {
                number: 7,
                url: "https://github.com/org/repo/pull/7".to_string(),
                ..Default::default()
            }),
            branch_cleaned: false,
            errors: Vec::new(),
        };

        let summary = plain(&report);
        assert!(summary.contains("ATTENTION go"));
        assert!(summary.contains("changed go.mod"));
        assert!(summary.contains("scm https://github.com/org/repo@main"));
        assert!(summary.contains("#7 https://github.com/org/repo/pull/7"));
        assert!(!summary.contains("Errors"));
    }

    #[test]
    fn test_render_failure_lists_errors() {
        let report = PipelineReport {
            target: TargetReport::new("go", true).failed(),
            scm: None,
            pull_request: None,
            branch_cleaned: true,
            errors: vec!["no changed file to commit".to_string()],
        };

        let summary = plain(&report);
        assert!(summary.contains("FAILURE go (dry run)"));
        assert!(summary.contains("Working branch deleted"));
        assert!(summary.contains("no changed file to commit"));
        assert!(!summary.contains("scm "));
    }
}
