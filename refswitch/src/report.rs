use colored::Colorize;

use crate::consistency::{
    CleanFilesReport, CleanupReport, DanglingReason, FileScanReport, OrphanReason,
    ReferenceReport,
};
use crate::engine::{ConversionReport, Direction, Plan, PlannedConversion};
use crate::inspect::{InspectNode, InspectReport};
use crate::issues::{Issue, Severity};
use crate::operation::OperationOutcome;

/// Render an operation outcome for terminal output.
pub fn render_text(outcome: &OperationOutcome) -> String {
    match outcome {
        OperationOutcome::ToProject(report) | OperationOutcome::ToPackage(report) => {
            render_conversion(report)
        }
        OperationOutcome::ScanReferences(report) => render_references(report),
        OperationOutcome::CleanupReferences(report) => render_cleanup(report),
        OperationOutcome::ScanFiles(report) => render_file_scan(report),
        OperationOutcome::CleanFiles(outcome) => {
            let mut out = render_file_scan(&outcome.scan);
            out.push('\n');
            out.push('\n');
            out.push_str(&render_clean_files(&outcome.clean));
            out
        }
        OperationOutcome::Inspect(report) => render_inspect(report),
        OperationOutcome::Plan(plan) => render_plan(plan),
    }
}

/// Render converted, unconverted and failed references.
pub fn render_conversion(report: &ConversionReport) -> String {
    let title = match report.direction {
        Direction::ToProject => "to-project",
        Direction::ToPackage => "to-package",
    };
    let mut out = Vec::new();
    out.push(format!("{title} {}", report.solution.display()).bold().to_string());

    out.push("converted".to_string());
    if report.converted.is_empty() {
        out.push("- none".to_string());
    }
    for item in &report.converted {
        out.push(
            format!("+ {}: {} {}", item.project, item.reference, item.detail)
                .green()
                .to_string(),
        );
    }
    if !report.unconverted.is_empty() {
        out.push("unconverted".to_string());
        for item in &report.unconverted {
            out.push(format!("~ {}: {} ({})", item.project, item.reference, item.detail));
        }
    }
    if !report.failed.is_empty() {
        out.push("failed".to_string());
        for item in &report.failed {
            out.push(
                format!(
                    "! {}: {} [{}] {}",
                    item.project, item.reference, item.code, item.message
                )
                .red()
                .to_string(),
            );
        }
    }
    for name in &report.registered {
        out.push(format!("registered {name} in solution").cyan().to_string());
    }
    for name in &report.unregistered {
        out.push(format!("removed {name} from solution").cyan().to_string());
    }
    append_issues(&mut out, &report.warnings);
    out.push(
        format!(
            "summary converted={} unconverted={} failed={} solution_written={}",
            report.converted.len(),
            report.unconverted.len(),
            report.failed.len(),
            report.solution_written
        )
        .cyan()
        .to_string(),
    );
    out.join("\n")
}

pub fn render_references(report: &ReferenceReport) -> String {
    let mut out = Vec::new();
    out.push(format!("scan-references {}", report.solution.display()).bold().to_string());

    out.push("dangling".to_string());
    if report.dangling.is_empty() {
        out.push("- none".to_string());
    }
    for item in &report.dangling {
        let reason = match item.reason {
            DanglingReason::UnknownProject => "unknown project",
            DanglingReason::TargetMissingOnDisk => "target missing on disk",
        };
        out.push(
            format!("! {}: {} -> {} ({reason})", item.project, item.reference, item.include)
                .red()
                .to_string(),
        );
    }

    out.push("orphans".to_string());
    if report.orphans.is_empty() {
        out.push("- none".to_string());
    }
    for orphan in &report.orphans {
        let line = format!("- {} {} {}", orphan.name, orphan.path, orphan.id);
        match orphan.reason {
            OrphanReason::MissingOnDisk => {
                out.push(format!("{line} (missing on disk)").red().to_string())
            }
            OrphanReason::Unreferenced => out.push(format!("{line} (unreferenced)")),
        }
    }

    if !report.missing_mappings.is_empty() {
        out.push("missing_configurations".to_string());
        for item in &report.missing_mappings {
            out.push(
                format!("! {}: {}", item.project, item.solution_config)
                    .yellow()
                    .to_string(),
            );
        }
    }
    append_issues(&mut out, &report.warnings);
    out.join("\n")
}

pub fn render_cleanup(report: &CleanupReport) -> String {
    let mut out = Vec::new();
    out.push(format!("cleanup-references {}", report.solution.display()).bold().to_string());
    out.push("removed".to_string());
    if report.removed.is_empty() {
        out.push("- none".to_string());
    }
    for item in &report.removed {
        out.push(
            format!("- {}: {} -> {}", item.project, item.reference, item.include)
                .green()
                .to_string(),
        );
    }
    append_issues(&mut out, &report.failed);
    append_issues(&mut out, &report.warnings);
    out.join("\n")
}

pub fn render_file_scan(report: &FileScanReport) -> String {
    let mut out = Vec::new();
    out.push(format!("scan-files {}", report.solution.display()).bold().to_string());
    out.push("undeclared_files".to_string());
    if report.files.is_empty() {
        out.push("- none".to_string());
    }
    for file in &report.files {
        out.push(format!("? {}: {}", file.project, file.relative).yellow().to_string());
    }
    if !report.skipped.is_empty() {
        out.push("skipped".to_string());
        for skipped in &report.skipped {
            out.push(format!("- {}: {}", skipped.project, skipped.reason));
        }
    }
    append_issues(&mut out, &report.warnings);
    out.join("\n")
}

pub fn render_clean_files(report: &CleanFilesReport) -> String {
    let mut out = Vec::new();
    out.push("deleted".to_string());
    if report.deleted.is_empty() {
        out.push("- none".to_string());
    }
    for path in &report.deleted {
        out.push(format!("- {}", path.display()).red().to_string());
    }
    append_issues(&mut out, &report.failed);
    out.join("\n")
}

pub fn render_inspect(report: &InspectReport) -> String {
    let mut out = Vec::new();
    out.push(report.solution.display().to_string().bold().to_string());
    out.push(format!("configurations: {}", report.solution_configs.join(", ")));
    for node in &report.hierarchy {
        render_node(node, 0, &mut out);
    }
    for group in &report.by_type {
        out.push(group.type_name.cyan().to_string());
        for project in &group.projects {
            out.push(format!("  {} ({})", project.name, project.path));
            if !project.configurations.is_empty() {
                out.push(format!("    {}", project.configurations.join(", ")));
            }
        }
    }
    append_issues(&mut out, &report.warnings);
    out.join("\n")
}

fn render_node(node: &InspectNode, depth: usize, out: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    out.push(format!(
        "{indent}{} [{}] {}",
        node.name, node.type_name, node.path
    ));
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

pub fn render_plan(plan: &Plan) -> String {
    let mut out = Vec::new();
    out.push(format!("plan {}", plan.solution.display()).bold().to_string());
    out.push("candidates".to_string());
    if plan.candidates.is_empty() {
        out.push("- none".to_string());
    }
    for candidate in &plan.candidates {
        let state = if candidate.registered { "registered" } else { "not registered" };
        out.push(format!(
            "- {} ({}) {} [{state}]",
            candidate.output_name, candidate.name, candidate.path
        ));
    }
    out.push("to-project".to_string());
    append_planned(&mut out, &plan.to_project);
    out.push("to-package".to_string());
    append_planned(&mut out, &plan.to_package);
    append_issues(&mut out, &plan.warnings);
    out.join("\n")
}

fn append_planned(out: &mut Vec<String>, items: &[PlannedConversion]) {
    if items.is_empty() {
        out.push("- none".to_string());
        return;
    }
    for item in items {
        let version = item.version.as_deref().unwrap_or("?");
        let line = format!(
            "- {}: {} {version} -> {}",
            item.project, item.reference, item.target
        );
        match &item.blocked {
            Some(reason) => out.push(format!("{line} (blocked: {reason})").yellow().to_string()),
            None => out.push(line),
        }
    }
}

fn append_issues(out: &mut Vec<String>, issues: &[Issue]) {
    for issue in issues {
        let line = format!("{} [{}] {}", severity_label(issue.severity), issue.code, issue.message);
        let line = match issue.severity {
            Severity::Error => line.red().to_string(),
            Severity::Warning => line.yellow().to_string(),
            Severity::Info => line,
        };
        out.push(line);
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::render_conversion;
    use crate::engine::{ConversionItem, ConversionReport, Direction, FailedItem};

    #[test]
    fn conversion_lists_each_section() {
        colored::control::set_override(false);
        let report = ConversionReport {
            direction: Direction::ToProject,
            solution: PathBuf::from("/work/Legacy.sln"),
            converted: vec![ConversionItem {
                project: "App".to_string(),
                reference: "Foo".to_string(),
                detail: r"assembly 1.2.3 -> ..\mixin\Foo\Foo.csproj".to_string(),
            }],
            failed: vec![FailedItem {
                project: "App".to_string(),
                reference: "Bar".to_string(),
                code: "cycle_detected".to_string(),
                message: "referencing Bar from App would create a reference cycle".to_string(),
            }],
            ..ConversionReport::default()
        };
        let text = render_conversion(&report);
        assert!(text.contains("+ App: Foo assembly 1.2.3"));
        assert!(text.contains("! App: Bar [cycle_detected]"));
        assert!(text.contains("summary converted=1 unconverted=0 failed=1 solution_written=false"));
    }
}
