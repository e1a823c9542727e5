use std::collections::HashSet;

use super::{GlobalPart, LayoutLine, ProjectEntry, Segment, Solution};

pub(super) fn serialize(solution: &Solution) -> String {
    let mut out: Vec<String> = Vec::new();
    for segment in &solution.segments {
        match segment {
            Segment::Raw(line) => out.push(line.clone()),
            Segment::Project(id) => {
                if let Some(entry) = solution.find(id) {
                    write_project(entry, &mut out);
                }
            }
            Segment::Global { open, parts, close } => {
                out.push(open.clone());
                for part in parts {
                    match part {
                        GlobalPart::Raw(lines) => out.extend(lines.iter().cloned()),
                        GlobalPart::ProjectConfigurations { header, footer } => {
                            out.push(header.clone());
                            write_configurations(solution, &mut out);
                            out.push(footer.clone());
                        }
                        GlobalPart::NestedProjects { header, footer } => {
                            out.push(header.clone());
                            write_nesting(solution, &mut out);
                            out.push(footer.clone());
                        }
                    }
                }
                out.push(close.clone());
            }
        }
    }

    let newline = if solution.crlf { "\r\n" } else { "\n" };
    let mut text = out.join(newline);
    if solution.final_newline {
        text.push_str(newline);
    }
    text
}

fn write_project(entry: &ProjectEntry, out: &mut Vec<String>) {
    out.push(format!(
        "Project(\"{}\") = \"{}\", \"{}\", \"{}\"",
        entry.type_id, entry.name, entry.relative_path, entry.id
    ));
    out.extend(entry.body.iter().cloned());
    out.push("EndProject".to_string());
}

/// Mappings are written grouped per project at the position of the
/// project's first line; entries new since parsing follow in registration
/// order.
fn write_configurations(solution: &Solution, out: &mut Vec<String>) {
    let indent = &solution.config_indent;
    let mut written = HashSet::new();
    let emit = |entry: &ProjectEntry, out: &mut Vec<String>| {
        for mapping in &entry.configurations {
            out.push(format!(
                "{indent}{}.{}.{} = {}",
                entry.id, mapping.solution_config, mapping.item, mapping.value
            ));
        }
    };

    for line in &solution.config_layout {
        match line {
            LayoutLine::Verbatim(text) => out.push(text.clone()),
            LayoutLine::Project(id) => {
                if let Some(entry) = solution.find(id) {
                    if written.insert(entry.id.clone()) {
                        emit(entry, out);
                    }
                }
            }
        }
    }
    for entry in &solution.entries {
        if !written.contains(&entry.id) {
            emit(entry, out);
        }
    }
}

fn write_nesting(solution: &Solution, out: &mut Vec<String>) {
    let indent = &solution.nesting_indent;
    let mut written = HashSet::new();
    for line in &solution.nesting_layout {
        match line {
            LayoutLine::Verbatim(text) => out.push(text.clone()),
            LayoutLine::Project(id) => {
                let Some(entry) = solution.find(id) else {
                    continue;
                };
                if let Some(parent) = &entry.parent_id {
                    if written.insert(entry.id.clone()) {
                        out.push(format!("{indent}{} = {parent}", entry.id));
                    }
                }
            }
        }
    }
    for entry in &solution.entries {
        if let Some(parent) = &entry.parent_id {
            if !written.contains(&entry.id) {
                out.push(format!("{indent}{} = {parent}", entry.id));
            }
        }
    }
}
