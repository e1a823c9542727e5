use std::collections::HashSet;
use std::path::Path;

use super::{
    ConfigMapping, GlobalPart, Guid, LayoutLine, ProjectEntry, ProjectId, ProjectTypeId, Segment,
    Solution, SolutionError, SECTION_INDENT,
};

/// Line-oriented reader that tracks 1-based line numbers for errors.
struct Lines<'a> {
    lines: Vec<&'a str>,
    next: usize,
    path: &'a Path,
}

impl<'a> Lines<'a> {
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = self.lines.get(self.next).copied()?;
        self.next += 1;
        Some((self.next, line))
    }

    fn error(&self, line: usize, message: impl Into<String>) -> SolutionError {
        SolutionError::Parse {
            path: self.path.display().to_string(),
            line,
            message: message.into(),
        }
    }
}

pub(super) fn parse(text: &str, path: &Path) -> Result<Solution, SolutionError> {
    let (bom, text) = match text.strip_prefix('\u{feff}') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let crlf = text.contains("\r\n");
    let final_newline = text.ends_with('\n');

    let mut raw_lines = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect::<Vec<_>>();
    if final_newline {
        raw_lines.pop();
    }

    let mut lines = Lines {
        lines: raw_lines,
        next: 0,
        path,
    };
    let mut solution = Solution {
        path: path.to_path_buf(),
        folder: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        entries: Vec::new(),
        solution_configs: Vec::new(),
        segments: Vec::new(),
        config_layout: Vec::new(),
        config_indent: SECTION_INDENT.to_string(),
        nesting_layout: Vec::new(),
        nesting_indent: SECTION_INDENT.to_string(),
        bom,
        crlf,
        final_newline,
        dirty: false,
    };

    while let Some((number, line)) = lines.next_line() {
        let trimmed = line.trim();
        if trimmed.starts_with("Project(") {
            let entry = parse_project_block(&mut lines, number, line)?;
            if solution.find(&entry.id).is_some() {
                return Err(lines.error(number, format!("duplicate project id {}", entry.id)));
            }
            solution.segments.push(Segment::Project(entry.id.clone()));
            solution.entries.push(entry);
        } else if trimmed == "Global" {
            let segment = parse_global(&mut lines, number, line, &mut solution)?;
            solution.segments.push(segment);
        } else {
            solution.segments.push(Segment::Raw(line.to_string()));
        }
    }

    Ok(solution)
}

fn parse_project_block(
    lines: &mut Lines<'_>,
    number: usize,
    header: &str,
) -> Result<ProjectEntry, SolutionError> {
    let quoted = quoted_values(header);
    let [type_id, name, relative_path, id] = quoted.as_slice() else {
        return Err(lines.error(
            number,
            "expected Project(\"{type}\") = \"name\", \"path\", \"{id}\"",
        ));
    };
    let type_id = ProjectTypeId::parse(type_id)
        .ok_or_else(|| lines.error(number, format!("invalid project type id {type_id}")))?;
    let id = Guid::parse(id)
        .ok_or_else(|| lines.error(number, format!("invalid project id {id}")))?;

    let mut entry = ProjectEntry::new(id, *name, *relative_path, type_id);
    loop {
        let Some((_, line)) = lines.next_line() else {
            return Err(lines.error(number, format!("project '{name}' is missing EndProject")));
        };
        if line.trim() == "EndProject" {
            return Ok(entry);
        }
        entry.body.push(line.to_string());
    }
}

fn parse_global(
    lines: &mut Lines<'_>,
    number: usize,
    open: &str,
    solution: &mut Solution,
) -> Result<Segment, SolutionError> {
    let mut parts: Vec<GlobalPart> = Vec::new();
    loop {
        let Some((section_line, line)) = lines.next_line() else {
            return Err(lines.error(number, "Global is missing EndGlobal"));
        };
        let trimmed = line.trim();
        if trimmed == "EndGlobal" {
            return Ok(Segment::Global {
                open: open.to_string(),
                parts,
                close: line.to_string(),
            });
        }
        let Some(section) = section_name(trimmed) else {
            push_raw(&mut parts, line);
            continue;
        };

        let (body, footer) = read_section(lines, section_line, section)?;
        match section {
            "ProjectConfigurationPlatforms" => {
                read_configurations(&body, solution);
                parts.push(GlobalPart::ProjectConfigurations {
                    header: line.to_string(),
                    footer: footer.to_string(),
                });
            }
            "NestedProjects" => {
                read_nesting(&body, solution);
                parts.push(GlobalPart::NestedProjects {
                    header: line.to_string(),
                    footer: footer.to_string(),
                });
            }
            other => {
                if other == "SolutionConfigurationPlatforms" {
                    solution.solution_configs = body
                        .iter()
                        .filter_map(|l| l.split_once('=').map(|(left, _)| left.trim()))
                        .filter(|left| !left.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                let mut raw = Vec::with_capacity(body.len() + 2);
                raw.push(line.to_string());
                raw.extend(body.iter().map(|l| l.to_string()));
                raw.push(footer.to_string());
                parts.push(GlobalPart::Raw(raw));
            }
        }
    }
}

/// Collect a section's body lines up to its `EndGlobalSection`.
fn read_section<'a>(
    lines: &mut Lines<'a>,
    number: usize,
    section: &str,
) -> Result<(Vec<&'a str>, &'a str), SolutionError> {
    let mut body = Vec::new();
    loop {
        let Some((_, line)) = lines.next_line() else {
            return Err(lines.error(
                number,
                format!("GlobalSection({section}) is missing EndGlobalSection"),
            ));
        };
        if line.trim() == "EndGlobalSection" {
            return Ok((body, line));
        }
        body.push(line);
    }
}

fn read_configurations(body: &[&str], solution: &mut Solution) {
    let declared = solution.solution_configs.clone();
    let mut seen: HashSet<ProjectId> = HashSet::new();
    let mut indent_taken = false;
    for line in body {
        let parsed = parse_config_line(line, &declared).and_then(|(id, mapping)| {
            let entry = solution.entries.iter_mut().find(|e| e.id == id)?;
            entry.configurations.push(mapping);
            Some(id)
        });
        match parsed {
            Some(id) => {
                if !indent_taken {
                    solution.config_indent = leading_whitespace(line).to_string();
                    indent_taken = true;
                }
                if seen.insert(id.clone()) {
                    solution.config_layout.push(LayoutLine::Project(id));
                }
            }
            None => solution
                .config_layout
                .push(LayoutLine::Verbatim(line.to_string())),
        }
    }
}

fn read_nesting(body: &[&str], solution: &mut Solution) {
    let mut indent_taken = false;
    for line in body {
        let parsed = line.split_once('=').and_then(|(child, parent)| {
            let child = Guid::parse(child)?;
            let parent = Guid::parse(parent)?;
            let entry = solution.entries.iter_mut().find(|e| e.id == child)?;
            if entry.parent_id.is_some() {
                return None;
            }
            entry.parent_id = Some(parent);
            Some(child)
        });
        match parsed {
            Some(child) => {
                if !indent_taken {
                    solution.nesting_indent = leading_whitespace(line).to_string();
                    indent_taken = true;
                }
                solution.nesting_layout.push(LayoutLine::Project(child));
            }
            None => solution
                .nesting_layout
                .push(LayoutLine::Verbatim(line.to_string())),
        }
    }
}

/// Split `{ID}.Debug|Any CPU.Build.0 = Debug|Any CPU` into the project id
/// and its mapping. The longest declared solution configuration the key
/// starts with wins, since platforms such as `.NET` contain dots. Otherwise
/// the configuration name ends at the first `.` after the platform
/// separator, since item names such as `Build.0` contain dots.
fn parse_config_line(line: &str, declared: &[String]) -> Option<(ProjectId, ConfigMapping)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let close = key.find('}')?;
    let id = Guid::parse(&key[..=close])?;
    let rest = key[close + 1..].strip_prefix('.')?;

    let known = declared
        .iter()
        .filter(|config| {
            rest.strip_prefix(config.as_str())
                .is_some_and(|tail| tail.len() > 1 && tail.starts_with('.'))
        })
        .map(String::len)
        .max();
    let split_at = match (known, rest.find('|')) {
        (Some(len), _) => len,
        (None, Some(pipe)) => pipe + rest[pipe..].find('.')?,
        (None, None) => rest.find('.')?,
    };
    let (solution_config, item) = (&rest[..split_at], &rest[split_at + 1..]);
    if solution_config.is_empty() || item.is_empty() {
        return None;
    }
    Some((
        id,
        ConfigMapping {
            solution_config: solution_config.to_string(),
            item: item.to_string(),
            value: value.trim().to_string(),
        },
    ))
}

fn section_name(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("GlobalSection(")?;
    let close = rest.find(')')?;
    Some(&rest[..close])
}

fn push_raw(parts: &mut Vec<GlobalPart>, line: &str) {
    if let Some(GlobalPart::Raw(lines)) = parts.last_mut() {
        if !lines.first().is_some_and(|l| l.trim().starts_with("GlobalSection(")) {
            lines.push(line.to_string());
            return;
        }
    }
    parts.push(GlobalPart::Raw(vec![line.to_string()]));
}

fn quoted_values(line: &str) -> Vec<&str> {
    line.split('"').skip(1).step_by(2).collect()
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
