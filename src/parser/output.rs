// src/parser/output.rs
// Parses one output artifact: a `# OUT-nnn: Title` heading, a short bullet
// preamble, then the body after the first blank line.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::warn;

use super::first_heading;
use crate::records::Output;
use crate::utils::{parse_timestamp, project_slug_from_path};

pub const DEFAULT_CONTENT_MAX: usize = 16384;

static OUTPUT_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[ \t]+(OUT-\d+):[ \t]+(.+?)[ \t]*$").unwrap());
static TYPE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-[ \t]*Type:[ \t]*(.+?)[ \t]*$").unwrap());
static TASK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-[ \t]*Task:[ \t]*(.+?)[ \t]*$").unwrap());
static MODIFIED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-[ \t]*Last Modified:[ \t]*(.+?)[ \t]*$").unwrap());
static TASK_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T-\d+$").unwrap());

/// Parse an output file. Returns None (with a warning) when the heading does
/// not carry an OUT-nnn id.
pub fn parse_output(path: &Path, content_max: usize) -> Option<Output> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("Could not read output file {}: {}", path.display(), err);
            return None;
        }
    };

    let Some(caps) = first_heading(&text).and_then(|line| OUTPUT_HEADING.captures(line)) else {
        warn!(
            "Output file {} has no OUT-nnn heading, skipping",
            path.display()
        );
        return None;
    };
    let id = caps[1].to_string();
    let title = caps[2].to_string();

    let Some(project) = project_slug_from_path(path) else {
        warn!(
            "Output file {} is not inside a project directory, skipping",
            path.display()
        );
        return None;
    };

    let (preamble, body) = split_at_first_blank_line(&text);

    let output_type = TYPE_LINE
        .captures(preamble)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // An explicit `- Task:` line wins; the per-task subdirectory layout
    // supplies the reference when the line is absent.
    let task = TASK_LINE
        .captures(preamble)
        .map(|caps| caps[1].to_string())
        .or_else(|| task_from_parent_dir(path));

    let last_modified = MODIFIED_LINE
        .captures(preamble)
        .and_then(|caps| parse_timestamp(&caps[1]))
        .unwrap_or_else(Utc::now);

    let content = body
        .map(|body| truncate_to(body.trim(), content_max))
        .filter(|body| !body.is_empty());

    Some(Output {
        id,
        project,
        task,
        title,
        output_type,
        content,
        path: path.display().to_string(),
        last_modified,
    })
}

fn task_from_parent_dir(path: &Path) -> Option<String> {
    let parent = path.parent()?.file_name()?.to_string_lossy().to_string();
    TASK_DIR.is_match(&parent).then_some(parent)
}

/// Split the document into its metadata preamble and the body after the
/// first blank line. No blank line means no body.
fn split_at_first_blank_line(text: &str) -> (&str, Option<&str>) {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            let preamble = &text[..offset];
            return (preamble, Some(&text[offset + line.len()..]));
        }
        offset += line.len();
    }
    (text, None)
}

fn truncate_to(content: &str, max: usize) -> String {
    if content.len() <= max {
        return content.to_string();
    }
    let mut end = max;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    content[..end].to_string()
}
