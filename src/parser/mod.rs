// src/parser/mod.rs
// Regex-driven extraction of typed records from human-authored markdown.
// Tolerant everywhere except the one thing that identifies a record: the
// heading pattern. A document whose heading cannot be read has no identity
// and is skipped.

pub mod meta;
pub mod output;
pub mod project;
pub mod rules;
pub mod task;

pub use meta::extract_meta;
pub use output::parse_output;
pub use project::parse_project;
pub use task::parse_task;

/// Body of a `## <name>` section: every line between the heading and the
/// next heading of any level, or the end of the document. Case-insensitive
/// on the section name.
pub(crate) fn section_body(text: &str, name: &str) -> Option<String> {
    let mut lines = text.lines();
    let wanted = name.to_lowercase();

    lines.by_ref().find(|line| {
        let trimmed = line.trim_start();
        trimmed.starts_with('#')
            && trimmed.trim_start_matches('#').trim().to_lowercase() == wanted
    })?;

    let body: Vec<&str> = lines
        .take_while(|line| !line.trim_start().starts_with('#'))
        .collect();

    Some(body.join("\n"))
}

/// The document's first top-level (`# `) heading line, if any.
pub(crate) fn first_heading(text: &str) -> Option<&str> {
    text.lines().find(|line| line.starts_with("# "))
}
