// src/scanner/mod.rs
// Walks the workspace root and feeds every project directory through the
// document parsers. A missing root yields an empty result so deployments
// without filesystem access keep serving.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::parser::project::PROJECT_DIR_PREFIX;
use crate::parser::{parse_output, parse_project, parse_task};
use crate::records::{Output, Project, Snapshot, Task};

pub struct WorkspaceScanner {
    root: PathBuf,
    content_max: usize,
}

/// Everything one pass over the workspace produced.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub outputs: Vec<Output>,
    pub stats: ScanStats,
}

/// Per-scan counters, logged after every sync.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    pub project_dirs: usize,
    pub files_seen: usize,
    pub files_skipped: usize,
}

impl ScanResult {
    pub fn into_snapshot(self, last_sync: Option<String>) -> Snapshot {
        Snapshot::new(self.projects, self.tasks, self.outputs, last_sync)
    }
}

impl WorkspaceScanner {
    pub fn new(root: impl Into<PathBuf>, content_max: usize) -> Self {
        Self {
            root: root.into(),
            content_max,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan every `project-*` directory under the root. Blocking; callers on
    /// the async side run this through `spawn_blocking`.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut result = ScanResult::default();

        if !self.root.exists() {
            debug!(
                "Workspace root {} does not exist, returning empty scan",
                self.root.display()
            );
            return Ok(result);
        }

        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read workspace root {}", self.root.display()))?;

        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(PROJECT_DIR_PREFIX) {
                continue;
            }

            result.stats.project_dirs += 1;
            self.scan_project_dir(&dir, &mut result);
        }

        info!(
            "Scanned {}: {} projects, {} tasks, {} outputs ({} files, {} skipped)",
            self.root.display(),
            result.projects.len(),
            result.tasks.len(),
            result.outputs.len(),
            result.stats.files_seen,
            result.stats.files_skipped,
        );

        Ok(result)
    }

    fn scan_project_dir(&self, dir: &Path, result: &mut ScanResult) {
        // A directory without an overview contributes no project record but
        // its tasks and outputs are still enumerated.
        result.stats.files_seen += 1;
        match parse_project(dir) {
            Some(project) => result.projects.push(project),
            None => result.stats.files_skipped += 1,
        }

        self.scan_tasks(dir, result);
        self.scan_outputs(dir, result);
    }

    fn scan_tasks(&self, dir: &Path, result: &mut ScanResult) {
        let pattern = dir.join("tasks").join("T-*.md");
        let paths = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths,
            Err(err) => {
                warn!("Bad task glob for {}: {}", dir.display(), err);
                return;
            }
        };

        for path in paths.flatten() {
            result.stats.files_seen += 1;
            match parse_task(&path) {
                Some(task) => result.tasks.push(task),
                None => result.stats.files_skipped += 1,
            }
        }
    }

    fn scan_outputs(&self, dir: &Path, result: &mut ScanResult) {
        let outputs_dir = dir.join("outputs");
        if !outputs_dir.is_dir() {
            return;
        }

        // Entries are either flat markdown files or per-task subdirectories
        // of markdown files; both layouts are supported.
        for entry in WalkDir::new(&outputs_dir).min_depth(1).max_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error walking {}: {}", outputs_dir.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().map(|ext| ext != "md").unwrap_or(true) {
                continue;
            }

            result.stats.files_seen += 1;
            match parse_output(entry.path(), self.content_max) {
                Some(output) => result.outputs.push(output),
                None => result.stats.files_skipped += 1,
            }
        }
    }
}
