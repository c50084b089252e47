//! Typed view of the paths touched by a commit.

use std::ffi::OsStr;
use std::path::{Component, Path};

use anyhow::{Result, anyhow};

/// How a commit touched a path (from `git diff --name-status --no-renames`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    /// Type changes and anything else git reports.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub kind: ChangeKind,
    pub path: String,
}

/// Paths touched between two revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPathSet {
    entries: Vec<DiffEntry>,
}

impl DiffPathSet {
    pub fn new(entries: Vec<DiffEntry>) -> Self {
        Self { entries }
    }

    /// Parse `git diff --name-status --no-renames` output.
    pub fn parse(output: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for line in output.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_name_status_line(line)?);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.path.as_str()).collect()
    }

    /// Entries located under `dir` (matched by whole path components).
    pub fn under(&self, dir: &str) -> Vec<&DiffEntry> {
        self.entries
            .iter()
            .filter(|entry| is_under(Path::new(&entry.path), Path::new(dir)))
            .collect()
    }
}

fn parse_name_status_line(line: &str) -> Result<DiffEntry> {
    let (code, path) = line
        .split_once('\t')
        .ok_or_else(|| anyhow!("unexpected name-status line: '{line}'"))?;
    let path = path.trim();
    if path.is_empty() {
        return Err(anyhow!("unexpected name-status line: '{line}'"));
    }
    let kind = match code.trim().chars().next() {
        Some('A') => ChangeKind::Added,
        Some('M') => ChangeKind::Modified,
        Some('D') => ChangeKind::Deleted,
        Some(_) => ChangeKind::Other,
        None => return Err(anyhow!("missing status code in line: '{line}'")),
    };
    Ok(DiffEntry {
        kind,
        path: path.to_string(),
    })
}

fn is_under(path: &Path, dir: &Path) -> bool {
    let dir_parts: Vec<&OsStr> = normal_components(dir).collect();
    if dir_parts.is_empty() {
        return false;
    }
    let mut path_parts = normal_components(path);
    for dir_part in dir_parts {
        match path_parts.next() {
            Some(part) if part == dir_part => {}
            _ => return false,
        }
    }
    path_parts.next().is_some()
}

fn normal_components(path: &Path) -> impl Iterator<Item = &OsStr> + '_ {
    path.components().filter_map(|component| match component {
        Component::Normal(name) => Some(name),
        _ => None,
    })
}
