//! Launch target discovery.
//!
//! A workspace is scanned for solutions, project files and scripts, then the
//! matches are vetted into the targets a server can be started against.

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use super::DiscoveryError;

/// Files that make a directory launchable.
pub const INCLUDE_PATTERNS: [&str; 5] = [
    "**/*.sln",
    "**/*.csproj",
    "**/project.json",
    "**/*.csx",
    "**/*.cake",
];

/// Directories never scanned.
pub const EXCLUDE_PATTERNS: [&str; 3] = ["**/node_modules", "**/.git", "**/bower_components"];

/// What a launch target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaunchTargetKind {
    Solution,
    ProjectJson,
    Folder,
    Csx,
    Cake,
}

impl fmt::Display for LaunchTargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Solution => "solution",
            Self::ProjectJson => "project.json",
            Self::Folder => "folder",
            Self::Csx => "csx",
            Self::Cake => "cake",
        };
        f.write_str(name)
    }
}

/// A solution, project or folder the server can be started against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchTarget {
    pub label: String,
    pub description: String,
    /// Working directory for the server.
    pub directory: PathBuf,
    /// Value passed with `-s`.
    pub target: PathBuf,
    pub kind: LaunchTargetKind,
}

/// Include/exclude globs for project files.
#[derive(Debug, Clone)]
pub struct ProjectFileMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl ProjectFileMatcher {
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Glob`] if a built-in pattern fails to compile.
    pub fn new() -> Result<Self, DiscoveryError> {
        Ok(Self {
            include: build_set(&INCLUDE_PATTERNS)?,
            exclude: build_set(&EXCLUDE_PATTERNS)?,
        })
    }

    /// True for a project file path relative to the workspace root.
    #[must_use]
    pub fn is_match(&self, relative: &Path) -> bool {
        self.include.is_match(relative) && !self.is_excluded_file(relative)
    }

    /// True for a directory that must not be descended into.
    #[must_use]
    pub fn is_excluded_dir(&self, relative: &Path) -> bool {
        self.exclude.is_match(relative)
    }

    fn is_excluded_file(&self, relative: &Path) -> bool {
        relative.ancestors().skip(1).any(|dir| self.exclude.is_match(dir))
    }
}

fn build_set(patterns: &[&str]) -> Result<GlobSet, DiscoveryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Scan `root` and return its launch targets sorted by directory.
///
/// Stops collecting after `max_results` matching files.
///
/// # Errors
///
/// Returns an error if `root` is not a directory or cannot be read.
pub fn find_launch_targets(
    root: &Path,
    max_results: usize,
) -> Result<Vec<LaunchTarget>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }
    let matcher = ProjectFileMatcher::new()?;
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !matcher.is_excluded_dir(entry.path().strip_prefix(root).unwrap_or(entry.path()))
        });

    for entry in walker {
        if files.len() >= max_results {
            tracing::debug!(max_results, "Reached project scan limit");
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if matcher.is_match(relative) {
            files.push(entry.into_path());
        }
    }

    tracing::debug!(root = %root.display(), matches = files.len(), "Scanned workspace");
    Ok(resources_to_launch_targets(root, &files))
}

/// Turn matching files under `root` into launch targets.
///
/// Solutions are only offered when the workspace has `.csproj` files. Each
/// `project.json` is a target for its directory. The root folder is added when
/// there are `.csproj` files but no solution, or `project.json` files but none
/// at the root. Scripts add a single root-level target per kind.
#[must_use]
pub fn resources_to_launch_targets(root: &Path, files: &[PathBuf]) -> Vec<LaunchTarget> {
    let has_csproj = files.iter().any(|f| has_extension(f, "csproj"));
    let mut has_sln = false;
    let mut has_project_json = false;
    let mut has_project_json_at_root = false;
    let mut has_csx = false;
    let mut has_cake = false;
    let mut targets = Vec::new();

    for file in files {
        let directory = file.parent().unwrap_or(root).to_path_buf();

        if has_csproj && has_extension(file, "sln") {
            has_sln = true;
            targets.push(LaunchTarget {
                label: file_label(file),
                description: relative_description(root, &directory),
                target: file.clone(),
                directory,
                kind: LaunchTargetKind::Solution,
            });
        } else if file.file_name().is_some_and(|name| name == "project.json") {
            has_project_json = true;
            has_project_json_at_root |= directory == root;
            targets.push(LaunchTarget {
                label: file_label(file),
                description: relative_description(root, &directory),
                target: directory.clone(),
                directory,
                kind: LaunchTargetKind::ProjectJson,
            });
        } else if has_extension(file, "csx") {
            has_csx = true;
        } else if has_extension(file, "cake") {
            has_cake = true;
        }
    }

    if (has_csproj && !has_sln) || (has_project_json && !has_project_json_at_root) {
        targets.push(root_target(root, file_label(root), String::new(), LaunchTargetKind::Folder));
    }
    if has_csx {
        targets.push(root_target(root, "CSX".to_string(), file_label(root), LaunchTargetKind::Csx));
    }
    if has_cake {
        targets.push(root_target(root, "Cake".to_string(), file_label(root), LaunchTargetKind::Cake));
    }

    targets.sort_by(|a, b| a.directory.cmp(&b.directory));
    targets
}

fn root_target(root: &Path, label: String, description: String, kind: LaunchTargetKind) -> LaunchTarget {
    LaunchTarget {
        label,
        description,
        directory: root.to_path_buf(),
        target: root.to_path_buf(),
        kind,
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}

fn relative_description(root: &Path, directory: &Path) -> String {
    directory
        .strip_prefix(root)
        .unwrap_or(directory)
        .to_string_lossy()
        .into_owned()
}
