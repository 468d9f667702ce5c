
use crate::{PatchforgeError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Directory names that never contribute retrievable source code.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    "dist",
    "build",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".idea",
    ".vscode",
    "target",
];

/// Marker appended when a file is cut off at the configured character limit.
pub const TRUNCATION_MARKER: &str = "\n\n[truncated]\n";

fn run_git(repo_root: &Path, args: &[&str]) -> Result<String> {
    debug!("running git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .map_err(|e| PatchforgeError::Git(format!("failed to invoke git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PatchforgeError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Current branch name, or `HEAD` when detached.
pub fn current_branch(repo_root: &Path) -> Result<String> {
    let out = run_git(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(out.trim().to_string())
}

/// Full hash of the current HEAD commit.
pub fn head_commit(repo_root: &Path) -> Result<String> {
    let out = run_git(repo_root, &["rev-parse", "HEAD"])?;
    Ok(out.trim().to_string())
}

/// All files tracked by git, as absolute paths under `repo_root`.
pub fn list_tracked_files(repo_root: &Path) -> Result<Vec<PathBuf>> {
    let out = run_git(repo_root, &["ls-files"])?;
    Ok(out
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| repo_root.join(line))
        .collect())
}

/// Dry-run the patch at `patch_path` against the working tree. Returns
/// whether it applies cleanly, along with git's own diagnostics.
pub fn apply_check(repo_root: &Path, patch_path: &Path) -> Result<(bool, String)> {
    let patch = patch_path
        .to_str()
        .ok_or_else(|| PatchforgeError::Git(format!("non-UTF-8 patch path: {patch_path:?}")))?;

    let output = Command::new("git")
        .args(["apply", "--check", "--verbose", patch])
        .current_dir(repo_root)
        .output()
        .map_err(|e| PatchforgeError::Git(format!("failed to invoke git: {e}")))?;

    let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
    diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));

    Ok((output.status.success(), diagnostics.trim().to_string()))
}

/// True when any path component matches one of the excluded directory names.
pub fn is_excluded(repo_root: &Path, path: &Path, excludes: &[&str]) -> bool {
    let relative = path.strip_prefix(repo_root).unwrap_or(path);
    relative.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| excludes.contains(&name))
    })
}

/// Drop files living under excluded directories.
pub fn filter_files(repo_root: &Path, files: Vec<PathBuf>, excludes: &[&str]) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|path| !is_excluded(repo_root, path, excludes))
        .collect()
}

/// Read a file as text, tolerating invalid UTF-8 and capping the result at
/// `max_chars` characters. Replacement characters from lossy decoding are
/// stripped rather than kept, matching what downstream chunking expects.
pub fn read_text_safely(path: &Path, max_chars: usize) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let decoded = String::from_utf8_lossy(&bytes);

    let mut text: String = decoded.chars().filter(|&c| c != '\u{FFFD}').collect();

    if text.chars().count() > max_chars {
        text = text.chars().take(max_chars).collect();
        text.push_str(TRUNCATION_MARKER);
    }

    Ok(text)
}
