
use std::path::Path;
use tracing::{debug, warn};

use crate::llm::{ChatModel, prompts};
use crate::repo;
use crate::{PatchforgeError, Result};

/// A repaired, per-file unified diff ready for merging.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePatch {
    pub rel_path: String,
    pub diff_text: String,
}

/// Structural check for a git-style unified diff. Guards merging, not
/// application; `git apply --check` has the final word.
pub fn looks_like_unified_diff(diff: &str) -> bool {
    diff.starts_with("diff --git ")
        && diff.contains("\n--- ")
        && diff.contains("\n+++ ")
        && diff.contains("\n@@")
}

/// Strip markdown wrapping from a model reply: surrounding whitespace, one
/// leading fence line, and one trailing bare fence. The result ends with a
/// single newline.
pub fn sanitize_diff(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }

    let mut text = lines.join("\n");
    let kept = text.trim_end().len();
    text.truncate(kept);
    if text.is_empty() {
        return String::new();
    }
    text.push('\n');
    text
}

/// Repair the hunk section of a model-produced diff body (everything after
/// the `+++` header line):
/// - text before the first `@@` line is discarded
/// - blank and whitespace-only lines inside hunks are dropped (models emit
///   them where the diff format requires a space-prefixed empty line)
/// - lines already marked `+`, `-`, or space are kept verbatim
/// - any other line is treated as context and gets a space prefix
///
/// Returns the empty string when no hunk content survives.
pub fn repair_hunks(body: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_hunk = false;
    let mut has_content = false;

    for line in body.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
            out.push(line.to_string());
            continue;
        }
        if !in_hunk {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        match line.as_bytes()[0] {
            b'+' | b'-' | b' ' => out.push(line.to_string()),
            _ => out.push(format!(" {line}")),
        }
        has_content = true;
    }

    if !has_content {
        return String::new();
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// git-style header lines for a single-file diff.
pub fn diff_header(rel_path: &str) -> String {
    format!("diff --git a/{rel_path} b/{rel_path}\n--- a/{rel_path}\n+++ b/{rel_path}\n")
}

/// Ask the model for a diff against one file, then sanitize and repair its
/// reply into a structurally sound patch. The model's own headers are
/// replaced with canonical ones.
pub fn generate_file_patch(
    model: &impl ChatModel,
    repo_root: &Path,
    requirement: &str,
    design_notes: &str,
    rel_path: &str,
    max_chars_per_file: usize,
) -> Result<FilePatch> {
    let file_path = repo_root.join(rel_path);
    let content = if file_path.exists() {
        repo::read_text_safely(&file_path, max_chars_per_file)?
    } else {
        debug!("{rel_path} does not exist yet, requesting a creating diff");
        String::new()
    };

    let user = prompts::patch_user(requirement, design_notes, rel_path, &content);
    let raw = model.complete(prompts::PATCH_SYSTEM, &user)?;

    let sanitized = sanitize_diff(&raw);
    let hunks = repair_hunks(&sanitized);
    if hunks.is_empty() {
        warn!("Model reply for {rel_path} contained no hunks");
        return Err(PatchforgeError::EmptyDiff {
            rel_path: rel_path.to_string(),
        });
    }

    let diff_text = format!("{}{hunks}", diff_header(rel_path));
    Ok(FilePatch { rel_path: rel_path.to_string(), diff_text })
}

/// Join per-file patches into one applyable patch. Every input must pass the
/// structural check; an empty input merges to an empty string.
pub fn merge_patches(patches: &[FilePatch]) -> Result<String> {
    if patches.is_empty() {
        return Ok(String::new());
    }

    for patch in patches {
        if !looks_like_unified_diff(&patch.diff_text) {
            return Err(PatchforgeError::MalformedDiff {
                rel_path: patch.rel_path.clone(),
            });
        }
    }

    let mut merged = patches
        .iter()
        .map(|p| p.diff_text.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n");
    merged.push('\n');
    Ok(merged)
}
