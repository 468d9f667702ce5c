
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{ChatModel, prompts};
use crate::{PatchforgeError, Result};

const EXCERPT_CHARS: usize = 400;

/// The model's change plan: which files to touch and why.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChangePlan {
    pub files_to_modify: Vec<PlanTarget>,
    pub new_files: Vec<PlanTarget>,
    pub design_notes: Vec<String>,
    pub test_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanTarget {
    pub path: String,
    #[serde(default)]
    pub reason: String,
}

impl ChangePlan {
    /// All target paths: files to modify first, then new files, with
    /// duplicates removed while preserving order.
    pub fn target_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for target in self.files_to_modify.iter().chain(self.new_files.iter()) {
            if !paths.contains(&target.path) {
                paths.push(target.path.clone());
            }
        }
        paths
    }
}

/// Ask the model for a change plan and parse its reply.
pub fn plan_changes(
    model: &impl ChatModel,
    requirement: &str,
    snippets: &str,
) -> Result<ChangePlan> {
    let user = prompts::planner_user(requirement, snippets);
    let raw = model.complete(prompts::PLANNER_SYSTEM, &user)?;
    parse_plan(&raw)
}

/// Parse a change plan out of a model reply, tolerating common formatting
/// noise. Strategies are tried in order; the first JSON object that
/// deserializes wins.
pub fn parse_plan(raw: &str) -> Result<ChangePlan> {
    let strategies: [(&str, fn(&str) -> Option<String>); 3] = [
        ("direct", |s| Some(s.trim().to_string())),
        ("fenced-block", extract_fenced_block),
        ("brace-slice", extract_brace_slice),
    ];

    for (name, extract) in strategies {
        let Some(candidate) = extract(raw) else {
            debug!("Plan parse strategy {name} produced no candidate");
            continue;
        };
        match serde_json::from_str::<ChangePlan>(&candidate) {
            Ok(plan) => {
                debug!("Plan parsed with strategy {name}");
                return Ok(plan);
            }
            Err(e) => debug!("Plan parse strategy {name} failed: {e}"),
        }
    }

    Err(PatchforgeError::MalformedPlan {
        excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
    })
}

/// Contents of the first markdown code fence, if any. An opening fence may
/// carry a language tag; the block ends at the next bare fence line.
fn extract_fenced_block(raw: &str) -> Option<String> {
    let mut inside = false;
    let mut lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if !inside {
            if trimmed.starts_with("```") {
                inside = true;
            }
            continue;
        }
        if trimmed == "```" {
            return Some(lines.join("\n"));
        }
        lines.push(line);
    }

    None
}

/// The substring from the first `{` to the last `}` inclusive.
fn extract_brace_slice(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}
