//! Prompt templates for the planning and diff-generation stages.

pub const PLANNER_SYSTEM: &str = "\
You are a senior software engineer planning a minimal code change.
You are given a requirement and a set of code snippets retrieved from the
repository. Decide which existing files must be modified and which new files
must be created to satisfy the requirement with the smallest reasonable
change. Prefer touching existing files over creating new ones.

Respond with a single JSON object and nothing else, using exactly this shape:
{
  \"files_to_modify\": [{\"path\": \"relative/path.py\", \"reason\": \"why\"}],
  \"new_files\": [{\"path\": \"relative/path.py\", \"reason\": \"why\"}],
  \"design_notes\": [\"short note\"],
  \"test_notes\": [\"short note\"]
}
Paths must be relative to the repository root. Do not invent files that the
snippets give you no evidence for.";

pub const PATCH_SYSTEM: &str = "\
You are a senior software engineer producing a patch for one file.
Output a unified diff for that single file and nothing else: no prose, no
explanations, no markdown fences. The diff must start with a
'diff --git a/<path> b/<path>' line followed by '---' and '+++' headers and
'@@' hunks. Context lines must appear exactly as in the original file.
Keep the change minimal; do not reformat or reorder unrelated code.";

pub fn planner_user(requirement: &str, snippets: &str) -> String {
    format!(
        "Requirement:\n{requirement}\n\n\
         Retrieved code snippets (most relevant first):\n\n{snippets}\n"
    )
}

pub fn patch_user(requirement: &str, design_notes: &str, rel_path: &str, content: &str) -> String {
    format!(
        "Requirement:\n{requirement}\n\n\
         Design notes from the change plan:\n{design_notes}\n\n\
         Produce a unified diff for the file `{rel_path}`.\n\
         If the file content below is empty, the file does not exist yet and\n\
         your diff must create it.\n\n\
         Current content of {rel_path}:\n\
         <<<FILE\n{content}\nFILE\n"
    )
}
