#[cfg(test)]
mod tests;

use std::path::Path;
use tracing::debug;
use tree_sitter::Node;

/// Symbol assigned to a whole-file chunk when no structural chunking applies.
pub const FILE_SYMBOL: &str = "__file__";

/// How many leading lines of a definition carry its signature and docstring.
const PREAMBLE_LINES: usize = 20;

const PREAMBLE_HEADER: &str = "# Documentation and signature (high weight)\n";
const BODY_HEADER: &str = "\n\n# Full implementation\n";

/// One retrievable unit of source code: a class, a function, or a whole file.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeChunk {
    /// Repository-relative path of the originating file.
    pub file_path: String,
    /// Dotted symbol path, e.g. `Outer.method`, or `__file__`.
    pub symbol: String,
    /// 1-based, inclusive.
    pub start_line: u32,
    /// 1-based, inclusive.
    pub end_line: u32,
    /// Embedding text: signature-weighted preamble followed by the full body.
    pub text: String,
}

impl CodeChunk {
    /// Stable identity of this chunk within the index.
    #[inline]
    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}-{}",
            self.file_path, self.symbol, self.start_line, self.end_line
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    Unknown,
}

impl Language {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") | Some("pyw") => Self::Python,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Class,
    Function,
    AsyncFunction,
    Other,
}

fn classify(node: Node<'_>) -> NodeKind {
    match node.kind() {
        "class_definition" => NodeKind::Class,
        "function_definition" => {
            // The grammar marks async functions with a leading `async` token.
            let is_async = node
                .child(0)
                .is_some_and(|first| first.kind() == "async");
            if is_async {
                NodeKind::AsyncFunction
            } else {
                NodeKind::Function
            }
        }
        _ => NodeKind::Other,
    }
}

/// Split one source file into retrievable chunks.
///
/// Python files are chunked per class and per top-level or method-level
/// function. Files in other languages, unparseable files, and files yielding
/// no definitions (whitespace-only included) all fall back to a single
/// whole-file chunk. Only truly empty text yields nothing.
pub fn chunk_file(file_path: &str, text: &str) -> Vec<CodeChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    if Language::from_path(Path::new(file_path)) != Language::Python {
        return vec![whole_file_chunk(file_path, text)];
    }

    let mut parser = tree_sitter::Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        return vec![whole_file_chunk(file_path, text)];
    }

    let Some(tree) = parser.parse(text, None) else {
        debug!("parser produced no tree for {file_path}, using whole-file chunk");
        return vec![whole_file_chunk(file_path, text)];
    };

    let root = tree.root_node();
    if root.has_error() {
        debug!("syntax errors in {file_path}, using whole-file chunk");
        return vec![whole_file_chunk(file_path, text)];
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut chunks = Vec::new();
    let mut scope: Vec<String> = Vec::new();
    collect_chunks(root, text, &lines, file_path, &mut scope, &mut chunks);

    if chunks.is_empty() {
        return vec![whole_file_chunk(file_path, text)];
    }

    chunks
}

fn collect_chunks(
    node: Node<'_>,
    source: &str,
    lines: &[&str],
    file_path: &str,
    scope: &mut Vec<String>,
    chunks: &mut Vec<CodeChunk>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match classify(child) {
            NodeKind::Class => {
                let name = node_name(child, source);
                chunks.push(definition_chunk(child, lines, file_path, scope, &name));
                // Methods inside the class are chunked as their own units.
                scope.push(name);
                collect_chunks(child, source, lines, file_path, scope, chunks);
                scope.pop();
            }
            NodeKind::Function | NodeKind::AsyncFunction => {
                let name = node_name(child, source);
                chunks.push(definition_chunk(child, lines, file_path, scope, &name));
                // Nested functions stay inside their parent's chunk.
            }
            NodeKind::Other => {
                collect_chunks(child, source, lines, file_path, scope, chunks);
            }
        }
    }
}

fn node_name(node: Node<'_>, source: &str) -> String {
    node.child_by_field_name("name")
        .and_then(|name| source.get(name.start_byte()..name.end_byte()))
        .unwrap_or("<anonymous>")
        .to_string()
}

fn definition_chunk(
    node: Node<'_>,
    lines: &[&str],
    file_path: &str,
    scope: &[String],
    name: &str,
) -> CodeChunk {
    let start_line = node.start_position().row as u32 + 1;
    let end_line = node.end_position().row as u32 + 1;

    let symbol = if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope.join("."), name)
    };

    let body = line_span(lines, start_line, end_line);
    let span = (end_line - start_line + 1) as usize;
    let preamble_end = start_line + (span.min(PREAMBLE_LINES) as u32) - 1;
    let preamble = line_span(lines, start_line, preamble_end);

    let text = format!("{PREAMBLE_HEADER}{preamble}{BODY_HEADER}{body}");

    CodeChunk {
        file_path: file_path.to_string(),
        symbol,
        start_line,
        end_line,
        text,
    }
}

/// Join lines `start..=end` (1-based, inclusive) with newlines.
fn line_span(lines: &[&str], start: u32, end: u32) -> String {
    let from = (start as usize).saturating_sub(1);
    let to = (end as usize).min(lines.len());
    lines[from..to].join("\n")
}

fn whole_file_chunk(file_path: &str, text: &str) -> CodeChunk {
    CodeChunk {
        file_path: file_path.to_string(),
        symbol: FILE_SYMBOL.to_string(),
        start_line: 1,
        end_line: text.lines().count().max(1) as u32,
        text: text.to_string(),
    }
}
