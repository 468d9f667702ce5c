use super::*;

const SAMPLE: &str = r#"import os


def top_level(a, b):
    """Add two numbers."""
    return a + b


class Greeter:
    """Says hello."""

    def greet(self, name):
        def shout(s):
            return s.upper()

        return shout(f"hello {name}")

    async def greet_later(self, name):
        return name
"#;

#[test]
fn test_python_file_chunks_per_definition() {
    let chunks = chunk_file("src/app.py", SAMPLE);
    let symbols: Vec<&str> = chunks.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(
        symbols,
        vec!["top_level", "Greeter", "Greeter.greet", "Greeter.greet_later"]
    );
}

#[test]
fn test_nested_functions_are_not_separate_chunks() {
    let chunks = chunk_file("src/app.py", SAMPLE);
    assert!(chunks.iter().all(|c| !c.symbol.contains("shout")));

    // The nested function stays inside its enclosing method's text.
    let greet = chunks.iter().find(|c| c.symbol == "Greeter.greet").unwrap();
    assert!(greet.text.contains("def shout"));
}

#[test]
fn test_chunk_lines_are_one_based_inclusive() {
    let chunks = chunk_file("src/app.py", SAMPLE);
    let top = chunks.iter().find(|c| c.symbol == "top_level").unwrap();
    assert_eq!(top.start_line, 4);
    assert_eq!(top.end_line, 6);
}

#[test]
fn test_chunk_id_format() {
    let chunks = chunk_file("src/app.py", SAMPLE);
    let top = chunks.iter().find(|c| c.symbol == "top_level").unwrap();
    assert_eq!(top.id(), "src/app.py:top_level:4-6");
}

#[test]
fn test_chunk_text_has_weighted_preamble_and_body() {
    let chunks = chunk_file("src/app.py", SAMPLE);
    let top = chunks.iter().find(|c| c.symbol == "top_level").unwrap();
    assert!(top.text.starts_with("# Documentation and signature"));
    assert!(top.text.contains("# Full implementation"));
    assert!(top.text.contains("\"\"\"Add two numbers.\"\"\""));
}

#[test]
fn test_async_function_is_chunked() {
    let chunks = chunk_file("src/app.py", SAMPLE);
    let later = chunks
        .iter()
        .find(|c| c.symbol == "Greeter.greet_later")
        .unwrap();
    assert!(later.text.contains("async def greet_later"));
}

#[test]
fn test_decorated_function_is_chunked() {
    let source = "@functools.cache\ndef cached(x):\n    return x * 2\n";
    let chunks = chunk_file("m.py", source);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].symbol, "cached");
}

#[test]
fn test_non_python_file_becomes_single_chunk() {
    let source = "fn main() {\n    println!(\"hi\");\n}\n";
    let chunks = chunk_file("src/main.rs", source);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].symbol, FILE_SYMBOL);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 3);
    assert_eq!(chunks[0].text, source);
}

#[test]
fn test_unparseable_python_becomes_single_chunk() {
    let source = "def broken(:\n    ???\n";
    let chunks = chunk_file("bad.py", source);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].symbol, FILE_SYMBOL);
}

#[test]
fn test_python_without_definitions_becomes_single_chunk() {
    let source = "import os\n\nVALUE = 42\n";
    let chunks = chunk_file("consts.py", source);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].symbol, FILE_SYMBOL);
}

#[test]
fn test_empty_file_yields_no_chunks() {
    assert!(chunk_file("empty.py", "").is_empty());
}

#[test]
fn test_whitespace_only_file_becomes_single_chunk() {
    let chunks = chunk_file("blank.py", "   \n\n");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].symbol, FILE_SYMBOL);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 2);
}
