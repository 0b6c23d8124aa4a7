use crate::error::{FacetExtractionError, FacetResult};
use crate::walk::is_malformed;
use codeintel_code_chunker::{Language, StructuralNode};
use once_cell::sync::Lazy;
use regex::Regex;

static PY_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)^[rRuUbBfF]{0,2}(?:"""(.*)"""|'''(.*)'''|"(.*)"|'(.*)')$"#)
        .expect("valid docstring regex")
});

/// Documentation attached to the declaration, `None` when there is none
pub(crate) fn docstring(node: &StructuralNode<'_>) -> FacetResult<Option<String>> {
    let tree = node.tree();
    let doc_nodes = node.doc_nodes();
    if doc_nodes.is_empty() {
        return Ok(None);
    }
    if doc_nodes.iter().copied().any(is_malformed) {
        return Err(FacetExtractionError::Syntax("docstring"));
    }

    let raw: Vec<&str> = doc_nodes.iter().map(|doc| tree.text_of(*doc)).collect();
    let text = match tree.language() {
        Language::Python => python_docstring(raw[0]),
        _ => raw
            .iter()
            .map(|comment| comment_body(comment))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    let text = text.trim().to_string();
    Ok((!text.is_empty()).then_some(text))
}

fn python_docstring(literal: &str) -> String {
    let body = PY_STRING
        .captures(literal.trim())
        .and_then(|caps| (1..=4).find_map(|i| caps.get(i)))
        .map_or(literal, |m| m.as_str());
    dedent(body)
}

/// Remove the common indentation of all lines after the first
fn dedent(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().trim();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = vec![first.to_string()];
    out.extend(rest.iter().map(|line| {
        line.get(indent..)
            .unwrap_or_else(|| line.trim_start())
            .trim_end()
            .to_string()
    }));
    out.join("\n")
}

/// Text of a `///` or `/** */` comment without its markers
fn comment_body(comment: &str) -> String {
    let comment = comment.trim();
    if let Some(line) = comment.strip_prefix("///") {
        return line.strip_prefix(' ').unwrap_or(line).trim_end().to_string();
    }
    let inner = comment
        .strip_prefix("/**")
        .and_then(|rest| rest.strip_suffix("*/"))
        .unwrap_or(comment);
    inner
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line).trim_end()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_code_chunker::{SourceParser, StructuralTree};
    use pretty_assertions::assert_eq;

    fn doc_of(source: &str, language: Language) -> Option<String> {
        let tree: StructuralTree = SourceParser::default().parse(source, language).unwrap();
        let node = tree.root().children().into_iter().next().expect("declaration");
        docstring(&node).unwrap()
    }

    #[test]
    fn python_docstrings_are_dedented() {
        let source = "def f():\n    \"\"\"Summary line.\n\n    Details here.\n    \"\"\"\n    return 1\n";
        assert_eq!(
            doc_of(source, Language::Python),
            Some("Summary line.\n\nDetails here.".to_string())
        );
        assert_eq!(
            doc_of("class A:\n    r'raw doc'\n", Language::Python),
            Some("raw doc".to_string())
        );
    }

    #[test]
    fn missing_docstring_is_none() {
        assert_eq!(doc_of("def f():\n    return 1\n", Language::Python), None);
        assert_eq!(doc_of("def f():\n    x = \"not a doc\"\n", Language::Python), None);
        assert_eq!(doc_of("// plain comment\nfn f() {}\n", Language::Rust), None);
        assert_eq!(doc_of("/* not jsdoc */\nfunction f() {}\n", Language::JavaScript), None);
    }

    #[test]
    fn empty_docstring_is_none() {
        assert_eq!(doc_of("def f():\n    \"\"\"   \"\"\"\n", Language::Python), None);
    }

    #[test]
    fn rust_doc_comments_span_attributes() {
        let source = "/// Adds numbers.\n///\n/// Saturating.\n#[inline]\nfn add(a: u8, b: u8) -> u8 { a.saturating_add(b) }\n";
        assert_eq!(
            doc_of(source, Language::Rust),
            Some("Adds numbers.\n\nSaturating.".to_string())
        );
    }

    #[test]
    fn jsdoc_blocks() {
        let source = "/**\n * Loads a file.\n * @param path file path\n */\nfunction load(path) {}\n";
        assert_eq!(
            doc_of(source, Language::JavaScript),
            Some("Loads a file.\n@param path file path".to_string())
        );
    }
}
