use crate::error::{FacetExtractionError, FacetResult};
use crate::walk::{is_malformed, walk_subtree};
use codeintel_code_chunker::tree_sitter::Node;
use codeintel_code_chunker::{Complexity, LambdaPolicy, Language, StructuralNode, StructuralTree};

/// Cyclomatic complexity and LOC of a declaration
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer {
    lambda_policy: LambdaPolicy,
}

impl ComplexityAnalyzer {
    pub fn new(lambda_policy: LambdaPolicy) -> Self {
        Self { lambda_policy }
    }

    /// Complexity of `node` plus the number of syntax nodes inspected
    ///
    /// Nested declarations inside the span count towards the enclosing chunk as well.
    /// Lambda bodies count unless the policy skips them.
    pub fn analyze(&self, node: &StructuralNode<'_>) -> (FacetResult<Complexity>, usize) {
        let decl = node.syntax();
        let language = node.tree().language();
        let (cyclomatic, visited) = self.cyclomatic(node);

        if is_malformed(decl) {
            return (Err(FacetExtractionError::Syntax("complexity")), visited);
        }

        let complexity = Complexity {
            cyclomatic,
            loc: count_loc(node.text(), language),
        };
        (Ok(complexity), visited)
    }

    fn cyclomatic(&self, node: &StructuralNode<'_>) -> (u32, usize) {
        let tree = node.tree();
        let profile = tree.profile();
        let root = node.outer_syntax();
        let skip_lambdas = self.lambda_policy == LambdaPolicy::Skip;

        let mut decisions = 0u32;
        let visited = walk_subtree(root, |current| {
            let kind = current.kind();
            if skip_lambdas && current != root && profile.is_lambda(kind) {
                return false;
            }
            if profile.is_decision(kind) {
                if !adds_no_path(tree, current) {
                    decisions += 1;
                }
            } else if profile.is_boolean(kind) {
                let short_circuit = current
                    .child_by_field_name("operator")
                    .is_some_and(|op| profile.is_short_circuit(op.kind()));
                if short_circuit {
                    decisions += 1;
                }
            }
            true
        });

        (1 + decisions, visited)
    }
}

/// `_ =>` arms and bare `case _:` add no path, like `default:` in a switch.
/// A `case` guard is part of its case, as a Rust arm guard is part of its arm.
fn adds_no_path(tree: &StructuralTree, node: Node<'_>) -> bool {
    match node.kind() {
        "if_clause" => node.parent().is_some_and(|parent| parent.kind() == "case_clause"),
        "match_arm" => node
            .child_by_field_name("pattern")
            .is_some_and(|pattern| tree.text_of(pattern).trim() == "_"),
        "case_clause" => {
            if node.child_by_field_name("guard").is_some() {
                return false;
            }
            let mut cursor = node.walk();
            let patterns: Vec<_> = node
                .named_children(&mut cursor)
                .filter(|child| child.kind() == "case_pattern")
                .collect();
            patterns.len() == 1 && tree.text_of(patterns[0]).trim() == "_"
        }
        _ => false,
    }
}

/// Non-blank lines that are not entirely comment
pub fn count_loc(text: &str, language: Language) -> u32 {
    let prefixes = language.comment_prefixes();
    let block = language.block_comment();
    let mut in_block = false;
    let mut loc = 0u32;

    for line in text.lines() {
        let mut rest = line.trim();
        let mut has_code = false;

        while !rest.is_empty() {
            if in_block {
                let Some((_, close)) = block else {
                    break;
                };
                match rest.find(close) {
                    Some(end) => {
                        in_block = false;
                        rest = rest[end + close.len()..].trim_start();
                    }
                    None => rest = "",
                }
                continue;
            }

            if prefixes.iter().any(|prefix| rest.starts_with(prefix)) {
                break;
            }
            if let Some((open, _)) = block {
                if rest.starts_with(open) {
                    in_block = true;
                    rest = &rest[open.len()..];
                    continue;
                }
            }
            has_code = true;
            break;
        }

        if has_code {
            loc += 1;
        }
    }
    loc
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_code_chunker::{NodeKind, SourceParser};
    use pretty_assertions::assert_eq;

    fn first_function(tree: &StructuralTree) -> StructuralNode<'_> {
        fn find<'t>(node: StructuralNode<'t>) -> Option<StructuralNode<'t>> {
            node.children().into_iter().find_map(|child| {
                if child.kind().is_callable() {
                    Some(child)
                } else {
                    find(child)
                }
            })
        }
        find(tree.root()).expect("function")
    }

    fn cyclomatic(source: &str, language: Language, policy: LambdaPolicy) -> u32 {
        let tree = SourceParser::default().parse(source, language).unwrap();
        let node = first_function(&tree);
        let (complexity, _) = ComplexityAnalyzer::new(policy).analyze(&node);
        complexity.unwrap().cyclomatic
    }

    #[test]
    fn empty_function_is_one() {
        assert_eq!(cyclomatic("def f():\n    pass\n", Language::Python, LambdaPolicy::Fold), 1);
        assert_eq!(cyclomatic("fn f() {}\n", Language::Rust, LambdaPolicy::Fold), 1);
        assert_eq!(cyclomatic("function f() {}\n", Language::JavaScript, LambdaPolicy::Fold), 1);
    }

    #[test]
    fn python_decision_points() {
        let source = r#"
def f(items, flag):
    for item in items:
        if item and flag:
            continue
        elif item or not flag:
            pass
    while flag:
        try:
            flag = False
        except ValueError:
            pass
    return 1 if flag else 2
"#;
        // for, if, and, elif, or, while, except, ternary
        assert_eq!(cyclomatic(source, Language::Python, LambdaPolicy::Fold), 9);
    }

    #[test]
    fn rust_match_arms_and_short_circuit() {
        let source = r#"
fn classify(n: i32, strict: bool) -> &'static str {
    match n {
        0 => "zero",
        x if x < 0 => "negative",
        _ => {
            if strict && n > 100 || n == 42 { "big" } else { "small" }
        }
    }
}
"#;
        // two arms (`_` adds no path), if, &&, ||
        assert_eq!(cyclomatic(source, Language::Rust, LambdaPolicy::Fold), 6);
    }

    #[test]
    fn catch_all_branches_count_the_same_everywhere() {
        let rust = "fn f(n: u8) -> u8 {\n    match n {\n        0 => 1,\n        1 => 2,\n        _ => 3,\n    }\n}\n";
        let python = "def f(n):\n    match n:\n        case 0:\n            return 1\n        case 1:\n            return 2\n        case _:\n            return 3\n";
        let js = "function f(n) {\n  switch (n) {\n    case 0: return 1;\n    case 1: return 2;\n    default: return 3;\n  }\n}\n";
        assert_eq!(cyclomatic(rust, Language::Rust, LambdaPolicy::Fold), 3);
        assert_eq!(cyclomatic(python, Language::Python, LambdaPolicy::Fold), 3);
        assert_eq!(cyclomatic(js, Language::JavaScript, LambdaPolicy::Fold), 3);

        // a guarded wildcard is one decision, its guard included
        let guarded = "def f(n):\n    match n:\n        case 0:\n            return 1\n        case _ if n > 9:\n            return 2\n";
        assert_eq!(cyclomatic(guarded, Language::Python, LambdaPolicy::Fold), 3);
    }

    #[test]
    fn decorator_arguments_are_part_of_the_chunk() {
        let source = "@retry(attempts=3 if strict else 1)\ndef f():\n    pass\n";
        assert_eq!(cyclomatic(source, Language::Python, LambdaPolicy::Fold), 2);
    }

    #[test]
    fn arithmetic_operators_are_not_decisions() {
        let source = "function f(a, b) { return a + b * (a - b); }\n";
        assert_eq!(cyclomatic(source, Language::JavaScript, LambdaPolicy::Fold), 1);
    }

    #[test]
    fn lambda_policy_controls_folding() {
        let source = "def f(xs):\n    return list(map(lambda x: 1 if x else 0, xs))\n";
        assert_eq!(cyclomatic(source, Language::Python, LambdaPolicy::Fold), 2);
        assert_eq!(cyclomatic(source, Language::Python, LambdaPolicy::Skip), 1);
    }

    #[test]
    fn nested_declarations_count_towards_the_outer_chunk() {
        let source = "def outer(x):\n    def inner(y):\n        if y:\n            return 1\n    return inner(x)\n";
        let tree = SourceParser::default().parse(source, Language::Python).unwrap();
        let outer = first_function(&tree);
        assert_eq!(outer.kind(), NodeKind::Function);
        let (complexity, visited) = ComplexityAnalyzer::default().analyze(&outer);
        assert_eq!(complexity.unwrap().cyclomatic, 2);
        assert!(visited > 10);
    }

    #[test]
    fn loc_skips_blank_and_comment_lines() {
        let python = "def f():\n    # comment\n\n    x = 1  # trailing\n    return x\n";
        assert_eq!(count_loc(python, Language::Python), 3);

        let rust = "fn f() {\n    /* block\n       still block */\n    let x = 1; /* inline */\n    // line\n    x\n}\n";
        assert_eq!(count_loc(rust, Language::Rust), 4);

        let js = "/** doc */ function f() {\n  return 1;\n}\n";
        assert_eq!(count_loc(js, Language::JavaScript), 3);
    }

    #[test]
    fn loc_of_empty_text_is_zero() {
        assert_eq!(count_loc("", Language::Rust), 0);
        assert_eq!(count_loc("\n\n   \n", Language::PlainText), 0);
    }
}
