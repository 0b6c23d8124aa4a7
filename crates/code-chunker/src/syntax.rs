//! Per-language tables of tree-sitter node kinds.
//!
//! Every structural question the chunker and the metadata extractor ask of a tree
//! ("is this a function?", "is this a decision point?") is answered by looking the node
//! kind up in the [`SyntaxProfile`] of the unit's language.

use crate::language::Language;

/// Node-kind tables for one grammar
#[derive(Debug)]
pub struct SyntaxProfile {
    /// Function / method definitions
    pub function_kinds: &'static [&'static str],
    /// Class-like definitions (classes, structs, enums, traits, interfaces)
    pub class_kinds: &'static [&'static str],
    /// Blocks whose function children are methods of an owner
    pub owner_kinds: &'static [&'static str],
    /// Nodes that wrap a definition without changing its meaning
    pub wrapper_kinds: &'static [&'static str],
    /// Anonymous function expressions
    pub lambda_kinds: &'static [&'static str],
    /// Branch, loop, handler and ternary nodes
    pub decision_kinds: &'static [&'static str],
    /// Binary nodes that may carry a short-circuit operator
    pub boolean_kinds: &'static [&'static str],
    /// Operators counted as decision points on `boolean_kinds`
    pub short_circuit_operators: &'static [&'static str],
    pub call_kinds: &'static [&'static str],
    pub comment_kinds: &'static [&'static str],
    pub import_kinds: &'static [&'static str],
    /// Plain name references
    pub identifier_kinds: &'static [&'static str],
    /// Decorator / attribute nodes
    pub decorator_kinds: &'static [&'static str],
}

impl SyntaxProfile {
    /// Profile for a language with tree-sitter support
    pub fn for_language(language: Language) -> Option<&'static SyntaxProfile> {
        match language {
            Language::Python => Some(&PYTHON),
            Language::Rust => Some(&RUST),
            Language::JavaScript => Some(&JAVASCRIPT),
            Language::TypeScript => Some(&TYPESCRIPT),
            _ => None,
        }
    }

    pub fn is_function(&self, kind: &str) -> bool {
        self.function_kinds.contains(&kind)
    }

    pub fn is_class(&self, kind: &str) -> bool {
        self.class_kinds.contains(&kind)
    }

    pub fn is_owner(&self, kind: &str) -> bool {
        self.owner_kinds.contains(&kind)
    }

    pub fn is_wrapper(&self, kind: &str) -> bool {
        self.wrapper_kinds.contains(&kind)
    }

    pub fn is_lambda(&self, kind: &str) -> bool {
        self.lambda_kinds.contains(&kind)
    }

    pub fn is_decision(&self, kind: &str) -> bool {
        self.decision_kinds.contains(&kind)
    }

    pub fn is_boolean(&self, kind: &str) -> bool {
        self.boolean_kinds.contains(&kind)
    }

    pub fn is_short_circuit(&self, operator: &str) -> bool {
        self.short_circuit_operators.contains(&operator)
    }

    pub fn is_call(&self, kind: &str) -> bool {
        self.call_kinds.contains(&kind)
    }

    pub fn is_comment(&self, kind: &str) -> bool {
        self.comment_kinds.contains(&kind)
    }

    pub fn is_import(&self, kind: &str) -> bool {
        self.import_kinds.contains(&kind)
    }

    pub fn is_identifier(&self, kind: &str) -> bool {
        self.identifier_kinds.contains(&kind)
    }

    pub fn is_decorator(&self, kind: &str) -> bool {
        self.decorator_kinds.contains(&kind)
    }
}

static PYTHON: SyntaxProfile = SyntaxProfile {
    function_kinds: &["function_definition"],
    class_kinds: &["class_definition"],
    owner_kinds: &[],
    wrapper_kinds: &["decorated_definition"],
    lambda_kinds: &["lambda"],
    decision_kinds: &[
        "if_statement",
        "elif_clause",
        "for_statement",
        "while_statement",
        "except_clause",
        "except_group_clause",
        "conditional_expression",
        "for_in_clause",
        "if_clause",
        "case_clause",
    ],
    boolean_kinds: &["boolean_operator"],
    short_circuit_operators: &["and", "or"],
    call_kinds: &["call"],
    comment_kinds: &["comment"],
    import_kinds: &["import_statement", "import_from_statement", "future_import_statement"],
    identifier_kinds: &["identifier"],
    decorator_kinds: &["decorator"],
};

static RUST: SyntaxProfile = SyntaxProfile {
    function_kinds: &["function_item"],
    class_kinds: &["struct_item", "enum_item", "union_item", "trait_item"],
    owner_kinds: &["impl_item"],
    wrapper_kinds: &[],
    lambda_kinds: &["closure_expression"],
    decision_kinds: &[
        "if_expression",
        "while_expression",
        "for_expression",
        "match_arm",
    ],
    boolean_kinds: &["binary_expression"],
    short_circuit_operators: &["&&", "||"],
    call_kinds: &["call_expression", "macro_invocation"],
    comment_kinds: &["line_comment", "block_comment"],
    import_kinds: &["use_declaration"],
    identifier_kinds: &["identifier", "type_identifier"],
    decorator_kinds: &["attribute_item"],
};

static JAVASCRIPT: SyntaxProfile = SyntaxProfile {
    function_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    class_kinds: &["class_declaration"],
    owner_kinds: &[],
    wrapper_kinds: &["export_statement"],
    lambda_kinds: &["arrow_function", "function_expression", "generator_function"],
    decision_kinds: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "catch_clause",
        "ternary_expression",
        "switch_case",
    ],
    boolean_kinds: &["binary_expression"],
    short_circuit_operators: &["&&", "||", "??"],
    call_kinds: &["call_expression", "new_expression"],
    comment_kinds: &["comment"],
    import_kinds: &["import_statement"],
    identifier_kinds: &["identifier"],
    decorator_kinds: &["decorator"],
};

static TYPESCRIPT: SyntaxProfile = SyntaxProfile {
    function_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    class_kinds: &[
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "enum_declaration",
    ],
    owner_kinds: &[],
    wrapper_kinds: &["export_statement"],
    lambda_kinds: &["arrow_function", "function_expression", "generator_function"],
    decision_kinds: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "catch_clause",
        "ternary_expression",
        "switch_case",
    ],
    boolean_kinds: &["binary_expression"],
    short_circuit_operators: &["&&", "||", "??"],
    call_kinds: &["call_expression", "new_expression"],
    comment_kinds: &["comment"],
    import_kinds: &["import_statement"],
    identifier_kinds: &["identifier", "type_identifier"],
    decorator_kinds: &["decorator"],
};
