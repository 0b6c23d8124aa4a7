use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::syntax::SyntaxProfile;
use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser, Tree};

/// Raw input of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// External file identifier (usually a relative path)
    pub file_id: String,
    /// Declared language
    pub language: Language,
    /// Raw source text
    pub text: String,
}

impl SourceUnit {
    pub fn new(file_id: impl Into<String>, text: impl Into<String>, language: Language) -> Self {
        Self {
            file_id: file_id.into(),
            language,
            text: text.into(),
        }
    }

    /// Build a unit whose language is inferred from the file id's extension
    pub fn from_path(file_id: impl Into<String>, text: impl Into<String>) -> Self {
        let file_id = file_id.into();
        let language = Language::from_path(&file_id);
        Self::new(file_id, text, language)
    }
}

/// Byte and line range of a node (lines are 1-indexed, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
}

impl SourceSpan {
    pub fn of(node: Node<'_>) -> Self {
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        }
    }

    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    #[must_use]
    pub const fn contains(&self, other: &SourceSpan) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }
}

/// Language-agnostic classification of a structural node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Function,
    Method,
    Class,
    Module,
    Other,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Module => "module",
            Self::Other => "other",
        }
    }

    /// Functions and methods carry signatures and parameters
    #[must_use]
    pub const fn is_callable(self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }
}

/// Parsed source unit: the tree-sitter tree plus the text it was built from
pub struct StructuralTree {
    language: Language,
    source: String,
    tree: Tree,
    profile: &'static SyntaxProfile,
}

impl std::fmt::Debug for StructuralTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralTree")
            .field("language", &self.language)
            .field("bytes", &self.source.len())
            .finish_non_exhaustive()
    }
}

impl StructuralTree {
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn profile(&self) -> &'static SyntaxProfile {
        self.profile
    }

    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source slice covered by a node
    pub fn text_of(&self, node: Node<'_>) -> &str {
        self.source
            .get(node.start_byte()..node.end_byte())
            .unwrap_or_default()
    }

    /// The whole unit as a MODULE node
    pub fn root(&self) -> StructuralNode<'_> {
        let root = self.tree.root_node();
        StructuralNode {
            tree: self,
            outer: root,
            decl: root,
            kind: NodeKind::Module,
            owner: None,
        }
    }

    /// Locate the declaration whose outer span is exactly `span`
    pub fn declaration_at(&self, span: &SourceSpan) -> Option<StructuralNode<'_>> {
        let root = self.tree.root_node();
        let mut node = root.descendant_for_byte_range(span.start_byte, span.end_byte)?;
        loop {
            if node.start_byte() < span.start_byte || node.end_byte() > span.end_byte {
                return None;
            }
            if let Some(found) = self.structural(node) {
                return Some(found);
            }
            node = node.parent()?;
        }
    }

    fn structural<'t>(&'t self, node: Node<'t>) -> Option<StructuralNode<'t>> {
        let decl = if self.profile.is_wrapper(node.kind()) {
            wrapped_definition(node)?
        } else {
            node
        };
        let kind = self.declaration_kind(decl)?;
        let owner = enclosing_owner(self.profile, node);
        let kind = match (kind, owner) {
            (NodeKind::Function, Some(_)) => NodeKind::Method,
            (kind, _) => kind,
        };
        Some(StructuralNode {
            tree: self,
            outer: node,
            decl,
            kind,
            owner,
        })
    }

    fn declaration_kind(&self, node: Node<'_>) -> Option<NodeKind> {
        let kind = node.kind();
        if self.profile.is_function(kind) {
            Some(NodeKind::Function)
        } else if self.profile.is_class(kind) {
            Some(NodeKind::Class)
        } else {
            None
        }
    }

    /// Nearest declarations beneath `start`, in source order, without entering them
    fn collect_declarations<'t>(
        &'t self,
        start: Node<'t>,
        owner: Option<Node<'t>>,
    ) -> Vec<StructuralNode<'t>> {
        let mut found = Vec::new();
        let mut stack: Vec<(Node<'t>, Option<Node<'t>>)> = Vec::new();
        push_children(&mut stack, start, owner);

        while let Some((node, owner)) = stack.pop() {
            let kind = node.kind();
            if self.profile.is_wrapper(kind) {
                if let Some(decl) = wrapped_definition(node) {
                    if let Some(decl_kind) = self.declaration_kind(decl) {
                        found.push(self.make_node(node, decl, decl_kind, owner));
                        continue;
                    }
                }
            }
            if let Some(decl_kind) = self.declaration_kind(node) {
                found.push(self.make_node(node, node, decl_kind, owner));
                continue;
            }
            let owner = if self.profile.is_owner(kind) {
                Some(node)
            } else {
                owner
            };
            push_children(&mut stack, node, owner);
        }

        found
    }

    fn make_node<'t>(
        &'t self,
        outer: Node<'t>,
        decl: Node<'t>,
        kind: NodeKind,
        owner: Option<Node<'t>>,
    ) -> StructuralNode<'t> {
        let kind = match (kind, owner) {
            (NodeKind::Function, Some(_)) => NodeKind::Method,
            (kind, _) => kind,
        };
        StructuralNode {
            tree: self,
            outer,
            decl,
            kind,
            owner,
        }
    }
}

fn push_children<'t>(
    stack: &mut Vec<(Node<'t>, Option<Node<'t>>)>,
    node: Node<'t>,
    owner: Option<Node<'t>>,
) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children.into_iter().rev() {
        stack.push((child, owner));
    }
}

fn wrapped_definition(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("definition")
        .or_else(|| node.child_by_field_name("declaration"))
}

/// Class or impl block that turns a function into a method
fn enclosing_owner<'t>(profile: &SyntaxProfile, node: Node<'t>) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        let kind = ancestor.kind();
        if profile.is_function(kind) {
            return None;
        }
        if profile.is_class(kind) || profile.is_owner(kind) {
            return Some(ancestor);
        }
        current = ancestor.parent();
    }
    None
}

/// A declaration (or the module root) seen through the language-agnostic lens
#[derive(Clone, Copy)]
pub struct StructuralNode<'t> {
    tree: &'t StructuralTree,
    /// Node covering the whole declaration, including decorators / export keyword
    outer: Node<'t>,
    /// The definition node itself
    decl: Node<'t>,
    kind: NodeKind,
    owner: Option<Node<'t>>,
}

impl std::fmt::Debug for StructuralNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralNode")
            .field("kind", &self.kind)
            .field("name", &self.name())
            .field("span", &self.span())
            .finish()
    }
}

impl<'t> StructuralNode<'t> {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn tree(&self) -> &'t StructuralTree {
        self.tree
    }

    /// The definition node
    pub fn syntax(&self) -> Node<'t> {
        self.decl
    }

    /// The node whose span is the chunk span
    pub fn outer_syntax(&self) -> Node<'t> {
        self.outer
    }

    pub fn span(&self) -> SourceSpan {
        SourceSpan::of(self.outer)
    }

    pub fn text(&self) -> &'t str {
        self.tree.text_of(self.outer)
    }

    pub fn name(&self) -> Option<&'t str> {
        if self.kind == NodeKind::Module {
            return None;
        }
        self.decl
            .child_by_field_name("name")
            .map(|name| self.tree.text_of(name))
            .filter(|name| !name.is_empty())
    }

    /// Name of the class / impl target this node is a member of
    pub fn owner_name(&self) -> Option<&'t str> {
        let owner = self.owner?;
        let target = if self.tree.profile.is_owner(owner.kind()) {
            impl_target(owner)
        } else {
            owner.child_by_field_name("name")
        }?;
        Some(self.tree.text_of(target))
    }

    /// Structural children: the nearest nested declarations, in source order
    pub fn children(&self) -> Vec<StructuralNode<'t>> {
        match self.kind {
            NodeKind::Module => self.tree.collect_declarations(self.decl, None),
            NodeKind::Class => self.tree.collect_declarations(self.decl, Some(self.decl)),
            _ => self.tree.collect_declarations(self.decl, None),
        }
    }

    pub fn body(&self) -> Option<Node<'t>> {
        self.decl.child_by_field_name("body")
    }

    pub fn has_body(&self) -> bool {
        self.body().is_some()
    }

    pub fn is_async(&self) -> bool {
        let mut cursor = self.decl.walk();
        let is_async = self.decl.children(&mut cursor).any(|child| match child.kind() {
            "async" => true,
            "function_modifiers" => self.tree.text_of(child).split_whitespace().any(|m| m == "async"),
            _ => false,
        });
        is_async
    }

    /// Decorator / attribute nodes attached to the declaration, in source order
    pub fn decorators(&self) -> Vec<Node<'t>> {
        let profile = self.tree.profile;
        let mut decorators = Vec::new();

        let mut cursor = self.outer.walk();
        decorators.extend(
            self.outer
                .children(&mut cursor)
                .filter(|child| profile.is_decorator(child.kind())),
        );
        if self.decl != self.outer {
            let mut cursor = self.decl.walk();
            decorators.extend(
                self.decl
                    .children(&mut cursor)
                    .filter(|child| profile.is_decorator(child.kind())),
            );
        }

        // Rust attributes are preceding siblings rather than children.
        if self.tree.language == Language::Rust {
            let mut preceding = Vec::new();
            let mut sibling = self.outer.prev_sibling();
            while let Some(node) = sibling {
                if profile.is_decorator(node.kind()) {
                    preceding.push(node);
                } else if !profile.is_comment(node.kind()) {
                    break;
                }
                sibling = node.prev_sibling();
            }
            preceding.reverse();
            preceding.append(&mut decorators);
            decorators = preceding;
        }

        decorators
    }

    pub fn has_decorators(&self) -> bool {
        !self.decorators().is_empty()
    }

    /// Nodes holding the documentation of this declaration
    ///
    /// Python: the leading string statement of the body. Rust: the run of `///` or
    /// `/** */` comments above the item. JS/TS: the `/** */` comment right above it.
    pub fn doc_nodes(&self) -> Vec<Node<'t>> {
        match self.tree.language {
            Language::Python => self.python_docstring().into_iter().collect(),
            Language::Rust => self.rust_doc_comments(),
            Language::JavaScript | Language::TypeScript => self.jsdoc().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_docstring(&self) -> bool {
        !self.doc_nodes().is_empty()
    }

    fn python_docstring(&self) -> Option<Node<'t>> {
        let body = self.body()?;
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|child| child.kind() != "comment")?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        (string.kind() == "string").then_some(string)
    }

    fn rust_doc_comments(&self) -> Vec<Node<'t>> {
        let profile = self.tree.profile;
        let mut docs = Vec::new();
        let mut sibling = self.outer.prev_sibling();
        while let Some(node) = sibling {
            let kind = node.kind();
            if profile.is_decorator(kind) {
                sibling = node.prev_sibling();
                continue;
            }
            if !profile.is_comment(kind) {
                break;
            }
            let text = self.tree.text_of(node);
            let is_doc = (text.starts_with("///") && !text.starts_with("////"))
                || (text.starts_with("/**") && !text.starts_with("/**/"));
            if !is_doc {
                break;
            }
            docs.push(node);
            sibling = node.prev_sibling();
        }
        docs.reverse();
        docs
    }

    fn jsdoc(&self) -> Option<Node<'t>> {
        let previous = self.outer.prev_sibling()?;
        if !self.tree.profile.is_comment(previous.kind()) {
            return None;
        }
        self.tree
            .text_of(previous)
            .starts_with("/**")
            .then_some(previous)
    }
}

/// Name node of the type an `impl` block targets (`impl<T> Foo<T>`, `impl a::Foo`)
fn impl_target(impl_node: Node<'_>) -> Option<Node<'_>> {
    let mut target = impl_node.child_by_field_name("type")?;
    loop {
        match target.kind() {
            "generic_type" => target = target.child_by_field_name("type")?,
            "scoped_type_identifier" => target = target.child_by_field_name("name")?,
            "reference_type" => target = target.child_by_field_name("type")?,
            _ => return Some(target),
        }
    }
}

/// Turns raw text into a [`StructuralTree`]
#[derive(Debug, Clone, Copy)]
pub struct SourceParser {
    max_error_ratio: f32,
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl SourceParser {
    pub const fn new(max_error_ratio: f32) -> Self {
        Self { max_error_ratio }
    }

    /// Parse `text` as `language`
    ///
    /// Fails when the language has no grammar or when syntax errors cover more than
    /// the configured share of the input. Smaller errors stay in the tree.
    pub fn parse(&self, text: &str, language: Language) -> Result<StructuralTree> {
        let profile = SyntaxProfile::for_language(language)
            .ok_or_else(|| ChunkerError::unsupported_language(language.as_str()))?;
        let ts_language = language.tree_sitter_language()?;

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;
        let tree = parser
            .parse(text, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse source code"))?;

        let root = tree.root_node();
        if root.has_error() {
            let ratio = error_ratio(root, text.len());
            if ratio > self.max_error_ratio {
                return Err(ChunkerError::parse(format!(
                    "{:.0}% of the {} source is covered by syntax errors",
                    ratio * 100.0,
                    language
                )));
            }
            log::debug!(
                "Tolerating {:.1}% syntax errors in {} source",
                ratio * 100.0,
                language
            );
        }

        Ok(StructuralTree {
            language,
            source: text.to_string(),
            tree,
            profile,
        })
    }
}

/// Share of bytes covered by top-level ERROR nodes
fn error_ratio(root: Node<'_>, len: usize) -> f32 {
    if len == 0 {
        return 0.0;
    }
    if root.is_error() {
        return 1.0;
    }

    let mut error_bytes = 0usize;
    let mut cursor = root.walk();
    'walk: loop {
        let node = cursor.node();
        let descend = if node.is_error() {
            error_bytes += node.end_byte().saturating_sub(node.start_byte());
            false
        } else {
            node.has_error()
        };
        if descend && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }

    error_bytes as f32 / len as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str, language: Language) -> StructuralTree {
        SourceParser::default().parse(text, language).unwrap()
    }

    #[test]
    fn module_children_are_top_level_declarations() {
        let tree = parse(
            "import os\n\ndef a():\n    pass\n\nclass B:\n    def c(self):\n        pass\n",
            Language::Python,
        );
        let children = tree.root().children();
        let names: Vec<_> = children.iter().map(|c| (c.kind(), c.name())).collect();
        assert_eq!(
            names,
            vec![
                (NodeKind::Function, Some("a")),
                (NodeKind::Class, Some("B")),
            ]
        );

        let methods = children[1].children();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].kind(), NodeKind::Method);
        assert_eq!(methods[0].owner_name(), Some("B"));
    }

    #[test]
    fn decorated_definition_spans_decorators() {
        let source = "@cached\n@trace(level=1)\ndef f(x):\n    return x\n";
        let tree = parse(source, Language::Python);
        let children = tree.root().children();
        assert_eq!(children.len(), 1);
        let node = children[0];
        assert_eq!(node.span().start_byte, 0);
        assert_eq!(node.span().start_line, 1);
        assert!(node.has_decorators());
        assert_eq!(node.decorators().len(), 2);
    }

    #[test]
    fn declaration_at_round_trips_spans() {
        let tree = parse(
            "class A:\n    @staticmethod\n    def m():\n        return 1\n",
            Language::Python,
        );
        let class = tree.root().children()[0];
        let method = class.children()[0];
        let found = tree.declaration_at(&method.span()).unwrap();
        assert_eq!(found.kind(), NodeKind::Method);
        assert_eq!(found.name(), Some("m"));
        assert_eq!(found.owner_name(), Some("A"));
    }

    #[test]
    fn rust_impl_functions_are_methods() {
        let tree = parse(
            "struct Car;\n\nimpl<T> Garage<T> {\n    async fn park(&self) {}\n}\n\nfn free() {}\n",
            Language::Rust,
        );
        let children = tree.root().children();
        let summary: Vec<_> = children
            .iter()
            .map(|c| (c.kind(), c.name(), c.owner_name()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (NodeKind::Class, Some("Car"), None),
                (NodeKind::Method, Some("park"), Some("Garage")),
                (NodeKind::Function, Some("free"), None),
            ]
        );
        assert!(children[1].is_async());
        assert!(!children[2].is_async());
    }

    #[test]
    fn docstring_capability() {
        let tree = parse(
            "def documented():\n    \"\"\"Says hi.\"\"\"\n    return 1\n\ndef bare():\n    return 2\n",
            Language::Python,
        );
        let children = tree.root().children();
        assert!(children[0].has_docstring());
        assert!(!children[1].has_docstring());
        assert!(children[0].has_body());
    }

    #[test]
    fn unsupported_language_is_a_parse_failure() {
        let err = SourceParser::default()
            .parse("# Title", Language::Markdown)
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn mostly_broken_source_is_rejected() {
        let err = SourceParser::new(0.2)
            .parse(")))) }}}} ]]]] )))) }}}}", Language::Python)
            .unwrap_err();
        assert!(matches!(err, ChunkerError::ParseError(_)));
    }

    #[test]
    fn local_syntax_errors_are_tolerated() {
        let source = "fn broken() { let x = ; }\n\nfn fine(a: i32) -> i32 {\n    a\n}\n";
        let tree = parse(source, Language::Rust);
        assert!(tree.root_node().has_error());
        let names: Vec<_> = tree.root().children().iter().filter_map(|c| c.name()).collect();
        assert!(names.contains(&"fine"), "got {names:?}");
    }
}
