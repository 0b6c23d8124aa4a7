//! Body facets: imported names in use and static call targets.

use crate::error::{FacetExtractionError, FacetResult};
use crate::import_index::ModuleImportIndex;
use crate::walk::{is_malformed, walk_subtree};
use codeintel_code_chunker::tree_sitter::Node;
use codeintel_code_chunker::{ImportUse, LambdaPolicy, StructuralNode, StructuralTree};
use std::collections::BTreeSet;

/// Imported names referenced inside the chunk (decorators included), resolved through the index
pub(crate) fn imports_used(
    node: &StructuralNode<'_>,
    index: &ModuleImportIndex,
    policy: LambdaPolicy,
) -> (FacetResult<BTreeSet<ImportUse>>, usize) {
    let tree = node.tree();
    let profile = tree.profile();
    let root = node.outer_syntax();
    let mut used = BTreeSet::new();

    let visited = walk_subtree(root, |current| {
        if skips(tree, policy, root, current) {
            return false;
        }
        if profile.is_identifier(current.kind()) && !is_member_or_keyword_name(current) {
            let name = tree.text_of(current);
            if let Some(origin) = index.get(name) {
                used.insert(ImportUse {
                    name: name.to_string(),
                    module: origin.module.clone(),
                });
            }
        }
        true
    });

    (Ok(used), visited)
}

/// Call targets that resolve to a name or a static attribute chain
pub(crate) fn calls_made(
    node: &StructuralNode<'_>,
    policy: LambdaPolicy,
) -> (FacetResult<BTreeSet<String>>, usize) {
    let tree = node.tree();
    let profile = tree.profile();
    let root = node.outer_syntax();
    let mut calls = BTreeSet::new();
    let mut malformed = false;

    let visited = walk_subtree(root, |current| {
        if skips(tree, policy, root, current) {
            return false;
        }
        if profile.is_call(current.kind()) {
            if is_malformed(current) {
                malformed = true;
            } else if let Some(target) = call_target(tree, current) {
                calls.insert(target);
            }
        }
        true
    });

    if malformed {
        return (Err(FacetExtractionError::Syntax("calls_made")), visited);
    }
    (Ok(calls), visited)
}

/// `x.name` attributes and `name=` keyword arguments spell a name without referencing it
fn is_member_or_keyword_name(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let field = match parent.kind() {
        "attribute" => "attribute",
        "keyword_argument" => "name",
        _ => return false,
    };
    parent
        .child_by_field_name(field)
        .is_some_and(|child| child.id() == node.id())
}

fn skips(tree: &StructuralTree, policy: LambdaPolicy, root: Node<'_>, node: Node<'_>) -> bool {
    policy == LambdaPolicy::Skip && node.id() != root.id() && tree.profile().is_lambda(node.kind())
}

fn call_target(tree: &StructuralTree, call: Node<'_>) -> Option<String> {
    match call.kind() {
        "macro_invocation" => {
            let name = static_path(tree, call.child_by_field_name("macro")?)?;
            Some(format!("{name}!"))
        }
        "new_expression" => static_path(tree, call.child_by_field_name("constructor")?),
        _ => static_path(tree, call.child_by_field_name("function")?),
    }
}

/// Dotted / scoped name of a statically known callee; `None` for computed targets
fn static_path(tree: &StructuralTree, node: Node<'_>) -> Option<String> {
    match node.kind() {
        "identifier" | "type_identifier" | "property_identifier" | "field_identifier"
        | "self" | "this" | "super" | "scoped_identifier" => {
            Some(tree.text_of(node).trim().to_string())
        }
        "attribute" => {
            let object = static_path(tree, node.child_by_field_name("object")?)?;
            let attribute = tree.text_of(node.child_by_field_name("attribute")?);
            Some(format!("{object}.{attribute}"))
        }
        "member_expression" => {
            let object = static_path(tree, node.child_by_field_name("object")?)?;
            let property = tree.text_of(node.child_by_field_name("property")?);
            Some(format!("{object}.{property}"))
        }
        "field_expression" => {
            let value = static_path(tree, node.child_by_field_name("value")?)?;
            let field = tree.text_of(node.child_by_field_name("field")?);
            Some(format!("{value}.{field}"))
        }
        "generic_function" => static_path(tree, node.child_by_field_name("function")?),
        _ => None,
    }
}
