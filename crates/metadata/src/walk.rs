use codeintel_code_chunker::tree_sitter::Node;

/// Pre-order walk over `root` and its descendants.
///
/// `visit` decides whether to descend into the node it was given. Returns the number of
/// nodes visited.
pub(crate) fn walk_subtree<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> bool) -> usize {
    let mut visited = 0usize;
    let mut depth = 0usize;
    let mut cursor = root.walk();

    loop {
        visited += 1;
        if visit(cursor.node()) && cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if depth == 0 {
                return visited;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

/// Whether `node` is, or contains, an ERROR or MISSING node
pub(crate) fn is_malformed(node: Node<'_>) -> bool {
    node.has_error() || node.is_missing()
}
