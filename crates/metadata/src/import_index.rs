//! Per-unit index of imported names.
//!
//! The index is built with one traversal of the whole tree and then shared read-only by
//! the metadata extraction of every chunk of the unit, so resolving the imports a chunk
//! uses is a hash lookup per referenced name rather than a re-scan of the file.

use crate::walk::walk_subtree;
use codeintel_code_chunker::tree_sitter::Node;
use codeintel_code_chunker::{Language, StructuralTree};
use serde::Serialize;
use std::collections::HashMap;

/// Where a locally bound name was imported from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOrigin {
    /// Declaring module (`os.path`, `std::collections`, `./store`)
    pub module: String,
    /// Name exported by the module
    pub name: String,
    /// Local alias, when the import renames the binding
    pub alias: Option<String>,
}

/// Immutable mapping from local names to their imports
#[derive(Debug, Clone, Default)]
pub struct ModuleImportIndex {
    entries: HashMap<String, ImportOrigin>,
    traversed_nodes: usize,
}

impl ModuleImportIndex {
    /// Build the index with a single traversal of `tree`
    pub fn build(tree: &StructuralTree) -> Self {
        let profile = tree.profile();
        let language = tree.language();
        let mut builder = IndexBuilder {
            tree,
            entries: HashMap::new(),
        };

        let traversed_nodes = walk_subtree(tree.root_node(), |node| {
            let kind = node.kind();
            if profile.is_import(kind) {
                builder.import(language, node);
            } else if kind == "variable_declarator"
                && matches!(language, Language::JavaScript | Language::TypeScript)
            {
                builder.require(node);
            }
            true
        });

        log::debug!(
            "Import index: {} names from {} nodes",
            builder.entries.len(),
            traversed_nodes
        );

        Self {
            entries: builder.entries,
            traversed_nodes,
        }
    }

    /// Index for units without a syntax tree
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ImportOrigin> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImportOrigin)> {
        self.entries.iter().map(|(name, origin)| (name.as_str(), origin))
    }

    /// Nodes visited by the build traversal
    pub fn traversed_nodes(&self) -> usize {
        self.traversed_nodes
    }
}

struct IndexBuilder<'t> {
    tree: &'t StructuralTree,
    entries: HashMap<String, ImportOrigin>,
}

impl<'t> IndexBuilder<'t> {
    fn text(&self, node: Node<'_>) -> String {
        self.tree.text_of(node).trim().to_string()
    }

    fn bind(&mut self, local: String, module: String, name: String, alias: Option<String>) {
        if local.is_empty() {
            return;
        }
        self.entries.insert(
            local,
            ImportOrigin {
                module,
                name,
                alias,
            },
        );
    }

    fn import(&mut self, language: Language, node: Node<'t>) {
        match language {
            Language::Python => self.python_import(node),
            Language::Rust => {
                if let Some(argument) = node.child_by_field_name("argument") {
                    self.rust_use_tree(argument, "");
                }
            }
            Language::JavaScript | Language::TypeScript => self.js_import(node),
            _ => {}
        }
    }

    fn python_import(&mut self, node: Node<'t>) {
        let module = node
            .child_by_field_name("module_name")
            .map(|module| self.text(module));

        let mut cursor = node.walk();
        let names: Vec<Node<'t>> = node.children_by_field_name("name", &mut cursor).collect();
        // `from __future__ import x` has no `name` field on older grammars
        let names = if names.is_empty() && node.kind() == "future_import_statement" {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .filter(|child| matches!(child.kind(), "dotted_name" | "aliased_import"))
                .collect()
        } else {
            names
        };
        let module = if node.kind() == "future_import_statement" {
            Some("__future__".to_string())
        } else {
            module
        };

        for name in names {
            let (target, alias) = match name.kind() {
                "aliased_import" => (
                    name.child_by_field_name("name").map(|n| self.text(n)),
                    name.child_by_field_name("alias").map(|n| self.text(n)),
                ),
                _ => (Some(self.text(name)), None),
            };
            let Some(target) = target else {
                continue;
            };

            match (&module, alias) {
                // from m import x [as y]
                (Some(module), alias) => {
                    let local = alias.clone().unwrap_or_else(|| target.clone());
                    self.bind(local, module.clone(), target, alias);
                }
                // import a.b as c
                (None, Some(alias)) => {
                    self.bind(alias.clone(), target.clone(), target, Some(alias));
                }
                // import a.b binds `a`
                (None, None) => {
                    let head = target.split('.').next().unwrap_or_default().to_string();
                    self.bind(head.clone(), target, head, None);
                }
            }
        }
    }

    fn rust_use_tree(&mut self, node: Node<'t>, prefix: &str) {
        match node.kind() {
            "identifier" | "crate" | "super" | "self" => {
                let name = self.text(node);
                let module = if prefix.is_empty() {
                    name.clone()
                } else {
                    prefix.to_string()
                };
                if name == "self" {
                    let local = prefix.rsplit("::").next().unwrap_or_default().to_string();
                    self.bind(local.clone(), prefix.to_string(), local, None);
                } else {
                    self.bind(name.clone(), module, name, None);
                }
            }
            "scoped_identifier" => {
                let path = node
                    .child_by_field_name("path")
                    .map(|path| self.text(path))
                    .unwrap_or_default();
                let module = join_path(prefix, &path);
                let Some(name) = node.child_by_field_name("name").map(|n| self.text(n)) else {
                    return;
                };
                if name == "self" {
                    let local = module.rsplit("::").next().unwrap_or_default().to_string();
                    self.bind(local.clone(), module, local, None);
                } else {
                    self.bind(name.clone(), module, name, None);
                }
            }
            "use_as_clause" => {
                let Some(path) = node.child_by_field_name("path") else {
                    return;
                };
                let Some(alias) = node.child_by_field_name("alias").map(|n| self.text(n)) else {
                    return;
                };
                let full = join_path(prefix, &self.text(path));
                let (module, name) = match full.rsplit_once("::") {
                    Some((module, name)) => (module.to_string(), name.to_string()),
                    None => (full.clone(), full.clone()),
                };
                self.bind(alias.clone(), module, name, Some(alias));
            }
            "scoped_use_list" => {
                let path = node
                    .child_by_field_name("path")
                    .map(|path| self.text(path))
                    .unwrap_or_default();
                let prefix = join_path(prefix, &path);
                if let Some(list) = node.child_by_field_name("list") {
                    self.rust_use_tree(list, &prefix);
                }
            }
            "use_list" => {
                let mut cursor = node.walk();
                let items: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
                for item in items {
                    self.rust_use_tree(item, prefix);
                }
            }
            // globs bind nothing nameable
            _ => {}
        }
    }

    fn js_import(&mut self, node: Node<'t>) {
        let Some(module) = node.child_by_field_name("source").map(|s| unquote(&self.text(s))) else {
            return;
        };

        let mut cursor = node.walk();
        let Some(clause) = node
            .named_children(&mut cursor)
            .find(|child| child.kind() == "import_clause")
        else {
            return;
        };

        let mut cursor = clause.walk();
        let parts: Vec<Node<'t>> = clause.named_children(&mut cursor).collect();
        for part in parts {
            match part.kind() {
                // import Default from 'm'
                "identifier" => {
                    let local = self.text(part);
                    self.bind(local, module.clone(), "default".to_string(), None);
                }
                // import * as ns from 'm'
                "namespace_import" => {
                    let mut cursor = part.walk();
                    let local = part
                        .named_children(&mut cursor)
                        .find(|child| child.kind() == "identifier")
                        .map(|ident| self.text(ident));
                    if let Some(local) = local {
                        self.bind(local.clone(), module.clone(), "*".to_string(), Some(local));
                    }
                }
                // import { a, b as c } from 'm'
                "named_imports" => {
                    let mut cursor = part.walk();
                    let specifiers: Vec<Node<'t>> = part
                        .named_children(&mut cursor)
                        .filter(|child| child.kind() == "import_specifier")
                        .collect();
                    for specifier in specifiers {
                        let Some(name) = specifier
                            .child_by_field_name("name")
                            .map(|n| unquote(&self.text(n)))
                        else {
                            continue;
                        };
                        let alias = specifier.child_by_field_name("alias").map(|a| self.text(a));
                        let local = alias.clone().unwrap_or_else(|| name.clone());
                        self.bind(local, module.clone(), name, alias);
                    }
                }
                _ => {}
            }
        }
    }

    /// `const x = require('m')` and `const { a, b: c } = require('m')`
    fn require(&mut self, declarator: Node<'t>) {
        let Some(value) = declarator.child_by_field_name("value") else {
            return;
        };
        if value.kind() != "call_expression" {
            return;
        }
        let is_require = value
            .child_by_field_name("function")
            .is_some_and(|function| self.tree.text_of(function) == "require");
        if !is_require {
            return;
        }
        let Some(module) = value
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
            .filter(|arg| arg.kind() == "string")
            .map(|arg| unquote(&self.text(arg)))
        else {
            return;
        };
        let Some(binding) = declarator.child_by_field_name("name") else {
            return;
        };

        match binding.kind() {
            "identifier" => {
                let local = self.text(binding);
                self.bind(local, module, "default".to_string(), None);
            }
            "object_pattern" => {
                let mut cursor = binding.walk();
                let properties: Vec<Node<'t>> = binding.named_children(&mut cursor).collect();
                for property in properties {
                    match property.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = self.text(property);
                            self.bind(name.clone(), module.clone(), name, None);
                        }
                        "pair_pattern" => {
                            let key = property.child_by_field_name("key").map(|k| self.text(k));
                            let value = property.child_by_field_name("value").map(|v| self.text(v));
                            if let (Some(key), Some(local)) = (key, value) {
                                self.bind(local.clone(), module.clone(), key, Some(local));
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}::{path}"),
    }
}

fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_code_chunker::SourceParser;
    use pretty_assertions::assert_eq;

    fn index(source: &str, language: Language) -> ModuleImportIndex {
        let tree = SourceParser::default().parse(source, language).unwrap();
        ModuleImportIndex::build(&tree)
    }

    fn origin(index: &ModuleImportIndex, name: &str) -> (String, String, Option<String>) {
        let origin = index
            .get(name)
            .unwrap_or_else(|| panic!("missing import {name}"));
        (
            origin.module.clone(),
            origin.name.clone(),
            origin.alias.clone(),
        )
    }

    #[test]
    fn python_imports() {
        let index = index(
            "import os.path\nimport numpy as np\nfrom collections import OrderedDict, defaultdict as dd\nfrom . import sibling\nfrom x import *\n",
            Language::Python,
        );
        assert_eq!(index.len(), 5);
        assert_eq!(origin(&index, "os"), ("os.path".into(), "os".into(), None));
        assert_eq!(
            origin(&index, "np"),
            ("numpy".into(), "numpy".into(), Some("np".into()))
        );
        assert_eq!(
            origin(&index, "OrderedDict"),
            ("collections".into(), "OrderedDict".into(), None)
        );
        assert_eq!(
            origin(&index, "dd"),
            ("collections".into(), "defaultdict".into(), Some("dd".into()))
        );
        assert_eq!(origin(&index, "sibling").0, ".");
    }

    #[test]
    fn rust_use_trees() {
        let index = index(
            "use std::collections::{HashMap, btree_map::Entry as BEntry};\nuse serde::Serialize;\nuse std::io::{self, Read};\nuse anyhow;\nuse std::fmt::*;\n",
            Language::Rust,
        );
        assert_eq!(
            origin(&index, "HashMap"),
            ("std::collections".into(), "HashMap".into(), None)
        );
        assert_eq!(
            origin(&index, "BEntry"),
            (
                "std::collections::btree_map".into(),
                "Entry".into(),
                Some("BEntry".into())
            )
        );
        assert_eq!(origin(&index, "Serialize").0, "serde");
        assert_eq!(origin(&index, "io").0, "std::io");
        assert_eq!(origin(&index, "Read").0, "std::io");
        assert_eq!(origin(&index, "anyhow").0, "anyhow");
        assert_eq!(index.len(), 6);
    }

    #[test]
    fn javascript_imports_and_require() {
        let index = index(
            "import React, { useState, useEffect as effect } from 'react';\nimport * as path from \"path\";\nconst fs = require('fs');\nconst { join, resolve: res } = require('path');\n",
            Language::JavaScript,
        );
        assert_eq!(origin(&index, "React").0, "react");
        assert_eq!(origin(&index, "useState").0, "react");
        assert_eq!(
            origin(&index, "effect"),
            ("react".into(), "useEffect".into(), Some("effect".into()))
        );
        assert_eq!(origin(&index, "path").1, "*");
        assert_eq!(origin(&index, "fs").0, "fs");
        assert_eq!(origin(&index, "join").0, "path");
        assert_eq!(origin(&index, "res").1, "resolve");
    }

    #[test]
    fn build_visits_every_node_once() {
        fn count(node: Node<'_>) -> usize {
            let mut total = 1;
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    total += count(child);
                }
            }
            total
        }

        let source = "import os\n\ndef f():\n    import json\n    return json.dumps(os.environ)\n";
        let tree = SourceParser::default().parse(source, Language::Python).unwrap();
        let index = ModuleImportIndex::build(&tree);
        assert_eq!(index.traversed_nodes(), count(tree.root_node()));
        assert!(index.contains("json"), "nested imports are indexed");
    }
}
