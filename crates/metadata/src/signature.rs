//! Header facets: signature, parameters, return type and decorators.

use crate::error::{FacetExtractionError, FacetResult};
use crate::walk::is_malformed;
use codeintel_code_chunker::tree_sitter::Node;
use codeintel_code_chunker::{Language, Parameter, StructuralNode};
use std::collections::BTreeSet;

/// Declaration header up to its body, whitespace collapsed
pub(crate) fn signature(node: &StructuralNode<'_>) -> FacetResult<String> {
    let decl = node.syntax();
    let header_end = node.body().map_or(decl.end_byte(), |body| body.start_byte());

    let mut cursor = decl.walk();
    let malformed = decl
        .children(&mut cursor)
        .take_while(|child| child.start_byte() < header_end)
        .any(is_malformed);
    if malformed {
        return Err(FacetExtractionError::Syntax("signature"));
    }

    let header = node
        .tree()
        .source()
        .get(decl.start_byte()..header_end)
        .unwrap_or_default();
    let collapsed = header.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(collapsed
        .trim_end_matches([':', '{'])
        .trim_end()
        .to_string())
}

/// Declared parameters in order; empty for classes
pub(crate) fn parameters(node: &StructuralNode<'_>) -> FacetResult<Vec<Parameter>> {
    if !node.kind().is_callable() {
        return Ok(Vec::new());
    }
    let Some(params) = node.syntax().child_by_field_name("parameters") else {
        return Ok(Vec::new());
    };
    if is_malformed(params) {
        return Err(FacetExtractionError::Syntax("parameters"));
    }

    let reader = ParamReader { node };
    let mut cursor = params.walk();
    let parameters = params
        .named_children(&mut cursor)
        .filter_map(|param| match node.tree().language() {
            Language::Python => reader.python(param),
            Language::Rust => reader.rust(param),
            Language::JavaScript | Language::TypeScript => reader.javascript(param),
            _ => None,
        })
        .collect();
    Ok(parameters)
}

/// Declared return type of a callable
pub(crate) fn return_type(node: &StructuralNode<'_>) -> FacetResult<Option<String>> {
    if !node.kind().is_callable() {
        return Ok(None);
    }
    let Some(return_type) = node.syntax().child_by_field_name("return_type") else {
        return Ok(None);
    };
    if is_malformed(return_type) {
        return Err(FacetExtractionError::Syntax("return_type"));
    }
    let text = annotation(node.tree().text_of(return_type));
    Ok((!text.is_empty()).then_some(text))
}

/// Names of the decorators / attributes on the declaration
pub(crate) fn decorators(node: &StructuralNode<'_>) -> FacetResult<BTreeSet<String>> {
    let tree = node.tree();
    let mut names = BTreeSet::new();
    for decorator in node.decorators() {
        if is_malformed(decorator) {
            return Err(FacetExtractionError::Syntax("decorators"));
        }
        let name = decorator_name(tree.text_of(decorator));
        if !name.is_empty() {
            names.insert(name);
        }
    }
    Ok(names)
}

/// `@app.route("/")` -> `app.route`, `#[derive(Debug)]` -> `derive`
fn decorator_name(raw: &str) -> String {
    let inner = raw
        .trim()
        .trim_start_matches('@')
        .trim_start_matches("#!")
        .trim_start_matches('#')
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    inner
        .split(|c: char| c == '(' || c == '=' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Strip the `:` of a TypeScript type annotation
fn annotation(raw: &str) -> String {
    raw.trim().trim_start_matches(':').trim().to_string()
}

struct ParamReader<'a, 't> {
    node: &'a StructuralNode<'t>,
}

impl ParamReader<'_, '_> {
    fn text(&self, node: Node<'_>) -> String {
        self.node.tree().text_of(node).trim().to_string()
    }

    fn field(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|child| self.text(child))
    }

    fn python(&self, param: Node<'_>) -> Option<Parameter> {
        match param.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                Some(Parameter::named(self.text(param)))
            }
            "typed_parameter" => {
                let name = param.named_child(0).map(|name| self.text(name))?;
                let mut parameter = Parameter::named(name);
                if let Some(ty) = self.field(param, "type") {
                    parameter = parameter.typed(ty);
                }
                Some(parameter)
            }
            "default_parameter" | "typed_default_parameter" => {
                let mut parameter = Parameter::named(self.field(param, "name")?);
                if let Some(ty) = self.field(param, "type") {
                    parameter = parameter.typed(ty);
                }
                if let Some(value) = self.field(param, "value") {
                    parameter = parameter.with_default(value);
                }
                Some(parameter)
            }
            // bare `*` and `/` separators
            _ => None,
        }
    }

    fn rust(&self, param: Node<'_>) -> Option<Parameter> {
        match param.kind() {
            "parameter" => {
                let mut parameter = Parameter::named(self.field(param, "pattern")?);
                if let Some(ty) = self.field(param, "type") {
                    parameter = parameter.typed(ty);
                }
                Some(parameter)
            }
            "self_parameter" | "variadic_parameter" => Some(Parameter::named(self.text(param))),
            _ => None,
        }
    }

    fn javascript(&self, param: Node<'_>) -> Option<Parameter> {
        match param.kind() {
            "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
                Some(Parameter::named(self.text(param)))
            }
            "assignment_pattern" => {
                let mut parameter = Parameter::named(self.field(param, "left")?);
                if let Some(value) = self.field(param, "right") {
                    parameter = parameter.with_default(value);
                }
                Some(parameter)
            }
            "required_parameter" | "optional_parameter" => {
                let mut name = self.field(param, "pattern")?;
                if param.kind() == "optional_parameter" {
                    name.push('?');
                }
                let mut parameter = Parameter::named(name);
                if let Some(ty) = param.child_by_field_name("type") {
                    parameter = parameter.typed(annotation(self.node.tree().text_of(ty)));
                }
                if let Some(value) = self.field(param, "value") {
                    parameter = parameter.with_default(value);
                }
                Some(parameter)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_code_chunker::{SourceParser, StructuralTree};
    use pretty_assertions::assert_eq;

    fn first(tree: &StructuralTree) -> StructuralNode<'_> {
        tree.root().children().into_iter().next().expect("declaration")
    }

    #[test]
    fn python_header() {
        let source = "@cache\n@app.route(\"/x\", methods=[\"GET\"])\ndef handler(req: Request, *args, limit: int = 10, verbose=False, **kw) -> Response:\n    return req\n";
        let tree = SourceParser::default().parse(source, Language::Python).unwrap();
        let node = first(&tree);

        assert_eq!(
            signature(&node).unwrap(),
            "def handler(req: Request, *args, limit: int = 10, verbose=False, **kw) -> Response"
        );
        assert_eq!(
            parameters(&node).unwrap(),
            vec![
                Parameter::named("req").typed("Request"),
                Parameter::named("*args"),
                Parameter::named("limit").typed("int").with_default("10"),
                Parameter::named("verbose").with_default("False"),
                Parameter::named("**kw"),
            ]
        );
        assert_eq!(return_type(&node).unwrap(), Some("Response".to_string()));
        assert_eq!(
            decorators(&node).unwrap().into_iter().collect::<Vec<_>>(),
            vec!["app.route".to_string(), "cache".to_string()]
        );
    }

    #[test]
    fn rust_header() {
        let source = "#[inline]\n#[cfg(feature = \"fast\")]\npub fn scale(&self, factor: f64,\n    offset: f64) -> Vec<f64> {\n    vec![]\n}\n";
        let tree = SourceParser::default().parse(source, Language::Rust).unwrap();
        let node = first(&tree);

        assert_eq!(
            signature(&node).unwrap(),
            "pub fn scale(&self, factor: f64, offset: f64) -> Vec<f64>"
        );
        assert_eq!(
            parameters(&node).unwrap(),
            vec![
                Parameter::named("&self"),
                Parameter::named("factor").typed("f64"),
                Parameter::named("offset").typed("f64"),
            ]
        );
        assert_eq!(return_type(&node).unwrap(), Some("Vec<f64>".to_string()));
        assert_eq!(
            decorators(&node).unwrap().into_iter().collect::<Vec<_>>(),
            vec!["cfg".to_string(), "inline".to_string()]
        );
    }

    #[test]
    fn typescript_parameters() {
        let source = "function load(path: string, retries?: number, mode: string = \"r\"): Promise<void> {}\n";
        let tree = SourceParser::default().parse(source, Language::TypeScript).unwrap();
        let node = first(&tree);

        assert_eq!(
            parameters(&node).unwrap(),
            vec![
                Parameter::named("path").typed("string"),
                Parameter::named("retries?").typed("number"),
                Parameter::named("mode").typed("string").with_default("\"r\""),
            ]
        );
        assert_eq!(return_type(&node).unwrap(), Some("Promise<void>".to_string()));
    }

    #[test]
    fn javascript_defaults_and_rest() {
        let source = "function f(a, b = 2, ...rest) {}\n";
        let tree = SourceParser::default().parse(source, Language::JavaScript).unwrap();
        let node = first(&tree);
        assert_eq!(
            parameters(&node).unwrap(),
            vec![
                Parameter::named("a"),
                Parameter::named("b").with_default("2"),
                Parameter::named("...rest"),
            ]
        );
        assert_eq!(return_type(&node).unwrap(), None);
    }

    #[test]
    fn classes_have_no_parameters() {
        let source = "class Greeter(Base):\n    pass\n";
        let tree = SourceParser::default().parse(source, Language::Python).unwrap();
        let node = first(&tree);
        assert_eq!(signature(&node).unwrap(), "class Greeter(Base)");
        assert!(parameters(&node).unwrap().is_empty());
        assert_eq!(return_type(&node).unwrap(), None);
    }

    #[test]
    fn decorator_names() {
        assert_eq!(decorator_name("@property"), "property");
        assert_eq!(decorator_name("#[derive(Debug, Clone)]"), "derive");
        assert_eq!(decorator_name("#![allow(dead_code)]"), "allow");
        assert_eq!(decorator_name("#[doc = \"x\"]"), "doc");
    }
}
