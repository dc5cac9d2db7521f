//! Resolves call-site symbols and argument values from the parsed source.
//!
//! Resolution is best-effort by design: a callee that cannot be pinned to a
//! package is simply not interesting, and an argument that cannot be reduced
//! to a literal is reported as unresolved rather than failing the scan.

use std::collections::{BTreeMap, HashMap};

use tree_sitter::Node;

use crate::indicator::{RouteParam, Signature};
use crate::util::node_text;

/// A local variable's declared or inferred type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub pkg_path: String,
    pub name: String,
}

/// Literal assignments recorded during the scan pre-pass, read-only once the
/// call extraction pass starts.
#[derive(Debug, Default)]
pub struct ValueFacts {
    global_consts: HashMap<(String, String), String>,
    global_vars: HashMap<(String, String), String>,
    local_values: HashMap<(String, String, String), Vec<String>>,
}

impl ValueFacts {
    pub fn record_global_const(&mut self, pkg_path: &str, name: &str, value: String) {
        self.global_consts
            .insert((pkg_path.to_string(), name.to_string()), value);
    }

    pub fn record_global_var(&mut self, pkg_path: &str, name: &str, value: String) {
        self.global_vars
            .insert((pkg_path.to_string(), name.to_string()), value);
    }

    pub fn record_local(&mut self, pkg_path: &str, func: &str, name: &str, value: String) {
        self.local_values
            .entry((pkg_path.to_string(), func.to_string(), name.to_string()))
            .or_default()
            .push(value);
    }

    fn global(&self, pkg_path: &str, name: &str) -> Option<&String> {
        let key = (pkg_path.to_string(), name.to_string());
        self.global_consts.get(&key).or_else(|| self.global_vars.get(&key))
    }

    fn locals(&self, pkg_path: &str, func: &str, name: &str) -> Option<&Vec<String>> {
        self.local_values
            .get(&(pkg_path.to_string(), func.to_string(), name.to_string()))
    }
}

/// Everything known about the scope a call expression appears in.
pub struct ResolveCtx<'a> {
    pub pkg_name: &'a str,
    pub pkg_path: &'a str,
    /// Enclosing function, for local value-fact lookup.
    pub func_name: &'a str,
    /// Import alias to import path.
    pub imports: &'a HashMap<String, String>,
    /// Local variable name to its inferred type.
    pub local_types: &'a HashMap<String, TypeRef>,
    pub facts: &'a ValueFacts,
    pub source: &'a str,
}

/// Identity of a call expression's callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCallee {
    pub pkg_path: String,
    pub name: String,
    /// Receiver type as `pkg/path.Type` for method calls.
    pub receiver: Option<String>,
    /// True for plain identifier calls inside the current package.
    pub local: bool,
}

/// Classifies the callee of a call expression. Returns `None` when neither a
/// package-qualified symbol nor a receiver-derived package can be determined,
/// which callers treat as "keep scanning".
pub fn resolve_callee(func_node: Node<'_>, ctx: &ResolveCtx<'_>) -> Option<ResolvedCallee> {
    let node = unwrap_callee(func_node);
    match node.kind() {
        "identifier" => {
            let name = node_text(node, ctx.source);
            if name.is_empty() {
                return None;
            }
            Some(ResolvedCallee {
                pkg_path: ctx.pkg_path.to_string(),
                name,
                receiver: None,
                local: true,
            })
        }
        "selector_expression" => {
            let operand = node.child_by_field_name("operand")?;
            let field = node.child_by_field_name("field")?;
            let name = node_text(field, ctx.source);
            if name.is_empty() {
                return None;
            }
            let op_text = node_text(operand, ctx.source);
            if operand.kind() == "identifier"
                && let Some(path) = ctx.imports.get(&op_text)
            {
                return Some(ResolvedCallee {
                    pkg_path: path.clone(),
                    name,
                    receiver: None,
                    local: false,
                });
            }
            // Method call through a variable whose type we tracked, possibly
            // a chained selector like `s.router.Handle`.
            if let Some(t) = ctx.local_types.get(&op_text) {
                return Some(ResolvedCallee {
                    pkg_path: t.pkg_path.clone(),
                    name,
                    receiver: Some(format!("{}.{}", t.pkg_path, t.name)),
                    local: false,
                });
            }
            None
        }
        _ => None,
    }
}

/// Strips generic instantiation and parentheses off a callee expression.
fn unwrap_callee(node: Node<'_>) -> Node<'_> {
    let mut cur = node;
    loop {
        match cur.kind() {
            "index_expression" | "generic_type" => {
                let Some(inner) = cur.child_by_field_name("operand").or_else(|| cur.child(0))
                else {
                    return cur;
                };
                cur = inner;
            }
            "parenthesized_expression" => {
                let Some(inner) = cur.named_child(0) else {
                    return cur;
                };
                cur = inner;
            }
            _ => return cur,
        }
    }
}

/// Resolves each declared indicator parameter against the call's arguments.
/// Named parameters go through the signature to find their position; a name
/// that is not in the signature yields an empty value.
pub fn resolve_params(
    declared: &[RouteParam],
    signature: Option<&Signature>,
    args: &[Node<'_>],
    ctx: &ResolveCtx<'_>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for param in declared {
        let idx = if !param.name.is_empty() {
            match signature.and_then(|s| s.param_pos(&param.name)) {
                Some(i) => i,
                None => {
                    out.insert(param.name.clone(), String::new());
                    continue;
                }
            }
        } else {
            param.pos
        };
        let value = args
            .get(idx)
            .map(|n| value_from_expr(*n, ctx))
            .unwrap_or_default();
        out.insert(param.name.clone(), value);
    }
    out
}

/// Best-effort literal/symbolic value of an argument expression. Empty string
/// means unresolvable; reporters substitute the placeholder.
pub fn value_from_expr(node: Node<'_>, ctx: &ResolveCtx<'_>) -> String {
    match node.kind() {
        "interpreted_string_literal" | "raw_string_literal" | "int_literal" | "float_literal"
        | "rune_literal" | "imaginary_literal" | "true" | "false" | "nil" => {
            node_text(node, ctx.source)
        }
        "selector_expression" => selector_value(node, ctx),
        "identifier" => ident_value(node, ctx),
        "composite_literal" => composite_value(node, ctx),
        // Operator is treated as concatenation regardless of what it is; for
        // the route-pattern strings this resolver exists for that is what
        // the code means.
        "binary_expression" => {
            let left = node
                .child_by_field_name("left")
                .map(|n| value_from_expr(n, ctx))
                .unwrap_or_default();
            let right = node
                .child_by_field_name("right")
                .map(|n| value_from_expr(n, ctx))
                .unwrap_or_default();
            let left = if left.is_empty() { "<BinExp.X>".to_string() } else { left };
            let right = if right.is_empty() { "<BinExp.Y>".to_string() } else { right };
            format!("{left}{right}")
        }
        "parenthesized_expression" => node
            .named_child(0)
            .map(|n| value_from_expr(n, ctx))
            .unwrap_or_default(),
        "unary_expression" => node
            .child_by_field_name("operand")
            .map(|n| value_from_expr(n, ctx))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn selector_value(node: Node<'_>, ctx: &ResolveCtx<'_>) -> String {
    let Some(operand) = node.child_by_field_name("operand") else {
        return String::new();
    };
    let Some(field) = node.child_by_field_name("field") else {
        return String::new();
    };
    let op_text = node_text(operand, ctx.source);
    let field_text = node_text(field, ctx.source);
    if operand.kind() == "identifier"
        && let Some(path) = ctx.imports.get(&op_text)
    {
        if let Some(v) = ctx.facts.global(path, &field_text) {
            return v.clone();
        }
        return format!("<var {op_text}.{field_text}>");
    }
    String::new()
}

fn ident_value(node: Node<'_>, ctx: &ResolveCtx<'_>) -> String {
    let name = node_text(node, ctx.source);
    if name.is_empty() {
        return String::new();
    }
    if let Some(values) = ctx.facts.locals(ctx.pkg_path, ctx.func_name, &name) {
        return values.join(" || ");
    }
    if let Some(v) = ctx.facts.global(ctx.pkg_path, &name) {
        return v.clone();
    }
    format!("<var {}.{}>", ctx.pkg_name, name)
}

fn composite_value(node: Node<'_>, ctx: &ResolveCtx<'_>) -> String {
    let Some(body) = node.child_by_field_name("body") else {
        return String::new();
    };
    let mut parts = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        // In a keyed element the last literal_element is the value.
        let element = if child.kind() == "keyed_element" {
            child.named_child(child.named_child_count().saturating_sub(1))
        } else {
            Some(child)
        };
        if let Some(el) = element.and_then(unwrap_literal_element) {
            let v = value_from_expr(el, ctx);
            if !v.is_empty() {
                parts.push(v);
            }
        }
    }
    parts.join(" ")
}

/// The grammar wraps every composite-literal entry in a `literal_element`
/// node holding the actual expression.
fn unwrap_literal_element(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() == "literal_element" {
        node.named_child(0)
    } else {
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{Parser, Tree};

    fn parse(source: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    fn find_call<'a>(node: Node<'a>) -> Option<Node<'a>> {
        find_kind(node, "call_expression")
    }

    fn find_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if let Some(found) = find_kind(child, kind) {
                return Some(found);
            }
        }
        None
    }

    fn call_args<'a>(call: Node<'a>) -> Vec<Node<'a>> {
        let Some(args) = call.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = args.walk();
        for child in args.named_children(&mut cursor) {
            out.push(child);
        }
        out
    }

    struct Fixture {
        imports: HashMap<String, String>,
        local_types: HashMap<String, TypeRef>,
        facts: ValueFacts,
    }

    impl Fixture {
        fn new() -> Self {
            let mut imports = HashMap::new();
            imports.insert("http".to_string(), "net/http".to_string());
            imports.insert("routes".to_string(), "example.com/app/routes".to_string());
            Self {
                imports,
                local_types: HashMap::new(),
                facts: ValueFacts::default(),
            }
        }

        fn ctx(&self) -> ResolveCtx<'_> {
            ResolveCtx {
                pkg_name: "main",
                pkg_path: "example.com/app",
                func_name: "main",
                imports: &self.imports,
                local_types: &self.local_types,
                facts: &self.facts,
                source: "",
            }
        }
    }

    #[test]
    fn resolves_package_qualified_call() {
        let src = "package main\nfunc main() { http.HandleFunc(\"/users\", h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        let resolved = resolve_callee(call.child_by_field_name("function").unwrap(), &ctx).unwrap();
        assert_eq!(resolved.pkg_path, "net/http");
        assert_eq!(resolved.name, "HandleFunc");
        assert!(resolved.receiver.is_none());
    }

    #[test]
    fn resolves_method_call_through_tracked_type() {
        let src = "package main\nfunc main() { r.HandleFunc(\"/users\", h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let mut fx = Fixture::new();
        fx.local_types.insert(
            "r".to_string(),
            TypeRef {
                pkg_path: "github.com/gorilla/mux".to_string(),
                name: "Router".to_string(),
            },
        );
        let mut ctx = fx.ctx();
        ctx.source = src;
        let resolved = resolve_callee(call.child_by_field_name("function").unwrap(), &ctx).unwrap();
        assert_eq!(resolved.pkg_path, "github.com/gorilla/mux");
        assert_eq!(
            resolved.receiver.as_deref(),
            Some("github.com/gorilla/mux.Router")
        );
    }

    #[test]
    fn unknown_receiver_is_unresolvable() {
        let src = "package main\nfunc main() { conn.Write(b) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        assert!(resolve_callee(call.child_by_field_name("function").unwrap(), &ctx).is_none());
    }

    #[test]
    fn named_param_resolves_string_literal_by_signature() {
        let src = "package main\nfunc main() { http.Handle(\"/users\", h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        let sig = Signature {
            params: vec!["pattern".to_string(), "handler".to_string()],
            receiver: None,
        };
        let declared = vec![RouteParam::named("pattern")];
        let out = resolve_params(&declared, Some(&sig), &args, &ctx);
        assert_eq!(out.get("pattern").map(String::as_str), Some("\"/users\""));
    }

    #[test]
    fn name_missing_from_signature_yields_empty() {
        let src = "package main\nfunc main() { http.Handle(\"/users\", h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        let sig = Signature {
            params: vec!["p".to_string()],
            receiver: None,
        };
        let out = resolve_params(&[RouteParam::named("pattern")], Some(&sig), &args, &ctx);
        assert_eq!(out.get("pattern").map(String::as_str), Some(""));
    }

    #[test]
    fn positional_param_without_signature() {
        let src = "package main\nfunc main() { register(\"/health\", h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        let declared = vec![RouteParam {
            name: String::new(),
            pos: 0,
        }];
        let out = resolve_params(&declared, None, &args, &ctx);
        assert_eq!(out.get("").map(String::as_str), Some("\"/health\""));
    }

    #[test]
    fn const_selector_resolves_through_facts() {
        let src = "package main\nfunc main() { http.Handle(routes.UsersPath, h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let mut fx = Fixture::new();
        fx.facts
            .record_global_const("example.com/app/routes", "UsersPath", "\"/users\"".into());
        let mut ctx = fx.ctx();
        ctx.source = src;
        assert_eq!(value_from_expr(args[0], &ctx), "\"/users\"");
    }

    #[test]
    fn unknown_var_selector_gets_placeholder() {
        let src = "package main\nfunc main() { http.Handle(routes.Dynamic, h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        assert_eq!(value_from_expr(args[0], &ctx), "<var routes.Dynamic>");
    }

    #[test]
    fn local_ident_joins_value_history() {
        let src = "package main\nfunc main() { http.Handle(path, h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let mut fx = Fixture::new();
        fx.facts
            .record_local("example.com/app", "main", "path", "\"/a\"".into());
        fx.facts
            .record_local("example.com/app", "main", "path", "\"/b\"".into());
        let mut ctx = fx.ctx();
        ctx.source = src;
        assert_eq!(value_from_expr(args[0], &ctx), "\"/a\" || \"/b\"");
    }

    #[test]
    fn binary_expression_concatenates_with_placeholders() {
        let src = "package main\nfunc main() { http.Handle(prefix + \"/users\", h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let mut fx = Fixture::new();
        fx.facts
            .record_global_const("example.com/app", "prefix", "\"/v1\"".into());
        let mut ctx = fx.ctx();
        ctx.source = src;
        assert_eq!(value_from_expr(args[0], &ctx), "\"/v1\"\"/users\"");

        let src2 = "package main\nfunc main() { http.Handle(a + b, h) }\n";
        let tree2 = parse(src2);
        let call2 = find_call(tree2.root_node()).unwrap();
        let args2 = call_args(call2);
        let fx2 = Fixture::new();
        let mut ctx2 = fx2.ctx();
        ctx2.source = src2;
        // Unknown locals fall back to var placeholders, not BinExp ones.
        assert_eq!(value_from_expr(args2[0], &ctx2), "<var main.a><var main.b>");
    }

    #[test]
    fn composite_literal_joins_elements() {
        let src = "package main\nfunc main() { register([]string{\"/a\", \"/b\"}, h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let args = call_args(call);
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        assert_eq!(value_from_expr(args[0], &ctx), "\"/a\" \"/b\"");
    }

    #[test]
    fn generic_instantiation_unwraps_to_identifier() {
        // One argument, so the grammar produces a conversion around a
        // generic_type rather than a call_expression.
        let src = "package main\nfunc main() { register[int](\"/x\") }\n";
        let tree = parse(src);
        let call = find_kind(tree.root_node(), "type_conversion_expression").unwrap();
        let fn_node = call.child_by_field_name("type").unwrap();
        assert_eq!(fn_node.kind(), "generic_type");
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        let resolved = resolve_callee(fn_node, &ctx).unwrap();
        assert_eq!(resolved.name, "register");
        assert!(resolved.local);
    }

    #[test]
    fn generic_call_with_two_args_keeps_call_expression_shape() {
        let src = "package main\nfunc main() { register[int](\"/x\", h) }\n";
        let tree = parse(src);
        let call = find_call(tree.root_node()).unwrap();
        let fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.source = src;
        let resolved = resolve_callee(call.child_by_field_name("function").unwrap(), &ctx).unwrap();
        assert_eq!(resolved.name, "register");
        assert!(resolved.local);
    }
}
