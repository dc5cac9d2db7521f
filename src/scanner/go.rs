//! Tree-sitter extraction for Go sources. Two passes per file: the first
//! collects declarations, imports, struct field types and value facts; the
//! second resolves call sites, matches indicators and records instruction
//! order for the recoverability scan.

use std::collections::HashMap;

use anyhow::Result;
use tree_sitter::{Node, Parser, Tree};

use crate::graph::InstrKind;
use crate::indicator::{FuncInfo, Indicator, Signature, known_signature};
use crate::resolver::{self, ResolveCtx, TypeRef, ValueFacts};
use crate::scanner::{DeclIndex, DeclInfo, FileDecls, PendingMatch, RawCall, StructInfo, TypeTable};
use crate::util::{node_pos, node_text, unquote_go_string};

pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_go::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &str) -> Option<Tree> {
        self.parser.parse(source, None)
    }
}

fn is_literal_kind(kind: &str) -> bool {
    matches!(
        kind,
        "interpreted_string_literal"
            | "raw_string_literal"
            | "int_literal"
            | "float_literal"
            | "rune_literal"
            | "imaginary_literal"
            | "true"
            | "false"
    )
}

/// First pass: declarations, imports, struct fields and value facts.
pub fn collect_decls(
    tree: &Tree,
    source: &str,
    rel_path: &str,
    module: &str,
    facts: &mut ValueFacts,
) -> FileDecls {
    let root = tree.root_node();
    let pkg_name = package_name(root, source);
    let pkg_path = package_path(rel_path, module, &pkg_name);

    let mut file = FileDecls {
        rel_path: rel_path.to_string(),
        pkg_name,
        pkg_path,
        imports: HashMap::new(),
        funcs: Vec::new(),
        structs: Vec::new(),
    };

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_declaration" => collect_imports(child, source, &mut file.imports),
            "function_declaration" => {
                collect_func_decl(child, source, rel_path, None, &mut file, facts)
            }
            "method_declaration" => {
                let receiver = receiver_type(child, source);
                collect_func_decl(child, source, rel_path, receiver, &mut file, facts)
            }
            "type_declaration" => collect_struct_types(child, source, &mut file),
            "const_declaration" => {
                let pkg_path = file.pkg_path.clone();
                collect_global_specs(child, source, &pkg_path, facts, true)
            }
            "var_declaration" => {
                let pkg_path = file.pkg_path.clone();
                collect_global_specs(child, source, &pkg_path, facts, false)
            }
            _ => {}
        }
    }
    file
}

fn package_name(root: Node<'_>, source: &str) -> String {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "package_clause"
            && let Some(name) = child.named_child(0)
        {
            return node_text(name, source);
        }
    }
    String::new()
}

/// Import path of the package a file belongs to: module path plus the file's
/// directory. Without a go.mod the directory itself has to do.
fn package_path(rel_path: &str, module: &str, pkg_name: &str) -> String {
    let dir = std::path::Path::new(rel_path)
        .parent()
        .map(crate::util::unix_path)
        .unwrap_or_default();
    match (module.is_empty(), dir.is_empty()) {
        (false, true) => module.to_string(),
        (false, false) => format!("{module}/{dir}"),
        (true, true) => {
            if pkg_name.is_empty() {
                "main".to_string()
            } else {
                pkg_name.to_string()
            }
        }
        (true, false) => dir,
    }
}

fn collect_imports(node: Node<'_>, source: &str, imports: &mut HashMap<String, String>) {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        let mut cursor = n.walk();
        for child in n.named_children(&mut cursor) {
            if child.kind() == "import_spec" {
                record_import(child, source, imports);
            } else if child.kind() == "import_spec_list" {
                stack.push(child);
            }
        }
    }
}

fn record_import(spec: Node<'_>, source: &str, imports: &mut HashMap<String, String>) {
    let Some(path_node) = spec.child_by_field_name("path") else {
        return;
    };
    let Some(path) = unquote_go_string(&node_text(path_node, source)) else {
        return;
    };
    let alias = match spec.child_by_field_name("name") {
        Some(name) => {
            let text = node_text(name, source);
            if text == "." || text == "_" {
                return;
            }
            text
        }
        None => path.rsplit('/').next().unwrap_or(&path).to_string(),
    };
    imports.insert(alias, path);
}

fn receiver_type(node: Node<'_>, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    for child in receiver.named_children(&mut cursor) {
        if child.kind() == "parameter_declaration"
            && let Some(type_node) = child.child_by_field_name("type")
        {
            let text = node_text(type_node, source);
            let text = text.trim_start_matches('*').trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn collect_func_decl(
    node: Node<'_>,
    source: &str,
    rel_path: &str,
    receiver: Option<String>,
    file: &mut FileDecls,
    facts: &mut ValueFacts,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    file.funcs.push(DeclInfo {
        name: name.clone(),
        receiver,
        params: param_names(node, source),
        pos: node_pos(node, rel_path),
        parent: None,
        has_defer: false,
    });
    let idx = file.funcs.len() - 1;
    if let Some(body) = node.child_by_field_name("body") {
        let mut counters = HashMap::new();
        scan_body(body, source, rel_path, file, facts, idx, &mut counters);
    }
}

fn param_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let Some(params) = node.child_by_field_name("parameters") else {
        return out;
    };
    let mut cursor = params.walk();
    for decl in params.named_children(&mut cursor) {
        if decl.kind() != "parameter_declaration" && decl.kind() != "variadic_parameter_declaration"
        {
            continue;
        }
        let mut inner = decl.walk();
        for name in decl.children_by_field_name("name", &mut inner) {
            let text = node_text(name, source);
            if !text.is_empty() {
                out.push(text);
            }
        }
    }
    out
}

/// Recursive body walk, document order. Function literals are registered as
/// closure declarations with a `host$n` name; deferred statements mark the
/// nearest enclosing function as carrying a recover block candidate.
fn scan_body(
    node: Node<'_>,
    source: &str,
    rel_path: &str,
    file: &mut FileDecls,
    facts: &mut ValueFacts,
    cur: usize,
    counters: &mut HashMap<usize, usize>,
) {
    match node.kind() {
        "func_literal" => {
            let n = counters.entry(cur).or_insert(0);
            *n += 1;
            let name = format!("{}${}", file.funcs[cur].name, n);
            file.funcs.push(DeclInfo {
                name,
                receiver: None,
                params: param_names(node, source),
                pos: node_pos(node, rel_path),
                parent: Some(cur),
                has_defer: false,
            });
            let idx = file.funcs.len() - 1;
            if let Some(body) = node.child_by_field_name("body") {
                scan_body(body, source, rel_path, file, facts, idx, counters);
            }
        }
        "defer_statement" => {
            file.funcs[cur].has_defer = true;
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                scan_body(child, source, rel_path, file, facts, cur, counters);
            }
        }
        "short_var_declaration" | "assignment_statement" => {
            if let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) {
                record_local_pairs(left, right, source, file, facts, cur);
                scan_body(right, source, rel_path, file, facts, cur, counters);
            }
        }
        "const_declaration" => {
            record_local_specs(node, source, file, facts, cur);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                scan_body(child, source, rel_path, file, facts, cur, counters);
            }
        }
    }
}

fn record_local_pairs(
    left: Node<'_>,
    right: Node<'_>,
    source: &str,
    file: &FileDecls,
    facts: &mut ValueFacts,
    cur: usize,
) {
    for i in 0..left.named_child_count() {
        let Some(l) = left.named_child(i) else {
            continue;
        };
        if l.kind() != "identifier" {
            continue;
        }
        let Some(r) = right.named_child(i) else {
            continue;
        };
        if is_literal_kind(r.kind()) {
            facts.record_local(
                &file.pkg_path,
                &file.funcs[cur].name,
                &node_text(l, source),
                node_text(r, source),
            );
        }
    }
}

fn record_local_specs(
    node: Node<'_>,
    source: &str,
    file: &FileDecls,
    facts: &mut ValueFacts,
    cur: usize,
) {
    for (name, value) in spec_values(node, source) {
        facts.record_local(&file.pkg_path, &file.funcs[cur].name, &name, value);
    }
}

fn collect_global_specs(
    node: Node<'_>,
    source: &str,
    pkg_path: &str,
    facts: &mut ValueFacts,
    constant: bool,
) {
    for (name, value) in spec_values(node, source) {
        if constant {
            facts.record_global_const(pkg_path, &name, value);
        } else {
            facts.record_global_var(pkg_path, &name, value);
        }
    }
}

/// Pairs of (name, literal value) from a const/var declaration.
fn spec_values(node: Node<'_>, source: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if spec.kind() != "const_spec" && spec.kind() != "var_spec" {
            continue;
        }
        let mut names = Vec::new();
        let mut inner = spec.walk();
        for name in spec.children_by_field_name("name", &mut inner) {
            names.push(node_text(name, source));
        }
        let Some(values) = spec.child_by_field_name("value") else {
            continue;
        };
        for (i, name) in names.iter().enumerate() {
            let Some(value) = values.named_child(i) else {
                continue;
            };
            if is_literal_kind(value.kind()) {
                out.push((name.clone(), node_text(value, source)));
            }
        }
    }
    out
}

fn collect_struct_types(node: Node<'_>, source: &str, file: &mut FileDecls) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        let Some(type_node) = spec.child_by_field_name("type") else {
            continue;
        };
        if type_node.kind() != "struct_type" || name.is_empty() {
            continue;
        }
        let mut fields = HashMap::new();
        collect_struct_fields(type_node, source, file, &mut fields);
        file.structs.push(StructInfo { name, fields });
    }
}

fn collect_struct_fields(
    node: Node<'_>,
    source: &str,
    file: &FileDecls,
    fields: &mut HashMap<String, TypeRef>,
) {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        let mut cursor = n.walk();
        for child in n.named_children(&mut cursor) {
            if child.kind() == "field_declaration" {
                let Some(type_node) = child.child_by_field_name("type") else {
                    continue;
                };
                let Some(t) = type_ref_from_node(type_node, source, &file.imports, &file.pkg_path)
                else {
                    continue;
                };
                let mut inner = child.walk();
                for name in child.children_by_field_name("name", &mut inner) {
                    fields.insert(node_text(name, source), t.clone());
                }
            } else if child.kind() == "field_declaration_list" {
                stack.push(child);
            }
        }
    }
}

fn type_ref_from_node(
    node: Node<'_>,
    source: &str,
    imports: &HashMap<String, String>,
    pkg_path: &str,
) -> Option<TypeRef> {
    match node.kind() {
        "pointer_type" => {
            let inner = node.named_child(0)?;
            type_ref_from_node(inner, source, imports, pkg_path)
        }
        "qualified_type" => {
            let pkg = node.child_by_field_name("package")?;
            let name = node.child_by_field_name("name")?;
            let path = imports.get(&node_text(pkg, source))?;
            Some(TypeRef {
                pkg_path: path.clone(),
                name: node_text(name, source),
            })
        }
        "type_identifier" => Some(TypeRef {
            pkg_path: pkg_path.to_string(),
            name: node_text(node, source),
        }),
        _ => None,
    }
}

/// Type returned by a well-known framework constructor, falling back to the
/// Go convention that `NewX` returns an `X`.
fn constructor_type(pkg_path: &str, func: &str) -> Option<String> {
    match (pkg_path, func) {
        ("github.com/gin-gonic/gin", "Default") | ("github.com/gin-gonic/gin", "New") => {
            Some("Engine".to_string())
        }
        ("github.com/labstack/echo/v4", "New") => Some("Echo".to_string()),
        ("github.com/go-chi/chi/v5", "NewRouter") => Some("Mux".to_string()),
        _ => {
            let rest = func.strip_prefix("New")?;
            if rest.is_empty() {
                None
            } else {
                Some(rest.to_string())
            }
        }
    }
}

/// Second pass state for one top-level declaration and its closures.
struct CallWalker<'a> {
    source: &'a str,
    rel_path: &'a str,
    file: &'a FileDecls,
    index: &'a DeclIndex,
    types: &'a TypeTable,
    facts: &'a ValueFacts,
    indicators: &'a [Indicator],
    /// Variable types tracked in document order; shared across nested
    /// literals, approximating lexical scope.
    local_types: HashMap<String, TypeRef>,
    /// Next declaration index a discovered literal corresponds to. Literal
    /// discovery order here mirrors the first pass exactly.
    next_literal: usize,
    calls: Vec<Vec<RawCall>>,
}

/// Second pass: call sites, instruction order and indicator matches.
pub fn collect_calls(
    tree: &Tree,
    source: &str,
    file: &FileDecls,
    index: &DeclIndex,
    types: &TypeTable,
    facts: &ValueFacts,
    indicators: &[Indicator],
) -> Vec<Vec<RawCall>> {
    let root = tree.root_node();
    let mut calls: Vec<Vec<RawCall>> = (0..file.funcs.len()).map(|_| Vec::new()).collect();

    // Top-level declarations in document order line up with the first pass's
    // parentless entries.
    let mut top_level = file
        .funcs
        .iter()
        .enumerate()
        .filter(|(_, f)| f.parent.is_none())
        .map(|(i, _)| i);

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() != "function_declaration" && child.kind() != "method_declaration" {
            continue;
        }
        let Some(idx) = top_level.next() else {
            break;
        };
        let mut walker = CallWalker {
            source,
            rel_path: &file.rel_path,
            file,
            index,
            types,
            facts,
            indicators,
            local_types: HashMap::new(),
            next_literal: idx + 1,
            calls: std::mem::take(&mut calls),
        };
        walker.seed_scope(child);
        if let Some(body) = child.child_by_field_name("body") {
            walker.walk(body, idx);
        }
        calls = walker.calls;
    }
    calls
}

impl<'a> CallWalker<'a> {
    /// Seeds variable types from the receiver and typed parameters.
    fn seed_scope(&mut self, decl: Node<'_>) {
        if let Some(receiver) = decl.child_by_field_name("receiver") {
            self.seed_params(receiver);
        }
        if let Some(params) = decl.child_by_field_name("parameters") {
            self.seed_params(params);
        }
    }

    fn seed_params(&mut self, params: Node<'_>) {
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            if child.kind() != "parameter_declaration" {
                continue;
            }
            let Some(type_node) = child.child_by_field_name("type") else {
                continue;
            };
            let Some(t) =
                type_ref_from_node(type_node, self.source, &self.file.imports, &self.file.pkg_path)
            else {
                continue;
            };
            let mut inner = child.walk();
            for name in child.children_by_field_name("name", &mut inner) {
                self.local_types
                    .insert(node_text(name, self.source), t.clone());
            }
        }
    }

    fn ctx(&self, cur: usize) -> ResolveCtx<'_> {
        ResolveCtx {
            pkg_name: &self.file.pkg_name,
            pkg_path: &self.file.pkg_path,
            func_name: &self.file.funcs[cur].name,
            imports: &self.file.imports,
            local_types: &self.local_types,
            facts: self.facts,
            source: self.source,
        }
    }

    fn walk(&mut self, node: Node<'_>, cur: usize) {
        match node.kind() {
            "call_expression" => self.handle_call(node, cur, InstrKind::Call),
            // A single-argument generic call like `register[int](x)` parses
            // as a conversion whose type is a generic_type.
            "type_conversion_expression"
                if node
                    .child_by_field_name("type")
                    .is_some_and(|t| t.kind() == "generic_type") =>
            {
                self.handle_call(node, cur, InstrKind::Call);
            }
            "defer_statement" | "go_statement" => {
                let kind = if node.kind() == "defer_statement" {
                    InstrKind::Defer
                } else {
                    InstrKind::Go
                };
                let mut handled = false;
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "call_expression" && !handled {
                        self.handle_call(child, cur, kind);
                        handled = true;
                    } else {
                        self.walk(child, cur);
                    }
                }
            }
            "func_literal" => {
                let idx = self.enter_literal(node);
                if let Some(idx) = idx {
                    self.push_call(
                        cur,
                        RawCall {
                            kind: InstrKind::MakeClosure,
                            pos: node_pos(node, self.rel_path),
                            callee: None,
                            callee_name: self.file.funcs[idx].name.clone(),
                            literal_target: Some(idx),
                            closure_args: Vec::new(),
                            dynamic_method: false,
                            matched: None,
                        },
                    );
                }
            }
            "short_var_declaration" | "var_declaration" => {
                self.track_types(node);
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, cur);
                }
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, cur);
                }
            }
        }
    }

    /// Registers a literal against the next pass-one closure slot and walks
    /// its body under the closure's own identity.
    fn enter_literal(&mut self, node: Node<'_>) -> Option<usize> {
        let idx = self.next_literal;
        if idx >= self.file.funcs.len() || self.file.funcs[idx].parent.is_none() {
            return None;
        }
        self.next_literal += 1;
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, idx);
        }
        Some(idx)
    }

    fn push_call(&mut self, cur: usize, call: RawCall) {
        self.calls[cur].push(call);
    }

    fn handle_call(&mut self, call: Node<'_>, cur: usize, kind: InstrKind) {
        let Some(fn_node) = callee_node(call) else {
            return;
        };
        let pos = node_pos(call, self.rel_path);

        // Immediately invoked, deferred or launched literal.
        if fn_node.kind() == "func_literal" {
            if let Some(idx) = self.enter_literal(fn_node) {
                self.push_call(
                    cur,
                    RawCall {
                        kind,
                        pos,
                        callee: None,
                        callee_name: self.file.funcs[idx].name.clone(),
                        literal_target: Some(idx),
                        closure_args: Vec::new(),
                        dynamic_method: false,
                        matched: None,
                    },
                );
            }
            self.walk_args(call, cur, &mut Vec::new());
            return;
        }

        self.materialize_chained_receiver(fn_node);
        let resolved = resolver::resolve_callee(fn_node, &self.ctx(cur));
        let callee_name = simple_callee_name(fn_node, self.source);

        // Nested calls inside the callee expression itself.
        let mut cursor = fn_node.walk();
        for child in fn_node.named_children(&mut cursor) {
            self.walk(child, cur);
        }

        let mut closure_args = Vec::new();
        self.walk_args(call, cur, &mut closure_args);

        let dynamic_method =
            resolved.is_none() && fn_node.kind() == "selector_expression" && !callee_name.is_empty();

        let matched = resolved
            .as_ref()
            .and_then(|rc| self.match_site(rc, call, cur));

        self.push_call(
            cur,
            RawCall {
                kind,
                pos,
                callee: resolved,
                callee_name,
                literal_target: None,
                closure_args,
                dynamic_method,
                matched,
            },
        );
    }

    /// Walks argument expressions; literals passed as arguments become
    /// closure declarations recorded on the call site.
    fn walk_args(&mut self, call: Node<'_>, cur: usize, closure_args: &mut Vec<usize>) {
        for arg in arg_nodes(call) {
            if arg.kind() == "func_literal" {
                if let Some(idx) = self.enter_literal(arg) {
                    closure_args.push(idx);
                }
            } else {
                self.walk(arg, cur);
            }
        }
    }

    /// Resolves `x.field.Method` receivers one field deep through the struct
    /// table, caching the chained name as a tracked variable.
    fn materialize_chained_receiver(&mut self, fn_node: Node<'_>) {
        if fn_node.kind() != "selector_expression" {
            return;
        }
        let Some(operand) = fn_node.child_by_field_name("operand") else {
            return;
        };
        if operand.kind() != "selector_expression" {
            return;
        }
        let op_text = node_text(operand, self.source);
        if self.local_types.contains_key(&op_text) {
            return;
        }
        let Some(base) = operand.child_by_field_name("operand") else {
            return;
        };
        let Some(field) = operand.child_by_field_name("field") else {
            return;
        };
        if base.kind() != "identifier" {
            return;
        }
        let Some(base_type) = self.local_types.get(&node_text(base, self.source)) else {
            return;
        };
        let key = (base_type.pkg_path.clone(), base_type.name.clone());
        if let Some(fields) = self.types.get(&key)
            && let Some(t) = fields.get(&node_text(field, self.source))
        {
            self.local_types.insert(op_text, t.clone());
        }
    }

    fn track_types(&mut self, node: Node<'_>) {
        match node.kind() {
            "short_var_declaration" => {
                let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    return;
                };
                for i in 0..left.named_child_count() {
                    let Some(l) = left.named_child(i) else {
                        continue;
                    };
                    if l.kind() != "identifier" {
                        continue;
                    }
                    let Some(r) = right.named_child(i) else {
                        continue;
                    };
                    if let Some(t) = self.infer_type(r) {
                        self.local_types.insert(node_text(l, self.source), t);
                    }
                }
            }
            "var_declaration" => {
                let mut cursor = node.walk();
                for spec in node.named_children(&mut cursor) {
                    if spec.kind() != "var_spec" {
                        continue;
                    }
                    let Some(type_node) = spec.child_by_field_name("type") else {
                        continue;
                    };
                    let Some(t) = type_ref_from_node(
                        type_node,
                        self.source,
                        &self.file.imports,
                        &self.file.pkg_path,
                    ) else {
                        continue;
                    };
                    let mut inner = spec.walk();
                    for name in spec.children_by_field_name("name", &mut inner) {
                        self.local_types
                            .insert(node_text(name, self.source), t.clone());
                    }
                }
            }
            _ => {}
        }
    }

    /// Infers the type a variable gets from its initializer: a framework
    /// constructor, a composite literal or a `&T{}` expression.
    fn infer_type(&self, expr: Node<'_>) -> Option<TypeRef> {
        match expr.kind() {
            "call_expression" => {
                let fn_node = expr.child_by_field_name("function")?;
                if fn_node.kind() != "selector_expression" {
                    return None;
                }
                let operand = fn_node.child_by_field_name("operand")?;
                let field = fn_node.child_by_field_name("field")?;
                let path = self
                    .file
                    .imports
                    .get(&node_text(operand, self.source))?
                    .clone();
                let fname = node_text(field, self.source);
                constructor_type(&path, &fname).map(|name| TypeRef {
                    pkg_path: path,
                    name,
                })
            }
            "unary_expression" => {
                let inner = expr.child_by_field_name("operand")?;
                self.infer_type(inner)
            }
            "composite_literal" => {
                let type_node = expr.child_by_field_name("type")?;
                type_ref_from_node(type_node, self.source, &self.file.imports, &self.file.pkg_path)
            }
            _ => None,
        }
    }

    fn match_site(&self, rc: &resolver::ResolvedCallee, call: Node<'_>, cur: usize) -> Option<PendingMatch> {
        let signature = self.signature_for(rc);
        let info = FuncInfo {
            pkg_path: rc.pkg_path.clone(),
            name: rc.name.clone(),
            signature: signature.clone(),
        };
        let indicator = info.match_indicator(self.indicators)?.clone();
        let args = arg_nodes(call);
        let params = resolver::resolve_params(
            &indicator.params,
            signature.as_ref(),
            &args,
            &self.ctx(cur),
        );
        Some(PendingMatch { indicator, params })
    }

    /// Signature of the callee: parameter names from an in-repo declaration,
    /// or the well-known table for external frameworks.
    fn signature_for(&self, rc: &resolver::ResolvedCallee) -> Option<Signature> {
        let recv_type = rc.receiver.as_deref().map(|r| {
            r.trim_start_matches('*')
                .rsplit('.')
                .next()
                .unwrap_or(r)
                .to_string()
        });
        for entry in self.index.candidates(&rc.pkg_path, &rc.name) {
            let matches = match (&entry.receiver, &recv_type) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if matches {
                return Some(Signature {
                    params: entry.params.clone(),
                    receiver: rc.receiver.clone(),
                });
            }
        }
        known_signature(&rc.pkg_path, &rc.name).map(|mut sig| {
            sig.receiver = rc.receiver.clone();
            sig
        })
    }
}

/// Callee expression of a call site, covering the conversion-shaped parse of
/// single-argument generic calls.
fn callee_node<'b>(call: Node<'b>) -> Option<Node<'b>> {
    if let Some(f) = call.child_by_field_name("function") {
        return Some(f);
    }
    call.child_by_field_name("type")
        .filter(|t| t.kind() == "generic_type")
}

fn arg_nodes<'b>(call: Node<'b>) -> Vec<Node<'b>> {
    let Some(args) = call.child_by_field_name("arguments") else {
        // Conversion-shaped generic call: the lone argument is the operand.
        return call.child_by_field_name("operand").into_iter().collect();
    };
    let mut out = Vec::new();
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        out.push(child);
    }
    out
}

/// Callee name as written at the site: the identifier, or the selector's
/// field.
fn simple_callee_name(fn_node: Node<'_>, source: &str) -> String {
    match fn_node.kind() {
        "identifier" => node_text(fn_node, source),
        "selector_expression" => fn_node
            .child_by_field_name("field")
            .map(|f| node_text(f, source))
            .unwrap_or_default(),
        "index_expression" | "generic_type" | "parenthesized_expression" => fn_node
            .named_child(0)
            .map(|n| simple_callee_name(n, source))
            .unwrap_or_default(),
        _ => String::new(),
    }
}
