//! Scans a Go repository into a whole-program call graph plus the indicator
//! matches found along the way.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::graph::{
    Block, CallGraph, CallSite, FuncId, FuncKind, GraphBuilder, Instr, InstrKind, Position,
};
use crate::indicator::Indicator;
use crate::model::{CallPaths, RouteMatch, normalize_params};
use crate::resolver::{ResolvedCallee, TypeRef, ValueFacts};
use crate::util::unix_path;

pub mod go;

/// Declarations extracted from one file in the first pass.
#[derive(Debug)]
pub struct FileDecls {
    pub rel_path: String,
    pub pkg_name: String,
    pub pkg_path: String,
    pub imports: HashMap<String, String>,
    /// Named declarations in document order, each immediately followed by
    /// the closures nested inside it, discovery order.
    pub funcs: Vec<DeclInfo>,
    pub structs: Vec<StructInfo>,
}

#[derive(Debug)]
pub struct DeclInfo {
    pub name: String,
    /// Bare receiver type name for methods.
    pub receiver: Option<String>,
    pub params: Vec<String>,
    pub pos: Position,
    /// Index of the enclosing declaration for closures.
    pub parent: Option<usize>,
    pub has_defer: bool,
}

#[derive(Debug)]
pub struct StructInfo {
    pub name: String,
    pub fields: HashMap<String, TypeRef>,
}

/// One call site recorded in the second pass, before linking.
#[derive(Debug)]
pub struct RawCall {
    pub kind: InstrKind,
    pub pos: Position,
    pub callee: Option<ResolvedCallee>,
    /// Callee name as written at the site.
    pub callee_name: String,
    /// Declaration index of an invoked, deferred or launched literal.
    pub literal_target: Option<usize>,
    /// Declaration indices of literals passed as arguments.
    pub closure_args: Vec<usize>,
    /// Method call whose receiver type could not be determined; linked
    /// conservatively against every same-named method in the repo.
    pub dynamic_method: bool,
    pub matched: Option<PendingMatch>,
}

#[derive(Debug)]
pub struct PendingMatch {
    pub indicator: Indicator,
    pub params: BTreeMap<String, String>,
}

/// Lookup from (package path, function name) to registered declarations.
#[derive(Debug, Default)]
pub struct DeclIndex {
    by_name: HashMap<(String, String), Vec<DeclEntry>>,
    methods: HashMap<String, Vec<FuncId>>,
}

#[derive(Debug)]
pub struct DeclEntry {
    pub id: FuncId,
    pub receiver: Option<String>,
    pub params: Vec<String>,
}

impl DeclIndex {
    pub fn candidates(&self, pkg_path: &str, name: &str) -> &[DeclEntry] {
        self.by_name
            .get(&(pkg_path.to_string(), name.to_string()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn methods_named(&self, name: &str) -> &[FuncId] {
        self.methods.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Struct field types per (package path, struct name).
pub type TypeTable = HashMap<(String, String), HashMap<String, TypeRef>>;

pub struct ScanResult {
    pub module: String,
    pub graph: CallGraph,
    pub matches: Vec<RouteMatch>,
}

pub struct Scanner {
    indicators: Vec<Indicator>,
}

impl Scanner {
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self { indicators }
    }

    pub fn scan(&self, root: &Path) -> Result<ScanResult> {
        let module = read_module(root);
        let files = collect_go_files(root)?;
        let mut parser = go::GoParser::new()?;
        let mut parsed = Vec::new();
        for (rel, source) in files {
            match parser.parse(&source) {
                Some(tree) => parsed.push((rel, source, tree)),
                None => eprintln!("routemap: Warning: failed to parse {rel}, skipping"),
            }
        }

        // Pass one over every file, so value facts are complete and frozen
        // before any argument gets resolved.
        let mut facts = ValueFacts::default();
        let mut decls = Vec::with_capacity(parsed.len());
        for (rel, source, tree) in &parsed {
            decls.push(go::collect_decls(tree, source, rel, &module, &mut facts));
        }

        let mut builder = GraphBuilder::new();
        let mut index = DeclIndex::default();
        let mut types: TypeTable = HashMap::new();
        let mut ids: Vec<Vec<FuncId>> = Vec::with_capacity(decls.len());
        for file in &decls {
            let mut file_ids: Vec<FuncId> = Vec::with_capacity(file.funcs.len());
            for decl in &file.funcs {
                let kind = match decl.parent {
                    Some(p) => FuncKind::Closure {
                        parent: file_ids[p],
                    },
                    None => FuncKind::Named,
                };
                let id = builder.add_func(
                    decl.name.as_str(),
                    file.pkg_name.as_str(),
                    file.pkg_path.as_str(),
                    decl.pos.clone(),
                    kind,
                );
                file_ids.push(id);
                if decl.parent.is_none() {
                    index
                        .by_name
                        .entry((file.pkg_path.clone(), decl.name.clone()))
                        .or_default()
                        .push(DeclEntry {
                            id,
                            receiver: decl.receiver.clone(),
                            params: decl.params.clone(),
                        });
                    if decl.receiver.is_some() {
                        index.methods.entry(decl.name.clone()).or_default().push(id);
                    }
                }
            }
            for s in &file.structs {
                types.insert((file.pkg_path.clone(), s.name.clone()), s.fields.clone());
            }
            ids.push(file_ids);
        }

        let mut matches = Vec::new();
        for (fi, (_, source, tree)) in parsed.iter().enumerate() {
            let file = &decls[fi];
            let calls =
                go::collect_calls(tree, source, file, &index, &types, &facts, &self.indicators);
            link_file(&mut builder, file, &ids[fi], calls, &index, &module, &mut matches);
        }

        Ok(ScanResult {
            module,
            graph: builder.finish(),
            matches,
        })
    }
}

/// Wires raw calls into graph edges, instruction lists and route matches.
fn link_file(
    builder: &mut GraphBuilder,
    file: &FileDecls,
    ids: &[FuncId],
    calls: Vec<Vec<RawCall>>,
    index: &DeclIndex,
    module: &str,
    matches: &mut Vec<RouteMatch>,
) {
    for (di, raw_calls) in calls.into_iter().enumerate() {
        let caller = ids[di];
        let mut instrs = Vec::new();
        for rc in raw_calls {
            if let Some(lit) = rc.literal_target {
                let target = ids[lit];
                let mut site = CallSite::new(rc.pos.clone(), rc.callee_name.as_str());
                site.static_callee = Some(target);
                builder.add_edge(caller, target, site);
                instrs.push(Instr::new(rc.kind, Some(target), rc.callee_name.as_str()));
                continue;
            }

            let mut targets: Vec<FuncId> = Vec::new();
            if let Some(callee) = &rc.callee {
                let recv_type = callee.receiver.as_deref().map(short_type_name);
                for entry in index.candidates(&callee.pkg_path, &callee.name) {
                    let ok = match (&entry.receiver, &recv_type) {
                        (None, None) => true,
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    };
                    if ok {
                        targets.push(entry.id);
                    }
                }
            } else if rc.dynamic_method {
                targets.extend(index.methods_named(&rc.callee_name).iter().copied());
            }
            let static_callee = if targets.len() == 1 { Some(targets[0]) } else { None };
            let closure_ids: Vec<FuncId> = rc.closure_args.iter().map(|i| ids[*i]).collect();

            for t in &targets {
                let mut site = CallSite::new(rc.pos.clone(), rc.callee_name.as_str());
                site.static_callee = static_callee;
                site.closure_args = closure_ids.clone();
                builder.add_edge(caller, *t, site);
            }

            // A literal passed as an argument is entered by its receiver
            // when that is known, else by the function that defines it.
            for c in &closure_ids {
                let owner = static_callee.unwrap_or(caller);
                let name = builder.func(*c).name.clone();
                let mut site = CallSite::new(rc.pos.clone(), name.as_str());
                site.static_callee = Some(*c);
                builder.add_edge(owner, *c, site);
                instrs.push(Instr::new(InstrKind::MakeClosure, Some(*c), name.as_str()));
            }

            instrs.push(Instr::new(
                rc.kind,
                targets.first().copied(),
                rc.callee_name.as_str(),
            ));

            if let Some(pending) = rc.matched {
                let decl = &file.funcs[di];
                matches.push(RouteMatch {
                    match_id: format!("m{}", matches.len() + 1),
                    indicator: pending.indicator,
                    params: normalize_params(pending.params),
                    pos: rc.pos.clone(),
                    module: module.to_string(),
                    enclosed_by: Some(caller),
                    enclosed_desc: format!("{}.[{}] {}", file.pkg_name, decl.name, decl.pos),
                    target_func: static_callee,
                    call_paths: CallPaths::default(),
                });
            }
        }
        let recover_block = if file.funcs[di].has_defer { Some(0) } else { None };
        builder.set_blocks(caller, vec![Block { instrs }], recover_block);
    }
}

fn short_type_name(receiver: &str) -> String {
    receiver
        .trim_start_matches('*')
        .rsplit('.')
        .next()
        .unwrap_or(receiver)
        .to_string()
}

/// Module path from go.mod, empty when absent.
fn read_module(root: &Path) -> String {
    let Ok(content) = fs::read_to_string(root.join("go.mod")) else {
        eprintln!(
            "routemap: Warning: no go.mod under {}; module-aware filtering disabled",
            root.display()
        );
        return String::new();
    };
    for line in content.lines() {
        if let Some(rest) = line.trim().strip_prefix("module ") {
            return rest.trim().trim_matches('"').to_string();
        }
    }
    String::new()
}

/// Go sources under the root, gitignore-aware, sorted for stable ids across
/// runs. Tests and vendored code are not part of the program being mapped.
fn collect_go_files(root: &Path) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for entry in WalkBuilder::new(root).build() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("go") {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        let rel_str = unix_path(rel);
        if rel_str.ends_with("_test.go") {
            continue;
        }
        if rel_str
            .split('/')
            .any(|c| c == "vendor" || c == "testdata")
        {
            continue;
        }
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        out.push((rel_str, source));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
