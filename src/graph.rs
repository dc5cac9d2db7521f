use serde::Serialize;
use std::fmt;

/// Stable handle for one function in the call graph. Assigned once by the
/// builder; all cross-references use handles, never pointer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub u32);

/// Named function, or a function literal tagged with the function that
/// lexically encloses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Named,
    Closure { parent: FuncId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub file: String,
    pub line: i64,
    pub col: i64,
}

impl Position {
    pub fn new(file: impl Into<String>, line: i64, col: i64) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }

    /// Synthetic functions (e.g. generated init) have no source position.
    pub fn unknown() -> Self {
        Self {
            file: String::new(),
            line: 0,
            col: 0,
        }
    }

    pub fn is_known(&self) -> bool {
        !self.file.is_empty()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}:{}", self.file, self.line, self.col)
        } else {
            write!(f, "<unknown>")
        }
    }
}

/// Instruction kinds the recoverability analyzer cares about. Everything
/// else in a body is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrKind {
    Defer,
    Go,
    Call,
    MakeClosure,
    Other,
}

#[derive(Debug, Clone)]
pub struct Instr {
    pub kind: InstrKind,
    /// Statically known target, when the callee resolves inside the graph.
    pub target: Option<FuncId>,
    /// Callee name as written at the site ("recover" for the builtin).
    pub callee_name: String,
}

impl Instr {
    pub fn new(kind: InstrKind, target: Option<FuncId>, callee_name: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            callee_name: callee_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instrs: Vec<Instr>,
}

/// One call site: where the call happens and what could be determined about
/// the callee at that site.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub pos: Position,
    /// Simple callee name as written ("Handle", "process", ...).
    pub callee_name: String,
    pub static_callee: Option<FuncId>,
    /// Function literals passed as arguments at this site.
    pub closure_args: Vec<FuncId>,
}

impl CallSite {
    pub fn new(pos: Position, callee_name: impl Into<String>) -> Self {
        Self {
            pos,
            callee_name: callee_name.into(),
            static_callee: None,
            closure_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeData {
    pub caller: FuncId,
    pub callee: FuncId,
    pub site: CallSite,
}

#[derive(Debug)]
pub struct FuncData {
    pub name: String,
    /// Short package name from the package clause ("main", "http").
    pub pkg_name: String,
    /// Full import path ("example.com/app/handlers", "net/http").
    pub pkg_path: String,
    pub pos: Position,
    pub kind: FuncKind,
    pub blocks: Vec<Block>,
    /// Index of the block where deferred calls run on panic, when the
    /// function registers any defer.
    pub recover_block: Option<usize>,
    in_edges: Vec<EdgeId>,
    out_edges: Vec<EdgeId>,
}

/// Whole-program call graph: arena of function nodes plus directed call
/// edges. Immutable once built; searches only read it.
#[derive(Debug, Default)]
pub struct CallGraph {
    funcs: Vec<FuncData>,
    edges: Vec<EdgeData>,
}

impl CallGraph {
    pub fn func(&self, id: FuncId) -> &FuncData {
        &self.funcs[id.0 as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &EdgeData {
        &self.edges[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> + '_ {
        (0..self.funcs.len() as u32).map(FuncId)
    }

    /// Incoming edges: who calls this function.
    pub fn callers(&self, id: FuncId) -> impl Iterator<Item = (EdgeId, &EdgeData)> + '_ {
        self.func(id)
            .in_edges
            .iter()
            .map(move |eid| (*eid, self.edge(*eid)))
    }

    /// Outgoing edges: whom this function calls.
    pub fn callees(&self, id: FuncId) -> impl Iterator<Item = (EdgeId, &EdgeData)> + '_ {
        self.func(id)
            .out_edges
            .iter()
            .map(move |eid| (*eid, self.edge(*eid)))
    }

    pub fn caller_count(&self, id: FuncId) -> usize {
        self.func(id).in_edges.len()
    }

    pub fn is_closure(&self, id: FuncId) -> bool {
        matches!(self.func(id).kind, FuncKind::Closure { .. })
    }

    pub fn closure_parent(&self, id: FuncId) -> Option<FuncId> {
        match self.func(id).kind {
            FuncKind::Closure { parent } => Some(parent),
            FuncKind::Named => None,
        }
    }

    /// Nearest named function enclosing `id` (identity for named functions).
    pub fn named_ancestor(&self, id: FuncId) -> FuncId {
        let mut cur = id;
        while let FuncKind::Closure { parent } = self.func(cur).kind {
            cur = parent;
        }
        cur
    }

    /// Whether the node belongs to the entry family: `main`/`init` or a
    /// closure nested (transitively) inside one.
    pub fn is_entry_family(&self, id: FuncId) -> bool {
        let root = self.func(self.named_ancestor(id));
        root.name == "main" || root.name == "init"
    }

    /// Closures lexically defined inside `parent`.
    pub fn child_closures(&self, parent: FuncId) -> impl Iterator<Item = FuncId> + '_ {
        self.func_ids()
            .filter(move |id| self.closure_parent(*id) == Some(parent))
    }

    /// Display name: closures render with their enclosing chain, e.g.
    /// `serve$1`. Used for output only; closure detection goes through
    /// `FuncKind`.
    pub fn display_name(&self, id: FuncId) -> String {
        self.func(id).name.clone()
    }
}

/// Builds the arena. Call sites reference ids handed out by `add_func`, so
/// callers typically register every function first and then wire edges.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: CallGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_func(
        &mut self,
        name: impl Into<String>,
        pkg_name: impl Into<String>,
        pkg_path: impl Into<String>,
        pos: Position,
        kind: FuncKind,
    ) -> FuncId {
        let id = FuncId(self.graph.funcs.len() as u32);
        self.graph.funcs.push(FuncData {
            name: name.into(),
            pkg_name: pkg_name.into(),
            pkg_path: pkg_path.into(),
            pos,
            kind,
            blocks: Vec::new(),
            recover_block: None,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        });
        id
    }

    pub fn set_blocks(&mut self, id: FuncId, blocks: Vec<Block>, recover_block: Option<usize>) {
        let data = &mut self.graph.funcs[id.0 as usize];
        data.blocks = blocks;
        data.recover_block = recover_block;
    }

    pub fn add_edge(&mut self, caller: FuncId, callee: FuncId, site: CallSite) -> EdgeId {
        let id = EdgeId(self.graph.edges.len() as u32);
        self.graph.edges.push(EdgeData {
            caller,
            callee,
            site,
        });
        self.graph.funcs[callee.0 as usize].in_edges.push(id);
        self.graph.funcs[caller.0 as usize].out_edges.push(id);
        id
    }

    pub fn func(&self, id: FuncId) -> &FuncData {
        self.graph.func(id)
    }

    pub fn finish(self) -> CallGraph {
        self.graph
    }
}
