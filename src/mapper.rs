//! Walks the call graph backward from a matched call site toward program
//! entry points, collecting every caller chain that survives the configured
//! filtering and limiting policy.

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use anyhow::bail;

use crate::graph::{CallGraph, EdgeData, EdgeId, FuncId, Position};
use crate::model::{CallPath, CallPaths, PathNode, RouteMatch};
use crate::recover::is_recoverable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchAlgorithm {
    #[default]
    Bfs,
    Dfs,
}

impl FromStr for SearchAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bfs" => Ok(SearchAlgorithm::Bfs),
            "dfs" => Ok(SearchAlgorithm::Dfs),
            other => bail!("unknown search algorithm {other:?}, expected bfs or dfs"),
        }
    }
}

/// How aggressively traversal stops at or near entry points.
///
/// `None` lets analysis run past `main`. `Normal` stops at `main` and prunes
/// callers that leave the main package, unless the current node is a closure.
/// `High` and up prune any caller outside the current node's package.
/// `VeryStrict` additionally drops edges whose call site does not name the
/// function being walked, which weeds out spurious edges a class-hierarchy
/// call graph invents for interface methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LimiterMode {
    None,
    #[default]
    Normal,
    High,
    Strict,
    VeryStrict,
}

impl FromStr for LimiterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(LimiterMode::None),
            "normal" => Ok(LimiterMode::Normal),
            "high" => Ok(LimiterMode::High),
            "strict" => Ok(LimiterMode::Strict),
            "very-strict" => Ok(LimiterMode::VeryStrict),
            other => bail!(
                "unknown limiter mode {other:?}, expected none, normal, high, strict or very-strict"
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Package-path prefix a caller must carry to be traversed. Empty means
    /// unrestricted.
    pub filter: String,
    /// Cap on nodes per path; 0 means unlimited.
    pub max_funcs: usize,
    /// Cap on collected paths per match; 0 means unlimited.
    pub max_paths: usize,
    /// Render full node identity instead of the compact descriptor.
    pub print_nodes: bool,
    pub search_alg: SearchAlgorithm,
    pub limiter: LimiterMode,
    /// Flatten function literals to their enclosing named function before
    /// qualifying caller edges. Implied by `limiter >= Strict`.
    pub skip_closures: bool,
    /// Derive the filter from the match's own module path.
    pub module_only: bool,
    /// Deduplicate paths that render identically and keep siteless steps
    /// visible with a synthetic descriptor.
    pub simplify: bool,
}

impl Options {
    fn flatten_closures(&self) -> bool {
        self.limiter >= LimiterMode::Strict || self.skip_closures
    }
}

pub struct CallMapper<'a> {
    graph: &'a CallGraph,
    options: Options,
}

impl<'a> CallMapper<'a> {
    /// `module_only` resolves against the match here, so searches for matches
    /// in different modules get different effective filters.
    pub fn new(graph: &'a CallGraph, m: &RouteMatch, mut options: Options) -> Self {
        if options.module_only && !m.module.is_empty() {
            options.filter = m.module.clone();
        }
        Self { graph, options }
    }

    /// Collects every caller chain from `start`, the function enclosing the
    /// matched call, toward program roots.
    pub fn all_paths(&self, start: FuncId, m: &RouteMatch) -> CallPaths {
        let mut paths = CallPaths {
            target: self.target_desc(start, m),
            paths: Vec::new(),
            path_limited: false,
        };
        let initial = vec![self.seed_node(start)];
        match self.options.search_alg {
            SearchAlgorithm::Dfs => {
                let mut visited = HashSet::new();
                self.dfs(start, &mut visited, initial, &mut paths, None);
            }
            SearchAlgorithm::Bfs => self.bfs(start, initial, &mut paths),
        }
        paths
    }

    fn seed_node(&self, start: FuncId) -> PathNode {
        let pos = self.graph.func(start).pos.clone();
        PathNode {
            desc: self.node_desc(start, &pos),
            func: start,
            site: None,
            recoverable: is_recoverable(self.graph, start),
        }
    }

    /// Descriptor for where the indicator call's own callee landed, shown by
    /// reporters separately from the caller chain.
    fn target_desc(&self, start: FuncId, m: &RouteMatch) -> String {
        match m.target_func {
            Some(target) => self.node_desc(target, &m.pos),
            None => {
                let enc = self.graph.func(start);
                format!("{}.[{}] {}", enc.pkg_name, m.indicator.function, m.pos)
            }
        }
    }

    /// Depth-first walk. Returns true when every continuation from this node
    /// fell outside the filter, so the caller can flag its own path instead
    /// of silently dropping the branch.
    fn dfs(
        &self,
        dest: FuncId,
        visited: &mut HashSet<FuncId>,
        path: Vec<PathNode>,
        paths: &mut CallPaths,
        site: Option<EdgeId>,
    ) -> bool {
        let new_path = self.append_node(dest, path, site);

        if self.options.limiter > LimiterMode::None && self.graph.is_entry_family(dest) {
            self.emit(paths, new_path, false, false);
            return false;
        }

        let must_stop = self.options.max_funcs > 0 && new_path.len() >= self.options.max_funcs;
        if self.graph.caller_count(dest) == 0 || must_stop {
            self.emit(paths, new_path, must_stop, false);
            return false;
        }

        // Root of a search restarted on an already-walked node.
        if visited.contains(&dest) {
            self.emit(paths, new_path, false, false);
            return false;
        }
        visited.insert(dest);
        let left_filter = self.dfs_expand(dest, visited, new_path, paths);
        visited.remove(&dest);
        left_filter
    }

    fn dfs_expand(
        &self,
        dest: FuncId,
        visited: &mut HashSet<FuncId>,
        path: Vec<PathNode>,
        paths: &mut CallPaths,
    ) -> bool {
        let (node, new_path) = if self.options.flatten_closures() {
            self.flatten_closure(dest, path)
        } else {
            (dest, path)
        };

        let mut all_skipped = true;
        for (eid, edge) in self.graph.callers(node) {
            if self.options.max_paths > 0 && paths.len() >= self.options.max_paths {
                paths.path_limited = true;
                continue;
            }
            if visited.contains(&edge.caller) {
                continue;
            }
            if self.skip_edge(edge, node) {
                continue;
            }
            if self.main_pkg_limited(dest, edge) {
                continue;
            }
            all_skipped = false;
            if self.dfs(edge.caller, visited, new_path.clone(), paths, Some(eid)) {
                // Everything beyond this caller left the filter; emit what we
                // have and stop exploring siblings.
                self.emit(paths, new_path, false, true);
                return false;
            }
        }
        if all_skipped {
            self.emit(paths, new_path, false, true);
            return true;
        }
        false
    }

    fn bfs(&self, start: FuncId, initial: Vec<PathNode>, paths: &mut CallPaths) {
        let mut queue: VecDeque<(FuncId, Vec<PathNode>)> = VecDeque::new();
        queue.push_back((start, initial));

        let mut capped = false;
        'outer: while let Some((current, current_path)) = queue.pop_front() {
            if self.options.limiter > LimiterMode::None && self.graph.is_entry_family(current) {
                self.emit(paths, current_path, false, false);
                continue;
            }
            if self.options.max_funcs > 0 && current_path.len() >= self.options.max_funcs {
                self.emit(paths, current_path, true, false);
                continue;
            }

            let (node, new_path) = if self.options.flatten_closures() {
                self.flatten_closure(current, current_path)
            } else {
                (current, current_path)
            };

            let mut all_outside_filter = true;
            let mut all_outside_main = true;
            let mut all_in_path = true;
            for (eid, edge) in self.graph.callers(node) {
                if self.caller_in_path(edge.caller, &new_path) {
                    continue;
                }
                if self.options.limiter >= LimiterMode::VeryStrict && !self.site_matches(edge, node)
                {
                    continue;
                }
                if !self.options.filter.is_empty() && !self.passes_filter(edge.caller) {
                    continue;
                }
                if self.main_pkg_limited(current, edge) {
                    all_in_path = false;
                    continue;
                }
                all_outside_filter = false;
                all_outside_main = false;
                all_in_path = false;

                let with_caller = self.append_node(edge.caller, new_path.clone(), Some(eid));
                queue.push_back((edge.caller, with_caller));

                if self.options.max_paths > 0 && queue.len() + paths.len() >= self.options.max_paths
                {
                    capped = true;
                    break 'outer;
                }
            }

            if all_outside_main && !all_in_path {
                self.emit(paths, new_path, false, false);
                continue;
            }
            if !self.options.filter.is_empty() && all_outside_filter {
                self.emit(paths, new_path, false, true);
                continue;
            }
            if all_in_path {
                self.emit(paths, new_path, false, false);
            }
        }

        // Flush paths still in flight when the cap cut the walk short.
        if capped {
            paths.path_limited = true;
            for (_, pending) in queue {
                self.emit(paths, pending, false, false);
            }
        }
    }

    /// The only place paths enter the collection, so the path cap holds no
    /// matter which branch finished a path.
    fn emit(&self, paths: &mut CallPaths, nodes: Vec<PathNode>, node_limited: bool, filter_limited: bool) {
        if self.options.max_paths > 0 && paths.len() >= self.options.max_paths {
            paths.path_limited = true;
            return;
        }
        paths.insert(
            CallPath {
                nodes,
                node_limited,
                filter_limited,
            },
            self.options.simplify,
        );
    }

    fn skip_edge(&self, edge: &EdgeData, node: FuncId) -> bool {
        if self.options.limiter >= LimiterMode::VeryStrict && !self.site_matches(edge, node) {
            return true;
        }
        !self.options.filter.is_empty() && !self.passes_filter(edge.caller)
    }

    /// Class-hierarchy graphs route interface calls to every implementor;
    /// under VeryStrict an edge counts only if its site names the function
    /// being walked or resolves to it statically.
    fn site_matches(&self, edge: &EdgeData, node: FuncId) -> bool {
        if edge.site.static_callee == Some(node) {
            return true;
        }
        !edge.site.callee_name.is_empty() && edge.site.callee_name == self.graph.func(node).name
    }

    fn passes_filter(&self, caller: FuncId) -> bool {
        let f = self.graph.func(caller);
        f.pkg_path.starts_with(&self.options.filter) || f.pkg_name == "main"
    }

    /// Entry-module pruning. Only kicks in while walking a node in a package
    /// literally named `main`; callers that hop to a different main package,
    /// or out of main entirely, are unrealistic continuations there.
    fn main_pkg_limited(&self, current: FuncId, edge: &EdgeData) -> bool {
        if self.options.limiter == LimiterMode::None {
            return false;
        }
        let cur = self.graph.func(current);
        // Synthetic nodes (generated init) carry no source position.
        if !cur.pos.is_known() {
            return true;
        }
        if cur.pkg_name != "main" {
            return false;
        }
        let caller = self.graph.func(edge.caller);
        let different_main = caller.pkg_name == "main" && cur.pkg_path != caller.pkg_path;
        let non_main = caller.pkg_name != "main" && cur.pkg_path != caller.pkg_path;
        match self.options.limiter {
            LimiterMode::Normal => {
                different_main || (non_main && !self.graph.is_closure(current))
            }
            LimiterMode::High | LimiterMode::Strict | LimiterMode::VeryStrict => {
                different_main || non_main
            }
            LimiterMode::None => false,
        }
    }

    fn caller_in_path(&self, caller: FuncId, path: &[PathNode]) -> bool {
        path.iter().any(|n| n.func == caller)
    }

    /// Swaps a function literal for its nearest named ancestor, recording
    /// each intermediate literal as a siteless path step. Edge qualification
    /// then runs against the ancestor's callers.
    fn flatten_closure(&self, node: FuncId, path: Vec<PathNode>) -> (FuncId, Vec<PathNode>) {
        let mut path = self.append_node(node, path, None);
        let mut cur = node;
        if let Some(parent) = self.graph.closure_parent(cur) {
            cur = parent;
            while let Some(next) = self.graph.closure_parent(cur) {
                let pos = self.graph.func(cur).pos.clone();
                path.push(PathNode {
                    desc: self.node_desc(cur, &pos),
                    func: cur,
                    site: None,
                    recoverable: is_recoverable(self.graph, cur),
                });
                cur = next;
            }
        }
        (cur, path)
    }

    /// Shared append policy. Steps with no concrete call site are dropped
    /// from the rendering unless `simplify` asks for a synthetic descriptor.
    fn append_node(&self, node: FuncId, mut path: Vec<PathNode>, site: Option<EdgeId>) -> Vec<PathNode> {
        let Some(eid) = site else {
            if self.options.simplify && path.last().map(|n| n.func) != Some(node) {
                let f = self.graph.func(node);
                path.push(PathNode {
                    desc: format!("Func: {}.[{}] {}", f.pkg_name, f.name, f.pos),
                    func: node,
                    site: None,
                    recoverable: is_recoverable(self.graph, node),
                });
            }
            return path;
        };
        let desc = if self.options.print_nodes {
            let f = self.graph.func(node);
            format!("n{}:{}.{}", node.0, f.pkg_path, f.name)
        } else {
            self.node_desc(node, &self.graph.edge(eid).site.pos)
        };
        path.push(PathNode {
            desc,
            func: node,
            site: Some(eid),
            recoverable: is_recoverable(self.graph, node),
        });
        path
    }

    fn node_desc(&self, node: FuncId, pos: &Position) -> String {
        let f = self.graph.func(node);
        if is_recoverable(self.graph, node) {
            format!("{}.[{}] (recoverable) {}", f.pkg_name, f.name, pos)
        } else {
            format!("{}.[{}] {}", f.pkg_name, f.name, pos)
        }
    }
}
