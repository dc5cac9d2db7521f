use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::{EdgeId, FuncId, Position};
use crate::indicator::Indicator;

/// Placeholder for an argument whose value could not be recovered from
/// the source text.
pub const UNRESOLVED: &str = "<could not resolve>";
/// Placeholder key for a parameter the indicator did not name.
pub const NOT_SPECIFIED: &str = "<not specified>";

/// One step in a call path. Paths are built target-first: index 0 is the
/// function enclosing the matched call, the last node is the entry point
/// the search reached.
#[derive(Debug, Clone)]
pub struct PathNode {
    /// Rendered descriptor, e.g. `pkg.[Name] file.go:10:4 (recoverable)`.
    pub desc: String,
    pub func: FuncId,
    pub site: Option<EdgeId>,
    pub recoverable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CallPath {
    pub nodes: Vec<PathNode>,
    /// The search gave up on this path because the function cap was hit.
    pub node_limited: bool,
    /// Every continuation from the last node fell outside the filter.
    pub filter_limited: bool,
}

impl CallPath {
    pub fn recoverable(&self) -> bool {
        self.nodes.iter().any(|n| n.recoverable)
    }

    fn descs(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.desc.as_str()).collect()
    }
}

/// All paths found for a single match, plus the flags the search raised
/// while collecting them.
#[derive(Debug, Clone, Default)]
pub struct CallPaths {
    pub target: String,
    pub paths: Vec<CallPath>,
    /// The path cap was reached; further paths exist but were not collected.
    pub path_limited: bool,
}

impl CallPaths {
    /// Records a finished path. With `simplify` set, paths that render to
    /// the same node sequence as an already collected path are dropped.
    pub fn insert(&mut self, path: CallPath, simplify: bool) {
        if simplify && self.paths.iter().any(|p| p.descs() == path.descs()) {
            return;
        }
        self.paths.push(path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// A matched indicator call site with its resolved arguments and, after the
/// search runs, the call paths leading to it.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub match_id: String,
    pub indicator: Indicator,
    pub params: BTreeMap<String, String>,
    pub pos: Position,
    pub module: String,
    /// Function whose body contains the matched call.
    pub enclosed_by: Option<FuncId>,
    pub enclosed_desc: String,
    /// Static callee of the matched call, when the graph resolved one.
    pub target_func: Option<FuncId>,
    pub call_paths: CallPaths,
}

impl RouteMatch {
    pub fn report(&self) -> MatchReport {
        MatchReport {
            match_id: self.match_id.clone(),
            indicator_id: self.indicator.id.clone(),
            indicator: format!("{}.{}", self.indicator.package, self.indicator.function),
            params: self.params.clone(),
            enclosed_by: self.enclosed_desc.clone(),
            pos: self.pos.to_string(),
            module: self.module.clone(),
            target: self.call_paths.target.clone(),
            path_limited: self.call_paths.path_limited,
            paths: self.call_paths.paths.iter().map(PathReport::from_path).collect(),
        }
    }
}

/// Serializable view of a match. Paths are rendered root-first so readers
/// follow the program's own call direction.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub match_id: String,
    pub indicator_id: String,
    pub indicator: String,
    pub params: BTreeMap<String, String>,
    pub enclosed_by: String,
    pub pos: String,
    pub module: String,
    pub target: String,
    #[serde(skip_serializing_if = "is_false")]
    pub path_limited: bool,
    pub paths: Vec<PathReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub nodes: Vec<String>,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub node_limited: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub filter_limited: bool,
}

impl PathReport {
    fn from_path(path: &CallPath) -> Self {
        PathReport {
            nodes: path.nodes.iter().rev().map(|n| n.desc.clone()).collect(),
            recoverable: path.recoverable(),
            node_limited: path.node_limited,
            filter_limited: path.filter_limited,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Fills in placeholders for indicator params the resolver came up empty on.
pub fn normalize_params(raw: BTreeMap<String, String>) -> BTreeMap<String, String> {
    raw.into_iter()
        .map(|(k, v)| {
            let k = if k.is_empty() { NOT_SPECIFIED.to_string() } else { k };
            let v = if v.is_empty() { UNRESOLVED.to_string() } else { v };
            (k, v)
        })
        .collect()
}
