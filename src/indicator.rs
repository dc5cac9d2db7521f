use serde::{Deserialize, Serialize};

/// A declarative pattern identifying interesting calls, typically route
/// registrations. Loaded from the stock table or from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(default)]
    pub id: String,
    /// Import path of the defining package, or "*" to match any package.
    pub package: String,
    pub function: String,
    /// Receiver type name without package, for method indicators.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver_type: String,
    /// Package-prefix filter applied to the call site's package.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub match_filter: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<RouteParam>,
}

/// Parameter of interest on an indicator call, addressed by name (resolved
/// against the callee signature) or by position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteParam {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pos: usize,
}

impl RouteParam {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pos: 0,
        }
    }
}

/// A call site identity produced by the symbol resolver, ready for
/// indicator matching.
#[derive(Debug, Clone)]
pub struct FuncInfo {
    /// Import path of the package defining the callee.
    pub pkg_path: String,
    pub name: String,
    pub signature: Option<Signature>,
}

/// Best-effort callee signature: parameter names in declaration order and,
/// for methods, the receiver type rendered as `pkg.Type`.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<String>,
    pub receiver: Option<String>,
}

impl Signature {
    /// Positional index of a named parameter.
    pub fn param_pos(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }
}

impl FuncInfo {
    /// Returns the last indicator matching this call site. Later indicators
    /// deliberately override earlier ones, so custom indicators loaded after
    /// the stock set win when both match the same site.
    pub fn match_indicator<'a>(&self, indicators: &'a [Indicator]) -> Option<&'a Indicator> {
        let mut matched = None;
        for ind in indicators {
            if self.pkg_path != ind.package && ind.package != "*" {
                continue;
            }
            if self.name != ind.function {
                continue;
            }
            if !ind.receiver_type.is_empty() && !self.matches_receiver(&ind.package, &ind.receiver_type) {
                continue;
            }
            if !ind.match_filter.is_empty() && !self.pkg_path.starts_with(&ind.match_filter) {
                continue;
            }
            matched = Some(ind);
        }
        matched
    }

    fn matches_receiver(&self, pkg: &str, recv_type: &str) -> bool {
        let Some(sig) = &self.signature else {
            return false;
        };
        let Some(recv) = &sig.receiver else {
            return false;
        };
        let want = format!("{pkg}.{recv_type}");
        *recv == want || *recv == format!("*{want}")
    }
}

/// Stock indicators covering the common Go HTTP/RPC frameworks.
pub fn stock_indicators() -> Vec<Indicator> {
    let verbs = ["Handle", "HandleFunc"];
    let mut out = Vec::new();
    for f in verbs {
        out.push(Indicator {
            id: String::new(),
            package: "net/http".to_string(),
            function: f.to_string(),
            receiver_type: String::new(),
            match_filter: String::new(),
            params: vec![RouteParam::named("pattern")],
        });
    }
    out.push(method_indicator("github.com/gorilla/mux", "Handle", "Router", "path"));
    out.push(method_indicator("github.com/gorilla/mux", "HandleFunc", "Router", "path"));
    for f in ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "Any"] {
        out.push(method_indicator("github.com/gin-gonic/gin", f, "Engine", "relativePath"));
        out.push(method_indicator("github.com/gin-gonic/gin", f, "RouterGroup", "relativePath"));
        out.push(method_indicator("github.com/labstack/echo/v4", f, "Echo", "path"));
    }
    for f in ["Get", "Post", "Put", "Patch", "Delete", "Head", "Options", "Handle", "HandleFunc"] {
        out.push(method_indicator("github.com/go-chi/chi/v5", f, "Mux", "pattern"));
    }
    out.push(Indicator {
        id: String::new(),
        package: "google.golang.org/grpc".to_string(),
        function: "Invoke".to_string(),
        receiver_type: String::new(),
        match_filter: String::new(),
        params: vec![RouteParam::named("method")],
    });
    for (i, ind) in out.iter_mut().enumerate() {
        ind.id = (i + 1).to_string();
    }
    out
}

fn method_indicator(package: &str, function: &str, receiver: &str, param: &str) -> Indicator {
    Indicator {
        id: String::new(),
        package: package.to_string(),
        function: function.to_string(),
        receiver_type: receiver.to_string(),
        match_filter: String::new(),
        params: vec![RouteParam::named(param)],
    }
}

/// Parameter names for well-known functions in packages outside the scanned
/// repo. Name-based parameter lookup needs these because external packages
/// are never parsed.
pub fn known_signature(pkg_path: &str, function: &str) -> Option<Signature> {
    let params: &[&str] = match (pkg_path, function) {
        ("net/http", "Handle") | ("net/http", "HandleFunc") => &["pattern", "handler"],
        ("github.com/gorilla/mux", "Handle") | ("github.com/gorilla/mux", "HandleFunc") => {
            &["path", "handler"]
        }
        ("github.com/gin-gonic/gin", _) => &["relativePath", "handlers"],
        ("github.com/labstack/echo/v4", _) => &["path", "h"],
        ("github.com/go-chi/chi/v5", _) => &["pattern", "handler"],
        ("google.golang.org/grpc", "Invoke") => &["ctx", "method", "args", "reply"],
        _ => return None,
    };
    Some(Signature {
        params: params.iter().map(|p| p.to_string()).collect(),
        receiver: None,
    })
}
