use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::mapper::{LimiterMode, SearchAlgorithm};
use crate::reporter::Format;

#[derive(Parser)]
#[command(
    name = "routemap",
    version,
    about = "Maps HTTP/RPC route registrations in Go code back to program entry points",
    after_help = r#"Examples:
  routemap match --path .
  routemap map --path . --filter example.com/app/internal
  routemap map --path . --limiter-mode strict --max-paths 50 --format json
  routemap map --path . --config indicators.yaml --skip-default --format dot --output routes.dot
  routemap search --path . --pkg github.com/gorilla/mux --func HandleFunc --recv-type Router
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List indicator matches without searching for call paths.
    Match {
        #[command(flatten)]
        scan: ScanArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List indicator matches with call paths back to entry points.
    Map {
        #[command(flatten)]
        scan: ScanArgs,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        map: MapArgs,
    },
    /// Map a single ad-hoc function instead of the configured indicators.
    Search {
        /// Root of the Go repository to scan.
        #[arg(long, short, default_value = ".")]
        path: PathBuf,
        /// Import path of the package defining the function.
        #[arg(long)]
        pkg: String,
        /// Function name.
        #[arg(long = "func")]
        function: String,
        /// Receiver type name without package, for methods.
        #[arg(long)]
        recv_type: Option<String>,
        /// Package prefix the call site must live under.
        #[arg(long)]
        match_filter: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        map: MapArgs,
    },
}

#[derive(ClapArgs)]
pub struct MapArgs {
    /// Only follow callers whose package path starts with this prefix.
    #[arg(long)]
    pub filter: Option<String>,
    /// Derive the filter from each match's own module root.
    #[arg(long)]
    pub module_only: bool,
    /// Stop extending a path once it holds this many nodes (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    pub max_funcs: usize,
    /// Stop collecting after this many paths per match (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    pub max_paths: usize,
    /// Search algorithm: bfs|dfs.
    #[arg(long, default_value = "bfs")]
    pub search_alg: SearchAlgorithm,
    /// How aggressively to prune callers: none|normal|high|strict|very-strict.
    #[arg(long, default_value = "normal")]
    pub limiter_mode: LimiterMode,
    /// Collapse closures into their enclosing named functions.
    #[arg(long)]
    pub skip_closures: bool,
    /// Print graph node ids instead of position descriptors.
    #[arg(long)]
    pub print_nodes: bool,
    /// Drop paths that render to an already printed node sequence.
    #[arg(long)]
    pub simplify: bool,
}

#[derive(ClapArgs)]
pub struct ScanArgs {
    /// Root of the Go repository to scan.
    #[arg(long, short, default_value = ".")]
    pub path: PathBuf,
    /// YAML file with custom indicators.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Leave out the built-in indicators.
    #[arg(long)]
    pub skip_default: bool,
}

#[derive(ClapArgs)]
pub struct OutputArgs {
    /// Output format: text|json|csv|dot.
    #[arg(long, default_value = "text")]
    pub format: Format,
    /// Write the report to a file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}
