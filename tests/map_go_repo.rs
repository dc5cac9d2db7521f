use std::fs;

use routemap::indicator::stock_indicators;
use routemap::mapper::{CallMapper, LimiterMode, Options, SearchAlgorithm};
use routemap::model::RouteMatch;
use routemap::reporter::{Format, write_report};
use routemap::scanner::{ScanResult, Scanner};

fn write_repo(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    dir
}

fn scan(files: &[(&str, &str)]) -> ScanResult {
    let dir = write_repo(files);
    Scanner::new(stock_indicators()).scan(dir.path()).unwrap()
}

fn map_all(result: &mut ScanResult, options: &Options) {
    for m in &mut result.matches {
        let start = m.enclosed_by.unwrap();
        let mapper = CallMapper::new(&result.graph, m, options.clone());
        m.call_paths = mapper.all_paths(start, m);
    }
}

fn root_first(m: &RouteMatch, path: usize) -> Vec<String> {
    m.call_paths.paths[path]
        .nodes
        .iter()
        .rev()
        .map(|n| n.desc.clone())
        .collect()
}

const APP: &[(&str, &str)] = &[
    ("go.mod", "module example.com/app\n\ngo 1.22\n"),
    (
        "main.go",
        r#"package main

import "example.com/app/internal/api"

func main() {
	run()
}

func run() {
	defer func() {
		if r := recover(); r != nil {
			return
		}
	}()
	api.Register()
}
"#,
    ),
    (
        "internal/api/routes.go",
        r#"package api

import "net/http"

func Register() {
	http.HandleFunc("/users", usersHandler)
	http.HandleFunc("/orders", ordersHandler)
}

func usersHandler(w http.ResponseWriter, r *http.Request) {}

func ordersHandler(w http.ResponseWriter, r *http.Request) {}
"#,
    ),
];

#[test]
fn maps_routes_back_to_main() {
    let mut result = scan(APP);
    assert_eq!(result.matches.len(), 2);

    map_all(&mut result, &Options::default());

    for m in &result.matches {
        assert_eq!(m.call_paths.len(), 1, "match {}", m.match_id);
        let nodes = root_first(m, 0);
        assert_eq!(nodes.len(), 3);
        assert!(nodes[0].starts_with("main.[main]"), "got {:?}", nodes[0]);
        assert!(nodes[1].starts_with("main.[run]"), "got {:?}", nodes[1]);
        assert!(nodes[2].starts_with("api.[Register]"), "got {:?}", nodes[2]);
    }

    let patterns: Vec<&str> = result
        .matches
        .iter()
        .map(|m| m.params.get("pattern").unwrap().as_str())
        .collect();
    assert_eq!(patterns, ["\"/users\"", "\"/orders\""]);
}

#[test]
fn recover_in_a_caller_marks_the_step_recoverable() {
    let mut result = scan(APP);
    map_all(&mut result, &Options::default());

    let nodes = root_first(&result.matches[0], 0);
    assert!(
        nodes[1].contains("(recoverable)"),
        "run defers a recovering closure, got {:?}",
        nodes[1]
    );
    assert!(!nodes[0].contains("(recoverable)"));
    assert!(result.matches[0].call_paths.paths[0].nodes.iter().any(|n| n.recoverable));
}

#[test]
fn dfs_and_bfs_agree_on_this_repo() {
    let mut bfs = scan(APP);
    map_all(
        &mut bfs,
        &Options {
            search_alg: SearchAlgorithm::Bfs,
            ..Options::default()
        },
    );
    let mut dfs = scan(APP);
    map_all(
        &mut dfs,
        &Options {
            search_alg: SearchAlgorithm::Dfs,
            ..Options::default()
        },
    );

    for (a, b) in bfs.matches.iter().zip(&dfs.matches) {
        let a_paths: Vec<Vec<String>> = (0..a.call_paths.len()).map(|i| root_first(a, i)).collect();
        let b_paths: Vec<Vec<String>> = (0..b.call_paths.len()).map(|i| root_first(b, i)).collect();
        assert_eq!(a_paths, b_paths);
    }
}

#[test]
fn module_only_limits_paths_to_the_scanned_module() {
    let mut result = scan(&[
        ("go.mod", "module example.com/app\n"),
        (
            "main.go",
            r#"package main

import "example.com/app/api"

func main() {
	api.Register()
}
"#,
        ),
        (
            "api/routes.go",
            r#"package api

import "net/http"

func Register() {
	http.Handle("/health", nil)
}
"#,
        ),
    ]);
    map_all(
        &mut result,
        &Options {
            module_only: true,
            ..Options::default()
        },
    );

    let m = &result.matches[0];
    assert_eq!(m.call_paths.len(), 1);
    let nodes = root_first(m, 0);
    assert!(nodes[0].starts_with("main.[main]"));
    assert!(!m.call_paths.paths[0].filter_limited);
}

#[test]
fn max_paths_caps_fanned_out_registrations() {
    let mut result = scan(&[
        ("go.mod", "module example.com/app\n"),
        (
            "main.go",
            r#"package main

import "example.com/app/api"

func main() {
	a()
	b()
	c()
}

func a() { api.Register() }

func b() { api.Register() }

func c() { api.Register() }
"#,
        ),
        (
            "api/routes.go",
            r#"package api

import "net/http"

func Register() {
	http.HandleFunc("/x", nil)
}
"#,
        ),
    ]);
    map_all(
        &mut result,
        &Options {
            max_paths: 2,
            ..Options::default()
        },
    );

    let m = &result.matches[0];
    assert!(m.call_paths.len() <= 2);
    assert!(m.call_paths.path_limited);
}

#[test]
fn handler_closures_flatten_under_skip_closures() {
    let files: &[(&str, &str)] = &[
        ("go.mod", "module example.com/app\n"),
        (
            "main.go",
            r#"package main

import "net/http"

func main() {
	setup()
}

func setup() {
	register(func() {
		http.HandleFunc("/inline", nil)
	})
}

func register(f func()) {
	f()
}
"#,
        ),
    ];

    let mut result = scan(files);
    assert_eq!(result.matches.len(), 1);
    let m_enclosed = result.matches[0].enclosed_desc.clone();
    assert!(m_enclosed.starts_with("main.[setup$1]"), "got {m_enclosed}");

    map_all(
        &mut result,
        &Options {
            skip_closures: true,
            ..Options::default()
        },
    );
    // The seed step keeps the literal's own name; everything above it runs
    // on the named ancestor's callers.
    let m = &result.matches[0];
    assert_eq!(m.call_paths.len(), 1);
    let nodes = root_first(m, 0);
    assert!(nodes[0].starts_with("main.[main]"), "got {:?}", nodes[0]);
    for node in &nodes[..nodes.len() - 1] {
        assert!(!node.contains('$'), "closure survived flattening: {node:?}");
    }
}

#[test]
fn reports_render_for_a_mapped_repo() {
    let mut result = scan(APP);
    map_all(&mut result, &Options::default());

    let mut json = Vec::new();
    write_report(&mut json, &result.matches, Format::Json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
    assert_eq!(value[0]["module"], "example.com/app");
    assert_eq!(
        value[0]["paths"][0]["nodes"].as_array().unwrap().len(),
        3
    );

    let mut text = Vec::new();
    write_report(&mut text, &result.matches, Format::Text).unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("Total Results: 2"));
    assert!(text.contains("Possible Paths: 1"));

    let mut dot = Vec::new();
    write_report(&mut dot, &result.matches, Format::Dot).unwrap();
    let dot = String::from_utf8(dot).unwrap();
    assert!(dot.contains("digraph routemap {"));
    assert!(dot.contains("main.[main]"));
}

#[test]
fn limiter_modes_order_from_permissive_to_strict() {
    assert!(LimiterMode::None < LimiterMode::Normal);
    assert!(LimiterMode::Strict < LimiterMode::VeryStrict);
    let parsed: LimiterMode = "very-strict".parse().unwrap();
    assert_eq!(parsed, LimiterMode::VeryStrict);
}
