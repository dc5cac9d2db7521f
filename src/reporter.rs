//! Renders mapped matches as console text, JSON, CSV edge lists or
//! Graphviz DOT.

use std::collections::HashSet;
use std::io::Write;
use std::str::FromStr;

use anyhow::{Result, bail};

use crate::model::RouteMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Json,
    Csv,
    Dot,
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "dot" => Ok(Format::Dot),
            other => bail!("unknown output format {other:?}, expected text, json, csv or dot"),
        }
    }
}

pub fn write_report(out: &mut dyn Write, matches: &[RouteMatch], format: Format) -> Result<()> {
    match format {
        Format::Text => write_text(out, matches),
        Format::Json => write_json(out, matches),
        Format::Csv => write_csv(out, matches),
        Format::Dot => write_dot(out, matches),
    }
}

fn write_text(out: &mut dyn Write, matches: &[RouteMatch]) -> Result<()> {
    for m in matches {
        writeln!(out, "===========MATCH===============")?;
        writeln!(out, "Package: {}", m.indicator.package)?;
        writeln!(out, "Function: {}", m.indicator.function)?;
        writeln!(out, "Params:")?;
        for (k, v) in &m.params {
            writeln!(out, "\t{k}: {v}")?;
        }
        writeln!(out, "Enclosed by: {}", m.enclosed_desc)?;
        writeln!(out, "Position {}", m.pos)?;
        if !m.call_paths.is_empty() {
            writeln!(out, "Possible Paths: {}", m.call_paths.len())?;
            for (i, path) in m.call_paths.paths.iter().enumerate() {
                writeln!(out, "\tPath {}:", i + 1)?;
                // Root first, so each line leads into the one below it.
                for desc in path.nodes.iter().rev().map(|n| n.desc.as_str()) {
                    writeln!(out, "\t\t{desc} --->")?;
                }
                if path.filter_limited {
                    writeln!(out, "\t\t(filter limited)")?;
                }
                if path.node_limited {
                    writeln!(out, "\t\t(node limited)")?;
                }
            }
            if m.call_paths.path_limited {
                writeln!(out, "Path limit reached, results are partial")?;
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "Total Results: {}", matches.len())?;
    Ok(())
}

fn write_json(out: &mut dyn Write, matches: &[RouteMatch]) -> Result<()> {
    let reports: Vec<_> = matches.iter().map(RouteMatch::report).collect();
    serde_json::to_writer_pretty(&mut *out, &reports)?;
    writeln!(out)?;
    Ok(())
}

/// One row per path edge. Descriptors contain no commas or quotes, so no
/// escaping is needed.
fn write_csv(out: &mut dyn Write, matches: &[RouteMatch]) -> Result<()> {
    writeln!(out, "match_id,indicator,source,target")?;
    for m in matches {
        let indicator = format!("{}.{}", m.indicator.package, m.indicator.function);
        for path in &m.call_paths.paths {
            let descs: Vec<&str> = path.nodes.iter().rev().map(|n| n.desc.as_str()).collect();
            for pair in descs.windows(2) {
                writeln!(out, "{},{},{},{}", m.match_id, indicator, pair[0], pair[1])?;
            }
        }
    }
    Ok(())
}

fn write_dot(out: &mut dyn Write, matches: &[RouteMatch]) -> Result<()> {
    writeln!(out, "digraph routemap {{")?;
    writeln!(out, "\trankdir=LR;")?;
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for m in matches {
        let target = &m.call_paths.target;
        for path in &m.call_paths.paths {
            let descs: Vec<&str> = path.nodes.iter().rev().map(|n| n.desc.as_str()).collect();
            for pair in descs.windows(2) {
                emit_dot_edge(out, &mut seen, pair[0], pair[1])?;
            }
            if let Some(last) = descs.last() {
                emit_dot_edge(out, &mut seen, last, target)?;
            }
        }
    }
    writeln!(out, "}}")?;
    Ok(())
}

fn emit_dot_edge(
    out: &mut dyn Write,
    seen: &mut HashSet<(String, String)>,
    from: &str,
    to: &str,
) -> Result<()> {
    if seen.insert((from.to_string(), to.to_string())) {
        writeln!(out, "\t\"{}\" -> \"{}\";", escape_dot(from), escape_dot(to))?;
    }
    Ok(())
}

fn escape_dot(s: &str) -> String {
    s.replace('"', "\\\"")
}
