use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use routemap::cli::{self, MapArgs, OutputArgs, ScanArgs};
use routemap::config::build_indicators;
use routemap::indicator::Indicator;
use routemap::mapper::{CallMapper, Options};
use routemap::model::RouteMatch;
use routemap::reporter::write_report;
use routemap::scanner::{ScanResult, Scanner};

fn main() -> Result<()> {
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Match { scan, output } => {
            let result = run_scan(&scan)?;
            report(&output, &result.matches)
        }
        cli::Command::Map { scan, output, map } => {
            let mut result = run_scan(&scan)?;
            map_matches(&mut result, &map_options(&map));
            report(&output, &result.matches)
        }
        cli::Command::Search {
            path,
            pkg,
            function,
            recv_type,
            match_filter,
            output,
            map,
        } => {
            let indicator = Indicator {
                id: "1".into(),
                package: pkg.clone(),
                function: function.clone(),
                receiver_type: recv_type.unwrap_or_default(),
                match_filter: match_filter.unwrap_or_default(),
                params: Vec::new(),
            };
            let mut result = Scanner::new(vec![indicator]).scan(&path)?;
            if result.matches.is_empty() {
                println!("No matches found for func {function} in package {pkg}");
                return Ok(());
            }
            map_matches(&mut result, &map_options(&map));
            report(&output, &result.matches)
        }
    }
}

fn run_scan(scan: &ScanArgs) -> Result<ScanResult> {
    let indicators = build_indicators(scan.config.as_deref(), scan.skip_default)?;
    Scanner::new(indicators).scan(&scan.path)
}

fn map_options(map: &MapArgs) -> Options {
    if map.module_only && map.filter.is_some() {
        eprintln!(
            "routemap: Warning: --module-only overrides --filter; the filter is only used when a match's module is unknown"
        );
    }
    Options {
        filter: map.filter.clone().unwrap_or_default(),
        max_funcs: map.max_funcs,
        max_paths: map.max_paths,
        print_nodes: map.print_nodes,
        search_alg: map.search_alg,
        limiter: map.limiter_mode,
        skip_closures: map.skip_closures,
        module_only: map.module_only,
        simplify: map.simplify,
    }
}

fn map_matches(result: &mut ScanResult, options: &Options) {
    for m in &mut result.matches {
        let Some(start) = m.enclosed_by else {
            eprintln!(
                "routemap: Warning: no enclosing function for match {} at {}, skipping path search",
                m.match_id, m.pos
            );
            continue;
        };
        let mapper = CallMapper::new(&result.graph, m, options.clone());
        m.call_paths = mapper.all_paths(start, m);
    }
}

fn report(output: &OutputArgs, matches: &[RouteMatch]) -> Result<()> {
    match &output.output {
        Some(path) => {
            let mut file = write_target(path)?;
            write_report(&mut file, matches, output.format)
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_report(&mut lock, matches, output.format)?;
            lock.flush()?;
            Ok(())
        }
    }
}

fn write_target(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("failed to create output file {}", path.display()))
}
