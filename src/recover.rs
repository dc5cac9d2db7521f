//! Decides whether a panic raised inside a function would be caught by a
//! deferred `recover()`, either in the function itself or, for a function
//! literal, in the function it was handed to.

use std::collections::HashSet;

use crate::graph::{CallGraph, FuncId, InstrKind};

pub fn is_recoverable(graph: &CallGraph, id: FuncId) -> bool {
    if defers_recover(graph, id) {
        return true;
    }
    // A closure passed as an argument runs inside its receiver's frame, so a
    // recover deferred there (or in a sibling literal it defines) covers it.
    if graph.is_closure(id)
        && let Some(owner) = closure_argument_of(graph, id)
    {
        if defers_recover(graph, owner) {
            return true;
        }
        for sibling in graph.child_closures(owner) {
            if defers_recover(graph, sibling) {
                return true;
            }
        }
    }
    false
}

/// Scans the function's recover block for a `recover()` call, following
/// deferred and invoked functions transitively.
fn defers_recover(graph: &CallGraph, id: FuncId) -> bool {
    let Some(start) = graph.func(id).recover_block else {
        return false;
    };
    let mut visited: HashSet<(FuncId, usize)> = HashSet::new();
    let mut work = vec![(id, start)];
    while let Some((fid, start)) = work.pop() {
        if !visited.insert((fid, start)) {
            continue;
        }
        let func = graph.func(fid);
        for block in func.blocks.iter().skip(start) {
            for instr in &block.instrs {
                match instr.kind {
                    InstrKind::Defer | InstrKind::Go | InstrKind::Call | InstrKind::MakeClosure => {
                        if instr.callee_name == "recover" {
                            return true;
                        }
                        if let Some(target) = instr.target {
                            work.push((target, 0));
                        }
                    }
                    InstrKind::Other => {}
                }
            }
        }
    }
    false
}

/// The function this closure is passed to as an argument, found by scanning
/// the enclosing function's call sites for one that takes the literal.
fn closure_argument_of(graph: &CallGraph, id: FuncId) -> Option<FuncId> {
    let parent = graph.closure_parent(id)?;
    for (_, edge) in graph.callees(parent) {
        if edge.site.closure_args.contains(&id) {
            return edge.site.static_callee;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Block, CallSite, FuncKind, GraphBuilder, Instr, Position};

    fn block(instrs: Vec<Instr>) -> Block {
        Block { instrs }
    }

    #[test]
    fn direct_deferred_recover() {
        let mut b = GraphBuilder::new();
        let f = b.add_func("handler", "main", "app", Position::unknown(), FuncKind::Named);
        b.set_blocks(
            f,
            vec![block(vec![Instr::new(InstrKind::Defer, None, "recover")])],
            Some(0),
        );
        let g = b.finish();
        assert!(is_recoverable(&g, f));
    }

    #[test]
    fn no_recover_block_means_not_recoverable() {
        let mut b = GraphBuilder::new();
        let f = b.add_func("handler", "main", "app", Position::unknown(), FuncKind::Named);
        b.set_blocks(
            f,
            vec![block(vec![Instr::new(InstrKind::Call, None, "recover")])],
            None,
        );
        let g = b.finish();
        assert!(!is_recoverable(&g, f));
    }

    #[test]
    fn recover_through_deferred_helper() {
        let mut b = GraphBuilder::new();
        let helper = b.add_func("guard", "main", "app", Position::unknown(), FuncKind::Named);
        let f = b.add_func("handler", "main", "app", Position::unknown(), FuncKind::Named);
        b.set_blocks(
            helper,
            vec![block(vec![Instr::new(InstrKind::Call, None, "recover")])],
            None,
        );
        b.set_blocks(
            f,
            vec![block(vec![Instr::new(InstrKind::Defer, Some(helper), "guard")])],
            Some(0),
        );
        let g = b.finish();
        assert!(is_recoverable(&g, f));
    }

    #[test]
    fn cycle_in_deferred_helpers_terminates() {
        let mut b = GraphBuilder::new();
        let a = b.add_func("a", "main", "app", Position::unknown(), FuncKind::Named);
        let c = b.add_func("c", "main", "app", Position::unknown(), FuncKind::Named);
        b.set_blocks(a, vec![block(vec![Instr::new(InstrKind::Call, Some(c), "c")])], Some(0));
        b.set_blocks(c, vec![block(vec![Instr::new(InstrKind::Call, Some(a), "a")])], Some(0));
        let g = b.finish();
        assert!(!is_recoverable(&g, a));
    }

    #[test]
    fn closure_covered_by_receiving_function() {
        let mut b = GraphBuilder::new();
        let safego = b.add_func("SafeGo", "runtimeutil", "app/runtimeutil", Position::unknown(), FuncKind::Named);
        let parent = b.add_func("serve", "main", "app", Position::unknown(), FuncKind::Named);
        let cl = b.add_func("serve$1", "main", "app", Position::unknown(), FuncKind::Closure { parent });
        b.set_blocks(
            safego,
            vec![block(vec![Instr::new(InstrKind::Defer, None, "recover")])],
            Some(0),
        );
        let mut site = CallSite::new(Position::unknown(), "SafeGo");
        site.static_callee = Some(safego);
        site.closure_args.push(cl);
        b.add_edge(parent, safego, site);
        let g = b.finish();
        assert!(is_recoverable(&g, cl));
        // The parent itself defers nothing.
        assert!(!is_recoverable(&g, parent));
    }

    #[test]
    fn closure_covered_by_sibling_literal_in_receiver() {
        let mut b = GraphBuilder::new();
        let wrap = b.add_func("Wrap", "guard", "app/guard", Position::unknown(), FuncKind::Named);
        let wrap_cl = b.add_func("Wrap$1", "guard", "app/guard", Position::unknown(), FuncKind::Closure { parent: wrap });
        let parent = b.add_func("serve", "main", "app", Position::unknown(), FuncKind::Named);
        let cl = b.add_func("serve$1", "main", "app", Position::unknown(), FuncKind::Closure { parent });
        b.set_blocks(
            wrap_cl,
            vec![block(vec![Instr::new(InstrKind::Defer, None, "recover")])],
            Some(0),
        );
        let mut site = CallSite::new(Position::unknown(), "Wrap");
        site.static_callee = Some(wrap);
        site.closure_args.push(cl);
        b.add_edge(parent, wrap, site);
        let g = b.finish();
        assert!(is_recoverable(&g, cl));
    }

    #[test]
    fn one_recovering_sibling_among_three_covers_the_closure() {
        let mut b = GraphBuilder::new();
        let wrap = b.add_func("Wrap", "guard", "app/guard", Position::unknown(), FuncKind::Named);
        let s1 = b.add_func("Wrap$1", "guard", "app/guard", Position::unknown(), FuncKind::Closure { parent: wrap });
        let s2 = b.add_func("Wrap$2", "guard", "app/guard", Position::unknown(), FuncKind::Closure { parent: wrap });
        let s3 = b.add_func("Wrap$3", "guard", "app/guard", Position::unknown(), FuncKind::Closure { parent: wrap });
        let parent = b.add_func("serve", "main", "app", Position::unknown(), FuncKind::Named);
        let cl = b.add_func("serve$1", "main", "app", Position::unknown(), FuncKind::Closure { parent });
        b.set_blocks(s1, vec![block(vec![Instr::new(InstrKind::Call, None, "log")])], Some(0));
        b.set_blocks(
            s2,
            vec![block(vec![Instr::new(InstrKind::Defer, None, "recover")])],
            Some(0),
        );
        b.set_blocks(s3, vec![block(vec![])], None);
        let mut site = CallSite::new(Position::unknown(), "Wrap");
        site.static_callee = Some(wrap);
        site.closure_args.push(cl);
        b.add_edge(parent, wrap, site);
        let g = b.finish();
        assert!(is_recoverable(&g, cl));
        assert!(!is_recoverable(&g, s1));
        assert!(!is_recoverable(&g, s3));
        assert!(!is_recoverable(&g, parent));
    }
}
