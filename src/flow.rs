//! Coarse per-function control-flow construction.
//!
//! The graph built here is intentionally approximate: one node per
//! top-level statement, with nested block structure summarized into the
//! parent construct's single node. Non-terminal nodes fall through to the
//! next node's id regardless of branch semantics. This trades exact flow
//! edges for cheap, robust complexity metrics; it is not a bug to correct.

use crate::model::{
    CfgNode, CfgNodeKind, CfgResult, FlowFacts, FlowKind, FunctionFlow,
};

/// Builds the coarse control-flow representation for one function.
pub struct ControlFlowBuilder;

impl ControlFlowBuilder {
    /// Build the CFG and complexity metrics for one callable.
    pub fn build(flow: &FunctionFlow) -> CfgResult {
        let facts = &flow.facts;
        let mut nodes = Vec::with_capacity(facts.statements.len() + 2);

        // Synthetic entry. Isolated when the body is empty.
        let mut entry = CfgNode {
            id: 0,
            kind: CfgNodeKind::Entry,
            summary: format!("Entry: {}", flow.function_name),
            line: flow.start_line,
            successors: Vec::new(),
            predecessors: Vec::new(),
        };
        if !facts.statements.is_empty() {
            entry.successors.push(1);
        }
        nodes.push(entry);

        for (i, stmt) in facts.statements.iter().enumerate() {
            let id = i + 1;
            let kind = match stmt.kind {
                FlowKind::If => CfgNodeKind::If,
                FlowKind::For => CfgNodeKind::For,
                FlowKind::Range => CfgNodeKind::Range,
                FlowKind::Switch => CfgNodeKind::Switch,
                FlowKind::Return => CfgNodeKind::Return,
                FlowKind::Statement => CfgNodeKind::Statement,
            };

            // Sequential fallthrough to the next node (the exit for the
            // last statement); returns are terminal.
            let successors = if kind == CfgNodeKind::Return {
                Vec::new()
            } else {
                vec![id + 1]
            };

            // A node is preceded by its sequential neighbor only when that
            // neighbor actually flows into it.
            let prev_flows_in = match nodes.last() {
                Some(prev) => prev.successors.contains(&id),
                None => false,
            };
            let predecessors = if prev_flows_in { vec![id - 1] } else { Vec::new() };

            nodes.push(CfgNode {
                id,
                kind,
                summary: stmt.summary.clone(),
                line: stmt.line,
                successors,
                predecessors,
            });
        }

        // Synthetic exit after the last statement of a non-empty body. A
        // trailing return keeps its no-successor invariant, leaving the
        // exit unlinked.
        if !facts.statements.is_empty() {
            let id = nodes.len();
            let prev_flows_in = nodes
                .last()
                .map(|prev| prev.successors.contains(&id))
                .unwrap_or(false);
            nodes.push(CfgNode {
                id,
                kind: CfgNodeKind::Exit,
                summary: format!("Exit: {}", flow.function_name),
                line: facts.body_end_line,
                successors: Vec::new(),
                predecessors: if prev_flows_in { vec![id - 1] } else { Vec::new() },
            });
        }

        let unreachable_blocks = find_unreachable(&nodes);

        CfgResult {
            function_id: flow.function_id.clone(),
            function_name: flow.function_name.clone(),
            edge_count: nodes.len() + facts.branch_estimate as usize,
            cyclomatic_complexity: facts.cyclomatic_complexity(),
            unreachable_blocks,
            nodes,
        }
    }

    /// Complexity without building nodes, for callers that only need the
    /// metric.
    pub fn complexity(facts: &FlowFacts) -> u32 {
        facts.cyclomatic_complexity()
    }
}

/// Best-effort unreachable detection: BFS from entry over recorded
/// successor edges. Synthetic entry/exit nodes are never reported.
fn find_unreachable(nodes: &[CfgNode]) -> Vec<usize> {
    let mut reached = vec![false; nodes.len()];
    let mut queue = std::collections::VecDeque::new();
    reached[0] = true;
    queue.push_back(0usize);

    while let Some(id) = queue.pop_front() {
        for &succ in &nodes[id].successors {
            if succ < nodes.len() && !reached[succ] {
                reached[succ] = true;
                queue.push_back(succ);
            }
        }
    }

    nodes
        .iter()
        .filter(|n| !reached[n.id] && !n.kind.is_synthetic())
        .map(|n| n.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlowStatement;

    fn flow_with(statements: Vec<(FlowKind, usize)>, decisions: u32) -> FunctionFlow {
        let branch_estimate = decisions * 2;
        FunctionFlow {
            function_id: "func_1".to_string(),
            function_name: "sample".to_string(),
            start_line: 1,
            facts: FlowFacts {
                statements: statements
                    .into_iter()
                    .map(|(kind, line)| FlowStatement {
                        kind,
                        line,
                        summary: format!("stmt@{}", line),
                    })
                    .collect(),
                decision_points: decisions,
                branch_estimate,
                body_end_line: 20,
            },
        }
    }

    #[test]
    fn test_empty_body_entry_isolated() {
        let result = ControlFlowBuilder::build(&flow_with(vec![], 0));

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].kind, CfgNodeKind::Entry);
        assert!(result.nodes[0].successors.is_empty());
        assert!(result.nodes[0].predecessors.is_empty());
        assert_eq!(result.cyclomatic_complexity, 1);
        assert!(result.unreachable_blocks.is_empty());
    }

    #[test]
    fn test_straight_line_chain() {
        let result = ControlFlowBuilder::build(&flow_with(
            vec![(FlowKind::Statement, 2), (FlowKind::Statement, 3)],
            0,
        ));

        // entry, two statements, exit
        assert_eq!(result.nodes.len(), 4);
        assert_eq!(result.nodes[0].successors, vec![1]);
        assert_eq!(result.nodes[1].successors, vec![2]);
        assert_eq!(result.nodes[2].successors, vec![3]);
        assert_eq!(result.nodes[3].kind, CfgNodeKind::Exit);
        assert!(result.nodes[3].successors.is_empty());
        assert_eq!(result.nodes[3].predecessors, vec![2]);
        assert_eq!(result.cyclomatic_complexity, 1);
    }

    #[test]
    fn test_node_ids_strictly_increasing() {
        let result = ControlFlowBuilder::build(&flow_with(
            vec![
                (FlowKind::If, 2),
                (FlowKind::For, 5),
                (FlowKind::Statement, 8),
            ],
            2,
        ));

        for pair in result.nodes.windows(2) {
            assert!(pair[1].id == pair[0].id + 1);
        }
    }

    #[test]
    fn test_return_is_terminal() {
        let result = ControlFlowBuilder::build(&flow_with(
            vec![(FlowKind::Statement, 2), (FlowKind::Return, 3)],
            0,
        ));

        let ret = &result.nodes[2];
        assert_eq!(ret.kind, CfgNodeKind::Return);
        assert!(ret.successors.is_empty());

        // The exit node exists but nothing links to it.
        let exit = result.nodes.last().unwrap();
        assert_eq!(exit.kind, CfgNodeKind::Exit);
        assert!(exit.predecessors.is_empty());
        // Synthetic exit is not reported unreachable.
        assert!(result.unreachable_blocks.is_empty());
    }

    #[test]
    fn test_statement_after_return_unreachable() {
        let result = ControlFlowBuilder::build(&flow_with(
            vec![(FlowKind::Return, 2), (FlowKind::Statement, 3)],
            0,
        ));

        // Node 2 (the trailing statement) has no inbound path from entry.
        assert_eq!(result.unreachable_blocks, vec![2]);
    }

    #[test]
    fn test_branch_kinds_mapped() {
        let result = ControlFlowBuilder::build(&flow_with(
            vec![
                (FlowKind::If, 2),
                (FlowKind::Range, 3),
                (FlowKind::Switch, 4),
                (FlowKind::For, 5),
            ],
            4,
        ));

        let kinds: Vec<_> = result.nodes.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CfgNodeKind::Entry,
                CfgNodeKind::If,
                CfgNodeKind::Range,
                CfgNodeKind::Switch,
                CfgNodeKind::For,
                CfgNodeKind::Exit,
            ]
        );
        // 6 nodes + 2 per decision construct
        assert_eq!(result.edge_count, 6 + 8);
        assert_eq!(result.cyclomatic_complexity, 5);
    }

    #[test]
    fn test_single_if_complexity_two() {
        let result = ControlFlowBuilder::build(&flow_with(vec![(FlowKind::If, 2)], 1));
        assert_eq!(result.cyclomatic_complexity, 2);
    }

    #[test]
    fn test_if_for_switch_complexity_four() {
        let result = ControlFlowBuilder::build(&flow_with(
            vec![
                (FlowKind::If, 2),
                (FlowKind::For, 3),
                (FlowKind::Switch, 4),
            ],
            3,
        ));
        assert_eq!(result.cyclomatic_complexity, 4);
    }
}
