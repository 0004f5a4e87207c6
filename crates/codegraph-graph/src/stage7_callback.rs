// ABOUTME: Stage 7 — Callback Registration (spec §4.9): virtual edges for functions handed
// ABOUTME: to known registration APIs (event handlers, route actions, middleware).
use crate::state::AnalysisState;
use codegraph_core::{AnalysisStage, CallContext, CallEdge, CallType, FunctionId, ResolutionLevel, Result};
use codegraph_parser::project::descendants_of_kind;
use tree_sitter::Node;

pub struct CallbackRegistrationStage;

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_emitted: usize,
}

/// (method name, argument position carrying the callback, pattern-specificity confidence).
/// A receiver-pattern registry, same shape as the spec's "maintained as configuration".
const REGISTRATION_PATTERNS: &[(&str, usize, f64)] = &[
    ("addEventListener", 1, 0.85),
    ("action", 0, 0.9),
    ("subscribe", 0, 0.8),
    ("use", 0, 0.75),
    ("get", 1, 0.8),
    ("post", 1, 0.8),
    ("put", 1, 0.8),
    ("delete", 1, 0.8),
    ("on", 1, 0.75),
];

impl AnalysisStage<AnalysisState> for CallbackRegistrationStage {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "virtual_callback"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let mut emitted = Vec::new();

        for file in state.project.files() {
            for call_node in descendants_of_kind(file.tree.root_node(), "call_expression") {
                let Some(callee) = call_node.child_by_field_name("function") else { continue };
                if callee.kind() != "member_expression" {
                    continue;
                }
                let Some(method_node) = callee.child_by_field_name("property") else { continue };
                let Ok(method_name) = method_node.utf8_text(file.source.as_bytes()) else { continue };
                let Some(&(_, arg_index, confidence)) =
                    REGISTRATION_PATTERNS.iter().find(|(name, ..)| *name == method_name)
                else {
                    continue;
                };

                let Some(arguments) = call_node.child_by_field_name("arguments") else { continue };
                let Some(arg_node) = nth_named_argument(arguments, arg_index) else { continue };

                let (call_line, call_col) = file.line_index.line_column(call_node.start_byte());
                let Some(caller) = state.registry.function_at_line(&file.path, call_line) else { continue };

                let callback = match arg_node.kind() {
                    "identifier" => {
                        let Ok(name) = arg_node.utf8_text(file.source.as_bytes()) else { continue };
                        resolve_callback_identifier(state, &file.path, name)
                    }
                    "arrow_function" | "function_expression" => {
                        let (line, _) = file.line_index.line_column(arg_node.start_byte());
                        state.registry.function_at_line(&file.path, line)
                    }
                    _ => None,
                };

                let Some(callback_id) = callback else { continue };
                let edge = build_callback_edge(state, caller, callback_id, call_line, call_col, confidence);
                emitted.push(edge);
            }
        }

        let count = emitted.len();
        state.edges.extend(emitted);
        Ok(StageReport { edges_emitted: count })
    }
}

fn nth_named_argument(arguments: Node, index: usize) -> Option<Node> {
    let mut cursor = arguments.walk();
    let mut seen = 0usize;
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.is_named() {
                if seen == index {
                    return Some(child);
                }
                seen += 1;
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    None
}

fn resolve_callback_identifier(state: &AnalysisState, file_path: &str, name: &str) -> Option<FunctionId> {
    state
        .registry
        .functions_in_file(file_path)
        .iter()
        .find(|id| state.registry.get(**id).map(|f| f.name == name).unwrap_or(false))
        .copied()
        .or_else(|| {
            state
                .registry
                .by_qualified_name(name)
                .first()
                .copied()
        })
}

fn build_callback_edge(
    state: &AnalysisState,
    caller: FunctionId,
    callback: FunctionId,
    line: u32,
    column: u32,
    confidence: f64,
) -> CallEdge {
    let callee_name = state
        .registry
        .get(callback)
        .map(|f| f.name.clone())
        .unwrap_or_default();
    let id = CallEdge::compute_id(caller, Some(callback), &callee_name, &state.snapshot_salt, line, column);
    CallEdge {
        id,
        caller,
        callee: Some(callback),
        callee_name,
        line,
        column,
        call_type: CallType::Virtual,
        call_context: CallContext::Callback,
        is_async: false,
        is_chained: false,
        resolution_level: ResolutionLevel::VirtualCallback,
        confidence,
        candidates: vec![],
        runtime_confirmed: false,
        external_namespace: None,
        external_property: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_registration_emits_virtual_edge_to_named_handler() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "function handler() { return 1; }\n\
             function wireUp(program) { program.command(\"x\").action(handler); }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        let report = CallbackRegistrationStage.run(&mut state).unwrap();

        assert_eq!(report.edges_emitted, 1);
        let edge = &state.edges[0];
        assert_eq!(edge.resolution_level, ResolutionLevel::VirtualCallback);
        assert_eq!(edge.call_context, CallContext::Callback);
        assert_eq!(edge.callee_name, "handler");
    }

    #[test]
    fn inline_arrow_callback_resolves_to_its_own_registered_function() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "function wireUp(el) { el.addEventListener(\"click\", (e) => { return e; }); }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        let report = CallbackRegistrationStage.run(&mut state).unwrap();
        assert_eq!(report.edges_emitted, 1);
    }
}
