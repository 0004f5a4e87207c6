// ABOUTME: Stage 1 — Local-Exact (spec §4.3): same-file identifier/this-property/new
// ABOUTME: resolution. Self-recursion is emitted as an ordinary edge (policy, see DESIGN.md).
use crate::callsites::collect_call_sites;
use crate::state::AnalysisState;
use codegraph_core::{
    AnalysisStage, CallEdge, CallTarget, CallType, FunctionId, MemberKind, ResolutionLevel, Result,
};

pub struct LocalExactStage;

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_emitted: usize,
    pub forwarded: usize,
}

const THIS_LIKE: &[&str] = &["this", "self"];

impl AnalysisStage<AnalysisState> for LocalExactStage {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "local_exact"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let residue = collect_call_sites(&state.project, &state.registry);
        let mut remaining = Vec::new();
        let mut emitted = 0usize;

        for call in residue {
            let resolved = match call.target.unwrap_await() {
                CallTarget::LocalIdentifier(name) => resolve_identifier(state, call.caller, name),
                CallTarget::PropertyAccess { receiver, name } if THIS_LIKE.contains(&receiver.as_str()) => {
                    resolve_this_member(state, call.caller, name)
                }
                CallTarget::New(type_name) => resolve_local_constructor(state, call.caller, type_name),
                _ => None,
            };

            match resolved {
                Some(callee) => {
                    let call_type = match call.target.unwrap_await() {
                        CallTarget::New(_) => CallType::Constructor,
                        CallTarget::PropertyAccess { .. } => CallType::Method,
                        _ => CallType::Direct,
                    };
                    let edge = build_edge(state, &call, callee, call_type, ResolutionLevel::LocalExact, 1.0, vec![]);
                    state.push_edge(edge);
                    emitted += 1;
                }
                None => remaining.push(call),
            }
        }

        let forwarded = remaining.len();
        state.unresolved = remaining;
        Ok(StageReport { edges_emitted: emitted, forwarded })
    }
}

/// Nearest-enclosing-lexical-scope first, then source order (earliest declaration wins)
/// among equally-nested candidates — the same-name tie-break policy fixed in DESIGN.md.
fn resolve_identifier(state: &AnalysisState, caller: FunctionId, name: &str) -> Option<FunctionId> {
    let caller_fn = state.registry.get(caller)?;
    let file_path = caller_fn.location.file_path.clone();
    let caller_scope = caller_fn.context_path.clone();

    let mut candidates: Vec<_> = state
        .registry
        .functions_in_file(&file_path)
        .iter()
        .filter_map(|id| state.registry.get(*id).map(|f| (*id, f)))
        .filter(|(_, f)| f.name == name)
        .collect();

    candidates.sort_by(|(_, a), (_, b)| {
        let depth_a = shared_prefix_len(&caller_scope, &a.context_path);
        let depth_b = shared_prefix_len(&caller_scope, &b.context_path);
        depth_b
            .cmp(&depth_a)
            .then(a.location.start_line.cmp(&b.location.start_line))
    });

    candidates.first().map(|(id, _)| *id)
}

fn shared_prefix_len(a: &[String], b: &[String]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn resolve_this_member(state: &AnalysisState, caller: FunctionId, name: &str) -> Option<FunctionId> {
    let caller_fn = state.registry.get(caller)?;
    let class_name = caller_fn.context_path.last()?;
    let file_path = &caller_fn.location.file_path;

    let type_id = state
        .type_graph
        .types
        .values()
        .find(|t| &t.name == class_name && &t.file_path == file_path)
        .map(|t| t.id)?;

    let member = state.type_graph.resolve_member(type_id, name, 8)?;
    if matches!(member.kind, MemberKind::Method | MemberKind::Constructor | MemberKind::Getter | MemberKind::Setter) {
        member.function_id
    } else {
        None
    }
}

fn resolve_local_constructor(state: &AnalysisState, caller: FunctionId, type_name: &str) -> Option<FunctionId> {
    let caller_fn = state.registry.get(caller)?;
    let file_path = &caller_fn.location.file_path;
    let type_id = state
        .type_graph
        .types
        .values()
        .find(|t| t.name == type_name && &t.file_path == file_path)
        .map(|t| t.id)?;
    state
        .type_graph
        .members
        .get(&type_id)?
        .iter()
        .find(|m| m.kind == MemberKind::Constructor)
        .and_then(|m| m.function_id)
}

pub fn build_edge(
    state: &AnalysisState,
    call: &codegraph_core::UnresolvedCall,
    callee: FunctionId,
    call_type: CallType,
    level: ResolutionLevel,
    confidence: f64,
    candidates: Vec<FunctionId>,
) -> CallEdge {
    let callee_name = state
        .registry
        .get(callee)
        .map(|f| f.name.clone())
        .unwrap_or_default();
    let id = CallEdge::compute_id(
        call.caller,
        Some(callee),
        &callee_name,
        &state.snapshot_salt,
        call.line,
        call.column,
    );
    CallEdge {
        id,
        caller: call.caller,
        callee: Some(callee),
        callee_name,
        line: call.line,
        column: call.column,
        call_type,
        call_context: call.call_context,
        is_async: call.is_async,
        is_chained: call.is_chained,
        resolution_level: level,
        confidence,
        candidates,
        runtime_confirmed: false,
        external_namespace: None,
        external_property: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_direct_call_resolves_with_full_confidence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "function a() { return b(); }\nfunction b() { return 1; }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        let report = LocalExactStage.run(&mut state).unwrap();

        assert_eq!(report.edges_emitted, 1);
        let edge = &state.edges[0];
        assert_eq!(edge.resolution_level, ResolutionLevel::LocalExact);
        assert_eq!(edge.confidence, 1.0);
    }

    #[test]
    fn self_recursive_call_is_emitted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "function fact(n) { return fact(n - 1); }\n").unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        let report = LocalExactStage.run(&mut state).unwrap();
        assert_eq!(report.edges_emitted, 1);
        let edge = &state.edges[0];
        assert_eq!(edge.caller, edge.callee.unwrap());
    }
}
