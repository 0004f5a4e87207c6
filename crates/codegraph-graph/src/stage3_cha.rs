// ABOUTME: Stage 3 — Class Hierarchy Analysis (spec §4.5): over-approximates virtual
// ABOUTME: dispatch using the declared type hierarchy's subtype closure.
use crate::state::AnalysisState;
use codegraph_core::{
    AnalysisStage, CallEdge, CallTarget, CallType, FunctionId, MemberKind, ResolutionLevel, Result,
};

pub struct ChaStage;

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_emitted: usize,
    pub forwarded: usize,
}

impl AnalysisStage<AnalysisState> for ChaStage {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "cha_resolved"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let residue = std::mem::take(&mut state.unresolved);
        let mut remaining = Vec::new();
        let mut emitted = 0usize;

        for call in residue {
            let CallTarget::PropertyAccess { name, .. } = call.target.unwrap_await().clone() else {
                remaining.push(call);
                continue;
            };
            let Some(type_name) = call.receiver_type_name.clone() else {
                remaining.push(call);
                continue;
            };
            let Some(root_id) = state.type_graph.type_by_name(&type_name).map(|t| t.id) else {
                remaining.push(call);
                continue;
            };

            let closure = state.type_graph.subtype_closure(root_id);
            let mut candidates: Vec<(String, FunctionId)> = Vec::new();
            for type_id in &closure {
                if let Some(member) = state.type_graph.resolve_member(*type_id, &name, 8) {
                    if matches!(member.kind, MemberKind::Method | MemberKind::Getter | MemberKind::Setter) {
                        if let Some(func_id) = member.function_id {
                            let declaring_name = state
                                .type_graph
                                .types
                                .get(type_id)
                                .map(|t| t.name.clone())
                                .unwrap_or_default();
                            candidates.push((declaring_name, func_id));
                        }
                    }
                }
            }

            if candidates.is_empty() {
                remaining.push(call);
                continue;
            }

            // Deterministic ordering: (declaring-class name, function id) ascending.
            candidates.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
            candidates.dedup_by(|a, b| a.1 == b.1);

            // One edge per viable candidate, not a single representative: a caller of an
            // interface method can reach every implementer, and a consumer that trusts
            // `callee` (dead-code elimination, reachability) must see each of them as an
            // edge callee rather than buried in another edge's `candidates` list.
            let candidate_ids: Vec<FunctionId> = candidates.iter().map(|(_, id)| *id).collect();
            for &callee in &candidate_ids {
                let edge = build_cha_edge(state, &call, callee, candidate_ids.clone());
                state.push_edge(edge);
                emitted += 1;
            }
        }

        let forwarded = remaining.len();
        state.unresolved = remaining;
        Ok(StageReport { edges_emitted: emitted, forwarded })
    }
}

fn build_cha_edge(
    state: &AnalysisState,
    call: &codegraph_core::UnresolvedCall,
    callee: FunctionId,
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
        call_type: CallType::Virtual,
        call_context: call.call_context,
        is_async: call.is_async,
        is_chained: call.is_chained,
        resolution_level: ResolutionLevel::ChaResolved,
        confidence: 0.8,
        candidates,
        runtime_confirmed: false,
        external_namespace: None,
        external_property: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{CallContext, UnresolvedCall};

    #[test]
    fn interface_with_two_implementers_yields_candidates_for_both() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "interface I { m(): void }\n\
             class A implements I { m() { return 1; } }\n\
             class B implements I { m() { return 2; } }\n\
             function call_it(x) { return x.m(); }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();

        let caller = state
            .registry
            .all()
            .find(|f| f.name == "call_it")
            .unwrap()
            .physical_id;
        state.unresolved.push(UnresolvedCall {
            caller,
            target: codegraph_core::CallTarget::PropertyAccess {
                receiver: "x".into(),
                name: "m".into(),
            },
            line: 4,
            column: 0,
            call_context: CallContext::Normal,
            is_async: false,
            is_chained: false,
            receiver_type_name: Some("I".into()),
        });

        let report = ChaStage.run(&mut state).unwrap();
        assert_eq!(report.edges_emitted, 2);
        assert_eq!(state.edges.len(), 2);

        let mut callees: Vec<FunctionId> =
            state.edges.iter().map(|e| e.callee.expect("cha edge has a callee")).collect();
        callees.sort();
        let mut expected: Vec<FunctionId> = state.edges[0].candidates.clone();
        expected.sort();
        assert_eq!(callees, expected);
        assert_eq!(callees.len(), 2, "one edge per distinct implementer, not a single representative");

        for edge in &state.edges {
            assert_eq!(edge.candidates.len(), 2);
            assert_eq!(edge.resolution_level, ResolutionLevel::ChaResolved);
            assert_eq!(edge.confidence, 0.8);
        }
    }
}
