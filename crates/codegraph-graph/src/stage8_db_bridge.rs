// ABOUTME: Stage 8 — DB-Bridge (spec §4.10): resolves method calls whose declaring type
// ABOUTME: is absent from the current run's type graph, falling back to a prior snapshot.
use crate::state::AnalysisState;
use codegraph_core::{
    AnalysisStage, CallEdge, CallTarget, CallType, FunctionId, MemberKind, PriorTypeSystem,
    ResolutionLevel, Result, TypeId, TypeKind,
};
use std::collections::{HashMap, HashSet};

const MAX_EXTENDS_DEPTH: usize = 5;

pub struct DbBridgeStage<'a> {
    pub prior: &'a dyn PriorTypeSystem,
}

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_emitted: usize,
    pub still_unresolved: usize,
}

impl<'a> AnalysisStage<AnalysisState> for DbBridgeStage<'a> {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "db_bridge"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let residue = std::mem::take(&mut state.unresolved);
        let mut remaining = Vec::new();
        let mut emitted = 0usize;
        // Per-run caches keyed by (type name) and (type id), sized to the run (spec §5).
        let mut by_name_cache: HashMap<String, Option<codegraph_core::TypeDefinition>> = HashMap::new();

        for call in residue {
            let CallTarget::PropertyAccess { name: method_name, .. } = call.target.unwrap_await().clone() else {
                remaining.push(call);
                continue;
            };
            let Some(type_name) = call.receiver_type_name.clone() else {
                remaining.push(call);
                continue;
            };

            let type_def = by_name_cache
                .entry(type_name.clone())
                .or_insert_with(|| self.prior.type_by_name(&type_name))
                .clone();
            let Some(type_def) = type_def else {
                remaining.push(call);
                continue;
            };

            let mut candidate_fns: Vec<FunctionId> = match type_def.kind {
                TypeKind::Class => collect_class_candidates(self.prior, type_def.id, &method_name),
                TypeKind::Interface => collect_interface_candidates(self.prior, type_def.id, &method_name),
                _ => Vec::new(),
            };

            candidate_fns.retain(|id| state.registry.get(*id).is_some());
            candidate_fns.sort();
            candidate_fns.dedup();

            if candidate_fns.is_empty() {
                remaining.push(call);
                continue;
            }

            let representative = candidate_fns[0];
            let edge = build_edge(state, &call, representative, candidate_fns);
            state.push_edge(edge);
            emitted += 1;
        }

        let still_unresolved = remaining.len();
        state.unresolved = remaining;
        Ok(StageReport { edges_emitted: emitted, still_unresolved })
    }
}

fn collect_class_candidates(prior: &dyn PriorTypeSystem, type_id: TypeId, method_name: &str) -> Vec<FunctionId> {
    let mut out = Vec::new();
    let mut current = Some(type_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth >= MAX_EXTENDS_DEPTH {
            break;
        }
        for member in prior.members_of(id) {
            if member.name == method_name
                && matches!(member.kind, MemberKind::Method | MemberKind::Getter | MemberKind::Setter)
            {
                if let Some(func_id) = member.function_id {
                    out.push(func_id);
                }
            }
        }
        current = prior.supertype_of(id);
        depth += 1;
    }
    out
}

fn collect_interface_candidates(prior: &dyn PriorTypeSystem, type_id: TypeId, method_name: &str) -> Vec<FunctionId> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![type_id];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        for implementer in prior.direct_subtypes_of(id) {
            for member in prior.members_of(implementer) {
                if member.name == method_name && matches!(member.kind, MemberKind::Method) {
                    if let Some(func_id) = member.function_id {
                        out.push(func_id);
                    }
                }
            }
            stack.push(implementer);
        }
    }
    out
}

fn build_edge(
    state: &AnalysisState,
    call: &codegraph_core::UnresolvedCall,
    representative: FunctionId,
    candidates: Vec<FunctionId>,
) -> CallEdge {
    let callee_name = state
        .registry
        .get(representative)
        .map(|f| f.name.clone())
        .unwrap_or_default();
    let id = CallEdge::compute_id(
        call.caller,
        Some(representative),
        &callee_name,
        &state.snapshot_salt,
        call.line,
        call.column,
    );
    CallEdge {
        id,
        caller: call.caller,
        callee: Some(representative),
        callee_name,
        line: call.line,
        column: call.column,
        call_type: CallType::Method,
        call_context: call.call_context,
        is_async: call.is_async,
        is_chained: call.is_chained,
        resolution_level: ResolutionLevel::DbBridge,
        confidence: 0.95,
        candidates,
        runtime_confirmed: false,
        external_namespace: None,
        external_property: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{CallContext as Ctx, TypeDefinition, TypeMember, UnresolvedCall};

    struct FakePriorTypeSystem {
        types: Vec<TypeDefinition>,
        members: HashMap<TypeId, Vec<TypeMember>>,
        implementers: HashMap<TypeId, Vec<TypeId>>,
    }

    impl PriorTypeSystem for FakePriorTypeSystem {
        fn type_by_name(&self, name: &str) -> Option<TypeDefinition> {
            self.types.iter().find(|t| t.name == name).cloned()
        }
        fn members_of(&self, type_id: TypeId) -> Vec<TypeMember> {
            self.members.get(&type_id).cloned().unwrap_or_default()
        }
        fn supertype_of(&self, _type_id: TypeId) -> Option<TypeId> {
            None
        }
        fn direct_subtypes_of(&self, type_id: TypeId) -> Vec<TypeId> {
            self.implementers.get(&type_id).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn interface_resolves_via_prior_snapshot_implementers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "class A { m() { return 1; } }\nfunction call_it(x) { return x.m(); }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();

        let a_func = state.registry.all().find(|f| f.name == "m").unwrap().physical_id;
        let caller = state.registry.all().find(|f| f.name == "call_it").unwrap().physical_id;

        let i_id = TypeId(1);
        let a_id = TypeId(2);
        let prior = FakePriorTypeSystem {
            types: vec![TypeDefinition {
                id: i_id,
                name: "I".into(),
                kind: TypeKind::Interface,
                file_path: "/a.ts".into(),
                is_exported: false,
                is_generic: false,
                location: codegraph_core::Location::point("/a.ts", 1, 0),
            }],
            members: HashMap::from([(
                a_id,
                vec![TypeMember {
                    parent_type: a_id,
                    name: "m".into(),
                    kind: MemberKind::Method,
                    is_optional: false,
                    is_readonly: false,
                    is_static: false,
                    is_abstract: false,
                    function_id: Some(a_func),
                    signature_text: "m()".into(),
                }],
            )]),
            implementers: HashMap::from([(i_id, vec![a_id])]),
        };

        state.unresolved.push(UnresolvedCall {
            caller,
            target: CallTarget::PropertyAccess { receiver: "x".into(), name: "m".into() },
            line: 2,
            column: 0,
            call_context: Ctx::Normal,
            is_async: false,
            is_chained: false,
            receiver_type_name: Some("I".into()),
        });

        let stage = DbBridgeStage { prior: &prior };
        let report = stage.run(&mut state).unwrap();
        assert_eq!(report.edges_emitted, 1);
        let edge = &state.edges[0];
        assert_eq!(edge.resolution_level, ResolutionLevel::DbBridge);
        assert_eq!(edge.candidates, vec![a_func]);
    }
}
