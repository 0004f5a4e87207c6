// ABOUTME: Stage 4 — Rapid Type Analysis (spec §4.6): prunes CHA candidate sets to
// ABOUTME: actually-instantiated types, reached transitively from exported entry points.
use crate::state::AnalysisState;
use codegraph_core::{AnalysisStage, CallEdge, FunctionId, ResolutionLevel, Result};
use std::collections::{HashMap, HashSet, VecDeque};

pub struct RtaStage;

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_refined: usize,
    pub edges_preserved: usize,
}

impl AnalysisStage<AnalysisState> for RtaStage {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "rta_resolved"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let reachable = reachable_functions(state);
        let instantiated = instantiated_types(state, &reachable);
        let declaring_type = declaring_type_by_function(state);

        // CHA emits one edge per candidate at a call site, so group them back together by
        // call site before pruning: the candidate set (and the prune decision) belongs to
        // the call site, not to any single one of its edges.
        let mut call_sites: HashMap<(FunctionId, u32, u32), Vec<usize>> = HashMap::new();
        for (idx, edge) in state.edges.iter().enumerate() {
            if edge.resolution_level == ResolutionLevel::ChaResolved {
                call_sites.entry((edge.caller, edge.line, edge.column)).or_default().push(idx);
            }
        }

        let mut keys: Vec<(FunctionId, u32, u32)> = call_sites.keys().copied().collect();
        keys.sort();

        let mut refined = 0usize;
        let mut preserved = 0usize;
        let mut superseded: HashSet<usize> = HashSet::new();
        let mut new_edges = Vec::new();

        for key in keys {
            let indices = &call_sites[&key];
            let template = state.edges[indices[0]].clone();
            let pruned: Vec<FunctionId> = template
                .candidates
                .iter()
                .copied()
                .filter(|id| {
                    declaring_type
                        .get(id)
                        .map(|t| instantiated.contains(t))
                        .unwrap_or(false)
                })
                .collect();

            if pruned.is_empty() {
                // RTA must not reduce to zero edges when CHA produced some: keep as-is.
                preserved += indices.len();
                continue;
            }

            // Replace the whole CHA edge set for this call site, per candidate surviving
            // pruning, rather than leaving the superseded cha_resolved edges in place.
            for idx in indices {
                superseded.insert(*idx);
            }

            for &callee in &pruned {
                let callee_name = state.registry.get(callee).map(|f| f.name.clone()).unwrap_or_default();
                let id = CallEdge::compute_id(
                    template.caller,
                    Some(callee),
                    &callee_name,
                    &state.snapshot_salt,
                    template.line,
                    template.column,
                );
                let mut rta_edge = template.clone();
                rta_edge.id = id;
                rta_edge.callee = Some(callee);
                rta_edge.callee_name = callee_name;
                rta_edge.candidates = pruned.clone();
                rta_edge.resolution_level = ResolutionLevel::RtaResolved;
                rta_edge.confidence = 0.9;
                new_edges.push(rta_edge);
                refined += 1;
            }
        }

        if !superseded.is_empty() {
            let mut idx = 0usize;
            state.edges.retain(|_| {
                let keep = !superseded.contains(&idx);
                idx += 1;
                keep
            });
        }
        state.edges.extend(new_edges);

        Ok(StageReport { edges_refined: refined, edges_preserved: preserved })
    }
}

/// BFS closure over the caller->callee edge graph starting at exported functions; this
/// closure is the fixed point the spec describes (a function reachable via any number of
/// call hops from an entry point is reachable, which is exactly what iterating "types
/// instantiated inside the callee of a reachable caller" converges to).
fn reachable_functions(state: &AnalysisState) -> HashSet<FunctionId> {
    let mut adjacency: HashMap<FunctionId, Vec<FunctionId>> = HashMap::new();
    for edge in &state.edges {
        if let Some(callee) = edge.callee {
            adjacency.entry(edge.caller).or_default().push(callee);
        }
        for candidate in &edge.candidates {
            adjacency.entry(edge.caller).or_default().push(*candidate);
        }
    }

    let mut reachable = HashSet::new();
    let mut queue: VecDeque<FunctionId> = state
        .registry
        .all()
        .filter(|f| f.is_exported)
        .map(|f| f.physical_id)
        .collect();

    for id in &queue {
        reachable.insert(*id);
    }

    while let Some(current) = queue.pop_front() {
        if let Some(callees) = adjacency.get(&current) {
            for callee in callees {
                if reachable.insert(*callee) {
                    queue.push_back(*callee);
                }
            }
        }
    }
    reachable
}

/// Types instantiated by a reachable originator, plus module-top-level instantiations
/// (no enclosing function), which always run at import time.
fn instantiated_types(state: &AnalysisState, reachable: &HashSet<FunctionId>) -> HashSet<String> {
    state
        .instantiations
        .iter()
        .filter(|event| event.originator.map(|f| reachable.contains(&f)).unwrap_or(true))
        .map(|event| event.type_name.clone())
        .collect()
}

fn declaring_type_by_function(state: &AnalysisState) -> HashMap<FunctionId, String> {
    let mut map = HashMap::new();
    for (type_id, members) in &state.type_graph.members {
        let Some(type_def) = state.type_graph.types.get(type_id) else { continue };
        for member in members {
            if let Some(func_id) = member.function_id {
                map.insert(func_id, type_def.name.clone());
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage3_cha::ChaStage;
    use codegraph_core::{CallContext, CallTarget, UnresolvedCall};

    fn setup() -> AnalysisState {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "interface I { m(): void }\n\
             class A implements I { m() { return 1; } }\n\
             class B implements I { m() { return 2; } }\n\
             export function call_it(x) { return x.m(); }\n\
             export function makeA() { return new A(); }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        AnalysisState::new(project, "salt").unwrap()
    }

    fn push_cha_candidate(state: &mut AnalysisState) {
        let caller = state.registry.all().find(|f| f.name == "call_it").unwrap().physical_id;
        state.unresolved.push(UnresolvedCall {
            caller,
            target: CallTarget::PropertyAccess { receiver: "x".into(), name: "m".into() },
            line: 4,
            column: 0,
            call_context: CallContext::Normal,
            is_async: false,
            is_chained: false,
            receiver_type_name: Some("I".into()),
        });
        ChaStage.run(state).unwrap();
    }

    #[test]
    fn only_instantiated_implementer_survives_pruning() {
        let mut state = setup();
        push_cha_candidate(&mut state);
        let report = RtaStage.run(&mut state).unwrap();
        assert_eq!(report.edges_refined, 1);

        let rta_edges: Vec<_> =
            state.edges.iter().filter(|e| e.resolution_level == ResolutionLevel::RtaResolved).collect();
        assert_eq!(rta_edges.len(), 1);
        assert_eq!(rta_edges[0].candidates.len(), 1);
        assert_eq!(rta_edges[0].confidence, 0.9);

        // The superseded cha_resolved edges must not survive alongside their replacement.
        assert!(
            !state.edges.iter().any(|e| e.resolution_level == ResolutionLevel::ChaResolved),
            "pruned call site must not leave stale cha_resolved edges behind"
        );
    }

    #[test]
    fn both_instantiated_implementers_yield_two_rta_edges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "interface I { m(): void }\n\
             class A implements I { m() { return 1; } }\n\
             class B implements I { m() { return 2; } }\n\
             export function call_it(x) { return x.m(); }\n\
             export function makeA() { return new A(); }\n\
             export function makeB() { return new B(); }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        push_cha_candidate(&mut state);

        let report = RtaStage.run(&mut state).unwrap();
        assert_eq!(report.edges_refined, 2);
        assert_eq!(report.edges_preserved, 0);

        let rta_edges: Vec<_> =
            state.edges.iter().filter(|e| e.resolution_level == ResolutionLevel::RtaResolved).collect();
        assert_eq!(rta_edges.len(), 2, "both instantiated implementers must each get their own edge");

        let mut callees: Vec<FunctionId> = rta_edges.iter().map(|e| e.callee.unwrap()).collect();
        callees.sort();
        callees.dedup();
        assert_eq!(callees.len(), 2, "callees must be distinct, not both pointing at one representative");

        for edge in &rta_edges {
            assert_eq!(edge.candidates.len(), 2);
            assert_eq!(edge.confidence, 0.9);
        }
        assert!(!state.edges.iter().any(|e| e.resolution_level == ResolutionLevel::ChaResolved));
    }
}
