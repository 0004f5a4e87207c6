// ABOUTME: Stage 5 — Runtime Trace Integration (spec §4.7): confirms static edges and
// ABOUTME: discovers edges static analysis missed, from an externally supplied trace stream.
use crate::state::AnalysisState;
use codegraph_core::{AnalysisStage, CallContext, CallEdge, CallType, FunctionId, ResolutionLevel, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One observed call from an execution trace. The collaborator supplying this stream
/// (coverage instrumentation, a test-run recorder) is out of scope; this is its wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeTraceEvent {
    pub caller: FunctionId,
    pub callee: FunctionId,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

pub struct RuntimeTraceStage;

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_confirmed: usize,
    pub edges_discovered: usize,
}

impl AnalysisStage<AnalysisState> for RuntimeTraceStage {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "runtime_confirmed"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let traces = std::mem::take(&mut state.runtime_traces);
        let mut confirmed = 0usize;
        let mut discovered = Vec::new();
        let mut confirmed_pairs: HashSet<(FunctionId, FunctionId)> = HashSet::new();

        for trace in &traces {
            let matched = state
                .edges
                .iter_mut()
                .find(|e| e.caller == trace.caller && e.callee == Some(trace.callee));
            match matched {
                Some(edge) => {
                    edge.runtime_confirmed = true;
                    edge.confidence = 1.0;
                    confirmed += 1;
                    confirmed_pairs.insert((trace.caller, trace.callee));
                }
                None => {
                    if confirmed_pairs.contains(&(trace.caller, trace.callee)) {
                        continue;
                    }
                    let callee_name = state
                        .registry
                        .get(trace.callee)
                        .map(|f| f.name.clone())
                        .unwrap_or_default();
                    let line = trace.line.unwrap_or(0);
                    let column = trace.column.unwrap_or(0);
                    let id = CallEdge::compute_id(
                        trace.caller,
                        Some(trace.callee),
                        &callee_name,
                        &state.snapshot_salt,
                        line,
                        column,
                    );
                    discovered.push(CallEdge {
                        id,
                        caller: trace.caller,
                        callee: Some(trace.callee),
                        callee_name,
                        line,
                        column,
                        call_type: CallType::Direct,
                        call_context: CallContext::Normal,
                        is_async: false,
                        is_chained: false,
                        resolution_level: ResolutionLevel::RuntimeConfirmed,
                        confidence: 1.0,
                        candidates: vec![],
                        runtime_confirmed: true,
                        external_namespace: None,
                        external_property: None,
                    });
                }
            }
        }

        let discovered_count = discovered.len();
        state.edges.extend(discovered);
        state.runtime_traces = traces;
        Ok(StageReport { edges_confirmed: confirmed, edges_discovered: discovered_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage1_local::LocalExactStage;

    #[test]
    fn matching_trace_upgrades_existing_edge() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "function a() { return b(); }\nfunction b() { return 1; }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        LocalExactStage.run(&mut state).unwrap();

        let edge = state.edges[0].clone();
        state.runtime_traces.push(RuntimeTraceEvent {
            caller: edge.caller,
            callee: edge.callee.unwrap(),
            line: None,
            column: None,
        });

        let report = RuntimeTraceStage.run(&mut state).unwrap();
        assert_eq!(report.edges_confirmed, 1);
        assert!(state.edges[0].runtime_confirmed);
    }

    #[test]
    fn unmatched_trace_creates_new_edge() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "function a() { return 1; }\nfunction b() { return 2; }\n").unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        let a = state.registry.all().find(|f| f.name == "a").unwrap().physical_id;
        let b = state.registry.all().find(|f| f.name == "b").unwrap().physical_id;
        state.runtime_traces.push(RuntimeTraceEvent { caller: a, callee: b, line: Some(1), column: Some(2) });

        let report = RuntimeTraceStage.run(&mut state).unwrap();
        assert_eq!(report.edges_discovered, 1);
        assert_eq!(state.edges.len(), 1);
        assert_eq!(state.edges[0].resolution_level, ResolutionLevel::RuntimeConfirmed);
    }
}
