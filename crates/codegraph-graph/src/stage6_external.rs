// ABOUTME: Stage 6 — External Call Recognizer (spec §4.8): classifies calls to
// ABOUTME: built-ins, runtime globals, and unresolved third-party imports by name heuristics.
use crate::state::AnalysisState;
use codegraph_core::{AnalysisStage, CallEdge, CallTarget, CallType, Result};

pub struct ExternalCallStage;

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_emitted: usize,
    pub forwarded: usize,
}

const WELL_KNOWN_NAMESPACES: &[&str] = &["console", "process", "Buffer", "Math", "JSON", "Object", "Array", "Promise"];
const RUNTIME_GLOBALS: &[&str] = &[
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
    "parseInt",
    "parseFloat",
    "encodeURIComponent",
    "decodeURIComponent",
    "fetch",
    "require",
];

impl AnalysisStage<AnalysisState> for ExternalCallStage {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "external_detected"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let residue = std::mem::take(&mut state.unresolved);
        let mut remaining = Vec::new();
        let mut emitted = 0usize;

        for call in residue {
            let classification = match call.target.unwrap_await() {
                CallTarget::PropertyAccess { receiver, name } if WELL_KNOWN_NAMESPACES.contains(&receiver.as_str()) => {
                    Some((receiver.clone(), name.clone(), 0.95))
                }
                CallTarget::LocalIdentifier(name) if RUNTIME_GLOBALS.contains(&name.as_str()) => {
                    Some(("global".to_string(), name.clone(), 0.85))
                }
                // Both the "unresolved lowercase receiver" and "other property access"
                // heuristics land at the same confidence; distinguished by `namespace`
                // vs. `property` kind only in the stored classification, not the score.
                CallTarget::PropertyAccess { receiver, name } => Some((receiver.clone(), name.clone(), 0.7)),
                _ => None,
            };

            match classification {
                Some((namespace, property, confidence)) => {
                    let edge = build_external_edge(state, &call, namespace, property, confidence);
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

fn build_external_edge(
    state: &AnalysisState,
    call: &codegraph_core::UnresolvedCall,
    namespace: String,
    property: String,
    confidence: f64,
) -> CallEdge {
    let callee_name = format!("{namespace}.{property}");
    let id = CallEdge::compute_id(call.caller, None, &callee_name, &state.snapshot_salt, call.line, call.column);
    CallEdge {
        id,
        caller: call.caller,
        callee: None,
        callee_name,
        line: call.line,
        column: call.column,
        call_type: CallType::External,
        call_context: call.call_context,
        is_async: call.is_async,
        is_chained: call.is_chained,
        resolution_level: codegraph_core::ResolutionLevel::ExternalDetected,
        confidence,
        candidates: vec![],
        runtime_confirmed: false,
        external_namespace: Some(namespace),
        external_property: Some(property),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage1_local::LocalExactStage;
    use crate::stage2_import::ImportExactStage;
    use codegraph_core::ResolutionLevel;

    #[test]
    fn console_log_is_classified_as_well_known_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "function a() { console.log(\"x\"); }\n").unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        LocalExactStage.run(&mut state).unwrap();
        ImportExactStage.run(&mut state).unwrap();
        let report = ExternalCallStage.run(&mut state).unwrap();

        assert_eq!(report.edges_emitted, 1);
        let edge = &state.edges[0];
        assert_eq!(edge.resolution_level, ResolutionLevel::ExternalDetected);
        assert_eq!(edge.callee, None);
        assert_eq!(edge.external_namespace.as_deref(), Some("console"));
        assert_eq!(edge.external_property.as_deref(), Some("log"));
        assert_eq!(edge.confidence, 0.95);
    }
}
