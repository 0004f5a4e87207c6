// ABOUTME: Stage 2 — Import-Exact (spec §4.4): resolves identifiers and namespace-import
// ABOUTME: property access through the Source Frontend's symbol resolver.
use crate::stage1_local::build_edge;
use crate::state::AnalysisState;
use codegraph_core::{
    AnalysisStage, CallTarget, CallType, ResolutionLevel, Result, SymbolResolver,
};
use codegraph_parser::resolver::ProjectSymbolResolver;

pub struct ImportExactStage;

#[derive(Debug, Default)]
pub struct StageReport {
    pub edges_emitted: usize,
    pub forwarded: usize,
}

impl AnalysisStage<AnalysisState> for ImportExactStage {
    type Output = StageReport;

    fn name(&self) -> &'static str {
        "import_exact"
    }

    fn run(&self, state: &mut AnalysisState) -> Result<Self::Output> {
        let residue = std::mem::take(&mut state.unresolved);
        let mut remaining = Vec::new();
        let mut emitted = 0usize;

        let resolver = ProjectSymbolResolver {
            module_resolver: &state.resolver,
            registry: &state.registry,
        };

        for mut call in residue {
            let Some(caller_fn) = state.registry.get(call.caller) else {
                remaining.push(call);
                continue;
            };
            let from_file = caller_fn.location.file_path.clone();

            let resolved = match call.target.unwrap_await() {
                CallTarget::LocalIdentifier(name) => resolver.resolve_imported_function(&from_file, name),
                // Namespace import (`import * as ns from "./mod"; ns.f()`): the module
                // resolver already folds a namespace-import binding down to the target
                // module, so resolving the property name directly against it is correct;
                // a plain value receiver's method just won't be found here and forwards on.
                CallTarget::PropertyAccess { name, .. } => resolver.resolve_imported_function(&from_file, name),
                _ => None,
            };

            match resolved {
                Some(callee) => {
                    let edge = build_edge(
                        state,
                        &call,
                        callee,
                        CallType::Method,
                        ResolutionLevel::ImportExact,
                        0.95,
                        vec![],
                    );
                    state.push_edge(edge);
                    emitted += 1;
                }
                None => {
                    if let CallTarget::PropertyAccess { receiver, .. } = call.target.unwrap_await() {
                        if call.receiver_type_name.is_none() {
                            call.receiver_type_name = infer_receiver_type(state, call.caller, receiver);
                        }
                    }
                    remaining.push(call);
                }
            }
        }

        let forwarded = remaining.len();
        state.unresolved = remaining;
        Ok(StageReport { edges_emitted: emitted, forwarded })
    }
}

/// Best-effort receiver type inference from the caller's own parameter type annotations,
/// so Stage 3 (CHA) has a declared type name to resolve against for `param.method()` calls.
fn infer_receiver_type(state: &AnalysisState, caller: codegraph_core::FunctionId, receiver: &str) -> Option<String> {
    let func = state.registry.get(caller)?;
    func.signature
        .parameters
        .iter()
        .find(|p| p.name == receiver)
        .map(|p| p.type_text.trim_start_matches(|c: char| c == '&' || c.is_whitespace()).to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage1_local::LocalExactStage;

    #[test]
    fn cross_file_import_resolves() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("util.ts"), "export function f() { return 1; }\n").unwrap();
        std::fs::write(
            dir.path().join("main.ts"),
            "import { f } from \"./util\";\nfunction main() { return f(); }\n",
        )
        .unwrap();

        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        LocalExactStage.run(&mut state).unwrap();
        let report = ImportExactStage.run(&mut state).unwrap();

        assert_eq!(report.edges_emitted, 1);
        let edge = state
            .edges
            .iter()
            .find(|e| e.resolution_level == ResolutionLevel::ImportExact)
            .unwrap();
        assert_eq!(edge.confidence, 0.95);
    }
}
