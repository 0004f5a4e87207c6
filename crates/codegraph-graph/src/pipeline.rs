// ABOUTME: Stage driver (spec §5): runs Stages 1-8 in the fixed documented order over one
// ABOUTME: `AnalysisState`, checking a cancellation flag between stages and discarding
// ABOUTME: partial output on cancellation rather than ever committing it.
use crate::stage1_local::LocalExactStage;
use crate::stage2_import::ImportExactStage;
use crate::stage3_cha::ChaStage;
use crate::stage4_rta::RtaStage;
use crate::stage5_runtime::RuntimeTraceStage;
use crate::stage6_external::ExternalCallStage;
use crate::stage7_callback::CallbackRegistrationStage;
use crate::stage8_db_bridge::DbBridgeStage;
use crate::state::AnalysisState;
use codegraph_core::{AnalysisStage, PriorTypeSystem, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// A no-op prior-snapshot lookup for runs with no prior snapshot available; Stage 8
/// finds nothing and every candidate stays unresolved, which is correct on a first run.
pub struct EmptyPriorTypeSystem;

impl PriorTypeSystem for EmptyPriorTypeSystem {
    fn type_by_name(&self, _name: &str) -> Option<codegraph_core::TypeDefinition> {
        None
    }
    fn members_of(&self, _type_id: codegraph_core::TypeId) -> Vec<codegraph_core::TypeMember> {
        Vec::new()
    }
    fn supertype_of(&self, _type_id: codegraph_core::TypeId) -> Option<codegraph_core::TypeId> {
        None
    }
    fn direct_subtypes_of(&self, _type_id: codegraph_core::TypeId) -> Vec<codegraph_core::TypeId> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub local_exact: crate::stage1_local::StageReport,
    pub import_exact: crate::stage2_import::StageReport,
    pub cha: crate::stage3_cha::StageReport,
    pub rta: crate::stage4_rta::StageReport,
    pub runtime: crate::stage5_runtime::StageReport,
    pub external: crate::stage6_external::StageReport,
    pub callback: crate::stage7_callback::StageReport,
    pub db_bridge: crate::stage8_db_bridge::StageReport,
    pub cancelled: bool,
}

/// Runs every stage in the fixed order Local, Import, CHA, RTA, Runtime, External,
/// Callback, DB-Bridge. `cancel` is checked between stages; a cancelled run returns
/// `cancelled: true` and the caller must not commit `state`.
pub fn run_pipeline(
    state: &mut AnalysisState,
    prior: &dyn PriorTypeSystem,
    cancel: &Arc<AtomicBool>,
) -> Result<PipelineSummary> {
    let mut summary = PipelineSummary::default();

    macro_rules! run_stage {
        ($field:ident, $stage:expr) => {{
            if cancel.load(Ordering::Relaxed) {
                summary.cancelled = true;
                return Ok(summary);
            }
            let stage = $stage;
            info!(stage = stage.name(), "running stage");
            summary.$field = stage.run(state)?;
        }};
    }

    run_stage!(local_exact, LocalExactStage);
    run_stage!(import_exact, ImportExactStage);
    run_stage!(cha, ChaStage);
    run_stage!(rta, RtaStage);
    run_stage!(runtime, RuntimeTraceStage);
    run_stage!(external, ExternalCallStage);
    run_stage!(callback, CallbackRegistrationStage);
    run_stage!(db_bridge, DbBridgeStage { prior });

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_runs_every_stage_over_a_small_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "export function a() { console.log(\"x\"); return b(); }\nexport function b() { return 1; }\n",
        )
        .unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        let cancel = Arc::new(AtomicBool::new(false));

        let summary = run_pipeline(&mut state, &EmptyPriorTypeSystem, &cancel).unwrap();
        assert!(!summary.cancelled);
        assert!(state.edges.iter().any(|e| e.resolution_level == codegraph_core::ResolutionLevel::LocalExact));
        assert!(state
            .edges
            .iter()
            .any(|e| e.resolution_level == codegraph_core::ResolutionLevel::ExternalDetected));
    }

    #[test]
    fn cancelled_before_first_stage_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "function a() { return 1; }\n").unwrap();
        let project = codegraph_parser::project::Project::load(dir.path(), &[], &[]).unwrap();
        let mut state = AnalysisState::new(project, "salt").unwrap();
        let cancel = Arc::new(AtomicBool::new(true));

        let summary = run_pipeline(&mut state, &EmptyPriorTypeSystem, &cancel).unwrap();
        assert!(summary.cancelled);
        assert!(state.edges.is_empty());
    }
}
