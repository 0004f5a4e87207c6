pub mod callsites;
pub mod pipeline;
pub mod stage1_local;
pub mod stage2_import;
pub mod stage3_cha;
pub mod stage4_rta;
pub mod stage5_runtime;
pub mod stage6_external;
pub mod stage7_callback;
pub mod stage8_db_bridge;
pub mod state;
pub mod typegraph;

pub use pipeline::{run_pipeline, EmptyPriorTypeSystem, PipelineSummary};
pub use state::AnalysisState;
pub use typegraph::{build_type_graph, collect_instantiations, InstantiationEvent, TypeGraph};
