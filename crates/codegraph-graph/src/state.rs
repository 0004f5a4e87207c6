// ABOUTME: The shared analysis state every stage mutates in place (spec §4: "a single
// ABOUTME: state object threaded through the pipeline, each stage conservatively extending it").
use crate::stage5_runtime::RuntimeTraceEvent;
use crate::typegraph::{InstantiationEvent, TypeGraph};
use codegraph_core::{CallEdge, UnresolvedCall};
use codegraph_parser::project::Project;
use codegraph_parser::registry::FunctionRegistry;
use codegraph_parser::resolver::ModuleResolver;

/// Everything the 8 stages read and write. Built once by the pipeline driver before
/// Stage 1 runs and handed to each stage in order; no stage owns its own copy.
pub struct AnalysisState {
    pub project: Project,
    pub registry: FunctionRegistry,
    pub resolver: ModuleResolver,
    pub type_graph: TypeGraph,
    pub instantiations: Vec<InstantiationEvent>,
    pub snapshot_salt: String,

    /// Edges emitted so far, across every stage that has run.
    pub edges: Vec<CallEdge>,
    /// Call sites not yet resolved to an edge; each stage drains what it can and
    /// re-pushes the rest (optionally enriched) for the next stage.
    pub unresolved: Vec<UnresolvedCall>,
    /// Non-fatal issues accumulated along the way (range mismatches, unresolved
    /// specifiers, type graph cycles), surfaced in the snapshot summary.
    pub warnings: Vec<String>,
    /// Externally supplied execution trace, consumed once by Stage 5.
    pub runtime_traces: Vec<RuntimeTraceEvent>,
}

impl AnalysisState {
    pub fn new(project: Project, snapshot_salt: impl Into<String>) -> codegraph_core::Result<Self> {
        let salt = snapshot_salt.into();
        let registry = codegraph_parser::registry::collect(&project, &salt)?;
        let resolver = ModuleResolver::build(&project);
        let type_graph = crate::typegraph::build_type_graph(&project, &registry, &salt);
        let instantiations = crate::typegraph::collect_instantiations(&project, &registry);

        Ok(Self {
            project,
            registry,
            resolver,
            type_graph,
            instantiations,
            snapshot_salt: salt,
            edges: Vec::new(),
            unresolved: Vec::new(),
            warnings: Vec::new(),
            runtime_traces: Vec::new(),
        })
    }

    pub fn push_edge(&mut self, edge: CallEdge) {
        self.edges.push(edge);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
