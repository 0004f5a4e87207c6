// ABOUTME: Stages are polymorphic over a capability set, not a class hierarchy (spec §9):
// ABOUTME: each is a value with one `run` operation over whatever shared state it needs.
use crate::error::Result;

/// A single pipeline stage. `S` is the shared analysis state the concrete pipeline crate
/// defines (AST project, function registry, edge buffer, type graph); `core` only needs
/// to know that a stage consumes and mutates it, not its shape.
pub trait AnalysisStage<S> {
    type Output;

    fn name(&self) -> &'static str;

    fn run(&self, state: &mut S) -> Result<Self::Output>;
}

/// Declaration lookup across files, following imports and re-exports. Implemented by the
/// Source Frontend; consumed by Stage 2 (Import-Exact).
pub trait SymbolResolver {
    /// Resolves a symbol name imported into `from_file` back to the function id that
    /// defines it, if the declaration is a known function-like node.
    fn resolve_imported_function(
        &self,
        from_file: &str,
        imported_name: &str,
    ) -> Option<crate::ids::FunctionId>;
}

/// Read-only access to a *previous* snapshot's persisted type system, used only by
/// Stage 8 (DB-Bridge) to resolve method calls whose declaring type isn't present in the
/// current run's type graph (typically an incremental scan that only touched a subset of
/// files). Implemented by the Snapshot Store; the resolution engine never writes through
/// this trait.
pub trait PriorTypeSystem {
    fn type_by_name(&self, name: &str) -> Option<crate::typesys::TypeDefinition>;
    fn members_of(&self, type_id: crate::ids::TypeId) -> Vec<crate::typesys::TypeMember>;
    fn supertype_of(&self, type_id: crate::ids::TypeId) -> Option<crate::ids::TypeId>;
    /// Classes/interfaces directly implementing or extending `type_id`.
    fn direct_subtypes_of(&self, type_id: crate::ids::TypeId) -> Vec<crate::ids::TypeId>;
}
