// ABOUTME: Snapshot Store (spec §4.11): begin/save/commit/abort over one rusqlite
// ABOUTME: transaction per snapshot, plus the `PriorTypeSystem` view Stage 8 reads.
use crate::queries;
use crate::schema;
use codegraph_core::{
    CallEdge, CodeGraphError, Function, FunctionId, GitMetadata, PriorTypeSystem, Result,
    Snapshot, SnapshotCounts, SnapshotId, TypeDefinition, TypeId, TypeMember, TypeRelationship,
};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Opens (creating if missing) the single embedded database file at `path` and brings
    /// its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(CodeGraphError::Io)?;
        }
        let mut conn = Connection::open(path).map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
            .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        schema::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        schema::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Opens a write transaction for a new snapshot and inserts its (uncommitted) row.
    pub fn begin_snapshot(
        &mut self,
        label: Option<String>,
        source_root: &str,
        config_hash: &str,
        git: GitMetadata,
    ) -> Result<PendingSnapshot<'_>> {
        let snapshot = Snapshot::new(source_root, config_hash, label);
        let snapshot_id = snapshot.id;
        let tx = self
            .conn
            .transaction()
            .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        tx.execute(
            "INSERT INTO snapshots
                (id, created_at, label, source_root, config_hash, git_commit, git_branch, git_tag, committed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            rusqlite::params![
                snapshot_id.to_string(),
                snapshot.created_at.to_rfc3339(),
                snapshot.label,
                snapshot.source_root,
                snapshot.config_hash,
                git.commit,
                git.branch,
                git.tag,
            ],
        )
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;

        Ok(PendingSnapshot { tx, snapshot_id })
    }

    pub fn latest_snapshot_id(&self) -> Result<Option<SnapshotId>> {
        self.conn
            .query_row(
                "SELECT id FROM snapshots WHERE committed = 1 ORDER BY created_at DESC LIMIT 1",
                [],
                |row| {
                    let text: String = row.get(0)?;
                    Ok(text)
                },
            )
            .optional_uuid()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn functions_by_snapshot(&self, snapshot_id: SnapshotId) -> Result<Vec<Function>> {
        queries::functions_by_snapshot(&self.conn, snapshot_id)
    }

    pub fn edges_by_caller(&self, snapshot_id: SnapshotId, caller_id: FunctionId) -> Result<Vec<CallEdge>> {
        queries::edges_by_caller(&self.conn, snapshot_id, caller_id)
    }

    pub fn type_by_name(&self, snapshot_id: SnapshotId, name: &str) -> Result<Option<TypeDefinition>> {
        queries::type_by_name(&self.conn, snapshot_id, name)
    }

    pub fn members_of(&self, snapshot_id: SnapshotId, type_id: TypeId) -> Result<Vec<TypeMember>> {
        queries::members_of(&self.conn, snapshot_id, type_id)
    }

    pub fn implementers_of(&self, snapshot_id: SnapshotId, type_id: TypeId) -> Result<Vec<TypeId>> {
        queries::implementers_of(&self.conn, snapshot_id, type_id)
    }

    pub fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<serde_json::Value>> {
        queries::query(&self.conn, sql, params)
    }
}

/// A small helper trait to turn the `query_row` result of `latest_snapshot_id` into
/// `Option<SnapshotId>`, folding "no rows" into `None` rather than an error.
trait OptionalUuid {
    fn optional_uuid(self) -> Result<Option<SnapshotId>>;
}

impl OptionalUuid for rusqlite::Result<String> {
    fn optional_uuid(self) -> Result<Option<SnapshotId>> {
        match self {
            Ok(text) => SnapshotId::parse_str(&text)
                .map(Some)
                .map_err(|e| CodeGraphError::Integrity(e.to_string())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CodeGraphError::Storage(e.to_string())),
        }
    }
}

/// Stage 8's read-only view of the most recently committed snapshot. A fresh store with
/// no committed snapshot yet answers every query with "nothing found", matching
/// `EmptyPriorTypeSystem`'s behavior in `codegraph-graph` on a first run.
impl PriorTypeSystem for SnapshotStore {
    fn type_by_name(&self, name: &str) -> Option<TypeDefinition> {
        let snapshot_id = self.latest_snapshot_id().ok().flatten()?;
        self.type_by_name(snapshot_id, name).ok().flatten()
    }

    fn members_of(&self, type_id: TypeId) -> Vec<TypeMember> {
        let Some(snapshot_id) = self.latest_snapshot_id().ok().flatten() else {
            return Vec::new();
        };
        self.members_of(snapshot_id, type_id).unwrap_or_default()
    }

    fn supertype_of(&self, type_id: TypeId) -> Option<TypeId> {
        let snapshot_id = self.latest_snapshot_id().ok().flatten()?;
        let row: rusqlite::Result<String> = self.conn.query_row(
            "SELECT target_type_id FROM type_relationships
             WHERE snapshot_id = ?1 AND source_type_id = ?2 AND kind = 'extends' LIMIT 1",
            rusqlite::params![snapshot_id.to_string(), type_id.to_string()],
            |row| row.get(0),
        );
        row.ok().map(|text| TypeId(u64::from_str_radix(&text, 16).unwrap_or(0)))
    }

    fn direct_subtypes_of(&self, type_id: TypeId) -> Vec<TypeId> {
        let Some(snapshot_id) = self.latest_snapshot_id().ok().flatten() else {
            return Vec::new();
        };
        self.implementers_of(snapshot_id, type_id).unwrap_or_default()
    }
}

/// One open write transaction for a snapshot still being assembled. Nothing is visible to
/// readers (`committed = 0`) until [`PendingSnapshot::commit`] succeeds.
pub struct PendingSnapshot<'conn> {
    tx: rusqlite::Transaction<'conn>,
    snapshot_id: SnapshotId,
}

impl<'conn> PendingSnapshot<'conn> {
    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    pub fn save_functions(&self, functions: &[Function]) -> Result<()> {
        for function in functions {
            self.tx
                .execute(
                    "INSERT INTO functions
                        (id, snapshot_id, semantic_id, content_id, name, file_path,
                         start_line, start_column, end_line, end_column, context_path, kind,
                         access_modifier, is_static, is_exported, return_type, is_async,
                         is_generator, cyclomatic_complexity, cognitive_complexity,
                         lines_of_code, lines_of_comments, parameter_count, halstead_volume,
                         maintainability_index)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25)",
                    rusqlite::params![
                        function.physical_id.to_string(),
                        self.snapshot_id.to_string(),
                        function.semantic_id.to_string(),
                        function.content_id.to_string(),
                        function.name,
                        function.location.file_path,
                        function.location.start_line,
                        function.location.start_column,
                        function.location.end_line,
                        function.location.end_column,
                        serde_json::to_string(&function.context_path).unwrap_or_default(),
                        function_kind_str(function.kind),
                        function.access_modifier.map(access_modifier_str),
                        function.is_static,
                        function.is_exported,
                        function.signature.return_type,
                        function.signature.is_async,
                        function.signature.is_generator,
                        function.metrics.cyclomatic_complexity,
                        function.metrics.cognitive_complexity,
                        function.metrics.lines_of_code,
                        function.metrics.lines_of_comments,
                        function.metrics.parameter_count,
                        function.metrics.halstead_volume,
                        function.metrics.maintainability_index,
                    ],
                )
                .map_err(|e| CodeGraphError::Storage(e.to_string()))?;

            for param in &function.signature.parameters {
                self.tx
                    .execute(
                        "INSERT INTO function_parameters
                            (snapshot_id, function_id, position, name, type_text, is_optional, is_rest)
                         VALUES (?1,?2,?3,?4,?5,?6,?7)",
                        rusqlite::params![
                            self.snapshot_id.to_string(),
                            function.physical_id.to_string(),
                            param.position,
                            param.name,
                            param.type_text,
                            param.is_optional,
                            param.is_rest,
                        ],
                    )
                    .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }

    pub fn save_edges(&self, edges: &[CallEdge]) -> Result<()> {
        for edge in edges {
            self.tx
                .execute(
                    "INSERT INTO call_edges
                        (id, snapshot_id, caller_id, callee_id, callee_name, line, column_,
                         call_type, call_context, is_async, is_chained, resolution_level,
                         confidence, runtime_confirmed, external_namespace, external_property)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
                    rusqlite::params![
                        edge.id.to_string(),
                        self.snapshot_id.to_string(),
                        edge.caller.to_string(),
                        edge.callee.map(|c| c.to_string()),
                        edge.callee_name,
                        edge.line,
                        edge.column,
                        call_type_str(edge.call_type),
                        call_context_str(edge.call_context),
                        edge.is_async,
                        edge.is_chained,
                        edge.resolution_level.to_string(),
                        edge.confidence,
                        edge.runtime_confirmed,
                        edge.external_namespace,
                        edge.external_property,
                    ],
                )
                .map_err(|e| CodeGraphError::Storage(e.to_string()))?;

            for (position, candidate) in edge.candidates.iter().enumerate() {
                self.tx
                    .execute(
                        "INSERT INTO call_edge_candidates (snapshot_id, edge_id, position, candidate_function_id)
                         VALUES (?1,?2,?3,?4)",
                        rusqlite::params![
                            self.snapshot_id.to_string(),
                            edge.id.to_string(),
                            position as i64,
                            candidate.to_string(),
                        ],
                    )
                    .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
            }

            if self.is_internal_edge(edge)? {
                self.tx
                    .execute(
                        "INSERT INTO internal_call_edges (snapshot_id, edge_id) VALUES (?1, ?2)",
                        rusqlite::params![self.snapshot_id.to_string(), edge.id.to_string()],
                    )
                    .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// An edge is "internal" when caller and callee are both known functions declared in
    /// the same file (spec §6's `internal_call_edges` is the same-file subset of `call_edges`).
    fn is_internal_edge(&self, edge: &CallEdge) -> Result<bool> {
        let Some(callee) = edge.callee else { return Ok(false) };
        let caller_file: Option<String> = self
            .tx
            .query_row(
                "SELECT file_path FROM functions WHERE snapshot_id = ?1 AND id = ?2",
                rusqlite::params![self.snapshot_id.to_string(), edge.caller.to_string()],
                |row| row.get(0),
            )
            .optional_string()?;
        let callee_file: Option<String> = self
            .tx
            .query_row(
                "SELECT file_path FROM functions WHERE snapshot_id = ?1 AND id = ?2",
                rusqlite::params![self.snapshot_id.to_string(), callee.to_string()],
                |row| row.get(0),
            )
            .optional_string()?;
        Ok(matches!((caller_file, callee_file), (Some(a), Some(b)) if a == b))
    }

    pub fn save_type_system(
        &self,
        types: &[TypeDefinition],
        members: &[TypeMember],
        relationships: &[TypeRelationship],
    ) -> Result<()> {
        for type_def in types {
            self.tx
                .execute(
                    "INSERT INTO type_definitions
                        (id, snapshot_id, name, kind, file_path, start_line, start_column,
                         end_line, end_column, is_exported, is_generic)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                    rusqlite::params![
                        type_def.id.to_string(),
                        self.snapshot_id.to_string(),
                        type_def.name,
                        type_kind_str(type_def.kind),
                        type_def.file_path,
                        type_def.location.start_line,
                        type_def.location.start_column,
                        type_def.location.end_line,
                        type_def.location.end_column,
                        type_def.is_exported,
                        type_def.is_generic,
                    ],
                )
                .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        }

        for member in members {
            self.tx
                .execute(
                    "INSERT INTO type_members
                        (snapshot_id, parent_type_id, name, kind, is_optional, is_readonly,
                         is_static, is_abstract, function_id, signature_text)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                    rusqlite::params![
                        self.snapshot_id.to_string(),
                        member.parent_type.to_string(),
                        member.name,
                        member_kind_str(member.kind),
                        member.is_optional,
                        member.is_readonly,
                        member.is_static,
                        member.is_abstract,
                        member.function_id.map(|f| f.to_string()),
                        member.signature_text,
                    ],
                )
                .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        }

        for relationship in relationships {
            self.tx
                .execute(
                    "INSERT INTO type_relationships (snapshot_id, source_type_id, target_type_id, kind)
                     VALUES (?1,?2,?3,?4)",
                    rusqlite::params![
                        self.snapshot_id.to_string(),
                        relationship.source.to_string(),
                        relationship.target.to_string(),
                        relationship_kind_str(relationship.kind),
                    ],
                )
                .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        }

        self.save_method_overrides(members, relationships)
    }

    /// A subtype member overrides a supertype member of the same name (spec §6's
    /// `method_overrides` table). Compatibility is a simple signature-text comparison —
    /// there is no declared typechecker in this engine, so exact textual match after
    /// whitespace collapsing is the only compatibility signal available.
    fn save_method_overrides(&self, members: &[TypeMember], relationships: &[TypeRelationship]) -> Result<()> {
        for relationship in relationships {
            let super_members: Vec<&TypeMember> =
                members.iter().filter(|m| m.parent_type == relationship.target).collect();
            if super_members.is_empty() {
                continue;
            }
            for sub_member in members.iter().filter(|m| m.parent_type == relationship.source) {
                let Some(super_member) = super_members.iter().find(|m| m.name == sub_member.name) else {
                    continue;
                };
                let Some(function_id) = sub_member.function_id else { continue };
                let compatible = normalize_signature(&sub_member.signature_text)
                    == normalize_signature(&super_member.signature_text);
                self.tx
                    .execute(
                        "INSERT INTO method_overrides
                            (snapshot_id, source_function_id, target_type_id, target_member_name,
                             override_kind, is_compatible)
                         VALUES (?1,?2,?3,?4,?5,?6)",
                        rusqlite::params![
                            self.snapshot_id.to_string(),
                            function_id.to_string(),
                            relationship.target.to_string(),
                            sub_member.name,
                            relationship_kind_str(relationship.kind),
                            compatible,
                        ],
                    )
                    .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// A dangling edge (caller/callee/candidate id not present in `functions` for this
    /// snapshot) is a data integrity violation (spec §3, §7) and must never be committed.
    fn assert_no_dangling_edges(&self) -> Result<()> {
        let dangling_edge: Option<(String, String)> = self
            .tx
            .query_row(
                "SELECT c.caller_id, COALESCE(c.callee_id, '') FROM call_edges c
                 WHERE c.snapshot_id = ?1
                   AND (NOT EXISTS (SELECT 1 FROM functions f WHERE f.snapshot_id = c.snapshot_id AND f.id = c.caller_id)
                     OR (c.callee_id IS NOT NULL
                         AND NOT EXISTS (SELECT 1 FROM functions f WHERE f.snapshot_id = c.snapshot_id AND f.id = c.callee_id)))
                 LIMIT 1",
                rusqlite::params![self.snapshot_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        if let Some((caller_id, callee_id)) = dangling_edge {
            return Err(CodeGraphError::Integrity(format!(
                "call edge caller {caller_id} / callee {callee_id} not present in functions for snapshot {}",
                self.snapshot_id
            )));
        }

        let dangling_candidate: Option<String> = self
            .tx
            .query_row(
                "SELECT cc.candidate_function_id FROM call_edge_candidates cc
                 WHERE cc.snapshot_id = ?1
                   AND NOT EXISTS (SELECT 1 FROM functions f WHERE f.snapshot_id = cc.snapshot_id AND f.id = cc.candidate_function_id)
                 LIMIT 1",
                rusqlite::params![self.snapshot_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        if let Some(candidate_id) = dangling_candidate {
            return Err(CodeGraphError::Integrity(format!(
                "call edge candidate {candidate_id} not present in functions for snapshot {}",
                self.snapshot_id
            )));
        }

        Ok(())
    }

    /// Commits the transaction, making the snapshot visible to readers. `counts` is
    /// persisted alongside for `inspect`/`assess` to read without recomputing aggregates.
    pub fn commit(self, counts: SnapshotCounts) -> Result<SnapshotId> {
        self.assert_no_dangling_edges()?;
        self.tx
            .execute(
                "UPDATE snapshots SET committed = 1, function_count = ?2, edge_count = ?3,
                    type_count = ?4, member_count = ?5, relationship_count = ?6,
                    unresolved_count = ?7, skipped_file_count = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    self.snapshot_id.to_string(),
                    counts.functions,
                    counts.edges,
                    counts.types,
                    counts.members,
                    counts.relationships,
                    counts.unresolved,
                    counts.skipped_files,
                ],
            )
            .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        let snapshot_id = self.snapshot_id;
        self.tx.commit().map_err(|e| CodeGraphError::Storage(e.to_string()))?;
        Ok(snapshot_id)
    }

    /// Rolls back everything written under this snapshot id; nothing was ever visible to
    /// readers (`committed` never left `0`).
    pub fn abort(self) -> Result<()> {
        self.tx.rollback().map_err(|e| CodeGraphError::Storage(e.to_string()))
    }
}

trait OptionalString {
    fn optional_string(self) -> Result<Option<String>>;
}

impl OptionalString for rusqlite::Result<String> {
    fn optional_string(self) -> Result<Option<String>> {
        match self {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CodeGraphError::Storage(e.to_string())),
        }
    }
}

fn normalize_signature(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn function_kind_str(kind: codegraph_core::FunctionKind) -> &'static str {
    use codegraph_core::FunctionKind::*;
    match kind {
        FreeFunction => "free_function",
        Method => "method",
        Arrow => "arrow",
        FunctionExpression => "function_expression",
        Constructor => "constructor",
        Accessor => "accessor",
    }
}

fn access_modifier_str(modifier: codegraph_core::AccessModifier) -> &'static str {
    use codegraph_core::AccessModifier::*;
    match modifier {
        Public => "public",
        Private => "private",
        Protected => "protected",
    }
}

fn call_type_str(call_type: codegraph_core::CallType) -> &'static str {
    use codegraph_core::CallType::*;
    match call_type {
        Direct => "direct",
        Method => "method",
        Constructor => "constructor",
        Dynamic => "dynamic",
        Async => "async",
        External => "external",
        Virtual => "virtual",
    }
}

fn call_context_str(context: codegraph_core::CallContext) -> &'static str {
    use codegraph_core::CallContext::*;
    match context {
        Normal => "normal",
        Conditional => "conditional",
        Loop => "loop",
        Try => "try",
        Catch => "catch",
        Constructor => "constructor",
        Callback => "callback",
    }
}

fn type_kind_str(kind: codegraph_core::TypeKind) -> &'static str {
    use codegraph_core::TypeKind::*;
    match kind {
        Class => "class",
        Interface => "interface",
        TypeAlias => "type_alias",
        Enum => "enum",
        Namespace => "namespace",
    }
}

fn member_kind_str(kind: codegraph_core::MemberKind) -> &'static str {
    use codegraph_core::MemberKind::*;
    match kind {
        Method => "method",
        Getter => "getter",
        Setter => "setter",
        Property => "property",
        Constructor => "constructor",
        Index => "index",
        CallSignature => "call_signature",
    }
}

fn relationship_kind_str(kind: codegraph_core::RelationshipKind) -> &'static str {
    use codegraph_core::RelationshipKind::*;
    match kind {
        Extends => "extends",
        Implements => "implements",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{
        CallContext, CallType, ContentId, FunctionKind, Location, MemberKind, ResolutionLevel,
        SemanticId, Signature, TypeKind,
    };

    fn sample_function(id: u64, name: &str, file: &str) -> Function {
        Function {
            physical_id: FunctionId(id),
            semantic_id: SemanticId(id),
            content_id: ContentId(id),
            name: name.to_string(),
            location: Location::point(file, 1, 0),
            signature: Signature {
                parameters: vec![],
                return_type: "void".into(),
                is_async: false,
                is_generator: false,
            },
            context_path: vec![],
            kind: FunctionKind::FreeFunction,
            access_modifier: None,
            is_static: false,
            is_exported: true,
            metrics: Default::default(),
        }
    }

    #[test]
    fn commit_makes_snapshot_visible_and_preserves_edge_set() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let caller = sample_function(1, "a", "/a.ts");
        let callee = sample_function(2, "b", "/a.ts");
        let edge = CallEdge {
            id: CallEdge::compute_id(FunctionId(1), Some(FunctionId(2)), "b", "salt", 1, 0),
            caller: FunctionId(1),
            callee: Some(FunctionId(2)),
            callee_name: "b".into(),
            line: 1,
            column: 0,
            call_type: CallType::Direct,
            call_context: CallContext::Normal,
            is_async: false,
            is_chained: false,
            resolution_level: ResolutionLevel::LocalExact,
            confidence: 1.0,
            candidates: vec![],
            runtime_confirmed: false,
            external_namespace: None,
            external_property: None,
        };

        let pending = store
            .begin_snapshot(None, "/", "hash", GitMetadata::default())
            .unwrap();
        let snapshot_id = pending.snapshot_id();
        pending.save_functions(&[caller, callee]).unwrap();
        pending.save_edges(&[edge.clone()]).unwrap();
        pending.commit(SnapshotCounts::default()).unwrap();

        assert_eq!(store.latest_snapshot_id().unwrap(), Some(snapshot_id));
        let edges = store.edges_by_caller(snapshot_id, FunctionId(1)).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, edge.id);
        assert_eq!(
            store.query(
                "SELECT COUNT(*) as n FROM internal_call_edges WHERE snapshot_id = ?1",
                &[snapshot_id.to_string().as_str()]
            ).unwrap()[0]["n"],
            serde_json::json!(1)
        );
    }

    #[test]
    fn commit_rejects_dangling_callee() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let caller = sample_function(1, "a", "/a.ts");
        let edge = CallEdge {
            id: CallEdge::compute_id(FunctionId(1), Some(FunctionId(2)), "b", "salt", 1, 0),
            caller: FunctionId(1),
            callee: Some(FunctionId(2)), // never saved as a function
            callee_name: "b".into(),
            line: 1,
            column: 0,
            call_type: CallType::Direct,
            call_context: CallContext::Normal,
            is_async: false,
            is_chained: false,
            resolution_level: ResolutionLevel::LocalExact,
            confidence: 1.0,
            candidates: vec![],
            runtime_confirmed: false,
            external_namespace: None,
            external_property: None,
        };

        let pending = store
            .begin_snapshot(None, "/", "hash", GitMetadata::default())
            .unwrap();
        pending.save_functions(&[caller]).unwrap();
        pending.save_edges(&[edge]).unwrap();
        let result = pending.commit(SnapshotCounts::default());
        assert!(matches!(result, Err(CodeGraphError::Integrity(_))));
    }

    #[test]
    fn abort_leaves_no_committed_snapshot() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let pending = store
            .begin_snapshot(None, "/", "hash", GitMetadata::default())
            .unwrap();
        pending.save_functions(&[sample_function(1, "a", "/a.ts")]).unwrap();
        pending.abort().unwrap();

        assert_eq!(store.latest_snapshot_id().unwrap(), None);
    }

    #[test]
    fn interface_member_override_is_recorded() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let iface_id = TypeId(10);
        let class_id = TypeId(11);
        let types = vec![
            TypeDefinition {
                id: iface_id,
                name: "I".into(),
                kind: TypeKind::Interface,
                file_path: "/a.ts".into(),
                is_exported: true,
                is_generic: false,
                location: Location::point("/a.ts", 1, 0),
            },
            TypeDefinition {
                id: class_id,
                name: "A".into(),
                kind: TypeKind::Class,
                file_path: "/a.ts".into(),
                is_exported: true,
                is_generic: false,
                location: Location::point("/a.ts", 2, 0),
            },
        ];
        let members = vec![
            TypeMember {
                parent_type: iface_id,
                name: "m".into(),
                kind: MemberKind::Method,
                is_optional: false,
                is_readonly: false,
                is_static: false,
                is_abstract: false,
                function_id: None,
                signature_text: "m()".into(),
            },
            TypeMember {
                parent_type: class_id,
                name: "m".into(),
                kind: MemberKind::Method,
                is_optional: false,
                is_readonly: false,
                is_static: false,
                is_abstract: false,
                function_id: Some(FunctionId(99)),
                signature_text: "m()".into(),
            },
        ];
        let relationships = vec![TypeRelationship {
            source: class_id,
            target: iface_id,
            kind: codegraph_core::RelationshipKind::Implements,
        }];

        let pending = store
            .begin_snapshot(None, "/", "hash", GitMetadata::default())
            .unwrap();
        let snapshot_id = pending.snapshot_id();
        pending.save_type_system(&types, &members, &relationships).unwrap();
        pending.commit(SnapshotCounts::default()).unwrap();

        let rows = store
            .query(
                "SELECT is_compatible FROM method_overrides WHERE snapshot_id = ?1",
                &[snapshot_id.to_string().as_str()],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["is_compatible"], serde_json::json!(1));
    }
}
