// ABOUTME: Read-only query surface (spec §4.11 contract): functions_by_snapshot,
// ABOUTME: edges_by_caller, type_by_name, members_of, implementers_of, ad-hoc `query`.
use codegraph_core::{
    AccessModifier, CallContext, CallEdge, CallType, CodeGraphError, EdgeId, Function,
    FunctionId, FunctionKind, Location, MemberKind, Parameter, ResolutionLevel, Result,
    Signature, SnapshotId, TypeDefinition, TypeId, TypeKind, TypeMember,
};
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::str::FromStr;

fn parse_id(text: &str) -> u64 {
    u64::from_str_radix(text, 16).unwrap_or(0)
}

fn function_from_row(row: &Row) -> rusqlite::Result<Function> {
    let kind: String = row.get("kind")?;
    let access: Option<String> = row.get("access_modifier")?;
    let context_path_json: String = row.get("context_path")?;
    let id_text: String = row.get("id")?;
    let semantic_text: String = row.get("semantic_id")?;
    let content_text: String = row.get("content_id")?;

    Ok(Function {
        physical_id: FunctionId(parse_id(&id_text)),
        semantic_id: codegraph_core::SemanticId(parse_id(&semantic_text)),
        content_id: codegraph_core::ContentId(parse_id(&content_text)),
        name: row.get("name")?,
        location: Location {
            file_path: row.get("file_path")?,
            start_line: row.get("start_line")?,
            start_column: row.get("start_column")?,
            end_line: row.get("end_line")?,
            end_column: row.get("end_column")?,
        },
        signature: Signature {
            parameters: Vec::new(),
            return_type: row.get("return_type")?,
            is_async: row.get("is_async")?,
            is_generator: row.get("is_generator")?,
        },
        context_path: serde_json::from_str(&context_path_json).unwrap_or_default(),
        kind: function_kind_from_str(&kind),
        access_modifier: access.as_deref().map(access_modifier_from_str),
        is_static: row.get("is_static")?,
        is_exported: row.get("is_exported")?,
        metrics: codegraph_core::QualityMetrics {
            cyclomatic_complexity: row.get("cyclomatic_complexity")?,
            cognitive_complexity: row.get("cognitive_complexity")?,
            lines_of_code: row.get("lines_of_code")?,
            lines_of_comments: row.get("lines_of_comments")?,
            parameter_count: row.get("parameter_count")?,
            halstead_volume: row.get("halstead_volume")?,
            maintainability_index: row.get("maintainability_index")?,
        },
    })
}

fn function_kind_from_str(s: &str) -> FunctionKind {
    match s {
        "method" => FunctionKind::Method,
        "arrow" => FunctionKind::Arrow,
        "function_expression" => FunctionKind::FunctionExpression,
        "constructor" => FunctionKind::Constructor,
        "accessor" => FunctionKind::Accessor,
        _ => FunctionKind::FreeFunction,
    }
}

fn access_modifier_from_str(s: &str) -> AccessModifier {
    match s {
        "private" => AccessModifier::Private,
        "protected" => AccessModifier::Protected,
        _ => AccessModifier::Public,
    }
}

/// Every function in `snapshot_id`, parameters loaded from their child rows.
pub fn functions_by_snapshot(conn: &Connection, snapshot_id: SnapshotId) -> Result<Vec<Function>> {
    let mut stmt = conn
        .prepare("SELECT * FROM functions WHERE snapshot_id = ?1")
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    let snapshot_text = snapshot_id.to_string();
    let mut functions: Vec<Function> = stmt
        .query_map([&snapshot_text], function_from_row)
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?
        .collect::<rusqlite::Result<_>>()
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;

    for function in &mut functions {
        function.signature.parameters =
            parameters_of(conn, snapshot_id, function.physical_id)?;
    }
    Ok(functions)
}

fn parameters_of(conn: &Connection, snapshot_id: SnapshotId, function_id: FunctionId) -> Result<Vec<Parameter>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type_text, is_optional, is_rest, position FROM function_parameters
             WHERE snapshot_id = ?1 AND function_id = ?2 ORDER BY position",
        )
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![snapshot_id.to_string(), function_id.to_string()],
            |row| {
                Ok(Parameter {
                    name: row.get(0)?,
                    type_text: row.get(1)?,
                    is_optional: row.get(2)?,
                    is_rest: row.get(3)?,
                    position: row.get(4)?,
                })
            },
        )
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    rows.collect::<rusqlite::Result<_>>()
        .map_err(|e| CodeGraphError::Storage(e.to_string()))
}

fn call_type_from_str(s: &str) -> CallType {
    match s {
        "method" => CallType::Method,
        "constructor" => CallType::Constructor,
        "dynamic" => CallType::Dynamic,
        "async" => CallType::Async,
        "external" => CallType::External,
        "virtual" => CallType::Virtual,
        _ => CallType::Direct,
    }
}

fn call_context_from_str(s: &str) -> CallContext {
    match s {
        "conditional" => CallContext::Conditional,
        "loop" => CallContext::Loop,
        "try" => CallContext::Try,
        "catch" => CallContext::Catch,
        "constructor" => CallContext::Constructor,
        "callback" => CallContext::Callback,
        _ => CallContext::Normal,
    }
}

fn edge_from_row(conn: &Connection, row: &Row) -> rusqlite::Result<CallEdge> {
    let id_text: String = row.get("id")?;
    let snapshot_text: String = row.get("snapshot_id")?;
    let caller_text: String = row.get("caller_id")?;
    let callee_text: Option<String> = row.get("callee_id")?;
    let resolution: String = row.get("resolution_level")?;
    let call_type: String = row.get("call_type")?;
    let call_context: String = row.get("call_context")?;

    let mut candidates_stmt = conn.prepare(
        "SELECT candidate_function_id FROM call_edge_candidates
         WHERE snapshot_id = ?1 AND edge_id = ?2 ORDER BY position",
    )?;
    let candidates = candidates_stmt
        .query_map(rusqlite::params![snapshot_text, id_text], |r| {
            let text: String = r.get(0)?;
            Ok(FunctionId(parse_id(&text)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(CallEdge {
        id: EdgeId(parse_id(&id_text)),
        caller: FunctionId(parse_id(&caller_text)),
        callee: callee_text.map(|t| FunctionId(parse_id(&t))),
        callee_name: row.get("callee_name")?,
        line: row.get("line")?,
        column: row.get("column_")?,
        call_type: call_type_from_str(&call_type),
        call_context: call_context_from_str(&call_context),
        is_async: row.get("is_async")?,
        is_chained: row.get("is_chained")?,
        resolution_level: ResolutionLevel::from_str(&resolution).unwrap_or(ResolutionLevel::LocalExact),
        confidence: row.get("confidence")?,
        candidates,
        runtime_confirmed: row.get("runtime_confirmed")?,
        external_namespace: row.get("external_namespace")?,
        external_property: row.get("external_property")?,
    })
}

/// `true` if `function_id` has a row in `functions` for `snapshot_id`.
fn function_known(conn: &Connection, snapshot_id: SnapshotId, function_id: FunctionId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM functions WHERE snapshot_id = ?1 AND id = ?2)",
        rusqlite::params![snapshot_id.to_string(), function_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| CodeGraphError::Storage(e.to_string()))
}

/// Rejects a dangling edge on load (spec §3, §7): every non-null `caller`/`callee`/
/// candidate must resolve to a function actually present in this snapshot. Fatal for the
/// affected query — callers must not get a graph with edges pointing at functions that
/// don't exist.
fn assert_edge_integrity(conn: &Connection, snapshot_id: SnapshotId, edge: &CallEdge) -> Result<()> {
    if !function_known(conn, snapshot_id, edge.caller)? {
        return Err(CodeGraphError::Integrity(format!(
            "edge {} caller {} not present in functions for snapshot {snapshot_id}",
            edge.id, edge.caller
        )));
    }
    if let Some(callee) = edge.callee {
        if !function_known(conn, snapshot_id, callee)? {
            return Err(CodeGraphError::Integrity(format!(
                "edge {} callee {} not present in functions for snapshot {snapshot_id}",
                edge.id, callee
            )));
        }
    }
    for candidate in &edge.candidates {
        if !function_known(conn, snapshot_id, *candidate)? {
            return Err(CodeGraphError::Integrity(format!(
                "edge {} candidate {} not present in functions for snapshot {snapshot_id}",
                edge.id, candidate
            )));
        }
    }
    Ok(())
}

/// Every outgoing edge whose caller is `caller_id` within `snapshot_id`.
pub fn edges_by_caller(conn: &Connection, snapshot_id: SnapshotId, caller_id: FunctionId) -> Result<Vec<CallEdge>> {
    let mut stmt = conn
        .prepare("SELECT * FROM call_edges WHERE snapshot_id = ?1 AND caller_id = ?2")
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![snapshot_id.to_string(), caller_id.to_string()],
            |row| edge_from_row(conn, row),
        )
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    let edges: Vec<CallEdge> = rows
        .collect::<rusqlite::Result<_>>()
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    for edge in &edges {
        assert_edge_integrity(conn, snapshot_id, edge)?;
    }
    Ok(edges)
}

fn type_kind_from_str(s: &str) -> TypeKind {
    match s {
        "interface" => TypeKind::Interface,
        "type_alias" => TypeKind::TypeAlias,
        "enum" => TypeKind::Enum,
        "namespace" => TypeKind::Namespace,
        _ => TypeKind::Class,
    }
}

fn type_definition_from_row(row: &Row) -> rusqlite::Result<TypeDefinition> {
    let id_text: String = row.get("id")?;
    let kind: String = row.get("kind")?;
    Ok(TypeDefinition {
        id: TypeId(parse_id(&id_text)),
        name: row.get("name")?,
        kind: type_kind_from_str(&kind),
        file_path: row.get("file_path")?,
        is_exported: row.get("is_exported")?,
        is_generic: row.get("is_generic")?,
        location: Location {
            file_path: row.get("file_path")?,
            start_line: row.get("start_line")?,
            start_column: row.get("start_column")?,
            end_line: row.get("end_line")?,
            end_column: row.get("end_column")?,
        },
    })
}

/// Looks up a type definition by name within `snapshot_id`. Names are unique per snapshot
/// by construction (the type graph builder keys `by_name` on the same assumption).
pub fn type_by_name(conn: &Connection, snapshot_id: SnapshotId, name: &str) -> Result<Option<TypeDefinition>> {
    conn.query_row(
        "SELECT * FROM type_definitions WHERE snapshot_id = ?1 AND name = ?2 LIMIT 1",
        rusqlite::params![snapshot_id.to_string(), name],
        type_definition_from_row,
    )
    .optional()
    .map_err(|e| CodeGraphError::Storage(e.to_string()))
}

pub fn type_by_id(conn: &Connection, snapshot_id: SnapshotId, type_id: TypeId) -> Result<Option<TypeDefinition>> {
    conn.query_row(
        "SELECT * FROM type_definitions WHERE snapshot_id = ?1 AND id = ?2 LIMIT 1",
        rusqlite::params![snapshot_id.to_string(), type_id.to_string()],
        type_definition_from_row,
    )
    .optional()
    .map_err(|e| CodeGraphError::Storage(e.to_string()))
}

fn member_kind_from_str(s: &str) -> MemberKind {
    match s {
        "getter" => MemberKind::Getter,
        "setter" => MemberKind::Setter,
        "property" => MemberKind::Property,
        "constructor" => MemberKind::Constructor,
        "index" => MemberKind::Index,
        "call_signature" => MemberKind::CallSignature,
        _ => MemberKind::Method,
    }
}

/// All members declared directly on `type_id` (does not walk `extends`; callers needing
/// the full inherited surface combine this with `type_relationships`).
pub fn members_of(conn: &Connection, snapshot_id: SnapshotId, type_id: TypeId) -> Result<Vec<TypeMember>> {
    let mut stmt = conn
        .prepare("SELECT * FROM type_members WHERE snapshot_id = ?1 AND parent_type_id = ?2")
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![snapshot_id.to_string(), type_id.to_string()],
            |row| {
                let kind: String = row.get("kind")?;
                let function_id: Option<String> = row.get("function_id")?;
                Ok(TypeMember {
                    parent_type: type_id,
                    name: row.get("name")?,
                    kind: member_kind_from_str(&kind),
                    is_optional: row.get("is_optional")?,
                    is_readonly: row.get("is_readonly")?,
                    is_static: row.get("is_static")?,
                    is_abstract: row.get("is_abstract")?,
                    function_id: function_id.map(|t| FunctionId(parse_id(&t))),
                    signature_text: row.get("signature_text")?,
                })
            },
        )
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    rows.collect::<rusqlite::Result<_>>()
        .map_err(|e| CodeGraphError::Storage(e.to_string()))
}

/// Types that directly `extends`/`implements` `type_id` (its direct subtypes).
pub fn implementers_of(conn: &Connection, snapshot_id: SnapshotId, type_id: TypeId) -> Result<Vec<TypeId>> {
    let mut stmt = conn
        .prepare(
            "SELECT source_type_id FROM type_relationships WHERE snapshot_id = ?1 AND target_type_id = ?2",
        )
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![snapshot_id.to_string(), type_id.to_string()],
            |row| {
                let text: String = row.get(0)?;
                Ok(TypeId(parse_id(&text)))
            },
        )
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    rows.collect::<rusqlite::Result<_>>()
        .map_err(|e| CodeGraphError::Storage(e.to_string()))
}

/// Ad-hoc SQL for external tooling; rows come back as JSON objects keyed by column name.
pub fn query(conn: &Connection, sql: &str, params: &[&str]) -> Result<Vec<Value>> {
    let mut stmt = conn.prepare(sql).map_err(|e| CodeGraphError::Storage(e.to_string()))?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| *p as &dyn rusqlite::ToSql).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut map = Map::new();
            for (idx, column) in column_names.iter().enumerate() {
                let value: Value = match row.get_ref(idx)? {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(i) => Value::from(i),
                    rusqlite::types::ValueRef::Real(f) => {
                        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
                    }
                    rusqlite::types::ValueRef::Text(t) => {
                        Value::String(String::from_utf8_lossy(t).into_owned())
                    }
                    rusqlite::types::ValueRef::Blob(_) => Value::Null,
                };
                map.insert(column.clone(), value);
            }
            Ok(Value::Object(map))
        })
        .map_err(|e| CodeGraphError::Storage(e.to_string()))?;

    rows.collect::<rusqlite::Result<_>>()
        .map_err(|e| CodeGraphError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    /// Simulates a snapshot corrupted after the fact (e.g. by a tool writing to the
    /// database file directly): `edges_by_caller` must reject it rather than hand back an
    /// edge whose callee doesn't exist.
    #[test]
    fn edges_by_caller_rejects_dangling_callee() {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::run_migrations(&mut conn).unwrap();

        let snapshot_id = SnapshotId::new_v4();
        conn.execute(
            "INSERT INTO snapshots (id, created_at, source_root, config_hash, committed)
             VALUES (?1, '2024-01-01T00:00:00Z', '/', 'hash', 1)",
            rusqlite::params![snapshot_id.to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO functions
                (id, snapshot_id, semantic_id, content_id, name, file_path, start_line,
                 start_column, end_line, end_column, context_path, kind, is_static,
                 is_exported, return_type, is_async, is_generator, cyclomatic_complexity,
                 cognitive_complexity, lines_of_code, lines_of_comments, parameter_count,
                 halstead_volume, maintainability_index)
             VALUES ('0000000000000001', ?1, '1', '1', 'a', '/a.ts', 1, 0, 1, 0, '[]',
                     'free_function', 0, 1, 'void', 0, 0, 0, 0, 1, 0, 0, 0.0, 100.0)",
            rusqlite::params![snapshot_id.to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO call_edges
                (id, snapshot_id, caller_id, callee_id, callee_name, line, column_,
                 call_type, call_context, is_async, is_chained, resolution_level,
                 confidence, runtime_confirmed)
             VALUES ('0000000000000099', ?1, '0000000000000001', '00000000000000ff', 'b',
                     1, 0, 'direct', 'normal', 0, 0, 'local_exact', 1.0, 0)",
            rusqlite::params![snapshot_id.to_string()],
        )
        .unwrap();

        let result = edges_by_caller(&conn, snapshot_id, FunctionId(1));
        assert!(matches!(result, Err(CodeGraphError::Integrity(_))));
    }
}
