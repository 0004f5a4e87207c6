// ABOUTME: The type graph (spec §4.5 step 1): classes/interfaces/aliases/enums/namespaces,
// ABOUTME: their members, and `extends`/`implements` relationships, with a cycle-safe
// ABOUTME: subtype closure used by CHA.
use codegraph_core::{
    CodeGraphError, FunctionId, MemberKind, RelationshipKind, TypeDefinition, TypeId, TypeKind,
    TypeMember, TypeRelationship,
};
use codegraph_parser::project::{descendants_of_kind, Project};
use codegraph_parser::registry::FunctionRegistry;
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

#[derive(Debug, Default)]
pub struct TypeGraph {
    pub types: HashMap<TypeId, TypeDefinition>,
    pub members: HashMap<TypeId, Vec<TypeMember>>,
    pub relationships: Vec<TypeRelationship>,
    pub by_name: HashMap<String, Vec<TypeId>>,
    /// `extends`/`implements` edges, source -> targets (this type's supertypes).
    supertypes: HashMap<TypeId, Vec<TypeId>>,
    /// Reverse of `supertypes`: target -> sources (this type's direct subtypes).
    subtypes: HashMap<TypeId, Vec<TypeId>>,
    pub cycle_warnings: Vec<CodeGraphError>,
}

impl TypeGraph {
    pub fn insert_type(&mut self, def: TypeDefinition) {
        self.by_name.entry(def.name.clone()).or_default().push(def.id);
        self.types.insert(def.id, def);
    }

    pub fn insert_member(&mut self, type_id: TypeId, member: TypeMember) {
        self.members.entry(type_id).or_default().push(member);
    }

    pub fn insert_relationship(&mut self, rel: TypeRelationship) {
        self.supertypes.entry(rel.source).or_default().push(rel.target);
        self.subtypes.entry(rel.target).or_default().push(rel.source);
        self.relationships.push(rel);
    }

    pub fn type_by_name(&self, name: &str) -> Option<&TypeDefinition> {
        self.by_name.get(name)?.first().and_then(|id| self.types.get(id))
    }

    /// The transitive closure of subtypes of `root` under `extends`∪`implements`
    /// (spec §4.5 step 3), including `root` itself. Cycles break at first revisit.
    pub fn subtype_closure(&mut self, root: TypeId) -> HashSet<TypeId> {
        let mut closure = HashSet::new();
        let mut stack = vec![root];
        let mut visiting = HashSet::new();
        while let Some(current) = stack.pop() {
            if !closure.insert(current) {
                continue;
            }
            if !visiting.insert(current) {
                self.cycle_warnings.push(CodeGraphError::TypeGraphCycle(
                    self.types.get(&current).map(|t| t.name.clone()).unwrap_or_default(),
                ));
                continue;
            }
            if let Some(children) = self.subtypes.get(&current) {
                stack.extend(children.iter().copied());
            }
        }
        closure
    }

    /// Walks `type_id`'s `extends` chain (classes: single parent; bounded to avoid runaway
    /// cycles) looking for a member named `name`, most-derived first.
    pub fn resolve_member(&self, type_id: TypeId, name: &str, max_depth: usize) -> Option<&TypeMember> {
        let mut current = Some(type_id);
        let mut visited = HashSet::new();
        let mut depth = 0;
        while let Some(id) = current {
            if depth > max_depth || !visited.insert(id) {
                break;
            }
            if let Some(members) = self.members.get(&id) {
                if let Some(member) = members.iter().find(|m| m.name == name) {
                    return Some(member);
                }
            }
            current = self
                .supertypes
                .get(&id)
                .and_then(|parents| parents.iter().find(|p| self.type_kind_of(**p) == Some(TypeKind::Class)))
                .copied();
            depth += 1;
        }
        None
    }

    fn type_kind_of(&self, id: TypeId) -> Option<TypeKind> {
        self.types.get(&id).map(|t| t.kind)
    }
}

#[derive(Debug, Clone)]
pub struct InstantiationEvent {
    pub type_name: String,
    pub originator: Option<FunctionId>,
}

/// Walks every file in the project for class/interface/type-alias/enum/namespace
/// declarations plus their members and heritage clauses (spec §4.5 step 1).
pub fn build_type_graph(project: &Project, registry: &FunctionRegistry, salt: &str) -> TypeGraph {
    let mut graph = TypeGraph::default();
    let mut pending_relationships: Vec<(TypeId, Vec<String>, Vec<String>)> = Vec::new();

    for file in project.files() {
        for node in descendants_of_kind(file.tree.root_node(), "class_declaration")
            .into_iter()
            .chain(descendants_of_kind(file.tree.root_node(), "abstract_class_declaration"))
        {
            collect_class(&mut graph, &mut pending_relationships, node, &file.path, &file.source, registry, salt);
        }
        for node in descendants_of_kind(file.tree.root_node(), "interface_declaration") {
            collect_interface(&mut graph, &mut pending_relationships, node, &file.path, &file.source, salt);
        }
        for node in descendants_of_kind(file.tree.root_node(), "type_alias_declaration") {
            collect_simple(&mut graph, node, &file.path, &file.source, TypeKind::TypeAlias, salt);
        }
        for node in descendants_of_kind(file.tree.root_node(), "enum_declaration") {
            collect_simple(&mut graph, node, &file.path, &file.source, TypeKind::Enum, salt);
        }
        for node in descendants_of_kind(file.tree.root_node(), "internal_module") {
            collect_simple(&mut graph, node, &file.path, &file.source, TypeKind::Namespace, salt);
        }
    }

    for (source_id, extends_names, implements_names) in pending_relationships {
        for name in extends_names {
            if let Some(target) = graph.type_by_name(&name).map(|t| t.id) {
                graph.insert_relationship(TypeRelationship {
                    source: source_id,
                    target,
                    kind: RelationshipKind::Extends,
                });
            }
        }
        for name in implements_names {
            if let Some(target) = graph.type_by_name(&name).map(|t| t.id) {
                graph.insert_relationship(TypeRelationship {
                    source: source_id,
                    target,
                    kind: RelationshipKind::Implements,
                });
            }
        }
    }

    graph
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
}

fn type_id_for(salt: &str, file: &str, node: Node) -> TypeId {
    TypeId::from_parts(&[salt, file, &node.start_byte().to_string()])
}

fn location_of(file: &str, node: Node, source: &str) -> codegraph_core::Location {
    let index = codegraph_core::LineIndex::new(source);
    let (start_line, start_column) = index.line_column(node.start_byte());
    let (end_line, end_column) = index.line_column(node.end_byte());
    codegraph_core::Location {
        file_path: file.to_string(),
        start_line,
        start_column,
        end_line,
        end_column,
    }
}

fn is_exported(node: Node) -> bool {
    node.parent().map(|p| p.kind() == "export_statement").unwrap_or(false)
}

fn collect_simple(graph: &mut TypeGraph, node: Node, file: &str, source: &str, kind: TypeKind, salt: &str) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let id = type_id_for(salt, file, node);
    graph.insert_type(TypeDefinition {
        id,
        name: text(name_node, source),
        kind,
        file_path: file.to_string(),
        is_exported: is_exported(node),
        is_generic: node.child_by_field_name("type_parameters").is_some(),
        location: location_of(file, node, source),
    });
}

fn heritage_names(node: Node, source: &str, field: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.kind() == "class_heritage" || child.kind() == "extends_type_clause" || child.kind() == "implements_clause" {
                let mut inner = child.walk();
                if inner.goto_first_child() {
                    loop {
                        let clause = inner.node();
                        let is_implements = clause.kind() == "implements_clause";
                        let is_extends = clause.kind() == "extends_clause" || field == "extends" && clause.kind() == "identifier";
                        if (field == "implements" && is_implements) || (field == "extends" && (is_extends || clause.kind() == "type_identifier")) {
                            for name_node in descendants_of_kind(clause, "type_identifier") {
                                names.push(text(name_node, source));
                            }
                            for name_node in descendants_of_kind(clause, "identifier") {
                                names.push(text(name_node, source));
                            }
                        }
                        if !inner.goto_next_sibling() {
                            break;
                        }
                    }
                }
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    names.sort();
    names.dedup();
    names
}

fn collect_class(
    graph: &mut TypeGraph,
    pending: &mut Vec<(TypeId, Vec<String>, Vec<String>)>,
    node: Node,
    file: &str,
    source: &str,
    registry: &FunctionRegistry,
    salt: &str,
) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let class_name = text(name_node, source);
    let id = type_id_for(salt, file, node);
    graph.insert_type(TypeDefinition {
        id,
        name: class_name.clone(),
        kind: TypeKind::Class,
        file_path: file.to_string(),
        is_exported: is_exported(node),
        is_generic: node.child_by_field_name("type_parameters").is_some(),
        location: location_of(file, node, source),
    });

    if let Some(body) = node.child_by_field_name("body") {
        for member_node in descendants_of_kind(body, "method_definition") {
            add_member(graph, id, member_node, file, source, registry);
        }
        for member_node in descendants_of_kind(body, "public_field_definition") {
            add_property(graph, id, member_node, source);
        }
    }

    pending.push((id, heritage_names(node, source, "extends"), heritage_names(node, source, "implements")));
}

fn collect_interface(
    graph: &mut TypeGraph,
    pending: &mut Vec<(TypeId, Vec<String>, Vec<String>)>,
    node: Node,
    file: &str,
    source: &str,
    salt: &str,
) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let id = type_id_for(salt, file, node);
    graph.insert_type(TypeDefinition {
        id,
        name: text(name_node, source),
        kind: TypeKind::Interface,
        file_path: file.to_string(),
        is_exported: is_exported(node),
        is_generic: node.child_by_field_name("type_parameters").is_some(),
        location: location_of(file, node, source),
    });

    if let Some(body) = node.child_by_field_name("body") {
        for sig in descendants_of_kind(body, "method_signature") {
            if let Some(name_node) = sig.child_by_field_name("name") {
                graph.insert_member(
                    id,
                    TypeMember {
                        parent_type: id,
                        name: text(name_node, source),
                        kind: MemberKind::Method,
                        is_optional: sig.child_by_field_name("optional").is_some(),
                        is_readonly: false,
                        is_static: false,
                        is_abstract: false,
                        function_id: None,
                        signature_text: text(sig, source),
                    },
                );
            }
        }
    }

    pending.push((id, heritage_names(node, source, "extends"), Vec::new()));
}

fn add_member(graph: &mut TypeGraph, type_id: TypeId, node: Node, file: &str, source: &str, registry: &FunctionRegistry) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source);
    let is_get = super_has_token(node, "get");
    let is_set = super_has_token(node, "set");
    let kind = if name == "constructor" {
        MemberKind::Constructor
    } else if is_get {
        MemberKind::Getter
    } else if is_set {
        MemberKind::Setter
    } else {
        MemberKind::Method
    };

    let index = codegraph_core::LineIndex::new(source);
    let (line, _) = index.line_column(node.start_byte());
    let function_id = registry.function_at_line(file, line);

    graph.insert_member(
        type_id,
        TypeMember {
            parent_type: type_id,
            name,
            kind,
            is_optional: false,
            is_readonly: false,
            is_static: super_has_token(node, "static"),
            is_abstract: super_has_token(node, "abstract"),
            function_id,
            signature_text: text(node, source),
        },
    );
}

fn add_property(graph: &mut TypeGraph, type_id: TypeId, node: Node, source: &str) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    graph.insert_member(
        type_id,
        TypeMember {
            parent_type: type_id,
            name: text(name_node, source),
            kind: MemberKind::Property,
            is_optional: node.child_by_field_name("optional").is_some(),
            is_readonly: super_has_token(node, "readonly"),
            is_static: super_has_token(node, "static"),
            is_abstract: super_has_token(node, "abstract"),
            function_id: None,
            signature_text: text(node, source),
        },
    );
}

fn super_has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            if cursor.node().kind() == token {
                return true;
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    false
}

/// Project-wide scan for `new T(...)` expressions (spec §4.5 step 2), independent of
/// whether the call resolved locally/via import — RTA needs every instantiation site.
pub fn collect_instantiations(project: &Project, registry: &FunctionRegistry) -> Vec<InstantiationEvent> {
    let mut events = Vec::new();
    for file in project.files() {
        let index = &file.line_index;
        for node in descendants_of_kind(file.tree.root_node(), "new_expression") {
            let Some(ctor) = node.child_by_field_name("constructor") else { continue };
            let Ok(type_name) = ctor.utf8_text(file.source.as_bytes()) else { continue };
            let (line, _) = index.line_column(node.start_byte());
            let originator = registry.function_at_line(&file.path, line);
            events.push(InstantiationEvent {
                type_name: type_name.to_string(),
                originator,
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::RelationshipKind;

    #[test]
    fn interface_with_two_implementers_builds_subtype_closure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "interface I { m(): void }\nclass A implements I { m() { return 1; } }\nclass B implements I { m() { return 2; } }\n",
        )
        .unwrap();
        let project = Project::load(dir.path(), &[], &[]).unwrap();
        let registry = codegraph_parser::registry::collect(&project, "salt").unwrap();
        let mut graph = build_type_graph(&project, &registry, "salt");

        let i = graph.type_by_name("I").unwrap().id;
        let closure = graph.subtype_closure(i);
        assert_eq!(closure.len(), 3); // I, A, B

        let implements_edges: Vec<_> = graph
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Implements)
            .collect();
        assert_eq!(implements_edges.len(), 2);
    }
}
