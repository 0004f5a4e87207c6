// ABOUTME: Type graph entities: Type Definition, Type Member, Type Relationship.
use crate::ids::{FunctionId, TypeId};
use crate::location::Location;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    TypeAlias,
    Enum,
    Namespace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
    pub file_path: String,
    pub is_exported: bool,
    pub is_generic: bool,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Method,
    Getter,
    Setter,
    Property,
    Constructor,
    Index,
    CallSignature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMember {
    pub parent_type: TypeId,
    pub name: String,
    pub kind: MemberKind,
    pub is_optional: bool,
    pub is_readonly: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    /// Set when the member's body is a known Function in the registry.
    pub function_id: Option<FunctionId>,
    pub signature_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    Extends,
    Implements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRelationship {
    pub source: TypeId,
    pub target: TypeId,
    pub kind: RelationshipKind,
}

impl TypeRelationship {
    /// `implements` sources are classes and targets are interfaces; `extends` is
    /// class->class or interface->interface. The type-kind lookup is supplied by the
    /// caller (the type graph), since a bare relationship doesn't carry type kinds.
    pub fn is_well_formed(&self, source_kind: TypeKind, target_kind: TypeKind) -> bool {
        match self.kind {
            RelationshipKind::Implements => {
                source_kind == TypeKind::Class && target_kind == TypeKind::Interface
            }
            RelationshipKind::Extends => {
                (source_kind == TypeKind::Class && target_kind == TypeKind::Class)
                    || (source_kind == TypeKind::Interface && target_kind == TypeKind::Interface)
            }
        }
    }
}
