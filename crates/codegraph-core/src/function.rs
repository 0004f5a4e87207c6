// ABOUTME: The Function entity: identity triple, location, signature, context and metrics.
use crate::ids::{ContentId, FunctionId, SemanticId};
use crate::location::Location;
use crate::metrics::QualityMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    FreeFunction,
    Method,
    Arrow,
    FunctionExpression,
    Constructor,
    Accessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessModifier {
    Public,
    Private,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_text: String,
    pub is_optional: bool,
    pub is_rest: bool,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub parameters: Vec<Parameter>,
    pub return_type: String,
    pub is_async: bool,
    pub is_generator: bool,
}

/// A single extracted function-like declaration, the primary entity of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub physical_id: FunctionId,
    pub semantic_id: SemanticId,
    pub content_id: ContentId,
    pub name: String,
    pub location: Location,
    pub signature: Signature,
    /// Enclosing class/namespace chain, outermost first (e.g. `["Outer", "Inner"]`).
    pub context_path: Vec<String>,
    pub kind: FunctionKind,
    pub access_modifier: Option<AccessModifier>,
    pub is_static: bool,
    pub is_exported: bool,
    pub metrics: QualityMetrics,
}

impl Function {
    /// The qualified name used for semantic-id hashing and overload-tolerant lookup:
    /// the context path joined with the function's own name.
    pub fn qualified_name(&self) -> String {
        if self.context_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.context_path.join("."), self.name)
        }
    }

    /// A coarse shape used in the semantic-id hash so overload resolution by arity and
    /// rest/optional markers (not exact type text, which reformatting can perturb) is
    /// what determines semantic identity.
    pub fn parameter_shape(&self) -> String {
        self.signature
            .parameters
            .iter()
            .map(|p| {
                format!(
                    "{}{}",
                    if p.is_rest { "..." } else if p.is_optional { "?" } else { "" },
                    p.position
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// A coarse bucket for the return type (`void`, `Promise`, `other`) — used in the
    /// semantic id so return-type reformatting (e.g. `string | null` -> `null | string`)
    /// doesn't change identity, while actually-different categories do.
    pub fn return_type_category(&self) -> &'static str {
        let rt = self.signature.return_type.trim();
        if rt.is_empty() || rt == "void" {
            "void"
        } else if rt.starts_with("Promise") {
            "promise"
        } else {
            "other"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;

    fn sample() -> Function {
        Function {
            physical_id: FunctionId(1),
            semantic_id: SemanticId(2),
            content_id: ContentId(3),
            name: "doThing".into(),
            location: Location::point("/src/a.ts", 1, 0),
            signature: Signature {
                parameters: vec![],
                return_type: "void".into(),
                is_async: false,
                is_generator: false,
            },
            context_path: vec!["Widget".into()],
            kind: FunctionKind::Method,
            access_modifier: None,
            is_static: false,
            is_exported: true,
            metrics: QualityMetrics::default(),
        }
    }

    #[test]
    fn qualified_name_joins_context_path() {
        assert_eq!(sample().qualified_name(), "Widget.doThing");
    }

    #[test]
    fn return_type_category_buckets_promise() {
        let mut f = sample();
        f.signature.return_type = "Promise<void>".into();
        assert_eq!(f.return_type_category(), "promise");
    }
}
