// ABOUTME: Tagged-variant model of a call site's target (spec §9: "Dynamic method
// ABOUTME: resolution -> tagged variants"). Unknown shapes forward untouched to later stages.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallTarget {
    /// A bare identifier call: `foo()`.
    LocalIdentifier(String),
    /// A property access call: `receiver.name()`, e.g. `this.m()` or `svc.run()`.
    PropertyAccess { receiver: String, name: String },
    /// An indexed call: `receiver[expr]()`.
    ElementAccess { receiver: String, expr: String },
    /// A constructor call: `new Type(...)`.
    New(String),
    /// An awaited inner call: `await inner()`.
    Await(Box<CallTarget>),
}

impl CallTarget {
    /// Strips `Await` wrappers to get at the underlying call shape; stages that don't
    /// care about `await` (all but the async/runtime-sensitive ones) use this.
    pub fn unwrap_await(&self) -> &CallTarget {
        match self {
            CallTarget::Await(inner) => inner.unwrap_await(),
            other => other,
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, CallTarget::Await(_))
    }
}

/// A call site still awaiting resolution, forwarded from one stage to the next along
/// with enough context for the next stage to act on it.
#[derive(Debug, Clone)]
pub struct UnresolvedCall {
    pub caller: crate::ids::FunctionId,
    pub target: CallTarget,
    pub line: u32,
    pub column: u32,
    pub call_context: crate::edge::CallContext,
    pub is_async: bool,
    pub is_chained: bool,
    /// Populated once a prior stage has inferred the receiver's declared type name
    /// (e.g. from a parameter's type annotation), consumed by CHA.
    pub receiver_type_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_await_peels_nested_wrappers() {
        let target = CallTarget::Await(Box::new(CallTarget::Await(Box::new(
            CallTarget::LocalIdentifier("f".into()),
        ))));
        assert_eq!(target.unwrap_await(), &CallTarget::LocalIdentifier("f".into()));
    }
}
