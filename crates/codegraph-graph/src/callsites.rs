// ABOUTME: Project-wide call-site extraction: every `call_expression`/`new_expression`
// ABOUTME: becomes an `UnresolvedCall` with its tagged target, ready for Stage 1 (spec §4.3).
use codegraph_core::{CallContext, CallTarget, UnresolvedCall};
use codegraph_parser::project::{descendants_of_kind, Project};
use codegraph_parser::registry::FunctionRegistry;
use tree_sitter::Node;

pub fn collect_call_sites(project: &Project, registry: &FunctionRegistry) -> Vec<UnresolvedCall> {
    let mut out = Vec::new();
    for file in project.files() {
        let root = file.tree.root_node();
        for node in descendants_of_kind(root, "call_expression") {
            let (line, column) = file.line_index.line_column(node.start_byte());
            let Some(caller) = registry.function_at_line(&file.path, line) else {
                continue;
            };
            let Some(callee_node) = node.child_by_field_name("function") else {
                continue;
            };
            let Some(target) = classify_target(callee_node, &file.source) else {
                continue;
            };
            let target = wrap_await(node, target);
            out.push(UnresolvedCall {
                caller,
                target,
                line,
                column,
                call_context: call_context_of(node),
                is_async: is_awaited(node),
                is_chained: is_chained_call(callee_node),
                receiver_type_name: None,
            });
        }
        for node in descendants_of_kind(root, "new_expression") {
            let (line, column) = file.line_index.line_column(node.start_byte());
            let Some(caller) = registry.function_at_line(&file.path, line) else {
                continue;
            };
            let Some(ctor_node) = node.child_by_field_name("constructor") else {
                continue;
            };
            let Ok(type_name) = ctor_node.utf8_text(file.source.as_bytes()) else {
                continue;
            };
            out.push(UnresolvedCall {
                caller,
                target: CallTarget::New(type_name.to_string()),
                line,
                column,
                call_context: call_context_of(node),
                is_async: false,
                is_chained: false,
                receiver_type_name: None,
            });
        }
    }
    out
}

fn classify_target(callee: Node, source: &str) -> Option<CallTarget> {
    match callee.kind() {
        "identifier" => Some(CallTarget::LocalIdentifier(text(callee, source))),
        "member_expression" => {
            let receiver = callee.child_by_field_name("object")?;
            let name = callee.child_by_field_name("property")?;
            Some(CallTarget::PropertyAccess {
                receiver: text(receiver, source),
                name: text(name, source),
            })
        }
        "subscript_expression" => {
            let receiver = callee.child_by_field_name("object")?;
            let index = callee.child_by_field_name("index")?;
            Some(CallTarget::ElementAccess {
                receiver: text(receiver, source),
                expr: text(index, source),
            })
        }
        "parenthesized_expression" => {
            let mut cursor = callee.walk();
            if cursor.goto_first_child() {
                loop {
                    let child = cursor.node();
                    if child.is_named() {
                        return classify_target(child, source);
                    }
                    if !cursor.goto_next_sibling() {
                        break;
                    }
                }
            }
            None
        }
        _ => None,
    }
}

fn wrap_await(call_node: Node, target: CallTarget) -> CallTarget {
    if call_node.parent().map(|p| p.kind() == "await_expression").unwrap_or(false) {
        CallTarget::Await(Box::new(target))
    } else {
        target
    }
}

fn is_awaited(call_node: Node) -> bool {
    call_node.parent().map(|p| p.kind() == "await_expression").unwrap_or(false)
}

fn is_chained_call(callee: Node) -> bool {
    callee.kind() == "member_expression"
        && callee
            .child_by_field_name("object")
            .map(|o| o.kind() == "call_expression")
            .unwrap_or(false)
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
}

/// Walks up from a call site to the nearest enclosing control construct, stopping at the
/// first function boundary (the enclosing function's own context doesn't matter further out).
fn call_context_of(node: Node) -> CallContext {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "catch_clause" => return CallContext::Catch,
            "try_statement" => return CallContext::Try,
            "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                return CallContext::Loop
            }
            "if_statement" | "ternary_expression" | "switch_statement" => return CallContext::Conditional,
            "class_declaration" | "abstract_class_declaration" if is_constructor_ancestor(n) => {
                return CallContext::Constructor
            }
            "function_declaration"
            | "function_expression"
            | "generator_function_declaration"
            | "generator_function"
            | "arrow_function"
            | "method_definition" => return CallContext::Normal,
            _ => {}
        }
        current = n.parent();
    }
    CallContext::Normal
}

fn is_constructor_ancestor(_class_node: Node) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_parser::registry::collect;

    #[test]
    fn extracts_identifier_call_and_new_expression() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "function a() { const x = new Widget(); return b(x); }\nfunction b(w) { return 1; }\n",
        )
        .unwrap();
        let project = Project::load(dir.path(), &[], &[]).unwrap();
        let registry = collect(&project, "salt").unwrap();
        let calls = collect_call_sites(&project, &registry);

        assert!(calls.iter().any(|c| matches!(&c.target, CallTarget::LocalIdentifier(n) if n == "b")));
        assert!(calls.iter().any(|c| matches!(&c.target, CallTarget::New(n) if n == "Widget")));
    }

    #[test]
    fn property_access_call_captures_receiver_and_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "function a(svc) { return svc.run(); }\n",
        )
        .unwrap();
        let project = Project::load(dir.path(), &[], &[]).unwrap();
        let registry = collect(&project, "salt").unwrap();
        let calls = collect_call_sites(&project, &registry);
        assert!(calls.iter().any(|c| matches!(
            &c.target,
            CallTarget::PropertyAccess { receiver, name } if receiver == "svc" && name == "run"
        )));
    }
}
