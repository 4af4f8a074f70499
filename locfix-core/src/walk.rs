//! Pre-order walk over a parser AST.
//!
//! Node types come from the closed [`NodeKind`] table; an unrecognised
//! `type` is an error rather than a silently skipped subtree. A node with no
//! `type` at all is an attribute.

use serde_json::Value;

use crate::ast::{Arity, Node, NodeKind};
use crate::source::{LocationDefaults, SourceError, kind_of};

fn kind_for(value: &Value) -> Result<NodeKind, SourceError> {
    match value.get("type") {
        None | Some(Value::Null) => Ok(NodeKind::Attr),
        Some(Value::String(name)) => name
            .parse::<NodeKind>()
            .map_err(SourceError::UnknownNodeType),
        Some(other) => Err(SourceError::UnknownNodeType(other.to_string())),
    }
}

/// Visit every node of `root` in pre-order, children in field order.
pub fn walk(
    root: &Value,
    file: &str,
    mut visit: impl FnMut(NodeKind, &Value),
) -> Result<(), SourceError> {
    let mut stack = vec![root];

    while let Some(value) = stack.pop() {
        let kind = kind_for(value)?;
        visit(kind, value);

        // Pushed in reverse so the first child is popped first.
        let mut children = Vec::new();
        for field in kind.children() {
            let Some(sub) = value.get(field.name) else {
                continue;
            };
            if sub.is_null() || sub == &Value::Bool(false) {
                continue;
            }
            match field.arity {
                Arity::One => children.push(sub),
                Arity::Many => {
                    let items = sub.as_array().ok_or_else(|| SourceError::Shape {
                        file: file.to_string(),
                        expected: "an array of child nodes",
                        found: kind_of(sub).to_string(),
                    })?;
                    children.extend(items);
                }
            }
        }
        stack.extend(children.into_iter().rev());
    }

    Ok(())
}

/// Flatten `root` into nodes with their reported spans.
pub fn flatten(
    root: &Value,
    file: &str,
    defaults: &LocationDefaults,
) -> Result<Vec<Node>, SourceError> {
    let mut nodes = Vec::new();
    walk(root, file, |_, value| {
        let kind = value.get("type").and_then(Value::as_str).map(str::to_string);
        nodes.push(Node::new(kind, defaults.span_of(value, file), value.clone()));
    })?;
    Ok(nodes)
}
