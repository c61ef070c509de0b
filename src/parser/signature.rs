//! Best-effort rendering of signatures and docstrings. Every function here is total: a
//! construct it does not understand degrades to its source text or to `None`.

use tree_sitter::Node;

use super::{named_children, node_text};

/// Collapse every whitespace run (including newlines) to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn field_text(node: Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| normalize(node_text(n, source)))
}

/// Render one entry of a `parameters` / `lambda_parameters` list.
fn render_parameter(param: Node, source: &[u8]) -> Option<String> {
    let rendered = match param.kind() {
        "comment" => return None,
        "keyword_separator" => "*".to_owned(),
        "positional_separator" => "/".to_owned(),
        "typed_parameter" => {
            let name = named_children(param)
                .into_iter()
                .find(|c| c.kind() != "type")
                .map(|c| normalize(node_text(c, source)))
                .unwrap_or_default();
            match field_text(param, "type", source) {
                Some(ty) => format!("{name}: {ty}"),
                None => name,
            }
        }
        "default_parameter" => {
            let name = field_text(param, "name", source).unwrap_or_default();
            let value = field_text(param, "value", source).unwrap_or_default();
            format!("{name}={value}")
        }
        "typed_default_parameter" => {
            let name = field_text(param, "name", source).unwrap_or_default();
            let ty = field_text(param, "type", source).unwrap_or_default();
            let value = field_text(param, "value", source).unwrap_or_default();
            format!("{name}: {ty} = {value}")
        }
        _ => normalize(node_text(param, source)),
    };
    Some(rendered)
}

/// `(<params>)` followed by ` -> <return>` when a return annotation exists.
///
/// `params` is the `parameters` node of a `def` or the `lambda_parameters` node of a lambda
/// (absent for a lambda without parameters).
pub fn function_signature(params: Option<Node>, return_type: Option<Node>, source: &[u8]) -> String {
    let rendered: Vec<String> = params
        .map(|p| {
            named_children(p)
                .into_iter()
                .filter_map(|param| render_parameter(param, source))
                .collect()
        })
        .unwrap_or_default();

    let mut signature = format!("({})", rendered.join(", "));
    if let Some(ret) = return_type {
        signature.push_str(" -> ");
        signature.push_str(&normalize(node_text(ret, source)));
    }
    signature
}

/// `(<bases>)` for a class with a non-empty base list, `None` otherwise.
pub fn class_signature(superclasses: Option<Node>, source: &[u8]) -> Option<String> {
    let bases: Vec<String> = named_children(superclasses?)
        .into_iter()
        .filter(|c| c.kind() != "comment")
        .map(|c| normalize(node_text(c, source)))
        .collect();
    if bases.is_empty() {
        None
    } else {
        Some(format!("({})", bases.join(", ")))
    }
}

/// First line of the docstring of a `module` or `block` node.
///
/// A docstring is a plain string literal (implicit concatenation allowed) forming the first
/// non-comment statement. f-strings and bytes literals are not docstrings.
pub fn docstring(body: Node, source: &[u8]) -> Option<String> {
    let first = named_children(body)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = named_children(first).into_iter().next()?;

    let content = match expr.kind() {
        "string" => string_content(expr, source)?,
        "concatenated_string" => {
            let mut joined = String::new();
            for part in named_children(expr) {
                if part.kind() == "string" {
                    joined.push_str(&string_content(part, source)?);
                }
            }
            joined
        }
        _ => return None,
    };

    let line = content.trim().lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_owned())
    }
}

/// Text between the opening and closing quotes of a `string` node; `None` for f-strings,
/// bytes, and strings without the expected delimiters.
fn string_content(string: Node, source: &[u8]) -> Option<String> {
    let children = named_children(string);
    let start = children.iter().find(|c| c.kind() == "string_start")?;
    let end = children.iter().rev().find(|c| c.kind() == "string_end")?;

    let prefix = node_text(*start, source)
        .trim_end_matches(['"', '\''])
        .to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') || prefix.contains('t') {
        return None;
    }

    let bytes = source.get(start.end_byte()..end.start_byte())?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}
