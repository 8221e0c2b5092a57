//! Query text rendering
//!
//! The only serializer from [`Query`] to the store's query language. All
//! string literals and regex patterns are escaped here, so compilers never
//! splice user input into text.

use std::fmt::Write;

use serde_json::Value;

use super::ast::{
    Block, BlockKind, Edge, Filter, Func, PageArg, Query, Selection, Traversal, UidRef,
};

const INDENT: &str = "  ";

/// Render a full query
pub fn render_query(query: &Query) -> String {
    let mut out = String::new();
    out.push_str("query ");
    out.push_str(&query.name);
    if !query.params.is_empty() {
        let params: Vec<String> = query
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.kind))
            .collect();
        let _ = write!(out, "({})", params.join(", "));
    }
    out.push_str(" {\n");
    for block in &query.blocks {
        render_block(&mut out, block, 1);
    }
    out.push('}');
    out
}

fn render_block(out: &mut String, block: &Block, depth: usize) {
    indent(out, depth);
    if let Some(ref var) = block.bind {
        let _ = write!(out, "{} as ", var);
    }
    match &block.kind {
        BlockKind::Var => out.push_str("var"),
        BlockKind::Named(name) => out.push_str(name),
    }
    let _ = write!(out, "(func: {}", render_func(&block.root));
    if let Some(ref order) = block.order {
        let _ = write!(out, ", order{}: {}", order.direction.as_str(), order.predicate);
    }
    if let Some(ref first) = block.page.first {
        let _ = write!(out, ", first: {}", render_page_arg(first));
    }
    if let Some(ref offset) = block.page.offset {
        let _ = write!(out, ", offset: {}", render_page_arg(offset));
    }
    out.push(')');
    if let Some(recurse) = block.recurse {
        let _ = write!(out, " @recurse(depth: {}, loop: {})", recurse.depth, recurse.allow_loop);
    }
    if let Some(ref filter) = block.filter {
        let _ = write!(out, " @filter({})", render_filter(filter));
    }
    out.push_str(" {\n");
    for traversal in &block.traversals {
        render_traversal(out, traversal, depth + 1);
    }
    for selection in &block.selections {
        render_selection(out, selection, depth + 1);
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn render_traversal(out: &mut String, traversal: &Traversal, depth: usize) {
    indent(out, depth);
    if let Some(ref var) = traversal.bind {
        let _ = write!(out, "{} as ", var);
    }
    out.push_str(&render_edge(&traversal.edge));
    if let Some(ref filter) = traversal.filter {
        let _ = write!(out, " @filter({})", render_filter(filter));
    }
    if traversal.children.is_empty() {
        out.push('\n');
        return;
    }
    out.push_str(" {\n");
    for child in &traversal.children {
        render_traversal(out, child, depth + 1);
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn render_selection(out: &mut String, selection: &Selection, depth: usize) {
    indent(out, depth);
    match selection {
        Selection::Field { alias, predicate } => {
            let _ = writeln!(out, "{}: {}", alias, predicate);
        }
        Selection::Count { alias } => {
            let _ = writeln!(out, "{}: count(uid)", alias);
        }
        Selection::Edge {
            alias,
            edge,
            selections,
        } => {
            let _ = writeln!(out, "{}: {} {{", alias, render_edge(edge));
            for nested in selections {
                render_selection(out, nested, depth + 1);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
    }
}

pub fn render_func(func: &Func) -> String {
    match func {
        Func::Eq { predicate, value } => format!("eq({}, {})", predicate, render_literal(value)),
        Func::Has(predicate) => format!("has({})", predicate),
        Func::Uid(refs) => render_uid_refs(refs),
        Func::Type(name) => format!("type({})", name),
    }
}

pub fn render_filter(filter: &Filter) -> String {
    match filter {
        Filter::Eq { predicate, value } => format!("eq({}, {})", predicate, render_literal(value)),
        Filter::Ge { predicate, value } => format!("ge({}, {})", predicate, render_literal(value)),
        Filter::Regex {
            predicate,
            pattern,
            case_insensitive,
        } => format!(
            "regexp({}, /{}/{})",
            predicate,
            escape_regex_delimiters(pattern),
            if *case_insensitive { "i" } else { "" }
        ),
        Filter::Uid(refs) => render_uid_refs(refs),
        Filter::Has(predicate) => format!("has({})", predicate),
        Filter::And(parts) => join_filters(parts, " AND "),
        Filter::Or(parts) => join_filters(parts, " OR "),
        Filter::Not(inner) => format!("NOT {}", render_filter(inner)),
    }
}

fn join_filters(parts: &[Filter], op: &str) -> String {
    let rendered: Vec<String> = parts.iter().map(render_filter).collect();
    format!("({})", rendered.join(op))
}

fn render_uid_refs(refs: &[UidRef]) -> String {
    let rendered: Vec<String> = refs
        .iter()
        .map(|r| match r {
            UidRef::Var(name) => name.clone(),
            UidRef::Node(uid) => uid.to_string(),
        })
        .collect();
    format!("uid({})", rendered.join(", "))
}

fn render_edge(edge: &Edge) -> String {
    if edge.reverse {
        format!("~{}", edge.predicate)
    } else {
        edge.predicate.clone()
    }
}

fn render_page_arg(arg: &PageArg) -> String {
    match arg {
        PageArg::Literal(n) => n.to_string(),
        PageArg::Var(name) => name.clone(),
    }
}

/// Render a literal value; strings are quoted and escaped
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Null => "\"\"".to_string(),
        Value::Object(_) => quote(&value.to_string()),
        other => other.to_string(),
    }
}

/// Quote a string literal, escaping backslashes, quotes and control characters
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn escape_regex_delimiters(pattern: &str) -> String {
    pattern.replace('/', "\\/")
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}
