// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lua table form of exported plot graphs.
//!
//! ```text
//! SysStoryData = SysStoryData or {}
//! SysStoryData["intro"] = {
//!     name = "intro",
//!     nodes = {
//!         [1] = { ... },
//!     },
//! }
//! ```

use super::export::{NodeFunc, PlotGraph, PlotStep};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Default name of the global table the runtime reads
pub const DEFAULT_TABLE: &str = "SysStoryData";

const INDENT: &str = "    ";

/// Render exported graphs as assignments into a global Lua table
pub fn to_lua(table: &str, graphs: &BTreeMap<String, PlotGraph>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{table} = {table} or {{}}");
    for (name, graph) in graphs {
        let _ = write!(out, "{table}[{}] = ", quote(name));
        write_graph(&mut out, graph, 0);
        out.push('\n');
    }
    out
}

fn write_graph(out: &mut String, graph: &PlotGraph, depth: usize) {
    out.push_str("{\n");
    field(out, depth + 1, "name", &quote(&graph.name));
    indent(out, depth + 1);
    out.push_str("nodes = {");
    if graph.nodes.is_empty() {
        out.push_str("},\n");
    } else {
        out.push('\n');
        for (id, step) in &graph.nodes {
            indent(out, depth + 2);
            let _ = write!(out, "[{id}] = ");
            write_step(out, step, depth + 2);
            out.push_str(",\n");
        }
        indent(out, depth + 1);
        out.push_str("},\n");
    }
    indent(out, depth);
    out.push('}');
}

fn write_step(out: &mut String, step: &PlotStep, depth: usize) {
    out.push_str("{\n");
    field(out, depth + 1, "id", &step.id.to_string());
    field(out, depth + 1, "nodeType", &step.node_type.to_string());
    field(out, depth + 1, "nodeParam", &string_map(&step.node_param));
    for (key, calls) in [
        ("triggers", &step.triggers),
        ("conditions", &step.conditions),
        ("acts", &step.acts),
    ] {
        indent(out, depth + 1);
        let _ = write!(out, "{key} = ");
        write_calls(out, calls, depth + 1);
        out.push_str(",\n");
    }
    field(out, depth + 1, "prevNodes", &int_list(&step.prev_nodes));
    field(out, depth + 1, "nextNodes", &int_list(&step.next_nodes));
    indent(out, depth);
    out.push('}');
}

fn write_calls(out: &mut String, calls: &[NodeFunc], depth: usize) {
    if calls.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    for call in calls {
        indent(out, depth + 1);
        let _ = writeln!(
            out,
            "{{ name = {}, param = {} }},",
            quote(&call.name),
            string_map(&call.param)
        );
    }
    indent(out, depth);
    out.push('}');
}

fn field(out: &mut String, depth: usize, key: &str, value: &str) {
    indent(out, depth);
    let _ = writeln!(out, "{key} = {value},");
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn string_map(map: &IndexMap<String, String>) -> String {
    if map.is_empty() {
        return "{}".to_string();
    }
    let entries: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{} = {}", key(k), quote(v)))
        .collect();
    format!("{{ {} }}", entries.join(", "))
}

fn int_list(ids: &[i64]) -> String {
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("{{{}}}", ids.join(", "))
}

/// Bare identifier when Lua allows one, bracketed string otherwise
fn key(name: &str) -> String {
    const RESERVED: &[&str] = &[
        "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in", "local",
        "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    ];
    let mut chars = name.chars();
    let identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED.contains(&name);
    if identifier {
        name.to_string()
    } else {
        format!("[{}]", quote(name))
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => {
                let mut buf = [0; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(quoted, "\\{byte:03}");
                }
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
