//! GraphML 1.0 rendering.

use std::fmt::Write;

use crate::document::{Datum, WitnessDocument};

const XML_HEADER: &str = "<?xml version='1.0' encoding='UTF-8'?>";
const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Render the document; key declarations precede the graph.
pub fn render(doc: &WitnessDocument) -> String {
    let mut out = String::new();
    out.push_str(XML_HEADER);
    out.push('\n');
    let _ = writeln!(out, "<graphml xmlns=\"{GRAPHML_NS}\" xmlns:xsi=\"{XSI_NS}\">");

    for key in doc.keys() {
        let id = escape(key.id);
        let _ = writeln!(
            out,
            "  <key id=\"{id}\" for=\"{}\" attr.type=\"string\" attr.name=\"{id}\"/>",
            key.domain.as_str()
        );
    }

    out.push_str("  <graph edgedefault=\"directed\">\n");
    for datum in doc.graph_data() {
        write_datum(&mut out, "    ", datum);
    }
    for node in doc.nodes() {
        let id = escape(&node.id);
        if node.data.is_empty() {
            let _ = writeln!(out, "    <node id=\"{id}\"/>");
            continue;
        }
        let _ = writeln!(out, "    <node id=\"{id}\">");
        for datum in &node.data {
            write_datum(&mut out, "      ", datum);
        }
        out.push_str("    </node>\n");
    }
    for edge in doc.edges() {
        let source = escape(&edge.source);
        let target = escape(&edge.target);
        if edge.data.is_empty() {
            let _ = writeln!(out, "    <edge source=\"{source}\" target=\"{target}\"/>");
            continue;
        }
        let _ = writeln!(out, "    <edge source=\"{source}\" target=\"{target}\">");
        for datum in &edge.data {
            write_datum(&mut out, "      ", datum);
        }
        out.push_str("    </edge>\n");
    }
    out.push_str("  </graph>\n");
    out.push_str("</graphml>\n");
    out
}

fn write_datum(out: &mut String, indent: &str, datum: &Datum) {
    let _ = writeln!(
        out,
        "{indent}<data key=\"{}\">{}</data>",
        escape(&datum.key),
        escape(&datum.value)
    );
}

/// Escape the five XML special characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
