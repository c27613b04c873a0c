//! Structural checks over a witness document.

use std::collections::BTreeSet;

use crate::document::{
    KeyDomain, WitnessDocument, WitnessKind, GRAPH_KEYS, KEY_ENTRY, KEY_SPECIFICATION,
    KEY_VIOLATION,
};

/// One structural issue found in a witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessIssue {
    /// Stable machine-readable issue code.
    pub code: &'static str,
    /// Human-readable issue details.
    pub message: String,
}

impl WitnessIssue {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Check `doc` for structural defects. An empty list means the witness is
/// well formed.
pub fn check_witness(doc: &WitnessDocument) -> Vec<WitnessIssue> {
    let mut issues = Vec::new();

    for key in GRAPH_KEYS {
        if key != KEY_SPECIFICATION && doc.graph_value(key).is_none() {
            issues.push(WitnessIssue::new(
                "missing_metadata",
                format!("graph datum '{key}' is missing"),
            ));
        }
    }

    let declared = |domain: KeyDomain| -> BTreeSet<&'static str> {
        doc.keys()
            .iter()
            .filter(|k| k.domain == domain)
            .map(|k| k.id)
            .collect()
    };
    let graph_keys = declared(KeyDomain::Graph);
    let node_keys = declared(KeyDomain::Node);
    let edge_keys = declared(KeyDomain::Edge);

    for datum in doc.graph_data() {
        if !graph_keys.contains(datum.key.as_str()) {
            issues.push(WitnessIssue::new(
                "undeclared_key",
                format!("graph datum '{}' has no key declaration", datum.key),
            ));
        }
    }

    let mut ids = BTreeSet::new();
    for node in doc.nodes() {
        if !ids.insert(node.id.as_str()) {
            issues.push(WitnessIssue::new(
                "duplicate_node",
                format!("node '{}' is declared twice", node.id),
            ));
        }
        for datum in &node.data {
            if !node_keys.contains(datum.key.as_str()) {
                issues.push(WitnessIssue::new(
                    "undeclared_key",
                    format!("node '{}' uses undeclared key '{}'", node.id, datum.key),
                ));
            }
        }
    }

    for edge in doc.edges() {
        for end in [&edge.source, &edge.target] {
            if !ids.contains(end.as_str()) {
                issues.push(WitnessIssue::new(
                    "dangling_edge",
                    format!("edge {} -> {} references unknown node '{end}'", edge.source, edge.target),
                ));
            }
        }
        for datum in &edge.data {
            if !edge_keys.contains(datum.key.as_str()) {
                issues.push(WitnessIssue::new(
                    "undeclared_key",
                    format!("edge {} -> {} uses undeclared key '{}'", edge.source, edge.target, datum.key),
                ));
            }
        }
    }

    if !doc.nodes().iter().any(|n| n.has_flag(KEY_ENTRY)) {
        issues.push(WitnessIssue::new("missing_entry", "no node is marked as entry"));
    }

    let has_violation = doc.nodes().iter().any(|n| n.has_flag(KEY_VIOLATION));
    match doc.kind() {
        WitnessKind::Violation if !has_violation => issues.push(WitnessIssue::new(
            "missing_violation",
            "violation witness has no violation node",
        )),
        WitnessKind::Correctness if has_violation => issues.push(WitnessIssue::new(
            "unexpected_violation",
            "correctness witness contains a violation node",
        )),
        _ => {}
    }

    issues
}
