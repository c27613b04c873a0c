//! In-memory witness graph.
//!
//! A [`WitnessDocument`] is built fresh for every emission from an
//! [`AnalysisResult`] and the program it was produced for. Building the same
//! document twice gives structurally identical graphs; only the
//! `creationtime` graph datum differs.

use std::fmt;
use std::path::Path;

use chrono::{Local, SecondsFormat};
use lartrun_report::model::ModelVariable;
use lartrun_report::{AnalysisResult, ResultClass};
use serde::Serialize;

use crate::hash::sha256_hex_file;
use crate::WitnessError;

pub const PRODUCER: &str = "lartrun";
pub const SOURCE_LANGUAGE: &str = "C";

pub const ENTRY_NODE: &str = "entry";
pub const ERROR_NODE: &str = "error";

pub const KEY_WITNESS_TYPE: &str = "witness-type";
pub const KEY_SOURCE_LANG: &str = "sourcecodelang";
pub const KEY_PRODUCER: &str = "producer";
pub const KEY_PROGRAM_FILE: &str = "programfile";
pub const KEY_PROGRAM_HASH: &str = "programhash";
pub const KEY_ARCHITECTURE: &str = "architecture";
pub const KEY_CREATION_TIME: &str = "creationtime";
pub const KEY_SPECIFICATION: &str = "specification";
pub const KEY_ENTRY: &str = "entry";
pub const KEY_VIOLATION: &str = "violation";
pub const KEY_ASSUMPTION: &str = "assumption";
pub const KEY_RESULT_FUNCTION: &str = "assumption.resultfunction";
pub const KEY_START_LINE: &str = "startline";

/// Graph-level keys every witness carries, in emission order.
pub const GRAPH_KEYS: [&str; 8] = [
    KEY_WITNESS_TYPE,
    KEY_SOURCE_LANG,
    KEY_PRODUCER,
    KEY_PROGRAM_FILE,
    KEY_PROGRAM_HASH,
    KEY_ARCHITECTURE,
    KEY_CREATION_TIME,
    KEY_SPECIFICATION,
];
pub const NODE_KEYS: [&str; 2] = [KEY_ENTRY, KEY_VIOLATION];
pub const EDGE_KEYS: [&str; 3] = [KEY_ASSUMPTION, KEY_RESULT_FUNCTION, KEY_START_LINE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WitnessKind {
    Correctness,
    Violation,
}

impl WitnessKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WitnessKind::Correctness => "correctness_witness",
            WitnessKind::Violation => "violation_witness",
        }
    }
}

impl fmt::Display for WitnessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the witness says about the program, independent of the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WitnessContext {
    pub producer: String,
    pub program_file: String,
    pub program_hash: String,
    /// Target architecture bit width (32 or 64).
    pub architecture: u8,
    /// Literal property specification strings, in configuration order.
    pub specifications: Vec<String>,
    /// Lines inserted ahead of the original source during preprocessing.
    pub line_offset: u32,
}

impl WitnessContext {
    /// Build a context for `program`, hashing its current contents.
    pub fn for_program(
        program: &Path,
        architecture: u8,
        specifications: Vec<String>,
        line_offset: u32,
    ) -> Result<Self, WitnessError> {
        Ok(Self {
            producer: PRODUCER.to_string(),
            program_file: program.display().to_string(),
            program_hash: sha256_hex_file(program)?,
            architecture,
            specifications,
            line_offset,
        })
    }
}

/// A declared data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyDecl {
    pub id: &'static str,
    pub domain: KeyDomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDomain {
    Graph,
    Node,
    Edge,
}

impl KeyDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyDomain::Graph => "graph",
            KeyDomain::Node => "node",
            KeyDomain::Edge => "edge",
        }
    }
}

fn declare(domain: KeyDomain) -> impl Fn(&'static str) -> KeyDecl {
    move |id| KeyDecl { id, domain }
}

/// A `(key, value)` datum attached to the graph, a node or an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Datum {
    pub key: String,
    pub value: String,
}

impl Datum {
    fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WitnessNode {
    pub id: String,
    pub data: Vec<Datum>,
}

impl WitnessNode {
    fn plain(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Vec::new(),
        }
    }

    fn flagged(id: &str, key: &str) -> Self {
        Self {
            id: id.to_string(),
            data: vec![Datum::new(key, "true")],
        }
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.data.iter().any(|d| d.key == key && d.value == "true")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WitnessEdge {
    pub source: String,
    pub target: String,
    pub data: Vec<Datum>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WitnessDocument {
    kind: WitnessKind,
    keys: Vec<KeyDecl>,
    graph_data: Vec<Datum>,
    nodes: Vec<WitnessNode>,
    edges: Vec<WitnessEdge>,
}

impl WitnessDocument {
    /// A correctness witness: a lone entry node.
    pub fn correctness(context: &WitnessContext) -> Self {
        let mut doc = Self::skeleton(WitnessKind::Correctness, context);
        doc.nodes.push(WitnessNode::flagged(ENTRY_NODE, KEY_ENTRY));
        doc
    }

    /// A violation witness: entry, one node per decodable model variable,
    /// then the violation node.
    pub fn violation(context: &WitnessContext, model: &[ModelVariable]) -> Self {
        let mut doc = Self::skeleton(WitnessKind::Violation, context);
        doc.nodes.push(WitnessNode::flagged(ENTRY_NODE, KEY_ENTRY));

        let mut last = ENTRY_NODE.to_string();
        for (index, var) in model.iter().enumerate() {
            let Some(value) = var.value else {
                continue;
            };
            let id = index.to_string();
            doc.nodes.push(WitnessNode::plain(id.clone()));
            doc.edges.push(WitnessEdge {
                source: last,
                target: id.clone(),
                data: vec![
                    Datum::new(KEY_ASSUMPTION, format!("\\result=={value}")),
                    Datum::new(KEY_RESULT_FUNCTION, var.call.clone()),
                    Datum::new(
                        KEY_START_LINE,
                        var.line.saturating_sub(context.line_offset).to_string(),
                    ),
                ],
            });
            last = id;
        }

        doc.nodes.push(WitnessNode::flagged(ERROR_NODE, KEY_VIOLATION));
        doc.edges.push(WitnessEdge {
            source: last,
            target: ERROR_NODE.to_string(),
            data: Vec::new(),
        });
        doc
    }

    /// The witness certifying `result`, if any.
    ///
    /// With `force_correctness` a correctness witness is produced whatever
    /// the verdict. Otherwise `true` yields a correctness witness, `false` a
    /// violation witness and anything else nothing.
    pub fn for_result(
        context: &WitnessContext,
        result: &AnalysisResult,
        force_correctness: bool,
    ) -> Option<Self> {
        if force_correctness {
            return Some(Self::correctness(context));
        }
        match result.class() {
            ResultClass::True => Some(Self::correctness(context)),
            ResultClass::False => Some(Self::violation(context, result.model())),
            ResultClass::Unknown | ResultClass::Error => None,
        }
    }

    fn skeleton(kind: WitnessKind, context: &WitnessContext) -> Self {
        let keys = GRAPH_KEYS
            .into_iter()
            .map(declare(KeyDomain::Graph))
            .chain(NODE_KEYS.into_iter().map(declare(KeyDomain::Node)))
            .chain(EDGE_KEYS.into_iter().map(declare(KeyDomain::Edge)))
            .collect();

        let mut graph_data = vec![
            Datum::new(KEY_WITNESS_TYPE, kind.as_str()),
            Datum::new(KEY_SOURCE_LANG, SOURCE_LANGUAGE),
            Datum::new(KEY_PRODUCER, context.producer.clone()),
            Datum::new(KEY_PROGRAM_FILE, context.program_file.clone()),
            Datum::new(KEY_PROGRAM_HASH, context.program_hash.clone()),
            Datum::new(KEY_ARCHITECTURE, format!("{}bit", context.architecture)),
            Datum::new(KEY_CREATION_TIME, creation_time()),
        ];
        graph_data.extend(
            context
                .specifications
                .iter()
                .map(|spec| Datum::new(KEY_SPECIFICATION, spec.clone())),
        );

        Self {
            kind,
            keys,
            graph_data,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Replace the creation timestamp.
    pub fn with_creation_time(mut self, timestamp: impl Into<String>) -> Self {
        let timestamp = timestamp.into();
        for datum in &mut self.graph_data {
            if datum.key == KEY_CREATION_TIME {
                datum.value = timestamp.clone();
            }
        }
        self
    }

    /// Equality ignoring `creationtime`.
    pub fn same_structure(&self, other: &WitnessDocument) -> bool {
        let stable = |doc: &WitnessDocument| -> Vec<Datum> {
            doc.graph_data
                .iter()
                .filter(|d| d.key != KEY_CREATION_TIME)
                .cloned()
                .collect()
        };
        self.kind == other.kind
            && self.keys == other.keys
            && self.nodes == other.nodes
            && self.edges == other.edges
            && stable(self) == stable(other)
    }

    pub fn kind(&self) -> WitnessKind {
        self.kind
    }

    pub fn keys(&self) -> &[KeyDecl] {
        &self.keys
    }

    pub fn graph_data(&self) -> &[Datum] {
        &self.graph_data
    }

    pub fn nodes(&self) -> &[WitnessNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[WitnessEdge] {
        &self.edges
    }

    /// First value of graph datum `key`.
    pub fn graph_value(&self, key: &str) -> Option<&str> {
        self.graph_data
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.value.as_str())
    }
}

#[cfg(test)]
impl WitnessDocument {
    pub(crate) fn remove_node(&mut self, id: &str) {
        self.nodes.retain(|n| n.id != id);
    }
}

fn creation_time() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lartrun_report::model::ModelValue;
    use lartrun_report::{Property, ResultCause, VerificationResult};

    fn context() -> WitnessContext {
        WitnessContext {
            producer: PRODUCER.to_string(),
            program_file: "bench/main.c".to_string(),
            program_hash: "ab".repeat(32),
            architecture: 64,
            specifications: vec!["CHECK( init(main()), LTL(G ! call(reach_error())) )".to_string()],
            line_offset: 1,
        }
    }

    fn var(call: &str, line: u32, value: Option<ModelValue>) -> ModelVariable {
        ModelVariable {
            call: call.to_string(),
            line,
            value,
        }
    }

    #[test]
    fn correctness_witness_has_only_an_entry_node() {
        let doc = WitnessDocument::correctness(&context());
        assert_eq!(doc.kind(), WitnessKind::Correctness);
        assert_eq!(doc.nodes().len(), 1);
        assert!(doc.nodes()[0].has_flag(KEY_ENTRY));
        assert!(doc.edges().is_empty());
        assert_eq!(doc.graph_value(KEY_WITNESS_TYPE), Some("correctness_witness"));
        assert_eq!(doc.graph_value(KEY_ARCHITECTURE), Some("64bit"));
    }

    #[test]
    fn violation_chain_skips_undecodable_values() {
        let model = vec![
            var("__VERIFIER_nondet_int", 5, Some(ModelValue::Signed { bits: 32, value: -3 })),
            var("__VERIFIER_nondet_pointer", 6, None),
            var("__VERIFIER_nondet_bool", 7, Some(ModelValue::Bool(true))),
        ];
        let doc = WitnessDocument::violation(&context(), &model);
        let ids: Vec<_> = doc.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["entry", "0", "2", "error"]);
        assert!(doc.nodes()[3].has_flag(KEY_VIOLATION));

        let first = &doc.edges()[0];
        assert_eq!((first.source.as_str(), first.target.as_str()), ("entry", "0"));
        assert_eq!(first.data[0].value, "\\result==-3");
        assert_eq!(first.data[1].value, "__VERIFIER_nondet_int");
        assert_eq!(first.data[2].value, "4");

        let second = &doc.edges()[1];
        assert_eq!((second.source.as_str(), second.target.as_str()), ("0", "2"));
        assert_eq!(second.data[0].value, "\\result==1");

        let last = &doc.edges()[2];
        assert_eq!((last.source.as_str(), last.target.as_str()), ("2", "error"));
        assert!(last.data.is_empty());
    }

    #[test]
    fn start_line_saturates_at_zero() {
        let mut ctx = context();
        ctx.line_offset = 10;
        let model = vec![var("f", 3, Some(ModelValue::Bool(false)))];
        let doc = WitnessDocument::violation(&ctx, &model);
        assert_eq!(doc.edges()[0].data[2].value, "0");
    }

    #[test]
    fn one_specification_datum_per_property_string() {
        let mut ctx = context();
        ctx.specifications.push("CHECK( init(main()), LTL(G valid-free) )".to_string());
        let doc = WitnessDocument::correctness(&ctx);
        let specs: Vec<_> = doc
            .graph_data()
            .iter()
            .filter(|d| d.key == KEY_SPECIFICATION)
            .collect();
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn for_result_follows_the_result_class() {
        let ctx = context();
        let t = AnalysisResult::new(VerificationResult::True, ResultCause::None, "", Vec::new());
        let f = AnalysisResult::new(
            VerificationResult::FalseProperty(Property::Reach),
            ResultCause::None,
            "",
            Vec::new(),
        );
        let u = AnalysisResult::unknown(ResultCause::MissingReport, "");
        assert_eq!(
            WitnessDocument::for_result(&ctx, &t, false).map(|d| d.kind()),
            Some(WitnessKind::Correctness)
        );
        assert_eq!(
            WitnessDocument::for_result(&ctx, &f, false).map(|d| d.kind()),
            Some(WitnessKind::Violation)
        );
        assert!(WitnessDocument::for_result(&ctx, &u, false).is_none());
        assert_eq!(
            WitnessDocument::for_result(&ctx, &u, true).map(|d| d.kind()),
            Some(WitnessKind::Correctness)
        );
    }

    #[test]
    fn same_structure_ignores_only_the_timestamp() {
        let ctx = context();
        let a = WitnessDocument::correctness(&ctx).with_creation_time("2024-01-01T00:00:00+00:00");
        let b = WitnessDocument::correctness(&ctx).with_creation_time("2025-06-30T12:00:00+02:00");
        assert!(a.same_structure(&b));
        assert_ne!(a, b);

        let mut other = ctx.clone();
        other.architecture = 32;
        assert!(!a.same_structure(&WitnessDocument::correctness(&other)));
    }

    #[test]
    fn creation_time_is_rfc3339_seconds() {
        let doc = WitnessDocument::correctness(&context());
        let stamp = doc.graph_value(KEY_CREATION_TIME).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        assert!(!stamp.contains('.'));
    }
}
