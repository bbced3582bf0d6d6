//! Node/edge view over lineage records

use crate::{LineageRecord, StepKind, TrackingId};
use serde::{Deserialize, Serialize};

/// Kind of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Where the data came from
    Source,
    /// A transformation step
    Transformation,
    /// A validation step
    Validation,
    /// A quality-check step
    QualityCheck,
    /// The delivered result
    Output,
}

impl From<StepKind> for NodeKind {
    fn from(kind: StepKind) -> Self {
        match kind {
            StepKind::Transformation => NodeKind::Transformation,
            StepKind::Validation => NodeKind::Validation,
            StepKind::QualityCheck => NodeKind::QualityCheck,
        }
    }
}

/// One node of the lineage graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node id, unique within the graph
    pub id: String,
    /// Session the node belongs to
    pub tracking_id: TrackingId,
    /// Node kind
    pub kind: NodeKind,
    /// Display label
    pub label: String,
    /// When the node was recorded (ms since epoch)
    pub timestamp: u64,
}

/// Causal edge between two nodes of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Upstream node id
    pub from: String,
    /// Downstream node id
    pub to: String,
}

/// Lineage graph over recent records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageGraph {
    /// All nodes
    pub nodes: Vec<GraphNode>,
    /// All edges
    pub edges: Vec<GraphEdge>,
}

impl LineageGraph {
    /// Build the graph of `records`
    ///
    /// Each record becomes a chain `source -> steps... -> output`; the output
    /// node exists only for finalized records.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a LineageRecord>) -> Self {
        let mut graph = LineageGraph::default();
        for record in records {
            graph.add_record(record);
        }
        graph
    }

    fn add_record(&mut self, record: &LineageRecord) {
        let source_id = format!("{}:source", record.id);
        self.nodes.push(GraphNode {
            id: source_id.clone(),
            tracking_id: record.id,
            kind: NodeKind::Source,
            label: record.source_id.clone(),
            timestamp: record.started_at,
        });

        let mut previous = source_id;
        for (index, step) in record.steps.iter().enumerate() {
            let node_id = format!("{}:step:{}", record.id, index);
            self.nodes.push(GraphNode {
                id: node_id.clone(),
                tracking_id: record.id,
                kind: step.kind.into(),
                label: step.name.clone(),
                timestamp: step.recorded_at,
            });
            self.edges.push(GraphEdge {
                from: previous,
                to: node_id.clone(),
            });
            previous = node_id;
        }

        if let Some(finalized_at) = record.finalized_at {
            let output_id = format!("{}:output", record.id);
            let label = match record.success {
                Some(true) => format!("{} (ok)", record.data_type),
                _ => format!("{} (failed)", record.data_type),
            };
            self.nodes.push(GraphNode {
                id: output_id.clone(),
                tracking_id: record.id,
                kind: NodeKind::Output,
                label,
                timestamp: finalized_at,
            });
            self.edges.push(GraphEdge {
                from: previous,
                to: output_id,
            });
        }
    }

    /// Nodes belonging to one session, in causal order
    pub fn session(&self, id: TrackingId) -> Vec<&GraphNode> {
        self.nodes.iter().filter(|node| node.tracking_id == id).collect()
    }
}
