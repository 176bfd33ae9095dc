//! Batching of hierarchical graphs.
//!
//! Graphs are concatenated level by level into one disjoint union, with node
//! indices shifted by the running node count of the level (the same scheme
//! DGL and PyG use for mini-batches). Every node remembers which graph it came
//! from so per-graph pooling can scatter node representations back.
//!
//! Indices are `u32` so they can be handed to tensor index ops unchanged.

use crate::error::{Error, Result};
use crate::graph::HierGraph;
use crate::level::Level;

/// One level of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelBatch {
    /// Node labels.
    pub labels: Vec<u32>,
    /// Directed edge sources (each undirected edge appears twice).
    pub src: Vec<u32>,
    /// Directed edge destinations.
    pub dst: Vec<u32>,
    /// Label of each directed edge.
    pub edge_labels: Vec<u32>,
    /// Graph id of each node.
    pub node_graph: Vec<u32>,
}

impl LevelBatch {
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    /// Number of directed edges.
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }
}

/// A disjoint union of hierarchical graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierBatch {
    levels: [LevelBatch; Level::COUNT],
    /// Attachment node (batch index) of each atom.
    pub atom_parent: Vec<u32>,
    /// Motif node (batch index) of each attachment node.
    pub attachment_parent: Vec<u32>,
    /// Position of each atom inside its motif.
    pub atom_position: Vec<u32>,
    num_graphs: usize,
}

impl HierBatch {
    /// Batch a slice of graphs.
    pub fn new(graphs: &[HierGraph]) -> Result<Self> {
        if graphs.is_empty() {
            return Err(Error::InvalidGraph("cannot batch zero graphs".to_string()));
        }

        let mut levels: [LevelBatch; Level::COUNT] = Default::default();
        let mut atom_parent = Vec::new();
        let mut attachment_parent = Vec::new();
        let mut atom_position = Vec::new();

        for (g, graph) in graphs.iter().enumerate() {
            if graph.atom_parent.len() != graph.num_atoms()
                || graph.atom_position.len() != graph.num_atoms()
                || graph.attachment_parent.len() != graph.num_attachments()
            {
                return Err(Error::InvalidGraph(format!(
                    "graph {g} has inconsistent inter-level links"
                )));
            }

            let attachment_offset = levels[Level::AttachmentConfig.index()].num_nodes();
            let motif_offset = levels[Level::Motif.index()].num_nodes();
            atom_parent.extend(graph.atom_parent.iter().map(|&p| to_u32(p + attachment_offset)));
            attachment_parent.extend(
                graph
                    .attachment_parent
                    .iter()
                    .map(|&p| to_u32(p + motif_offset)),
            );
            atom_position.extend(graph.atom_position.iter().map(|&p| to_u32(p)));

            for level in Level::ALL {
                let batch = &mut levels[level.index()];
                let source = graph.level(level);
                let offset = batch.num_nodes();
                for (s, d, l) in source.directed_edges() {
                    batch.src.push(to_u32(s + offset));
                    batch.dst.push(to_u32(d + offset));
                    batch.edge_labels.push(to_u32(l));
                }
                batch.labels.extend(source.labels.iter().map(|&l| to_u32(l)));
                batch
                    .node_graph
                    .extend(std::iter::repeat(to_u32(g)).take(source.num_nodes()));
            }
        }

        Ok(Self {
            levels,
            atom_parent,
            attachment_parent,
            atom_position,
            num_graphs: graphs.len(),
        })
    }

    /// Number of graphs in the batch.
    pub fn num_graphs(&self) -> usize {
        self.num_graphs
    }

    /// Batched level.
    pub fn level(&self, level: Level) -> &LevelBatch {
        &self.levels[level.index()]
    }

    /// Node count of each graph at one level.
    pub fn graph_sizes(&self, level: Level) -> Vec<usize> {
        let mut sizes = vec![0; self.num_graphs];
        for &g in &self.level(level).node_graph {
            sizes[g as usize] += 1;
        }
        sizes
    }
}

// Graph sizes are far below u32::MAX; saturate rather than wrap if not.
fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
