//! Embedding tables shared by every network of the autoencoder.
//!
//! One node table and one edge table per level, plus a `"position"` node
//! table indexed by an atom's position inside its motif:
//!
//! | Table | Rows |
//! |-------|------|
//! | `nodes/atom`, `nodes/attachment_config`, `nodes/motif` | node labels of the level |
//! | `edges/atom`, `edges/attachment_config`, `edges/motif` | edge labels of the level |
//! | `nodes/position` | `max_num_atoms` |
//!
//! The autoencoder builds a single [`Embeddors`] and hands out `Arc` clones,
//! so encoders and decoder read (and accumulate gradients into) the same
//! variables.

use crate::error::{Error, Result};
use crate::layers::index_tensor;
use crate::mpn::{HierInputs, LevelInput};
use candle_core::{Device, Tensor};
use candle_nn::{embedding, Embedding, Module, VarBuilder};
use hiermol_core::{HierBatch, Level, LevelBatch, Vocabs};
use std::collections::HashMap;

/// Name of the positional node table.
pub const POSITION: &str = "position";

/// Node and edge embedding tables keyed by node-type name.
pub struct Embeddors {
    nodes: HashMap<String, Embedding>,
    edges: HashMap<String, Embedding>,
    embed_size: usize,
}

impl Embeddors {
    /// Allocate all tables under `vb` (`nodes.<name>` / `edges.<name>`).
    pub fn new(vocabs: &Vocabs, embed_size: usize, vb: VarBuilder) -> Result<Self> {
        let mut nodes = HashMap::new();
        let mut edges = HashMap::new();
        for level in Level::ALL {
            let name = level.node_type();
            let vocab = vocabs.get(level)?;
            nodes.insert(
                name.to_string(),
                embedding(vocab.num_nodes(), embed_size, vb.pp("nodes").pp(name))?,
            );
            edges.insert(
                name.to_string(),
                embedding(vocab.num_edges(), embed_size, vb.pp("edges").pp(name))?,
            );
        }
        nodes.insert(
            POSITION.to_string(),
            embedding(vocabs.max_num_atoms()?, embed_size, vb.pp("nodes").pp(POSITION))?,
        );
        Ok(Self {
            nodes,
            edges,
            embed_size,
        })
    }

    /// Embedding width.
    pub fn embed_size(&self) -> usize {
        self.embed_size
    }

    /// Node table by name (a level's node type or `"position"`).
    pub fn node(&self, name: &str) -> Result<&Embedding> {
        self.nodes
            .get(name)
            .ok_or_else(|| Error::UnknownEmbedding(format!("nodes/{name}")))
    }

    /// Edge table by level node-type name.
    pub fn edge(&self, name: &str) -> Result<&Embedding> {
        self.edges
            .get(name)
            .ok_or_else(|| Error::UnknownEmbedding(format!("edges/{name}")))
    }

    /// Positional table.
    pub fn position(&self) -> Result<&Embedding> {
        self.node(POSITION)
    }

    /// Embed one batched level: node labels and directed edge labels.
    pub fn embed_level(&self, level: Level, batch: &LevelBatch, device: &Device) -> Result<LevelInput> {
        let name = level.node_type();
        let labels = index_tensor(&batch.labels, device)?;
        let nodes = self.node(name)?.forward(&labels)?;
        let edges = if batch.num_edges() == 0 {
            None
        } else {
            let edge_labels = index_tensor(&batch.edge_labels, device)?;
            Some(self.edge(name)?.forward(&edge_labels)?)
        };
        Ok(LevelInput::new(nodes, &batch.src, &batch.dst, edges)?)
    }

    /// Atom embeddings with their positional embeddings added.
    pub fn embed_atoms(&self, labels: &[u32], positions: &[u32], device: &Device) -> Result<Tensor> {
        if labels.len() != positions.len() {
            return Err(Error::DimensionMismatch {
                expected: labels.len(),
                got: positions.len(),
            });
        }
        let atoms = self
            .node(Level::Atom.node_type())?
            .forward(&index_tensor(labels, device)?)?;
        let positions = self.position()?.forward(&index_tensor(positions, device)?)?;
        Ok((atoms + positions)?)
    }

    /// Embed a whole batch for hierarchical message passing.
    pub fn embed(&self, batch: &HierBatch, device: &Device) -> Result<HierInputs> {
        let mut atom = self.embed_level(Level::Atom, batch.level(Level::Atom), device)?;
        atom.nodes = self.embed_atoms(
            &batch.level(Level::Atom).labels,
            &batch.atom_position,
            device,
        )?;
        let attachment = self.embed_level(
            Level::AttachmentConfig,
            batch.level(Level::AttachmentConfig),
            device,
        )?;
        let motif = self.embed_level(Level::Motif, batch.level(Level::Motif), device)?;
        Ok(HierInputs {
            atom,
            attachment,
            motif,
            atom_parent: index_tensor(&batch.atom_parent, device)?,
            attachment_parent: index_tensor(&batch.attachment_parent, device)?,
        })
    }
}
