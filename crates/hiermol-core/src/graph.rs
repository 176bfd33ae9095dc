//! Hierarchical molecular graphs.
//!
//! A [`HierGraph`] stores one [`LevelGraph`] per [`Level`] plus the links
//! that couple adjacent levels:
//!
//! ```text
//! motif            m0 ──────────── m1
//!                  │               │
//! attachment       c0 ──────────── c1          attachment_parent[c] = m
//!                  │               │
//! atom          a0 ─ a1 ───────── a2 ─ a3      atom_parent[a] = c
//! ```
//!
//! Every atom belongs to exactly one attachment node and every attachment
//! node to exactly one motif. `atom_position[a]` is the atom's index inside
//! its motif template and keys the positional embedding.
//!
//! Edges are undirected and stored once per level in COO form; message
//! passing sees them in both directions via [`LevelGraph::directed_edges`].
//!
//! # Example
//!
//! ```rust
//! use hiermol_core::HierGraph;
//!
//! // A two-atom motif template (labels are vocab indices).
//! let template = HierGraph::single_motif(0, 0, &[0, 1], &[(0, 1, 0)]);
//!
//! let mut hg = HierGraph::new();
//! let m0 = hg.push_motif(0, 0, &template).unwrap();
//! let m1 = hg.push_motif(0, 0, &template).unwrap();
//! let a = hg.atoms_of_motif(m0)[1];
//! hg.connect(m0, m1, a, 0, 0).unwrap();
//!
//! assert_eq!(hg.num_motifs(), 2);
//! assert_eq!(hg.num_atoms(), 4);
//! assert_eq!(hg.level(hiermol_core::Level::Atom).num_edges(), 3);
//! ```

use crate::error::{Error, Result};
use crate::level::Level;
use crate::vocab::Vocabs;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Node index local to one level.
pub type NodeIndex = usize;

/// Label assigned to generated attachment/motif edges.
pub const ATTACH_EDGE_LABEL: usize = 0;

/// Undirected labelled edges of one level (COO format).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeStore {
    /// First endpoint of each edge.
    pub src: Vec<NodeIndex>,
    /// Second endpoint of each edge.
    pub dst: Vec<NodeIndex>,
    /// Edge label (vocab index) of each edge.
    pub labels: Vec<usize>,
}

impl EdgeStore {
    /// Create an empty edge store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    /// Add an edge.
    pub fn add_edge(&mut self, src: NodeIndex, dst: NodeIndex, label: usize) {
        self.src.push(src);
        self.dst.push(dst);
        self.labels.push(label);
    }

    /// Iterate over (src, dst, label) triples.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, usize)> + '_ {
        self.src
            .iter()
            .zip(&self.dst)
            .zip(&self.labels)
            .map(|((&s, &d), &l)| (s, d, l))
    }
}

/// Nodes and edges of a single level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelGraph {
    /// Node label (vocab index) of each node.
    pub labels: Vec<usize>,
    /// Undirected edges.
    pub edges: EdgeStore,
}

impl LevelGraph {
    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    /// Number of undirected edges.
    pub fn num_edges(&self) -> usize {
        self.edges.num_edges()
    }

    /// Add a node, returning its index.
    pub fn add_node(&mut self, label: usize) -> NodeIndex {
        self.labels.push(label);
        self.labels.len() - 1
    }

    /// Every edge in both directions.
    pub fn directed_edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, usize)> + '_ {
        self.edges
            .iter()
            .flat_map(|(s, d, l)| [(s, d, l), (d, s, l)])
    }

    /// Neighbors of a node.
    pub fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.directed_edges()
            .filter_map(|(s, d, _)| (s == node).then_some(d))
            .collect()
    }
}

/// A molecule as a three-level hierarchical graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierGraph {
    /// Atom level.
    pub atom: LevelGraph,
    /// Attachment configuration level.
    pub attachment_config: LevelGraph,
    /// Motif level.
    pub motif: LevelGraph,
    /// Attachment node of each atom.
    pub atom_parent: Vec<NodeIndex>,
    /// Motif node of each attachment node.
    pub attachment_parent: Vec<NodeIndex>,
    /// Position of each atom inside its motif.
    pub atom_position: Vec<usize>,
}

/// Size summary of a [`HierGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierGraphStats {
    pub num_atoms: usize,
    pub num_bonds: usize,
    pub num_attachments: usize,
    pub num_attachment_edges: usize,
    pub num_motifs: usize,
    pub num_motif_edges: usize,
}

impl HierGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph holding one motif: used for the per-motif templates the
    /// decoder copies atoms from.
    ///
    /// `bonds` are `(atom, atom, bond_label)` with atom indices local to the
    /// motif; atom `i` gets position `i`.
    pub fn single_motif(
        motif_label: usize,
        attachment_label: usize,
        atom_labels: &[usize],
        bonds: &[(usize, usize, usize)],
    ) -> Self {
        let mut hg = Self::new();
        let motif = hg.motif.add_node(motif_label);
        let attachment = hg.add_attachment(attachment_label, motif);
        for (position, &label) in atom_labels.iter().enumerate() {
            hg.add_atom(label, attachment, position);
        }
        for &(u, v, label) in bonds {
            hg.atom.edges.add_edge(u, v, label);
        }
        hg
    }

    /// Level graph by level.
    pub fn level(&self, level: Level) -> &LevelGraph {
        match level {
            Level::Atom => &self.atom,
            Level::AttachmentConfig => &self.attachment_config,
            Level::Motif => &self.motif,
        }
    }

    /// Mutable level graph by level.
    pub fn level_mut(&mut self, level: Level) -> &mut LevelGraph {
        match level {
            Level::Atom => &mut self.atom,
            Level::AttachmentConfig => &mut self.attachment_config,
            Level::Motif => &mut self.motif,
        }
    }

    pub fn num_atoms(&self) -> usize {
        self.atom.num_nodes()
    }

    pub fn num_attachments(&self) -> usize {
        self.attachment_config.num_nodes()
    }

    pub fn num_motifs(&self) -> usize {
        self.motif.num_nodes()
    }

    /// Add an atom under an attachment node.
    pub fn add_atom(&mut self, label: usize, attachment: NodeIndex, position: usize) -> NodeIndex {
        self.atom_parent.push(attachment);
        self.atom_position.push(position);
        self.atom.add_node(label)
    }

    /// Add an attachment node under a motif.
    pub fn add_attachment(&mut self, label: usize, motif: NodeIndex) -> NodeIndex {
        self.attachment_parent.push(motif);
        self.attachment_config.add_node(label)
    }

    /// Add a motif node.
    pub fn add_motif(&mut self, label: usize) -> NodeIndex {
        self.motif.add_node(label)
    }

    /// Add an undirected edge at a level.
    pub fn add_edge(&mut self, level: Level, u: NodeIndex, v: NodeIndex, label: usize) {
        self.level_mut(level).edges.add_edge(u, v, label);
    }

    /// Motif an atom belongs to.
    pub fn motif_of_atom(&self, atom: NodeIndex) -> Option<NodeIndex> {
        let attachment = *self.atom_parent.get(atom)?;
        self.attachment_parent.get(attachment).copied()
    }

    /// Attachment node of a motif.
    pub fn attachment_of_motif(&self, motif: NodeIndex) -> Option<NodeIndex> {
        self.attachment_parent.iter().position(|&m| m == motif)
    }

    /// Atoms of a motif, in index order.
    pub fn atoms_of_motif(&self, motif: NodeIndex) -> Vec<NodeIndex> {
        (0..self.num_atoms())
            .filter(|&a| self.motif_of_atom(a) == Some(motif))
            .collect()
    }

    /// Atom of a motif at a given position.
    pub fn atom_at_position(&self, motif: NodeIndex, position: usize) -> Option<NodeIndex> {
        self.atoms_of_motif(motif)
            .into_iter()
            .find(|&a| self.atom_position[a] == position)
    }

    /// Append a motif copied from its template, returning the new motif index.
    ///
    /// The template's atoms, positions and intra-motif bonds are copied; the
    /// new motif is not connected to anything yet.
    pub fn push_motif(
        &mut self,
        motif_label: usize,
        attachment_label: usize,
        template: &HierGraph,
    ) -> Result<NodeIndex> {
        if template.num_atoms() == 0 {
            return Err(Error::InvalidGraph(format!(
                "template for motif {motif_label} has no atoms"
            )));
        }
        let motif = self.add_motif(motif_label);
        let attachment = self.add_attachment(attachment_label, motif);
        let offset = self.num_atoms();
        for (a, &label) in template.atom.labels.iter().enumerate() {
            let position = template.atom_position.get(a).copied().unwrap_or(a);
            self.add_atom(label, attachment, position);
        }
        for (u, v, label) in template.atom.edges.iter() {
            self.atom.edges.add_edge(u + offset, v + offset, label);
        }
        Ok(motif)
    }

    /// Join two motifs with a bond between `parent_atom` (a global atom
    /// index inside `parent_motif`) and the atom at `child_position` inside
    /// `child_motif`. Matching attachment and motif edges are added.
    pub fn connect(
        &mut self,
        parent_motif: NodeIndex,
        child_motif: NodeIndex,
        parent_atom: NodeIndex,
        child_position: usize,
        bond_label: usize,
    ) -> Result<()> {
        if self.motif_of_atom(parent_atom) != Some(parent_motif) {
            return Err(Error::InvalidGraph(format!(
                "atom {parent_atom} is not in motif {parent_motif}"
            )));
        }
        let child_atom = self.atom_at_position(child_motif, child_position).ok_or_else(|| {
            Error::InvalidGraph(format!(
                "motif {child_motif} has no atom at position {child_position}"
            ))
        })?;
        let parent_attachment = self.attachment_of_motif(parent_motif).ok_or_else(|| {
            Error::InvalidGraph(format!("motif {parent_motif} has no attachment node"))
        })?;
        let child_attachment = self.attachment_of_motif(child_motif).ok_or_else(|| {
            Error::InvalidGraph(format!("motif {child_motif} has no attachment node"))
        })?;

        self.add_edge(Level::Atom, parent_atom, child_atom, bond_label);
        self.add_edge(
            Level::AttachmentConfig,
            parent_attachment,
            child_attachment,
            ATTACH_EDGE_LABEL,
        );
        self.add_edge(Level::Motif, parent_motif, child_motif, ATTACH_EDGE_LABEL);
        Ok(())
    }

    /// Check structure and labels against the vocabularies.
    pub fn validate(&self, vocabs: &Vocabs) -> Result<()> {
        if self.num_atoms() == 0 || self.num_motifs() == 0 {
            return Err(Error::InvalidGraph(
                "graph needs at least one atom and one motif".to_string(),
            ));
        }
        if self.atom_parent.len() != self.num_atoms() || self.atom_position.len() != self.num_atoms()
        {
            return Err(Error::InvalidGraph(
                "atom_parent and atom_position must have one entry per atom".to_string(),
            ));
        }
        if self.attachment_parent.len() != self.num_attachments() {
            return Err(Error::InvalidGraph(
                "attachment_parent must have one entry per attachment node".to_string(),
            ));
        }
        check_range("atom_parent", &self.atom_parent, self.num_attachments())?;
        check_range("attachment_parent", &self.attachment_parent, self.num_motifs())?;
        check_range("atom_position", &self.atom_position, vocabs.max_num_atoms()?)?;

        for level in Level::ALL {
            let graph = self.level(level);
            let vocab = vocabs.get(level)?;
            check_range(&format!("{level} label"), &graph.labels, vocab.num_nodes())?;
            check_range(&format!("{level} edge label"), &graph.edges.labels, vocab.num_edges())?;
            check_range(&format!("{level} edge src"), &graph.edges.src, graph.num_nodes())?;
            check_range(&format!("{level} edge dst"), &graph.edges.dst, graph.num_nodes())?;
            if graph.edges.src.len() != graph.edges.labels.len()
                || graph.edges.dst.len() != graph.edges.labels.len()
            {
                return Err(Error::InvalidGraph(format!("{level} edge arrays differ in length")));
            }
        }
        Ok(())
    }

    /// Size summary.
    pub fn stats(&self) -> HierGraphStats {
        HierGraphStats {
            num_atoms: self.num_atoms(),
            num_bonds: self.atom.num_edges(),
            num_attachments: self.num_attachments(),
            num_attachment_edges: self.attachment_config.num_edges(),
            num_motifs: self.num_motifs(),
            num_motif_edges: self.motif.num_edges(),
        }
    }

    /// Read a single graph from JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write a single graph as JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Read a JSON array of graphs.
pub fn read_graphs(path: impl AsRef<Path>) -> Result<Vec<HierGraph>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write graphs as a JSON array.
pub fn write_graphs(path: impl AsRef<Path>, graphs: &[HierGraph]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, graphs)?;
    Ok(())
}

fn check_range(what: &str, values: &[usize], bound: usize) -> Result<()> {
    match values.iter().find(|&&v| v >= bound) {
        Some(v) => Err(Error::InvalidGraph(format!(
            "{what} {v} out of range (< {bound})"
        ))),
        None => Ok(()),
    }
}
