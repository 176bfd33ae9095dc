//! Linearizing a target graph into decoding steps.
//!
//! The decoder builds a molecule one motif at a time. For teacher forcing it
//! needs the target as a sequence of actions: the root motif first, then each
//! remaining motif in breadth-first order from the root, together with the
//! already-decoded motif it hangs off and the bond that joins them.
//!
//! Atoms are identified by their *position* inside their motif, which is
//! stable between the target and the partially decoded graph (both copy
//! atoms from the same templates).

use crate::error::{Error, Result};
use crate::graph::{HierGraph, NodeIndex};
use petgraph::graph::{NodeIndex as PgNode, UnGraph};
use petgraph::visit::Bfs;

/// How a non-root motif attaches to the graph decoded so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Step index of the motif this one attaches to.
    pub parent_step: usize,
    /// Position of the bonded atom inside the parent motif.
    pub parent_position: usize,
    /// Position of the bonded atom inside the new motif.
    pub child_position: usize,
    /// Bond label.
    pub bond_label: usize,
}

/// One decoding step: add a motif, attached via `link` unless it is the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStep {
    /// Motif node in the target graph.
    pub motif: NodeIndex,
    pub motif_label: usize,
    pub attachment_label: usize,
    pub link: Option<Link>,
}

/// Breadth-first decoding order of a target graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePlan {
    steps: Vec<DecodeStep>,
}

impl DecodePlan {
    /// Derive the plan from a target graph, rooted at motif 0.
    pub fn from_target(target: &HierGraph) -> Result<Self> {
        let num_motifs = target.num_motifs();
        if num_motifs == 0 {
            return Err(Error::InvalidGraph("target has no motifs".to_string()));
        }

        let mut graph = UnGraph::<(), ()>::with_capacity(num_motifs, target.motif.num_edges());
        for _ in 0..num_motifs {
            graph.add_node(());
        }
        for (u, v, _) in target.motif.edges.iter() {
            if u >= num_motifs || v >= num_motifs {
                return Err(Error::InvalidGraph(format!("motif edge ({u}, {v}) out of range")));
            }
            graph.add_edge(PgNode::new(u), PgNode::new(v), ());
        }

        let mut order = Vec::with_capacity(num_motifs);
        let mut bfs = Bfs::new(&graph, PgNode::new(0));
        while let Some(node) = bfs.next(&graph) {
            order.push(node.index());
        }
        if order.len() != num_motifs {
            return Err(Error::InvalidGraph(format!(
                "motif graph is disconnected: reached {} of {num_motifs} motifs",
                order.len()
            )));
        }

        let mut step_of = vec![usize::MAX; num_motifs];
        for (step, &motif) in order.iter().enumerate() {
            step_of[motif] = step;
        }

        let mut steps = Vec::with_capacity(num_motifs);
        for (step, &motif) in order.iter().enumerate() {
            let attachment = target.attachment_of_motif(motif).ok_or_else(|| {
                Error::InvalidGraph(format!("motif {motif} has no attachment node"))
            })?;
            let link = if step == 0 {
                None
            } else {
                // BFS discovers a node from its earliest-visited neighbor.
                let parent = graph
                    .neighbors(PgNode::new(motif))
                    .map(|n| n.index())
                    .min_by_key(|&n| step_of[n])
                    .ok_or_else(|| Error::InvalidGraph(format!("motif {motif} has no parent")))?;
                Some(find_link(target, parent, motif, step_of[parent])?)
            };
            steps.push(DecodeStep {
                motif,
                motif_label: target.motif.labels[motif],
                attachment_label: target.attachment_config.labels[attachment],
                link,
            });
        }

        Ok(Self { steps })
    }

    /// Steps in decoding order.
    pub fn steps(&self) -> &[DecodeStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn find_link(target: &HierGraph, parent: NodeIndex, child: NodeIndex, parent_step: usize) -> Result<Link> {
    target
        .atom
        .directed_edges()
        .find(|&(a, b, _)| {
            target.motif_of_atom(a) == Some(parent) && target.motif_of_atom(b) == Some(child)
        })
        .map(|(a, b, bond_label)| Link {
            parent_step,
            parent_position: target.atom_position[a],
            child_position: target.atom_position[b],
            bond_label,
        })
        .ok_or_else(|| {
            Error::InvalidGraph(format!("no bond joins motif {parent} and motif {child}"))
        })
}
