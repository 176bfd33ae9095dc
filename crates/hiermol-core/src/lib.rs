#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

//! Core types for hierarchical molecular graphs.
//!
//! A molecule is represented on three coupled levels:
//!
//! - [`Level::Atom`] - atoms joined by bonds
//! - [`Level::AttachmentConfig`] - how each motif attaches to its neighbors
//! - [`Level::Motif`] - motifs (rings, chains, functional groups) joined where they attach
//!
//! This crate provides the tensor-free parts of the model:
//!
//! - [`Vocab`] / [`Vocabs`] - per-level label sets, validated against the fixed schema
//! - [`HierGraph`] - a single molecule, with builders used by the decoder
//! - [`HierBatch`] - disjoint union of graphs for batched message passing
//! - [`DecodePlan`] - breadth-first motif ordering used for teacher forcing
//!
//! # Example
//!
//! ```rust
//! use hiermol_core::{DecodePlan, HierBatch, HierGraph};
//!
//! let template = HierGraph::single_motif(0, 0, &[0, 1], &[(0, 1, 0)]);
//! let mut hg = HierGraph::new();
//! let root = hg.push_motif(0, 0, &template).unwrap();
//! let child = hg.push_motif(0, 0, &template).unwrap();
//! hg.connect(root, child, 1, 0, 0).unwrap();
//!
//! let plan = DecodePlan::from_target(&hg).unwrap();
//! assert_eq!(plan.len(), 2);
//!
//! let batch = HierBatch::new(&[hg.clone(), template]).unwrap();
//! assert_eq!(batch.num_graphs(), 2);
//! ```

pub mod batch;
mod error;
pub mod graph;
mod level;
pub mod plan;
pub mod vocab;

pub use batch::{HierBatch, LevelBatch};
pub use error::{Error, Result};
pub use graph::{read_graphs, write_graphs, EdgeStore, HierGraph, HierGraphStats, LevelGraph, NodeIndex};
pub use level::Level;
pub use plan::{DecodePlan, DecodeStep, Link};
pub use vocab::{Vocab, Vocabs};

// Re-export petgraph for callers that want to run graph algorithms on levels
pub use petgraph;
