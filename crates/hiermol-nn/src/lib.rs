#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

//! Neural networks for hierarchical molecular graphs, on candle.
//!
//! - [`Embeddors`] - node, edge and position embedding tables, shared by
//!   every network through an `Arc`
//! - [`MessagePassing`] - one-level message passing ([`RnnMpn`], [`Gcn`]),
//!   stacked over the three levels by [`HierMessagePassingNet`]
//! - [`Encoder`] - pooled graph readout
//! - [`Decoder`] - motif-by-motif generation and teacher-forced losses
//! - [`Autoencoder`] - the (variational) autoencoder tying them together
//!
//! # Example
//!
//! ```rust
//! use candle_core::Device;
//! use hiermol_core::{HierGraph, Level, Vocab, Vocabs};
//! use hiermol_nn::{AutoencoderConfig, Autoencoder, Forward};
//!
//! let mut vocabs = Vocabs::new();
//! vocabs.insert(Level::Atom, Vocab::new(["C", "N"], ["single"]));
//! vocabs.insert(
//!     Level::AttachmentConfig,
//!     Vocab::new(["a0"], ["attaches to"]).with_parents(vec![0]),
//! );
//! vocabs.insert(Level::Motif, Vocab::new(["m0"], ["attaches to"]).with_max_num_atoms(1));
//! let templates = vec![HierGraph::single_motif(0, 0, &[0], &[])];
//!
//! let config = AutoencoderConfig::default()
//!     .with_node_rep_size(4)
//!     .with_latent_size(2)
//!     .with_neighbor_hops(1)
//!     .with_variational(true);
//! let model = Autoencoder::new(&vocabs, templates.clone(), config, &Device::Cpu).unwrap();
//!
//! let out = model.forward(&templates, Some(&templates), 4, false).unwrap();
//! let Forward::Reconstructed(out) = out else { unreachable!() };
//! assert!(out.kl_loss.to_scalar::<f32>().unwrap() >= 0.0);
//! ```

pub mod autoencoder;
pub mod config;
pub mod decoder;
pub mod embed;
pub mod encoder;
mod error;
pub mod layers;
pub mod mpn;

pub use autoencoder::{
    Autoencoder, Forward, LatentEncoder, LatentStats, Reconstruction, DEFAULT_MAX_MOTIFS,
};
pub use config::{Activation, AttachPrediction, AutoencoderConfig, MpnModel, MpnOptions};
pub use decoder::{DecodeAccuracy, Decoded, Decoder, Ratio};
pub use embed::Embeddors;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use mpn::{
    Gcn, HierInputs, HierMessagePassingNet, HierReps, LevelInput, MessagePassing,
    MessagePassingFactory, MpnParams, RnnMpn,
};
