//! Graph encoder: hierarchical message passing followed by a pooled readout.

use crate::config::Activation;
use crate::embed::Embeddors;
use crate::error::Result;
use crate::layers::{mean_pool, Mlp};
use crate::mpn::HierMessagePassingNet;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use hiermol_core::{HierBatch, Level};
use std::sync::Arc;

/// Maps a batch of hierarchical graphs to one vector per graph.
///
/// The readout sees the mean motif representation concatenated with the
/// mean atom representation of each graph.
pub struct Encoder {
    embeddors: Arc<Embeddors>,
    mpn: HierMessagePassingNet,
    readout: Mlp,
    latent_size: usize,
    device: Device,
}

impl Encoder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hidden_size: usize,
        node_rep_size: usize,
        latent_size: usize,
        dropout: f64,
        embeddors: Arc<Embeddors>,
        mpn: HierMessagePassingNet,
        device: &Device,
        vb: VarBuilder,
    ) -> Result<Self> {
        let readout = Mlp::new(
            2 * node_rep_size,
            hidden_size,
            latent_size,
            Activation::Relu,
            dropout,
            vb.pp("readout"),
        )?;
        Ok(Self {
            embeddors,
            mpn,
            readout,
            latent_size,
            device: device.clone(),
        })
    }

    /// Shared embedding tables.
    pub fn embeddors(&self) -> &Arc<Embeddors> {
        &self.embeddors
    }

    pub fn latent_size(&self) -> usize {
        self.latent_size
    }

    /// `(num_graphs, latent_size)` latent vectors.
    pub fn forward(&self, batch: &HierBatch, train: bool) -> Result<Tensor> {
        let inputs = self.embeddors.embed(batch, &self.device)?;
        let reps = self.mpn.forward(&inputs, train)?;

        let num_graphs = batch.num_graphs();
        let motifs = mean_pool(&reps.motif, &batch.level(Level::Motif).node_graph, num_graphs)?;
        let atoms = mean_pool(&reps.atom, &batch.level(Level::Atom).node_graph, num_graphs)?;
        let pooled = Tensor::cat(&[&motifs, &atoms], 1)?;
        Ok(self.readout.forward(&pooled, train)?)
    }
}
