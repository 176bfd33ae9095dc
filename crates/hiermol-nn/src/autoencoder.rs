//! The hierarchical graph autoencoder.
//!
//! [`Autoencoder`] wires one set of shared [`Embeddors`] into a latent
//! encoder (one network, or a mean / log-variance pair in variational mode)
//! and a decoder:
//!
//! ```text
//!                 ┌── mean_encoder ─────┐
//! hgraphs ─ batch ┤                     ├─ reparameterize ─ decoder ─ graphs (+ loss)
//!                 └── log_var_encoder ──┘
//!      embeddors (Arc) shared by every encoder and the decoder
//! ```
//!
//! All weights live in one [`VarMap`] under the prefixes `embeddors`,
//! `encoder` (or `mean_encoder` / `log_var_encoder`) and `decoder`.

use crate::config::{AutoencoderConfig, MpnModel};
use crate::decoder::{DecodeAccuracy, Decoder};
use crate::embed::Embeddors;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::mpn::{HierMessagePassingNet, MessagePassingFactory, MpnParams};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use hiermol_core::{HierBatch, HierGraph, Vocabs};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Generation runs until the expand head stops it.
pub const DEFAULT_MAX_MOTIFS: usize = usize::MAX;

/// Parameters of the diagonal Gaussian posterior.
#[derive(Debug, Clone)]
pub struct LatentStats {
    pub means: Tensor,
    pub log_vars: Tensor,
}

impl LatentStats {
    /// `KL(N(means, exp(log_vars)) || N(0, I))`, summed over batch and
    /// latent dimensions:
    ///
    /// ```text
    /// 0.5 * sum(exp(log_vars) + means^2 - 1 - log_vars)
    /// ```
    pub fn kl_divergence(&self) -> Result<Tensor> {
        let terms = (((self.log_vars.exp()? + self.means.sqr()?)? - 1.0)? - &self.log_vars)?;
        Ok((terms.sum_all()? * 0.5)?)
    }

    /// `means + noise * exp(log_vars / 2)` with fresh standard-normal noise.
    pub fn reparameterize<R: Rng>(&self, rng: &mut R) -> Result<Tensor> {
        let noise = standard_normal(self.means.dims(), rng, self.means.device())?
            .to_dtype(self.means.dtype())?;
        let std = (&self.log_vars / 2.0)?.exp()?;
        Ok((&self.means + (noise * std)?)?)
    }
}

fn standard_normal<R: Rng>(shape: &[usize], rng: &mut R, device: &Device) -> Result<Tensor> {
    let len = shape.iter().product();
    let values: Vec<f32> = (0..len).map(|_| rng.sample(StandardNormal)).collect();
    Ok(Tensor::from_vec(values, shape, device)?)
}

/// Graph-to-latent half of the model.
pub enum LatentEncoder {
    Deterministic {
        encoder: Encoder,
    },
    Variational {
        mean_encoder: Encoder,
        log_var_encoder: Encoder,
    },
}

impl LatentEncoder {
    pub fn is_variational(&self) -> bool {
        matches!(self, LatentEncoder::Variational { .. })
    }

    /// Encoders in construction order.
    pub fn encoders(&self) -> Vec<&Encoder> {
        match self {
            LatentEncoder::Deterministic { encoder } => vec![encoder],
            LatentEncoder::Variational {
                mean_encoder,
                log_var_encoder,
            } => vec![mean_encoder, log_var_encoder],
        }
    }

    /// Point latents plus, in variational mode, the posterior parameters.
    ///
    /// The point estimate of a variational encoder is its mean.
    pub fn encode(&self, batch: &HierBatch, train: bool) -> Result<(Tensor, Option<LatentStats>)> {
        match self {
            LatentEncoder::Deterministic { encoder } => Ok((encoder.forward(batch, train)?, None)),
            LatentEncoder::Variational {
                mean_encoder,
                log_var_encoder,
            } => {
                let means = mean_encoder.forward(batch, train)?;
                let log_vars = log_var_encoder.forward(batch, train)?;
                Ok((means.clone(), Some(LatentStats { means, log_vars })))
            }
        }
    }
}

/// Teacher-forced pass over target graphs.
#[derive(Debug)]
pub struct Reconstruction {
    /// Graphs rebuilt along the targets' decoding order.
    pub outputs: Vec<HierGraph>,
    /// Summed decoder loss (scalar).
    pub reconstruction_loss: Tensor,
    /// KL divergence of the posterior (scalar); zero when not variational.
    pub kl_loss: Tensor,
    pub accuracy: DecodeAccuracy,
}

/// Result of [`Autoencoder::forward`].
#[derive(Debug)]
pub enum Forward {
    Generated(Vec<HierGraph>),
    Reconstructed(Reconstruction),
}

/// Hierarchical graph (variational) autoencoder.
pub struct Autoencoder {
    config: AutoencoderConfig,
    vocabs: Vocabs,
    varmap: VarMap,
    embeddors: Arc<Embeddors>,
    encoder: LatentEncoder,
    decoder: Decoder,
    device: Device,
    rng: RefCell<StdRng>,
    training: bool,
}

impl Autoencoder {
    /// Build a model whose per-level message passing is `config.mpn_model`.
    ///
    /// `motif_graphs[i]` is the template of motif label `i`. Configuration
    /// and vocabularies are validated before any weight is allocated; in
    /// particular exactly three vocabularies are required.
    pub fn new(
        vocabs: &Vocabs,
        motif_graphs: Vec<HierGraph>,
        config: AutoencoderConfig,
        device: &Device,
    ) -> Result<Self> {
        let model: MpnModel = config.mpn_model;
        Self::with_factory(vocabs, motif_graphs, config, &model, device)
    }

    /// Like [`Autoencoder::new`] with a custom message-passing factory.
    pub fn with_factory(
        vocabs: &Vocabs,
        motif_graphs: Vec<HierGraph>,
        config: AutoencoderConfig,
        factory: &dyn MessagePassingFactory,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        vocabs.validate()?;
        Decoder::check_templates(vocabs, &motif_graphs)?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let embeddors = Arc::new(Embeddors::new(vocabs, config.node_rep_size, vb.pp("embeddors"))?);
        let params = MpnParams::from_config(&config);
        let hidden_size = config.hidden_size();

        let build_encoder = |name: &str| -> Result<Encoder> {
            let vb = vb.pp(name);
            let mpn = HierMessagePassingNet::new(&params, factory, vb.pp("mpn"))?;
            Encoder::new(
                hidden_size,
                config.node_rep_size,
                config.latent_size,
                config.dropout,
                Arc::clone(&embeddors),
                mpn,
                device,
                vb,
            )
        };
        let encoder = if config.variational {
            LatentEncoder::Variational {
                mean_encoder: build_encoder("mean_encoder")?,
                log_var_encoder: build_encoder("log_var_encoder")?,
            }
        } else {
            LatentEncoder::Deterministic {
                encoder: build_encoder("encoder")?,
            }
        };

        let decoder_vb = vb.pp("decoder");
        let decoder_mpn = HierMessagePassingNet::new(&params, factory, decoder_vb.pp("mpn"))?;
        let decoder = Decoder::new(
            vocabs,
            motif_graphs,
            hidden_size,
            config.node_rep_size,
            config.latent_size,
            config.attach_prediction_method,
            config.dropout,
            Arc::clone(&embeddors),
            decoder_mpn,
            device,
            decoder_vb,
        )?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        info!(
            variational = config.variational,
            mpn = %config.mpn_model,
            node_rep_size = config.node_rep_size,
            latent_size = config.latent_size,
            variables = varmap.all_vars().len(),
            "built autoencoder"
        );

        Ok(Self {
            config,
            vocabs: vocabs.clone(),
            varmap,
            embeddors,
            encoder,
            decoder,
            device: device.clone(),
            rng: RefCell::new(rng),
            training: false,
        })
    }

    pub fn config(&self) -> &AutoencoderConfig {
        &self.config
    }

    pub fn vocabs(&self) -> &Vocabs {
        &self.vocabs
    }

    /// Every trainable variable, for an optimizer.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn embeddors(&self) -> &Arc<Embeddors> {
        &self.embeddors
    }

    pub fn encoder(&self) -> &LatentEncoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_variational(&self) -> bool {
        self.encoder.is_variational()
    }

    /// Enable dropout in every sub-network.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Encode, then generate (`target_graphs == None`) or reconstruct.
    ///
    /// `deterministic` only matters in variational mode: it decodes the
    /// posterior means instead of a reparameterized sample. The KL term is
    /// computed from the posterior either way.
    pub fn forward(
        &self,
        hgraphs: &[HierGraph],
        target_graphs: Option<&[HierGraph]>,
        max_motifs: usize,
        deterministic: bool,
    ) -> Result<Forward> {
        match target_graphs {
            None => {
                let (latents, _) = self.encode_batch(hgraphs, deterministic)?;
                let outputs = self.decoder.generate(&latents, max_motifs, self.training)?;
                Ok(Forward::Generated(outputs))
            }
            Some(targets) => Ok(Forward::Reconstructed(self.reconstruct(
                hgraphs,
                targets,
                deterministic,
            )?)),
        }
    }

    /// Greedy generation from the posterior means (or encoder outputs).
    pub fn generate(&self, hgraphs: &[HierGraph], max_motifs: usize) -> Result<Vec<HierGraph>> {
        let (latents, _) = self.encode_batch(hgraphs, true)?;
        self.decoder.generate(&latents, max_motifs, self.training)
    }

    /// Reconstruction and KL losses of `hgraphs` against `target_graphs`.
    pub fn reconstruct(
        &self,
        hgraphs: &[HierGraph],
        target_graphs: &[HierGraph],
        deterministic: bool,
    ) -> Result<Reconstruction> {
        let (latents, stats) = self.encode_batch(hgraphs, deterministic)?;
        let (outputs, reconstruction_loss, accuracy) =
            self.decoder.reconstruct(&latents, target_graphs, self.training)?;
        let kl_loss = match &stats {
            Some(stats) => stats.kl_divergence()?,
            None => Tensor::zeros((), DType::F32, &self.device)?,
        };
        debug!(graphs = hgraphs.len(), "reconstruction pass");
        Ok(Reconstruction {
            outputs,
            reconstruction_loss,
            kl_loss,
            accuracy,
        })
    }

    /// Deterministic latents `(B, latent_size)`.
    pub fn encode(&self, hgraphs: &[HierGraph]) -> Result<Tensor> {
        self.latents(hgraphs, true)
    }

    /// Latents as the decoder would see them; sampled in variational mode
    /// unless `deterministic`.
    pub fn latents(&self, hgraphs: &[HierGraph], deterministic: bool) -> Result<Tensor> {
        Ok(self.encode_batch(hgraphs, deterministic)?.0)
    }

    /// Posterior parameters, `None` when not variational.
    pub fn latent_stats(&self, hgraphs: &[HierGraph]) -> Result<Option<LatentStats>> {
        Ok(self.encode_batch(hgraphs, true)?.1)
    }

    /// Decode `n` latents drawn from the standard-normal prior.
    pub fn sample_prior(&self, n: usize, max_motifs: usize) -> Result<Vec<HierGraph>> {
        let latents = {
            let mut rng = self.rng.borrow_mut();
            standard_normal(&[n, self.config.latent_size], &mut *rng, &self.device)?
        };
        self.decoder.generate(&latents, max_motifs, self.training)
    }

    /// Write all weights as safetensors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Overwrite all weights from a safetensors file written by [`Autoencoder::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }

    fn encode_batch(
        &self,
        hgraphs: &[HierGraph],
        deterministic: bool,
    ) -> Result<(Tensor, Option<LatentStats>)> {
        for graph in hgraphs {
            graph.validate(&self.vocabs)?;
        }
        let batch = HierBatch::new(hgraphs)?;
        let (point, stats) = self.encoder.encode(&batch, self.training)?;
        let latents = match &stats {
            Some(stats) if !deterministic => {
                let mut rng = self.rng.borrow_mut();
                stats.reparameterize(&mut *rng)?
            }
            _ => point,
        };
        Ok((latents, stats))
    }
}
