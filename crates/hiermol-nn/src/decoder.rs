//! Autoregressive motif-by-motif decoder.
//!
//! Starting from a latent vector the decoder grows a hierarchical graph one
//! motif at a time:
//!
//! 1. **Root**: predict the first motif and its attachment configuration
//!    from the latent alone.
//! 2. **Expand?**: run message passing over the partial graph and decide
//!    whether to add another motif.
//! 3. **Parent**: score every decoded motif as the attachment point.
//! 4. **Motif / attachment**: predict the new motif's label, then its
//!    attachment configuration among those belonging to that motif.
//! 5. **Atom pair**: score every (parent atom, new-motif atom) pair, via
//!    `dot` (MLP over the elementwise product) or `concat` (MLP over the
//!    concatenation).
//! 6. **Bond**: predict the label of the joining bond, copy the motif's
//!    atoms from its template and connect.
//!
//! Generation takes the argmax of every head. Reconstruction follows the
//! target's [`DecodePlan`] (teacher forcing) and sums the cross-entropy of
//! every head, plus binary cross-entropy of the expand head.

use crate::config::{Activation, AttachPrediction};
use crate::embed::Embeddors;
use crate::error::{Error, Result};
use crate::layers::{bce_with_logit, index_tensor, masked_argmax, masked_nll, Mlp};
use crate::mpn::{HierMessagePassingNet, HierReps};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Module, VarBuilder};
use hiermol_core::{DecodePlan, DecodeStep, HierBatch, HierGraph, Level, Vocabs};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Correct / total count of one prediction head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ratio {
    pub correct: usize,
    pub total: usize,
}

impl Ratio {
    fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.correct += 1;
        }
    }

    fn merge(&mut self, other: Ratio) {
        self.correct += other.correct;
        self.total += other.total;
    }

    /// Fraction correct, `None` if the head never ran.
    pub fn value(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }
}

/// Per-head argmax accuracy under teacher forcing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeAccuracy {
    pub motif: Ratio,
    pub attachment: Ratio,
    pub expand: Ratio,
    pub parent: Ratio,
    pub atom_pair: Ratio,
    pub bond: Ratio,
}

impl DecodeAccuracy {
    fn merge(&mut self, other: &DecodeAccuracy) {
        self.motif.merge(other.motif);
        self.attachment.merge(other.attachment);
        self.expand.merge(other.expand);
        self.parent.merge(other.parent);
        self.atom_pair.merge(other.atom_pair);
        self.bond.merge(other.bond);
    }
}

/// Decoder output.
#[derive(Debug)]
pub enum Decoded {
    /// Graphs generated greedily from the latents.
    Generated(Vec<HierGraph>),
    /// Teacher-forced reconstruction.
    Reconstructed {
        /// Graphs assembled along the targets' decoding order.
        graphs: Vec<HierGraph>,
        /// Summed reconstruction loss (scalar).
        loss: Tensor,
        accuracy: DecodeAccuracy,
    },
}

#[derive(Default)]
struct Trace {
    graph: HierGraph,
    losses: Vec<Tensor>,
    accuracy: DecodeAccuracy,
}

/// Pick a class: the target when teacher forcing (recording loss and
/// accuracy), else the argmax.
fn choose(
    logits: &Tensor,
    allowed: Option<&[usize]>,
    target: Option<usize>,
    ratio: &mut Ratio,
    losses: &mut Vec<Tensor>,
) -> Result<usize> {
    let predicted = masked_argmax(logits, allowed)?;
    let Some(target) = target else {
        return Ok(predicted);
    };
    if allowed.is_some_and(|allowed| !allowed.contains(&target)) {
        return Err(hiermol_core::Error::InvalidGraph(format!(
            "target class {target} is not allowed here"
        ))
        .into());
    }
    losses.push(masked_nll(logits, allowed, target)?);
    ratio.record(predicted == target);
    Ok(target)
}

/// Concatenate a `(1, L)` latent onto every row of `(N, d)`.
fn with_latent(latent: &Tensor, xs: &Tensor) -> Result<Tensor> {
    let (n, _) = xs.dims2()?;
    let (_, l) = latent.dims2()?;
    let latent = latent.broadcast_as((n, l))?.contiguous()?;
    Ok(Tensor::cat(&[&latent, xs], 1)?)
}

fn scalar(xs: &Tensor) -> Result<f32> {
    Ok(xs.to_dtype(DType::F32)?.to_scalar::<f32>()?)
}

/// Rebuilds hierarchical graphs from latent vectors.
pub struct Decoder {
    vocabs: Vocabs,
    templates: Vec<HierGraph>,
    attachment_choices: Vec<Vec<usize>>,
    embeddors: Arc<Embeddors>,
    mpn: HierMessagePassingNet,
    attach_prediction: AttachPrediction,
    root_motif: Mlp,
    attachment: Mlp,
    expand: Mlp,
    parent: Mlp,
    motif: Mlp,
    atom_pair: Mlp,
    bond: Mlp,
    latent_size: usize,
    device: Device,
}

impl Decoder {
    /// `motif_graphs[i]` is the template graph (atoms and bonds only matter)
    /// of motif label `i`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vocabs: &Vocabs,
        motif_graphs: Vec<HierGraph>,
        hidden_size: usize,
        node_rep_size: usize,
        latent_size: usize,
        attach_prediction: AttachPrediction,
        dropout: f64,
        embeddors: Arc<Embeddors>,
        mpn: HierMessagePassingNet,
        device: &Device,
        vb: VarBuilder,
    ) -> Result<Self> {
        let attachment_choices = Self::check_templates(vocabs, &motif_graphs)?;
        let num_motifs = vocabs.num_nodes(Level::Motif)?;
        let num_attachments = vocabs.num_nodes(Level::AttachmentConfig)?;
        let num_bonds = vocabs.num_edges(Level::Atom)?;

        let d = node_rep_size;
        let l = latent_size;
        let head = |name: &str, input: usize, output: usize| {
            Mlp::new(input, hidden_size, output, Activation::Relu, dropout, vb.pp(name))
        };
        let pair_input = match attach_prediction {
            AttachPrediction::Dot => d,
            AttachPrediction::Concat => 2 * d,
        };

        Ok(Self {
            vocabs: vocabs.clone(),
            templates: motif_graphs,
            attachment_choices,
            embeddors,
            mpn,
            attach_prediction,
            root_motif: head("root_motif", l, num_motifs)?,
            attachment: head("attachment", l + d, num_attachments)?,
            expand: head("expand", l + d, 1)?,
            parent: head("parent", l + d, 1)?,
            motif: head("motif", l + d, num_motifs)?,
            atom_pair: head("atom_pair", pair_input, 1)?,
            bond: head("bond", 2 * d, num_bonds)?,
            latent_size,
            device: device.clone(),
        })
    }

    /// Check motif templates against the vocabularies, returning the
    /// attachment configurations allowed for each motif label.
    ///
    /// Needs no weights, so callers can run it before allocating any.
    pub fn check_templates(
        vocabs: &Vocabs,
        motif_graphs: &[HierGraph],
    ) -> hiermol_core::Result<Vec<Vec<usize>>> {
        use hiermol_core::Error;

        let num_motifs = vocabs.num_nodes(Level::Motif)?;
        let num_atom_labels = vocabs.num_nodes(Level::Atom)?;
        let max_num_atoms = vocabs.max_num_atoms()?;

        if motif_graphs.len() != num_motifs {
            return Err(Error::InvalidVocab(format!(
                "{} motif graphs for {num_motifs} motifs",
                motif_graphs.len()
            )));
        }
        for (i, template) in motif_graphs.iter().enumerate() {
            let size = template.num_atoms();
            if size == 0 || size > max_num_atoms {
                return Err(Error::InvalidVocab(format!(
                    "motif {i} has {size} atoms, expected 1..={max_num_atoms}"
                )));
            }
            if template.atom.labels.iter().any(|&l| l >= num_atom_labels)
                || template.atom_position.iter().any(|&p| p >= max_num_atoms)
            {
                return Err(Error::InvalidVocab(format!(
                    "motif {i} template has out-of-range atom labels or positions"
                )));
            }
        }

        let attachment_choices = (0..num_motifs)
            .map(|m| vocabs.attachments_of_motif(m))
            .collect::<hiermol_core::Result<Vec<_>>>()?;
        if let Some(m) = attachment_choices.iter().position(Vec::is_empty) {
            return Err(Error::InvalidVocab(format!(
                "motif {m} has no attachment configuration"
            )));
        }

        Ok(attachment_choices)
    }

    /// Shared embedding tables.
    pub fn embeddors(&self) -> &Arc<Embeddors> {
        &self.embeddors
    }

    pub fn attach_prediction(&self) -> AttachPrediction {
        self.attach_prediction
    }

    pub fn latent_size(&self) -> usize {
        self.latent_size
    }

    /// Decode `(B, latent_size)` latents.
    ///
    /// With `targets` the decoder is teacher-forced along each target (and
    /// `max_motifs` is ignored); without, it generates at most `max_motifs`
    /// motifs per graph.
    pub fn forward(
        &self,
        latents: &Tensor,
        targets: Option<&[HierGraph]>,
        max_motifs: usize,
        train: bool,
    ) -> Result<Decoded> {
        match targets {
            None => Ok(Decoded::Generated(self.generate(latents, max_motifs, train)?)),
            Some(targets) => {
                let (graphs, loss, accuracy) = self.reconstruct(latents, targets, train)?;
                Ok(Decoded::Reconstructed {
                    graphs,
                    loss,
                    accuracy,
                })
            }
        }
    }

    /// Greedy generation, one graph per latent row.
    pub fn generate(&self, latents: &Tensor, max_motifs: usize, train: bool) -> Result<Vec<HierGraph>> {
        let batch = self.check_latents(latents)?;
        let graphs = (0..batch)
            .map(|i| {
                let latent = latents.narrow(0, i, 1)?;
                Ok(self.decode_one(&latent, None, max_motifs.max(1), train)?.graph)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            batch,
            motifs = graphs.iter().map(HierGraph::num_motifs).sum::<usize>(),
            "generated"
        );
        Ok(graphs)
    }

    /// Teacher-forced decoding: rebuilt graphs, summed loss and accuracy.
    pub fn reconstruct(
        &self,
        latents: &Tensor,
        targets: &[HierGraph],
        train: bool,
    ) -> Result<(Vec<HierGraph>, Tensor, DecodeAccuracy)> {
        let batch = self.check_latents(latents)?;
        if targets.len() != batch {
            return Err(hiermol_core::Error::InvalidGraph(format!(
                "{} target graphs for {batch} latents",
                targets.len()
            ))
            .into());
        }

        let mut graphs = Vec::with_capacity(batch);
        let mut losses = Vec::new();
        let mut accuracy = DecodeAccuracy::default();
        for (i, target) in targets.iter().enumerate() {
            target.validate(&self.vocabs)?;
            let plan = DecodePlan::from_target(target)?;
            let latent = latents.narrow(0, i, 1)?;
            let trace = self.decode_one(&latent, Some(&plan), usize::MAX, train)?;
            graphs.push(trace.graph);
            losses.extend(trace.losses);
            accuracy.merge(&trace.accuracy);
        }
        let loss = Tensor::stack(&losses, 0)?.sum_all()?;
        debug!(batch, terms = losses.len(), "reconstructed");
        Ok((graphs, loss, accuracy))
    }

    fn check_latents(&self, latents: &Tensor) -> Result<usize> {
        let (batch, latent_size) = latents.dims2()?;
        if latent_size != self.latent_size {
            return Err(Error::DimensionMismatch {
                expected: self.latent_size,
                got: latent_size,
            });
        }
        Ok(batch)
    }

    fn template(&self, motif_label: usize) -> Result<&HierGraph> {
        self.templates.get(motif_label).ok_or_else(|| {
            hiermol_core::Error::InvalidGraph(format!("unknown motif label {motif_label}")).into()
        })
    }

    fn encode_partial(&self, graph: &HierGraph, train: bool) -> Result<HierReps> {
        let batch = HierBatch::new(std::slice::from_ref(graph))?;
        let inputs = self.embeddors.embed(&batch, &self.device)?;
        Ok(self.mpn.forward(&inputs, train)?)
    }

    fn choose_attachment(
        &self,
        latent: &Tensor,
        motif_label: usize,
        target: Option<usize>,
        trace: &mut Trace,
        train: bool,
    ) -> Result<usize> {
        let allowed = self.attachment_choices.get(motif_label).ok_or_else(|| {
            Error::from(hiermol_core::Error::InvalidGraph(format!(
                "unknown motif label {motif_label}"
            )))
        })?;
        let motif_embedding = self
            .embeddors
            .node(Level::Motif.node_type())?
            .forward(&index_tensor(&[motif_label as u32], &self.device)?)?;
        let logits = self
            .attachment
            .forward(&Tensor::cat(&[latent, &motif_embedding], 1)?, train)?
            .squeeze(0)?;
        choose(
            &logits,
            Some(allowed),
            target,
            &mut trace.accuracy.attachment,
            &mut trace.losses,
        )
    }

    /// Scores of all (parent atom, child atom) pairs, row-major `(P * C)`.
    fn score_pairs(&self, parent: &Tensor, child: &Tensor, train: bool) -> Result<Tensor> {
        let (p, d) = parent.dims2()?;
        let (c, _) = child.dims2()?;
        let left = parent.unsqueeze(1)?.broadcast_as((p, c, d))?;
        let right = child.unsqueeze(0)?.broadcast_as((p, c, d))?;
        let features = match self.attach_prediction {
            AttachPrediction::Dot => (left * right)?,
            AttachPrediction::Concat => Tensor::cat(&[&left.contiguous()?, &right.contiguous()?], 2)?,
        };
        let width = features.dim(2)?;
        let features = features.contiguous()?.reshape((p * c, width))?;
        Ok(self.atom_pair.forward(&features, train)?.squeeze(1)?)
    }

    fn decode_one(
        &self,
        latent: &Tensor,
        plan: Option<&DecodePlan>,
        max_motifs: usize,
        train: bool,
    ) -> Result<Trace> {
        let steps = plan.map(DecodePlan::steps);
        let mut trace = Trace::default();

        let root = steps.and_then(|s| s.first());
        let logits = self.root_motif.forward(latent, train)?.squeeze(0)?;
        let motif_label = choose(
            &logits,
            None,
            root.map(|s| s.motif_label),
            &mut trace.accuracy.motif,
            &mut trace.losses,
        )?;
        let attachment_label =
            self.choose_attachment(latent, motif_label, root.map(|s| s.attachment_label), &mut trace, train)?;
        trace
            .graph
            .push_motif(motif_label, attachment_label, self.template(motif_label)?)?;

        for step in 1.. {
            if steps.is_none() && trace.graph.num_motifs() >= max_motifs {
                break;
            }
            let reps = self.encode_partial(&trace.graph, train)?;

            let target: Option<&DecodeStep> = steps.and_then(|s| s.get(step));
            let context = reps.motif.mean_keepdim(0)?;
            let expand_logit = self
                .expand
                .forward(&Tensor::cat(&[latent, &context], 1)?, train)?
                .flatten_all()?
                .get(0)?;
            let predicted_expand = scalar(&expand_logit)? > 0.0;
            let expand = match steps {
                Some(_) => {
                    let expected = target.is_some();
                    trace.losses.push(bce_with_logit(&expand_logit, expected)?);
                    trace.accuracy.expand.record(predicted_expand == expected);
                    expected
                }
                None => predicted_expand,
            };
            if !expand {
                break;
            }

            let link = match target {
                Some(t) => Some(t.link.ok_or_else(|| {
                    Error::from(hiermol_core::Error::InvalidGraph(format!(
                        "step {step} has no link"
                    )))
                })?),
                None => None,
            };

            let parent_logits = self
                .parent
                .forward(&with_latent(latent, &reps.motif)?, train)?
                .squeeze(1)?;
            let parent = choose(
                &parent_logits,
                None,
                link.map(|l| l.parent_step),
                &mut trace.accuracy.parent,
                &mut trace.losses,
            )?;
            let parent_rep = reps.motif.narrow(0, parent, 1)?;

            let motif_logits = self
                .motif
                .forward(&Tensor::cat(&[latent, &parent_rep], 1)?, train)?
                .squeeze(0)?;
            let motif_label = choose(
                &motif_logits,
                None,
                target.map(|t| t.motif_label),
                &mut trace.accuracy.motif,
                &mut trace.losses,
            )?;
            let attachment_label = self.choose_attachment(
                latent,
                motif_label,
                target.map(|t| t.attachment_label),
                &mut trace,
                train,
            )?;

            let template = self.template(motif_label)?;
            let parent_atoms = trace.graph.atoms_of_motif(parent);
            let parent_ids: Vec<u32> = parent_atoms.iter().map(|&a| a as u32).collect();
            let parent_reps = reps.atom.index_select(&index_tensor(&parent_ids, &self.device)?, 0)?;
            let child_positions: Vec<usize> = (0..template.num_atoms())
                .map(|a| template.atom_position.get(a).copied().unwrap_or(a))
                .collect();
            let child_labels: Vec<u32> = template.atom.labels.iter().map(|&l| l as u32).collect();
            let child_position_ids: Vec<u32> = child_positions.iter().map(|&p| p as u32).collect();
            let child_reps = self
                .embeddors
                .embed_atoms(&child_labels, &child_position_ids, &self.device)?;

            let num_child = child_positions.len();
            let pair_target = match link {
                Some(l) => {
                    let p = parent_atoms
                        .iter()
                        .position(|&a| trace.graph.atom_position[a] == l.parent_position);
                    let c = child_positions.iter().position(|&q| q == l.child_position);
                    match (p, c) {
                        (Some(p), Some(c)) => Some(p * num_child + c),
                        _ => {
                            return Err(hiermol_core::Error::InvalidGraph(format!(
                                "step {step}: bond positions ({}, {}) not found in templates",
                                l.parent_position, l.child_position
                            ))
                            .into())
                        }
                    }
                }
                None => None,
            };
            let pair_logits = self.score_pairs(&parent_reps, &child_reps, train)?;
            let pair = choose(
                &pair_logits,
                None,
                pair_target,
                &mut trace.accuracy.atom_pair,
                &mut trace.losses,
            )?;
            let (p, c) = (pair / num_child, pair % num_child);

            let bond_input = Tensor::cat(&[&parent_reps.narrow(0, p, 1)?, &child_reps.narrow(0, c, 1)?], 1)?;
            let bond_logits = self.bond.forward(&bond_input, train)?.squeeze(0)?;
            let bond = choose(
                &bond_logits,
                None,
                link.map(|l| l.bond_label),
                &mut trace.accuracy.bond,
                &mut trace.losses,
            )?;

            let child = trace
                .graph
                .push_motif(motif_label, attachment_label, template)?;
            trace
                .graph
                .connect(parent, child, parent_atoms[p], child_positions[c], bond)?;
            tracing::trace!(step, parent, motif_label, bond, "added motif");
        }

        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MpnModel, MpnOptions};
    use crate::mpn::MpnParams;
    use candle_nn::VarMap;
    use hiermol_core::Vocab;

    fn vocabs() -> Vocabs {
        let mut vocabs = Vocabs::new();
        vocabs.insert(Level::Atom, Vocab::new(["C", "O"], ["single", "double"]));
        vocabs.insert(
            Level::AttachmentConfig,
            Vocab::new(["ring:0", "ring:1", "chain:0"], ["attaches to"]).with_parents(vec![0, 0, 1]),
        );
        vocabs.insert(
            Level::Motif,
            Vocab::new(["ring", "chain"], ["attaches to"]).with_max_num_atoms(3),
        );
        vocabs
    }

    fn templates() -> Vec<HierGraph> {
        vec![
            HierGraph::single_motif(0, 0, &[0, 0, 0], &[(0, 1, 0), (1, 2, 0), (2, 0, 0)]),
            HierGraph::single_motif(1, 2, &[0, 1], &[(0, 1, 1)]),
        ]
    }

    fn decoder(method: AttachPrediction, varmap: &VarMap) -> Decoder {
        let device = Device::Cpu;
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &device);
        let vocabs = vocabs();
        let embeddors = Arc::new(Embeddors::new(&vocabs, 4, vb.pp("embeddors")).unwrap());
        let params = MpnParams {
            node_rep_size: 4,
            activation: Activation::Relu,
            neighbor_hops: 1,
            dropout: 0.0,
            options: MpnOptions::default(),
        };
        let mpn = HierMessagePassingNet::new(&params, &MpnModel::Gcn, vb.pp("mpn")).unwrap();
        Decoder::new(&vocabs, templates(), 0, 4, 2, method, 0.0, embeddors, mpn, &device, vb.pp("decoder"))
            .unwrap()
    }

    fn ring_with_chain() -> HierGraph {
        let t = templates();
        let mut hg = HierGraph::new();
        let ring = hg.push_motif(0, 1, &t[0]).unwrap();
        let chain = hg.push_motif(1, 2, &t[1]).unwrap();
        let atom = hg.atom_at_position(ring, 2).unwrap();
        hg.connect(ring, chain, atom, 1, 1).unwrap();
        hg
    }

    #[test]
    fn test_template_count_checked() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let vocabs = vocabs();
        let embeddors = Arc::new(Embeddors::new(&vocabs, 4, vb.pp("embeddors")).unwrap());
        let params = MpnParams {
            node_rep_size: 4,
            activation: Activation::Relu,
            neighbor_hops: 1,
            dropout: 0.0,
            options: MpnOptions::default(),
        };
        let mpn = HierMessagePassingNet::new(&params, &MpnModel::RnnMpn, vb.pp("mpn")).unwrap();
        let err = Decoder::new(
            &vocabs,
            templates()[..1].to_vec(),
            0,
            4,
            2,
            AttachPrediction::Dot,
            0.0,
            embeddors,
            mpn,
            &device,
            vb.pp("decoder"),
        )
        .err()
        .unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_reconstruction_loss() {
        for method in [AttachPrediction::Dot, AttachPrediction::Concat] {
            let varmap = VarMap::new();
            let decoder = decoder(method, &varmap);
            let latents = Tensor::randn(0f32, 1f32, (2, 2), &Device::Cpu).unwrap();
            let targets = vec![ring_with_chain(), templates()[1].clone()];
            let Decoded::Reconstructed { graphs, loss, accuracy } =
                decoder.forward(&latents, Some(&targets), usize::MAX, false).unwrap()
            else {
                panic!("expected reconstruction");
            };

            let loss = loss.to_scalar::<f32>().unwrap();
            assert!(loss.is_finite() && loss > 0.0);
            // Teacher forcing reproduces the target structure.
            assert_eq!(graphs[0].stats(), targets[0].stats());
            assert_eq!(graphs[1].stats(), targets[1].stats());
            // root motif for both graphs plus one expansion
            assert_eq!(accuracy.motif.total, 3);
            // one expand decision after every motif
            assert_eq!(accuracy.expand.total, 3);
            assert_eq!(accuracy.atom_pair.total, 1);
            assert_eq!(accuracy.bond.total, 1);
        }
    }

    #[test]
    fn test_generation_respects_max_motifs() {
        let varmap = VarMap::new();
        let decoder = decoder(AttachPrediction::Concat, &varmap);
        let latents = Tensor::randn(0f32, 1f32, (3, 2), &Device::Cpu).unwrap();
        let Decoded::Generated(graphs) = decoder.forward(&latents, None, 3, false).unwrap() else {
            panic!("expected generation");
        };
        assert_eq!(graphs.len(), 3);
        for graph in &graphs {
            assert!((1..=3).contains(&graph.num_motifs()));
            graph.validate(&vocabs()).unwrap();
            // attachment configurations always belong to their motif
            for (c, &m) in graph.attachment_parent.iter().enumerate() {
                let config = graph.attachment_config.labels[c];
                assert_eq!(vocabs().get(Level::AttachmentConfig).unwrap().parent[config], graph.motif.labels[m]);
            }
            // generated graphs are connected
            assert!(DecodePlan::from_target(graph).is_ok());
        }
    }

    #[test]
    fn test_target_count_mismatch() {
        let varmap = VarMap::new();
        let decoder = decoder(AttachPrediction::Dot, &varmap);
        let latents = Tensor::randn(0f32, 1f32, (2, 2), &Device::Cpu).unwrap();
        let targets = vec![ring_with_chain()];
        assert!(decoder.forward(&latents, Some(&targets), 10, false).is_err());

        let wide = Tensor::randn(0f32, 1f32, (1, 5), &Device::Cpu).unwrap();
        assert!(matches!(
            decoder.forward(&wide, None, 10, false),
            Err(Error::DimensionMismatch { expected: 2, got: 5 })
        ));
    }
}
